//! Text assets for a single topic: script, metadata, shot list and asset prompts.

use crate::api::TextGenerator;
use crate::config::TopicOptions;
use crate::error::Result;
use crate::pack::write_text;
use crate::templates::render_topic_prompt;
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};

/// Used when no generator is configured or the call fails.
pub const FALLBACK_SCRIPT: &str = "Cansado de setups complicados?
Conheça o mini teclado sem fio: compacto, preciso e pronto em segundos.
Transforme seu home office e seus games com conforto real.
Link na bio e experimente hoje.";

const HASHTAGS: [&str; 10] = [
    "#tiktok",
    "#tecnologia",
    "#gadgets",
    "#review",
    "#dicas",
    "#setup",
    "#homeoffice",
    "#smart",
    "#conectado",
    "#expressTechTips",
];

const BEATS: [(&str, &str); 6] = [
    ("Abertura/Dor", "Close do produto na mão / contexto real"),
    ("Curiosidade", "Transição mostrando recurso-chave"),
    ("Benefício 1", "Close de ação + texto on-screen"),
    ("Benefício 2", "Wide do ambiente (setup/home office)"),
    ("Prova social", "Corte rápido, detalhe de uso"),
    ("CTA", "Tela final simples, call-to-action direto"),
];

const SCRIPT_EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPrompts {
    pub search_terms: Vec<String>,
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAssets {
    pub script: String,
    /// `false` when the static script was used.
    pub generated: bool,
    pub metadata: Metadata,
    pub shotlist: String,
    pub assets: AssetPrompts,
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

pub async fn generate_script(generator: Option<&dyn TextGenerator>, options: &TopicOptions) -> (String, bool) {
    let Some(generator) = generator else {
        logi("No generator configured, using the built-in script");
        return (FALLBACK_SCRIPT.to_string(), false);
    };

    let prompt = render_topic_prompt(
        &options.topic,
        &options.style,
        options.duration_secs,
        &options.language,
    );
    match generator.generate(&prompt.system, &prompt.user).await {
        Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), true),
        Ok(_) => {
            logw("Empty script returned, using the built-in script");
            (FALLBACK_SCRIPT.to_string(), false)
        }
        Err(err) => {
            logw(format!("Script generation failed ({}), using the built-in script", err));
            (FALLBACK_SCRIPT.to_string(), false)
        }
    }
}

pub fn build_metadata(topic: &str) -> Metadata {
    Metadata {
        title: format!("{} sem complicação", title_case(topic)),
        description: format!(
            "{topic} do jeito certo: rápido, prático e sem dor de cabeça.\n\
             Confira no vídeo como usar e por que vale a pena."
        ),
        hashtags: HASHTAGS.iter().map(|t| t.to_string()).collect(),
        caption: format!("{topic} • prático e portátil — veja nos stories! 🚀"),
    }
}

/// Six beats with an equal share of the duration, never under two seconds each.
pub fn build_shotlist(script: &str, duration_secs: u32) -> String {
    let per_beat = (duration_secs / BEATS.len() as u32).max(2);
    let excerpt: String = script.chars().take(SCRIPT_EXCERPT_CHARS).collect();

    let mut lines = vec!["# Shotlist (aprox.)\n".to_string()];
    for (title, visual) in BEATS {
        lines.push(format!("## {title}  (~{per_beat}s)"));
        lines.push(format!("- Visual: {visual}"));
        lines.push(format!("- Diálogo/voz (trecho): {excerpt}..."));
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn build_asset_prompts(topic: &str) -> AssetPrompts {
    AssetPrompts {
        search_terms: vec![
            format!("{topic} close-up"),
            format!("{topic} on desk setup"),
            "wireless keyboard minimalist desk".to_string(),
            "typing hands macro".to_string(),
            "gamer rgb desk close".to_string(),
            "home office productivity vertical".to_string(),
        ],
        thumbnails: vec![
            format!("{topic} centralizado, fundo clean, luz lateral suave, contraste alto (vertical 9:16)"),
            format!("mão segurando {topic}, foco no detalhe, bokeh no fundo (9:16)"),
            "setup clean com monitor e acessórios, estética minimalista, linhas simétricas (9:16)".to_string(),
            "close dramático com sombras leves, textura do produto evidente (9:16)".to_string(),
        ],
    }
}

pub async fn build_topic_assets(generator: Option<&dyn TextGenerator>, options: &TopicOptions) -> TopicAssets {
    let (script, generated) = generate_script(generator, options).await;
    TopicAssets {
        metadata: build_metadata(&options.topic),
        shotlist: build_shotlist(&script, options.duration_secs),
        assets: build_asset_prompts(&options.topic),
        script,
        generated,
    }
}

/// Writes the eight text files and returns their paths.
pub async fn write_topic_assets(dir: &Path, assets: &TopicAssets) -> Result<Vec<PathBuf>> {
    let files = [
        ("script.txt", assets.script.clone()),
        ("title.txt", assets.metadata.title.clone()),
        ("description.txt", assets.metadata.description.clone()),
        ("hashtags.txt", assets.metadata.hashtags.join("\n")),
        ("caption.txt", assets.metadata.caption.clone()),
        ("shotlist.md", assets.shotlist.clone()),
        ("asset_prompts.txt", assets.assets.search_terms.join("\n")),
        ("thumbnail_prompts.txt", assets.assets.thumbnails.join("\n")),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, body) in files {
        let path = dir.join(name);
        write_text(&path, &body).await?;
        written.push(path);
    }
    Ok(written)
}

pub async fn run_topic(generator: Option<&dyn TextGenerator>, options: &TopicOptions) -> Result<TopicAssets> {
    let assets = build_topic_assets(generator, options).await;
    write_topic_assets(&options.output_dir, &assets).await?;
    logok(format!("Topic assets written to {}", options.output_dir.display()));
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FakeGenerator;

    fn options(dir: &Path) -> TopicOptions {
        TopicOptions {
            topic: "mini teclado".into(),
            duration_secs: 30,
            output_dir: dir.to_path_buf(),
            ..TopicOptions::default()
        }
    }

    #[test]
    fn title_case_per_word() {
        assert_eq!(title_case("mini TECLADO sem-fio"), "Mini Teclado Sem-Fio");
        assert_eq!(build_metadata("mini teclado").title, "Mini Teclado sem complicação");
    }

    #[test]
    fn shotlist_has_six_beats_with_minimum_length() {
        let list = build_shotlist("Roteiro curto", 30);
        assert_eq!(list.matches("## ").count(), 6);
        assert!(list.contains("## Abertura/Dor  (~5s)"));
        assert!(list.contains("- Diálogo/voz (trecho): Roteiro curto..."));

        assert!(build_shotlist("x", 7).contains("(~2s)"));
    }

    #[test]
    fn shotlist_excerpt_is_capped() {
        let script = "á".repeat(300);
        let list = build_shotlist(&script, 60);
        let expected = format!("(trecho): {}...", "á".repeat(120));
        assert!(list.contains(&expected));
    }

    #[tokio::test]
    async fn failing_generator_falls_back_to_static_script() {
        let fake = FakeGenerator::new().with_failure("roteiro", "quota");
        let tmp = tempfile::tempdir().unwrap();
        let assets = build_topic_assets(Some(&fake), &options(tmp.path())).await;
        assert_eq!(assets.script, FALLBACK_SCRIPT);
        assert!(!assets.generated);
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn generated_script_is_written_with_all_assets() {
        let fake = FakeGenerator::new().with_response("mini teclado", "Gancho.\nCTA: Link na bio.");
        let tmp = tempfile::tempdir().unwrap();
        let assets = run_topic(Some(&fake), &options(tmp.path())).await.unwrap();
        assert!(assets.generated);

        let script = tokio::fs::read_to_string(tmp.path().join("script.txt")).await.unwrap();
        assert_eq!(script, "Gancho.\nCTA: Link na bio.\n");
        let hashtags = tokio::fs::read_to_string(tmp.path().join("hashtags.txt")).await.unwrap();
        assert_eq!(hashtags.lines().count(), 10);
        for name in ["title.txt", "description.txt", "caption.txt", "shotlist.md", "asset_prompts.txt", "thumbnail_prompts.txt"] {
            assert!(tmp.path().join(name).is_file(), "{name} missing");
        }
    }
}
