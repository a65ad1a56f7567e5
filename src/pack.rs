//! On-disk pack layout.
//!
//! A pack is a directory named `{ordinal:03}-{slug}` holding the four prompt
//! files and, once processed, the `RESPOSTA_*` files and the consolidated
//! result.

use crate::error::{Error, Result};
use crate::templates::PackPrompts;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub const RESULT_FILE: &str = "RESULTADO_COMPLETO.txt";

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// The four generated artifacts of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Scenes,
    Script,
    VideoAssembly,
    Description,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Scenes,
        Section::Script,
        Section::VideoAssembly,
        Section::Description,
    ];

    pub fn prompt_file(self) -> &'static str {
        match self {
            Section::Scenes => "prompt_01_cenas.txt",
            Section::Script => "prompt_02_roteiro.txt",
            Section::VideoAssembly => "prompt_03_invideo.txt",
            Section::Description => "prompt_04_descricao_hashtags.txt",
        }
    }

    pub fn response_file(self) -> &'static str {
        match self {
            Section::Scenes => "RESPOSTA_prompt_01_cenas.txt",
            Section::Script => "RESPOSTA_prompt_02_roteiro.txt",
            Section::VideoAssembly => "RESPOSTA_prompt_03_invideo_READY.txt",
            Section::Description => "RESPOSTA_prompt_04_descricao_hashtags.txt",
        }
    }

    /// Heading used in the consolidated result.
    pub fn heading(self) -> &'static str {
        match self {
            Section::Scenes => "IMAGENS (ChatGPT)",
            Section::Script => "ROTEIRO (ChatGPT)",
            Section::VideoAssembly => "INVIDEO (READY)",
            Section::Description => "DESCRIÇÃO/HASHTAGS (ChatGPT)",
        }
    }

    /// Name used in inline error placeholders.
    pub fn label(self) -> &'static str {
        match self {
            Section::Scenes => "imagens",
            Section::Script => "roteiro",
            Section::VideoAssembly => "invideo",
            Section::Description => "descrição",
        }
    }
}

/// One pack directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack {
    pub dir: PathBuf,
    pub name: String,
}

impl Pack {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Option<Self> {
        let dir = dir.into();
        let name = dir.file_name()?.to_string_lossy().into_owned();
        Some(Self { dir, name })
    }

    /// 1-based ordinal from the `NNN-` prefix, if any.
    pub fn ordinal(&self) -> Option<usize> {
        ordinal_from_name(&self.name)
    }

    pub fn prompt_path(&self, section: Section) -> PathBuf {
        self.dir.join(section.prompt_file())
    }

    pub fn response_path(&self, section: Section) -> PathBuf {
        self.dir.join(section.response_file())
    }

    pub async fn read_prompt(&self, section: Section) -> Option<String> {
        read_text(&self.prompt_path(section))
            .await
            .filter(|text| !text.trim().is_empty())
    }

    pub async fn read_response(&self, section: Section) -> Option<String> {
        read_text(&self.response_path(section))
            .await
            .filter(|text| !text.trim().is_empty())
    }

    /// Directory receiving the consolidated result and downloaded images.
    pub fn result_dir(&self, output_root: Option<&Path>) -> PathBuf {
        match output_root {
            Some(root) => root.to_path_buf(),
            None => self.dir.clone(),
        }
    }

    pub fn result_path(&self, output_root: Option<&Path>) -> PathBuf {
        match output_root {
            Some(root) => root.join(format!("{}.txt", self.name)),
            None => self.dir.join(RESULT_FILE),
        }
    }
}

/// `"007-wireless-mouse"` → `Some(7)`.
pub fn ordinal_from_name(name: &str) -> Option<usize> {
    name.split('-').next()?.trim().parse().ok()
}

pub fn slugify(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, "");
    let dashed = WHITESPACE.replace_all(&stripped, "-");
    let collapsed = DASHES.replace_all(&dashed, "-");
    let slug = collapsed.trim_matches('-');
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug.to_string()
    }
}

pub fn pack_dir_name(ordinal: usize, product: &str) -> String {
    format!("{:03}-{}", ordinal, slugify(product))
}

/// Immediate subdirectories of `root`, sorted by name.
pub fn list_packs(root: &Path) -> Result<Vec<Pack>> {
    if !root.is_dir() {
        return Err(Error::MissingPacksRoot {
            path: root.to_path_buf(),
        });
    }

    let mut packs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            if let Some(pack) = Pack::from_dir(entry.path()) {
                packs.push(pack);
            }
        }
    }
    Ok(packs)
}

/// Reads UTF-8 text, dropping a leading BOM. Missing or unreadable files are `None`.
pub async fn read_text(path: &Path) -> Option<String> {
    let bytes = fs::read(path).await.ok()?;
    let text = String::from_utf8_lossy(&bytes);
    Some(text.trim_start_matches('\u{feff}').to_string())
}

/// Writes `text` trimmed with a single trailing newline, creating parents.
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    let body = format!("{}\n", text.trim());
    fs::write(path, body).await.map_err(|e| Error::io(path, e))
}

/// Creates (or refreshes) the pack directory and its four prompt files.
pub async fn write_pack(root: &Path, ordinal: usize, product: &str, prompts: &PackPrompts) -> Result<Pack> {
    let dir = root.join(pack_dir_name(ordinal, product));
    let pack = Pack {
        name: pack_dir_name(ordinal, product),
        dir,
    };

    let files = [
        (Section::Scenes, &prompts.scenes),
        (Section::Script, &prompts.script),
        (Section::VideoAssembly, &prompts.video_assembly),
        (Section::Description, &prompts.description),
    ];
    for (section, text) in files {
        write_text(&pack.prompt_path(section), text).await?;
    }
    Ok(pack)
}
