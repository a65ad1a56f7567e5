//! Structural checks on generated sections, each with a single repair pass.
//!
//! A failing check triggers exactly one corrective call. Whatever comes back
//! from that call is kept, passing or not.

use crate::api::{ApiError, TextGenerator};
use crate::pack::Section;
use crate::templates::{MASTER_SYSTEM, SCENES_REINFORCEMENT};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid regex"));
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("valid regex"));

/// Phrases accepted as "the image carries no text".
pub const NO_TEXT_MARKERS: &[&str] = &["sem texto", "sem textos", "sem legenda", "sem legendas"];

pub const ASPECT_RATIO: &str = "9:16";

pub fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Hashtags in order of first appearance, de-duplicated case-insensitively.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// What a check measured on one draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Words(usize),
    Hashtags(usize),
    SceneRules { ratio: bool, no_text: bool },
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Words(n) => write!(f, "{n} words"),
            Measure::Hashtags(n) => write!(f, "{n} hashtags"),
            Measure::SceneRules { ratio, no_text } => {
                write!(f, "9:16={ratio} no-text={no_text}")
            }
        }
    }
}

pub fn measure_scenes(text: &str) -> Measure {
    let lower = text.to_lowercase();
    Measure::SceneRules {
        ratio: text.contains(ASPECT_RATIO),
        no_text: NO_TEXT_MARKERS.iter().any(|m| lower.contains(m)),
    }
}

/// Outcome of one section's validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub section: Section,
    pub first: Measure,
    /// Measure of the repaired draft, when a repair ran.
    pub repaired: Option<Measure>,
    pub passes: bool,
}

impl Report {
    pub fn final_measure(&self) -> Measure {
        self.repaired.unwrap_or(self.first)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub text: String,
    pub report: Report,
}

/// Limits applied by the validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_script_words: usize,
    pub min_hashtags: usize,
    pub max_hashtags: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_script_words: 160,
            min_hashtags: 10,
            max_hashtags: 15,
        }
    }
}

impl Limits {
    fn accepts(&self, measure: Measure) -> bool {
        match measure {
            Measure::Words(n) => n <= self.max_script_words,
            Measure::Hashtags(n) => (self.min_hashtags..=self.max_hashtags).contains(&n),
            Measure::SceneRules { ratio, no_text } => ratio && no_text,
        }
    }
}

/// Drives the check-then-repair cycle for each section type.
#[derive(Debug)]
pub struct SectionRunner<'a> {
    generator: &'a dyn TextGenerator,
    limits: Limits,
    calls: AtomicUsize,
}

impl<'a> SectionRunner<'a> {
    pub fn new(generator: &'a dyn TextGenerator, limits: Limits) -> Self {
        Self {
            generator,
            limits,
            calls: AtomicUsize::new(0),
        }
    }

    /// Generation calls issued so far, repairs included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    async fn ask(&self, prompt: &str) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.generator.generate(MASTER_SYSTEM, prompt).await
    }

    async fn check_and_repair<M, R>(
        &self,
        section: Section,
        draft: String,
        measure: M,
        repair_prompt: R,
    ) -> Result<Validated, ApiError>
    where
        M: Fn(&str) -> Measure,
        R: FnOnce(&str, Measure) -> String,
    {
        let first = measure(&draft);
        if self.limits.accepts(first) {
            return Ok(Validated {
                text: draft,
                report: Report {
                    section,
                    first,
                    repaired: None,
                    passes: true,
                },
            });
        }

        let prompt = repair_prompt(&draft, first);
        let text = self.ask(&prompt).await?;
        let second = measure(&text);
        Ok(Validated {
            report: Report {
                section,
                first,
                repaired: Some(second),
                passes: self.limits.accepts(second),
            },
            text,
        })
    }

    /// Scenes must state 9:16 and that the image carries no text.
    pub async fn scenes(&self, prompt: &str) -> Result<Validated, ApiError> {
        let reinforced = format!("{prompt}{SCENES_REINFORCEMENT}");
        let draft = self.ask(&reinforced).await?;
        self.check_and_repair(Section::Scenes, draft, measure_scenes, |_, _| {
            format!(
                "{reinforced}\n\nAjuste a resposta garantindo que TODAS as variações especifiquem explicitamente: \
                 Proporção 9:16 e que a imagem não possui texto/legendas. \
                 Mantenha a descrição visual; não altere o conteúdo além disso."
            )
        })
        .await
    }

    /// Script must stay within the word ceiling.
    pub async fn script(&self, prompt: &str) -> Result<Validated, ApiError> {
        let max_words = self.limits.max_script_words;
        let draft = self.ask(prompt).await?;
        self.check_and_repair(
            Section::Script,
            draft,
            |t| Measure::Words(count_words(t)),
            |previous, _| {
                format!(
                    "{prompt}\n\nA resposta ficou longa. Encurte para no máximo {max_words} palavras, mantendo a estrutura: \
                     dor/gancho → curiosidade → benefícios/prova simples → CTA curto ('Link na bio' ou 'Link no perfil'). \
                     Apenas o texto do roteiro.\n\n---\nRascunho anterior (encurtar):\n{previous}"
                )
            },
        )
        .await
    }

    /// Description must carry a hashtag count within range.
    pub async fn description(&self, prompt: &str) -> Result<Validated, ApiError> {
        let Limits {
            min_hashtags,
            max_hashtags,
            ..
        } = self.limits;
        let draft = self.ask(prompt).await?;
        self.check_and_repair(
            Section::Description,
            draft,
            |t| Measure::Hashtags(extract_hashtags(t).len()),
            |previous, first| {
                let found = match first {
                    Measure::Hashtags(n) => n,
                    _ => 0,
                };
                format!(
                    "{prompt}\n\nA resposta veio com {found} hashtags; ajuste a resposta para conter entre {min_hashtags} e {max_hashtags} \
                     hashtags reais do nicho (não genéricas demais). Mantenha os parágrafos e bullets como estão.\
                     \n\n---\nVersão anterior (ajustar hashtags):\n{previous}"
                )
            },
        )
        .await
    }
}
