//! Turning a scenes response into individual image prompts.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t>*_]*\d{1,2}\s*[.):\-][*_]*\s+").expect("valid regex"));
static GENERATE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\*\*)?\s*gerar\s+imagem\s*\d+\s*[.:\-]?\s*(?:\*\*)?").expect("valid regex")
});
static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SECTION_NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*##\s+").expect("valid regex"));
static MARKDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#>`*_]").expect("valid regex"));

fn is_heading(line: &str, title: &str) -> bool {
    line.trim_start()
        .strip_prefix("##")
        .map(|rest| rest.trim_start().to_uppercase())
        .is_some_and(|rest| rest.starts_with(&title.to_uppercase()))
}

/// Body of the `## <title>` section of a consolidated result.
pub fn extract_section<'t>(text: &'t str, title: &str) -> Option<&'t str> {
    let mut start = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        match start {
            None if is_heading(line, title) => start = Some(line_end),
            Some(s) if SECTION_NEXT.is_match(line) => return Some(text[s..offset].trim()),
            _ => {}
        }
        offset = line_end;
    }
    start.map(|s| text[s..].trim())
}

/// The `## IMAGENS` section, or the whole text when there is none.
pub fn extract_images_section(text: &str) -> &str {
    extract_section(text, "IMAGENS").unwrap_or(text)
}

fn non_empty(parts: impl Iterator<Item = impl AsRef<str>>) -> Vec<String> {
    parts
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Blocks after each `N.` / `N)` / `N:` / `N -` marker at line start.
/// Text before the first marker is treated as a preamble and dropped.
fn split_numbered(text: &str) -> Vec<String> {
    let Some(first) = NUMBERED.find(text) else {
        return Vec::new();
    };
    non_empty(NUMBERED.split(&text[first.start()..]))
}

fn split_generate_markers(text: &str) -> Vec<String> {
    let Some(first) = GENERATE_MARKER.find(text) else {
        return Vec::new();
    };
    non_empty(GENERATE_MARKER.split(&text[first.start()..]))
}

fn split_paragraphs(text: &str) -> Vec<String> {
    non_empty(BLANK_LINE.split(text))
}

/// Scene count the scenes prompt asks the model for.
pub const EXPECTED_SCENES: usize = 6;

/// Splits scene text into blocks, aiming for `expected` of them.
///
/// Marker-based splits win when they produce exactly `expected` blocks;
/// otherwise the text falls back to blank-line paragraphs. Callers cap the
/// result at their own maximum.
pub fn split_scene_blocks(text: &str, expected: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    for split in [split_generate_markers, split_numbered] {
        let blocks = split(text);
        if blocks.len() == expected {
            return blocks;
        }
    }
    split_paragraphs(text)
}

/// Removes light markdown so a block reads as a plain image prompt.
pub fn clean_block(block: &str) -> String {
    let without_marker = GENERATE_MARKER.replace_all(block, "");
    MARKDOWN.replace_all(&without_marker, "").trim().to_string()
}
