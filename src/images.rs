//! Scene image generation.
//!
//! One pipeline serves both cases: with a downloaded reference image it asks
//! for an image-conditioned edit and falls back to plain text-to-image on
//! any error; without one it goes straight to text-to-image.

use crate::api::{ApiError, ImageGenerator};
use crate::config::ImageOptions;
use crate::error::Error;
use crate::pack::{self, Pack, RESULT_FILE, Section};
use crate::processor::is_error_placeholder;
use crate::scenes::{EXPECTED_SCENES, clean_block, extract_images_section, split_scene_blocks};
use crate::{loge, logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub const CAPTIONS_FILE: &str = "_captions.txt";
const REFERENCE_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const IMAGE_RULES: &str = "Requisitos: Proporção estrita 9:16 (vertical). \
    Imagem sem qualquer texto/legenda/marca-d'água/overlays. Foco no produto em contexto real.";

pub fn image_prompt(scene: &str, reference: Option<&Path>) -> String {
    match reference.and_then(|r| r.file_name()) {
        Some(name) => format!(
            "{scene}\n\n{IMAGE_RULES}\nReferência visual: use características (cor/material/textura) da foto do produto em '{}'.",
            name.to_string_lossy()
        ),
        None => format!("{scene}\n\n{IMAGE_RULES}"),
    }
}

/// First `*_img*` picture for the pack: the source root's pack folder, then
/// the source root itself (flat `{pack}_imgN` layout), then the pack dir.
pub fn find_reference_image(pack: &Pack, source_root: Option<&Path>) -> Option<PathBuf> {
    let mut dirs: Vec<(PathBuf, bool)> = Vec::new();
    if let Some(root) = source_root {
        dirs.push((root.join(&pack.name), false));
        dirs.push((root.to_path_buf(), true));
    }
    dirs.push((pack.dir.clone(), false));

    let flat_prefix = format!("{}_img", pack.name);
    dirs.into_iter()
        .filter(|(dir, _)| dir.is_dir())
        .find_map(|(dir, flat)| {
            WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .find(|path| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let ext_ok = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_ascii_lowercase())
                        .is_some_and(|e| REFERENCE_EXTS.contains(&e.as_str()));
                    let name_ok = if flat {
                        name.starts_with(&flat_prefix)
                    } else {
                        name.contains("_img")
                    };
                    ext_ok && name_ok
                })
        })
}

/// Converts a reference picture to PNG next to it. PNGs are returned as-is.
pub async fn to_png(src: &Path) -> Result<PathBuf> {
    let is_png = src
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if is_png {
        return Ok(src.to_path_buf());
    }

    let src = src.to_path_buf();
    let png = src.with_extension("png");
    let out = png.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let img = image::open(&src).with_context(|| format!("open image: {}", src.display()))?;
        img.to_rgba8()
            .save_with_format(&out, image::ImageFormat::Png)
            .with_context(|| format!("write png: {}", out.display()))?;
        Ok(())
    })
    .await
    .context("png conversion task failed")??;
    Ok(png)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackImages {
    pub scenes: usize,
    pub generated: usize,
    pub existing: usize,
    pub failed: usize,
    pub fell_back: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSummary {
    pub packs: usize,
    pub generated: usize,
    pub failed: usize,
}

pub struct ImagePipeline<'a> {
    generator: &'a dyn ImageGenerator,
    options: ImageOptions,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(generator: &'a dyn ImageGenerator, options: ImageOptions) -> Self {
        Self { generator, options }
    }

    pub async fn run(&self) -> Result<ImageSummary> {
        let packs = pack::list_packs(&self.options.packs_root)?;
        if packs.is_empty() {
            return Err(Error::NoPacks {
                path: self.options.packs_root.clone(),
            }
            .into());
        }

        let mut summary = ImageSummary::default();
        for pack in &packs {
            if let Some(result) = self.process_pack(pack).await? {
                summary.packs += 1;
                summary.generated += result.generated;
                summary.failed += result.failed;
            }
        }
        logi(format!(
            "Images done. Generated: {} (failed {})",
            summary.generated, summary.failed
        ));
        Ok(summary)
    }

    /// Scene text: the scenes response, then a consolidated result (in the
    /// pack, organized under the source root, or flat there), then the raw
    /// prompt. Sources whose scenes are an error placeholder are passed over.
    async fn scene_text(&self, pack: &Pack) -> Option<String> {
        let mut candidates = vec![pack.response_path(Section::Scenes), pack.dir.join(RESULT_FILE)];
        if let Some(root) = &self.options.source_root {
            candidates.push(root.join(&pack.name).join(RESULT_FILE));
            candidates.push(pack.result_path(Some(root)));
        }
        for path in candidates {
            let Some(text) = pack::read_text(&path).await else {
                continue;
            };
            let scenes = extract_images_section(&text).trim();
            if scenes.is_empty() {
                continue;
            }
            if is_error_placeholder(scenes) {
                logw(format!("{}: {} holds a generation error, skipping it", pack.name, path.display()));
                continue;
            }
            return Some(text);
        }
        pack.read_prompt(Section::Scenes).await
    }

    fn output_dir(&self, pack: &Pack) -> PathBuf {
        match &self.options.output_root {
            Some(root) => root.join(&pack.name),
            None => pack.dir.clone(),
        }
    }

    async fn render_one(
        &self,
        base: Option<&Path>,
        prompt: &str,
        stats: &mut PackImages,
    ) -> std::result::Result<Vec<u8>, ApiError> {
        if let Some(base) = base {
            match self.generator.edit_image(base, prompt).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    logi(format!("image-to-image unavailable ({}); using text-to-image", err));
                    stats.fell_back += 1;
                }
            }
        }
        self.generator.generate_image(prompt).await
    }

    pub async fn process_pack(&self, pack: &Pack) -> Result<Option<PackImages>> {
        let Some(full_text) = self.scene_text(pack).await else {
            logw(format!("{}: no scene text, skipping", pack.name));
            return Ok(None);
        };

        let max = self.options.max_scenes_per_pack;
        let mut blocks = split_scene_blocks(extract_images_section(&full_text), EXPECTED_SCENES);
        if blocks.is_empty() {
            logw(format!("{}: no image prompt detected, skipping", pack.name));
            return Ok(None);
        }
        if blocks.len() != EXPECTED_SCENES {
            logw(format!(
                "{}: detected {} scene blocks (expected {}), using up to {}",
                pack.name,
                blocks.len(),
                EXPECTED_SCENES,
                max
            ));
        }
        blocks.truncate(max);
        logi(format!("{}: generating {} images", pack.name, blocks.len()));

        let out_dir = self.output_dir(pack);
        fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", out_dir.display()))?;

        let reference = find_reference_image(pack, self.options.source_root.as_deref());
        let base_png = match reference {
            Some(src) => match to_png(&src).await {
                Ok(png) => {
                    logi(format!("Using base image: {}", png.display()));
                    Some(png)
                }
                Err(err) => {
                    logw(format!("Base image unusable ({:#}); text-to-image only", err));
                    None
                }
            },
            None => {
                logi("No base image; generating from text only".to_string());
                None
            }
        };

        let mut stats = PackImages {
            scenes: blocks.len(),
            ..PackImages::default()
        };
        let mut captions = Vec::with_capacity(blocks.len());

        for (idx, block) in blocks.iter().enumerate() {
            let seq = idx + 1;
            let prompt = image_prompt(&clean_block(block), base_png.as_deref());
            let png_path = out_dir.join(format!("{:03}.png", seq));
            let caption = format!("{:03}.png | {}", seq, prompt.replace('\n', " "));

            if png_path.exists() && !self.options.overwrite {
                logi(format!("{} already exists (overwrite to redo)", png_path.display()));
                stats.existing += 1;
                captions.push(caption);
                continue;
            }

            match self.render_one(base_png.as_deref(), &prompt, &mut stats).await {
                Ok(bytes) => {
                    fs::write(&png_path, &bytes)
                        .await
                        .with_context(|| format!("write image: {}", png_path.display()))?;
                    stats.generated += 1;
                    captions.push(caption);
                    logok(format!("Saved: {}", png_path.display()));
                }
                Err(err) => {
                    stats.failed += 1;
                    let err_path = out_dir.join(format!("{:03}_ERROR.txt", seq));
                    pack::write_text(&err_path, &format!("Prompt:\n{prompt}\n\nErro:\n{err}")).await?;
                    loge(format!("Scene {} of {} failed: {}", seq, pack.name, err));
                }
            }
        }

        let captions_path = out_dir.join(CAPTIONS_FILE);
        fs::write(&captions_path, captions.join("\n"))
            .await
            .with_context(|| format!("write captions: {}", captions_path.display()))?;

        Ok(Some(stats))
    }
}
