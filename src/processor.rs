//! Batch pack processing.
//!
//! Packs are handled one after another. Within a pack the four sections run
//! in a fixed order; a failing section leaves an inline marker and the rest
//! of the pack (and the batch) carries on.

use crate::api::{ApiError, TextGenerator};
use crate::catalog::Catalog;
use crate::config::{ImageUrlSource, RunOptions};
use crate::download::{self, ImageDownloader};
use crate::error::Error;
use crate::pack::{self, Pack, Section};
use crate::templates::INVIDEO_MARKER;
use crate::validate::{Limits, Report, SectionRunner, Validated};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

const ERROR_PREFIX: &str = "[ERRO";

pub fn error_placeholder(section: Section, err: &ApiError) -> String {
    format!("{} ao gerar {}: {}]", ERROR_PREFIX, section.label(), err)
}

pub fn missing_prompt_placeholder(section: Section) -> String {
    format!("[Sem {}]", section.prompt_file())
}

pub fn is_error_placeholder(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

/// Puts the script into the video-assembly prompt: in place of the marker
/// when present, otherwise appended under a heading.
pub fn fill_video_assembly(template: &str, script: &str) -> String {
    if template.contains(INVIDEO_MARKER) && !script.is_empty() && !is_error_placeholder(script) {
        template.replace(INVIDEO_MARKER, script)
    } else {
        format!("{template}\n\n# Roteiro (anexo)\n{script}")
    }
}

/// The consolidated result for one pack.
pub fn render_consolidated(pack_name: &str, sections: &[(Section, &str)]) -> String {
    let mut parts = vec![format!("# {pack_name}\n")];
    for (i, (section, text)) in sections.iter().enumerate() {
        let lead = if i == 0 { "" } else { "\n" };
        parts.push(format!("{lead}## {}\n", section.heading()));
        parts.push((*text).to_string());
    }
    parts.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ResultExists,
    MissingScriptPrompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackOutcome {
    Skipped(SkipReason),
    Done {
        result_path: PathBuf,
        reports: Vec<Report>,
        failed_sections: Vec<Section>,
        downloaded_images: Vec<PathBuf>,
        generation_calls: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub section_errors: usize,
    pub generation_calls: usize,
    pub images_downloaded: usize,
}

pub struct PackProcessor<'a> {
    generator: &'a dyn TextGenerator,
    options: RunOptions,
    downloader: Option<ImageDownloader>,
    catalog: Option<Catalog>,
}

impl<'a> PackProcessor<'a> {
    pub fn new(generator: &'a dyn TextGenerator, options: RunOptions) -> Self {
        Self {
            generator,
            options,
            downloader: None,
            catalog: None,
        }
    }

    pub fn with_downloader(mut self, downloader: ImageDownloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Uses an already-loaded spreadsheet instead of reading `csv_path`.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    fn limits(&self) -> Limits {
        Limits {
            max_script_words: self.options.max_script_words,
            min_hashtags: self.options.min_hashtags,
            max_hashtags: self.options.max_hashtags,
        }
    }

    fn output_root(&self) -> Option<&Path> {
        self.options.output_root.as_deref()
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let root = self.options.packs_root.clone();
        let packs = pack::list_packs(&root)?;
        if packs.is_empty() {
            return Err(Error::NoPacks { path: root }.into());
        }

        if let Some(out) = self.output_root() {
            fs::create_dir_all(out)
                .await
                .with_context(|| format!("Failed to create output root {}", out.display()))?;
        }

        if self.options.download_images {
            if self.downloader.is_none() {
                self.downloader = Some(ImageDownloader::new()?);
            }
            if self.options.image_source == ImageUrlSource::Csv && self.catalog.is_none() {
                self.catalog = Some(Catalog::load(&self.options.csv_path)?);
            }
            if let Some(catalog) = &self.catalog {
                logi(format!(
                    "Image URLs from {} ({} rows)",
                    catalog.source().display(),
                    catalog.rows().len()
                ));
            }
        }

        logi(format!(
            "{} pack(s) in {} | model: {}",
            packs.len(),
            root.display(),
            self.generator.model_name()
        ));
        let mut summary = RunSummary::default();
        for pack in &packs {
            match self.process_pack(pack).await? {
                PackOutcome::Skipped(reason) => {
                    summary.skipped += 1;
                    match reason {
                        SkipReason::ResultExists => {
                            logi(format!("Skipping {} (result already exists)", pack.name))
                        }
                        SkipReason::MissingScriptPrompt => logw(format!(
                            "{}: missing {}, skipping",
                            pack.name,
                            Section::Script.prompt_file()
                        )),
                    }
                }
                PackOutcome::Done {
                    result_path,
                    failed_sections,
                    downloaded_images,
                    generation_calls,
                    ..
                } => {
                    summary.processed += 1;
                    summary.section_errors += failed_sections.len();
                    summary.generation_calls += generation_calls;
                    summary.images_downloaded += downloaded_images.len();
                    logok(format!("DONE: {}", result_path.display()));
                }
            }
        }

        logi(format!(
            "All done. Processed: {} (skipped {}, section errors {}, generation calls {})",
            summary.processed, summary.skipped, summary.section_errors, summary.generation_calls
        ));
        logi(format!("Packs source: {}", root.display()));
        if let Some(out) = self.output_root() {
            logi(format!("Final results in: {}", out.display()));
        }
        Ok(summary)
    }

    async fn write_response(&self, pack: &Pack, section: Section, text: &str) -> Result<()> {
        if !self.options.only_final {
            pack::write_text(&pack.response_path(section), text).await?;
        }
        Ok(())
    }

    /// Runs one validated section, turning generation errors into the inline marker.
    async fn run_section(
        &self,
        pack: &Pack,
        section: Section,
        result: std::result::Result<Validated, ApiError>,
        reports: &mut Vec<Report>,
        failed: &mut Vec<Section>,
    ) -> Result<String> {
        let text = match result {
            Ok(validated) => {
                let report = &validated.report;
                let repaired = match report.repaired {
                    Some(after) => format!(" -> repaired to {after}"),
                    None => String::new(),
                };
                let status = if report.passes { "ok" } else { "accepted out of range" };
                logi(format!(
                    "{} [{}]: {}{} ({})",
                    pack.name,
                    section.label(),
                    report.first,
                    repaired,
                    status
                ));
                reports.push(validated.report);
                validated.text
            }
            Err(err) => {
                logw(format!("{} [{}]: generation failed: {}", pack.name, section.label(), err));
                failed.push(section);
                error_placeholder(section, &err)
            }
        };
        self.write_response(pack, section, &text).await?;
        Ok(text)
    }

    pub async fn process_pack(&self, pack: &Pack) -> Result<PackOutcome> {
        let result_path = pack.result_path(self.output_root());
        if self.options.skip_existing && result_path.exists() {
            return Ok(PackOutcome::Skipped(SkipReason::ResultExists));
        }

        let Some(script_prompt) = pack.read_prompt(Section::Script).await else {
            return Ok(PackOutcome::Skipped(SkipReason::MissingScriptPrompt));
        };

        logi(format!("=== Processing: {} ===", pack.name));
        let runner = SectionRunner::new(self.generator, self.limits());
        let mut reports = Vec::new();
        let mut failed = Vec::new();

        let scenes = match pack.read_prompt(Section::Scenes).await {
            Some(prompt) => {
                let result = runner.scenes(&prompt).await;
                self.run_section(pack, Section::Scenes, result, &mut reports, &mut failed)
                    .await?
            }
            None => missing_prompt_placeholder(Section::Scenes),
        };

        let result = runner.script(&script_prompt).await;
        let script = self
            .run_section(pack, Section::Script, result, &mut reports, &mut failed)
            .await?;

        let ready = match pack.read_prompt(Section::VideoAssembly).await {
            Some(template) => {
                let ready = fill_video_assembly(&template, &script);
                self.write_response(pack, Section::VideoAssembly, &ready).await?;
                ready
            }
            None => missing_prompt_placeholder(Section::VideoAssembly),
        };

        let description = match pack.read_prompt(Section::Description).await {
            Some(prompt) => {
                let result = runner.description(&prompt).await;
                self.run_section(pack, Section::Description, result, &mut reports, &mut failed)
                    .await?
            }
            None => missing_prompt_placeholder(Section::Description),
        };

        let consolidated = render_consolidated(
            &pack.name,
            &[
                (Section::Scenes, scenes.as_str()),
                (Section::Script, script.as_str()),
                (Section::VideoAssembly, ready.as_str()),
                (Section::Description, description.as_str()),
            ],
        );
        pack::write_text(&result_path, &consolidated).await?;
        logok(format!("Result written: {}", result_path.display()));

        let mut downloaded_images = Vec::new();
        if self.options.download_images {
            if let Some(downloader) = &self.downloader {
                let urls =
                    download::reference_urls(pack, self.options.image_source, self.catalog.as_ref())
                        .await;
                let dest = pack.result_dir(self.output_root());
                downloaded_images = downloader
                    .download_for_pack(pack, &dest, &urls, self.options.max_images)
                    .await;
            }
        }

        Ok(PackOutcome::Done {
            result_path,
            reports,
            failed_sections: failed,
            downloaded_images,
            generation_calls: runner.calls(),
        })
    }
}
