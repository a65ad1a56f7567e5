//! Spreadsheet to prompt packs.

use crate::catalog::Catalog;
use crate::config::PackGenOptions;
use crate::error::{Error, Result};
use crate::pack::{self, Pack};
use crate::templates::render_pack_prompts;
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackGenSummary {
    pub created: Vec<Pack>,
    /// Ordinals of rows without a product name.
    pub skipped_rows: Vec<usize>,
    pub guide_used: Option<PathBuf>,
}

/// The guide as given, or the same file name under `guides/`.
pub fn resolve_guide(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let alt = Path::new("guides").join(path.file_name()?);
    alt.is_file().then_some(alt)
}

async fn load_guide(options: &PackGenOptions) -> Result<Option<(PathBuf, String)>> {
    let Some(wanted) = options.guide_path.as_deref() else {
        return Ok(None);
    };
    match resolve_guide(wanted) {
        Some(path) => {
            let text = pack::read_text(&path).await.unwrap_or_default();
            Ok(Some((path, text)))
        }
        None if options.guide_required => Err(Error::MissingGuide {
            path: wanted.to_path_buf(),
        }),
        None => {
            logi(format!("Guide not found ({}), packs get no context", wanted.display()));
            Ok(None)
        }
    }
}

/// Writes one pack per named spreadsheet row into `packs_root`.
pub async fn generate_packs(options: &PackGenOptions) -> Result<PackGenSummary> {
    let catalog = Catalog::load(&options.csv_path)?;
    catalog.require_products()?;
    let guide = load_guide(options).await?;

    fs::create_dir_all(&options.packs_root)
        .await
        .map_err(|e| Error::io(&options.packs_root, e))?;

    let guide_text = guide.as_ref().map(|(_, text)| text.as_str());
    let mut summary = PackGenSummary {
        guide_used: guide.as_ref().map(|(path, _)| path.clone()),
        ..PackGenSummary::default()
    };

    for row in catalog.rows() {
        let Some(product) = row.product.as_deref() else {
            logw(format!("[{:03}] skipped: no product name", row.ordinal));
            summary.skipped_rows.push(row.ordinal);
            continue;
        };
        let prompts = render_pack_prompts(product, &row.image_urls, guide_text);
        let pack = pack::write_pack(&options.packs_root, row.ordinal, product, &prompts).await?;
        logok(format!("[{:03}] pack created: {}", row.ordinal, pack.name));
        summary.created.push(pack);
    }

    if summary.created.is_empty() {
        logw("No pack was created (rows without a product name?)");
    } else {
        logi(format!(
            "{} pack(s) created in {}",
            summary.created.len(),
            options.packs_root.display()
        ));
    }
    Ok(summary)
}
