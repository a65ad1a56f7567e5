//! Moves finished results and downloaded images into one folder per pack.

use crate::config::OrganizeOptions;
use crate::error::{Error, Result};
use crate::pack::{self, Pack, RESULT_FILE};
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};
use tokio::fs;

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const MAX_IMAGE_INDEX: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub results_moved: usize,
    pub images_moved: usize,
    pub failures: usize,
}

/// Renames `src` to `dst`, copying across filesystems when a plain rename fails.
pub async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    if fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).await.map_err(|e| Error::io(dst, e))?;
    fs::remove_file(src).await.map_err(|e| Error::io(src, e))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

struct Layout {
    flat_root: PathBuf,
    per_pack: PathBuf,
    images: PathBuf,
}

fn layout(pack: &Pack, options: &OrganizeOptions) -> Layout {
    let (flat_root, per_pack) = match &options.final_root {
        Some(root) => (root.clone(), root.join(&pack.name)),
        None => (pack.dir.clone(), pack.dir.clone()),
    };
    let images = match options.images_subdir.as_deref().filter(|s| !s.is_empty()) {
        Some(sub) => per_pack.join(sub),
        None => per_pack.clone(),
    };
    Layout {
        flat_root,
        per_pack,
        images,
    }
}

async fn tracked_move(src: &Path, dst: &Path, summary: &mut OrganizeSummary) -> bool {
    match move_file(src, dst).await {
        Ok(()) => {
            logok(format!("moved: {} -> {}", src.display(), dst.display()));
            true
        }
        Err(err) => {
            logw(format!("failed to move {}: {}", src.display(), err));
            summary.failures += 1;
            false
        }
    }
}

async fn organize_pack(pack: &Pack, options: &OrganizeOptions, summary: &mut OrganizeSummary) {
    let Layout {
        flat_root,
        per_pack,
        images,
    } = layout(pack, options);

    let candidates = [flat_root.join(format!("{}.txt", pack.name)), pack.dir.join(RESULT_FILE)];
    match candidates.iter().find(|c| c.is_file()) {
        Some(src) => {
            let dst = per_pack.join(RESULT_FILE);
            if !same_file(src, &dst) && tracked_move(src, &dst, summary).await {
                summary.results_moved += 1;
            }
        }
        None => logi(format!("{}: no consolidated result to move", pack.name)),
    }

    let mut moved_any = false;
    for ext in IMAGE_EXTS {
        for i in 1..=MAX_IMAGE_INDEX {
            let src = flat_root.join(format!("{}_img{}.{}", pack.name, i, ext));
            if !src.is_file() {
                continue;
            }
            let dst_name = match options.rename_first.as_deref().filter(|s| !s.is_empty()) {
                Some(stem) if i == 1 => format!("{stem}.{ext}"),
                _ => format!("{}_img{}.{}", pack.name, i, ext),
            };
            let dst = images.join(dst_name);
            if same_file(&src, &dst) {
                continue;
            }
            if tracked_move(&src, &dst, summary).await {
                summary.images_moved += 1;
                moved_any = true;
            }
        }
    }
    if !moved_any {
        logi(format!("{}: no *_imgN image to move", pack.name));
    }
}

pub async fn organize(options: &OrganizeOptions) -> Result<OrganizeSummary> {
    if let Some(root) = &options.final_root {
        if !root.is_dir() {
            return Err(Error::config(format!("final root not found: {}", root.display())));
        }
    }
    let packs = pack::list_packs(&options.packs_root)?;
    if packs.is_empty() {
        return Err(Error::NoPacks {
            path: options.packs_root.clone(),
        });
    }

    let mut summary = OrganizeSummary::default();
    for pack in &packs {
        organize_pack(pack, options, &mut summary).await;
    }
    logi(format!(
        "Organize done. Results moved: {}, images moved: {}",
        summary.results_moved, summary.images_moved
    ));
    Ok(summary)
}
