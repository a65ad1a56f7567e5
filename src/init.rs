use crate::error::{Error, Result};
use crate::logi;
use std::path::{Path, PathBuf};
use tokio::fs;

const REQUIRED_DIRS: &[&str] = &["data", "guides", "outputs", "outputs/prompt_packs"];

/// Creates the default working folders under `base`, plus any `extra` roots.
/// Returns the directories that did not exist before.
pub async fn ensure_directories(base: &Path, extra: &[&Path]) -> Result<Vec<PathBuf>> {
    let dirs = REQUIRED_DIRS
        .iter()
        .map(|d| base.join(d))
        .chain(extra.iter().map(|p| p.to_path_buf()));

    let mut created = Vec::new();
    for dir in dirs {
        if dir.is_dir() {
            continue;
        }
        fs::create_dir_all(&dir).await.map_err(|e| Error::io(&dir, e))?;
        logi(format!("Created directory: {}", dir.display()));
        created.push(dir);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_dirs_once() {
        let tmp = tempfile::tempdir().unwrap();
        let finals = tmp.path().join("finais");

        let created = ensure_directories(tmp.path(), &[finals.as_path()]).await.unwrap();
        assert_eq!(created.len(), 5);
        assert!(tmp.path().join("outputs/prompt_packs").is_dir());
        assert!(finals.is_dir());

        let again = ensure_directories(tmp.path(), &[finals.as_path()]).await.unwrap();
        assert!(again.is_empty());
    }
}
