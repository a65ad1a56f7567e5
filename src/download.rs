use crate::catalog::Catalog;
use crate::config::ImageUrlSource;
use crate::pack::{Pack, Section};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const USER_AGENT: &str = "Mozilla/5.0";
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://[^\s)>\]]+").expect("valid regex"));

/// URLs pasted anywhere in `text`.
pub fn urls_in_text(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// Extension from the response Content-Type, then the URL suffix, then `.jpg`.
pub fn pick_extension(url: &str, content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("image/jpeg") | Some("image/jpg") => return ".jpg",
        Some("image/png") => return ".png",
        Some("image/webp") => return ".webp",
        Some("image/gif") => return ".gif",
        _ => {}
    }

    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    for cand in [".jpg", ".jpeg", ".png", ".webp"] {
        if path.ends_with(cand) {
            return cand;
        }
    }
    ".jpg"
}

/// Reference image URLs for one pack, from the spreadsheet row matching the
/// pack ordinal or from the scenes prompt.
pub async fn reference_urls(pack: &Pack, source: ImageUrlSource, catalog: Option<&Catalog>) -> Vec<String> {
    let urls = match source {
        ImageUrlSource::Csv => match (pack.ordinal(), catalog) {
            (Some(ordinal), Some(catalog)) => catalog.image_urls(ordinal).to_vec(),
            _ => Vec::new(),
        },
        ImageUrlSource::Scenes => pack
            .read_prompt(Section::Scenes)
            .await
            .map(|text| urls_in_text(&text))
            .unwrap_or_default(),
    };
    urls.into_iter()
        .filter(|u| u.to_ascii_lowercase().starts_with("http"))
        .collect()
}

pub struct ImageDownloader {
    client: reqwest::Client,
}

impl ImageDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }

    /// Saves `url` at `dest_stem` plus an extension chosen from the response.
    pub async fn download_one(&self, url: &str, dest_stem: &Path) -> Result<PathBuf> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("bad status: {url}"))?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ext = pick_extension(url, content_type.as_deref());
        let bytes = resp.bytes().await.context("failed to read image body")?;

        let file_name = format!(
            "{}{}",
            dest_stem
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ext
        );
        let out_path = dest_stem.with_file_name(file_name);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(&out_path, &bytes)
            .await
            .with_context(|| format!("write image: {}", out_path.display()))?;
        Ok(out_path)
    }

    /// Downloads up to `max_images` of `urls` as `{pack}_img{N}.{ext}` into
    /// `dest_dir`. Failures are logged and skipped.
    pub async fn download_for_pack(
        &self,
        pack: &Pack,
        dest_dir: &Path,
        urls: &[String],
        max_images: usize,
    ) -> Vec<PathBuf> {
        if urls.is_empty() {
            logi(format!("No image URL found for {}", pack.name));
            return Vec::new();
        }

        let mut saved = Vec::new();
        for (i, url) in urls.iter().take(max_images.max(1)).enumerate() {
            let stem = dest_dir.join(format!("{}_img{}", pack.name, i + 1));
            match self.download_one(url, &stem).await {
                Ok(path) => {
                    logok(format!("Downloaded: {}", path.display()));
                    saved.push(path);
                }
                Err(err) => logw(format!("Failed to download {}: {:#}", url, err)),
            }
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_found_in_prompt_text() {
        let text = "Referências:\nhttps://cf.shopee.com.br/file/a.jpg\n(ver http://x.com/b.png) [https://y.io/c]";
        assert_eq!(
            urls_in_text(text),
            vec![
                "https://cf.shopee.com.br/file/a.jpg",
                "http://x.com/b.png",
                "https://y.io/c"
            ]
        );
    }

    #[test]
    fn extension_prefers_content_type() {
        assert_eq!(pick_extension("https://x/a.png", Some("image/webp; q=1")), ".webp");
        assert_eq!(pick_extension("https://x/a.PNG?v=2", None), ".png");
        assert_eq!(pick_extension("https://x/a", Some("application/octet-stream")), ".jpg");
    }

    #[tokio::test]
    async fn scenes_source_reads_prompt_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let pack = Pack::from_dir(tmp.path().join("002-copo")).unwrap();
        fs::create_dir_all(&pack.dir).await.unwrap();
        fs::write(
            pack.prompt_path(Section::Scenes),
            "6 ideias\nhttps://img.example/copo.jpg\nftp://nope",
        )
        .await
        .unwrap();

        let urls = reference_urls(&pack, ImageUrlSource::Scenes, None).await;
        assert_eq!(urls, vec!["https://img.example/copo.jpg"]);
    }

    #[tokio::test]
    async fn csv_source_uses_pack_ordinal() {
        let mut text = String::from("produto,shopee_image_urls\n");
        for i in 1..=7 {
            text.push_str(&format!("p{i},https://img/{i}a.jpg;https://img/{i}b.jpg\n"));
        }
        let catalog = Catalog::from_reader(text.as_bytes(), Path::new("batch.csv")).unwrap();
        let pack = Pack::from_dir("/packs/007-wireless-mouse").unwrap();

        let urls = reference_urls(&pack, ImageUrlSource::Csv, Some(&catalog)).await;
        assert_eq!(urls, vec!["https://img/7a.jpg", "https://img/7b.jpg"]);
    }

    #[tokio::test]
    async fn unreachable_urls_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let pack = Pack::from_dir(tmp.path().join("001-x")).unwrap();
        let downloader = ImageDownloader::new().unwrap();
        let saved = downloader
            .download_for_pack(&pack, tmp.path(), &["http://127.0.0.1:1/a.jpg".to_string()], 1)
            .await;
        assert!(saved.is_empty());
    }
}
