//! `index.csv` summary of every processed pack.

use crate::error::{Error, Result};
use crate::pack::{self, Pack, Section};
use crate::scenes::extract_section;
use crate::validate::extract_hashtags;
use crate::{logi, logok};
use chrono::{DateTime, Local};
use std::path::Path;

pub const INDEX_HEADERS: [&str; 5] = [
    "produto",
    "roteiro_primeira_linha",
    "qtd_hashtags",
    "caminho_resultado",
    "gerado_em",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub product: String,
    pub first_script_line: String,
    pub hashtags: usize,
    pub result_path: String,
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Section text from the `RESPOSTA_*` file, or from the consolidated result
/// when only the final file was kept.
async fn section_text(pack: &Pack, consolidated: Option<&str>, section: Section) -> Option<String> {
    if let Some(text) = pack.read_response(section).await {
        return Some(text);
    }
    let title = section.heading().split(' ').next().unwrap_or_default();
    consolidated
        .and_then(|text| extract_section(text, title))
        .map(str::to_string)
}

pub async fn index_row(pack: &Pack, output_root: Option<&Path>) -> IndexRow {
    let result_path = pack.result_path(output_root);
    let consolidated = pack::read_text(&result_path).await;

    let script = section_text(pack, consolidated.as_deref(), Section::Script).await;
    let description = section_text(pack, consolidated.as_deref(), Section::Description).await;

    IndexRow {
        product: pack.name.clone(),
        first_script_line: script.as_deref().map(first_line).unwrap_or_default(),
        hashtags: description
            .as_deref()
            .map(|d| extract_hashtags(d).len())
            .unwrap_or(0),
        result_path: result_path.to_string_lossy().replace('\\', "/"),
    }
}

pub fn write_index(path: &Path, rows: &[IndexRow], generated_at: DateTime<Local>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;
    writer
        .write_record(INDEX_HEADERS)
        .map_err(|e| Error::csv(path, e))?;

    let stamp = generated_at.format("%Y-%m-%d %H:%M:%S").to_string();
    for row in rows {
        let hashtags = row.hashtags.to_string();
        writer
            .write_record([
                row.product.as_str(),
                row.first_script_line.as_str(),
                hashtags.as_str(),
                row.result_path.as_str(),
                stamp.as_str(),
            ])
            .map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

/// Builds and writes the index for every pack under `packs_root`.
pub async fn export_index(packs_root: &Path, output_root: Option<&Path>, out: &Path) -> Result<Vec<IndexRow>> {
    let packs = pack::list_packs(packs_root)?;
    if packs.is_empty() {
        return Err(Error::NoPacks {
            path: packs_root.to_path_buf(),
        });
    }

    let mut rows = Vec::with_capacity(packs.len());
    for pack in &packs {
        let row = index_row(pack, output_root).await;
        logi(format!("{}: {} hashtags", row.product, row.hashtags));
        rows.push(row);
    }
    write_index(out, &rows, Local::now())?;
    logok(format!("Index written: {}", out.display()));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::fs;

    #[tokio::test]
    async fn rows_prefer_responses_then_consolidated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("packs");

        let a = Pack::from_dir(root.join("001-a")).unwrap();
        fs::create_dir_all(&a.dir).await.unwrap();
        fs::write(a.response_path(Section::Script), "\n  Cansado de fio?\nResto")
            .await
            .unwrap();
        fs::write(a.response_path(Section::Description), "Texto #a #b #A #c")
            .await
            .unwrap();

        let b = Pack::from_dir(root.join("002-b")).unwrap();
        fs::create_dir_all(&b.dir).await.unwrap();
        fs::write(
            b.result_path(None),
            "# 002-b\n\n## ROTEIRO (ChatGPT)\n\nLinha um\n\n## DESCRIÇÃO/HASHTAGS (ChatGPT)\n\n#x #y",
        )
        .await
        .unwrap();

        let out = tmp.path().join("out/index.csv");
        let rows = export_index(&root, None, &out).await.unwrap();

        assert_eq!(rows[0].first_script_line, "Cansado de fio?");
        assert_eq!(rows[0].hashtags, 3);
        assert_eq!(rows[1].first_script_line, "Linha um");
        assert_eq!(rows[1].hashtags, 2);

        let written = fs::read_to_string(&out).await.unwrap();
        assert!(written.starts_with("produto,roteiro_primeira_linha,qtd_hashtags,caminho_resultado,gerado_em\n"));
        assert_eq!(written.lines().count(), 3);
    }

    #[test]
    fn timestamp_is_written_per_row() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("index.csv");
        let when = Local.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let rows = vec![IndexRow {
            product: "001-a".into(),
            first_script_line: "Oi, tudo bem?".into(),
            hashtags: 12,
            result_path: "packs/001-a/RESULTADO_COMPLETO.txt".into(),
        }];
        write_index(&out, &rows, when).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("001-a,\"Oi, tudo bem?\",12,packs/001-a/RESULTADO_COMPLETO.txt,2025-03-01 12:30:00"));
    }
}
