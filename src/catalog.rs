//! Product spreadsheet input.
//!
//! Row order defines the pack ordinal: data row 1 feeds pack `001-*`.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Accepted headers for the product name column (case-insensitive).
pub const PRODUCT_COLUMNS: &[&str] = &[
    "produto",
    "product",
    "product_name",
    "title",
    "nome",
    "nome_produto",
];

/// Accepted headers for the `;`-separated image URL column.
pub const URL_COLUMNS: &[&str] = &["shopee_image_urls", "image_urls", "urls", "links"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub ordinal: usize,
    /// `None` when the row has no product name.
    pub product: Option<String>,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    source: PathBuf,
    headers: Vec<String>,
    has_product_column: bool,
    rows: Vec<CatalogRow>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingCsv {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(file, path)
    }

    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| Error::csv(source, e))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let product_idx = find_column(&headers, PRODUCT_COLUMNS);
        let urls_idx = find_column(&headers, URL_COLUMNS);

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| Error::csv(source, e))?;
            let product = product_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            let image_urls = urls_idx
                .and_then(|idx| record.get(idx))
                .map(split_urls)
                .unwrap_or_default();
            rows.push(CatalogRow {
                ordinal: i + 1,
                product,
                image_urls,
            });
        }

        if rows.is_empty() {
            return Err(Error::EmptyCsv {
                path: source.to_path_buf(),
            });
        }

        Ok(Self {
            source: source.to_path_buf(),
            headers,
            has_product_column: product_idx.is_some(),
            rows,
        })
    }

    /// Errors unless one of [`PRODUCT_COLUMNS`] is present.
    pub fn require_products(&self) -> Result<()> {
        if self.has_product_column {
            Ok(())
        } else {
            Err(Error::MissingProductColumn {
                headers: self.headers.clone(),
            })
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    /// Image URLs for the pack with this ordinal; empty when out of range.
    pub fn image_urls(&self, ordinal: usize) -> &[String] {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .map(|row| row.image_urls.as_slice())
            .unwrap_or(&[])
    }
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|cand| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(cand))
    })
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Catalog> {
        Catalog::from_reader(text.as_bytes(), Path::new("batch_items.csv"))
    }

    #[test]
    fn reads_products_and_urls_by_alias() {
        let cat = parse(
            "\u{feff}Product_Name,image_urls\n\
             Mouse sem fio,https://a/1.jpg; https://a/2.jpg\n\
             ,\n\
             Copo térmico,\n",
        )
        .unwrap();
        cat.require_products().unwrap();

        let rows = cat.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].product.as_deref(), Some("Mouse sem fio"));
        assert_eq!(rows[0].image_urls, vec!["https://a/1.jpg", "https://a/2.jpg"]);
        assert_eq!(rows[1].product, None);
        assert_eq!(rows[2].ordinal, 3);
        assert!(rows[2].image_urls.is_empty());
    }

    #[test]
    fn image_urls_are_indexed_by_ordinal() {
        let mut text = String::from("produto,shopee_image_urls\n");
        for i in 1..=8 {
            text.push_str(&format!("item {i},https://img/{i}.jpg\n"));
        }
        let cat = parse(&text).unwrap();
        assert_eq!(cat.image_urls(7), ["https://img/7.jpg".to_string()]);
        assert!(cat.image_urls(0).is_empty());
        assert!(cat.image_urls(99).is_empty());
    }

    #[test]
    fn missing_product_column_is_reported() {
        let cat = parse("sku,urls\nA1,https://x\n").unwrap();
        let err = cat.require_products().unwrap_err();
        assert!(matches!(err, Error::MissingProductColumn { .. }));
        assert_eq!(cat.image_urls(1), ["https://x".to_string()]);
    }

    #[test]
    fn header_only_csv_is_empty() {
        assert!(matches!(parse("produto\n"), Err(Error::EmptyCsv { .. })));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Catalog::load(Path::new("/no/such/batch.csv")).unwrap_err();
        assert!(matches!(err, Error::MissingCsv { .. }));
    }
}
