//! Rule-based supplier scoring
//!
//! Suppliers arrive as a CSV dataset. Each row is classified by its category
//! and scored inside the bucket for that class:
//!
//! | Class | Score range |
//! |---|---|
//! | electronics / software / tech | 70–95 |
//! | home appliances / related services | 50–70 |
//! | everything else | 10–40 |
//!
//! Downstream consumers rank by class, so the bucket bounds are fixed. The
//! position inside a bucket is a stable hash of supplier and category, so the
//! same row always gets the same score.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FieldViolation, GenflowError, GenflowResult};

const TECH_KEYWORDS: &[&str] = &[
    "electronic", "software", "tech", "semiconductor", "chip", "computer", "digital",
    "电子", "软件", "科技", "技术", "芯片", "半导体", "计算机", "数码", "信息",
];

const APPLIANCE_KEYWORDS: &[&str] = &[
    "appliance", "household", "home", "repair", "maintenance", "installation",
    "家电", "电器", "家居", "维修", "安装", "售后",
];

const SUPPLIER_COLUMNS: &[&str] = &["supplier", "name", "供应商", "供应商名称"];
const CATEGORY_COLUMNS: &[&str] = &["category", "industry", "类别", "品类", "行业"];
const PRODUCT_COLUMNS: &[&str] = &["product", "products", "产品", "主营产品"];
const DATE_COLUMNS: &[&str] = &["date", "updated", "日期", "合作日期", "更新日期"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryClass {
    Technology,
    Appliances,
    Other,
}

impl CategoryClass {
    pub fn classify(category: &str) -> Self {
        let category = category.to_lowercase();
        if TECH_KEYWORDS.iter().any(|k| category.contains(k)) {
            Self::Technology
        } else if APPLIANCE_KEYWORDS.iter().any(|k| category.contains(k)) {
            Self::Appliances
        } else {
            Self::Other
        }
    }

    /// Inclusive score bounds for the class
    pub fn score_range(self) -> (u8, u8) {
        match self {
            Self::Technology => (70, 95),
            Self::Appliances => (50, 70),
            Self::Other => (10, 40),
        }
    }

    pub fn contains(self, score: u8) -> bool {
        let (lo, hi) = self.score_range();
        (lo..=hi).contains(&score)
    }
}

/// One row of the supplied dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRow {
    pub supplier: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A dataset row enriched with its match score and normalized date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub supplier: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub score: u8,
    /// `YYYY-MM-DD`, `None` when the source date was absent or unreadable
    pub date: Option<String>,
}

/// Deterministic score for a supplier within its category bucket
pub fn score(supplier: &str, category: &str) -> u8 {
    let (lo, hi) = CategoryClass::classify(category).score_range();
    let digest = Sha256::digest(format!("{}\u{1f}{}", supplier.trim(), category.trim()).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let span = u64::from(hi - lo) + 1;
    lo + (u64::from_be_bytes(head) % span) as u8
}

/// Normalize the date spellings found in supplier sheets to `YYYY-MM-DD`
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        let dashed = format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..]);
        return NaiveDate::parse_from_str(&dashed, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m-%d").to_string());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive().format("%Y-%m-%d").to_string());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date().format("%Y-%m-%d").to_string());
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    None
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}').to_lowercase();
        aliases.iter().any(|a| h == *a)
    })
}

fn dataset_error(reason: impl Into<String>) -> GenflowError {
    GenflowError::SchemaValidation(vec![FieldViolation::new("dataset", reason)])
}

/// Parse a CSV dataset with a header row
///
/// Supplier and category columns are required; product and date are picked
/// up when present. Blank lines and rows without a supplier are skipped.
pub fn parse_dataset(csv_text: &str) -> GenflowResult<Vec<SupplierRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| dataset_error(format!("unreadable header row: {}", e)))?
        .clone();

    let supplier_col = find_column(&headers, SUPPLIER_COLUMNS)
        .ok_or_else(|| dataset_error("missing supplier column"))?;
    let category_col = find_column(&headers, CATEGORY_COLUMNS)
        .ok_or_else(|| dataset_error("missing category column"))?;
    let product_col = find_column(&headers, PRODUCT_COLUMNS);
    let date_col = find_column(&headers, DATE_COLUMNS);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| dataset_error(format!("row {}: {}", line + 1, e)))?;

        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };

        let Some(supplier) = cell(Some(supplier_col)) else {
            continue;
        };

        rows.push(SupplierRow {
            supplier,
            category: cell(Some(category_col)).unwrap_or_default(),
            product: cell(product_col),
            date: cell(date_col),
        });
    }

    Ok(rows)
}

/// Score every row with the rule table, best matches first
pub fn score_rows(rows: Vec<SupplierRow>) -> Vec<SupplierRecord> {
    let mut records: Vec<SupplierRecord> = rows
        .into_iter()
        .map(|row| SupplierRecord {
            score: score(&row.supplier, &row.category),
            date: row.date.as_deref().and_then(normalize_date),
            supplier: row.supplier,
            category: row.category,
            product: row.product,
        })
        .collect();

    records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.supplier.cmp(&b.supplier)));
    records
}
