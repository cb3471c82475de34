//! Tabular input: a header row plus data rows of text cells.

use outreach_core::error::{MappingError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// One data row. `number` is 1-based and excludes the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub number: usize,
    /// Padded to the header width when the source row was short.
    pub cells: Vec<String>,
    /// Cells beyond the header width. Such rows are quarantined at commit.
    #[serde(default)]
    pub overflow: Vec<String>,
    /// Why the source row could not be read as text. Its cells hold a lossy
    /// decoding and the row is quarantined at commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect: Option<String>,
}

impl TableRow {
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Build from already-split rows. Headers are cleaned: trimmed, blanks
    /// named `column_N`, repeats suffixed ` (2)`, ` (3)`.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        Self::build(headers, rows.into_iter().map(|cells| (cells, None)).collect())
    }

    fn build(headers: Vec<String>, rows: Vec<(Vec<String>, Option<String>)>) -> Result<Self> {
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(MappingError::EmptyTable.into());
        }
        let headers = clean_headers(headers);
        let width = headers.len();

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, (mut cells, defect))| {
                let overflow = if cells.len() > width {
                    cells.split_off(width)
                } else {
                    cells.resize(width, String::new());
                    Vec::new()
                };
                TableRow {
                    number: i + 1,
                    cells: cells.into_iter().map(|c| c.trim().to_string()).collect(),
                    overflow,
                    defect,
                }
            })
            .collect();

        Ok(Self { headers, rows })
    }

    /// Parse CSV input. Rows may be ragged; blank lines are skipped.
    ///
    /// Only the header row can fail the table. A data row that is not valid
    /// UTF-8 is kept with a `defect` so the commit can quarantine it.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = csv.byte_records();
        let headers = match records.next() {
            Some(first) => {
                let first = first.map_err(|e| MappingError::Malformed(e.to_string()))?;
                let (cells, defect) = decode(&first);
                if let Some(defect) = defect {
                    return Err(MappingError::Malformed(format!("header row: {defect}")).into());
                }
                cells
            }
            None => return Err(MappingError::EmptyTable.into()),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|e| MappingError::Malformed(e.to_string()))?;
            if record.iter().all(|c| c.is_empty()) {
                continue;
            }
            rows.push(decode(&record));
        }
        Self::build(headers, rows)
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Up to `limit` non-empty values from `column`, in row order.
    pub fn samples(&self, column: usize, limit: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.defect.is_none())
            .map(|r| r.cell(column))
            .filter(|c| !c.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cells as text, with the first undecodable cell reported.
fn decode(record: &csv::ByteRecord) -> (Vec<String>, Option<String>) {
    let mut defect = None;
    let cells = record
        .iter()
        .enumerate()
        .map(|(i, bytes)| match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                defect.get_or_insert_with(|| format!("cell {} is not valid UTF-8", i + 1));
                String::from_utf8_lossy(bytes).into_owned()
            }
        })
        .collect();
    (cells, defect)
}

fn clean_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, header) in raw.into_iter().enumerate() {
        let header = header.trim().trim_start_matches('\u{feff}').trim();
        let base = if header.is_empty() {
            format!("column_{}", i + 1)
        } else {
            header.to_string()
        };
        let mut name = base.clone();
        let mut n = 2;
        while out.contains(&name) {
            name = format!("{base} ({n})");
            n += 1;
        }
        out.push(name);
    }
    out
}
