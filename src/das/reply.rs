//! Raw replies and the header-row reshape used for tabular queries
//!
//! The terminal never declares a column count. A table's width is taken from
//! its header row and every following row is fitted to it:
//!
//! ```text
//! #POS                         <- marker line, skipped
//! symb qty avgcost notes       <- header, width 4
//! FLD -300 2.41 opened at bell <- 7 tokens: tail re-joined into `notes`
//! GLTO -100 1.05               <- 3 tokens: free-text `notes` left empty
//! SSKN                         <- 1 token: Reshape error, row skipped
//! #POSEND
//! ```
//!
//! When a reply arrives on a single line the header is the leading run of
//! tokens that name a known column, and the tokens after it are chunked by
//! the header width:
//!
//! ```text
//! id symb shares route notes 881 FLD 300 TESTSL Accepted
//! ^^^^^^^^^^^^^^^^^^^^^^^^^^ header, width 5
//! ```

use tracing::warn;

use crate::common::errors::ClientError;

/// Bytes accumulated by one settle-and-drain cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    raw: String,
}

impl Reply {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            raw: String::from_utf8_lossy(bytes).trim().to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Whitespace-split fields across the whole reply
    pub fn tokens(&self) -> Vec<&str> {
        self.raw.split_whitespace().collect()
    }

    /// Non-blank lines, trimmed
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.raw.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Lines whose first token equals `tag` (e.g. `%ORDER`)
    pub fn tagged_lines<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = Vec<&'a str>> + 'a {
        self.lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
            .filter(move |t| t.first().map(|f| f.eq_ignore_ascii_case(tag)).unwrap_or(false))
    }

    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.raw.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Reshape into a header-keyed table
    ///
    /// Without known columns a single-line reply is read as a bare header.
    pub fn table(&self) -> Table {
        Table::reshape(self, &[])
    }

    /// Reshape, recognising `columns` as header names on single-line replies
    pub fn table_with(&self, columns: &[&[&str]]) -> Table {
        Table::reshape(self, columns)
    }
}

/// A row that did not fit the header width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub expected: usize,
    pub found: usize,
    pub row: String,
}

impl From<&SkippedRow> for ClientError {
    fn from(skipped: &SkippedRow) -> Self {
        ClientError::Reshape {
            expected: skipped.expected,
            found: skipped.found,
            row: skipped.row.clone(),
        }
    }
}

/// A reshaped reply: header names plus rows of equal width
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    skipped: Vec<SkippedRow>,
}

impl Table {
    pub fn reshape(reply: &Reply, columns: &[&[&str]]) -> Self {
        let lines: Vec<&str> = reply.lines().filter(|l| !l.starts_with('#')).collect();
        let Some((header_line, body)) = lines.split_first() else {
            return Table::default();
        };
        let headers: Vec<String> = header_line
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let width = headers.len();
        let mut table = Table {
            headers,
            rows: Vec::new(),
            skipped: Vec::new(),
        };

        if body.is_empty() {
            table.reshape_flat(columns);
        } else {
            for line in body {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                table.push_row(width, &tokens, line);
            }
        }

        for skipped in &table.skipped {
            warn!("Skipping malformed row: {}", ClientError::from(skipped));
        }
        table
    }

    /// Single-line reply: header and data share one line
    fn reshape_flat(&mut self, columns: &[&[&str]]) {
        let rest = self.headers.split_off(flat_header_width(&self.headers, columns));
        let width = self.headers.len();
        if width == 0 {
            return;
        }
        for chunk in rest.chunks(width) {
            if chunk.len() == width {
                self.rows.push(chunk.to_vec());
            } else {
                self.skipped.push(SkippedRow {
                    expected: width,
                    found: chunk.len(),
                    row: chunk.join(" "),
                });
            }
        }
    }

    fn push_row(&mut self, width: usize, tokens: &[&str], line: &str) {
        if width == 0 {
            return;
        }
        let row = if tokens.len() >= width {
            let mut row: Vec<String> = tokens[..width - 1].iter().map(|t| t.to_string()).collect();
            row.push(tokens[width - 1..].join(" "));
            row
        } else if tokens.len() + 1 == width {
            let mut row: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
            row.push(String::new());
            row
        } else {
            self.skipped.push(SkippedRow {
                expected: width,
                found: tokens.len(),
                row: line.to_string(),
            });
            return;
        };
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that failed to fit the header
    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    /// Index of the first header matching any alias, case-insensitively
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            table: self,
            cells,
        })
    }
}

/// Header width for a single-line reply: the first token that names none of
/// `columns` starts the data
fn flat_header_width(tokens: &[String], columns: &[&[&str]]) -> usize {
    if columns.is_empty() {
        return tokens.len();
    }
    tokens
        .iter()
        .position(|t| {
            !columns
                .iter()
                .any(|aliases| aliases.iter().any(|a| t.eq_ignore_ascii_case(a)))
        })
        .unwrap_or(tokens.len())
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, aliases: &[&str]) -> Option<&'a str> {
        self.table
            .column(aliases)
            .and_then(|idx| self.cells.get(idx))
            .map(String::as_str)
    }

    pub fn cells(&self) -> &'a [String] {
        self.cells
    }
}
