pub mod io;

pub use io::{read_table, write_empty, write_table, Dialect};

/// One delimited line, one `String` per field.
pub type Row = Vec<String>;

/// A delimited file held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, from the first line of the file.
    pub headers: Row,
    /// Every line after the header, in file order.
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Row, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// A table with the given header and no data rows.
    pub fn with_headers(headers: Row) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        column_index(&self.headers, name)
    }
}

/// Find `name` among `headers`, ignoring case and surrounding whitespace.
///
/// Duplicate names are not rejected: the first matching column wins.
pub fn column_index(headers: &[String], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == wanted)
}

/// The cell at `idx`, or `""` when the row is shorter than the header.
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}
