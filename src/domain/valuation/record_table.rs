use super::transaction::{
    BOOLEAN_FIELDS, CATEGORICAL_FIELDS, NUMERIC_FIELDS, SALE_DATE_FIELD, TARGET_FIELD,
    TransactionRecord,
};

/// Raw tabular input as handed over by the data source.
///
/// Cells are kept as text so that typing happens in one place (the feature
/// builder). Empty cells and cells past the end of a short row read as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    /// Builds a table with the full logical schema from typed records.
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let headers: Vec<String> = NUMERIC_FIELDS
            .iter()
            .chain(BOOLEAN_FIELDS)
            .chain(CATEGORICAL_FIELDS)
            .chain([TARGET_FIELD, SALE_DATE_FIELD].iter())
            .map(|f| f.to_string())
            .collect();

        let rows = records
            .iter()
            .map(|r| {
                let mut row = Vec::with_capacity(headers.len());
                for field in NUMERIC_FIELDS {
                    row.push(r.numeric(field).map(|v| v.to_string()).unwrap_or_default());
                }
                for field in BOOLEAN_FIELDS {
                    row.push(r.boolean(field).map(|v| v.to_string()).unwrap_or_default());
                }
                for field in CATEGORICAL_FIELDS {
                    row.push(r.categorical(field).unwrap_or_default().to_string());
                }
                row.push(r.price.map(|v| v.to_string()).unwrap_or_default());
                row.push(
                    r.sale_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                );
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Required fields absent from the header, in the order given.
    pub fn missing_fields<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|f| self.column_index(f).is_none())
            .map(str::to_string)
            .collect()
    }

    /// Trimmed cell content, `None` when empty.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }
}
