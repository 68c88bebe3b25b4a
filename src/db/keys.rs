//! Generated key holder.

/// Receives the keys an insert generated.
///
/// The caller names the key columns it expects up front; the executor fills
/// in one `(column, key)` pair per column once the insert has committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedKeyHolder {
    requested: Vec<String>,
    keys: Vec<(String, i64)>,
}

impl GeneratedKeyHolder {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requested: columns.into_iter().map(Into::into).collect(),
            keys: Vec::new(),
        }
    }

    /// Holder for the usual single generated id column.
    pub fn for_column(column: impl Into<String>) -> Self {
        Self::new([column])
    }

    pub fn requested_columns(&self) -> &[String] {
        &self.requested
    }

    pub fn add_key(&mut self, column: impl Into<String>, key: i64) {
        self.keys.push((column.into(), key));
    }

    /// Key recorded for `column` (case-insensitive).
    pub fn key(&self, column: &str) -> Option<i64> {
        self.keys
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, key)| *key)
    }

    pub fn first_key(&self) -> Option<i64> {
        self.keys.first().map(|(_, key)| *key)
    }

    pub fn keys(&self) -> &[(String, i64)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
