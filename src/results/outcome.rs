use super::result_set::ResultSet;
use super::row::CustomDbRow;

/// Everything a request produced, in the order the protocol emitted it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOutcome {
    pub result_sets: Vec<ResultSet>,
}

impl RequestOutcome {
    #[must_use]
    pub fn new(result_sets: Vec<ResultSet>) -> Self {
        Self { result_sets }
    }

    /// Rows of the only result set; `None` unless exactly one set was produced.
    #[must_use]
    pub fn recordset(&self) -> Option<&[CustomDbRow]> {
        self.single().map(|rs| rs.rows.as_slice())
    }

    /// Affected-row count of the only result set; `None` unless exactly one
    /// set was produced.
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.single().map(|rs| rs.rows_affected)
    }

    fn single(&self) -> Option<&ResultSet> {
        match self.result_sets.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}
