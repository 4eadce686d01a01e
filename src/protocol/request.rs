use crate::types::Parameter;

/// How a request is submitted to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Submission {
    /// Plain SQL text.
    #[default]
    Sql,
    /// `sql` names a stored procedure; parameters are its arguments.
    Procedure,
}

/// A request bound to SQL text (or a procedure name) and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolRequest {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

impl ProtocolRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Register the next parameter; order is preserved.
    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }
}
