use crate::schema::RowError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialInsightsError {
    #[error("CSV file must contain at least a header and one data row")]
    EmptyOrHeaderOnly,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("At least {required} months of data are required for forecasting, found {found} valid rows")]
    InsufficientData {
        found: usize,
        required: usize,
        row_errors: Vec<RowError>,
    },

    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("Insights provider failed: {0}")]
    InsightsUnavailable(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export buffer was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl FinancialInsightsError {
    /// Whether the whole input was rejected by validation (as opposed to an
    /// I/O or configuration failure).
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyOrHeaderOnly | Self::MissingColumns(_) | Self::InsufficientData { .. }
        )
    }

    /// Flattened list of messages for display. For `InsufficientData` the
    /// headline comes first, followed by the rows that were dropped.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::InsufficientData { row_errors, .. } => std::iter::once(self.to_string())
                .chain(row_errors.iter().map(ToString::to_string))
                .collect(),
            _ => vec![self.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, FinancialInsightsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_every_column() {
        let err = FinancialInsightsError::MissingColumns(vec![
            "cash_flow".to_string(),
            "category".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required columns: cash_flow, category"
        );
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_insufficient_data_messages_include_row_errors() {
        let err = FinancialInsightsError::InsufficientData {
            found: 2,
            required: 3,
            row_errors: vec![RowError::IncompleteRow { line: 3 }],
        };
        let messages = err.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("At least 3 months"));
        assert_eq!(messages[1], "Row 3: Incomplete data");
    }

    #[test]
    fn test_config_error_is_not_validation_failure() {
        let err = FinancialInsightsError::InvalidConfig("alpha".to_string());
        assert!(!err.is_validation_failure());
    }
}
