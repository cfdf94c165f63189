use crate::error::{FinancialInsightsError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column names every input file must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 5] = ["timestamp", "revenue", "expenses", "cash_flow", "category"];

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// One reporting period (nominally a month) for one category-tagged line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialRecord {
    #[schemars(description = "Start or reference date of the reporting period")]
    pub timestamp: NaiveDate,

    #[schemars(description = "Revenue booked in the period. Never negative.")]
    pub revenue: f64,

    #[schemars(description = "Expenses booked in the period. Never negative.")]
    pub expenses: f64,

    #[schemars(description = "Net cash movement for the period. May be negative.")]
    pub cash_flow: f64,

    #[schemars(description = "Free-text category, 'Uncategorized' when the source cell was blank")]
    pub category: String,
}

impl FinancialRecord {
    pub fn new(
        timestamp: NaiveDate,
        revenue: f64,
        expenses: f64,
        cash_flow: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            revenue,
            expenses,
            cash_flow,
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Copied verbatim from the validated input
    Historical,
    /// Projected by the forecast engine
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastPoint {
    pub timestamp: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
    pub cash_flow: f64,
    #[serde(rename = "type")]
    pub kind: RecordKind,
}

impl ForecastPoint {
    pub fn historical(record: &FinancialRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            revenue: record.revenue,
            expenses: record.expenses,
            cash_flow: record.cash_flow,
            kind: RecordKind::Historical,
        }
    }

    pub fn is_forecast(&self) -> bool {
        self.kind == RecordKind::Forecast
    }
}

/// Selects one of the three numeric series carried by records and forecast points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeriesField {
    Revenue,
    Expenses,
    CashFlow,
}

impl SeriesField {
    pub const ALL: [SeriesField; 3] = [Self::Revenue, Self::Expenses, Self::CashFlow];

    pub fn of_record(self, record: &FinancialRecord) -> f64 {
        match self {
            Self::Revenue => record.revenue,
            Self::Expenses => record.expenses,
            Self::CashFlow => record.cash_flow,
        }
    }

    pub fn of_point(self, point: &ForecastPoint) -> f64 {
        match self {
            Self::Revenue => point.revenue,
            Self::Expenses => point.expenses,
            Self::CashFlow => point.cash_flow,
        }
    }

    /// Revenue and expenses cannot go below zero; cash flow can.
    pub fn is_non_negative(self) -> bool {
        !matches!(self, Self::CashFlow)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
    pub average_cash_flow: f64,
    #[schemars(description = "Mean expenses over the trailing burn-rate window")]
    pub burn_rate: f64,
    #[schemars(
        description = "Total revenue divided by burn rate when average cash flow is positive, otherwise 0"
    )]
    pub runway: f64,
    #[schemars(description = "Percentage change of mean revenue from the first to the second half")]
    pub revenue_growth: f64,
    #[schemars(description = "Percentage change of mean expenses from the first to the second half")]
    pub expense_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryBreakdown {
    pub category: String,
    pub revenue: f64,
    pub expenses: f64,
    pub count: usize,
}

/// A row that was dropped during validation. Line numbers count data rows,
/// starting at 1 for the line immediately after the header.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("Row {line}: Incomplete data")]
    IncompleteRow { line: usize },

    #[error("Row {line}: Invalid timestamp format '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("Row {line}: Invalid numeric values ({field} = '{value}')")]
    InvalidNumeric {
        line: usize,
        field: String,
        value: String,
    },

    #[error("Row {line}: Revenue and expenses cannot be negative ({field} = {value})")]
    NegativeValue {
        line: usize,
        field: String,
        value: f64,
    },

    #[error("Row {line}: Future dates are not allowed ({date})")]
    FutureDate { line: usize, date: NaiveDate },
}

impl RowError {
    pub fn line(&self) -> usize {
        match self {
            Self::IncompleteRow { line }
            | Self::InvalidTimestamp { line, .. }
            | Self::InvalidNumeric { line, .. }
            | Self::NegativeValue { line, .. }
            | Self::FutureDate { line, .. } => *line,
        }
    }
}

/// Successful parser output: sorted records plus the rows that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedDataset {
    pub records: Vec<FinancialRecord>,
    #[serde(default)]
    pub warnings: Vec<RowError>,
}

impl ParsedDataset {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalysisConfig {
    #[schemars(description = "Number of monthly periods to project past the last record")]
    pub forecast_months: usize,

    #[schemars(description = "Exponential smoothing factor applied before trend fitting, in (0, 1]")]
    pub smoothing_alpha: f64,

    #[schemars(description = "Number of trailing periods averaged into the burn rate")]
    pub burn_rate_window: usize,

    #[schemars(description = "Minimum number of valid rows before an input is accepted (at least 3)")]
    pub min_records: usize,

    #[schemars(description = "Historical points above which chart series are downsampled")]
    pub historical_display_threshold: usize,

    #[schemars(description = "Forecast points above which chart series are downsampled")]
    pub forecast_display_threshold: usize,

    #[schemars(description = "Rows shown in the plain-text report table")]
    pub report_row_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            forecast_months: 6,
            smoothing_alpha: crate::forecast::DEFAULT_SMOOTHING_ALPHA,
            burn_rate_window: crate::metrics::DEFAULT_BURN_RATE_WINDOW,
            min_records: crate::ingestion::MIN_VALID_RECORDS,
            historical_display_threshold: 300,
            forecast_display_threshold: 100,
            report_row_limit: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast_months == 0 {
            return Err(FinancialInsightsError::InvalidConfig(
                "forecast_months must be at least 1".to_string(),
            ));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(FinancialInsightsError::InvalidConfig(format!(
                "smoothing_alpha {} must be in (0, 1]",
                self.smoothing_alpha
            )));
        }
        if self.burn_rate_window == 0 {
            return Err(FinancialInsightsError::InvalidConfig(
                "burn_rate_window must be at least 1".to_string(),
            ));
        }
        if self.min_records < crate::ingestion::MIN_VALID_RECORDS {
            return Err(FinancialInsightsError::InvalidConfig(format!(
                "min_records {} is below the minimum of {}",
                self.min_records,
                crate::ingestion::MIN_VALID_RECORDS
            )));
        }
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisConfig)
    }
}
