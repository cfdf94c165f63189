//! # Financial Insights
//!
//! Turns a CSV of monthly financial records into validated records, summary
//! metrics, a per-category breakdown, a trend forecast with a backtested
//! accuracy score, and chart-ready series that stay bounded in size.
//!
//! ## Core Concepts
//!
//! - **Validation**: malformed rows are skipped with a warning; missing columns or
//!   too few surviving rows reject the whole input
//! - **Metrics**: totals, burn rate, runway and half-over-half growth
//! - **Forecast**: exponential smoothing followed by a least-squares trend per field
//! - **Backtest**: the forecast is replayed on held-out history to score its accuracy
//! - **Downsampling**: Largest-Triangle-Three-Buckets keeps long series renderable
//!
//! Every operation is a pure function of its inputs; nothing is cached between calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_insights::*;
//!
//! let csv = "timestamp,revenue,expenses,cash_flow,category
//! 2024-01-01,10000,5000,5000,Sales
//! 2024-02-01,12000,6000,6000,Sales
//! 2024-03-01,15000,7000,8000,Marketing
//! 2024-04-01,18000,8000,10000,Sales";
//!
//! let report = analyze_csv(csv).unwrap();
//! assert_eq!(report.metrics.total_revenue, 55000.0);
//! assert_eq!(report.forecast.len(), 4 + 6);
//! ```

pub mod error;
pub mod export;
pub mod forecast;
pub mod ingestion;
pub mod insights;
pub mod metrics;
pub mod sampling;
pub mod schema;
pub mod utils;

pub use error::{FinancialInsightsError, Result};
pub use export::{format_currency, format_percent, records_to_csv, report_table};
pub use forecast::{
    exponential_smoothing, forecast_accuracy, generate_forecast, linear_regression, Forecaster,
    Regression,
};
pub use ingestion::{parse_csv, parse_csv_as_of, CsvValidator};
pub use insights::{
    build_prompt, coerce_insights, fallback_insights, generate_insights, AnalysisSnapshot,
    FinancialInsights, InsightsProvider,
};
pub use metrics::{category_breakdown, compute_metrics, top_categories, MetricsAggregator};
pub use sampling::{
    chart_series, decimate, downsample, downsample_lttb, should_downsample, ChartPoint,
    DownsampleStrategy, Plottable, SamplingThresholds,
};
pub use schema::*;

use chrono::{Local, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything derived from one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub records: Vec<FinancialRecord>,
    pub warnings: Vec<RowError>,
    pub metrics: FinancialMetrics,
    pub categories: Vec<CategoryBreakdown>,
    pub forecast: Vec<ForecastPoint>,
    /// Backtested revenue accuracy, 0-100
    pub accuracy: f64,
}

impl AnalysisReport {
    pub fn snapshot(&self) -> AnalysisSnapshot<'_> {
        AnalysisSnapshot {
            records: &self.records,
            metrics: &self.metrics,
            forecast: &self.forecast,
            categories: &self.categories,
        }
    }

    pub fn chart(&self, field: SeriesField, thresholds: &SamplingThresholds) -> Vec<ChartPoint> {
        chart_series(&self.forecast, field, thresholds)
    }
}

/// Stateless pipeline: parse, then metrics, categories and forecast from the
/// same record set.
#[derive(Debug, Clone, Default)]
pub struct FinancialAnalyzer {
    config: AnalysisConfig,
}

impl FinancialAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, text: &str) -> Result<AnalysisReport> {
        self.analyze_as_of(text, Local::now().date_naive())
    }

    pub fn analyze_as_of(&self, text: &str, today: NaiveDate) -> Result<AnalysisReport> {
        let parsed = CsvValidator::new(today)
            .with_min_records(self.config.min_records)
            .parse(text)?;

        if parsed.has_warnings() {
            info!("{} rows were skipped during validation", parsed.warnings.len());
        }

        Ok(self.analyze_records(parsed))
    }

    /// Runs the computation stages on an already validated dataset.
    pub fn analyze_records(&self, parsed: ParsedDataset) -> AnalysisReport {
        let ParsedDataset { records, warnings } = parsed;

        let aggregator = MetricsAggregator::new(self.config.burn_rate_window);
        let metrics = aggregator.compute(&records);
        let categories = aggregator.category_breakdown(&records);

        let forecaster = Forecaster::new(self.config.smoothing_alpha);
        let forecast = forecaster.forecast(&records, self.config.forecast_months);
        let accuracy = forecaster.accuracy(&records);

        debug!(
            "Analysed {} records: {} categories, {} forecast periods, accuracy {}%",
            records.len(),
            categories.len(),
            self.config.forecast_months,
            accuracy
        );

        AnalysisReport {
            records,
            warnings,
            metrics,
            categories,
            forecast,
            accuracy,
        }
    }

    pub fn report_table(&self, report: &AnalysisReport) -> String {
        report_table(&report.records, self.config.report_row_limit)
    }

    pub fn sampling_thresholds(&self) -> SamplingThresholds {
        SamplingThresholds::from(&self.config)
    }
}

pub fn analyze_csv(text: &str) -> Result<AnalysisReport> {
    FinancialAnalyzer::default().analyze(text)
}
