//! Boundary with the narrative generator.
//!
//! The generator itself (typically an LLM behind an HTTP API) lives outside
//! this crate and is reached through [`InsightsProvider`]. Whatever it
//! returns is coerced into [`FinancialInsights`]; when it fails, a
//! deterministic narrative built from the metrics alone is used instead.

use crate::error::{FinancialInsightsError, Result};
use crate::export::{format_currency, format_percent};
use crate::schema::{CategoryBreakdown, FinancialMetrics, FinancialRecord, ForecastPoint};
use futures::future::BoxFuture;
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_SUMMARY: &str = "Analysis complete.";
const LOW_RUNWAY_PERIODS: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialInsights {
    #[schemars(description = "Two or three sentence executive summary of overall financial health")]
    pub summary: String,

    #[schemars(description = "Three or four key trends observed in the data")]
    pub trends: Vec<String>,

    #[schemars(description = "Unusual spikes, drops or patterns. Empty when there are none.")]
    pub anomalies: Vec<String>,

    #[schemars(description = "Two or three potential financial risks implied by the trends")]
    pub risks: Vec<String>,

    #[schemars(description = "Four or five specific, actionable budget recommendations")]
    pub recommendations: Vec<String>,
}

impl FinancialInsights {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FinancialInsights)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Everything the narrative generator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSnapshot<'a> {
    pub records: &'a [FinancialRecord],
    pub metrics: &'a FinancialMetrics,
    pub forecast: &'a [ForecastPoint],
    pub categories: &'a [CategoryBreakdown],
}

/// Transport to an external text generator. Implementations own their own
/// timeouts and retries; any `Err` triggers the fallback narrative.
pub trait InsightsProvider: Send + Sync {
    fn complete(&self, prompt: String) -> BoxFuture<'_, Result<String>>;
}

pub fn build_prompt(snapshot: &AnalysisSnapshot<'_>) -> Result<String> {
    let (historical, projected): (Vec<&ForecastPoint>, Vec<&ForecastPoint>) =
        snapshot.forecast.iter().partition(|p| !p.is_forecast());
    let metrics = snapshot.metrics;

    let schema = FinancialInsights::schema_as_json()?;

    Ok(format!(
        r#"You are a financial analyst. Review the data below and report your findings.

## Historical periods ({historical_len})
{historical}

## Computed metrics
- Total revenue: {total_revenue}
- Total expenses: {total_expenses}
- Net profit: {net_profit}
- Average cash flow: {average_cash_flow}
- Burn rate: {burn_rate} per month
- Runway: {runway:.1} months
- Revenue growth: {revenue_growth}
- Expense growth: {expense_growth}

## Forecast ({projected_len} periods)
{projected}

## Categories
{categories}

## Response format
Respond with a single JSON object matching this schema and nothing else:
{schema}

Cover revenue and expense trends, cash flow sustainability, growth, category performance
and what the forecast implies. Recommendations must be concrete and actionable.
"#,
        historical_len = historical.len(),
        historical = serde_json::to_string_pretty(&historical)?,
        total_revenue = format_currency(metrics.total_revenue),
        total_expenses = format_currency(metrics.total_expenses),
        net_profit = format_currency(metrics.net_profit),
        average_cash_flow = format_currency(metrics.average_cash_flow),
        burn_rate = format_currency(metrics.burn_rate),
        runway = metrics.runway,
        revenue_growth = format_percent(metrics.revenue_growth),
        expense_growth = format_percent(metrics.expense_growth),
        projected_len = projected.len(),
        projected = serde_json::to_string_pretty(&projected)?,
        categories = serde_json::to_string_pretty(snapshot.categories)?,
        schema = schema,
    ))
}

/// Coerces a loosely-structured response into [`FinancialInsights`].
///
/// The text may be wrapped in a Markdown code fence. Missing or mistyped
/// fields take safe defaults; a bare string where a list is expected becomes
/// a one-element list. Only text that is not a JSON object is rejected.
pub fn coerce_insights(raw: &str) -> Result<FinancialInsights> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))?;
    let object = value.as_object().ok_or_else(|| {
        FinancialInsightsError::InsightsUnavailable("response is not a JSON object".to_string())
    })?;

    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUMMARY)
        .to_string();

    Ok(FinancialInsights {
        summary,
        trends: string_list(object, "trends"),
        anomalies: string_list(object, "anomalies"),
        risks: string_list(object, "risks"),
        recommendations: string_list(object, "recommendations"),
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_blank)
            .collect(),
        Some(Value::String(single)) => non_blank(single.as_str()).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Narrative derived from the metrics alone, used whenever the external
/// generator is unavailable.
pub fn fallback_insights(metrics: &FinancialMetrics) -> FinancialInsights {
    let revenue_direction = if metrics.revenue_growth > 0.0 {
        "Growing"
    } else {
        "Declining"
    };
    let expense_direction = if metrics.expense_growth > 0.0 {
        "Increasing"
    } else {
        "Decreasing"
    };

    let runway_risk = if metrics.runway < LOW_RUNWAY_PERIODS {
        "Low runway - consider reducing expenses or increasing revenue"
    } else {
        "Runway appears sustainable"
    };
    let growth_risk = if metrics.expense_growth > metrics.revenue_growth {
        "Expenses growing faster than revenue"
    } else {
        "Revenue growth exceeds expense growth"
    };

    FinancialInsights {
        summary: "Automated insights are unavailable right now. Review the metrics and charts for a manual analysis.".to_string(),
        trends: vec![
            format!(
                "Revenue trend: {} at {}",
                revenue_direction,
                format_percent(metrics.revenue_growth.abs())
            ),
            format!(
                "Expense trend: {} at {}",
                expense_direction,
                format_percent(metrics.expense_growth.abs())
            ),
            format!("Net profit: {}", format_currency(metrics.net_profit)),
        ],
        anomalies: Vec::new(),
        risks: vec![runway_risk.to_string(), growth_risk.to_string()],
        recommendations: vec![
            "Review detailed metrics and charts for patterns".to_string(),
            "Consider category-wise budget allocation".to_string(),
            "Monitor forecast trends closely".to_string(),
            "Plan for seasonal variations".to_string(),
        ],
    }
}

/// Asks the provider for a narrative. Never fails: provider errors and
/// unusable responses resolve to [`fallback_insights`].
pub async fn generate_insights<P>(provider: &P, snapshot: &AnalysisSnapshot<'_>) -> FinancialInsights
where
    P: InsightsProvider + ?Sized,
{
    let prompt = match build_prompt(snapshot) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("Could not build insights prompt, using fallback: {}", e);
            return fallback_insights(snapshot.metrics);
        }
    };

    let response = match provider.complete(prompt).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Insights provider failed, using fallback: {}", e);
            return fallback_insights(snapshot.metrics);
        }
    };

    match coerce_insights(&response) {
        Ok(insights) => {
            info!(
                "Received insights: {} trends, {} risks, {} recommendations",
                insights.trends.len(),
                insights.risks.len(),
                insights.recommendations.len()
            );
            insights
        }
        Err(e) => {
            warn!("Insights response was unusable, using fallback: {}", e);
            fallback_insights(snapshot.metrics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;

    struct StaticProvider(String);

    impl InsightsProvider for StaticProvider {
        fn complete(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
            futures::future::ready(Ok(self.0.clone())).boxed()
        }
    }

    struct FailingProvider;

    impl InsightsProvider for FailingProvider {
        fn complete(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
            async {
                Err::<String, _>(FinancialInsightsError::InsightsUnavailable(
                    "timed out".to_string(),
                ))
            }
            .boxed()
        }
    }

    fn metrics() -> FinancialMetrics {
        FinancialMetrics {
            total_revenue: 55000.0,
            total_expenses: 26000.0,
            net_profit: 29000.0,
            average_cash_flow: 7250.0,
            burn_rate: 7000.0,
            runway: 7.857,
            revenue_growth: 50.0,
            expense_growth: 36.36,
        }
    }

    fn snapshot(metrics: &FinancialMetrics) -> AnalysisSnapshot<'_> {
        AnalysisSnapshot {
            records: &[],
            metrics,
            forecast: &[],
            categories: &[],
        }
    }

    #[test]
    fn test_coerce_full_response() {
        let raw = r#"{"summary": "Healthy.", "trends": ["up"], "anomalies": [], "risks": ["none"], "recommendations": ["a", "b"]}"#;
        let insights = coerce_insights(raw).unwrap();
        assert_eq!(insights.summary, "Healthy.");
        assert_eq!(insights.trends, vec!["up"]);
        assert!(insights.anomalies.is_empty());
        assert_eq!(insights.recommendations.len(), 2);
    }

    #[test]
    fn test_coerce_fills_defaults_for_bad_shapes() {
        let raw = "```json\n{\"summary\": 42, \"trends\": \"single trend\", \"risks\": [1, \"real risk\", \"  \"], \"extra\": true}\n```";
        let insights = coerce_insights(raw).unwrap();
        assert_eq!(insights.summary, DEFAULT_SUMMARY);
        assert_eq!(insights.trends, vec!["single trend"]);
        assert_eq!(insights.risks, vec!["real risk"]);
        assert!(insights.anomalies.is_empty());
        assert!(insights.recommendations.is_empty());
    }

    #[test]
    fn test_coerce_rejects_non_objects() {
        assert!(coerce_insights("[1, 2, 3]").is_err());
        assert!(coerce_insights("Sorry, I can't help with that.").is_err());
    }

    #[test]
    fn test_fallback_is_built_from_metrics() {
        let insights = fallback_insights(&metrics());
        assert_eq!(insights.trends[0], "Revenue trend: Growing at 50.0%");
        assert_eq!(insights.trends[1], "Expense trend: Increasing at 36.4%");
        assert_eq!(insights.trends[2], "Net profit: $29,000");
        assert_eq!(insights.risks[0], "Runway appears sustainable");
        assert_eq!(insights.risks[1], "Revenue growth exceeds expense growth");
        assert_eq!(insights.recommendations.len(), 4);
        assert_eq!(fallback_insights(&metrics()), insights);
    }

    #[test]
    fn test_fallback_flags_low_runway() {
        let mut m = metrics();
        m.runway = 2.0;
        m.revenue_growth = -10.0;
        let insights = fallback_insights(&m);
        assert!(insights.risks[0].starts_with("Low runway"));
        assert_eq!(insights.risks[1], "Expenses growing faster than revenue");
        assert_eq!(insights.trends[0], "Revenue trend: Declining at 10.0%");
    }

    #[test]
    fn test_generate_insights_uses_provider_response() {
        let m = metrics();
        let provider = StaticProvider(r#"{"summary": "From provider", "trends": ["t"]}"#.to_string());
        let insights = block_on(generate_insights(&provider, &snapshot(&m)));
        assert_eq!(insights.summary, "From provider");
        assert_eq!(insights.trends, vec!["t"]);
    }

    #[test]
    fn test_generate_insights_falls_back_on_failure() {
        let m = metrics();
        let insights = block_on(generate_insights(&FailingProvider, &snapshot(&m)));
        assert_eq!(insights, fallback_insights(&m));

        let garbage = StaticProvider("not json".to_string());
        let insights = block_on(generate_insights(&garbage, &snapshot(&m)));
        assert_eq!(insights, fallback_insights(&m));
    }

    #[test]
    fn test_prompt_mentions_metrics_and_schema() {
        let m = metrics();
        let prompt = build_prompt(&snapshot(&m)).unwrap();
        assert!(prompt.contains("Total revenue: $55,000"));
        assert!(prompt.contains("Runway: 7.9 months"));
        assert!(prompt.contains("recommendations"));
    }
}
