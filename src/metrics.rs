use crate::schema::{CategoryBreakdown, FinancialMetrics, FinancialRecord, SeriesField};
use std::collections::HashMap;

pub const DEFAULT_BURN_RATE_WINDOW: usize = 3;

/// Computes the summary metrics with the default three-period burn window.
pub fn compute_metrics(records: &[FinancialRecord]) -> FinancialMetrics {
    MetricsAggregator::default().compute(records)
}

pub fn category_breakdown(records: &[FinancialRecord]) -> Vec<CategoryBreakdown> {
    MetricsAggregator::default().category_breakdown(records)
}

pub struct MetricsAggregator {
    burn_rate_window: usize,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BURN_RATE_WINDOW)
    }
}

impl MetricsAggregator {
    pub fn new(burn_rate_window: usize) -> Self {
        Self {
            burn_rate_window: burn_rate_window.max(1),
        }
    }

    pub fn compute(&self, records: &[FinancialRecord]) -> FinancialMetrics {
        if records.is_empty() {
            return FinancialMetrics::default();
        }

        let total_revenue: f64 = records.iter().map(|r| r.revenue).sum();
        let total_expenses: f64 = records.iter().map(|r| r.expenses).sum();
        let average_cash_flow = mean(records, SeriesField::CashFlow);

        let window_start = records.len().saturating_sub(self.burn_rate_window);
        let burn_rate = mean(&records[window_start..], SeriesField::Expenses);

        // Lifetime revenue over a recent monthly spend rate. Kept as-is; see DESIGN.md.
        let runway = if average_cash_flow > 0.0 && burn_rate > 0.0 {
            total_revenue / burn_rate
        } else {
            0.0
        };

        let (first_half, second_half) = records.split_at(records.len() / 2);

        FinancialMetrics {
            total_revenue,
            total_expenses,
            net_profit: total_revenue - total_expenses,
            average_cash_flow,
            burn_rate,
            runway,
            revenue_growth: growth(first_half, second_half, SeriesField::Revenue),
            expense_growth: growth(first_half, second_half, SeriesField::Expenses),
        }
    }

    /// Groups records by exact category string, sorted by revenue descending.
    /// Ties keep the order in which categories were first seen.
    pub fn category_breakdown(&self, records: &[FinancialRecord]) -> Vec<CategoryBreakdown> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<CategoryBreakdown> = Vec::new();

        for record in records {
            match positions.get(record.category.as_str()) {
                Some(&i) => {
                    let group = &mut groups[i];
                    group.revenue += record.revenue;
                    group.expenses += record.expenses;
                    group.count += 1;
                }
                None => {
                    positions.insert(record.category.as_str(), groups.len());
                    groups.push(CategoryBreakdown {
                        category: record.category.clone(),
                        revenue: record.revenue,
                        expenses: record.expenses,
                        count: 1,
                    });
                }
            }
        }

        groups.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
        groups
    }
}

/// Keeps the `max_categories` largest categories by revenue + expenses and
/// folds the rest into a single "Others (k)" entry.
pub fn top_categories(
    breakdown: &[CategoryBreakdown],
    max_categories: usize,
) -> Vec<CategoryBreakdown> {
    if breakdown.len() <= max_categories {
        return breakdown.to_vec();
    }

    let mut sorted = breakdown.to_vec();
    sorted.sort_by(|a, b| (b.revenue + b.expenses).total_cmp(&(a.revenue + a.expenses)));

    let others = sorted.split_off(max_categories);
    sorted.push(CategoryBreakdown {
        category: format!("Others ({})", others.len()),
        revenue: others.iter().map(|c| c.revenue).sum(),
        expenses: others.iter().map(|c| c.expenses).sum(),
        count: others.iter().map(|c| c.count).sum(),
    });
    sorted
}

fn mean(records: &[FinancialRecord], field: SeriesField) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| field.of_record(r)).sum::<f64>() / records.len() as f64
}

fn growth(first: &[FinancialRecord], second: &[FinancialRecord], field: SeriesField) -> f64 {
    let baseline = mean(first, field);
    if baseline > 0.0 {
        (mean(second, field) - baseline) / baseline * 100.0
    } else {
        0.0
    }
}
