use crate::schema::{FinancialRecord, ForecastPoint, RecordKind, SeriesField};
use crate::utils::add_months;
use log::{debug, warn};

pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

/// Backtests need at least this many records to hold any out.
pub const MIN_BACKTEST_RECORDS: usize = 4;
const MAX_HELD_OUT: usize = 3;
const HELD_OUT_FRACTION: f64 = 0.3;

/// Forecasts `months_ahead` periods with the default smoothing factor.
pub fn generate_forecast(records: &[FinancialRecord], months_ahead: usize) -> Vec<ForecastPoint> {
    Forecaster::default().forecast(records, months_ahead)
}

/// Backtested revenue accuracy in `[0, 100]` with the default smoothing factor.
pub fn forecast_accuracy(records: &[FinancialRecord]) -> f64 {
    Forecaster::default().accuracy(records)
}

/// Exponential smoothing: `s[0] = x[0]`, `s[i] = α·x[i] + (1 − α)·s[i−1]`.
pub fn exponential_smoothing(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(values.len());
    let mut previous = match values.first() {
        Some(&first) => first,
        None => return smoothed,
    };
    smoothed.push(previous);

    for &value in &values[1..] {
        previous = alpha * value + (1.0 - alpha) * previous;
        smoothed.push(previous);
    }
    smoothed
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares fit of `ys` against `xs`.
///
/// When the x values carry no variance (fewer than two distinct points) the
/// fit degenerates to a flat line through the mean of `ys`.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Regression {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return Regression {
            slope: 0.0,
            intercept: 0.0,
        };
    }

    let (xs, ys) = (&xs[..n], &ys[..n]);
    let n_f = n as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

    let denominator = n_f * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return Regression {
            slope: 0.0,
            intercept: sum_y / n_f,
        };
    }

    let slope = (n_f * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_f;
    Regression { slope, intercept }
}

/// Trend forecaster: each numeric field is smoothed, fitted with a straight
/// line against the period index and extrapolated independently.
#[derive(Debug, Clone, Copy)]
pub struct Forecaster {
    alpha: f64,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}

impl Forecaster {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Returns the historical records followed by `months_ahead` projected
    /// points, one calendar month apart from the last record.
    pub fn forecast(&self, records: &[FinancialRecord], months_ahead: usize) -> Vec<ForecastPoint> {
        let mut output: Vec<ForecastPoint> = records.iter().map(ForecastPoint::historical).collect();

        let last = match records.last() {
            Some(last) => last.timestamp,
            None => return output,
        };

        let [revenue, expenses, cash_flow] = SeriesField::ALL.map(|field| {
            let values: Vec<f64> = records.iter().map(|r| field.of_record(r)).collect();
            (field, self.fit(&values))
        });

        let n = records.len();
        output.reserve(months_ahead);

        for step in 1..=months_ahead {
            let Some(timestamp) = u32::try_from(step).ok().and_then(|s| add_months(last, s)) else {
                warn!("Forecast horizon exceeds the representable date range after {} steps", step - 1);
                break;
            };

            let index = (n + step - 1) as f64;
            output.push(ForecastPoint {
                timestamp,
                revenue: project(revenue, index),
                expenses: project(expenses, index),
                cash_flow: project(cash_flow, index),
                kind: RecordKind::Forecast,
            });
        }

        output
    }

    /// Holds out the trailing `min(3, floor(0.3·n))` records, forecasts them
    /// from the rest and scores revenue by mean absolute percentage error.
    ///
    /// Held-out periods with zero actual revenue carry no defined percentage
    /// error and are left out of the mean. If none remain the score is 0.
    pub fn accuracy(&self, records: &[FinancialRecord]) -> f64 {
        if records.len() < MIN_BACKTEST_RECORDS {
            return 0.0;
        }

        let held_out = MAX_HELD_OUT.min((records.len() as f64 * HELD_OUT_FRACTION).floor() as usize);
        let (train, test) = records.split_at(records.len() - held_out);

        let predicted: Vec<ForecastPoint> = self
            .forecast(train, held_out)
            .into_iter()
            .filter(ForecastPoint::is_forecast)
            .collect();

        let errors: Vec<f64> = test
            .iter()
            .zip(&predicted)
            .filter(|(actual, _)| actual.revenue != 0.0)
            .map(|(actual, forecast)| ((actual.revenue - forecast.revenue) / actual.revenue).abs())
            .collect();

        if errors.is_empty() {
            debug!("Backtest window has no non-zero revenue; accuracy reported as 0");
            return 0.0;
        }

        let mean_error = errors.iter().sum::<f64>() / errors.len() as f64;
        ((1.0 - mean_error) * 100.0).clamp(0.0, 100.0).round()
    }

    fn fit(&self, values: &[f64]) -> Regression {
        let smoothed = exponential_smoothing(values, self.alpha);
        let xs: Vec<f64> = (0..smoothed.len()).map(|i| i as f64).collect();
        linear_regression(&xs, &smoothed)
    }
}

fn project((field, regression): (SeriesField, Regression), index: f64) -> f64 {
    let value = regression.predict(index);
    let value = if field.is_non_negative() { value.max(0.0) } else { value };
    value.round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
        (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
    }

    fn record(year: i32, month: u32, revenue: f64, expenses: f64, cash_flow: f64) -> FinancialRecord {
        FinancialRecord::new(
            NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            revenue,
            expenses,
            cash_flow,
            "Sales",
        )
    }

    fn sample_records() -> Vec<FinancialRecord> {
        vec![
            record(2024, 1, 10000.0, 5000.0, 5000.0),
            record(2024, 2, 12000.0, 6000.0, 6000.0),
            record(2024, 3, 15000.0, 7000.0, 8000.0),
            record(2024, 4, 18000.0, 8000.0, 10000.0),
            record(2024, 5, 20000.0, 9000.0, 11000.0),
        ]
    }

    #[test]
    fn test_exponential_smoothing() {
        let smoothed = exponential_smoothing(&[100.0, 200.0, 200.0], 0.3);
        assert_eq!(smoothed.len(), 3);
        assert!((smoothed[0] - 100.0).abs() < 1e-9);
        assert!((smoothed[1] - 130.0).abs() < 1e-9);
        assert!((smoothed[2] - 151.0).abs() < 1e-9);
        assert!(exponential_smoothing(&[], 0.3).is_empty());
    }

    #[test]
    fn test_linear_regression() {
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]);
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);

        let flat = linear_regression(&[0.0], &[42.0]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.intercept, 42.0);
    }

    #[test]
    fn test_forecast_length_and_tags() {
        let records = sample_records();
        let forecast = generate_forecast(&records, 3);
        assert_eq!(forecast.len(), 8);

        for (point, record) in forecast.iter().zip(&records) {
            assert_eq!(point.kind, RecordKind::Historical);
            assert_eq!(point.timestamp, record.timestamp);
            assert_eq!(point.revenue, record.revenue);
        }
        assert!(forecast[5..].iter().all(ForecastPoint::is_forecast));
    }

    #[test]
    fn test_forecast_timestamps_step_monthly() {
        let forecast = generate_forecast(&sample_records(), 4);
        let last = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        for (i, point) in forecast[5..].iter().enumerate() {
            assert_eq!(months_between(last, point.timestamp), i as i32 + 1);
        }
    }

    #[test]
    fn test_forecast_month_end_is_not_chained() {
        let records = vec![
            FinancialRecord::new(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 1.0, 1.0, 1.0, "A"),
            FinancialRecord::new(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 1.0, 1.0, 1.0, "A"),
        ];
        let forecast = generate_forecast(&records, 2);
        assert_eq!(forecast[2].timestamp, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(forecast[3].timestamp, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn test_forecast_projection_values() {
        let records = vec![
            record(2024, 1, 100.0, 50.0, -100.0),
            record(2024, 2, 200.0, 50.0, -200.0),
        ];
        // smoothed revenue [100, 130] -> slope 30, intercept 100
        let forecast = generate_forecast(&records, 2);
        assert_eq!(forecast[2].revenue, 160.0);
        assert_eq!(forecast[3].revenue, 190.0);
        assert_eq!(forecast[2].expenses, 50.0);
        assert_eq!(forecast[2].cash_flow, -160.0);
        assert_eq!(forecast[3].cash_flow, -190.0);
    }

    #[test]
    fn test_revenue_and_expenses_clamped_at_zero() {
        let records = vec![
            record(2024, 1, 1000.0, 1000.0, 1000.0),
            record(2024, 2, 0.0, 0.0, 0.0),
        ];
        // smoothed [1000, 700] -> slope -300, intercept 1000
        let forecast = generate_forecast(&records, 3);
        let revenue: Vec<f64> = forecast[2..].iter().map(|p| p.revenue).collect();
        assert_eq!(revenue, vec![400.0, 100.0, 0.0]);
        assert_eq!(forecast[4].expenses, 0.0);
        assert_eq!(forecast[4].cash_flow, -200.0);
    }

    #[test]
    fn test_forecast_of_empty_input_is_empty() {
        assert!(generate_forecast(&[], 6).is_empty());
    }

    #[test]
    fn test_accuracy_bounds() {
        let accuracy = forecast_accuracy(&sample_records());
        assert!((0.0..=100.0).contains(&accuracy));
        assert_eq!(accuracy, accuracy.round());
    }

    #[test]
    fn test_accuracy_requires_four_records() {
        let records = &sample_records()[..3];
        assert_eq!(forecast_accuracy(records), 0.0);
    }

    #[test]
    fn test_accuracy_of_constant_series_is_perfect() {
        let records: Vec<FinancialRecord> = (1..=10)
            .map(|m| record(2024, m, 5000.0, 2000.0, 3000.0))
            .collect();
        assert_eq!(forecast_accuracy(&records), 100.0);
    }

    #[test]
    fn test_accuracy_skips_zero_actuals() {
        let mut records: Vec<FinancialRecord> = (1..=10)
            .map(|m| record(2024, m, 5000.0, 2000.0, 3000.0))
            .collect();
        // held-out window is the last three records
        records[8].revenue = 0.0;
        assert_eq!(forecast_accuracy(&records), 100.0);

        for r in records.iter_mut().skip(7) {
            r.revenue = 0.0;
        }
        assert_eq!(forecast_accuracy(&records), 0.0);
    }

    #[test]
    fn test_accuracy_floors_at_zero() {
        let records = vec![
            record(2024, 1, 100.0, 0.0, 0.0),
            record(2024, 2, 100.0, 0.0, 0.0),
            record(2024, 3, 100.0, 0.0, 0.0),
            record(2024, 4, 10.0, 0.0, 0.0),
        ];
        // predicted 100 against an actual of 10 is a 900% error
        assert_eq!(forecast_accuracy(&records), 0.0);
    }

    #[test]
    fn test_custom_alpha_changes_fit() {
        let records = vec![
            record(2024, 1, 100.0, 0.0, 0.0),
            record(2024, 2, 200.0, 0.0, 0.0),
        ];
        let forecast = Forecaster::new(1.0).forecast(&records, 1);
        // no smoothing: slope 100, intercept 100
        assert_eq!(forecast[2].revenue, 300.0);
    }
}
