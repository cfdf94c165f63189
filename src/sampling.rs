//! Downsampling of long series for rendering.
//!
//! [`downsample_lttb`] implements Largest-Triangle-Three-Buckets: the first and
//! last points are always kept and every interior bucket contributes the point
//! forming the largest triangle with the previously selected point and the
//! centroid of the following bucket. Peaks and reversals survive while
//! monotone stretches collapse. [`decimate`] is the cheaper, lower-fidelity
//! alternative.

use crate::schema::{AnalysisConfig, ForecastPoint, RecordKind, SeriesField};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A point with an x position and a y value.
pub trait Plottable {
    fn position(&self) -> f64;
    fn value(&self) -> f64;
}

impl Plottable for (f64, f64) {
    fn position(&self) -> f64 {
        self.0
    }

    fn value(&self) -> f64 {
        self.1
    }
}

pub fn should_downsample(len: usize, threshold: usize) -> bool {
    len > threshold
}

/// LTTB over points that know their own coordinates.
pub fn downsample<P: Plottable + Clone>(points: &[P], threshold: usize) -> Vec<P> {
    downsample_lttb(points, threshold, |p, _| p.position(), |p| p.value())
}

/// Largest-Triangle-Three-Buckets downsampling.
///
/// `position` receives the point and its index so callers can plot against
/// the index when points carry no x value of their own. Returns the input
/// unchanged when `data.len() <= threshold` or `threshold <= 2`; otherwise
/// exactly `threshold` points in their original order.
pub fn downsample_lttb<T, X, Y>(data: &[T], threshold: usize, position: X, value: Y) -> Vec<T>
where
    T: Clone,
    X: Fn(&T, usize) -> f64,
    Y: Fn(&T) -> f64,
{
    let n = data.len();
    if n <= threshold || threshold <= 2 {
        return data.to_vec();
    }

    let buckets = threshold - 2;
    let interior = n - 2;
    // Start index of bucket `i`; bucket `buckets` starts at the last point.
    let bucket_start = |i: usize| i * interior / buckets + 1;

    let mut sampled = Vec::with_capacity(threshold);
    sampled.push(data[0].clone());

    let mut anchor = 0;

    for i in 0..buckets {
        let next_start = bucket_start(i + 1);
        let next_end = bucket_start(i + 2).min(n);

        let (mut avg_x, mut avg_y) = (0.0, 0.0);
        for j in next_start..next_end {
            avg_x += position(&data[j], j);
            avg_y += value(&data[j]);
        }
        let next_len = (next_end - next_start) as f64;
        avg_x /= next_len;
        avg_y /= next_len;

        let anchor_x = position(&data[anchor], anchor);
        let anchor_y = value(&data[anchor]);

        let range_start = bucket_start(i);
        let mut max_area = -1.0;
        let mut selected = range_start;

        for j in range_start..next_start {
            let x = position(&data[j], j);
            let y = value(&data[j]);
            let area = ((anchor_x - avg_x) * (y - anchor_y) - (anchor_x - x) * (avg_y - anchor_y))
                .abs()
                * 0.5;
            if area > max_area {
                max_area = area;
                selected = j;
            }
        }

        sampled.push(data[selected].clone());
        anchor = selected;
    }

    sampled.push(data[n - 1].clone());
    sampled
}

/// Keeps every `n / threshold`-th point, plus the last point if the stride
/// missed it. May therefore return `threshold + 1` points.
pub fn decimate<T: Clone>(data: &[T], threshold: usize) -> Vec<T> {
    let n = data.len();
    if n <= threshold || threshold == 0 {
        return data.to_vec();
    }

    let mut indices: Vec<usize> = (0..threshold).map(|k| k * n / threshold).collect();
    if indices.last() != Some(&(n - 1)) {
        indices.push(n - 1);
    }
    indices.into_iter().map(|i| data[i].clone()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleStrategy {
    #[default]
    Lttb,
    Decimation,
}

impl DownsampleStrategy {
    pub fn apply<T, X, Y>(self, data: &[T], threshold: usize, position: X, value: Y) -> Vec<T>
    where
        T: Clone,
        X: Fn(&T, usize) -> f64,
        Y: Fn(&T) -> f64,
    {
        match self {
            Self::Lttb => downsample_lttb(data, threshold, position, value),
            Self::Decimation => decimate(data, threshold),
        }
    }
}

/// Point budgets applied independently to the historical and forecast parts
/// of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingThresholds {
    pub historical: usize,
    pub forecast: usize,
}

impl Default for SamplingThresholds {
    fn default() -> Self {
        Self {
            historical: 300,
            forecast: 100,
        }
    }
}

impl From<&AnalysisConfig> for SamplingThresholds {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            historical: config.historical_display_threshold,
            forecast: config.forecast_display_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: NaiveDate,
    pub value: f64,
    pub kind: RecordKind,
}

impl Plottable for ChartPoint {
    fn position(&self) -> f64 {
        self.timestamp.num_days_from_ce() as f64
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// Projects one field of a forecast sequence into chart points, downsampling
/// the historical and forecast parts separately (plotted against their index
/// within the part) and merging them back in chronological order.
pub fn chart_series(
    points: &[ForecastPoint],
    field: SeriesField,
    thresholds: &SamplingThresholds,
) -> Vec<ChartPoint> {
    let (historical, forecast): (Vec<ChartPoint>, Vec<ChartPoint>) = points
        .iter()
        .map(|p| ChartPoint {
            timestamp: p.timestamp,
            value: field.of_point(p),
            kind: p.kind,
        })
        .partition(|p| p.kind == RecordKind::Historical);

    let sample = |part: Vec<ChartPoint>, threshold: usize| {
        if should_downsample(part.len(), threshold) {
            downsample_lttb(&part, threshold, |_, i| i as f64, |p| p.value)
        } else {
            part
        }
    };

    let mut merged = sample(historical, thresholds.historical);
    merged.extend(sample(forecast, thresholds.forecast));
    merged.sort_by_key(|p| p.timestamp);
    merged
}
