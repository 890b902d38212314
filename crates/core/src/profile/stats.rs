//! Descriptive statistics for profiled columns

use std::collections::HashMap;

use serde::Serialize;

use crate::table::Cell;

/// Count, distinct values and most frequent value of a column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoricalSummary {
    /// Non-null values
    pub count: usize,
    /// Distinct non-null values
    pub unique: usize,
    /// Most frequent value; the first seen wins ties
    pub top: Option<Cell>,
    /// Occurrences of `top`
    pub freq: usize,
}

impl CategoricalSummary {
    pub(crate) fn of(values: &[&Cell]) -> Self {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut firsts: Vec<&Cell> = Vec::new();

        for value in values.iter().filter(|v| !v.is_null()) {
            let next = firsts.len();
            let entry = counts.entry(value.to_string()).or_insert((next, 0));
            if entry.0 == next {
                firsts.push(*value);
            }
            entry.1 += 1;
        }

        let top = counts
            .values()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .copied();

        Self {
            count: values.iter().filter(|v| !v.is_null()).count(),
            unique: counts.len(),
            top: top.map(|(first, _)| firsts[first].clone()),
            freq: top.map(|(_, freq)| freq).unwrap_or(0),
        }
    }
}

/// Moments and quantiles of a numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl NumericSummary {
    /// Summarize the values, or `None` when there are none
    pub(crate) fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = (sorted.len() > 1).then(|| {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        });

        Some(Self {
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear-interpolated quantile of sorted, non-empty values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
