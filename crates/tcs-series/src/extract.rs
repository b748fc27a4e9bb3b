use tcs_core::{Measure, OutcomeKey, OutcomeValue, ScalarOutcome};

use crate::series::TimeSeries;

/// Last sample.
pub fn final_value(values: &[f64]) -> OutcomeValue {
    values
        .last()
        .copied()
        .map_or(OutcomeValue::NotAvailable, OutcomeValue::Value)
}

/// Maximum sample.
pub fn peak(values: &[f64]) -> OutcomeValue {
    if values.is_empty() {
        return OutcomeValue::NotAvailable;
    }
    OutcomeValue::Value(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

/// First time at which the series reaches `threshold`.
pub fn time_to(values: &[f64], time: &[f64], threshold: f64) -> OutcomeValue {
    if values.is_empty() {
        return OutcomeValue::NotAvailable;
    }
    time.iter()
        .zip(values)
        .find(|(_, value)| **value >= threshold)
        .map_or(OutcomeValue::NotReached, |(t, _)| OutcomeValue::Value(*t))
}

/// Trapezoidal integral of the series against the time axis.
pub fn auc(values: &[f64], time: &[f64]) -> OutcomeValue {
    if values.is_empty() {
        return OutcomeValue::NotAvailable;
    }
    let len = values.len().min(time.len());
    let total = (1..len)
        .map(|idx| 0.5 * (values[idx] + values[idx - 1]) * (time[idx] - time[idx - 1]))
        .sum();
    OutcomeValue::Value(total)
}

/// Applies a measure to one metric column of the series.
pub fn extract_measure(series: &TimeSeries, metric: &str, measure: Measure) -> OutcomeValue {
    let Some(values) = series.metric(metric) else {
        return OutcomeValue::NotAvailable;
    };
    match measure {
        Measure::Final => final_value(values),
        Measure::Peak => peak(values),
        Measure::Auc => auc(values, &series.time),
        Measure::TimeTo(threshold) => time_to(values, &series.time, threshold),
    }
}

/// Computes one schema outcome.
pub fn extract(series: &TimeSeries, key: OutcomeKey) -> OutcomeValue {
    extract_measure(series, key.metric(), key.measure())
}

/// Reduces a time series to the configured outcome keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeExtractor {
    keys: Vec<OutcomeKey>,
}

impl OutcomeExtractor {
    /// Extractor limited to the given keys.
    pub fn new(keys: impl IntoIterator<Item = OutcomeKey>) -> Self {
        let mut keys: Vec<OutcomeKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    /// Keys produced by this extractor.
    pub fn keys(&self) -> &[OutcomeKey] {
        &self.keys
    }

    /// Extracts every configured key.
    pub fn extract_all(&self, series: &TimeSeries) -> ScalarOutcome {
        self.keys
            .iter()
            .map(|key| (*key, extract(series, *key)))
            .collect()
    }
}

impl Default for OutcomeExtractor {
    fn default() -> Self {
        Self::new(OutcomeKey::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closure_series() -> TimeSeries {
        TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0])
            .with_metric("wound_closure_pct", vec![0.0, 30.0, 60.0, 80.0])
            .with_metric("mean_infl_wound", vec![0.1, 0.4, 0.2, 0.1])
    }

    #[test]
    fn basic_measures() {
        let series = closure_series();
        assert_eq!(extract(&series, OutcomeKey::WoundClosurePct), OutcomeValue::Value(80.0));
        assert_eq!(extract(&series, OutcomeKey::PeakInflammation), OutcomeValue::Value(0.4));
        assert_eq!(extract(&series, OutcomeKey::TimeTo50PctDays), OutcomeValue::Value(2.0));
        assert_eq!(extract(&series, OutcomeKey::TimeTo90PctDays), OutcomeValue::NotReached);
    }

    #[test]
    fn threshold_is_inclusive() {
        let series = TimeSeries::new(vec![0.0, 0.5]).with_metric("wound_closure_pct", vec![10.0, 50.0]);
        assert_eq!(extract(&series, OutcomeKey::TimeTo50PctDays), OutcomeValue::Value(0.5));
    }

    #[test]
    fn trapezoid_auc() {
        let series = closure_series();
        let OutcomeValue::Value(area) = extract(&series, OutcomeKey::InflammationAuc) else {
            panic!("auc should be a value");
        };
        // 0.25 + 0.3 + 0.15
        assert!((area - 0.7).abs() < 1e-12);
    }

    #[test]
    fn absent_metric_is_not_available() {
        let outcome = OutcomeExtractor::default().extract_all(&closure_series());
        assert_eq!(outcome.get(OutcomeKey::ScarMagnitude), OutcomeValue::NotAvailable);
        assert_eq!(outcome.get(OutcomeKey::PeakNeutrophils), OutcomeValue::NotAvailable);
        assert_eq!(outcome.len(), OutcomeKey::ALL.len());
    }
}
