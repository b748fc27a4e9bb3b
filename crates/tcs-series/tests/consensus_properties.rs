use proptest::prelude::*;
use tcs_series::{aggregate, ConsensusOptions, TimeSeries};

fn ramp(len: usize, slope: f64) -> TimeSeries {
    TimeSeries::new((0..len).map(|i| i as f64).collect())
        .with_metric("wound_closure_pct", (0..len).map(|i| i as f64 * slope).collect())
}

proptest! {
    #[test]
    fn identical_replicates_have_zero_spread(
        values in prop::collection::vec(-1.0e3f64..1.0e3, 1..40),
        copies in 1usize..6,
    ) {
        let time: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let run = TimeSeries::new(time).with_metric("scar_magnitude", values.clone());
        let runs = vec![run; copies];
        let result = aggregate(&runs, &ConsensusOptions::default()).expect("aggregate");
        let stats = &result.metrics["scar_magnitude"];
        prop_assert_eq!(stats.mean.len(), values.len());
        for (mean, expected) in stats.mean.iter().zip(&values) {
            prop_assert!((mean - expected).abs() <= 1e-9 * expected.abs().max(1.0));
        }
        prop_assert!(stats.std.iter().all(|std| std.abs() < 1e-9));
        prop_assert!(result.contributors.iter().all(|n| *n == copies));
    }

    #[test]
    fn consensus_never_exceeds_longest_kept_run(lengths in prop::collection::vec(1usize..30, 1..8)) {
        let runs: Vec<TimeSeries> = lengths.iter().map(|len| ramp(*len, 1.0)).collect();
        let result = aggregate(&runs, &ConsensusOptions::default()).expect("aggregate");
        let longest = lengths.iter().copied().max().unwrap_or(0);
        prop_assert!(result.len() <= longest);
        prop_assert_eq!(result.accepted + result.dropped, lengths.len());
        prop_assert!(result.contributors.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}

#[test]
fn quarter_length_run_is_dropped_by_default() {
    let runs = [ramp(40, 1.0), ramp(10, 1.0)];
    let result = aggregate(&runs, &ConsensusOptions::default()).expect("aggregate");
    assert_eq!(result.min_length, 20);
    assert_eq!(result.accepted, 1);
    assert_eq!(result.dropped, 1);
    assert!(!result.fallback);
    assert_eq!(result.len(), 40);
    assert!(result.contributors.iter().all(|n| *n == 1));
}

#[test]
fn permissive_fraction_keeps_short_run_for_its_span() {
    let runs = [ramp(40, 1.0), ramp(10, 3.0)];
    let opts = ConsensusOptions {
        min_length_fraction: 0.2,
    };
    let result = aggregate(&runs, &opts).expect("aggregate");
    assert_eq!(result.accepted, 2);
    assert_eq!(result.len(), 40);
    assert_eq!(result.contributors[9], 2);
    assert_eq!(result.contributors[10], 1);

    let closure = &result.metrics["wound_closure_pct"];
    // step 5: (5 + 15) / 2 with a spread of 5
    assert!((closure.mean[5] - 10.0).abs() < 1e-12);
    assert!((closure.std[5] - 5.0).abs() < 1e-12);
    // past the short run only the long one contributes
    assert!((closure.mean[20] - 20.0).abs() < 1e-12);
    assert_eq!(closure.std[20], 0.0);
}

#[test]
fn mean_series_feeds_outcome_extraction() {
    let runs = [ramp(5, 10.0), ramp(5, 30.0)];
    let result = aggregate(&runs, &ConsensusOptions::default()).expect("aggregate");
    let mean = result.mean_series();
    assert_eq!(mean.metric("wound_closure_pct"), Some(&[0.0, 20.0, 40.0, 60.0, 80.0][..]));
    let std = result.std_series();
    assert_eq!(std.metric("wound_closure_pct"), Some(&[0.0, 10.0, 20.0, 30.0, 40.0][..]));
}
