use std::fs;

use tcs_core::{OutcomeKey, OutcomeValue};
use tcs_series::{
    aggregate, load_csv, write_consensus_csv, write_csv, ConsensusOptions, OutcomeExtractor,
    TimeAxis, TimeSeries,
};
use tempfile::tempdir;

#[test]
fn load_extract_from_simulator_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("metrics.csv");
    let mut text = String::from("# tcs synthetic output\nstep,wound_closure_pct,mean_infl_wound,scar_magnitude\n");
    for step in 0..=10 {
        let closure = step as f64 * 10.0;
        text.push_str(&format!("{},{},{},{}\n", step * 240, closure, 0.5 - step as f64 * 0.02, 0.3));
    }
    // a crashed writer leaves a truncated row and padding behind
    text.push_str("2640,99\0\0\n");
    fs::write(&path, text).expect("write metrics");

    let series = load_csv(&path, &TimeAxis::default()).expect("load");
    assert_eq!(series.len(), 11);

    let outcome = OutcomeExtractor::new([
        OutcomeKey::TimeTo50PctDays,
        OutcomeKey::TimeTo90PctDays,
        OutcomeKey::PeakInflammation,
        OutcomeKey::PeakNeutrophils,
    ])
    .extract_all(&series);
    let t50 = outcome.value(OutcomeKey::TimeTo50PctDays).expect("t50 reached");
    let t90 = outcome.value(OutcomeKey::TimeTo90PctDays).expect("t90 reached");
    assert!((t50 - 5.0).abs() < 1e-9);
    assert!((t90 - 9.0).abs() < 1e-9);
    assert_eq!(outcome.value(OutcomeKey::PeakInflammation), Some(0.5));
    assert_eq!(outcome.get(OutcomeKey::PeakNeutrophils), OutcomeValue::NotAvailable);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("absent.csv");
    let err = load_csv(&path, &TimeAxis::default()).unwrap_err();
    assert_eq!(err.info().code, "series-read");
    assert!(err.info().context.contains_key("path"));
}

#[test]
fn written_series_loads_back() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("series.csv");
    let series = TimeSeries::new(vec![0.0, 1.0, 2.0])
        .with_metric("step", vec![0.0, 1.0, 2.0])
        .with_metric("scar_magnitude", vec![0.25, 0.5, 0.75]);
    write_csv(&series, &path).expect("write");
    let loaded = load_csv(&path, &TimeAxis::raw("step")).expect("load");
    assert_eq!(loaded, series);
}

#[test]
fn consensus_csv_has_mean_std_pairs() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("consensus.csv");
    let runs = [
        TimeSeries::new(vec![0.0, 1.0]).with_metric("closure", vec![0.0, 2.0]),
        TimeSeries::new(vec![0.0, 1.0]).with_metric("closure", vec![2.0, 4.0]),
    ];
    let result = aggregate(&runs, &ConsensusOptions::default()).expect("aggregate");
    write_consensus_csv(&result, &path).expect("write consensus");

    let text = fs::read_to_string(&path).expect("read back");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "closure,closure_std,n_contributors");
    assert_eq!(lines[1], "1,1,2");
    assert_eq!(lines[2], "3,1,2");
}
