use tcs_core::errors::{ErrorInfo, TcsError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("config", "hbo+npwt")
        .with_context("reason", "example")
}

#[test]
fn simulation_error_surface() {
    let err = TcsError::Simulation(sample_info("S001", "artifact missing"));
    assert_eq!(err.info().code, "S001");
    assert!(err.info().context.contains_key("config"));
}

#[test]
fn aggregation_error_surface() {
    let err = TcsError::Aggregation(sample_info("A001", "no runs"));
    assert_eq!(err.info().code, "A001");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn study_error_surface() {
    let err = TcsError::Study(sample_info("ST001", "baseline failed"));
    assert_eq!(err.info().code, "ST001");
}

#[test]
fn display_includes_context_and_hint() {
    let err = TcsError::Config(
        ErrorInfo::new("bounds", "min_runs exceeds max_runs")
            .with_context("min_runs", "5")
            .with_hint("raise --max-runs"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("config error: min_runs exceeds max_runs (code: bounds)"));
    assert!(rendered.contains("min_runs=5"));
    assert!(rendered.contains("hint: raise --max-runs"));
}

#[test]
fn errors_roundtrip_json() {
    let err = TcsError::Io(sample_info("IO1", "denied").with_hint("check permissions"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Io\""));
    let decoded: TcsError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
