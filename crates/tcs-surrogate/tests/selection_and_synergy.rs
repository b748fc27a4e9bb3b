use std::collections::BTreeMap;

use tcs_core::{Configuration, Factor, OutcomeKey, ScalarOutcome};
use tcs_surrogate::{
    select, Candidate, CandidateSelector, CandidateSpace, ScoreWeights, SurrogateModel,
    SynergyAnalyzer, SynergyClass,
};

fn candidate(index: usize, label: &str, score: f64) -> Candidate {
    Candidate {
        index,
        configuration: Configuration::from_label(label),
        predicted: ScalarOutcome::new(),
        score,
    }
}

#[test]
fn worked_example_is_synergistic() {
    let keys = [OutcomeKey::WoundClosurePct, OutcomeKey::ScarMagnitude];
    let baseline = ScalarOutcome::new()
        .with(OutcomeKey::WoundClosurePct, 40.0)
        .with(OutcomeKey::ScarMagnitude, 1.0);
    let predicted = ScalarOutcome::new()
        .with(OutcomeKey::WoundClosurePct, 70.0)
        .with(OutcomeKey::ScarMagnitude, 0.6);
    let observed = ScalarOutcome::new()
        .with(OutcomeKey::WoundClosurePct, 85.0)
        .with(OutcomeKey::ScarMagnitude, 0.5);

    let result = SynergyAnalyzer::default().analyze(&observed, &predicted, &baseline, &keys);
    assert!((result.per_key[&OutcomeKey::WoundClosurePct] - 0.375).abs() < 1e-12);
    assert!((result.per_key[&OutcomeKey::ScarMagnitude] - 0.1).abs() < 1e-12);
    assert!((result.mean - 0.2375).abs() < 1e-12);
    assert_eq!(result.class, SynergyClass::Synergistic);
}

#[test]
fn observed_equal_to_prediction_is_additive() {
    let keys = OutcomeKey::DEFAULT_TRACKED;
    let baseline = ScalarOutcome::new()
        .with(OutcomeKey::TimeTo50PctDays, 9.0)
        .with(OutcomeKey::ScarMagnitude, 0.4)
        .with(OutcomeKey::PeakInflammation, 0.3);
    let predicted = ScalarOutcome::new()
        .with(OutcomeKey::TimeTo50PctDays, 7.0)
        .with(OutcomeKey::ScarMagnitude, 0.3)
        .with(OutcomeKey::PeakInflammation, 0.2);
    let result = SynergyAnalyzer::default().analyze(&predicted, &predicted, &baseline, &keys);
    assert_eq!(result.mean, 0.0);
    assert_eq!(result.class, SynergyClass::Additive);
}

#[test]
fn ties_keep_enumeration_order() {
    let candidates = vec![
        candidate(0, "a+b", 0.9),
        candidate(1, "a+c", 0.5),
        candidate(2, "b+c", 0.5),
        candidate(3, "a+b+c", 0.7),
    ];
    let picked: Vec<String> = select(&candidates, 3)
        .iter()
        .map(|candidate| candidate.configuration.label())
        .collect();
    assert_eq!(picked, vec!["a+c", "b+c", "a+b+c"]);
}

#[test]
fn top_k_is_clamped() {
    let candidates = vec![candidate(0, "a+b", 1.0), candidate(1, "a+c", f64::INFINITY)];
    assert_eq!(select(&candidates, 20).len(), 2);
    assert!(select(&candidates, 0).is_empty());
}

#[test]
fn ranking_prefers_complementary_factors() {
    let baseline = ScalarOutcome::new()
        .with(OutcomeKey::TimeTo50PctDays, 10.0)
        .with(OutcomeKey::ScarMagnitude, 0.5)
        .with(OutcomeKey::PeakInflammation, 0.2);
    let singles: BTreeMap<Factor, ScalarOutcome> = [
        ("fast", 6.0, 0.5, 0.2),
        ("smooth", 10.0, 0.3, 0.2),
        ("inert", 10.0, 0.5, 0.2),
    ]
    .into_iter()
    .map(|(name, t50, scar, infl)| {
        (
            Factor::new(name),
            ScalarOutcome::new()
                .with(OutcomeKey::TimeTo50PctDays, t50)
                .with(OutcomeKey::ScarMagnitude, scar)
                .with(OutcomeKey::PeakInflammation, infl),
        )
    })
    .collect();
    let model = SurrogateModel::fit(&baseline, &singles, &OutcomeKey::DEFAULT_TRACKED)
        .expect("fit");

    let selector = CandidateSelector::new(ScoreWeights::default(), CandidateSpace::Pairs);
    let ranked = selector.rank(&model).expect("rank");
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].configuration.label(), "fast+smooth");
    assert!(ranked.windows(2).all(|pair| pair[0].score <= pair[1].score));

    let again = selector.rank(&model).expect("rank");
    assert_eq!(ranked, again);
}
