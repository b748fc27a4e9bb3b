use std::collections::BTreeMap;

use proptest::prelude::*;
use tcs_core::{Configuration, Factor, OutcomeKey, OutcomeValue, ScalarOutcome};
use tcs_surrogate::SurrogateModel;

fn outcome_value() -> impl Strategy<Value = OutcomeValue> {
    prop_oneof![
        4 => (-100.0f64..100.0).prop_map(OutcomeValue::Value),
        1 => Just(OutcomeValue::NotReached),
        1 => Just(OutcomeValue::NotAvailable),
    ]
}

fn scalar_outcome() -> impl Strategy<Value = ScalarOutcome> {
    prop::collection::vec(outcome_value(), OutcomeKey::DEFAULT_TRACKED.len()).prop_map(|values| {
        OutcomeKey::DEFAULT_TRACKED
            .iter()
            .copied()
            .zip(values)
            .collect()
    })
}

proptest! {
    #[test]
    fn empty_configuration_predicts_baseline(
        baseline in scalar_outcome(),
        singles in prop::collection::vec(scalar_outcome(), 1..5),
    ) {
        let singles: BTreeMap<Factor, ScalarOutcome> = singles
            .into_iter()
            .enumerate()
            .map(|(idx, outcome)| (Factor::new(format!("f{idx}")), outcome))
            .collect();
        let model = SurrogateModel::fit(&baseline, &singles, &OutcomeKey::DEFAULT_TRACKED)
            .expect("fit");
        let predicted = model.predict(&Configuration::baseline()).expect("predict");
        for key in OutcomeKey::DEFAULT_TRACKED {
            prop_assert_eq!(predicted.get(key), baseline.get(key));
        }
    }

    #[test]
    fn single_factor_predicts_its_observation(
        baseline in scalar_outcome(),
        observed in scalar_outcome(),
    ) {
        let factor = Factor::new("only");
        let singles = BTreeMap::from([(factor.clone(), observed.clone())]);
        let model = SurrogateModel::fit(&baseline, &singles, &OutcomeKey::DEFAULT_TRACKED)
            .expect("fit");
        let predicted = model.predict(&Configuration::single(factor)).expect("predict");
        for key in OutcomeKey::DEFAULT_TRACKED {
            match (baseline.value(key), observed.value(key)) {
                (Some(_), Some(expected)) => {
                    let got = predicted.value(key).expect("value");
                    prop_assert!((got - expected).abs() < 1e-9);
                }
                (None, _) => prop_assert_eq!(predicted.get(key), baseline.get(key)),
                (Some(base), None) => {
                    let got = predicted.value(key).expect("value");
                    prop_assert!((got - base).abs() < 1e-12);
                }
            }
        }
    }
}

#[test]
fn combination_sums_deltas() {
    let baseline = ScalarOutcome::new()
        .with(OutcomeKey::WoundClosurePct, 40.0)
        .with(OutcomeKey::ScarMagnitude, 1.0);
    let singles = BTreeMap::from([
        (
            Factor::new("a"),
            ScalarOutcome::new()
                .with(OutcomeKey::WoundClosurePct, 55.0)
                .with(OutcomeKey::ScarMagnitude, 0.8),
        ),
        (
            Factor::new("b"),
            ScalarOutcome::new()
                .with(OutcomeKey::WoundClosurePct, 55.0)
                .with(OutcomeKey::ScarMagnitude, 0.8),
        ),
    ]);
    let keys = [OutcomeKey::WoundClosurePct, OutcomeKey::ScarMagnitude];
    let model = SurrogateModel::fit(&baseline, &singles, &keys).expect("fit");
    let predicted = model
        .predict(&Configuration::new(["a", "b"]))
        .expect("predict");
    assert_eq!(predicted.value(OutcomeKey::WoundClosurePct), Some(70.0));
    let scar = predicted.value(OutcomeKey::ScarMagnitude).expect("scar");
    assert!((scar - 0.6).abs() < 1e-12);
}
