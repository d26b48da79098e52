use chrono::{TimeZone, Utc};
use common::{Candle, Error};
use proptest::prelude::*;
use strategy::{ConditionEvaluator, EvaluatorConfig, TrendMomentumEvaluator};

fn window(bodies: &[(f64, f64)]) -> Vec<Candle> {
    bodies
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| Candle {
            open_time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: None,
        })
        .collect()
}

fn evaluator() -> TrendMomentumEvaluator {
    TrendMomentumEvaluator::new(&EvaluatorConfig::default(), 20).unwrap()
}

proptest! {
    /// Windows shorter than the minimum always fail with InsufficientData.
    #[test]
    fn short_windows_are_insufficient(
        bodies in prop::collection::vec((0.5f64..2.0, 0.5f64..2.0), 0..20),
    ) {
        let result = evaluator().evaluate(&window(&bodies));
        let is_insufficient = matches!(result, Err(Error::InsufficientData { .. }));
        prop_assert!(is_insufficient);
    }

    /// Any window long enough evaluates without panicking and keeps the score coherent.
    #[test]
    fn score_is_bounded_and_consistent(
        bodies in prop::collection::vec((0.0001f64..10_000.0, 0.0001f64..10_000.0), 20..120),
    ) {
        let result = evaluator().evaluate(&window(&bodies)).unwrap();
        prop_assert!(result.score >= 1);
        prop_assert!(result.score <= result.total);
        prop_assert_eq!(result.satisfied, result.score == result.total);
        prop_assert!((0.0..=100.0).contains(&result.rsi));
    }
}
