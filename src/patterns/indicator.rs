use serde::{Deserialize, Serialize};

/// Signed annotation attached to a two-value comparison: `indicator` is the
/// direction (−1 loss, 1 gain/met) and `value` the display fragment the
/// rendering layer prints verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub indicator: i8,
    pub value: String,
}

/// Percent-change comparison of an observed value against a baseline.
///
/// The percent is rounded to a whole number; decreases render as `"(pct%)"`
/// (the sign travels with the number), increases and ties as `"(+pct%)"`.
/// A zero baseline is reported as a 0% change rather than dividing.
pub fn evaluate(value_1: f64, value_2: f64) -> IndicatorResult {
    let percent = if value_2 == 0.0 {
        0i64
    } else {
        (((value_1 - value_2) * 100.0) / value_2).round() as i64
    };

    if value_1 < value_2 {
        IndicatorResult {
            indicator: -1,
            value: format!("({percent}%)"),
        }
    } else {
        IndicatorResult {
            indicator: 1,
            value: format!("(+{percent}%)"),
        }
    }
}

/// Goal-mode comparison: met iff the target does not exceed the achieved
/// value.
pub fn evaluate_goal(value_1: f64, value_2: f64) -> IndicatorResult {
    if value_1 <= value_2 {
        IndicatorResult {
            indicator: 1,
            value: "MET".to_string(),
        }
    } else {
        IndicatorResult {
            indicator: -1,
            value: "NOT MET".to_string(),
        }
    }
}
