use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Class 0.
    pub negative: ClassMetrics,
    /// Class 1.
    pub positive: ClassMetrics,
}

pub fn evaluate(truth: &[bool], predicted: &[bool]) -> ClassificationMetrics {
    let mut tp = 0usize;
    let mut tn = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (actual, guess) in truth.iter().zip(predicted) {
        match (*actual, *guess) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
        }
    }
    let total = tp + tn + fp + fn_;
    ClassificationMetrics {
        accuracy: ratio(tp + tn, total),
        negative: ClassMetrics {
            precision: ratio(tn, tn + fn_),
            recall: ratio(tn, tn + fp),
            support: tn + fp,
        },
        positive: ClassMetrics {
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            support: tp + fn_,
        },
    }
}

// Zero denominators report 0 rather than NaN.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
