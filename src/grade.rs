use serde::Serialize;

/// Fixed banding thresholds, highest first.
const BANDS: [(f64, Letter); 4] = [
    (90.0, Letter::A),
    (75.0, Letter::B),
    (60.0, Letter::C),
    (40.0, Letter::D),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub letter: Letter,
    pub status: Status,
}

/// Map a score (a single subject mark or an aggregate percentage) to its band.
///
/// Not clamped: anything below 40 is an `F`, anything at or above 90 is an `A`.
pub fn grade(score: f64) -> Grade {
    for (floor, letter) in BANDS {
        if score >= floor {
            return Grade {
                letter,
                status: Status::Pass,
            };
        }
    }
    Grade {
        letter: Letter::F,
        status: Status::Fail,
    }
}

pub fn grade_mark(mark: u8) -> Grade {
    grade(f64::from(mark))
}

/// `total / possible * 100` to two decimal places, or 0 when nothing is
/// graded. Rounds the exact binary value with ties to even, so `75.125`
/// becomes `75.12`.
pub fn percentage(total_score: u32, total_possible: u32) -> f64 {
    if total_possible == 0 {
        return 0.0;
    }
    let raw = f64::from(total_score) / f64::from(total_possible) * 100.0;
    format!("{raw:.2}").parse().unwrap_or(raw)
}
