//! Statement eligibility policy.
//!
//! A statement is "constitutionable" when it may be included in a generated
//! constitution. An explicit override on the statement always wins; without
//! one, at least two thirds of all votes cast must be AGREE.

use osccai_db::entities::statement;

/// Agreement threshold as an exact fraction (numerator, denominator).
pub const AGREEMENT_THRESHOLD: (i64, i64) = (2, 3);

/// Whether `agree` out of all votes meets the agreement threshold.
///
/// Compared by cross-multiplication so the 2/3 boundary is exact and
/// inclusive. No votes never meets the threshold.
#[must_use]
pub fn meets_threshold(agree: i32, disagree: i32, pass: i32) -> bool {
    let total = i64::from(agree) + i64::from(disagree) + i64::from(pass);
    if total <= 0 {
        return false;
    }

    let (num, den) = AGREEMENT_THRESHOLD;
    den * i64::from(agree) >= num * total
}

/// Resolve the tri-state override against the vote tallies.
#[must_use]
pub fn is_constitutionable(statement: &statement::Model) -> bool {
    match statement.is_constitutionable {
        Some(explicit) => explicit,
        None => meets_threshold(
            statement.agree_count,
            statement.disagree_count,
            statement.pass_count,
        ),
    }
}

/// Share of AGREE votes as a percentage, for display.
#[must_use]
pub fn agreement_percentage(agree: i32, disagree: i32, pass: i32) -> f64 {
    let total = f64::from(agree) + f64::from(disagree) + f64::from(pass);
    if total == 0.0 {
        0.0
    } else {
        f64::from(agree) / total * 100.0
    }
}
