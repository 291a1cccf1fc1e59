//! Human-readable registration and form numbers.
//!
//! The four-digit suffix is random and never checked against existing records, so two
//! admissions at the same center in the same month collide with probability 1/9000 per pair.

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CENTER_CODE: &str = "C001";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationNumber {
    pub reg_no: String,
    /// `M/YY`, used for display and monthly grouping.
    pub month: String,
}

/// `R` + center code + month + two-digit year + random suffix in `1000..=9999`.
pub fn generate(center_code: &str, today: NaiveDate) -> RegistrationNumber {
    generate_with_rng(center_code, today, &mut rand::thread_rng())
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    center_code: &str,
    today: NaiveDate,
    rng: &mut R,
) -> RegistrationNumber {
    let center = center_code.trim().to_ascii_uppercase();
    let center = if center.is_empty() {
        DEFAULT_CENTER_CODE.to_string()
    } else {
        center
    };
    let month = today.month();
    let year = today.year().rem_euclid(100);
    let suffix: u16 = rng.gen_range(1000..=9999);

    RegistrationNumber {
        reg_no: format!("R{center}{month}{year:02}{suffix}"),
        month: format!("{month}/{year:02}"),
    }
}

/// Session form number: `F` + `YYMMDD` + random suffix.
pub fn form_number<R: Rng + ?Sized>(today: NaiveDate, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(1000..=9999);
    format!(
        "F{:02}{:02}{:02}{suffix}",
        today.year().rem_euclid(100),
        today.month(),
        today.day()
    )
}
