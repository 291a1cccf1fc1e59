//! Wire shapes for the two upstream schemas: Enquiry (lead) and Admission (student record).
//!
//! Both schemas evolved independently, so every field is optional and several accept more than
//! one JSON representation. Nothing here is canonical; the normalizer turns these into an
//! [`AdmissionDraft`](super::draft::AdmissionDraft).

use serde::{Deserialize, Serialize};

use super::fees::parse_amount;

/// Backend-assigned persistence identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    /// A persisted identifier is 24 hexadecimal characters. Anything else is treated as absent.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 24 && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Yes/no style value as sent upstream: sometimes a JSON boolean, sometimes text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFlag {
    Bool(bool),
    Text(String),
}

impl From<&str> for RawFlag {
    fn from(value: &str) -> Self {
        RawFlag::Text(value.to_string())
    }
}

/// Monetary amount as sent upstream: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Render the amount as editable input text.
    pub fn as_input(&self) -> String {
        match self {
            RawAmount::Number(value) => format_amount(*value),
            RawAmount::Text(text) => text.trim().to_string(),
        }
    }
}

pub(crate) fn format_amount(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Multi-select goal values: an array on newer records, a comma-joined string on older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GoalList {
    Many(Vec<String>),
    Joined(String),
}

impl GoalList {
    pub fn items(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            GoalList::Many(values) => values.iter().map(String::as_str).collect(),
            GoalList::Joined(joined) => joined.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Lead record created by the (external) enquiry form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enquiry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "name")]
    pub full_name: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub guardian_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub religion: Option<String>,
    pub nationality: Option<String>,
    pub aadhar_number: Option<String>,
    pub residential_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pin_code: Option<String>,
    pub mobile_number: Option<String>,
    pub alternate_mobile: Option<String>,
    pub email: Option<String>,
    pub highest_qualification: Option<String>,
    pub board_university: Option<String>,
    pub passing_year: Option<String>,
    pub percentage: Option<String>,
    pub interest_course: Option<String>,
    pub interest_course_other: Option<String>,
    pub referral_source: Option<String>,
    pub referral_source_other: Option<String>,
    pub referred_by: Option<String>,
    pub specially_abled: Option<RawFlag>,
    pub specially_abled_details: Option<String>,
    pub computer_access: Option<RawFlag>,
    pub computer_access_other: Option<String>,
    pub ex_servicemen: Option<RawFlag>,
    pub goals: Option<GoalList>,
    pub future_goals: Option<GoalList>,
    pub center_code: Option<String>,
    pub employee_id: Option<String>,
}

impl Enquiry {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().map(str::trim).unwrap_or_default()
    }
}

/// Persisted student record. Also the request body for create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<StudentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquiry_id: Option<String>,
    pub form_no: Option<String>,
    pub center_code: Option<String>,
    pub employee_id: Option<String>,
    pub reg_no: Option<String>,
    pub generated_reg_no: Option<String>,
    pub month: Option<String>,
    pub admission_date: Option<String>,
    #[serde(alias = "name")]
    pub full_name: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub guardian_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub religion: Option<String>,
    pub nationality: Option<String>,
    pub aadhar_number: Option<String>,
    pub specially_abled: Option<RawFlag>,
    pub specially_abled_details: Option<String>,
    pub ex_servicemen: Option<RawFlag>,
    pub mobile_number: Option<String>,
    pub alternate_mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pin_code: Option<String>,
    pub highest_qualification: Option<String>,
    pub board_university: Option<String>,
    pub passing_year: Option<String>,
    pub percentage: Option<String>,
    pub course_applied: Option<String>,
    pub course_applied_other: Option<String>,
    pub computer_access: Option<RawFlag>,
    pub computer_access_other: Option<String>,
    pub referral_source: Option<String>,
    pub referral_source_other: Option<String>,
    pub referred_by: Option<String>,
    pub future_goals: Option<GoalList>,
    pub photo: Option<String>,
    pub signature: Option<String>,
    pub thumbprint: Option<String>,
    #[serde(rename = "marksheet10th")]
    pub marksheet_10th: Option<String>,
    #[serde(rename = "marksheet12th")]
    pub marksheet_12th: Option<String>,
    pub graduation_marksheet: Option<String>,
    pub id_proof: Option<String>,
    pub total_fee: Option<RawAmount>,
    pub discount: Option<RawAmount>,
    pub net_fee: Option<RawAmount>,
    pub paid_fee: Option<RawAmount>,
    pub remaining_fee: Option<RawAmount>,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_date: Option<String>,
    pub payment_status: Option<String>,
}

impl AdmissionRecord {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Registration number shown to staff, preferring the generated one.
    pub fn registration_number(&self) -> Option<&str> {
        [self.generated_reg_no.as_deref(), self.reg_no.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn amount(value: &Option<RawAmount>) -> f64 {
        match value {
            Some(RawAmount::Number(number)) if number.is_finite() => *number,
            Some(RawAmount::Text(text)) => parse_amount(text),
            _ => 0.0,
        }
    }
}

/// Which upstream schema a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Admission,
    Enquiry,
    None,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::Admission => "admission",
            RecordKind::Enquiry => "enquiry",
            RecordKind::None => "none",
        }
    }
}
