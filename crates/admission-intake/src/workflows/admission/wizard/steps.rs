use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::super::draft::{AdmissionDraft, ChoiceField, DocumentField, DraftField, FeeInput};
use super::super::fees::parse_amount;
use super::super::normalizer::is_other;
use super::super::payload::parse_date;

/// The six intake steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    BasicInfo,
    Documents,
    Contact,
    Education,
    Payment,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::BasicInfo,
        WizardStep::Documents,
        WizardStep::Contact,
        WizardStep::Education,
        WizardStep::Payment,
        WizardStep::Review,
    ];

    /// 1-based position shown to users.
    pub const fn number(self) -> u8 {
        match self {
            WizardStep::BasicInfo => 1,
            WizardStep::Documents => 2,
            WizardStep::Contact => 3,
            WizardStep::Education => 4,
            WizardStep::Payment => 5,
            WizardStep::Review => 6,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.number() == number)
    }

    pub const fn title(self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "Basic Info",
            WizardStep::Documents => "Documents",
            WizardStep::Contact => "Contact",
            WizardStep::Education => "Education",
            WizardStep::Payment => "Payment",
            WizardStep::Review => "Review",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }
}

/// Field key → user-facing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn remove(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.0.entry(field).or_insert(message);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{} field(s) need attention: {joined}", self.len())
    }
}

impl std::error::Error for ValidationErrors {}

/// Step-local checks run before advancing past `step`.
pub fn validate_step(step: WizardStep, draft: &AdmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    match step {
        WizardStep::BasicInfo => basic_info(draft, &mut errors),
        WizardStep::Documents => documents(draft, &mut errors),
        WizardStep::Contact => contact(draft, &mut errors),
        WizardStep::Education => education(draft, &mut errors),
        WizardStep::Payment => payment(draft, &mut errors),
        WizardStep::Review => {}
    }
    errors
}

/// Every step up to, but excluding, review.
pub fn validate_all(draft: &AdmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for step in WizardStep::ALL {
        errors.merge(validate_step(step, draft));
    }
    errors
}

fn require(draft: &AdmissionDraft, errors: &mut ValidationErrors, fields: &[(DraftField, &str)]) {
    for (field, label) in fields {
        if field.value(draft).trim().is_empty() {
            errors.insert(field.key(), format!("{label} is required"));
        }
    }
}

fn digits_only(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn has_digits(value: &str, count: usize) -> bool {
    let compact = digits_only(value);
    compact.len() == count && compact.chars().all(|c| c.is_ascii_digit())
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn basic_info(draft: &AdmissionDraft, errors: &mut ValidationErrors) {
    require(
        draft,
        errors,
        &[
            (DraftField::FullName, "Full name"),
            (DraftField::FatherName, "Father's name"),
            (DraftField::DateOfBirth, "Date of birth"),
            (DraftField::Gender, "Gender"),
            (DraftField::Category, "Category"),
            (DraftField::Nationality, "Nationality"),
            (DraftField::AadharNumber, "Aadhar number"),
        ],
    );

    if !draft.date_of_birth.trim().is_empty() && parse_date(&draft.date_of_birth).is_none() {
        errors.insert(
            DraftField::DateOfBirth.key(),
            "Date of birth must be a valid date (YYYY-MM-DD)",
        );
    }
    if !draft.aadhar_number.trim().is_empty() && !has_digits(&draft.aadhar_number, 12) {
        errors.insert(
            DraftField::AadharNumber.key(),
            "Aadhar number must be 12 digits",
        );
    }
    if draft.specially_abled.missing_detail() {
        errors.insert(
            "speciallyAbledDetails",
            "Describe the disability when selecting Other",
        );
    }
    if draft.ex_servicemen.missing_detail() {
        errors.insert(ChoiceField::ExServicemen.key(), "Select Yes or No");
    }
}

fn documents(draft: &AdmissionDraft, errors: &mut ValidationErrors) {
    for field in [DocumentField::Photo, DocumentField::Signature] {
        if !draft.documents.is_filled(field) {
            errors.insert(field.key(), format!("{} is required", field.label()));
        }
    }
}

fn contact(draft: &AdmissionDraft, errors: &mut ValidationErrors) {
    require(
        draft,
        errors,
        &[
            (DraftField::MobileNumber, "Mobile number"),
            (DraftField::Address, "Address"),
            (DraftField::City, "City"),
            (DraftField::State, "State"),
            (DraftField::PinCode, "PIN code"),
        ],
    );

    if !draft.mobile_number.trim().is_empty() && !has_digits(&draft.mobile_number, 10) {
        errors.insert(
            DraftField::MobileNumber.key(),
            "Mobile number must be 10 digits",
        );
    }
    if !draft.alternate_mobile.trim().is_empty() && !has_digits(&draft.alternate_mobile, 10) {
        errors.insert(
            DraftField::AlternateMobile.key(),
            "Alternate mobile number must be 10 digits",
        );
    }
    if !draft.pin_code.trim().is_empty() && !has_digits(&draft.pin_code, 6) {
        errors.insert(DraftField::PinCode.key(), "PIN code must be 6 digits");
    }
    if !draft.email.trim().is_empty() && !looks_like_email(&draft.email) {
        errors.insert(DraftField::Email.key(), "Email address is not valid");
    }
}

fn education(draft: &AdmissionDraft, errors: &mut ValidationErrors) {
    require(
        draft,
        errors,
        &[
            (DraftField::HighestQualification, "Highest qualification"),
            (DraftField::CourseApplied, "Course"),
        ],
    );

    if is_other(&draft.course_applied) && draft.course_applied_other.trim().is_empty() {
        errors.insert(
            DraftField::CourseAppliedOther.key(),
            "Specify the course when selecting Other",
        );
    }
    if is_other(&draft.referral_source) && draft.referral_source_other.trim().is_empty() {
        errors.insert(
            DraftField::ReferralSourceOther.key(),
            "Specify the referral source when selecting Other",
        );
    }
    if draft.computer_access.missing_detail() {
        errors.insert(
            "computerAccessOther",
            "Describe computer access when selecting Other",
        );
    }
}

fn is_number(raw: &str) -> bool {
    raw.trim()
        .parse::<f64>()
        .map(|value| value.is_finite())
        .unwrap_or(false)
}

fn payment(draft: &AdmissionDraft, errors: &mut ValidationErrors) {
    let payment = &draft.payment;
    require(
        draft,
        errors,
        &[(DraftField::PaymentMethod, "Payment method")],
    );

    let total = FeeInput::TotalFee.value(payment);
    if total.trim().is_empty() {
        errors.insert(FeeInput::TotalFee.key(), "Total fee is required");
    } else if !is_number(total) || parse_amount(total) <= 0.0 {
        errors.insert(
            FeeInput::TotalFee.key(),
            "Total fee must be a number greater than zero",
        );
    }

    for input in [FeeInput::Discount, FeeInput::PaidFee] {
        let raw = input.value(payment);
        if !raw.trim().is_empty() && !is_number(raw) {
            errors.insert(input.key(), "Must be a number");
        }
    }

    if !payment.payment_date.trim().is_empty() && parse_date(&payment.payment_date).is_none() {
        errors.insert(
            DraftField::PaymentDate.key(),
            "Payment date must be a valid date (YYYY-MM-DD)",
        );
    }

    let paid = parse_amount(&payment.paid_fee);
    let cash = payment.payment_method.trim().eq_ignore_ascii_case("cash");
    if paid > 0.0
        && !cash
        && !payment.payment_method.trim().is_empty()
        && payment.transaction_id.trim().is_empty()
    {
        errors.insert(
            DraftField::TransactionId.key(),
            "Transaction ID is required for non-cash payments",
        );
    }
}
