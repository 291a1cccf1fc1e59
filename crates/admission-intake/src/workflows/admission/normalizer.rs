//! Enquiry/Admission reconciliation into one canonical draft.
//!
//! Handles:
//! - Field renames between schemas (`residentialAddress` → `address`, `interestCourse` →
//!   `courseApplied`)
//! - Yes/no coercion of booleans, boolean strings and mixed-case answers
//! - Case policy per field category (capitalize-first, title case, uppercase)
//! - "Other" sentinels replaced by their free-text companion
//!
//! Everything here is pure: same input, same draft.

use std::collections::BTreeSet;

use super::domain::{AdmissionRecord, Enquiry, GoalList, RawAmount, RawFlag};
use super::draft::{
    AdmissionDraft, AttachmentRef, Choice, DocumentField, DraftAction, PaymentDetails,
};
use super::fees;

/// Borrowed upstream record tagged with its schema.
#[derive(Debug, Clone, Copy)]
pub enum SourceRecord<'a> {
    Enquiry(&'a Enquiry),
    Admission(&'a AdmissionRecord),
}

/// Build a canonical draft from either upstream schema.
pub fn normalize(source: SourceRecord<'_>) -> AdmissionDraft {
    match source {
        SourceRecord::Enquiry(enquiry) => from_enquiry(enquiry),
        SourceRecord::Admission(record) => from_admission(record),
    }
}

/// `"Yes"`/`"No"` for recognised answers, `"No"` when missing, otherwise the text itself.
pub fn coerce_yes_no(raw: Option<&RawFlag>) -> String {
    coerce_choice(raw, None).label().to_string()
}

/// Interpret a flag together with its free-text companion.
pub fn coerce_choice(raw: Option<&RawFlag>, companion: Option<&str>) -> Choice {
    let companion = text(companion);
    let choice = match raw {
        None => Choice::No,
        Some(RawFlag::Bool(true)) => Choice::Yes,
        Some(RawFlag::Bool(false)) => Choice::No,
        Some(RawFlag::Text(value)) => {
            let value = value.trim();
            match value.to_ascii_lowercase().as_str() {
                "true" | "yes" => Choice::Yes,
                "false" | "no" | "" => Choice::No,
                _ if is_other(value) => Choice::Other(capitalize_first(&companion)),
                _ if !companion.is_empty() => Choice::Other(capitalize_first(&companion)),
                _ => Choice::Other(capitalize_first(value)),
            }
        }
    };
    choice.canonical()
}

/// Selector value unless it is the `other` sentinel and a companion was given.
pub fn resolve_other(selector: Option<&str>, companion: Option<&str>) -> String {
    let selector = text(selector);
    let companion = text(companion);
    if is_other(&selector) {
        if companion.is_empty() {
            "Other".to_string()
        } else {
            companion
        }
    } else {
        selector
    }
}

pub fn is_other(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("other")
}

/// First letter upper case, the rest lower case.
pub fn capitalize_first(value: &str) -> String {
    let trimmed = value.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Every whitespace-separated word capitalized, inner whitespace collapsed.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn upper(value: Option<&str>) -> String {
    text(value).to_ascii_uppercase()
}

fn capitalized(value: Option<&str>) -> String {
    capitalize_first(value.unwrap_or_default())
}

fn titled(value: Option<&str>) -> String {
    title_case(value.unwrap_or_default())
}

fn goals<'a>(lists: impl IntoIterator<Item = Option<&'a GoalList>>) -> BTreeSet<String> {
    lists
        .into_iter()
        .flatten()
        .flat_map(GoalList::items)
        .collect()
}

fn from_enquiry(enquiry: &Enquiry) -> AdmissionDraft {
    let course_applied = resolve_other(
        enquiry.interest_course.as_deref(),
        enquiry.interest_course_other.as_deref(),
    );
    let referral_source = resolve_other(
        enquiry.referral_source.as_deref(),
        enquiry.referral_source_other.as_deref(),
    );

    AdmissionDraft {
        id: None,
        enquiry_id: text(enquiry.id.as_deref()),
        center_code: upper(enquiry.center_code.as_deref()),
        employee_id: text(enquiry.employee_id.as_deref()),
        full_name: titled(enquiry.full_name.as_deref()),
        father_name: titled(enquiry.father_name.as_deref()),
        mother_name: titled(enquiry.mother_name.as_deref()),
        guardian_name: titled(enquiry.guardian_name.as_deref()),
        date_of_birth: text(enquiry.date_of_birth.as_deref()),
        gender: capitalized(enquiry.gender.as_deref()),
        category: capitalized(enquiry.category.as_deref()),
        religion: capitalized(enquiry.religion.as_deref()),
        nationality: capitalized(enquiry.nationality.as_deref()),
        aadhar_number: text(enquiry.aadhar_number.as_deref()),
        specially_abled: coerce_choice(
            enquiry.specially_abled.as_ref(),
            enquiry.specially_abled_details.as_deref(),
        ),
        ex_servicemen: coerce_choice(enquiry.ex_servicemen.as_ref(), None),
        mobile_number: text(enquiry.mobile_number.as_deref()),
        alternate_mobile: text(enquiry.alternate_mobile.as_deref()),
        email: text(enquiry.email.as_deref()),
        address: text(enquiry.residential_address.as_deref()),
        city: text(enquiry.city.as_deref()),
        state: text(enquiry.state.as_deref()),
        pin_code: text(enquiry.pin_code.as_deref()),
        highest_qualification: text(enquiry.highest_qualification.as_deref()),
        board_university: titled(enquiry.board_university.as_deref()),
        passing_year: text(enquiry.passing_year.as_deref()),
        percentage: text(enquiry.percentage.as_deref()),
        course_applied,
        course_applied_other: text(enquiry.interest_course_other.as_deref()),
        computer_access: coerce_choice(
            enquiry.computer_access.as_ref(),
            enquiry.computer_access_other.as_deref(),
        ),
        referral_source,
        referral_source_other: text(enquiry.referral_source_other.as_deref()),
        referred_by: text(enquiry.referred_by.as_deref()),
        future_goals: goals([enquiry.goals.as_ref(), enquiry.future_goals.as_ref()]),
        ..AdmissionDraft::default()
    }
}

fn from_admission(record: &AdmissionRecord) -> AdmissionDraft {
    let mut draft = AdmissionDraft {
        id: record.id.clone(),
        enquiry_id: text(record.enquiry_id.as_deref()),
        form_no: text(record.form_no.as_deref()),
        center_code: upper(record.center_code.as_deref()),
        employee_id: text(record.employee_id.as_deref()),
        reg_no: text(record.reg_no.as_deref()),
        generated_reg_no: text(record.generated_reg_no.as_deref()),
        month: text(record.month.as_deref()),
        admission_date: text(record.admission_date.as_deref()),
        full_name: titled(record.full_name.as_deref()),
        father_name: titled(record.father_name.as_deref()),
        mother_name: titled(record.mother_name.as_deref()),
        guardian_name: titled(record.guardian_name.as_deref()),
        date_of_birth: text(record.date_of_birth.as_deref()),
        gender: capitalized(record.gender.as_deref()),
        category: capitalized(record.category.as_deref()),
        religion: capitalized(record.religion.as_deref()),
        nationality: capitalized(record.nationality.as_deref()),
        aadhar_number: text(record.aadhar_number.as_deref()),
        specially_abled: coerce_choice(
            record.specially_abled.as_ref(),
            record.specially_abled_details.as_deref(),
        ),
        ex_servicemen: coerce_choice(record.ex_servicemen.as_ref(), None),
        mobile_number: text(record.mobile_number.as_deref()),
        alternate_mobile: text(record.alternate_mobile.as_deref()),
        email: text(record.email.as_deref()),
        address: text(record.address.as_deref()),
        city: text(record.city.as_deref()),
        state: text(record.state.as_deref()),
        pin_code: text(record.pin_code.as_deref()),
        highest_qualification: text(record.highest_qualification.as_deref()),
        board_university: titled(record.board_university.as_deref()),
        passing_year: text(record.passing_year.as_deref()),
        percentage: text(record.percentage.as_deref()),
        course_applied: resolve_other(
            record.course_applied.as_deref(),
            record.course_applied_other.as_deref(),
        ),
        course_applied_other: text(record.course_applied_other.as_deref()),
        computer_access: coerce_choice(
            record.computer_access.as_ref(),
            record.computer_access_other.as_deref(),
        ),
        referral_source: resolve_other(
            record.referral_source.as_deref(),
            record.referral_source_other.as_deref(),
        ),
        referral_source_other: text(record.referral_source_other.as_deref()),
        referred_by: text(record.referred_by.as_deref()),
        future_goals: goals([record.future_goals.as_ref()]),
        payment: PaymentDetails {
            total_fee: amount_text(&record.total_fee),
            discount: amount_text(&record.discount),
            paid_fee: amount_text(&record.paid_fee),
            payment_method: text(record.payment_method.as_deref()),
            transaction_id: text(record.transaction_id.as_deref()),
            payment_date: text(record.payment_date.as_deref()),
            payment_status: text(record.payment_status.as_deref()),
            ..PaymentDetails::default()
        },
        ..AdmissionDraft::default()
    };

    let documents = [
        (DocumentField::Photo, &record.photo),
        (DocumentField::Signature, &record.signature),
        (DocumentField::Thumbprint, &record.thumbprint),
        (DocumentField::Marksheet10th, &record.marksheet_10th),
        (DocumentField::Marksheet12th, &record.marksheet_12th),
        (DocumentField::GraduationMarksheet, &record.graduation_marksheet),
        (DocumentField::IdProof, &record.id_proof),
    ];
    for (field, path) in documents {
        let path = text(path.as_deref());
        if !path.is_empty() {
            draft.apply(DraftAction::SetAttachment(
                field,
                AttachmentRef::Stored(path),
            ));
        }
    }

    // Stored net/remaining values are ignored; they are re-derived from the inputs.
    let breakdown = fees::recompute(
        &draft.payment.total_fee,
        &draft.payment.discount,
        &draft.payment.paid_fee,
    );
    draft.payment.net_fee = breakdown.net_fee;
    draft.payment.remaining_fee = breakdown.remaining_fee;
    draft
}

fn amount_text(value: &Option<RawAmount>) -> String {
    value.as_ref().map(|amount| amount.as_input()).unwrap_or_default()
}
