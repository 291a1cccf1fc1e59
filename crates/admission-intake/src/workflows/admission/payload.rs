use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::domain::{format_amount, AdmissionRecord, GoalList, RawAmount, RawFlag};
use super::draft::{AdmissionDraft, DocumentField};
use super::fees::{self, parse_amount};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted date spellings, tried in order after RFC 3339.
const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Parse any accepted date spelling into `YYYY-MM-DD`.
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|date| date.format(DATE_FORMAT).to_string())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(timestamp.date());
    }
    DATE_INPUTS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Request body for create/update. Fees become numbers, dates become `YYYY-MM-DD`.
pub fn build_payload(draft: &AdmissionDraft, today: NaiveDate) -> AdmissionRecord {
    let breakdown = fees::recompute(
        &draft.payment.total_fee,
        &draft.payment.discount,
        &draft.payment.paid_fee,
    );
    let paid_fee = parse_amount(&draft.payment.paid_fee);
    let today_text = today.format(DATE_FORMAT).to_string();

    let payment_status = if draft.payment.payment_status.trim().is_empty() {
        derived_payment_status(paid_fee, breakdown.remaining_fee).to_string()
    } else {
        draft.payment.payment_status.trim().to_string()
    };

    let document = |field: DocumentField| Some(draft.documents.path(field).trim().to_string());

    AdmissionRecord {
        id: draft.id.clone(),
        enquiry_id: Some(draft.enquiry_id.trim().to_string()).filter(|id| !id.is_empty()),
        form_no: text(&draft.form_no),
        center_code: text(&draft.center_code.to_ascii_uppercase()),
        employee_id: text(&draft.employee_id),
        reg_no: text(&draft.reg_no),
        generated_reg_no: text(&draft.generated_reg_no),
        month: text(&draft.month),
        admission_date: Some(date_or(&draft.admission_date, &today_text)),
        full_name: text(&draft.full_name),
        father_name: text(&draft.father_name),
        mother_name: text(&draft.mother_name),
        guardian_name: text(&draft.guardian_name),
        date_of_birth: Some(
            normalize_date(&draft.date_of_birth)
                .unwrap_or_else(|| draft.date_of_birth.trim().to_string()),
        ),
        gender: text(&draft.gender),
        category: text(&draft.category),
        religion: text(&draft.religion),
        nationality: text(&draft.nationality),
        aadhar_number: text(&draft.aadhar_number),
        specially_abled: Some(RawFlag::Text(draft.specially_abled.label().to_string())),
        specially_abled_details: text(draft.specially_abled.detail()),
        ex_servicemen: Some(RawFlag::Text(draft.ex_servicemen.label().to_string())),
        mobile_number: text(&draft.mobile_number),
        alternate_mobile: text(&draft.alternate_mobile),
        email: text(&draft.email),
        address: text(&draft.address),
        city: text(&draft.city),
        state: text(&draft.state),
        pin_code: text(&draft.pin_code),
        highest_qualification: text(&draft.highest_qualification),
        board_university: text(&draft.board_university),
        passing_year: text(&draft.passing_year),
        percentage: text(&draft.percentage),
        course_applied: text(&draft.course_applied),
        course_applied_other: text(&draft.course_applied_other),
        computer_access: Some(RawFlag::Text(draft.computer_access.label().to_string())),
        computer_access_other: text(draft.computer_access.detail()),
        referral_source: text(&draft.referral_source),
        referral_source_other: text(&draft.referral_source_other),
        referred_by: text(&draft.referred_by),
        future_goals: Some(GoalList::Many(draft.future_goals.iter().cloned().collect())),
        photo: document(DocumentField::Photo),
        signature: document(DocumentField::Signature),
        thumbprint: document(DocumentField::Thumbprint),
        marksheet_10th: document(DocumentField::Marksheet10th),
        marksheet_12th: document(DocumentField::Marksheet12th),
        graduation_marksheet: document(DocumentField::GraduationMarksheet),
        id_proof: document(DocumentField::IdProof),
        total_fee: Some(RawAmount::Number(parse_amount(&draft.payment.total_fee))),
        discount: Some(RawAmount::Number(parse_amount(&draft.payment.discount))),
        net_fee: Some(RawAmount::Number(breakdown.net_fee)),
        paid_fee: Some(RawAmount::Number(paid_fee)),
        remaining_fee: Some(RawAmount::Number(breakdown.remaining_fee)),
        payment_method: text(&draft.payment.payment_method),
        transaction_id: text(&draft.payment.transaction_id),
        payment_date: Some(date_or(&draft.payment.payment_date, &today_text)),
        payment_status: Some(payment_status),
    }
}

/// `Paid` once nothing remains, `Partial` after any payment, otherwise `Pending`.
pub fn derived_payment_status(paid_fee: f64, remaining_fee: f64) -> &'static str {
    if paid_fee > 0.0 && remaining_fee <= 0.0 {
        "Paid"
    } else if paid_fee > 0.0 {
        "Partial"
    } else {
        "Pending"
    }
}

/// Compact summary used in notices and logs.
pub fn describe_fees(record: &AdmissionRecord) -> String {
    format!(
        "net {} / paid {} / remaining {}",
        format_amount(AdmissionRecord::amount(&record.net_fee)),
        format_amount(AdmissionRecord::amount(&record.paid_fee)),
        format_amount(AdmissionRecord::amount(&record.remaining_fee)),
    )
}

fn text(value: &str) -> Option<String> {
    Some(value.trim().to_string())
}

fn date_or(raw: &str, fallback: &str) -> String {
    if raw.trim().is_empty() {
        fallback.to_string()
    } else {
        normalize_date(raw).unwrap_or_else(|| raw.trim().to_string())
    }
}
