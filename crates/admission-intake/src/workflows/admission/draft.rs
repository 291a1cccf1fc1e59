//! The canonical in-progress admission and the single reducer that mutates it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::StudentId;
use super::fees::{self, FeeBreakdown};
use super::registration::RegistrationNumber;

/// Closed yes/no/other answer. `Other` carries the free-text companion value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "value", content = "detail")]
pub enum Choice {
    Yes,
    #[default]
    No,
    Other(String),
}

impl Choice {
    /// Effective display/stored value: the companion text wins for `Other`.
    pub fn label(&self) -> &str {
        match self {
            Choice::Yes => "Yes",
            Choice::No => "No",
            Choice::Other(detail) if !detail.trim().is_empty() => detail.trim(),
            Choice::Other(_) => "Other",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Choice::Other(detail) => detail.trim(),
            _ => "",
        }
    }

    /// `Other` was picked but the companion field is still blank.
    pub fn missing_detail(&self) -> bool {
        matches!(self, Choice::Other(detail) if detail.trim().is_empty())
    }

    /// An `Other` whose detail is itself a yes/no answer collapses to that answer, since the
    /// stored selector carries the detail text.
    pub fn canonical(self) -> Self {
        match self {
            Choice::Other(detail) => {
                let answer = detail.trim().to_ascii_lowercase();
                match answer.as_str() {
                    "yes" | "true" => Choice::Yes,
                    "no" | "false" => Choice::No,
                    _ => Choice::Other(detail),
                }
            }
            choice => choice,
        }
    }
}

/// Supporting documents collected on the Documents step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentField {
    Photo,
    Signature,
    Thumbprint,
    #[serde(rename = "marksheet10th")]
    Marksheet10th,
    #[serde(rename = "marksheet12th")]
    Marksheet12th,
    GraduationMarksheet,
    IdProof,
}

impl DocumentField {
    pub const ALL: [DocumentField; 7] = [
        DocumentField::Photo,
        DocumentField::Signature,
        DocumentField::Thumbprint,
        DocumentField::Marksheet10th,
        DocumentField::Marksheet12th,
        DocumentField::GraduationMarksheet,
        DocumentField::IdProof,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            DocumentField::Photo => "photo",
            DocumentField::Signature => "signature",
            DocumentField::Thumbprint => "thumbprint",
            DocumentField::Marksheet10th => "marksheet10th",
            DocumentField::Marksheet12th => "marksheet12th",
            DocumentField::GraduationMarksheet => "graduationMarksheet",
            DocumentField::IdProof => "idProof",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentField::Photo => "Photo",
            DocumentField::Signature => "Signature",
            DocumentField::Thumbprint => "Thumbprint",
            DocumentField::Marksheet10th => "10th marksheet",
            DocumentField::Marksheet12th => "12th marksheet",
            DocumentField::GraduationMarksheet => "Graduation marksheet",
            DocumentField::IdProof => "ID proof",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// What a document slot points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum AttachmentRef {
    /// Path returned by storage.
    Stored(String),
    /// Bare file name kept after a failed upload; never persisted remotely.
    Placeholder(String),
}

impl AttachmentRef {
    pub fn path(&self) -> &str {
        match self {
            AttachmentRef::Stored(path) | AttachmentRef::Placeholder(path) => path,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, AttachmentRef::Placeholder(_))
    }
}

/// One reference per document field at most. A missing key is an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachments(BTreeMap<DocumentField, AttachmentRef>);

impl Attachments {
    pub fn get(&self, field: DocumentField) -> Option<&AttachmentRef> {
        self.0.get(&field)
    }

    /// Stored path or placeholder name, empty when unset.
    pub fn path(&self, field: DocumentField) -> &str {
        self.get(field).map(AttachmentRef::path).unwrap_or_default()
    }

    pub fn is_filled(&self, field: DocumentField) -> bool {
        !self.path(field).trim().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentField, &AttachmentRef)> {
        self.0.iter().map(|(field, reference)| (*field, reference))
    }

    fn set(&mut self, field: DocumentField, reference: AttachmentRef) {
        if reference.path().trim().is_empty() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, reference);
        }
    }

    fn clear(&mut self, field: DocumentField) {
        self.0.remove(&field);
    }
}

/// Payment inputs as edited text plus the derived breakdown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub total_fee: String,
    pub discount: String,
    pub paid_fee: String,
    pub net_fee: f64,
    pub remaining_fee: f64,
    pub payment_method: String,
    pub transaction_id: String,
    pub payment_date: String,
    pub payment_status: String,
}

/// The admission being assembled by the wizard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDraft {
    #[serde(rename = "_id")]
    pub id: Option<StudentId>,
    pub enquiry_id: String,
    pub form_no: String,
    pub center_code: String,
    pub employee_id: String,
    pub reg_no: String,
    pub generated_reg_no: String,
    pub month: String,
    pub admission_date: String,
    pub full_name: String,
    pub father_name: String,
    pub mother_name: String,
    pub guardian_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub category: String,
    pub religion: String,
    pub nationality: String,
    pub aadhar_number: String,
    pub specially_abled: Choice,
    pub ex_servicemen: Choice,
    pub mobile_number: String,
    pub alternate_mobile: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
    pub highest_qualification: String,
    pub board_university: String,
    pub passing_year: String,
    pub percentage: String,
    pub course_applied: String,
    pub course_applied_other: String,
    pub computer_access: Choice,
    pub referral_source: String,
    pub referral_source_other: String,
    pub referred_by: String,
    pub future_goals: BTreeSet<String>,
    pub documents: Attachments,
    pub payment: PaymentDetails,
}

impl AdmissionDraft {
    /// Empty draft carrying a session's bookkeeping numbers.
    pub fn blank(form_no: String, center_code: &str, registration: RegistrationNumber) -> Self {
        Self {
            form_no,
            center_code: center_code.trim().to_ascii_uppercase(),
            generated_reg_no: registration.reg_no,
            month: registration.month,
            ..Self::default()
        }
    }

    /// Identifier to update against, if the draft is linked to a persisted admission.
    pub fn persisted_id(&self) -> Option<&StudentId> {
        self.id.as_ref().filter(|id| id.is_well_formed())
    }

    pub fn registration_number(&self) -> &str {
        [self.generated_reg_no.as_str(), self.reg_no.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    pub fn fee_breakdown(&self) -> FeeBreakdown {
        FeeBreakdown {
            net_fee: self.payment.net_fee,
            remaining_fee: self.payment.remaining_fee,
        }
    }

    /// Fill bookkeeping the source record did not carry from the current session draft.
    pub fn inherit_bookkeeping(&mut self, session: &AdmissionDraft) {
        for (target, source) in [
            (&mut self.form_no, &session.form_no),
            (&mut self.center_code, &session.center_code),
            (&mut self.employee_id, &session.employee_id),
            (&mut self.generated_reg_no, &session.generated_reg_no),
            (&mut self.month, &session.month),
        ] {
            if target.trim().is_empty() {
                target.clone_from(source);
            }
        }
    }

    /// The only mutation path for a draft held by the wizard.
    pub fn apply(&mut self, action: DraftAction) {
        match action {
            DraftAction::SetText(field, value) => *field.slot(self) = value,
            DraftAction::SetChoice(field, choice) => *field.slot(self) = choice.canonical(),
            DraftAction::SetChoiceDetail(field, detail) => {
                let slot = field.slot(self);
                if let Choice::Other(_) = slot {
                    *slot = Choice::Other(detail).canonical();
                }
            }
            DraftAction::SetGoals(goals) => {
                self.future_goals = goals
                    .into_iter()
                    .map(|goal| goal.trim().to_string())
                    .filter(|goal| !goal.is_empty())
                    .collect();
            }
            DraftAction::ToggleGoal(goal) => {
                let goal = goal.trim().to_string();
                if goal.is_empty() {
                    return;
                }
                if !self.future_goals.remove(&goal) {
                    self.future_goals.insert(goal);
                }
            }
            DraftAction::SetFee(input, value) => {
                *input.slot(&mut self.payment) = value;
                self.recompute_fees();
            }
            DraftAction::SetAttachment(field, reference) => self.documents.set(field, reference),
            DraftAction::ClearAttachment(field) => self.documents.clear(field),
            DraftAction::AssignRegistration(registration) => {
                self.generated_reg_no = registration.reg_no;
                self.month = registration.month;
            }
            DraftAction::Replace(draft) => {
                *self = *draft;
                self.recompute_fees();
            }
        }
    }

    fn recompute_fees(&mut self) {
        let breakdown = fees::recompute(
            &self.payment.total_fee,
            &self.payment.discount,
            &self.payment.paid_fee,
        );
        self.payment.net_fee = breakdown.net_fee;
        self.payment.remaining_fee = breakdown.remaining_fee;
    }
}

/// Tagged update dispatched through [`AdmissionDraft::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum DraftAction {
    SetText(DraftField, String),
    SetChoice(ChoiceField, Choice),
    /// Companion text for a choice; ignored unless the choice is currently `Other`.
    SetChoiceDetail(ChoiceField, String),
    SetGoals(BTreeSet<String>),
    ToggleGoal(String),
    SetFee(FeeInput, String),
    SetAttachment(DocumentField, AttachmentRef),
    ClearAttachment(DocumentField),
    AssignRegistration(RegistrationNumber),
    Replace(Box<AdmissionDraft>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceField {
    SpeciallyAbled,
    ExServicemen,
    ComputerAccess,
}

impl ChoiceField {
    pub const fn key(self) -> &'static str {
        match self {
            ChoiceField::SpeciallyAbled => "speciallyAbled",
            ChoiceField::ExServicemen => "exServicemen",
            ChoiceField::ComputerAccess => "computerAccess",
        }
    }

    /// Wire key of the free-text companion, for choices that have one.
    pub const fn companion_key(self) -> Option<&'static str> {
        match self {
            ChoiceField::SpeciallyAbled => Some("speciallyAbledDetails"),
            ChoiceField::ComputerAccess => Some("computerAccessOther"),
            ChoiceField::ExServicemen => None,
        }
    }

    pub fn from_companion_key(key: &str) -> Option<Self> {
        [ChoiceField::SpeciallyAbled, ChoiceField::ComputerAccess]
            .into_iter()
            .find(|field| field.companion_key() == Some(key))
    }

    pub fn value(self, draft: &AdmissionDraft) -> &Choice {
        match self {
            ChoiceField::SpeciallyAbled => &draft.specially_abled,
            ChoiceField::ExServicemen => &draft.ex_servicemen,
            ChoiceField::ComputerAccess => &draft.computer_access,
        }
    }

    fn slot(self, draft: &mut AdmissionDraft) -> &mut Choice {
        match self {
            ChoiceField::SpeciallyAbled => &mut draft.specially_abled,
            ChoiceField::ExServicemen => &mut draft.ex_servicemen,
            ChoiceField::ComputerAccess => &mut draft.computer_access,
        }
    }
}

/// Editable inputs of the fee breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeInput {
    TotalFee,
    Discount,
    PaidFee,
}

impl FeeInput {
    pub const fn key(self) -> &'static str {
        match self {
            FeeInput::TotalFee => "totalFee",
            FeeInput::Discount => "discount",
            FeeInput::PaidFee => "paidFee",
        }
    }

    pub fn value(self, payment: &PaymentDetails) -> &str {
        match self {
            FeeInput::TotalFee => &payment.total_fee,
            FeeInput::Discount => &payment.discount,
            FeeInput::PaidFee => &payment.paid_fee,
        }
    }

    fn slot(self, payment: &mut PaymentDetails) -> &mut String {
        match self {
            FeeInput::TotalFee => &mut payment.total_fee,
            FeeInput::Discount => &mut payment.discount,
            FeeInput::PaidFee => &mut payment.paid_fee,
        }
    }
}

/// Plain text fields of the draft, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    FormNo,
    CenterCode,
    EmployeeId,
    RegNo,
    AdmissionDate,
    FullName,
    FatherName,
    MotherName,
    GuardianName,
    DateOfBirth,
    Gender,
    Category,
    Religion,
    Nationality,
    AadharNumber,
    MobileNumber,
    AlternateMobile,
    Email,
    Address,
    City,
    State,
    PinCode,
    HighestQualification,
    BoardUniversity,
    PassingYear,
    Percentage,
    CourseApplied,
    CourseAppliedOther,
    ReferralSource,
    ReferralSourceOther,
    ReferredBy,
    PaymentMethod,
    TransactionId,
    PaymentDate,
    PaymentStatus,
}

impl DraftField {
    pub const fn key(self) -> &'static str {
        match self {
            DraftField::FormNo => "formNo",
            DraftField::CenterCode => "centerCode",
            DraftField::EmployeeId => "employeeId",
            DraftField::RegNo => "regNo",
            DraftField::AdmissionDate => "admissionDate",
            DraftField::FullName => "fullName",
            DraftField::FatherName => "fatherName",
            DraftField::MotherName => "motherName",
            DraftField::GuardianName => "guardianName",
            DraftField::DateOfBirth => "dateOfBirth",
            DraftField::Gender => "gender",
            DraftField::Category => "category",
            DraftField::Religion => "religion",
            DraftField::Nationality => "nationality",
            DraftField::AadharNumber => "aadharNumber",
            DraftField::MobileNumber => "mobileNumber",
            DraftField::AlternateMobile => "alternateMobile",
            DraftField::Email => "email",
            DraftField::Address => "address",
            DraftField::City => "city",
            DraftField::State => "state",
            DraftField::PinCode => "pinCode",
            DraftField::HighestQualification => "highestQualification",
            DraftField::BoardUniversity => "boardUniversity",
            DraftField::PassingYear => "passingYear",
            DraftField::Percentage => "percentage",
            DraftField::CourseApplied => "courseApplied",
            DraftField::CourseAppliedOther => "courseAppliedOther",
            DraftField::ReferralSource => "referralSource",
            DraftField::ReferralSourceOther => "referralSourceOther",
            DraftField::ReferredBy => "referredBy",
            DraftField::PaymentMethod => "paymentMethod",
            DraftField::TransactionId => "transactionId",
            DraftField::PaymentDate => "paymentDate",
            DraftField::PaymentStatus => "paymentStatus",
        }
    }

    pub fn value(self, draft: &AdmissionDraft) -> &str {
        match self {
            DraftField::FormNo => &draft.form_no,
            DraftField::CenterCode => &draft.center_code,
            DraftField::EmployeeId => &draft.employee_id,
            DraftField::RegNo => &draft.reg_no,
            DraftField::AdmissionDate => &draft.admission_date,
            DraftField::FullName => &draft.full_name,
            DraftField::FatherName => &draft.father_name,
            DraftField::MotherName => &draft.mother_name,
            DraftField::GuardianName => &draft.guardian_name,
            DraftField::DateOfBirth => &draft.date_of_birth,
            DraftField::Gender => &draft.gender,
            DraftField::Category => &draft.category,
            DraftField::Religion => &draft.religion,
            DraftField::Nationality => &draft.nationality,
            DraftField::AadharNumber => &draft.aadhar_number,
            DraftField::MobileNumber => &draft.mobile_number,
            DraftField::AlternateMobile => &draft.alternate_mobile,
            DraftField::Email => &draft.email,
            DraftField::Address => &draft.address,
            DraftField::City => &draft.city,
            DraftField::State => &draft.state,
            DraftField::PinCode => &draft.pin_code,
            DraftField::HighestQualification => &draft.highest_qualification,
            DraftField::BoardUniversity => &draft.board_university,
            DraftField::PassingYear => &draft.passing_year,
            DraftField::Percentage => &draft.percentage,
            DraftField::CourseApplied => &draft.course_applied,
            DraftField::CourseAppliedOther => &draft.course_applied_other,
            DraftField::ReferralSource => &draft.referral_source,
            DraftField::ReferralSourceOther => &draft.referral_source_other,
            DraftField::ReferredBy => &draft.referred_by,
            DraftField::PaymentMethod => &draft.payment.payment_method,
            DraftField::TransactionId => &draft.payment.transaction_id,
            DraftField::PaymentDate => &draft.payment.payment_date,
            DraftField::PaymentStatus => &draft.payment.payment_status,
        }
    }

    fn slot(self, draft: &mut AdmissionDraft) -> &mut String {
        match self {
            DraftField::FormNo => &mut draft.form_no,
            DraftField::CenterCode => &mut draft.center_code,
            DraftField::EmployeeId => &mut draft.employee_id,
            DraftField::RegNo => &mut draft.reg_no,
            DraftField::AdmissionDate => &mut draft.admission_date,
            DraftField::FullName => &mut draft.full_name,
            DraftField::FatherName => &mut draft.father_name,
            DraftField::MotherName => &mut draft.mother_name,
            DraftField::GuardianName => &mut draft.guardian_name,
            DraftField::DateOfBirth => &mut draft.date_of_birth,
            DraftField::Gender => &mut draft.gender,
            DraftField::Category => &mut draft.category,
            DraftField::Religion => &mut draft.religion,
            DraftField::Nationality => &mut draft.nationality,
            DraftField::AadharNumber => &mut draft.aadhar_number,
            DraftField::MobileNumber => &mut draft.mobile_number,
            DraftField::AlternateMobile => &mut draft.alternate_mobile,
            DraftField::Email => &mut draft.email,
            DraftField::Address => &mut draft.address,
            DraftField::City => &mut draft.city,
            DraftField::State => &mut draft.state,
            DraftField::PinCode => &mut draft.pin_code,
            DraftField::HighestQualification => &mut draft.highest_qualification,
            DraftField::BoardUniversity => &mut draft.board_university,
            DraftField::PassingYear => &mut draft.passing_year,
            DraftField::Percentage => &mut draft.percentage,
            DraftField::CourseApplied => &mut draft.course_applied,
            DraftField::CourseAppliedOther => &mut draft.course_applied_other,
            DraftField::ReferralSource => &mut draft.referral_source,
            DraftField::ReferralSourceOther => &mut draft.referral_source_other,
            DraftField::ReferredBy => &mut draft.referred_by,
            DraftField::PaymentMethod => &mut draft.payment.payment_method,
            DraftField::TransactionId => &mut draft.payment.transaction_id,
            DraftField::PaymentDate => &mut draft.payment.payment_date,
            DraftField::PaymentStatus => &mut draft.payment.payment_status,
        }
    }
}
