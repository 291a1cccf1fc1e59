use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::IntakeSettings;
use crate::workflows::admission::domain::{
    AdmissionRecord, Enquiry, GoalList, RawAmount, RawFlag, StudentId,
};
use crate::workflows::admission::draft::{
    AttachmentRef, Choice, ChoiceField, DocumentField, DraftAction, DraftField, FeeInput,
};
use crate::workflows::admission::gateway::{
    AdmissionGateway, DocumentStore, GatewayError, UploadFile,
};
use crate::workflows::admission::notify::NoticeLog;
use crate::workflows::admission::wizard::{IntakeWizard, WizardStep};

pub(super) const PERSISTED_ID: &str = "64f1c2a9b8e7d6c5b4a39281";
pub(super) const EXISTING_REG_NO: &str = "RC00110251234";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 14).expect("valid date")
}

pub(super) fn settings() -> IntakeSettings {
    IntakeSettings::default()
}

pub(super) fn enquiry() -> Enquiry {
    Enquiry {
        id: Some("e-100".to_string()),
        full_name: Some("asha  verma".to_string()),
        father_name: Some("RAMESH VERMA".to_string()),
        date_of_birth: Some("2004-03-12".to_string()),
        gender: Some("FEMALE".to_string()),
        category: Some("obc".to_string()),
        nationality: Some("indian".to_string()),
        aadhar_number: Some("1234 5678 9012".to_string()),
        residential_address: Some("12 MG Road".to_string()),
        city: Some("Indore".to_string()),
        state: Some("Madhya Pradesh".to_string()),
        pin_code: Some("452001".to_string()),
        mobile_number: Some("9876543210".to_string()),
        email: Some("asha@example.com".to_string()),
        highest_qualification: Some("12th".to_string()),
        board_university: Some("mp board".to_string()),
        interest_course: Some("other".to_string()),
        interest_course_other: Some("Tally Prime".to_string()),
        referral_source: Some("Newspaper".to_string()),
        specially_abled: Some(RawFlag::Bool(false)),
        computer_access: Some(RawFlag::Text("YES".to_string())),
        ex_servicemen: Some(RawFlag::Text("no".to_string())),
        goals: Some(GoalList::Joined("Job, Higher studies".to_string())),
        future_goals: Some(GoalList::Many(vec!["Business".to_string()])),
        center_code: Some("c002".to_string()),
        ..Enquiry::default()
    }
}

pub(super) fn admission_record() -> AdmissionRecord {
    AdmissionRecord {
        id: Some(StudentId(PERSISTED_ID.to_string())),
        form_no: Some("F2509011111".to_string()),
        center_code: Some("C001".to_string()),
        reg_no: Some(EXISTING_REG_NO.to_string()),
        month: Some("10/25".to_string()),
        admission_date: Some("2025-10-01".to_string()),
        full_name: Some("ravi kumar".to_string()),
        father_name: Some("suresh kumar".to_string()),
        date_of_birth: Some("2003-07-21".to_string()),
        gender: Some("male".to_string()),
        category: Some("general".to_string()),
        nationality: Some("Indian".to_string()),
        aadhar_number: Some("999988887777".to_string()),
        specially_abled: Some(RawFlag::Text("false".to_string())),
        ex_servicemen: Some(RawFlag::Bool(false)),
        mobile_number: Some("9123456780".to_string()),
        address: Some("4 Station Road".to_string()),
        city: Some("Bhopal".to_string()),
        state: Some("Madhya Pradesh".to_string()),
        pin_code: Some("462001".to_string()),
        highest_qualification: Some("Graduate".to_string()),
        course_applied: Some("DCA".to_string()),
        computer_access: Some(RawFlag::Text("No".to_string())),
        future_goals: Some(GoalList::Many(vec!["Job".to_string()])),
        photo: Some("RC00110251234/photo.png".to_string()),
        signature: Some("RC00110251234/signature.png".to_string()),
        total_fee: Some(RawAmount::Text("10000".to_string())),
        discount: Some(RawAmount::Number(1000.0)),
        paid_fee: Some(RawAmount::Text("5000".to_string())),
        payment_method: Some("Cash".to_string()),
        payment_date: Some("01/10/2025".to_string()),
        ..AdmissionRecord::default()
    }
}

/// In-memory backend recording every call in order.
#[derive(Default, Clone)]
pub(super) struct MemoryGateway {
    pub(super) enquiries: Arc<Mutex<Vec<Enquiry>>>,
    pub(super) admissions: Arc<Mutex<HashMap<String, AdmissionRecord>>>,
    pub(super) calls: Arc<Mutex<Vec<String>>>,
    pub(super) created: Arc<Mutex<Vec<AdmissionRecord>>>,
    pub(super) updated: Arc<Mutex<Vec<(StudentId, AdmissionRecord)>>>,
    pub(super) unavailable: bool,
    pub(super) reject_updates: bool,
    pub(super) reject_creates: bool,
}

static CREATED_SEQUENCE: AtomicU64 = AtomicU64::new(0xa000);

impl MemoryGateway {
    pub(super) fn seeded() -> Self {
        let gateway = Self::default();
        gateway.enquiries.lock().expect("lock").push(enquiry());
        gateway
            .admissions
            .lock()
            .expect("lock")
            .insert(EXISTING_REG_NO.to_string(), admission_record());
        gateway
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub(super) fn created(&self) -> Vec<AdmissionRecord> {
        self.created.lock().expect("lock").clone()
    }

    pub(super) fn updated(&self) -> Vec<(StudentId, AdmissionRecord)> {
        self.updated.lock().expect("lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }

    fn outage(&self) -> Result<(), GatewayError> {
        if self.unavailable {
            Err(GatewayError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AdmissionGateway for MemoryGateway {
    fn search_enquiries(&self, name: &str) -> Result<Vec<Enquiry>, GatewayError> {
        self.record(format!("search:{name}"));
        self.outage()?;
        let needle = name.to_lowercase();
        Ok(self
            .enquiries
            .lock()
            .expect("lock")
            .iter()
            .filter(|enquiry| enquiry.display_name().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn find_admission_by_reg_no(&self, reg_no: &str) -> Result<AdmissionRecord, GatewayError> {
        self.record(format!("regno:{reg_no}"));
        self.outage()?;
        self.admissions
            .lock()
            .expect("lock")
            .get(reg_no)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    fn create_admission(&self, record: &AdmissionRecord) -> Result<AdmissionRecord, GatewayError> {
        self.record("create".to_string());
        self.outage()?;
        if self.reject_creates {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "duplicate aadhar number".to_string(),
            });
        }
        self.created.lock().expect("lock").push(record.clone());
        let mut stored = record.clone();
        let sequence = CREATED_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        stored.id = Some(StudentId(format!("{sequence:024x}")));
        Ok(stored)
    }

    fn update_admission(
        &self,
        id: &StudentId,
        record: &AdmissionRecord,
    ) -> Result<AdmissionRecord, GatewayError> {
        self.record(format!("update:{id}"));
        self.outage()?;
        if self.reject_updates {
            return Err(GatewayError::Rejected {
                status: 404,
                message: "student not found".to_string(),
            });
        }
        self.updated
            .lock()
            .expect("lock")
            .push((id.clone(), record.clone()));
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        Ok(stored)
    }
}

/// In-memory document storage returning `folder/file_name` paths.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) uploads: Arc<Mutex<Vec<String>>>,
    pub(super) deletes: Arc<Mutex<Vec<String>>>,
    pub(super) fail_uploads: bool,
    pub(super) fail_deletes: bool,
}

impl MemoryStore {
    pub(super) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("lock").clone()
    }

    pub(super) fn deletes(&self) -> Vec<String> {
        self.deletes.lock().expect("lock").clone()
    }
}

impl DocumentStore for MemoryStore {
    fn upload(&self, file: &UploadFile, folder: &str) -> Result<String, GatewayError> {
        if self.fail_uploads {
            return Err(GatewayError::Unavailable("storage offline".to_string()));
        }
        let path = format!("{folder}/{}", file.file_name);
        self.uploads.lock().expect("lock").push(path.clone());
        Ok(path)
    }

    fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.deletes.lock().expect("lock").push(path.to_string());
        if self.fail_deletes {
            return Err(GatewayError::Unavailable("storage offline".to_string()));
        }
        Ok(())
    }
}

pub(super) type TestWizard = IntakeWizard<MemoryGateway, MemoryStore, NoticeLog>;

pub(super) fn build_wizard(gateway: &MemoryGateway, store: &MemoryStore) -> (TestWizard, NoticeLog) {
    let notices = NoticeLog::default();
    let wizard = IntakeWizard::with_clock(
        Arc::new(gateway.clone()),
        Arc::new(store.clone()),
        notices.clone(),
        settings(),
        today,
    );
    (wizard, notices)
}

pub(super) fn png(name: &str, size: usize) -> UploadFile {
    UploadFile::new(name, "image/png", vec![0x89; size])
}

/// Fill every field the first five steps require.
pub(super) fn fill_valid_draft(wizard: &mut TestWizard) {
    let texts = [
        (DraftField::FullName, "Meera Joshi"),
        (DraftField::FatherName, "Anil Joshi"),
        (DraftField::DateOfBirth, "2005-02-01"),
        (DraftField::Gender, "Female"),
        (DraftField::Category, "General"),
        (DraftField::Nationality, "Indian"),
        (DraftField::AadharNumber, "111122223333"),
        (DraftField::MobileNumber, "9000000001"),
        (DraftField::Address, "7 Lake View"),
        (DraftField::City, "Ujjain"),
        (DraftField::State, "Madhya Pradesh"),
        (DraftField::PinCode, "456001"),
        (DraftField::HighestQualification, "12th"),
        (DraftField::CourseApplied, "DCA"),
        (DraftField::PaymentMethod, "Cash"),
    ];
    for (field, value) in texts {
        assert!(wizard.dispatch(DraftAction::SetText(field, value.to_string())));
    }
    wizard.dispatch(DraftAction::SetChoice(ChoiceField::ComputerAccess, Choice::Yes));
    for field in [DocumentField::Photo, DocumentField::Signature] {
        wizard.dispatch(DraftAction::SetAttachment(
            field,
            AttachmentRef::Stored(format!("temp/{}.png", field.key())),
        ));
    }
    for (input, value) in [
        (FeeInput::TotalFee, "10000"),
        (FeeInput::Discount, "1000"),
        (FeeInput::PaidFee, "5000"),
    ] {
        wizard.dispatch(DraftAction::SetFee(input, value.to_string()));
    }
}

pub(super) fn advance_to_review(wizard: &mut TestWizard) {
    while wizard.current_step() != WizardStep::Review {
        wizard.next().expect("step validates");
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
