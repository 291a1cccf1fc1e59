//! Integration scenarios for the admission intake wizard.
//!
//! Scenarios drive the public wizard facade against in-memory backends so fee derivation,
//! document handling and the update-or-create submission path are validated end to end.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use admission_intake::config::IntakeSettings;
    use admission_intake::workflows::admission::{
        AdmissionGateway, AdmissionRecord, Choice, ChoiceField, DocumentStore, DraftAction,
        DraftField, Enquiry, FeeInput, GatewayError, IntakeWizard, NoticeLog, RawAmount, StudentId,
        UploadFile, WizardStep,
    };

    pub(super) const STALE_ID: &str = "0123456789abcdef01234567";
    pub(super) const STALE_REG_NO: &str = "RC00109250042";

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).expect("valid date")
    }

    pub(super) fn stale_admission() -> AdmissionRecord {
        AdmissionRecord {
            id: Some(StudentId(STALE_ID.to_string())),
            form_no: Some("F2509020001".to_string()),
            center_code: Some("C001".to_string()),
            reg_no: Some(STALE_REG_NO.to_string()),
            month: Some("09/25".to_string()),
            full_name: Some("neha sharma".to_string()),
            father_name: Some("vijay sharma".to_string()),
            date_of_birth: Some("2002-05-09".to_string()),
            gender: Some("Female".to_string()),
            category: Some("General".to_string()),
            nationality: Some("Indian".to_string()),
            aadhar_number: Some("2222 3333 4444".to_string()),
            mobile_number: Some("9811122233".to_string()),
            address: Some("22 Civil Lines".to_string()),
            city: Some("Gwalior".to_string()),
            state: Some("Madhya Pradesh".to_string()),
            pin_code: Some("474001".to_string()),
            highest_qualification: Some("Graduate".to_string()),
            course_applied: Some("PGDCA".to_string()),
            photo: Some(format!("{STALE_REG_NO}/photo.jpg")),
            signature: Some(format!("{STALE_REG_NO}/signature.jpg")),
            total_fee: Some(RawAmount::Number(18000.0)),
            discount: Some(RawAmount::Text("0".to_string())),
            paid_fee: Some(RawAmount::Number(18000.0)),
            payment_method: Some("UPI".to_string()),
            transaction_id: Some("UPI-77812".to_string()),
            payment_date: Some("2025-09-02".to_string()),
            ..AdmissionRecord::default()
        }
    }

    /// Backend whose stored student disappeared: lookups succeed, updates are rejected.
    #[derive(Default)]
    pub(super) struct StaleBackend {
        pub(super) admission: Option<AdmissionRecord>,
        pub(super) reject_updates: bool,
        pub(super) creates: Mutex<Vec<AdmissionRecord>>,
        pub(super) updates: Mutex<Vec<StudentId>>,
    }

    impl StaleBackend {
        pub(super) fn with_admission(record: AdmissionRecord) -> Self {
            Self {
                admission: Some(record),
                reject_updates: true,
                ..Self::default()
            }
        }

        pub(super) fn creates(&self) -> Vec<AdmissionRecord> {
            self.creates.lock().expect("lock").clone()
        }

        pub(super) fn updates(&self) -> Vec<StudentId> {
            self.updates.lock().expect("lock").clone()
        }
    }

    impl AdmissionGateway for StaleBackend {
        fn search_enquiries(&self, _name: &str) -> Result<Vec<Enquiry>, GatewayError> {
            Ok(Vec::new())
        }

        fn find_admission_by_reg_no(&self, reg_no: &str) -> Result<AdmissionRecord, GatewayError> {
            self.admission
                .clone()
                .filter(|record| record.reg_no.as_deref() == Some(reg_no))
                .ok_or(GatewayError::NotFound)
        }

        fn create_admission(
            &self,
            record: &AdmissionRecord,
        ) -> Result<AdmissionRecord, GatewayError> {
            let mut creates = self.creates.lock().expect("lock");
            creates.push(record.clone());
            let mut stored = record.clone();
            stored.id = Some(StudentId(format!("{:024x}", 0xfeed_0000 + creates.len())));
            Ok(stored)
        }

        fn update_admission(
            &self,
            id: &StudentId,
            record: &AdmissionRecord,
        ) -> Result<AdmissionRecord, GatewayError> {
            self.updates.lock().expect("lock").push(id.clone());
            if self.reject_updates {
                return Err(GatewayError::Rejected {
                    status: 404,
                    message: "Student not found".to_string(),
                });
            }
            let mut stored = record.clone();
            stored.id = Some(id.clone());
            Ok(stored)
        }
    }

    #[derive(Default)]
    pub(super) struct FolderStore {
        pub(super) stored: Mutex<Vec<String>>,
    }

    impl DocumentStore for FolderStore {
        fn upload(&self, file: &UploadFile, folder: &str) -> Result<String, GatewayError> {
            let path = format!("uploads/{folder}/{}", file.file_name);
            self.stored.lock().expect("lock").push(path.clone());
            Ok(path)
        }

        fn delete(&self, path: &str) -> Result<(), GatewayError> {
            self.stored.lock().expect("lock").retain(|stored| stored != path);
            Ok(())
        }
    }

    pub(super) type Wizard = IntakeWizard<StaleBackend, FolderStore, NoticeLog>;

    pub(super) fn wizard(backend: Arc<StaleBackend>, store: Arc<FolderStore>) -> (Wizard, NoticeLog) {
        let notices = NoticeLog::default();
        let wizard = IntakeWizard::with_clock(
            backend,
            store,
            notices.clone(),
            IntakeSettings::default(),
            today,
        );
        (wizard, notices)
    }

    pub(super) fn fill_applicant(wizard: &mut Wizard) {
        for (field, value) in [
            (DraftField::FullName, "kiran patel"),
            (DraftField::FatherName, "Mahesh Patel"),
            (DraftField::DateOfBirth, "2006-01-15"),
            (DraftField::Gender, "Male"),
            (DraftField::Category, "OBC"),
            (DraftField::Nationality, "Indian"),
            (DraftField::AadharNumber, "5555-6666-7777"),
            (DraftField::MobileNumber, "9425012345"),
            (DraftField::Address, "3 Nehru Nagar"),
            (DraftField::City, "Bhopal"),
            (DraftField::State, "Madhya Pradesh"),
            (DraftField::PinCode, "462003"),
            (DraftField::HighestQualification, "12th"),
            (DraftField::CourseApplied, "DCA"),
            (DraftField::PaymentMethod, "Cash"),
            (DraftField::PaymentDate, "2025-11-03"),
        ] {
            assert!(wizard.dispatch(DraftAction::SetText(field, value.to_string())));
        }
        wizard.dispatch(DraftAction::SetChoice(ChoiceField::ComputerAccess, Choice::No));
        for (input, value) in [
            (FeeInput::TotalFee, "10000"),
            (FeeInput::Discount, "1000"),
            (FeeInput::PaidFee, "5000"),
        ] {
            wizard.dispatch(DraftAction::SetFee(input, value.to_string()));
        }
    }

    pub(super) fn advance_to_review(wizard: &mut Wizard) {
        while wizard.current_step() != WizardStep::Review {
            wizard.next().expect("step validates");
        }
    }
}

use std::sync::Arc;

use admission_intake::workflows::admission::{
    DocumentField, NoticeLevel, SubmitPath, UploadFile, WizardPhase, WizardStep,
};
use common::*;

#[test]
fn new_applicant_is_created_with_derived_fees_and_uploaded_documents() {
    let backend = Arc::new(StaleBackend::default());
    let store = Arc::new(FolderStore::default());
    let (mut wizard, _notices) = wizard(Arc::clone(&backend), Arc::clone(&store));
    let reg_no = wizard.draft().generated_reg_no.clone();

    fill_applicant(&mut wizard);
    for (field, name) in [
        (DocumentField::Photo, "kiran.jpg"),
        (DocumentField::Signature, "kiran-sign.png"),
    ] {
        let content_type = if name.ends_with(".jpg") { "image/jpeg" } else { "image/png" };
        let update = wizard
            .upload(field, &UploadFile::new(name, content_type, vec![7; 2048]))
            .expect("accepted upload");
        assert!(!update.degraded);
    }

    let fees = wizard.draft().fee_breakdown();
    assert_eq!(fees.net_fee, 9000.0);
    assert_eq!(fees.remaining_fee, 4000.0);

    advance_to_review(&mut wizard);
    let outcome = wizard.submit().expect("submission succeeds");

    assert_eq!(outcome.path, SubmitPath::Created);
    let creates = backend.creates();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].id.is_none());
    assert_eq!(creates[0].generated_reg_no.as_deref(), Some(reg_no.as_str()));
    assert_eq!(
        creates[0].photo.as_deref(),
        Some(format!("uploads/{reg_no}/kiran.jpg").as_str())
    );
    assert!(backend.updates().is_empty());
    assert!(matches!(wizard.phase(), WizardPhase::Submitted(_)));

    assert!(wizard.reset_after_submission());
    assert_eq!(wizard.current_step(), WizardStep::BasicInfo);
    assert!(wizard.draft().full_name.is_empty());
}

#[test]
fn rejected_update_falls_back_to_a_single_create_with_a_new_id() {
    let backend = Arc::new(StaleBackend::with_admission(stale_admission()));
    let store = Arc::new(FolderStore::default());
    let (mut wizard, notices) = wizard(Arc::clone(&backend), Arc::clone(&store));

    wizard.search(STALE_REG_NO).expect("lookup succeeds");
    assert_eq!(wizard.draft().full_name, "Neha Sharma");
    assert!(wizard.go_to(WizardStep::Review));

    let outcome = wizard.submit().expect("fallback create succeeds");

    assert_eq!(outcome.path, SubmitPath::CreatedAfterFailedUpdate);
    assert_eq!(backend.updates().len(), 1);
    assert_eq!(backend.updates()[0].as_str(), STALE_ID);
    let creates = backend.creates();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].id.is_none());
    let new_id = outcome.record.id.expect("created id");
    assert_ne!(new_id.as_str(), STALE_ID);
    assert!(notices
        .drain()
        .iter()
        .any(|notice| notice.level == NoticeLevel::Info));
}

#[test]
fn unknown_registration_number_leaves_draft_untouched() {
    let backend = Arc::new(StaleBackend::with_admission(stale_admission()));
    let store = Arc::new(FolderStore::default());
    let (mut wizard, _notices) = wizard(backend, store);
    let before = wizard.draft().clone();

    wizard.search("RC00109259999").expect("lookup succeeds");

    assert_eq!(wizard.draft(), &before);
    assert_eq!(wizard.current_step(), WizardStep::BasicInfo);
}
