use admission_intake::workflows::admission::domain::GoalList;
use admission_intake::workflows::admission::{
    AdmissionGateway, AdmissionRecord, DocumentStore, Enquiry, GatewayError, RawFlag, StudentId,
    UploadFile,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Enquiries, admissions and stored documents kept in process memory.
#[derive(Default, Clone)]
pub(crate) struct InMemoryBackend {
    enquiries: Arc<Mutex<Vec<Enquiry>>>,
    admissions: Arc<Mutex<HashMap<String, AdmissionRecord>>>,
    documents: Arc<Mutex<HashMap<String, usize>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryBackend {
    pub(crate) fn seeded() -> Self {
        let backend = Self::default();
        backend
            .enquiries
            .lock()
            .expect("backend mutex poisoned")
            .extend(sample_enquiries());
        backend
    }

    pub(crate) fn admissions(&self) -> Vec<AdmissionRecord> {
        self.admissions
            .lock()
            .expect("backend mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn stored_documents(&self) -> usize {
        self.documents.lock().expect("backend mutex poisoned").len()
    }

    fn next_id(&self) -> StudentId {
        let value = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        StudentId(format!("{value:024x}"))
    }
}

impl AdmissionGateway for InMemoryBackend {
    fn search_enquiries(&self, name: &str) -> Result<Vec<Enquiry>, GatewayError> {
        let needle = name.trim().to_lowercase();
        let guard = self.enquiries.lock().expect("backend mutex poisoned");
        Ok(guard
            .iter()
            .filter(|enquiry| enquiry.display_name().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn find_admission_by_reg_no(&self, reg_no: &str) -> Result<AdmissionRecord, GatewayError> {
        let guard = self.admissions.lock().expect("backend mutex poisoned");
        guard
            .values()
            .find(|record| {
                [record.reg_no.as_deref(), record.generated_reg_no.as_deref()]
                    .contains(&Some(reg_no))
            })
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    fn create_admission(&self, record: &AdmissionRecord) -> Result<AdmissionRecord, GatewayError> {
        let mut stored = record.clone();
        let id = self.next_id();
        stored.id = Some(id.clone());
        debug!(%id, "admission created in memory");
        self.admissions
            .lock()
            .expect("backend mutex poisoned")
            .insert(id.as_str().to_string(), stored.clone());
        Ok(stored)
    }

    fn update_admission(
        &self,
        id: &StudentId,
        record: &AdmissionRecord,
    ) -> Result<AdmissionRecord, GatewayError> {
        let mut guard = self.admissions.lock().expect("backend mutex poisoned");
        if !guard.contains_key(id.as_str()) {
            return Err(GatewayError::Rejected {
                status: 404,
                message: "Student not found".to_string(),
            });
        }
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        guard.insert(id.as_str().to_string(), stored.clone());
        Ok(stored)
    }
}

impl DocumentStore for InMemoryBackend {
    fn upload(&self, file: &UploadFile, folder: &str) -> Result<String, GatewayError> {
        let path = format!("{folder}/{}", file.file_name);
        self.documents
            .lock()
            .expect("backend mutex poisoned")
            .insert(path.clone(), file.bytes.len());
        Ok(path)
    }

    fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.documents
            .lock()
            .expect("backend mutex poisoned")
            .remove(path);
        Ok(())
    }
}

pub(crate) fn sample_enquiries() -> Vec<Enquiry> {
    vec![
        Enquiry {
            id: Some("65a0f1e2d3c4b5a697887766".to_string()),
            full_name: Some("priya  sharma".to_string()),
            father_name: Some("RAJESH SHARMA".to_string()),
            date_of_birth: Some("2005-08-19".to_string()),
            gender: Some("female".to_string()),
            category: Some("general".to_string()),
            nationality: Some("indian".to_string()),
            aadhar_number: Some("4321 8765 2109".to_string()),
            residential_address: Some("18 Shivaji Nagar".to_string()),
            city: Some("Indore".to_string()),
            state: Some("Madhya Pradesh".to_string()),
            pin_code: Some("452003".to_string()),
            mobile_number: Some("9826012345".to_string()),
            email: Some("priya.sharma@example.com".to_string()),
            highest_qualification: Some("12th".to_string()),
            interest_course: Some("DCA".to_string()),
            referral_source: Some("Friend".to_string()),
            specially_abled: Some(RawFlag::Bool(false)),
            computer_access: Some(RawFlag::Text("yes".to_string())),
            ex_servicemen: Some(RawFlag::Bool(false)),
            goals: Some(GoalList::Joined("Job, Higher studies".to_string())),
            center_code: Some("c001".to_string()),
            ..Enquiry::default()
        },
        Enquiry {
            id: Some("65a0f1e2d3c4b5a697887767".to_string()),
            full_name: Some("arjun verma".to_string()),
            father_name: Some("Mohan Verma".to_string()),
            date_of_birth: Some("2003-02-27".to_string()),
            gender: Some("Male".to_string()),
            category: Some("obc".to_string()),
            nationality: Some("Indian".to_string()),
            mobile_number: Some("9893098765".to_string()),
            city: Some("Dewas".to_string()),
            state: Some("Madhya Pradesh".to_string()),
            interest_course: Some("other".to_string()),
            interest_course_other: Some("Tally Prime".to_string()),
            computer_access: Some(RawFlag::Text("no".to_string())),
            center_code: Some("c001".to_string()),
            ..Enquiry::default()
        },
    ]
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
