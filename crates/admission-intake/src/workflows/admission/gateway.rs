use std::fmt::Debug;

use super::domain::{AdmissionRecord, Enquiry, StudentId};

/// Failures reported by the institute backend or the storage behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("record not found")]
    NotFound,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

impl GatewayError {
    /// Network, timeout and 5xx failures, as opposed to "no such data".
    pub fn is_unavailable(&self) -> bool {
        match self {
            GatewayError::Unavailable(_) => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::NotFound | GatewayError::UnexpectedResponse(_) => false,
        }
    }
}

/// Student and enquiry endpoints of the institute backend.
pub trait AdmissionGateway: Send + Sync {
    /// `GET /enquiry/search?name=...`
    fn search_enquiries(&self, name: &str) -> Result<Vec<Enquiry>, GatewayError>;
    /// `GET /student/regNo/:regNo`
    fn find_admission_by_reg_no(&self, reg_no: &str) -> Result<AdmissionRecord, GatewayError>;
    /// `POST /student`
    fn create_admission(&self, record: &AdmissionRecord) -> Result<AdmissionRecord, GatewayError>;
    /// `PUT /student/:id`
    fn update_admission(
        &self,
        id: &StudentId,
        record: &AdmissionRecord,
    ) -> Result<AdmissionRecord, GatewayError>;
}

/// File to be stored against a document slot.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Upload endpoints: `POST /upload` and `DELETE /upload?path=...`.
pub trait DocumentStore: Send + Sync {
    fn upload(&self, file: &UploadFile, folder: &str) -> Result<String, GatewayError>;
    fn delete(&self, path: &str) -> Result<(), GatewayError>;
}
