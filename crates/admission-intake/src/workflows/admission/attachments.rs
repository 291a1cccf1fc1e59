//! Upload, replace and delete of supporting documents against external storage.
//!
//! Storage failures never block the wizard: a failed upload keeps the previously stored file, or
//! leaves a placeholder when there was none, and a failed delete still clears the slot. Both
//! surface as warnings on the returned [`AttachmentUpdate`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::draft::{AdmissionDraft, AttachmentRef, DocumentField, DraftAction};
use super::gateway::{DocumentStore, GatewayError, UploadFile};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Folder used before the draft has any registration number.
pub const TEMP_FOLDER: &str = "temp";

/// Pre-upload validation failures. Storage is never contacted when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejection {
    #[error("{field}: no file selected")]
    Empty { field: &'static str },
    #[error("{field} must be a JPEG, PNG, GIF or PDF file (got '{content_type}')")]
    UnsupportedType {
        field: &'static str,
        content_type: String,
    },
    #[error("{field} is {size} bytes; the limit is {limit} bytes")]
    TooLarge {
        field: &'static str,
        size: usize,
        limit: usize,
    },
}

/// Result of an attachment operation, to be applied to the draft by the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpdate {
    pub field: DocumentField,
    pub reference: Option<AttachmentRef>,
    /// Storage did not accept the new file; the slot keeps the old file or a placeholder.
    pub degraded: bool,
    pub warnings: Vec<String>,
}

impl AttachmentUpdate {
    fn cleared(field: DocumentField) -> Self {
        Self {
            field,
            reference: None,
            degraded: false,
            warnings: Vec::new(),
        }
    }

    pub fn action(&self) -> DraftAction {
        match &self.reference {
            Some(reference) => DraftAction::SetAttachment(self.field, reference.clone()),
            None => DraftAction::ClearAttachment(self.field),
        }
    }
}

/// Storage folder for a draft: its registration number, or [`TEMP_FOLDER`].
pub fn upload_folder(draft: &AdmissionDraft) -> String {
    let identity = draft.registration_number();
    if identity.is_empty() {
        TEMP_FOLDER.to_string()
    } else {
        identity.to_string()
    }
}

/// True for JPEG, PNG, GIF and PDF, judged by the declared type or, failing that, the file name.
pub fn is_accepted_type(file: &UploadFile) -> bool {
    let declared = file.content_type.trim();
    let parsed = if declared.is_empty() {
        mime_guess::from_path(&file.file_name).first()
    } else {
        declared.parse::<mime::Mime>().ok()
    };

    let Some(parsed) = parsed else {
        return false;
    };
    matches!(
        (parsed.type_().as_str(), parsed.subtype().as_str()),
        ("image", "jpeg" | "jpg" | "png" | "gif") | ("application", "pdf")
    )
}

pub struct AttachmentManager<S> {
    store: Arc<S>,
    max_bytes: usize,
}

impl<S> AttachmentManager<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn validate(
        &self,
        field: DocumentField,
        file: &UploadFile,
    ) -> Result<(), AttachmentRejection> {
        if file.bytes.is_empty() || file.file_name.trim().is_empty() {
            return Err(AttachmentRejection::Empty { field: field.label() });
        }
        if !is_accepted_type(file) {
            return Err(AttachmentRejection::UnsupportedType {
                field: field.label(),
                content_type: file.content_type.clone(),
            });
        }
        if file.size() > self.max_bytes {
            return Err(AttachmentRejection::TooLarge {
                field: field.label(),
                size: file.size(),
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Store `file` for `field`, replacing whatever `current` referenced.
    pub fn upload(
        &self,
        field: DocumentField,
        current: Option<&AttachmentRef>,
        file: &UploadFile,
        folder: &str,
    ) -> Result<AttachmentUpdate, AttachmentRejection> {
        self.validate(field, file)?;

        let mut update = AttachmentUpdate::cleared(field);
        let outcome = self.store.upload(file, folder).and_then(|path| {
            let path = path.trim().to_string();
            if path.is_empty() {
                Err(GatewayError::UnexpectedResponse(
                    "upload succeeded without a storage path".to_string(),
                ))
            } else {
                Ok(path)
            }
        });

        match outcome {
            Ok(path) => {
                debug!(field = field.key(), %folder, %path, "document stored");
                update.reference = Some(AttachmentRef::Stored(path));
            }
            Err(err) => {
                update.degraded = true;
                match current {
                    Some(AttachmentRef::Stored(path)) => {
                        warn!(field = field.key(), %folder, %path, error = %err, "document upload failed; keeping stored file");
                        update.warnings.push(format!(
                            "{} was not replaced ({err}); the previously uploaded file is kept",
                            field.label()
                        ));
                        update.reference = Some(AttachmentRef::Stored(path.clone()));
                    }
                    _ => {
                        warn!(field = field.key(), %folder, error = %err, "document upload degraded to placeholder");
                        update.warnings.push(format!(
                            "{} was not uploaded ({err}); '{}' is kept as a local placeholder and will not be stored",
                            field.label(),
                            file.file_name
                        ));
                        update.reference =
                            Some(AttachmentRef::Placeholder(file.file_name.clone()));
                    }
                }
                return Ok(update);
            }
        }

        if let Some(previous) = current {
            if update.reference.as_ref() != Some(previous) {
                if let Some(warning) = self.discard(field, previous) {
                    update.warnings.push(warning);
                }
            }
        }

        Ok(update)
    }

    /// Clear `field`. Storage deletion is best-effort; the slot is cleared regardless.
    pub fn delete(&self, field: DocumentField, current: Option<&AttachmentRef>) -> AttachmentUpdate {
        let mut update = AttachmentUpdate::cleared(field);
        if let Some(previous) = current {
            if let Some(warning) = self.discard(field, previous) {
                update.warnings.push(warning);
            }
        }
        update
    }

    fn discard(&self, field: DocumentField, reference: &AttachmentRef) -> Option<String> {
        let AttachmentRef::Stored(path) = reference else {
            return None;
        };
        match self.store.delete(path) {
            Ok(()) => {
                debug!(field = field.key(), %path, "document deleted from storage");
                None
            }
            Err(err) => {
                warn!(field = field.key(), %path, error = %err, "storage delete failed; clearing locally");
                Some(format!(
                    "{} was removed from the form but could not be deleted from storage ({err})",
                    field.label()
                ))
            }
        }
    }
}
