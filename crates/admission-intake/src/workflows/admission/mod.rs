//! Admission intake: normalizing enquiry and admission records into a draft, generating
//! registration numbers, computing fees, managing document uploads and driving the six-step
//! wizard that persists the result through the institute backend.

pub mod attachments;
pub mod domain;
pub mod draft;
pub mod fees;
pub mod gateway;
pub mod normalizer;
pub mod notify;
pub mod payload;
pub mod registration;
pub mod resolver;
pub mod rest;
pub mod router;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use attachments::{AttachmentManager, AttachmentRejection, AttachmentUpdate};
pub use domain::{AdmissionRecord, Enquiry, RawAmount, RawFlag, RecordKind, StudentId};
pub use draft::{
    AdmissionDraft, AttachmentRef, Choice, ChoiceField, DocumentField, DraftAction, DraftField,
    FeeInput,
};
pub use fees::FeeBreakdown;
pub use gateway::{AdmissionGateway, DocumentStore, GatewayError, UploadFile};
pub use normalizer::{normalize, SourceRecord};
pub use notify::{Confirmation, Notice, NoticeLevel, NoticeLog, Notifier, Preconfirmed};
pub use payload::build_payload;
pub use registration::RegistrationNumber;
pub use resolver::{LookupError, RecordResolver, ResolvedRecord, SearchOutcome};
pub use rest::RestGateway;
pub use router::{intake_router, IntakeSessions};
pub use wizard::{
    IntakeWizard, SubmitError, SubmitOutcome, SubmitPath, ValidationErrors, WizardPhase,
    WizardSnapshot, WizardStep,
};
