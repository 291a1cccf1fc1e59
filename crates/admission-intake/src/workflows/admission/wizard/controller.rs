use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::steps::{validate_all, validate_step, ValidationErrors, WizardStep};
use crate::config::IntakeSettings;
use crate::workflows::admission::attachments::{
    upload_folder, AttachmentManager, AttachmentRejection, AttachmentUpdate,
};
use crate::workflows::admission::domain::{AdmissionRecord, RecordKind};
use crate::workflows::admission::draft::{AdmissionDraft, DocumentField, DraftAction};
use crate::workflows::admission::fees::FeeBreakdown;
use crate::workflows::admission::gateway::{
    AdmissionGateway, DocumentStore, GatewayError, UploadFile,
};
use crate::workflows::admission::normalizer::{normalize, SourceRecord};
use crate::workflows::admission::notify::{Confirmation, Notice, Notifier};
use crate::workflows::admission::payload::{build_payload, describe_fees};
use crate::workflows::admission::registration::{self, RegistrationNumber};
use crate::workflows::admission::resolver::{
    LookupError, RecordResolver, ResolvedRecord, SearchOutcome,
};

pub const CLEAR_PROMPT: &str = "Clear the form? All entered details and uploads will be lost.";

/// Where the session currently is. Only `Editing` accepts changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "snake_case")]
pub enum WizardPhase {
    Editing(WizardStep),
    Submitting,
    Submitted(Box<AdmissionRecord>),
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Editing,
    Submitting,
    Submitted(Box<AdmissionRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPath {
    Created,
    Updated,
    /// The update was rejected and a fresh record was created instead.
    CreatedAfterFailedUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub record: AdmissionRecord,
    pub path: SubmitPath,
    /// Wait this long, then call [`IntakeWizard::reset_after_submission`].
    #[serde(with = "millis")]
    pub reset_after: Duration,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("submission is only possible from the review step (currently on {0:?})")]
    NotOnReview(WizardStep),
    #[error("a submission is already in progress")]
    InProgress,
    #[error("this admission was already submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Validation(ValidationErrors),
    #[error("could not save the admission: {0}")]
    Service(GatewayError),
}

/// Serializable view of the session for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub phase: WizardPhase,
    pub current_step: WizardStep,
    pub step_number: u8,
    pub completed_steps: Vec<WizardStep>,
    pub errors: ValidationErrors,
    pub draft: AdmissionDraft,
    pub fees: FeeBreakdown,
    pub fees_overdrawn: bool,
    pub upload_folder: String,
}

/// One intake session: the draft, the step cursor and the ports it talks to.
pub struct IntakeWizard<G, S, N> {
    gateway: Arc<G>,
    resolver: RecordResolver<G>,
    attachments: AttachmentManager<S>,
    notifier: N,
    settings: IntakeSettings,
    today: fn() -> NaiveDate,
    draft: AdmissionDraft,
    current: WizardStep,
    completed: BTreeSet<WizardStep>,
    errors: ValidationErrors,
    phase: Phase,
    last_search: Option<SearchOutcome>,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn fresh_draft(settings: &IntakeSettings, today: NaiveDate) -> AdmissionDraft {
    let mut rng = rand::thread_rng();
    let form_no = registration::form_number(today, &mut rng);
    let registration =
        registration::generate_with_rng(&settings.center_code, today, &mut rng);
    AdmissionDraft::blank(form_no, &settings.center_code, registration)
}

impl<G, S, N> IntakeWizard<G, S, N>
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
    N: Notifier,
{
    pub fn new(gateway: Arc<G>, store: Arc<S>, notifier: N, settings: IntakeSettings) -> Self {
        Self::with_clock(gateway, store, notifier, settings, local_today)
    }

    /// Same as [`IntakeWizard::new`] with a fixed notion of "today".
    pub fn with_clock(
        gateway: Arc<G>,
        store: Arc<S>,
        notifier: N,
        settings: IntakeSettings,
        today: fn() -> NaiveDate,
    ) -> Self {
        let draft = fresh_draft(&settings, today());
        Self {
            resolver: RecordResolver::new(Arc::clone(&gateway)),
            attachments: AttachmentManager::new(store, settings.max_upload_bytes),
            gateway,
            notifier,
            settings,
            today,
            draft,
            current: WizardStep::BasicInfo,
            completed: BTreeSet::new(),
            errors: ValidationErrors::default(),
            phase: Phase::Editing,
            last_search: None,
        }
    }

    pub fn draft(&self) -> &AdmissionDraft {
        &self.draft
    }

    pub fn current_step(&self) -> WizardStep {
        self.current
    }

    pub fn completed_steps(&self) -> &BTreeSet<WizardStep> {
        &self.completed
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn last_search(&self) -> Option<&SearchOutcome> {
        self.last_search.as_ref()
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    pub fn phase(&self) -> WizardPhase {
        match &self.phase {
            Phase::Editing => WizardPhase::Editing(self.current),
            Phase::Submitting => WizardPhase::Submitting,
            Phase::Submitted(record) => WizardPhase::Submitted(record.clone()),
        }
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        let fees = self.draft.fee_breakdown();
        WizardSnapshot {
            phase: self.phase(),
            current_step: self.current,
            step_number: self.current.number(),
            completed_steps: self.completed.iter().copied().collect(),
            errors: self.errors.clone(),
            draft: self.draft.clone(),
            fees,
            fees_overdrawn: fees.is_overdrawn(),
            upload_folder: upload_folder(&self.draft),
        }
    }

    fn editable(&self) -> bool {
        if self.phase == Phase::Editing {
            return true;
        }
        self.notifier.notify(Notice::warning(
            "This admission has already been submitted; start a new form to make changes",
        ));
        false
    }

    /// Apply one edit to the draft. Returns `false` when the session is not editable.
    pub fn dispatch(&mut self, action: DraftAction) -> bool {
        if !self.editable() {
            return false;
        }
        match &action {
            DraftAction::SetText(field, _) => self.errors.remove(field.key()),
            DraftAction::SetChoice(field, _) | DraftAction::SetChoiceDetail(field, _) => {
                self.errors.remove(field.key());
                self.errors.remove("speciallyAbledDetails");
                self.errors.remove("computerAccessOther");
            }
            DraftAction::SetFee(input, _) => self.errors.remove(input.key()),
            DraftAction::SetAttachment(field, _) | DraftAction::ClearAttachment(field) => {
                self.errors.remove(field.key())
            }
            _ => {}
        }
        self.draft.apply(action);
        true
    }

    /// Validate the current step and advance. Review is terminal.
    pub fn next(&mut self) -> Result<WizardStep, ValidationErrors> {
        if !self.editable() {
            return Ok(self.current);
        }
        let errors = validate_step(self.current, &self.draft);
        if !errors.is_empty() {
            self.notifier.notify(Notice::warning(format!(
                "Please correct {} field(s) on {} before continuing",
                errors.len(),
                self.current.title()
            )));
            self.errors = errors.clone();
            return Err(errors);
        }

        self.errors = ValidationErrors::default();
        self.completed.insert(self.current);
        if let Some(next) = self.current.next() {
            self.current = next;
        }
        debug!(step = self.current.number(), "wizard advanced");
        Ok(self.current)
    }

    /// Step back without validating.
    pub fn prev(&mut self) -> WizardStep {
        if self.phase == Phase::Editing {
            if let Some(prev) = self.current.prev() {
                self.current = prev;
            }
        }
        self.current
    }

    /// Jump to a completed step or stay on the current one.
    pub fn go_to(&mut self, step: WizardStep) -> bool {
        if !self.editable() {
            return false;
        }
        if step != self.current && !self.completed.contains(&step) {
            self.notifier.notify(Notice::warning(format!(
                "Complete the earlier steps before opening {}",
                step.title()
            )));
            return false;
        }
        self.current = step;
        true
    }

    /// Look up `term`. A registration-number hit loads straight into the draft.
    pub fn search(&mut self, term: &str) -> Result<SearchOutcome, LookupError> {
        let outcome = match self.resolver.search(term) {
            Ok(outcome) => outcome,
            Err(err) => {
                let notice = match err {
                    LookupError::EmptyQuery => Notice::warning(err.to_string()),
                    LookupError::ServiceUnavailable(_) => Notice::error(err.to_string()),
                };
                self.notifier.notify(notice);
                return Err(err);
            }
        };

        match &outcome {
            SearchOutcome::Admission(record) => {
                self.load(ResolvedRecord::Admission(record.clone()));
            }
            SearchOutcome::Enquiries(enquiries) => {
                self.notifier.notify(Notice::info(format!(
                    "{} matching enquir{} found; select one to continue",
                    enquiries.len(),
                    if enquiries.len() == 1 { "y" } else { "ies" }
                )));
            }
            SearchOutcome::NotFound => {
                self.notifier.notify(Notice::info(format!(
                    "No admission or enquiry matched '{}'",
                    term.trim()
                )));
            }
        }
        self.last_search = Some(outcome.clone());
        Ok(outcome)
    }

    /// Load one enquiry out of the last search result.
    pub fn select_enquiry(&mut self, enquiry_id: &str) -> Option<RecordKind> {
        let selected = self
            .last_search
            .as_ref()
            .and_then(|outcome| RecordResolver::<G>::select(outcome, Some(enquiry_id)));
        match selected {
            Some(record) => Some(self.load(record)),
            None => {
                self.notifier.notify(Notice::warning(format!(
                    "Enquiry '{}' is not part of the current search results",
                    enquiry_id.trim()
                )));
                None
            }
        }
    }

    /// Replace the draft with a normalized copy of `record` and open every step for review.
    pub fn load(&mut self, record: ResolvedRecord) -> RecordKind {
        if !self.editable() {
            return RecordKind::None;
        }
        let kind = record.kind();
        let mut loaded = match &record {
            ResolvedRecord::Admission(admission) => normalize(SourceRecord::Admission(admission)),
            ResolvedRecord::Enquiry(enquiry) => normalize(SourceRecord::Enquiry(enquiry)),
        };
        loaded.inherit_bookkeeping(&self.draft);
        self.draft.apply(DraftAction::Replace(Box::new(loaded)));

        self.completed = WizardStep::ALL.into_iter().collect();
        self.errors = ValidationErrors::default();
        info!(kind = kind.label(), name = record.display_name(), "record loaded into draft");
        self.notifier.notify(Notice::success(format!(
            "Loaded {} details for {}",
            kind.label(),
            record.display_name()
        )));
        kind
    }

    /// Validate and store a document for `field`, replacing any earlier one.
    pub fn upload(
        &mut self,
        field: DocumentField,
        file: &UploadFile,
    ) -> Result<AttachmentUpdate, AttachmentRejection> {
        if !self.editable() {
            return Ok(AttachmentUpdate {
                field,
                reference: self.draft.documents.get(field).cloned(),
                degraded: false,
                warnings: Vec::new(),
            });
        }
        let folder = upload_folder(&self.draft);
        let current = self.draft.documents.get(field).cloned();
        let update = match self
            .attachments
            .upload(field, current.as_ref(), file, &folder)
        {
            Ok(update) => update,
            Err(rejection) => {
                self.notifier.notify(Notice::error(rejection.to_string()));
                return Err(rejection);
            }
        };

        self.dispatch(update.action());
        self.report(&update);
        if !update.degraded {
            self.notifier
                .notify(Notice::success(format!("{} uploaded", field.label())));
        }
        Ok(update)
    }

    /// Clear `field`, deleting the stored file when there is one.
    pub fn remove_attachment(&mut self, field: DocumentField) -> AttachmentUpdate {
        let current = self.draft.documents.get(field).cloned();
        if !self.editable() {
            return AttachmentUpdate {
                field,
                reference: current,
                degraded: false,
                warnings: Vec::new(),
            };
        }
        let update = self.attachments.delete(field, current.as_ref());
        self.dispatch(update.action());
        self.report(&update);
        update
    }

    fn report(&self, update: &AttachmentUpdate) {
        for warning in &update.warnings {
            self.notifier.notify(Notice::warning(warning.clone()));
        }
    }

    /// Draw a new generated registration number for the draft's center.
    pub fn regenerate_registration_number(&mut self) -> RegistrationNumber {
        let center = if self.draft.center_code.trim().is_empty() {
            self.settings.center_code.clone()
        } else {
            self.draft.center_code.clone()
        };
        let generated = registration::generate(&center, (self.today)());
        if self.dispatch(DraftAction::AssignRegistration(generated.clone())) {
            self.notifier.notify(Notice::info(format!(
                "Registration number {} assigned",
                generated.reg_no
            )));
        }
        generated
    }

    /// Persist the draft: update when it carries a valid id, otherwise create.
    ///
    /// A rejected update is retried once as a create with the id stripped.
    pub fn submit(&mut self) -> Result<SubmitOutcome, SubmitError> {
        match self.phase {
            Phase::Editing => {}
            Phase::Submitting => return Err(SubmitError::InProgress),
            Phase::Submitted(_) => return Err(SubmitError::AlreadySubmitted),
        }
        if self.current != WizardStep::Review {
            return Err(SubmitError::NotOnReview(self.current));
        }

        let errors = validate_all(&self.draft);
        if !errors.is_empty() {
            self.notifier.notify(Notice::error(format!(
                "Cannot submit: {} field(s) need attention",
                errors.len()
            )));
            self.errors = errors.clone();
            return Err(SubmitError::Validation(errors));
        }

        let payload = build_payload(&self.draft, (self.today)());
        self.phase = Phase::Submitting;

        let result = match self.draft.persisted_id().cloned() {
            Some(id) => match self.gateway.update_admission(&id, &payload) {
                Ok(record) => Ok((record, SubmitPath::Updated)),
                Err(err) => {
                    warn!(id = %id, error = %err, "admission update failed; creating a new record");
                    self.create(payload)
                        .map(|record| (record, SubmitPath::CreatedAfterFailedUpdate))
                }
            },
            None => self
                .create(payload)
                .map(|record| (record, SubmitPath::Created)),
        };

        match result {
            Ok((record, path)) => {
                if path == SubmitPath::CreatedAfterFailedUpdate {
                    self.notifier.notify(Notice::info(
                        "The existing admission could not be updated, so a new admission record was created",
                    ));
                }
                self.notifier.notify(Notice::success(format!(
                    "Admission saved for {}",
                    record.display_name()
                )));
                info!(
                    reg_no = record.registration_number().unwrap_or_default(),
                    ?path,
                    fees = %describe_fees(&record),
                    "admission submitted"
                );
                self.completed.insert(WizardStep::Review);
                self.errors = ValidationErrors::default();
                self.phase = Phase::Submitted(Box::new(record.clone()));
                Ok(SubmitOutcome {
                    record,
                    path,
                    reset_after: self.settings.reset_delay,
                })
            }
            Err(err) => {
                warn!(error = %err, "admission submission failed");
                self.phase = Phase::Editing;
                let err = SubmitError::Service(err);
                self.notifier.notify(Notice::error(err.to_string()));
                Err(err)
            }
        }
    }

    fn create(&self, mut payload: AdmissionRecord) -> Result<AdmissionRecord, GatewayError> {
        payload.id = None;
        self.gateway.create_admission(&payload)
    }

    /// Start a fresh session once a submission has landed. No-op otherwise.
    pub fn reset_after_submission(&mut self) -> bool {
        if !matches!(self.phase, Phase::Submitted(_)) {
            return false;
        }
        self.reset();
        true
    }

    /// Discard everything after the user confirms. Uploaded files stay in storage.
    pub fn clear(&mut self, confirmation: &dyn Confirmation) -> bool {
        if self.phase == Phase::Submitting || !confirmation.confirm(CLEAR_PROMPT) {
            return false;
        }
        self.reset();
        self.notifier.notify(Notice::info("Form cleared"));
        true
    }

    fn reset(&mut self) {
        self.draft = fresh_draft(&self.settings, (self.today)());
        self.current = WizardStep::BasicInfo;
        self.completed.clear();
        self.errors = ValidationErrors::default();
        self.phase = Phase::Editing;
        self.last_search = None;
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }
}
