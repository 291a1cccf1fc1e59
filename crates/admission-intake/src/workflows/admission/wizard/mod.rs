//! Six-step intake wizard driving a single admission draft from search to submission.

mod controller;
mod steps;

pub use controller::{
    IntakeWizard, SubmitError, SubmitOutcome, SubmitPath, WizardPhase, WizardSnapshot,
    CLEAR_PROMPT,
};
pub use steps::{validate_all, validate_step, ValidationErrors, WizardStep};
