use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{AdmissionRecord, Enquiry, RecordKind};
use super::gateway::{AdmissionGateway, GatewayError};

const MIN_REG_NO_LENGTH: usize = 8;

/// Result of a search. `NotFound` is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Existing student located by registration number (update path).
    Admission(Box<AdmissionRecord>),
    /// Candidate leads awaiting selection (promote path).
    Enquiries(Vec<Enquiry>),
    NotFound,
}

impl SearchOutcome {
    pub fn kind(&self) -> RecordKind {
        match self {
            SearchOutcome::Admission(_) => RecordKind::Admission,
            SearchOutcome::Enquiries(_) => RecordKind::Enquiry,
            SearchOutcome::NotFound => RecordKind::None,
        }
    }
}

/// A single record chosen for loading into the draft.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRecord {
    Admission(Box<AdmissionRecord>),
    Enquiry(Box<Enquiry>),
}

impl ResolvedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ResolvedRecord::Admission(_) => RecordKind::Admission,
            ResolvedRecord::Enquiry(_) => RecordKind::Enquiry,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ResolvedRecord::Admission(record) => record.display_name(),
            ResolvedRecord::Enquiry(enquiry) => enquiry.display_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("enter a name or registration number to search")]
    EmptyQuery,
    #[error("record search is unavailable right now, please try again: {0}")]
    ServiceUnavailable(String),
}

/// `R`/`r` prefix, at least eight characters, no whitespace.
pub fn looks_like_reg_no(term: &str) -> bool {
    let term = term.trim();
    term.len() >= MIN_REG_NO_LENGTH
        && term.starts_with(['R', 'r'])
        && !term.chars().any(char::is_whitespace)
}

pub struct RecordResolver<G> {
    gateway: Arc<G>,
}

impl<G> RecordResolver<G>
where
    G: AdmissionGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Admission by reg-no first when the term has that shape, then enquiries by name.
    pub fn search(&self, term: &str) -> Result<SearchOutcome, LookupError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(LookupError::EmptyQuery);
        }

        if looks_like_reg_no(term) {
            let reg_no = term.to_ascii_uppercase();
            match self.gateway.find_admission_by_reg_no(&reg_no) {
                Ok(record) => {
                    info!(%reg_no, "admission located by registration number");
                    return Ok(SearchOutcome::Admission(Box::new(record)));
                }
                Err(GatewayError::NotFound) => {
                    debug!(%reg_no, "no admission for registration number; searching enquiries");
                }
                Err(err) => {
                    warn!(%reg_no, error = %err, "admission lookup failed; falling back to enquiry search");
                }
            }
        }

        match self.gateway.search_enquiries(term) {
            Ok(enquiries) if enquiries.is_empty() => Ok(SearchOutcome::NotFound),
            Ok(enquiries) => {
                info!(%term, matches = enquiries.len(), "enquiries matched");
                Ok(SearchOutcome::Enquiries(enquiries))
            }
            Err(GatewayError::NotFound) => Ok(SearchOutcome::NotFound),
            Err(err) if err.is_unavailable() => {
                warn!(%term, error = %err, "enquiry search unavailable");
                Err(LookupError::ServiceUnavailable(err.to_string()))
            }
            Err(err) => {
                warn!(%term, error = %err, "enquiry search returned unusable data");
                Ok(SearchOutcome::NotFound)
            }
        }
    }

    /// Pick one record out of a search outcome.
    ///
    /// An admission hit resolves directly; enquiry lists need the enquiry `_id`.
    pub fn select(outcome: &SearchOutcome, enquiry_id: Option<&str>) -> Option<ResolvedRecord> {
        match outcome {
            SearchOutcome::Admission(record) => Some(ResolvedRecord::Admission(record.clone())),
            SearchOutcome::Enquiries(enquiries) => {
                let wanted = enquiry_id?.trim();
                enquiries
                    .iter()
                    .find(|enquiry| enquiry.id.as_deref().map(str::trim) == Some(wanted))
                    .map(|enquiry| ResolvedRecord::Enquiry(Box::new(enquiry.clone())))
            }
            SearchOutcome::NotFound => None,
        }
    }
}
