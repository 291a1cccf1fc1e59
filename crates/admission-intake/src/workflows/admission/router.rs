use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::attachments::{AttachmentRejection, AttachmentUpdate};
use super::domain::RawFlag;
use super::draft::{Choice, ChoiceField, DocumentField, DraftAction, DraftField, FeeInput};
use super::gateway::{AdmissionGateway, DocumentStore, UploadFile};
use super::normalizer::coerce_choice;
use super::notify::{Notice, NoticeLog, Preconfirmed};
use super::resolver::LookupError;
use super::wizard::{IntakeWizard, SubmitError, ValidationErrors, WizardSnapshot, WizardStep};
use crate::config::IntakeSettings;

/// Headroom over the upload limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

type Wizard<G, S> = IntakeWizard<G, S, NoticeLog>;

struct Session<G, S> {
    wizard: Mutex<Wizard<G, S>>,
    notices: NoticeLog,
    last_seen: Mutex<Instant>,
}

impl<G, S> Session<G, S> {
    fn lock(&self) -> MutexGuard<'_, Wizard<G, S>> {
        match self.wizard.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn last_seen(&self) -> MutexGuard<'_, Instant> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn touch(&self) {
        *self.last_seen() = Instant::now();
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.last_seen().elapsed() > ttl
    }
}

/// Live wizard sessions keyed by a random session id. Sessions idle for longer than
/// [`IntakeSettings::session_ttl`] are dropped.
pub struct IntakeSessions<G, S> {
    gateway: Arc<G>,
    store: Arc<S>,
    settings: IntakeSettings,
    sessions: Mutex<HashMap<String, Arc<Session<G, S>>>>,
}

impl<G, S> IntakeSessions<G, S>
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    pub fn new(gateway: Arc<G>, store: Arc<S>, settings: IntakeSettings) -> Self {
        Self {
            gateway,
            store,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Session<G, S>>>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Drop every session idle for longer than the configured TTL; returns how many went.
    pub fn prune_idle(&self) -> usize {
        let ttl = self.settings.session_ttl;
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|_, session| !session.expired(ttl));
        let pruned = before - registry.len();
        if pruned > 0 {
            info!(pruned, remaining = registry.len(), "idle intake sessions dropped");
        }
        pruned
    }

    fn open(&self) -> (String, Arc<Session<G, S>>) {
        self.prune_idle();
        let notices = NoticeLog::default();
        let wizard = IntakeWizard::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.store),
            notices.clone(),
            self.settings.clone(),
        );
        let session = Arc::new(Session {
            wizard: Mutex::new(wizard),
            notices,
            last_seen: Mutex::new(Instant::now()),
        });
        let id = Uuid::new_v4().to_string();
        self.registry().insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, "intake session opened");
        (id, session)
    }

    fn get(&self, id: &str) -> Option<Arc<Session<G, S>>> {
        let mut registry = self.registry();
        let session = registry.get(id).cloned()?;
        if session.expired(self.settings.session_ttl) {
            registry.remove(id);
            debug!(session_id = %id, "intake session expired");
            return None;
        }
        session.touch();
        Some(session)
    }
}

/// Router exposing the intake wizard as a session-oriented JSON API.
pub fn intake_router<G, S>(sessions: Arc<IntakeSessions<G, S>>) -> Router
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let body_limit = sessions.settings().max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/api/v1/intake/sessions", post(create_handler::<G, S>))
        .route(
            "/api/v1/intake/sessions/:session_id",
            get(show_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/search",
            post(search_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/enquiries/:enquiry_id/select",
            post(select_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/draft",
            patch(draft_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/next",
            post(next_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/prev",
            post(prev_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/steps/:step",
            post(step_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/attachments/:field",
            post(upload_handler::<G, S>).delete(remove_attachment_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/registration-number",
            post(registration_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/submit",
            post(submit_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/reset",
            post(reset_handler::<G, S>),
        )
        .route(
            "/api/v1/intake/sessions/:session_id/clear",
            post(clear_handler::<G, S>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(sessions)
}

/// Status plus an optional extra key merged into the session response.
struct Reply {
    status: StatusCode,
    detail: Option<(&'static str, Value)>,
}

impl Reply {
    fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            detail: None,
        }
    }

    fn with(status: StatusCode, key: &'static str, value: Value) -> Self {
        Self {
            status,
            detail: Some((key, value)),
        }
    }
}

fn session_response(
    session_id: &str,
    reply: Reply,
    snapshot: WizardSnapshot,
    notices: Vec<Notice>,
) -> Response {
    let mut body = json!({
        "sessionId": session_id,
        "session": snapshot,
        "notices": notices,
    });
    if let Some((key, value)) = reply.detail {
        body[key] = value;
    }
    (reply.status, Json(body)).into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn unknown_session(session_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "unknown intake session",
            "sessionId": session_id,
        })),
    )
        .into_response()
}

/// Run `op` against the session's wizard on the blocking pool.
async fn run_blocking<G, S, F>(
    session: Arc<Session<G, S>>,
    op: F,
) -> Result<(Reply, WizardSnapshot, Vec<Notice>), Response>
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
    F: FnOnce(&mut Wizard<G, S>) -> Reply + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut wizard = session.lock();
        let reply = op(&mut wizard);
        let snapshot = wizard.snapshot();
        drop(wizard);
        (reply, snapshot, session.notices.drain())
    })
    .await
    .map_err(|err| {
        error!(error = %err, "intake session task failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "session task failed")
    })
}

async fn in_session<G, S, F>(
    sessions: &IntakeSessions<G, S>,
    session_id: &str,
    op: F,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
    F: FnOnce(&mut Wizard<G, S>) -> Reply + Send + 'static,
{
    let Some(session) = sessions.get(session_id) else {
        return unknown_session(session_id);
    };
    match run_blocking(session, op).await {
        Ok((reply, snapshot, notices)) => session_response(session_id, reply, snapshot, notices),
        Err(response) => response,
    }
}

pub(crate) async fn create_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let (session_id, session) = sessions.open();
    let snapshot = session.lock().snapshot();
    let notices = session.notices.drain();
    let reply = Reply {
        status: StatusCode::CREATED,
        detail: None,
    };
    session_response(&session_id, reply, snapshot, notices)
}

pub(crate) async fn show_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, |_| Reply::ok()).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    #[serde(default)]
    term: String,
}

pub(crate) async fn search_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, move |wizard| {
        match wizard.search(&request.term) {
            Ok(outcome) => Reply::with(StatusCode::OK, "search", json!(outcome)),
            Err(err @ LookupError::EmptyQuery) => Reply::with(
                StatusCode::UNPROCESSABLE_ENTITY,
                "error",
                json!(err.to_string()),
            ),
            Err(err @ LookupError::ServiceUnavailable(_)) => Reply::with(
                StatusCode::SERVICE_UNAVAILABLE,
                "error",
                json!(err.to_string()),
            ),
        }
    })
    .await
}

pub(crate) async fn select_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path((session_id, enquiry_id)): Path<(String, String)>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, move |wizard| {
        match wizard.select_enquiry(&enquiry_id) {
            Some(kind) => Reply::with(StatusCode::OK, "loaded", json!(kind.label())),
            None => Reply::with(
                StatusCode::NOT_FOUND,
                "error",
                json!(format!("enquiry '{enquiry_id}' is not in the last search results")),
            ),
        }
    })
    .await
}

pub(crate) async fn draft_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let actions = match draft_actions(&patch) {
        Ok(actions) => actions,
        Err(errors) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "invalid draft update", "errors": errors })),
            )
                .into_response()
        }
    };

    in_session(&sessions, &session_id, move |wizard| {
        let applied = actions
            .into_iter()
            .map(|action| wizard.dispatch(action))
            .filter(|accepted| *accepted)
            .count();
        if applied == 0 && !patch.is_empty() {
            Reply::with(StatusCode::CONFLICT, "applied", json!(0))
        } else {
            Reply::with(StatusCode::OK, "applied", json!(applied))
        }
    })
    .await
}

pub(crate) async fn next_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, |wizard| match wizard.next() {
        Ok(step) => Reply::with(StatusCode::OK, "step", json!(step.number())),
        Err(errors) => Reply::with(StatusCode::UNPROCESSABLE_ENTITY, "errors", json!(errors)),
    })
    .await
}

pub(crate) async fn prev_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, |wizard| {
        let step = wizard.prev();
        Reply::with(StatusCode::OK, "step", json!(step.number()))
    })
    .await
}

pub(crate) async fn step_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path((session_id, step)): Path<(String, u8)>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let Some(step) = WizardStep::from_number(step) else {
        return error_response(StatusCode::NOT_FOUND, format!("there is no step {step}"));
    };
    in_session(&sessions, &session_id, move |wizard| {
        if wizard.go_to(step) {
            Reply::with(StatusCode::OK, "step", json!(step.number()))
        } else {
            Reply::with(StatusCode::CONFLICT, "step", json!(wizard.current_step().number()))
        }
    })
    .await
}

fn attachment_json(update: &AttachmentUpdate) -> Value {
    json!({
        "field": update.field.key(),
        "reference": update.reference,
        "degraded": update.degraded,
        "warnings": update.warnings,
    })
}

async fn read_upload(multipart: &mut Multipart) -> Result<Option<UploadFile>, String> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|err| err.body_text())?
    {
        if part.name() != Some("file") {
            continue;
        }
        let file_name = part.file_name().unwrap_or_default().to_string();
        let content_type = part.content_type().unwrap_or_default().to_string();
        let bytes = part.bytes().await.map_err(|err| err.body_text())?;
        return Ok(Some(UploadFile::new(file_name, content_type, bytes.to_vec())));
    }
    Ok(None)
}

pub(crate) async fn upload_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path((session_id, field)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let Some(field) = DocumentField::from_key(&field) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("unknown document field '{field}'"),
        );
    };
    let file = match read_upload(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, "multipart field 'file' is missing")
        }
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };
    debug!(field = field.key(), file = ?file, "attachment received");

    in_session(&sessions, &session_id, move |wizard| {
        match wizard.upload(field, &file) {
            Ok(update) => Reply::with(StatusCode::OK, "attachment", attachment_json(&update)),
            Err(rejection) => {
                let status = match rejection {
                    AttachmentRejection::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    AttachmentRejection::UnsupportedType { .. } => {
                        StatusCode::UNSUPPORTED_MEDIA_TYPE
                    }
                    AttachmentRejection::Empty { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                };
                Reply::with(status, "error", json!(rejection.to_string()))
            }
        }
    })
    .await
}

pub(crate) async fn remove_attachment_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path((session_id, field)): Path<(String, String)>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let Some(field) = DocumentField::from_key(&field) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("unknown document field '{field}'"),
        );
    };
    in_session(&sessions, &session_id, move |wizard| {
        let update = wizard.remove_attachment(field);
        Reply::with(StatusCode::OK, "attachment", attachment_json(&update))
    })
    .await
}

pub(crate) async fn registration_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, |wizard| {
        let registration = wizard.regenerate_registration_number();
        Reply::with(StatusCode::OK, "registration", json!(registration))
    })
    .await
}

pub(crate) async fn submit_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    let Some(session) = sessions.get(&session_id) else {
        return unknown_session(&session_id);
    };

    let (tx, rx) = std::sync::mpsc::channel::<Duration>();
    let result = run_blocking(Arc::clone(&session), move |wizard| match wizard.submit() {
        Ok(outcome) => {
            let _ = tx.send(outcome.reset_after);
            Reply::with(StatusCode::OK, "submission", json!(outcome))
        }
        Err(SubmitError::Validation(errors)) => {
            Reply::with(StatusCode::UNPROCESSABLE_ENTITY, "errors", json!(errors))
        }
        Err(err @ SubmitError::Service(_)) => {
            Reply::with(StatusCode::BAD_GATEWAY, "error", json!(err.to_string()))
        }
        Err(
            err @ (SubmitError::NotOnReview(_)
            | SubmitError::InProgress
            | SubmitError::AlreadySubmitted),
        ) => Reply::with(StatusCode::CONFLICT, "error", json!(err.to_string())),
    })
    .await;

    if let Ok(delay) = rx.try_recv() {
        schedule_reset(session, delay);
    }

    match result {
        Ok((reply, snapshot, notices)) => session_response(&session_id, reply, snapshot, notices),
        Err(response) => response,
    }
}

fn schedule_reset<G, S>(session: Arc<Session<G, S>>, delay: Duration)
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let reset = tokio::task::spawn_blocking(move || session.lock().reset_after_submission());
        if let Ok(true) = reset.await {
            debug!("intake session reset after submission");
        }
    });
}

pub(crate) async fn reset_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, |wizard| {
        if wizard.reset_after_submission() {
            Reply::ok()
        } else {
            Reply::with(
                StatusCode::CONFLICT,
                "error",
                json!("nothing has been submitted yet; use clear to discard the form"),
            )
        }
    })
    .await
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClearRequest {
    #[serde(default)]
    confirm: bool,
}

pub(crate) async fn clear_handler<G, S>(
    State(sessions): State<Arc<IntakeSessions<G, S>>>,
    Path(session_id): Path<String>,
    Json(request): Json<ClearRequest>,
) -> Response
where
    G: AdmissionGateway + 'static,
    S: DocumentStore + 'static,
{
    in_session(&sessions, &session_id, move |wizard| {
        let cleared = wizard.clear(&Preconfirmed(request.confirm));
        Reply::with(StatusCode::OK, "cleared", json!(cleared))
    })
    .await
}

/// Translate a `{ field: value }` patch into reducer actions. Nothing is applied on error.
///
/// A choice companion (`speciallyAbledDetails`, `computerAccessOther`) sent next to its selector
/// is read together with it; sent alone it only edits the detail of an existing `Other`.
pub fn draft_actions(patch: &Map<String, Value>) -> Result<Vec<DraftAction>, ValidationErrors> {
    let mut actions = Vec::with_capacity(patch.len());
    let mut errors = ValidationErrors::default();

    for (key, value) in patch {
        let action = match ChoiceField::from_companion_key(key) {
            Some(field) if patch.contains_key(field.key()) => continue,
            Some(field) => text(value).map(|detail| DraftAction::SetChoiceDetail(field, detail)),
            None => patch_action(key, value, patch),
        };
        match action {
            Ok(action) => actions.push(action),
            Err(message) => errors.insert(key, message),
        }
    }

    if errors.is_empty() {
        Ok(actions)
    } else {
        Err(errors)
    }
}

fn patch_action(key: &str, value: &Value, patch: &Map<String, Value>) -> Result<DraftAction, String> {
    let name = Value::String(key.to_string());
    match key {
        "futureGoals" => goals(value).map(DraftAction::SetGoals),
        "toggleGoal" => text(value).map(DraftAction::ToggleGoal),
        _ => {
            if let Ok(field) = serde_json::from_value::<DraftField>(name.clone()) {
                return text(value).map(|text| DraftAction::SetText(field, text));
            }
            if let Ok(input) = serde_json::from_value::<FeeInput>(name.clone()) {
                return text(value).map(|text| DraftAction::SetFee(input, text));
            }
            if let Ok(field) = serde_json::from_value::<ChoiceField>(name) {
                let companion = match field.companion_key().and_then(|key| patch.get(key)) {
                    Some(detail) => Some(text(detail)?),
                    None => None,
                };
                return choice(value, companion.as_deref())
                    .map(|choice| DraftAction::SetChoice(field, choice));
            }
            if DocumentField::from_key(key).is_some() {
                return Err("documents are changed through the attachments endpoint".to_string());
            }
            Err("unknown field".to_string())
        }
    }
}

fn text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err("expected a text value".to_string()),
    }
}

fn choice(value: &Value, companion: Option<&str>) -> Result<Choice, String> {
    match value {
        Value::Bool(flag) => Ok(coerce_choice(Some(&RawFlag::Bool(*flag)), companion)),
        Value::String(text) => Ok(coerce_choice(Some(&RawFlag::Text(text.clone())), companion)),
        Value::Null => Ok(Choice::No),
        Value::Object(_) => {
            serde_json::from_value(value.clone()).map_err(|err| format!("invalid choice: {err}"))
        }
        _ => Err("expected Yes, No, Other or { value, detail }".to_string()),
    }
}

fn goals(value: &Value) -> Result<BTreeSet<String>, String> {
    match value {
        Value::Array(items) => items.iter().map(text).collect(),
        Value::String(joined) => Ok(joined
            .split(',')
            .map(|goal| goal.trim().to_string())
            .filter(|goal| !goal.is_empty())
            .collect()),
        Value::Null => Ok(BTreeSet::new()),
        _ => Err("expected a list of goals".to_string()),
    }
}
