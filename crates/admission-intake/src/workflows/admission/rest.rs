//! `reqwest` adapter for the institute backend, exposed through the synchronous ports.
//!
//! Calls are driven on a captured runtime handle, so the adapter must be used from a blocking
//! context (`spawn_blocking` or a plain thread), never directly inside an async task.

use std::time::Duration;

use reqwest::{multipart, Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::domain::{AdmissionRecord, Enquiry, StudentId};
use super::gateway::{AdmissionGateway, DocumentStore, GatewayError, UploadFile};
use crate::config::BackendConfig;

/// Either `{ "data": ... }` or the bare payload.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } | Envelope::Bare(data) => data,
        }
    }
}

#[derive(Deserialize)]
struct StoredPath {
    #[serde(default, alias = "url", alias = "filePath")]
    path: String,
}

pub struct RestGateway {
    client: Client,
    base_url: Url,
    runtime: Handle,
}

impl RestGateway {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        runtime: Handle,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim().trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| GatewayError::Unavailable(format!("invalid backend URL '{raw}'")))?;
        Ok(Self {
            client,
            base_url,
            runtime,
        })
    }

    /// Build from configuration, or `None` when no backend URL is configured.
    pub fn from_config(
        config: &BackendConfig,
        runtime: Handle,
    ) -> Option<Result<Self, GatewayError>> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, config.timeout, runtime))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base URL extended by `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        self.runtime.block_on(async {
            let response = checked(request).await?;
            let body = response
                .json::<Value>()
                .await
                .map_err(|err| GatewayError::UnexpectedResponse(err.to_string()))?;
            unwrap_body(body)
        })
    }

    /// For endpoints whose body carries nothing but an acknowledgement.
    fn send_ack(&self, request: RequestBuilder) -> Result<(), GatewayError> {
        self.runtime.block_on(async {
            let response = checked(request).await?;
            let body = response.text().await.map_err(transport_error)?;
            acknowledge(&body)
        })
    }
}

/// `{ "success": false }` is a failure whatever the status code said.
fn reject_unsuccessful(body: &Value) -> Result<(), GatewayError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("backend reported success: false");
        return Err(GatewayError::UnexpectedResponse(message.to_string()));
    }
    Ok(())
}

fn unwrap_body<T: DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    reject_unsuccessful(&body)?;
    serde_json::from_value::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|err| GatewayError::UnexpectedResponse(err.to_string()))
}

/// An empty or non-JSON body counts as an acknowledgement.
fn acknowledge(body: &str) -> Result<(), GatewayError> {
    match serde_json::from_str::<Value>(body) {
        Ok(body) => reject_unsuccessful(&body),
        Err(_) => Ok(()),
    }
}

async fn checked(request: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        });
    }
    Ok(response)
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::UnexpectedResponse(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

impl AdmissionGateway for RestGateway {
    fn search_enquiries(&self, name: &str) -> Result<Vec<Enquiry>, GatewayError> {
        debug!(%name, "searching enquiries");
        let request = self
            .client
            .get(self.endpoint(&["enquiry", "search"]))
            .query(&[("name", name)]);
        self.send(request)
    }

    fn find_admission_by_reg_no(&self, reg_no: &str) -> Result<AdmissionRecord, GatewayError> {
        debug!(%reg_no, "fetching admission by registration number");
        let request = self
            .client
            .get(self.endpoint(&["student", "regNo", reg_no]));
        self.send(request)
    }

    fn create_admission(&self, record: &AdmissionRecord) -> Result<AdmissionRecord, GatewayError> {
        let request = self.client.post(self.endpoint(&["student"])).json(record);
        self.send(request)
    }

    fn update_admission(
        &self,
        id: &StudentId,
        record: &AdmissionRecord,
    ) -> Result<AdmissionRecord, GatewayError> {
        let request = self
            .client
            .put(self.endpoint(&["student", id.as_str()]))
            .json(record);
        self.send(request)
    }
}

impl DocumentStore for RestGateway {
    fn upload(&self, file: &UploadFile, folder: &str) -> Result<String, GatewayError> {
        let content_type = if file.content_type.trim().is_empty() {
            mime_guess::from_path(&file.file_name)
                .first_or_octet_stream()
                .to_string()
        } else {
            file.content_type.trim().to_string()
        };
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&content_type)
            .map_err(|err| GatewayError::UnexpectedResponse(err.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("folder", folder.to_string());
        let request = self.client.post(self.endpoint(&["upload"])).multipart(form);
        let stored: StoredPath = self.send(request)?;
        Ok(stored.path)
    }

    fn delete(&self, path: &str) -> Result<(), GatewayError> {
        let request = self
            .client
            .delete(self.endpoint(&["upload"]))
            .query(&[("path", path)]);
        self.send_ack(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_accepts_wrapped_and_bare_lists() {
        let wrapped: Envelope<Vec<Enquiry>> =
            serde_json::from_str(r#"{"data":[{"_id":"e1","fullName":"asha"}]}"#).expect("json");
        let bare: Envelope<Vec<Enquiry>> =
            serde_json::from_str(r#"[{"_id":"e2","name":"ravi"}]"#).expect("json");

        let wrapped = wrapped.into_inner();
        let bare = bare.into_inner();
        assert_eq!(wrapped[0].id.as_deref(), Some("e1"));
        assert_eq!(bare[0].full_name.as_deref(), Some("ravi"));
    }

    #[test]
    fn upload_response_path_is_read_from_data() {
        let body = r#"{"success":true,"data":{"path":"R0011025/photo.png"}}"#;
        let stored: Envelope<StoredPath> = serde_json::from_str(body).expect("json");
        assert_eq!(stored.into_inner().path, "R0011025/photo.png");
    }

    #[test]
    fn unsuccessful_upload_is_not_taken_as_a_path() {
        let body = serde_json::json!({
            "success": false,
            "message": "disk quota exceeded",
            "data": { "path": "temp/photo.png" }
        });

        let result = unwrap_body::<StoredPath>(body).map(|stored| stored.path);

        assert_eq!(
            result,
            Err(GatewayError::UnexpectedResponse(
                "disk quota exceeded".to_string()
            ))
        );
    }

    #[test]
    fn acknowledgement_requires_success() {
        assert!(acknowledge(r#"{"success":true}"#).is_ok());
        assert!(acknowledge("").is_ok());
        assert!(matches!(
            acknowledge(r#"{"success":false}"#),
            Err(GatewayError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_trimmed() {
        let gateway = RestGateway::new(
            "http://backend.local/api/",
            Duration::from_secs(5),
            Handle::current(),
        )
        .expect("client");
        assert_eq!(gateway.base_url(), "http://backend.local/api");
        assert_eq!(
            gateway.endpoint(&["student"]).as_str(),
            "http://backend.local/api/student"
        );
    }

    #[tokio::test]
    async fn path_segments_are_percent_encoded() {
        let gateway = RestGateway::new(
            "http://backend.local/api",
            Duration::from_secs(5),
            Handle::current(),
        )
        .expect("client");

        let url = gateway.endpoint(&["student", "regNo", "R001?x=1#top/2"]);

        assert_eq!(
            url.as_str(),
            "http://backend.local/api/student/regNo/R001%3Fx=1%23top%2F2"
        );
        assert_eq!(url.query(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_reports_backend_refusal() {
        let app = axum::Router::new().route(
            "/upload",
            axum::routing::delete(|| async {
                axum::Json(serde_json::json!({ "success": false, "message": "file locked" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        let gateway = RestGateway::new(
            format!("http://{addr}"),
            Duration::from_secs(5),
            Handle::current(),
        )
        .expect("client");

        let result = tokio::task::spawn_blocking(move || gateway.delete("temp/photo.png"))
            .await
            .expect("join");

        assert_eq!(
            result,
            Err(GatewayError::UnexpectedResponse("file locked".to_string()))
        );
    }
}
