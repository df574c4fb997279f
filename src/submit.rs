//! Submission: build the multipart request and classify the response.
//!
//! The network itself sits behind the [`Transport`] trait so a controller can
//! be driven by [`ReqwestTransport`] in production and by an in-process mock
//! in tests. Everything around the wire (which path, which header, which
//! field names, how a response body maps onto success or failure) lives in
//! plain functions here and is shared by every transport.

use crate::config::ClientConfig;
use crate::error::ToolflowError;
use crate::intake::FileCandidate;
use crate::options::ProcessingOptions;
use crate::output::ProcessingResult;
use crate::schema::{Endpoint, ToolSchema};
use futures::future::BoxFuture;
use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// One uploaded file in the multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// A fully resolved submission, ready to hand to a [`Transport`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Path relative to the configured base URL, e.g. `/process_tool`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    /// String-valued form fields, in submission order.
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl SubmitRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status, `Retry-After` and body of an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// A response carrying `body` as JSON.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The HTTP boundary.
///
/// Implementations must be `Send + Sync`; a controller shares its transport
/// with the auto-download task. Paths may be relative (joined onto the base
/// URL) or absolute.
pub trait Transport: Send + Sync {
    /// Issue exactly one `POST` for `request`.
    fn submit<'a>(
        &'a self,
        request: &'a SubmitRequest,
    ) -> BoxFuture<'a, Result<RawResponse, ToolflowError>>;

    /// Issue one `GET`, used for the health probe and result downloads.
    fn fetch<'a>(&'a self, path_or_url: &'a str)
        -> BoxFuture<'a, Result<RawResponse, ToolflowError>>;
}

/// Assemble the request for `schema` from the selected files and collected
/// options. Reads file contents; performs no network I/O.
///
/// Contents are re-checked against `max_file_size`, since a file on disk may
/// have grown since it was selected.
pub async fn build_request(
    schema: &ToolSchema,
    files: &[FileCandidate],
    options: &ProcessingOptions,
    max_file_size: u64,
) -> Result<SubmitRequest, ToolflowError> {
    let mut request = SubmitRequest {
        path: schema.endpoint.path(&schema.id),
        ..Default::default()
    };

    match schema.endpoint {
        Endpoint::SharedWithHeader => request
            .headers
            .push(("X-Tool-Name".to_string(), schema.id.clone())),
        Endpoint::SharedWithField => request
            .fields
            .push(("tool_name".to_string(), schema.id.clone())),
        _ => {}
    }

    request
        .fields
        .extend(options.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    for (index, file) in files.iter().enumerate() {
        let bytes = file.read_bytes().await?;
        if bytes.len() as u64 > max_file_size {
            return Err(ToolflowError::FileTooLarge {
                name: file.name.clone(),
                size: bytes.len() as u64,
                max: max_file_size,
            });
        }
        request.files.push(FilePart {
            field: schema.file_field.name_for(index),
            filename: file.name.clone(),
            mime: file.mime.clone(),
            bytes,
        });
    }

    debug!(
        "Built request for '{}': POST {} ({} field(s), {} file(s))",
        schema.id,
        request.path,
        request.fields.len(),
        request.files.len()
    );
    Ok(request)
}

/// Map a submission response onto a result or an error.
///
/// * 429 → [`ToolflowError::RateLimited`]
/// * other non-2xx → [`ToolflowError::HttpStatus`], message from the body's
///   `error` field when present
/// * 2xx with `success: false` → [`ToolflowError::Rejected`]
/// * 2xx that is not a JSON object → [`ToolflowError::MalformedResponse`]
pub fn classify(response: RawResponse) -> Result<ProcessingResult, ToolflowError> {
    if response.status == 429 {
        return Err(ToolflowError::RateLimited {
            retry_after_secs: response
                .retry_after
                .as_deref()
                .and_then(|v| v.trim().parse().ok()),
        });
    }
    if !response.is_success() {
        return Err(ToolflowError::HttpStatus {
            status: response.status,
            message: error_message(&response.body)
                .unwrap_or_else(|| reason_phrase(response.status).to_string()),
        });
    }
    ProcessingResult::from_json(&response.body)?.into_outcome()
}

/// Probe `GET /health`.
pub async fn health_check(transport: &dyn Transport) -> Result<HealthStatus, ToolflowError> {
    let response = transport.fetch("/health").await?;
    if !response.is_success() {
        return Err(ToolflowError::HttpStatus {
            status: response.status,
            message: error_message(&response.body)
                .unwrap_or_else(|| reason_phrase(response.status).to_string()),
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| ToolflowError::MalformedResponse {
        reason: format!("health response: {}", e),
    })
}

fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unexpected status")
}

// ── reqwest transport ─────────────────────────────────────────────────────

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ToolflowError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ToolflowError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn map_send_error(&self, endpoint: &str, e: reqwest::Error) -> ToolflowError {
        if e.is_timeout() {
            ToolflowError::Timeout {
                endpoint: endpoint.to_string(),
                secs: self.config.request_timeout_secs.unwrap_or_default(),
            }
        } else {
            ToolflowError::Network {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }

    async fn read(
        &self,
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<RawResponse, ToolflowError> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(endpoint, e))?;
        debug!("{} -> HTTP {} ({} bytes)", endpoint, status, body.len());
        Ok(RawResponse {
            status,
            retry_after,
            body: body.to_vec(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn submit<'a>(
        &'a self,
        request: &'a SubmitRequest,
    ) -> BoxFuture<'a, Result<RawResponse, ToolflowError>> {
        Box::pin(async move {
            let url = self.config.resolve_url(&request.path)?;
            let endpoint = url.to_string();

            let mut form = Form::new();
            for (name, value) in &request.fields {
                form = form.text(name.clone(), value.clone());
            }
            for file in &request.files {
                let mut part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
                if let Some(mime) = &file.mime {
                    part = part.mime_str(mime).map_err(|e| ToolflowError::Network {
                        endpoint: endpoint.clone(),
                        reason: format!("invalid content type '{}': {}", mime, e),
                    })?;
                }
                form = form.part(file.field.clone(), part);
            }

            let mut builder = self.client.post(url).multipart(form);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| self.map_send_error(&endpoint, e))?;
            self.read(&endpoint, response).await
        })
    }

    fn fetch<'a>(
        &'a self,
        path_or_url: &'a str,
    ) -> BoxFuture<'a, Result<RawResponse, ToolflowError>> {
        Box::pin(async move {
            let url = self.config.resolve_url(path_or_url)?;
            let endpoint = url.to_string();
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| self.map_send_error(&endpoint, e))?;
            self.read(&endpoint, response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{collect, RawOptions};
    use crate::tools;
    use serde_json::json;

    fn pdf(name: &str) -> FileCandidate {
        FileCandidate::from_bytes(name, Some("application/pdf"), b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn merger_uses_shared_endpoint_with_header() {
        let schema = tools::pdf_merger();
        let opts = collect(&schema, &RawOptions::new()).unwrap();
        let max = schema.max_file_size;
        let req = build_request(&schema, &[pdf("a.pdf"), pdf("b.pdf")], &opts, max)
            .await
            .unwrap();
        assert_eq!(req.path, "/process_tool");
        assert_eq!(req.header("x-tool-name"), Some("pdf-merger"));
        assert!(req.files.iter().all(|f| f.field == "files"));
        assert_eq!(req.files[1].filename, "b.pdf");
    }

    #[tokio::test]
    async fn converter_indexes_files_and_sends_tool_name() {
        let schema = tools::image_converter();
        let opts = collect(&schema, &RawOptions::new()).unwrap();
        let files = vec![
            FileCandidate::from_bytes("a.png", Some("image/png"), vec![1]),
            FileCandidate::from_bytes("b.png", Some("image/png"), vec![2]),
        ];
        let req = build_request(&schema, &files, &opts, schema.max_file_size)
            .await
            .unwrap();
        assert_eq!(req.path, "/process-tool");
        assert_eq!(req.field("tool_name"), Some("image-converter"));
        assert_eq!(req.field("format"), Some("png"));
        assert_eq!(req.files[0].field, "file_0");
        assert_eq!(req.files[1].field, "file_1");
        assert!(req.header("X-Tool-Name").is_none());
    }

    #[tokio::test]
    async fn file_grown_since_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let candidate = FileCandidate::from_path(&path).unwrap();
        std::fs::write(&path, [b'x'; 64]).unwrap();

        let schema = tools::pdf_compressor();
        let opts = collect(&schema, &RawOptions::new()).unwrap();
        let err = build_request(&schema, &[candidate], &opts, 32)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolflowError::FileTooLarge { size: 64, max: 32, .. }
        ));
    }

    #[test]
    fn classify_success_and_rejection() {
        let ok = classify(RawResponse::json(
            200,
            &json!({"success": true, "download_url": "/files/x.pdf"}),
        ))
        .unwrap();
        assert_eq!(ok.download_url.as_deref(), Some("/files/x.pdf"));

        let err = classify(RawResponse::json(
            200,
            &json!({"success": false, "error": "Encrypted"}),
        ))
        .unwrap_err();
        assert!(matches!(err, ToolflowError::Rejected { ref message } if message == "Encrypted"));
    }

    #[test]
    fn classify_error_statuses() {
        let err = classify(RawResponse::json(400, &json!({"error": "No file provided"}))).unwrap_err();
        assert!(matches!(
            err,
            ToolflowError::HttpStatus { status: 400, ref message } if message == "No file provided"
        ));

        let err = classify(RawResponse {
            status: 502,
            retry_after: None,
            body: b"<html>bad gateway</html>".to_vec(),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ToolflowError::HttpStatus { status: 502, ref message } if message == "Bad Gateway"
        ));

        let err = classify(RawResponse {
            status: 429,
            retry_after: Some("30".into()),
            body: Vec::new(),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ToolflowError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
    }

    #[test]
    fn classify_malformed_success_body() {
        let err = classify(RawResponse {
            status: 200,
            retry_after: None,
            body: b"OK".to_vec(),
        })
        .unwrap_err();
        assert!(matches!(err, ToolflowError::MalformedResponse { .. }));
    }
}
