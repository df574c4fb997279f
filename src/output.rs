//! Processing results as returned by the backend.
//!
//! The backend answers every submission with one JSON object:
//!
//! ```json
//! { "success": true, "download_url": "/files/merged123.pdf", "filename": "merged.pdf" }
//! { "success": false, "error": "Encrypted PDFs are not supported" }
//! ```
//!
//! plus any number of tool-specific metrics. Known metrics get typed fields;
//! everything else is kept in [`ProcessingResult::extra`].

use crate::error::{ToolflowError, DEFAULT_FAILURE_MESSAGE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The backend's response record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Server-side file name, served from `/download/{output_file}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub original_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub page_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub file_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<OutputFile>,
    /// Tool-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One file of a multi-output result (e.g. split parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

/// A download control: exact server URL plus suggested filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub url: String,
    pub filename: String,
}

/// Figures shown next to the download controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSummary {
    pub message: Option<String>,
    pub original_size: Option<u64>,
    pub compressed_size: Option<u64>,
    /// Whole percent saved, `(original - compressed) / original`.
    pub savings_percent: Option<i64>,
    pub page_count: Option<u64>,
    pub file_count: Option<u64>,
    pub processing_time: Option<String>,
}

impl ProcessingResult {
    /// Parse a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, ToolflowError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ToolflowError::MalformedResponse {
                reason: format!("invalid JSON: {}", e),
            })?;
        if !value.is_object() {
            return Err(ToolflowError::MalformedResponse {
                reason: "expected a JSON object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| ToolflowError::MalformedResponse {
            reason: e.to_string(),
        })
    }

    /// `Ok(self)` on success, `Err(Rejected)` carrying the server's message
    /// (or the default) otherwise.
    pub fn into_outcome(self) -> Result<Self, ToolflowError> {
        if self.success {
            Ok(self)
        } else {
            Err(ToolflowError::Rejected {
                message: self
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            })
        }
    }

    /// Every download control this result should render, in order.
    ///
    /// The URL is kept exactly as the server sent it; `output_file` entries
    /// without a URL map to `/download/{output_file}`.
    pub fn download_links(&self, default_filename: &str) -> Vec<DownloadLink> {
        let mut links = Vec::new();
        if let Some(url) = resolve_link(self.download_url.as_deref(), self.output_file.as_deref()) {
            links.push(DownloadLink {
                url,
                filename: self
                    .filename
                    .clone()
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| default_filename.to_string()),
            });
        }
        for file in &self.output_files {
            if let Some(url) =
                resolve_link(file.download_url.as_deref(), file.output_file.as_deref())
            {
                links.push(DownloadLink {
                    url,
                    filename: file.filename.clone(),
                });
            }
        }
        links
    }

    pub fn summary(&self) -> ResultSummary {
        let savings_percent = match (self.original_size, self.compressed_size) {
            (Some(orig), Some(comp)) if orig > 0 => {
                Some(((orig as f64 - comp as f64) / orig as f64 * 100.0).round() as i64)
            }
            _ => None,
        };
        ResultSummary {
            message: self.message.clone(),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            savings_percent,
            page_count: self.page_count,
            file_count: self.file_count,
            processing_time: self.processing_time.as_ref().map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

fn resolve_link(download_url: Option<&str>, output_file: Option<&str>) -> Option<String> {
    match (download_url, output_file) {
        (Some(url), _) if !url.is_empty() => Some(url.to_string()),
        (_, Some(file)) if !file.is_empty() => Some(format!("/download/{}", file)),
        _ => None,
    }
}

/// Accept sizes sent either as numbers or as numeric strings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_link() {
        let r = ProcessingResult::from_json(
            br#"{"success":true,"download_url":"/files/merged123.pdf","filename":"merged.pdf"}"#,
        )
        .unwrap()
        .into_outcome()
        .unwrap();
        let links = r.download_links("merged_document.pdf");
        assert_eq!(
            links,
            vec![DownloadLink {
                url: "/files/merged123.pdf".into(),
                filename: "merged.pdf".into()
            }]
        );
    }

    #[test]
    fn failure_message_verbatim_or_default() {
        let err = ProcessingResult::from_json(br#"{"success":false,"error":"X"}"#)
            .unwrap()
            .into_outcome()
            .unwrap_err();
        assert_eq!(err.user_message(), "X");

        let err = ProcessingResult::from_json(br#"{"success":false}"#)
            .unwrap()
            .into_outcome()
            .unwrap_err();
        assert_eq!(err.user_message(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn output_file_maps_to_download_route() {
        let r = ProcessingResult::from_json(
            br#"{"success":true,"output_file":"compressed_1.pdf"}"#,
        )
        .unwrap();
        let links = r.download_links("compressed_document.pdf");
        assert_eq!(links[0].url, "/download/compressed_1.pdf");
        assert_eq!(links[0].filename, "compressed_document.pdf");
    }

    #[test]
    fn split_outputs_render_one_link_each() {
        let r = ProcessingResult::from_json(
            br#"{"success":true,"output_files":[
                {"filename":"split_part_1.pdf","output_file":"p1.pdf"},
                {"filename":"split_part_2.pdf","download_url":"/files/p2.pdf"}
            ]}"#,
        )
        .unwrap();
        let links = r.download_links("split.pdf");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "/download/p1.pdf");
        assert_eq!(links[1].url, "/files/p2.pdf");
    }

    #[test]
    fn savings_from_string_sizes() {
        let r = ProcessingResult::from_json(
            br#"{"success":true,"original_size":"1000","compressed_size":250,"processing_time":2.5,"engine":"gs"}"#,
        )
        .unwrap();
        let s = r.summary();
        assert_eq!(s.savings_percent, Some(75));
        assert_eq!(s.processing_time.as_deref(), Some("2.5"));
        assert_eq!(r.extra.get("engine"), Some(&Value::String("gs".into())));
    }

    #[test]
    fn rejects_non_object_and_invalid_json() {
        assert!(matches!(
            ProcessingResult::from_json(b"[1,2]"),
            Err(ToolflowError::MalformedResponse { .. })
        ));
        assert!(matches!(
            ProcessingResult::from_json(b"<html>"),
            Err(ToolflowError::MalformedResponse { .. })
        ));
    }
}
