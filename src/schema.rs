//! Typed tool descriptions.
//!
//! A [`ToolSchema`] is the single source of truth for one conversion tool:
//! which files it accepts, how many, how they are named in the multipart body,
//! which options it takes (with bounds and defaults), where the request goes,
//! and whether a successful result is downloaded automatically. Both the
//! submitted payload and any rendered form are derived from it, so nothing
//! looks up form fields by string ID at runtime.

use serde::Serialize;

/// 50 MiB, the ceiling used by every observed tool.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Where and how a tool's request is posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Endpoint {
    /// `POST /process/{tool_id}`
    PerTool,
    /// `POST /process_tool` with an `X-Tool-Name: {tool_id}` header.
    SharedWithHeader,
    /// `POST /process-tool` with a `tool_name` form field.
    SharedWithField,
    /// `POST /api/tools/{tool_id}`
    Api,
    /// `POST` to a fixed path.
    Custom(String),
}

impl Endpoint {
    /// Path component for `tool_id`, always starting with `/`.
    pub fn path(&self, tool_id: &str) -> String {
        match self {
            Endpoint::PerTool => format!("/process/{}", tool_id),
            Endpoint::SharedWithHeader => "/process_tool".to_string(),
            Endpoint::SharedWithField => "/process-tool".to_string(),
            Endpoint::Api => format!("/api/tools/{}", tool_id),
            Endpoint::Custom(path) if path.starts_with('/') => path.clone(),
            Endpoint::Custom(path) => format!("/{}", path),
        }
    }
}

/// Multipart field naming for uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileField {
    /// Every file under the same key (`file` or `files`).
    Named(String),
    /// One key per file: `{prefix}{index}`, e.g. `file_0`, `file_1`.
    Indexed(String),
}

impl FileField {
    /// Field name for the file at `index`.
    pub fn name_for(&self, index: usize) -> String {
        match self {
            FileField::Named(name) => name.clone(),
            FileField::Indexed(prefix) => format!("{}{}", prefix, index),
        }
    }
}

/// When a successful result triggers a download without user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AutoDownload {
    #[default]
    Never,
    Always,
    /// Only when the result holds exactly one downloadable file.
    WhenSingleOutput,
}

/// Wire encoding of a boolean option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagEncoding {
    /// Always sent, as `"true"` or `"false"`.
    TrueFalse,
    /// Sent as `"on"` when set, omitted otherwise (HTML checkbox semantics).
    OnOrAbsent,
}

/// Type, bounds and default of a single option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OptionKind {
    /// Integer clamped into `min..=max`.
    Integer { min: i64, max: i64, default: i64 },
    /// One of a fixed set of strings.
    Choice {
        values: Vec<String>,
        default: String,
    },
    /// Boolean checkbox.
    Flag { default: bool, encoding: FlagEncoding },
    /// Free text, optionally required and optionally pattern-checked.
    Text {
        default: Option<String>,
        required: bool,
        pattern: Option<TextPattern>,
    },
}

/// Named validation patterns for text options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextPattern {
    /// `#rrggbb`
    HexColor,
}

/// An option is only shown (and submitted) while another option has a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub option: String,
    pub equals: String,
}

/// One user-adjustable processing option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub name: String,
    pub label: String,
    pub kind: OptionKind,
    pub visible_when: Option<Condition>,
}

impl OptionSpec {
    pub fn integer(name: &str, label: &str, min: i64, max: i64, default: i64) -> Self {
        Self::new(name, label, OptionKind::Integer { min, max, default })
    }

    pub fn choice(name: &str, label: &str, values: &[&str], default: &str) -> Self {
        Self::new(
            name,
            label,
            OptionKind::Choice {
                values: values.iter().map(|v| v.to_string()).collect(),
                default: default.to_string(),
            },
        )
    }

    pub fn flag(name: &str, label: &str, default: bool, encoding: FlagEncoding) -> Self {
        Self::new(name, label, OptionKind::Flag { default, encoding })
    }

    pub fn text(name: &str, label: &str, default: Option<&str>, required: bool) -> Self {
        Self::new(
            name,
            label,
            OptionKind::Text {
                default: default.map(str::to_string),
                required,
                pattern: None,
            },
        )
    }

    pub fn color(name: &str, label: &str, default: &str) -> Self {
        Self::new(
            name,
            label,
            OptionKind::Text {
                default: Some(default.to_string()),
                required: true,
                pattern: Some(TextPattern::HexColor),
            },
        )
    }

    /// Restrict this option to when `option` currently equals `value`.
    pub fn visible_when(mut self, option: &str, value: &str) -> Self {
        self.visible_when = Some(Condition {
            option: option.to_string(),
            equals: value.to_string(),
        });
        self
    }

    fn new(name: &str, label: &str, kind: OptionKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            visible_when: None,
        }
    }
}

/// Complete description of one conversion tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub id: String,
    pub name: String,
    /// Accepted MIME types. Empty means the tool takes no files.
    pub accepted_types: Vec<String>,
    /// Accepted lowercase extensions (without the dot), checked when the
    /// MIME type is unknown.
    pub accepted_extensions: Vec<String>,
    pub max_file_size: u64,
    pub min_files: usize,
    pub max_files: usize,
    pub file_field: FileField,
    pub endpoint: Endpoint,
    pub options: Vec<OptionSpec>,
    pub auto_download: AutoDownload,
    /// Filename suggested when the backend does not send one.
    pub default_output_name: String,
}

impl ToolSchema {
    /// Whether this tool is fed exactly one file, replacing the previous one.
    pub fn is_single_file(&self) -> bool {
        self.max_files == 1
    }

    /// Whether this tool takes no files at all.
    pub fn takes_files(&self) -> bool {
        self.max_files > 0
    }

    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Whether `mime` or `extension` is on the allow-list.
    pub fn accepts(&self, mime: Option<&str>, extension: Option<&str>) -> bool {
        if let Some(mime) = mime {
            let mime = mime.to_ascii_lowercase();
            if self.accepted_types.iter().any(|t| matches_mime(t, &mime)) {
                return true;
            }
        }
        match extension {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                self.accepted_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

/// `image/*` style wildcard match.
fn matches_mime(pattern: &str, mime: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(top) => mime
            .split_once('/')
            .map(|(t, _)| t == top)
            .unwrap_or(false),
        None => pattern == mime,
    }
}
