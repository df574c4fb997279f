//! Option collection: turn user input into the submitted key/value payload.
//!
//! Rebuilt from scratch before every submission. Numeric values are clamped
//! into the schema's bounds, absent controls fall back to the schema default,
//! flags are encoded per their [`FlagEncoding`], and options hidden by a
//! `visible_when` condition are left out entirely. No network I/O happens here.

use crate::error::ToolflowError;
use crate::schema::{FlagEncoding, OptionKind, OptionSpec, TextPattern, ToolSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// A value as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// The current state of the tool's controls, keyed by option name.
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    values: HashMap<String, RawValue>,
}

impl RawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn unset(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    /// Parse a `key=value` pair as typed on a command line.
    pub fn parse_pair(pair: &str) -> Result<(String, RawValue), ToolflowError> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ToolflowError::InvalidOptionValue {
                name: pair.to_string(),
                value: String::new(),
                reason: "expected key=value".to_string(),
            })?;
        Ok((key.trim().to_string(), RawValue::Text(value.to_string())))
    }
}

/// A value that was changed on its way into the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub name: String,
    pub requested: String,
    pub applied: String,
}

/// The flat, string-valued option payload, in schema order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingOptions {
    fields: Vec<(String, String)>,
    adjustments: Vec<Adjustment>,
}

impl ProcessingOptions {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values clamped into range.
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    /// Append an extra field not described by the schema (e.g. `tool_name`).
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }
}

/// Build the payload for `schema` from the current control state.
pub fn collect(schema: &ToolSchema, raw: &RawOptions) -> Result<ProcessingOptions, ToolflowError> {
    for key in raw.values.keys() {
        if schema.option(key).is_none() {
            warn!("{} has no option '{}'; ignoring it", schema.id, key);
        }
    }

    // Resolved value of every visible option, for `visible_when` lookups.
    let mut resolved: HashMap<&str, String> = HashMap::new();
    let mut out = ProcessingOptions::default();

    for spec in &schema.options {
        if let Some(cond) = &spec.visible_when {
            if resolved.get(cond.option.as_str()) != Some(&cond.equals) {
                debug!("Skipping hidden option {}", spec.name);
                continue;
            }
        }

        let Some(value) = collect_one(spec, raw.get(&spec.name), &mut out.adjustments)? else {
            continue;
        };
        resolved.insert(spec.name.as_str(), value.clone());
        out.fields.push((spec.name.clone(), value));
    }

    debug!("Collected {} option(s) for {}", out.len(), schema.id);
    Ok(out)
}

/// Resolve one option; `None` means the field is omitted from the payload.
fn collect_one(
    spec: &OptionSpec,
    raw: Option<&RawValue>,
    adjustments: &mut Vec<Adjustment>,
) -> Result<Option<String>, ToolflowError> {
    let invalid = |value: String, reason: &str| ToolflowError::InvalidOptionValue {
        name: spec.name.clone(),
        value,
        reason: reason.to_string(),
    };

    match &spec.kind {
        OptionKind::Integer { min, max, default } => {
            let requested = match raw {
                None => return Ok(Some(default.to_string())),
                Some(RawValue::Number(n)) => *n,
                Some(RawValue::Text(s)) if s.trim().is_empty() => {
                    return Ok(Some(default.to_string()))
                }
                Some(RawValue::Text(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid(s.clone(), "not a number"))?,
                Some(RawValue::Bool(b)) => return Err(invalid(b.to_string(), "not a number")),
            };
            if !requested.is_finite() {
                return Err(invalid(requested.to_string(), "not a finite number"));
            }
            let applied = (requested.round() as i64).clamp(*min, *max);
            if applied as f64 != requested {
                debug!("{}: {} clamped to {}", spec.name, requested, applied);
                adjustments.push(Adjustment {
                    name: spec.name.clone(),
                    requested: requested.to_string(),
                    applied: applied.to_string(),
                });
            }
            Ok(Some(applied.to_string()))
        }
        OptionKind::Choice { values, default } => match raw {
            None => Ok(Some(default.clone())),
            Some(RawValue::Text(s)) if s.trim().is_empty() => Ok(Some(default.clone())),
            Some(RawValue::Text(s)) => values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(s.trim()))
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    invalid(s.clone(), &format!("expected one of {}", values.join(", ")))
                }),
            Some(other) => Err(invalid(
                format!("{:?}", other),
                &format!("expected one of {}", values.join(", ")),
            )),
        },
        OptionKind::Flag { default, encoding } => {
            let set = match raw {
                None => *default,
                Some(RawValue::Bool(b)) => *b,
                Some(RawValue::Number(n)) => *n != 0.0,
                Some(RawValue::Text(s)) => {
                    parse_flag(s).ok_or_else(|| invalid(s.clone(), "expected true or false"))?
                }
            };
            Ok(match (encoding, set) {
                (FlagEncoding::TrueFalse, b) => Some(b.to_string()),
                (FlagEncoding::OnOrAbsent, true) => Some("on".to_string()),
                (FlagEncoding::OnOrAbsent, false) => None,
            })
        }
        OptionKind::Text {
            default,
            required,
            pattern,
        } => {
            let value = match raw {
                Some(RawValue::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(RawValue::Number(n)) => Some(n.to_string()),
                Some(RawValue::Bool(b)) => Some(b.to_string()),
                _ => default.clone(),
            };
            match value {
                None if *required => Err(ToolflowError::MissingOption {
                    name: spec.name.clone(),
                }),
                None => Ok(None),
                Some(v) => {
                    if let Some(TextPattern::HexColor) = pattern {
                        if !HEX_COLOR.is_match(&v) {
                            return Err(invalid(v, "expected a colour like #1a2b3c"));
                        }
                    }
                    Ok(Some(v))
                }
            }
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
