//! Strategy parameter schemas and permissive validation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::error::StratsimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
    Choice,
}

/// A parameter value as supplied by a caller or stored after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl ParamValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            ParamValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) if f.is_finite() => Some(*f),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
}

impl ParamDef {
    pub fn int(name: &'static str, label: &'static str, default: i64, min: i64, max: i64) -> Self {
        ParamDef {
            name,
            label,
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            min: Some(min as f64),
            max: Some(max as f64),
            options: Vec::new(),
        }
    }

    pub fn float(name: &'static str, label: &'static str, default: f64, min: f64, max: f64) -> Self {
        ParamDef {
            name,
            label,
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            min: Some(min),
            max: Some(max),
            options: Vec::new(),
        }
    }

    pub fn choice(
        name: &'static str,
        label: &'static str,
        default: &'static str,
        options: &[&'static str],
    ) -> Self {
        ParamDef {
            name,
            label,
            kind: ParamKind::Choice,
            default: ParamValue::Text(default.to_string()),
            min: None,
            max: None,
            options: options.to_vec(),
        }
    }

    fn coerce(&self, raw: Option<&ParamValue>) -> ParamValue {
        let Some(raw) = raw else {
            return self.default.clone();
        };
        match self.kind {
            ParamKind::Int => match raw.as_i64() {
                Some(mut v) => {
                    if let Some(min) = self.min {
                        v = v.max(min as i64);
                    }
                    if let Some(max) = self.max {
                        v = v.min(max as i64);
                    }
                    ParamValue::Int(v)
                }
                None => self.default.clone(),
            },
            ParamKind::Float => match raw.as_f64() {
                Some(mut v) => {
                    if let Some(min) = self.min {
                        v = v.max(min);
                    }
                    if let Some(max) = self.max {
                        v = v.min(max);
                    }
                    ParamValue::Float(v)
                }
                None => self.default.clone(),
            },
            ParamKind::Choice => match raw {
                ParamValue::Text(s) if self.options.contains(&s.as_str()) => raw.clone(),
                _ => self.default.clone(),
            },
        }
    }
}

/// Parameters as supplied by a caller, before validation.
pub type RawParams = HashMap<String, ParamValue>;

/// Validated parameters: exactly one value per declared parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str) -> Result<i64, StratsimError> {
        match self.0.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            _ => Err(missing(name, "int")),
        }
    }

    /// Integer parameter used as a window length.
    pub fn period(&self, name: &str) -> Result<usize, StratsimError> {
        let v = self.int(name)?;
        usize::try_from(v).map_err(|_| StratsimError::InvalidRequest {
            reason: format!("parameter {name} must be non-negative, got {v}"),
        })
    }

    pub fn float(&self, name: &str) -> Result<f64, StratsimError> {
        match self.0.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            _ => Err(missing(name, "float")),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, StratsimError> {
        match self.0.get(name) {
            Some(ParamValue::Text(v)) => Ok(v),
            _ => Err(missing(name, "choice")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

fn missing(name: &str, kind: &str) -> StratsimError {
    StratsimError::InvalidRequest {
        reason: format!("missing {kind} parameter {name}"),
    }
}

/// Coerce `raw` against `defs`. Validation never fails:
///
/// - missing parameters take their default
/// - numeric values are clamped to the declared bounds; int and float are
///   converted into each other and numeric strings are parsed
/// - values that cannot be converted, and unrecognized choices, take the
///   default
/// - names not declared in `defs` are dropped
pub fn validate(defs: &[ParamDef], raw: &RawParams) -> Params {
    Params(
        defs.iter()
            .map(|def| (def.name.to_string(), def.coerce(raw.get(def.name))))
            .collect(),
    )
}
