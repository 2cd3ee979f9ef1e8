//! Named key/value options handed to each action at configuration time.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// One option value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Flag.
    Bool(bool),
    /// Any number; integers are stored as floats.
    Number(f64),
    /// Free text (names, enum tags).
    Text(String),
    /// Homogeneous or mixed list.
    List(Vec<OptionValue>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a boolean",
            Self::Number(_) => "a number",
            Self::Text(_) => "a string",
            Self::List(_) => "a list",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Options of one action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionOptions {
    values: BTreeMap<String, OptionValue>,
}

impl ActionOptions {
    /// Empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an option.
    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Raw lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// True if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Option names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Typed reader that reports errors against `action`.
    #[must_use]
    pub fn reader<'a>(&'a self, action: &'a str) -> OptionReader<'a> {
        OptionReader {
            action,
            options: self,
            seen: BTreeSet::new(),
        }
    }
}

/// Typed access to [`ActionOptions`], remembering which keys were read.
#[derive(Debug)]
pub struct OptionReader<'a> {
    action: &'a str,
    options: &'a ActionOptions,
    seen: BTreeSet<&'a str>,
}

impl<'a> OptionReader<'a> {
    fn invalid(&self, key: &str, reason: impl Into<String>) -> PipelineError {
        PipelineError::InvalidOption {
            action: self.action.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn lookup(&mut self, key: &'a str) -> Option<&'a OptionValue> {
        self.seen.insert(key);
        self.options.get(key)
    }

    /// Boolean option, `default` when absent.
    pub fn bool_or(&mut self, key: &'a str, default: bool) -> Result<bool> {
        match self.lookup(key) {
            None => Ok(default),
            Some(OptionValue::Bool(v)) => Ok(*v),
            Some(other) => {
                Err(self.invalid(key, format!("expected a boolean, got {}", other.kind())))
            }
        }
    }

    /// Optional numeric option.
    pub fn opt_f64(&mut self, key: &'a str) -> Result<Option<f64>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(OptionValue::Number(v)) if v.is_finite() => Ok(Some(*v)),
            Some(OptionValue::Number(_)) => Err(self.invalid(key, "expected a finite number")),
            Some(other) => {
                Err(self.invalid(key, format!("expected a number, got {}", other.kind())))
            }
        }
    }

    /// Numeric option, `default` when absent.
    pub fn f64_or(&mut self, key: &'a str, default: f64) -> Result<f64> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    /// Numeric option that must be present.
    pub fn required_f64(&mut self, key: &'a str) -> Result<f64> {
        self.opt_f64(key)?
            .ok_or_else(|| self.invalid(key, "missing required option"))
    }

    /// Non-negative integer option, `default` when absent.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn usize_or(&mut self, key: &'a str, default: usize) -> Result<usize> {
        match self.opt_f64(key)? {
            None => Ok(default),
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
            Some(v) => Err(self.invalid(key, format!("expected a non-negative integer, got {v}"))),
        }
    }

    /// List of strings; a single string counts as a one-element list.
    pub fn strings(&mut self, key: &'a str) -> Result<Vec<String>> {
        match self.lookup(key) {
            None => Ok(Vec::new()),
            Some(OptionValue::Text(s)) => Ok(vec![s.clone()]),
            Some(OptionValue::List(items)) => items
                .iter()
                .map(|item| match item {
                    OptionValue::Text(s) => Ok(s.clone()),
                    other => Err(self.invalid(
                        key,
                        format!("expected a list of strings, found {}", other.kind()),
                    )),
                })
                .collect(),
            Some(other) => Err(self.invalid(
                key,
                format!("expected a list of strings, got {}", other.kind()),
            )),
        }
    }

    /// Logs every option that was never read.
    pub fn finish(self) {
        for key in self.options.keys() {
            if !self.seen.contains(key) {
                warn!("{}: ignoring unknown option '{key}'", self.action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let options = ActionOptions::new()
            .with("enabled", true)
            .with("min_hits", 4u32)
            .with("distance", 2.5)
            .with("regions", vec!["beam", "side"]);
        let mut reader = options.reader("test");

        assert!(reader.bool_or("enabled", false).unwrap());
        assert_eq!(reader.usize_or("min_hits", 1).unwrap(), 4);
        assert!((reader.f64_or("distance", 0.0).unwrap() - 2.5).abs() < f64::EPSILON);
        assert!((reader.f64_or("absent", 7.0).unwrap() - 7.0).abs() < f64::EPSILON);
        assert_eq!(reader.strings("regions").unwrap(), vec!["beam", "side"]);
        reader.finish();
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let options = ActionOptions::new().with("min_hits", 2.5).with("flag", "yes");
        let mut reader = options.reader("clean");
        assert!(matches!(
            reader.usize_or("min_hits", 1),
            Err(PipelineError::InvalidOption { ref action, ref key, .. }) if action == "clean" && key == "min_hits"
        ));
        assert!(reader.bool_or("flag", false).is_err());
        assert!(reader.required_f64("missing").is_err());
    }

    #[test]
    fn test_single_string_as_list() {
        let options = ActionOptions::new().with("regions", "beam");
        assert_eq!(options.reader("x").strings("regions").unwrap(), vec!["beam"]);
    }
}
