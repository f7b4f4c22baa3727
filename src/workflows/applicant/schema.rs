//! Declarative field rules composed into per-step schemas.
//!
//! Each rule evaluates its checks in a fixed order (required, length,
//! pattern, numeric, refine) and stops at the first failure. Rules in a
//! schema are independent, so one step can report several failing fields.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Field-path keyed error map. At most one message per path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.insert(path.into(), message.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.0.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(path, message)| (path.as_str(), message.as_str()))
    }

    /// Drop `prefix` itself and every path nested below it.
    pub fn clear_scope(&mut self, prefix: &str) {
        self.0
            .retain(|path, _| !(path == prefix || is_nested(path, prefix)));
    }

    /// Whether any error is recorded at or below `prefix`.
    pub fn has_scope(&self, prefix: &str) -> bool {
        self.0
            .keys()
            .any(|path| path == prefix || is_nested(path, prefix))
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// Record or clear a single field outcome.
    pub fn apply(&mut self, path: &str, outcome: Option<&str>) {
        match outcome {
            Some(message) => self.insert(path, message),
            None => {
                self.remove(path);
            }
        }
    }
}

fn is_nested(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .map_or(false, |rest| rest.starts_with('.'))
}

/// A field value as seen by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Choice(Option<&'static str>),
    Flag(bool),
}

impl<'a> FieldValue<'a> {
    fn is_present(&self) -> bool {
        match self {
            FieldValue::Text(text) => !text.trim().is_empty(),
            FieldValue::Choice(choice) => choice.is_some(),
            FieldValue::Flag(flag) => *flag,
        }
    }

    fn text(&self) -> &'a str {
        match *self {
            FieldValue::Text(text) => text,
            FieldValue::Choice(choice) => choice.unwrap_or(""),
            FieldValue::Flag(true) => "true",
            FieldValue::Flag(false) => "false",
        }
    }
}

enum Reader<R> {
    Text(fn(&R) -> &str),
    Choice(fn(&R) -> Option<&'static str>),
    Flag(fn(&R) -> bool),
}

type Refinement<R> = Box<dyn Fn(&str, &R) -> bool + Send + Sync>;

struct Check<T> {
    value: T,
    message: &'static str,
}

/// Validation rule for one field of `R`.
pub struct FieldRule<R> {
    key: &'static str,
    reader: Reader<R>,
    required: Option<&'static str>,
    min_length: Option<Check<usize>>,
    max_length: Option<Check<usize>>,
    pattern: Option<Check<Regex>>,
    non_negative_integer: Option<&'static str>,
    refine: Vec<Check<Refinement<R>>>,
}

impl<R> FieldRule<R> {
    fn with_reader(key: &'static str, reader: Reader<R>) -> Self {
        Self {
            key,
            reader,
            required: None,
            min_length: None,
            max_length: None,
            pattern: None,
            non_negative_integer: None,
            refine: Vec::new(),
        }
    }

    pub fn text(key: &'static str, read: fn(&R) -> &str) -> Self {
        Self::with_reader(key, Reader::Text(read))
    }

    pub fn choice(key: &'static str, read: fn(&R) -> Option<&'static str>) -> Self {
        Self::with_reader(key, Reader::Choice(read))
    }

    pub fn flag(key: &'static str, read: fn(&R) -> bool) -> Self {
        Self::with_reader(key, Reader::Flag(read))
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn min_length(mut self, value: usize, message: &'static str) -> Self {
        self.min_length = Some(Check { value, message });
        self
    }

    pub fn max_length(mut self, value: usize, message: &'static str) -> Self {
        self.max_length = Some(Check { value, message });
        self
    }

    pub fn pattern(mut self, pattern: &str, message: &'static str) -> Result<Self, regex::Error> {
        self.pattern = Some(Check {
            value: Regex::new(pattern)?,
            message,
        });
        Ok(self)
    }

    pub fn non_negative_integer(mut self, message: &'static str) -> Self {
        self.non_negative_integer = Some(message);
        self
    }

    /// Cross-field predicate receiving the field text and the whole target.
    /// Refinements run in the order they were added.
    pub fn refine<F>(mut self, predicate: F, message: &'static str) -> Self
    where
        F: Fn(&str, &R) -> bool + Send + Sync + 'static,
    {
        self.refine.push(Check {
            value: Box::new(predicate),
            message,
        });
        self
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    fn read<'a>(&self, target: &'a R) -> FieldValue<'a> {
        match &self.reader {
            Reader::Text(read) => FieldValue::Text(read(target)),
            Reader::Choice(read) => FieldValue::Choice(read(target)),
            Reader::Flag(read) => FieldValue::Flag(read(target)),
        }
    }

    /// First failing check's message, or `None` when the field passes.
    pub fn check(&self, target: &R) -> Option<&'static str> {
        let value = self.read(target);

        if !value.is_present() {
            return self.required;
        }

        if let FieldValue::Text(text) = value {
            let length = text.chars().count();
            if let Some(min) = &self.min_length {
                if length < min.value {
                    return Some(min.message);
                }
            }
            if let Some(max) = &self.max_length {
                if length > max.value {
                    return Some(max.message);
                }
            }
            if let Some(pattern) = &self.pattern {
                if !pattern.value.is_match(text) {
                    return Some(pattern.message);
                }
            }
            if let Some(message) = self.non_negative_integer {
                if text.trim().parse::<u32>().is_err() {
                    return Some(message);
                }
            }
        }

        let text = value.text();
        self.refine
            .iter()
            .find(|refine| !(refine.value)(text, target))
            .map(|refine| refine.message)
    }
}

/// Ordered collection of rules validated together.
pub struct StepSchema<R> {
    rules: Vec<FieldRule<R>>,
}

impl<R> StepSchema<R> {
    pub fn new(rules: Vec<FieldRule<R>>) -> Self {
        Self { rules }
    }

    pub fn rule(&self, key: &str) -> Option<&FieldRule<R>> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.key)
    }

    /// Every failing field as `(key, message)`, in rule order.
    pub fn failures(&self, target: &R) -> Vec<(&'static str, &'static str)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(target).map(|message| (rule.key, message)))
            .collect()
    }

    pub fn is_valid(&self, target: &R) -> bool {
        self.rules.iter().all(|rule| rule.check(target).is_none())
    }
}
