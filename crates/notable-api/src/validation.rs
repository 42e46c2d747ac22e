//! Request body validation.
//!
//! Handlers take the body as a raw [`serde_json::Value`] and pull typed
//! fields out through a [`BodyValidator`], which collects every failure so
//! the client gets all of them in one `400 {errors: [...]}` response.
//!
//! Integers and booleans are accepted either as JSON values or as their
//! string forms (`"42"`, `"true"`), matching what form-encoding clients send.

use serde_json::Value;

use crate::error::{ApiError, FieldError};

/// Newtype wrapper for request field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldName(&'static str);

impl FieldName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

pub const USER_ID: FieldName = FieldName::new("userId");
pub const NOTE_ID: FieldName = FieldName::new("noteId");
pub const TITLE: FieldName = FieldName::new("title");
pub const CONTENT: FieldName = FieldName::new("content");
pub const TAG: FieldName = FieldName::new("tag");
pub const TAGS: FieldName = FieldName::new("tags");
pub const ATTACHMENT: FieldName = FieldName::new("attachment");
pub const ATTACHMENTS: FieldName = FieldName::new("attachments");
pub const FAVORITE: FieldName = FieldName::new("favorite");
pub const PINNED: FieldName = FieldName::new("pinned");
pub const IN_TRASH: FieldName = FieldName::new("inTrash");
pub const EMAIL: FieldName = FieldName::new("email");
pub const USERNAME: FieldName = FieldName::new("username");
pub const PASSWORD: FieldName = FieldName::new("password");
pub const PHONE_NUMBER: FieldName = FieldName::new("phone_number");
pub const TOKEN: FieldName = FieldName::new("token");

/// Collects typed fields and failures from a JSON body.
pub struct BodyValidator<'a> {
    body: &'a Value,
    errors: Vec<FieldError>,
}

impl<'a> BodyValidator<'a> {
    pub fn new(body: &'a Value) -> Self {
        Self {
            body,
            errors: Vec::new(),
        }
    }

    fn get(&self, field: FieldName) -> Option<&'a Value> {
        match self.body.get(field.as_str()) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn reject(&mut self, field: FieldName, message: String) {
        self.errors.push(FieldError::new(field.as_str(), message));
    }

    /// Required integer.
    pub fn int(&mut self, field: FieldName) -> i64 {
        match self.get(field).and_then(as_int) {
            Some(value) => value,
            None => {
                self.reject(field, format!("{} must be an integer", field.as_str()));
                0
            }
        }
    }

    /// Required string (may be empty).
    pub fn string(&mut self, field: FieldName) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                self.reject(field, format!("{} must be a string", field.as_str()));
                String::new()
            }
        }
    }

    pub fn optional_string(&mut self, field: FieldName) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.reject(field, format!("{} must be a string", field.as_str()));
                None
            }
        }
    }

    pub fn optional_bool(&mut self, field: FieldName) -> Option<bool> {
        let value = self.get(field)?;
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s == "true" => Some(true),
            Value::String(s) if s == "false" => Some(false),
            _ => None,
        };
        if parsed.is_none() {
            self.reject(field, format!("{} must be a boolean", field.as_str()));
        }
        parsed
    }

    /// Optional array of strings.
    pub fn optional_string_list(&mut self, field: FieldName) -> Option<Vec<String>> {
        let items = match self.get(field)? {
            Value::Array(items) => items,
            _ => {
                self.reject(field, format!("{} must be an array", field.as_str()));
                return None;
            }
        };

        let mut values = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => values.push(s.clone()),
                _ => {
                    self.reject(
                        field,
                        format!("{}[{}] must be a string", field.as_str(), index),
                    );
                    return None;
                }
            }
        }
        Some(values)
    }

    /// Fail with every collected error, if any.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
