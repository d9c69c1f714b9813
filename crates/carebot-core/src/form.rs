//! Dynamic form models and local validation.
//!
//! A `FormSpec` is constructed transiently from a `form_guidance` backend
//! response and cleared on submission or cancellation. At most one form is
//! active per session. Validation here is entirely local; the backend is
//! trusted to re-validate authoritatively.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// RFC-lite email pattern.
fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

/// Optional leading `+`, then 1-16 digits. Spaces are stripped before matching.
fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d{1,16}$").expect("valid phone regex"))
}

/// Input type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Phone,
    Select,
    Date,
}

/// Declared length/pattern constraints for a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A single input field declared by a backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Field name as the backend expects it (e.g. `patient_name`).
    pub name: String,
    /// Input type, defaults to `text`.
    #[serde(default)]
    pub field_type: FieldType,
    /// Humanized label shown to the user.
    pub label: String,
    /// Whether the field must be filled.
    #[serde(default)]
    pub required: bool,
    /// Options for `select` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Declared constraints, enforced locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

/// A named set of fields collected on behalf of the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSpec {
    /// Display title.
    pub title: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// The fields to collect.
    pub fields: Vec<FormField>,
}

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FormSpec {
    /// Validates submitted data against the declared fields.
    ///
    /// Returns every failing field rather than stopping at the first.
    pub fn validate(&self, data: &HashMap<String, String>) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        for field in &self.fields {
            let raw = data.get(&field.name).map(String::as_str).unwrap_or("");
            let value = raw.trim();

            if value.is_empty() {
                if field.required {
                    errors.push(FieldError {
                        field: field.name.clone(),
                        message: format!("{} is required", field.label),
                    });
                }
                continue;
            }

            match field.field_type {
                FieldType::Email => {
                    if !email_regex().is_match(value) {
                        errors.push(FieldError {
                            field: field.name.clone(),
                            message: format!("{} must be a valid email address", field.label),
                        });
                    }
                }
                FieldType::Phone => {
                    let stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                    if !phone_regex().is_match(&stripped) {
                        errors.push(FieldError {
                            field: field.name.clone(),
                            message: format!("{} must be a valid phone number", field.label),
                        });
                    }
                }
                FieldType::Text | FieldType::Textarea => {
                    if let Some(rules) = &field.validation {
                        if let Some(min) = rules.min_length {
                            if value.chars().count() < min {
                                errors.push(FieldError {
                                    field: field.name.clone(),
                                    message: format!(
                                        "{} must be at least {min} characters",
                                        field.label
                                    ),
                                });
                                continue;
                            }
                        }
                        if let Some(max) = rules.max_length {
                            if value.chars().count() > max {
                                errors.push(FieldError {
                                    field: field.name.clone(),
                                    message: format!(
                                        "{} must be at most {max} characters",
                                        field.label
                                    ),
                                });
                                continue;
                            }
                        }
                        if let Some(pattern) = &rules.pattern {
                            // A pattern the backend declared but we cannot
                            // compile is skipped, not treated as a failure.
                            if let Ok(re) = Regex::new(pattern) {
                                if !re.is_match(value) {
                                    errors.push(FieldError {
                                        field: field.name.clone(),
                                        message: format!("{} has an invalid format", field.label),
                                    });
                                }
                            }
                        }
                    }
                }
                FieldType::Select | FieldType::Date => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Humanizes a backend field name: underscores to spaces, Title Case.
pub fn humanize_field_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps a backend `required_fields` list into renderable form fields.
///
/// Each entry becomes a required `text` field with a humanized label.
pub fn fields_from_required(names: &[String]) -> Vec<FormField> {
    names
        .iter()
        .map(|name| FormField {
            name: name.clone(),
            field_type: FieldType::Text,
            label: humanize_field_name(name),
            required: true,
            options: Vec::new(),
            validation: None,
        })
        .collect()
}
