// Form payloads and their validation. Every field defaults to empty so a
// missing field surfaces as a field error instead of an extractor rejection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

use crate::infrastructure::security::MIN_PASSWORD_LENGTH;

pub const NON_FIELD_ERRORS: &str = "__all__";
const REQUIRED: &str = "This field is required.";

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Field name -> messages, serialized into the re-rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                form_errors.add(&field.to_string(), message);
            }
        }
        form_errors
    }
}

fn validate_form<T: Validate>(form: &T) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(errors) => errors.into(),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, max = 150, message = "This field is required (at most 150 characters)."))]
    pub username: String,
    #[validate(length(min = 1, max = 150, message = "This field is required (at most 150 characters)."))]
    pub password: String,
}

impl LoginForm {
    pub fn clean(mut self) -> Result<Self, FormErrors> {
        self.username = self.username.trim().to_string();
        validate_form(&self).into_result().map(|_| self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegistrationForm {
    #[validate(length(min = 1, max = 150, message = "Required. 150 characters or fewer."))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password1: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password2: String,
}

impl RegistrationForm {
    pub fn clean(mut self) -> Result<Self, FormErrors> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();

        let mut errors = validate_form(&self);
        if !self.username.is_empty() && !USERNAME_PATTERN.is_match(&self.username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        check_new_password(&mut errors, "password2", &self.password1, &self.password2);
        errors.into_result().map(|_| self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordChangeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub old_password: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub new_password1: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn clean(self) -> Result<Self, FormErrors> {
        let mut errors = validate_form(&self);
        check_new_password(&mut errors, "new_password2", &self.new_password1, &self.new_password2);
        errors.into_result().map(|_| self)
    }
}

fn check_new_password(errors: &mut FormErrors, confirm_field: &str, password: &str, confirmation: &str) {
    if password.is_empty() || confirmation.is_empty() {
        return;
    }
    if password != confirmation {
        errors.add(confirm_field, "The two password fields didn't match.");
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            confirm_field,
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LENGTH
            ),
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

impl CommentForm {
    pub fn clean(mut self) -> Result<Self, FormErrors> {
        self.text = self.text.trim().to_string();
        validate_form(&self).into_result().map(|_| self)
    }
}

/// Post fields as submitted; assembled from a multipart body by the handler.
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, max = 255, message = "Required. 255 characters or fewer."))]
    pub title: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
}

/// A post form that passed validation, with its references parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPostForm {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub tag_ids: Vec<i64>,
}

impl PostForm {
    /// Field checks only; the handler verifies the category exists.
    pub fn clean(mut self) -> Result<CleanedPostForm, FormErrors> {
        self.title = self.title.trim().to_string();
        self.content = self.content.trim().to_string();

        let mut errors = validate_form(&self);

        let category = self.category.trim();
        let category_id = if category.is_empty() {
            errors.add("category", REQUIRED);
            None
        } else {
            match category.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add(
                        "category",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                    None
                }
            }
        };

        let mut tag_ids = Vec::with_capacity(self.tags.len());
        for raw in self.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            match raw.parse::<i64>() {
                Ok(id) => tag_ids.push(id),
                Err(_) => errors.add("tags", format!("\"{}\" is not a valid value.", raw)),
            }
        }

        errors.into_result()?;
        Ok(CleanedPostForm {
            title: self.title,
            content: self.content,
            category_id: category_id.unwrap_or_default(),
            tag_ids,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NextParams {
    pub next: Option<String>,
}

impl NextParams {
    /// Only local paths are followed after login. Browsers read `\` as `/`
    /// and drop control characters, so either could smuggle in a host.
    pub fn safe_target(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| {
            next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control)
        })
    }
}
