//! Request bodies and the validation rules checked before the services run.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::database::models::{NewUser, TodoChanges};
use crate::error::ApiError;
use crate::services::NewTodoInput;

pub const INVALID_INPUTS: &str = "Invalid inputs passed, please check your data.";
pub const MIN_DESCRIPTION_LEN: usize = 5;

/// Collects per-field failures and turns them into a 422
#[derive(Debug, Default)]
struct Checks {
    failures: BTreeMap<String, String>,
}

impl Checks {
    fn not_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.failures.insert(field.to_string(), "must not be empty".to_string());
        }
        self
    }

    fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.chars().count() < min {
            self.failures
                .insert(field.to_string(), format!("must be at least {} characters", min));
        }
        self
    }

    fn email(&mut self, field: &str, value: &str) -> &mut Self {
        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.contains('@') && domain.split('.').filter(|p| !p.is_empty()).count() >= 2
            }
            None => false,
        };
        if !valid {
            self.failures.insert(field.to_string(), "must be a valid email address".to_string());
        }
        self
    }

    fn finish(&mut self) -> Result<(), ApiError> {
        if self.failures.is_empty() {
            return Ok(());
        }
        tracing::debug!("Rejected request body: {:?}", self.failures);
        Err(ApiError::unprocessable_entity(INVALID_INPUTS, std::mem::take(&mut self.failures)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
}

impl CreateTodoRequest {
    pub fn validate(self) -> Result<NewTodoInput, ApiError> {
        Checks::default()
            .not_empty("title", &self.title)
            .min_len("description", &self.description, MIN_DESCRIPTION_LEN)
            .not_empty("address", &self.address)
            .finish()?;

        Ok(NewTodoInput {
            title: self.title,
            description: self.description,
            address: self.address,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl UpdateTodoRequest {
    pub fn validate(self) -> Result<TodoChanges, ApiError> {
        Checks::default()
            .not_empty("title", &self.title)
            .min_len("description", &self.description, MIN_DESCRIPTION_LEN)
            .finish()?;

        Ok(TodoChanges {
            title: self.title,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl CreateUserRequest {
    /// Emails are compared case-insensitively, so they are stored lowercased
    pub fn validate(self) -> Result<NewUser, ApiError> {
        let email = self.email.trim().to_lowercase();
        Checks::default()
            .not_empty("name", &self.name)
            .email("email", &email)
            .finish()?;

        Ok(NewUser { name: self.name, email })
    }
}
