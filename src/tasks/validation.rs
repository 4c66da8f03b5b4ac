use std::collections::BTreeMap;

use super::model::{CreateTask, UpdateTask};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Field name → message for every rule that failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All messages joined, in field order
    pub fn message(&self) -> String {
        self.errors.values().cloned().collect::<Vec<_>>().join(", ")
    }

    fn reject(&mut self, field: &str, message: &str) {
        self.errors.insert(field.to_string(), message.to_string());
    }
}

pub fn validate_create_task(input: &CreateTask) -> ValidationResult {
    let mut result = ValidationResult::default();

    if input.title.trim().is_empty() {
        result.reject("title", "Title is required");
    } else if input.title.chars().count() > TITLE_MAX_CHARS {
        result.reject("title", "Title must be less than 100 characters");
    }
    check_description(&mut result, input.description.as_deref());

    result
}

pub fn validate_update_task(input: &UpdateTask) -> ValidationResult {
    let mut result = ValidationResult::default();

    if let Some(title) = &input.title {
        if title.chars().count() > TITLE_MAX_CHARS {
            result.reject("title", "Title must be less than 100 characters");
        }
    }
    check_description(&mut result, input.description.as_deref());

    result
}

fn check_description(result: &mut ValidationResult, description: Option<&str>) {
    if let Some(description) = description {
        if description.chars().count() > DESCRIPTION_MAX_CHARS {
            result.reject("description", "Description must be less than 500 characters");
        }
    }
}
