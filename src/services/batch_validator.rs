use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::models::CreatePortfolio;
use crate::services::name_validator;
use crate::services::validation_cache::{normalize_name, BatchKey, ValidationCache};

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 100;
pub const MAX_FIELD_ERRORS: usize = 10;

pub const EMPTY_BATCH_MESSAGE: &str = "Request must contain at least 1 portfolio";
pub const OVERSIZED_BATCH_MESSAGE: &str = "Request cannot contain more than 100 portfolios";
pub const CACHED_FAILURE_MESSAGE: &str = "Batch validation failed (cached result)";
pub const TOO_MANY_ERRORS_MESSAGE: &str = "Too many validation errors (showing first 10)";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub invalid_names: Vec<String>,
    pub duplicate_names: Vec<String>,
}

impl ValidationResult {
    fn passed() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    fn add_invalid_name(&mut self, name: &str) {
        self.invalid_names.push(name.to_string());
        self.add_error(format!("Invalid name format: {}", name));
    }

    fn add_duplicate_name(&mut self, name: &str) {
        if !self.duplicate_names.iter().any(|d| d == name) {
            self.duplicate_names.push(name.to_string());
        }
        self.add_error(format!("Duplicate name: {}", name));
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            return "Validation passed".to_string();
        }
        let mut parts = Vec::new();
        if !self.invalid_names.is_empty() {
            parts.push(format!("{} invalid names", self.invalid_names.len()));
        }
        if !self.duplicate_names.is_empty() {
            parts.push(format!("{} duplicate names", self.duplicate_names.len()));
        }
        if parts.is_empty() {
            parts.push(format!("{} errors", self.errors.len()));
        }
        format!("Validation failed: {}", parts.join(", "))
    }
}

/// Decides whether a batch of creation requests may be sent to the store.
///
/// Checks run in a fixed order and stop at the first failing stage: size,
/// cached verdict, name format, duplicates, then per-item fields.
#[derive(Clone, Default)]
pub struct BatchValidator {
    cache: Option<Arc<ValidationCache>>,
}

impl BatchValidator {
    pub fn new(cache: Option<Arc<ValidationCache>>) -> Self {
        Self { cache }
    }

    pub fn uncached() -> Self {
        Self { cache: None }
    }

    pub fn cache(&self) -> Option<&Arc<ValidationCache>> {
        self.cache.as_ref()
    }

    pub fn validate(&self, items: &[CreatePortfolio]) -> ValidationResult {
        let started = Instant::now();
        let mut result = ValidationResult::passed();

        if items.len() < MIN_BATCH_SIZE {
            result.add_error(EMPTY_BATCH_MESSAGE);
            return result;
        }
        if items.len() > MAX_BATCH_SIZE {
            result.add_error(OVERSIZED_BATCH_MESSAGE);
            return result;
        }

        let key = BatchKey::from_items(items);
        if let Some(cache) = &self.cache {
            if let Some(valid) = cache.cached_batch_result(&key) {
                if !valid {
                    result.add_error(CACHED_FAILURE_MESSAGE);
                }
                return result;
            }
        }

        for item in items {
            if !self.is_valid_name_format(&item.name) {
                result.add_invalid_name(&item.name);
            }
        }
        if !result.is_valid {
            self.remember(key, false);
            debug!("Batch validation failed on name format: {} invalid names", result.invalid_names.len());
            return result;
        }

        let duplicates = find_duplicates(items.iter().map(|i| i.name.as_str()));
        for name in &duplicates {
            result.add_duplicate_name(name);
        }
        if !result.is_valid {
            self.remember(key, false);
            debug!("Batch validation failed on duplicates: {} duplicate names", duplicates.len());
            return result;
        }

        for error in validate_fields(items) {
            result.add_error(error);
        }

        // A future-date verdict can flip as the clock advances.
        let time_dependent = items.iter().any(|i| i.date_created.is_some());
        if !time_dependent {
            self.remember(key, result.is_valid);
        }

        debug!(
            "{} for {} portfolios in {:?}",
            result.summary(),
            items.len(),
            started.elapsed()
        );
        result
    }

    fn is_valid_name_format(&self, name: &str) -> bool {
        match &self.cache {
            Some(cache) => cache.get_or_validate_name_format(name),
            None => name_validator::is_valid_format(name),
        }
    }

    fn remember(&self, key: BatchKey, valid: bool) {
        if let Some(cache) = &self.cache {
            cache.put_batch_result(key, valid);
        }
    }
}

/// Every distinct name that appears more than once after trim + lowercase,
/// reported with the casing of its first occurrence.
pub fn find_duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut first_seen: HashMap<String, &'a str> = HashMap::new();
    let mut duplicates: Vec<String> = Vec::new();

    for name in names {
        let normalized = normalize_name(name);
        match first_seen.get(&normalized) {
            Some(original) => {
                if !duplicates.iter().any(|d| d == original) {
                    duplicates.push(original.to_string());
                }
            }
            None => {
                first_seen.insert(normalized, name);
            }
        }
    }

    duplicates
}

fn validate_fields(items: &[CreatePortfolio]) -> Vec<String> {
    let now = Utc::now();
    let mut errors = Vec::new();

    for (i, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            errors.push(format!("Portfolio {}: Name cannot be empty", i));
        } else {
            if let Some(version) = item.version {
                if version < 1 {
                    errors.push(format!("Portfolio {} ({}): Version must be >= 1", i, item.name));
                }
            }
            if let Some(created) = item.date_created {
                if created > now {
                    errors.push(format!(
                        "Portfolio {} ({}): Date created cannot be in the future",
                        i, item.name
                    ));
                }
            }
        }

        if errors.len() >= MAX_FIELD_ERRORS {
            errors.truncate(MAX_FIELD_ERRORS);
            errors.push(TOO_MANY_ERRORS_MESSAGE.to_string());
            break;
        }
    }

    errors
}
