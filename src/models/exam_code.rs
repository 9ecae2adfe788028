// src/models/exam_code.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

static EXAM_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("exam code pattern is valid"));

/// Represents the 'exam_codes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamCode {
    pub id: Uuid,

    /// Upper-cased access code entered by participants.
    pub code: String,

    /// Display name of the exam.
    pub name: String,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExamCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Insert payload for an exam code. `code` is already normalized.
#[derive(Debug, Clone)]
pub struct NewExamCode {
    pub code: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Codes are case-insensitive; they are stored and compared upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_code_chars(code: &str) -> Result<(), validator::ValidationError> {
    if !EXAM_CODE_PATTERN.is_match(code) {
        return Err(validator::ValidationError::new("code_must_be_alphanumeric"));
    }
    Ok(())
}

/// DTO for creating an exam code (admin).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamCodeRequest {
    #[validate(
        length(min = 3, max = 50, message = "Code length must be between 3 and 50 characters."),
        custom(function = validate_code_chars)
    )]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// DTO for activating or deactivating a code (admin).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamCodeRequest {
    pub is_active: bool,
}

/// DTO for checking a code before starting.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCodeRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
}

/// Result of a code check. Unknown and inactive codes are simply not valid.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCodeResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_code_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str) -> CreateExamCodeRequest {
        CreateExamCodeRequest {
            code: code.to_string(),
            name: "Spring exam".to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn test_code_validation() {
        assert!(request("Telink2026").validate().is_ok());
        assert!(request("ab").validate().is_err());
        assert!(request("has space").validate().is_err());
        assert!(request("dash-ed").validate().is_err());
        assert!(request(&"X".repeat(51)).validate().is_err());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut code = ExamCode {
            id: Uuid::new_v4(),
            code: "ABC".to_string(),
            name: "n".to_string(),
            is_active: true,
            created_at: now,
            expires_at: None,
        };
        assert!(!code.is_expired(now));
        code.expires_at = Some(now - chrono::Duration::minutes(1));
        assert!(code.is_expired(now));
        code.expires_at = Some(now + chrono::Duration::minutes(1));
        assert!(!code.is_expired(now));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" telink2026 "), "TELINK2026");
    }
}
