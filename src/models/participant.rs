// src/models/participant.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'participants' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,

    /// Lower-cased "first last", used to recognise returning participants.
    pub full_name_normalized: String,

    pub created_at: DateTime<Utc>,
}

impl Participant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Insert payload for a participant. Names are already trimmed.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub first_name: String,
    pub last_name: String,
    pub full_name_normalized: String,
}

impl NewParticipant {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            full_name_normalized: normalize_full_name(first_name, last_name),
        }
    }
}

pub fn normalize_full_name(first_name: &str, last_name: &str) -> String {
    format!(
        "{} {}",
        first_name.trim().to_lowercase(),
        last_name.trim().to_lowercase()
    )
}

/// "First L." label used in charts.
pub fn short_name(first_name: &str, last_name: &str) -> String {
    match last_name.chars().next() {
        Some(initial) => format!("{} {}.", first_name, initial),
        None => first_name.to_string(),
    }
}
