//! Result sets and the system-error artifact.

use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::text::truncate_chars;

/// Key of the synthesized entry.
pub const CONNECTOR_KEY: &str = "connecteur";

/// Key of the single entry of an error artifact.
pub const SYSTEM_ERROR_LABEL: &str = "🚨 Erreur Système";

/// Longest error detail exposed to the end user, in characters.
pub const ERROR_DETAIL_LIMIT: usize = 200;

/// Display name to text, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<(String, String)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, content: impl Into<String>) {
        let key = key.into();
        let content = content.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = content,
            None => self.entries.push((key, content)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A single-entry result set reporting a system failure.
///
/// The detail is cut to [`ERROR_DETAIL_LIMIT`] characters.
pub fn error_artifact(message: &str) -> ResultSet {
    let mut set = ResultSet::new();
    set.insert(
        SYSTEM_ERROR_LABEL,
        format!(
            "Une erreur critique est survenue. Détails techniques : {}...",
            truncate_chars(message, ERROR_DETAIL_LIMIT)
        ),
    );
    set
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    TimedOut,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::TimedOut => "timed_out",
        }
    }
}

/// What one dispatched role produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub role_id: String,
    pub content: String,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn completed(role_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            content: content.into(),
            outcome: TaskOutcome::Completed,
        }
    }

    pub fn failed(role_id: &str, error: &dyn std::fmt::Display) -> Self {
        Self {
            role_id: role_id.to_string(),
            content: failure_text(role_id, error),
            outcome: TaskOutcome::Failed,
        }
    }

    pub fn timed_out(role_id: &str, deadline: Duration) -> Self {
        Self {
            role_id: role_id.to_string(),
            content: timeout_text(role_id, deadline),
            outcome: TaskOutcome::TimedOut,
        }
    }
}

pub fn failure_text(role_id: &str, error: &dyn std::fmt::Display) -> String {
    format!("Erreur {role_id}: {error}")
}

pub fn timeout_text(role_id: &str, deadline: Duration) -> String {
    let seconds = if deadline.subsec_nanos() == 0 {
        deadline.as_secs().to_string()
    } else {
        deadline.as_secs_f64().to_string()
    };
    format!("Timeout : {role_id} n'a pas terminé dans les {seconds} secondes")
}

pub fn connector_failure_text(error: &dyn std::fmt::Display) -> String {
    format!("Erreur Connecteur : {error}")
}
