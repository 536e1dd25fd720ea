//! Domain types: procedures as consumed for grounding, and logged exchanges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Procedures
// ─────────────────────────────────────────────────────────────────────────────

/// A service fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    /// Amount in the given currency.
    pub amount: f64,
    /// ISO-style currency code, e.g. `ETB`.
    pub currency: String,
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount.fract() == 0.0 {
            write!(f, "{:.0} {}", self.amount, self.currency)
        } else {
            write!(f, "{:.2} {}", self.amount, self.currency)
        }
    }
}

/// Processing-time bounds in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTime {
    pub min_days: u32,
    pub max_days: u32,
}

impl fmt::Display for ProcessingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_days == self.max_days {
            write!(f, "{} days", self.min_days)
        } else {
            write!(f, "{}-{} days", self.min_days, self.max_days)
        }
    }
}

/// Read-only projection of a government procedure.
///
/// The guide never creates or mutates procedures; it only serializes them
/// into grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<String>,
    /// What the applicant receives at the end.
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Fee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<ProcessingTime>,
}

impl Procedure {
    /// Create a procedure with only an id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prerequisites: Vec::new(),
            steps: Vec::new(),
            results: Vec::new(),
            fee: None,
            processing_time: None,
        }
    }

    pub fn with_prerequisites<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_steps<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_results<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fee(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.fee = Some(Fee {
            amount,
            currency: currency.into(),
        });
        self
    }

    pub fn with_processing_time(mut self, min_days: u32, max_days: u32) -> Self {
        self.processing_time = Some(ProcessingTime { min_days, max_days });
        self
    }

    /// Text used to embed this procedure for similarity search.
    pub fn search_text(&self) -> String {
        let mut text = self.name.clone();
        for part in self.prerequisites.iter().chain(&self.steps).chain(&self.results) {
            text.push_str(". ");
            text.push_str(part);
        }
        text
    }

    /// Reference stored on a chat record.
    pub fn to_ref(&self) -> ProcedureRef {
        ProcedureRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identifier and display name of a procedure an answer was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureRef {
    pub id: String,
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Records
// ─────────────────────────────────────────────────────────────────────────────

/// Provenance of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSource {
    /// Grounded on at least one retrieved procedure.
    Official,
    /// Generated from general model knowledge.
    Unofficial,
}

impl ChatSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSource::Official => "official",
            ChatSource::Unofficial => "unofficial",
        }
    }
}

impl fmt::Display for ChatSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "official" => Ok(ChatSource::Official),
            "unofficial" => Ok(ChatSource::Unofficial),
            other => Err(format!("unknown chat source '{}'", other)),
        }
    }
}

/// One logged question/answer exchange. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: String,
    pub source: ChatSource,
    /// The user's original question.
    pub request: String,
    /// The generated answer.
    pub response: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub related_procedures: Vec<ProcedureRef>,
}

impl ChatRecord {
    /// Build a record for an answered query.
    ///
    /// The source is derived from `related`: non-empty means official.
    pub fn new(
        user_id: impl Into<String>,
        request: impl Into<String>,
        response: impl Into<String>,
        related: Vec<ProcedureRef>,
    ) -> Self {
        let source = if related.is_empty() {
            ChatSource::Unofficial
        } else {
            ChatSource::Official
        };
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            source,
            request: request.into(),
            response: response.into(),
            created_at: Utc::now(),
            related_procedures: related,
        }
    }
}

/// One page of a user's history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<ChatRecord>,
    /// Total records for the user across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    /// Records per page.
    pub limit: usize,
}

/// Largest page size a history query may request.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Clamp raw paging input: page is 1-based, limit is 1..=100.
pub fn normalize_paging(page: usize, limit: usize) -> (usize, usize) {
    (page.max(1), limit.clamp(1, MAX_HISTORY_LIMIT))
}

/// Records to skip before `page`. Saturates for pages past any real history.
pub fn page_offset(page: usize, limit: usize) -> usize {
    page.saturating_sub(1).saturating_mul(limit)
}
