//! Wire data models. All backend JSON is camelCase.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend-authoritative generation status. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    Done,
    Failed,
}

impl GenerationStatus {
    /// `DONE` and `FAILED` are terminal; only `PENDING` keeps the poll loop alive.
    pub fn is_terminal(self) -> bool {
        !matches!(self, GenerationStatus::Pending)
    }
}

/// Rendered resume artifact reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeArtifact {
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Public portfolio reference, present once the backend has deployed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRef {
    #[serde(default)]
    pub slug: Option<String>,
}

/// One resume-improvement/portfolio-build job.
///
/// A Generation is *partial* (just created or retried, `created_at` absent) or
/// *complete* (fetched via the detail endpoint). Missing fields on a partial
/// payload are never an error — the workflow re-fetches detail to fill them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub generation_id: String,
    pub status: GenerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioRef>,
}

impl Generation {
    /// Complete iff `created_at` is present.
    pub fn is_complete(&self) -> bool {
        self.created_at.is_some()
    }

    pub fn resume_html_url(&self) -> Option<&str> {
        self.resume.as_ref().and_then(|r| r.html_url.as_deref())
    }

    pub fn portfolio_slug(&self) -> Option<&str> {
        self.portfolio.as_ref().and_then(|p| p.slug.as_deref())
    }

    /// Merges a detail payload over this (partial) one. Detail fields win;
    /// fields the detail endpoint omitted fall back to what we already had.
    pub fn merged_with(self, detail: Generation) -> Generation {
        Generation {
            generation_id: detail.generation_id,
            status: detail.status,
            created_at: detail.created_at.or(self.created_at),
            resume: detail.resume.or(self.resume),
            portfolio: detail.portfolio.or(self.portfolio),
        }
    }
}

/// Result of `POST /v1/resume/upload`. Consumed exactly once by create-generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub resume_upload_id: String,
}

/// Body of `POST /v1/generate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGenerationRequest {
    pub resume_upload_id: String,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Theme descriptor from `GET /v1/portfolio/themes`.
#[derive(Debug, Clone, Deserialize)]
pub struct Theme {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ThemeList {
    #[serde(default)]
    pub themes: Vec<Theme>,
}

/// Identity payload from `GET /v1/auth/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One page of generation history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPage {
    #[serde(default)]
    pub items: Vec<Generation>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Resolution of a public portfolio slug. The backend has historically served
/// the URL under three different keys; `best_url` applies the precedence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPortfolio {
    #[serde(default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub cloudinary_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PublicPortfolio {
    pub fn best_url(&self) -> Option<&str> {
        self.hosted_url
            .as_deref()
            .or(self.cloudinary_url.as_deref())
            .or(self.url.as_deref())
    }
}

/// Client-issued token preventing duplicate job creation when a create request
/// is retried after a timeout. One key per logical create intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new() -> Self {
        Self::with_prefix("gen")
    }

    pub fn with_prefix(prefix: &str) -> Self {
        IdempotencyKey(format!("{prefix}-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        IdempotencyKey::new()
    }
}

impl From<String> for IdempotencyKey {
    fn from(raw: String) -> Self {
        IdempotencyKey(raw)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(raw: &str) -> Self {
        IdempotencyKey(raw.to_string())
    }
}

/// A resume file handed to the workflow. The client never parses its contents;
/// size and type pre-validation is the only local inspection.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl FilePayload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        FilePayload {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.to_lowercase();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_string()),
            _ => None,
        }
    }
}

/// Caller-facing options for starting a generation.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub theme: String,
    pub color: Option<String>,
    /// Supplied to reuse a key across a client-level retry of the same intent;
    /// `None` mints a fresh one.
    pub idempotency_key: Option<IdempotencyKey>,
}

impl GenerationOptions {
    pub fn new(theme: impl Into<String>) -> Self {
        GenerationOptions {
            theme: theme.into(),
            color: None,
            idempotency_key: None,
        }
    }
}
