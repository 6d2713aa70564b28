//! Transport-agnostic types shared across the service layer.
//!
//! Wire names follow the site's JavaScript client (`fileNames`,
//! `selectedFiles`, ...). No HTTP dependencies.

use serde::{Deserialize, Serialize};

/// The AI's chosen subset of candidate file names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    /// Markdown file names selected for the menu.
    pub selected_files: Vec<String>,
}

/// Inbound AI search request.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text query.
    #[serde(default)]
    pub query: Option<String>,
    /// File names the AI may choose from.
    #[serde(default, alias = "candidateFileNames")]
    pub file_names: Vec<String>,
    /// Optional human-verification token.
    #[serde(default, alias = "verificationToken")]
    pub recaptcha_token: Option<String>,
}

/// Successful search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub selected_files: Vec<String>,
    /// Whether the selection was served from the result cache.
    pub cached: bool,
    /// Requests left in the client's current rate-limit window.
    pub remaining: u64,
}

/// Input to the completion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub file_names: Vec<String>,
    pub user_query: String,
}

/// Verdict of the human-verification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}
