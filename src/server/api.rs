// HTTP handlers - component fragments, search collections, health
//
// Fragment layout on disk mirrors the URL space:
//   GET /components/{kind}/{name}/{name}-markup  ->  {components_dir}/{kind}/{name}/{name}.html
//   GET /components/{kind}/{name}/{name}-styles  ->  ...{name}.css
//   GET /components/{kind}/{name}/{name}-script  ->  ...{name}.js
//
// Search collections are JSON arrays of {value, label}:
//   GET /api/search/{collection}?q=dan  ->  {data_dir}/{collection}.json

use super::error::ApiError;
use super::ServerState;
use crate::config::VERSION;
use crate::widgets::combobox::{coerce_options, filter_local, ComboOption};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("segment pattern is valid"));

/// Reject anything that could escape the served directories
fn segment(value: &str) -> Result<&str, ApiError> {
    if SEGMENT.is_match(value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!("Invalid path segment: {value:?}")))
    }
}

/// File kinds a component directory can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Markup,
    Styles,
    Script,
}

impl FragmentKind {
    /// `{name}-markup` etc.; anything else is not a fragment
    fn parse(name: &str, file: &str) -> Option<Self> {
        match file.strip_prefix(name)?.strip_prefix('-')? {
            "markup" => Some(Self::Markup),
            "styles" => Some(Self::Styles),
            "script" => Some(Self::Script),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Markup => "html",
            Self::Styles => "css",
            Self::Script => "js",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::Markup => "text/html; charset=utf-8",
            Self::Styles => "text/css; charset=utf-8",
            Self::Script => "application/javascript; charset=utf-8",
        }
    }
}

async fn read_file(path: PathBuf) -> Result<String, ApiError> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(format!(
            "Not found: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ))),
        Err(e) => Err(ApiError::Internal(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// GET /components/:kind/:name/:file - Serves one component fragment
pub async fn component_file(
    State(state): State<ServerState>,
    Path((kind, name, file)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = segment(&kind)?;
    let name = segment(&name)?;
    let fragment = FragmentKind::parse(name, &file)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown component file: {file}")))?;

    let path = state
        .components_dir
        .join(kind)
        .join(name)
        .join(format!("{name}.{}", fragment.extension()));
    let text = read_file(path).await?;

    tracing::debug!(kind, name, ?fragment, bytes = text.len(), "served fragment");
    Ok(([(header::CONTENT_TYPE, fragment.content_type())], text))
}

/// Query parameters for GET /api/search/:collection
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Substring to match against label or value (case-insensitive)
    #[serde(default)]
    pub q: Option<String>,
}

/// GET /api/search/:collection - Filters a JSON collection
///
/// An empty query returns the head of the collection.
pub async fn search(
    State(state): State<ServerState>,
    Path(collection): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ComboOption>>, ApiError> {
    let collection = segment(&collection)?;
    let path = state.data_dir.join(format!("{collection}.json"));
    let text = read_file(path).await?;
    let data: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        ApiError::Internal(format!("Collection {collection} is not valid JSON: {e}"))
    })?;

    let query = params.q.as_deref().unwrap_or_default().trim();
    let mut results = filter_local(&coerce_options(&data), query);
    results.truncate(state.search_limit);

    tracing::debug!(collection, query, count = results.len(), "search");
    Ok(Json(results))
}

/// Response for GET /health
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health - Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_kind_requires_matching_name() {
        assert_eq!(
            FragmentKind::parse("modal", "modal-markup"),
            Some(FragmentKind::Markup)
        );
        assert_eq!(
            FragmentKind::parse("rich-select", "rich-select-styles"),
            Some(FragmentKind::Styles)
        );
        assert_eq!(FragmentKind::parse("modal", "other-markup"), None);
        assert_eq!(FragmentKind::parse("modal", "modal-readme"), None);
        assert_eq!(FragmentKind::parse("modal", "modalmarkup"), None);
    }

    #[test]
    fn test_segments_reject_traversal() {
        assert!(segment("rich-select").is_ok());
        assert!(segment("..").is_err());
        assert!(segment("a/b").is_err());
        assert!(segment("Modal").is_err());
        assert!(segment("").is_err());
    }
}
