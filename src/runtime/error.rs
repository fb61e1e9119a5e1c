//! Runtime error types

use crate::dom::MarkupError;
use crate::runtime::TemplateError;

/// Errors surfaced by the component runtime
///
/// Render-time variants leave the instance untouched: the failed content is
/// built off-document and discarded, so a later render can still succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("invalid event name {0:?}: expected domain:subject:action")]
    InvalidEventName(String),

    #[error("<{tag}> template is missing required element {selector:?}")]
    MissingElement { tag: String, selector: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("template markup rejected: {0}")]
    Markup(#[from] MarkupError),

    #[error("no component instance is mounted on node {0}")]
    UnknownInstance(usize),
}
