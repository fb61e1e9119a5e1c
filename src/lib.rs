//! speakersheet - custom-element widgets over an in-memory document
//!
//! - [`dom`]: arena document, selectors, HTML fragment parsing
//! - [`runtime`]: component lifecycle, template cache, batched renders
//! - [`widgets`]: `<app-modal>` and `<app-rich-select>`
//! - [`server`]: HTTP server for component fragments and search data

pub mod cli;
pub mod config;
pub mod dom;
pub mod events;
pub mod logging;
pub mod runtime;
pub mod server;
pub mod widgets;
