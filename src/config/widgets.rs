//! Widget behaviour defaults
//!
//! Host attributes always win; these values apply when a widget's host does
//! not set the corresponding attribute.

use serde::Deserialize;
use std::time::Duration;

/// Shared settings for the bundled widgets
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetsConfig {
    /// Pause after the last keystroke before a remote search fires
    pub search_debounce_ms: u64,
    /// Characters needed before the combobox searches remotely
    pub min_chars: usize,
    /// Text of the non-selectable empty row
    pub no_result_text: String,
    /// Live-region announcement; `{count}` is replaced by the result count
    pub results_text: String,
    /// PageUp / PageDown step in the option list
    pub page_step: usize,
    /// Option row height used for scroll-into-view (CSS pixels)
    pub row_height: f64,
    /// Lower bound of the popup's max-height (CSS pixels)
    pub min_popup_height: f64,
    /// Gap kept between the popup and the viewport edge (CSS pixels)
    pub popup_margin: f64,
}

impl Default for WidgetsConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 250,
            min_chars: 3,
            no_result_text: "Ingen resultater".to_string(),
            results_text: "{count} resultater.".to_string(),
            page_step: 5,
            row_height: 36.0,
            min_popup_height: 100.0,
            popup_margin: 8.0,
        }
    }
}

/// `[widgets]` section as loaded from the config file
#[derive(Debug, Deserialize, Default)]
pub struct FileWidgets {
    pub search_debounce_ms: Option<u64>,
    pub min_chars: Option<usize>,
    pub no_result_text: Option<String>,
    pub results_text: Option<String>,
    pub page_step: Option<usize>,
    pub row_height: Option<f64>,
    pub min_popup_height: Option<f64>,
    pub popup_margin: Option<f64>,
}

impl WidgetsConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileWidgets>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            search_debounce_ms: file.search_debounce_ms.unwrap_or(defaults.search_debounce_ms),
            // Zero searches remotely on every edit, empty field included
            min_chars: file.min_chars.unwrap_or(defaults.min_chars),
            no_result_text: file.no_result_text.unwrap_or(defaults.no_result_text),
            results_text: file.results_text.unwrap_or(defaults.results_text),
            page_step: file.page_step.unwrap_or(defaults.page_step).max(1),
            row_height: file.row_height.unwrap_or(defaults.row_height),
            min_popup_height: file.min_popup_height.unwrap_or(defaults.min_popup_height),
            popup_margin: file.popup_margin.unwrap_or(defaults.popup_margin),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Live-region text for `count` results
    pub fn results_announcement(&self, count: usize) -> String {
        self.results_text.replace("{count}", &count.to_string())
    }
}
