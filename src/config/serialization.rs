//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Quote a value as a TOML string
fn quoted(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// Floats always carry a decimal point so they parse back as floats
fn float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl Config {
    /// Render the full config file, including comments
    pub fn to_toml(&self) -> String {
        let w = &self.widgets;
        let l = &self.logging;
        format!(
            r#"# speakersheet configuration

# Fragment server bind address (SPEAKERSHEET_BIND or PORT override)
bind_addr = {bind}

# Origin that widget templates and searches resolve against. Read by
# embedders through Runtime::from_config and Combobox::from_config; the
# fragment server itself only logs it.
origin = {origin}

# Component files: {{components_dir}}/{{kind}}/{{name}}/{{name}}.html|css|js
components_dir = {components_dir}

# Search collections: {{data_dir}}/{{collection}}.json
data_dir = {data_dir}

# Maximum results per search request
search_limit = {search_limit}

# Widget defaults for Combobox::from_config (host attributes take precedence).
# The fragment server does not read this section.
[widgets]
search_debounce_ms = {debounce}
min_chars = {min_chars}
no_result_text = {no_result}
results_text = {results}    # {{count}} is replaced
page_step = {page_step}
row_height = {row_height}
min_popup_height = {min_popup}
popup_margin = {margin}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {level}
format = "{format}"    # pretty, json
# File logging (JSON lines, in addition to stdout)
file_enabled = {file_enabled}
file_dir = {file_dir}
file_rotation = "{rotation}"  # hourly, daily, never
file_prefix = {prefix}
"#,
            bind = quoted(&self.bind_addr.to_string()),
            origin = quoted(&self.origin),
            components_dir = quoted(&self.components_dir.display().to_string()),
            data_dir = quoted(&self.data_dir.display().to_string()),
            search_limit = self.search_limit,
            debounce = w.search_debounce_ms,
            min_chars = w.min_chars,
            no_result = quoted(&w.no_result_text),
            results = quoted(&w.results_text),
            page_step = w.page_step,
            row_height = float(w.row_height),
            min_popup = float(w.min_popup_height),
            margin = float(w.popup_margin),
            level = quoted(&l.level),
            format = l.format.as_str(),
            file_enabled = l.file_enabled,
            file_dir = quoted(&l.file_dir.display().to_string()),
            rotation = l.file_rotation.as_str(),
            prefix = quoted(&l.file_prefix),
        )
    }
}
