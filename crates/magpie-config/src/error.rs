use thiserror::Error;

/// Failures raised while building, parsing or selecting a configuration record.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration record missing required fields:\n{}", format_list(.fields))]
    MissingFields { fields: Vec<&'static str> },

    #[error("configuration record is invalid:\n{}", format_list(.problems))]
    Invalid { problems: Vec<String> },

    #[error("unknown profile '{name}' (available: {})", .available.join(", "))]
    UnknownProfile { name: String, available: Vec<String> },

    #[error("unknown mode '{0}': expected one of debug, directLink")]
    UnknownMode(String),

    #[error("unsupported url scheme in '{url}': expected {expected}")]
    UnsupportedScheme { url: String, expected: &'static str },

    #[error("unknown configuration field '{0}'")]
    UnknownField(String),

    #[error("schema validation failed ({origin}): {}", .errors.join("; "))]
    Schema { origin: String, errors: Vec<String> },
}

fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("  - {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
