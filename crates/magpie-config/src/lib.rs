//! Deployment configuration for magpie web experiments.
//!
//! A [`ConfigurationRecord`] is built once, either from a named profile or a
//! config file, and handed read-only to the browser runtime as a rendered
//! module.

use std::path::Path;

use anyhow::Result;
use tracing::debug;

pub mod endpoints;
pub mod error;
pub mod mode;
pub mod overrides;
pub mod profiles;
pub mod record;
pub mod render;
pub mod schema;

pub use endpoints::{derive_socket_url, url_host, url_scheme, SOCKET_PATH};
pub use error::ConfigError;
pub use mode::Mode;
pub use overrides::{apply_overrides, parse_set_bindings};
pub use profiles::{ProfileSet, DEFAULT_PROFILE};
pub use record::{ConfigurationRecord, RecordBuilder, Stimuli, FIELD_PATHS};
pub use render::{from_js_module, load_record, parse_record, render, write_record, Format};

/// Selects `profile` from the built-in set, or from `profiles_file` layered
/// over it, then applies `--set` style overrides.
pub fn resolve_record(
    profile: &str,
    profiles_file: Option<&Path>,
    set_values: &[String],
) -> Result<ConfigurationRecord> {
    let mut set = ProfileSet::builtin();
    if let Some(path) = profiles_file {
        set = set.merge(ProfileSet::load(path)?);
    }
    let bindings = parse_set_bindings(set_values)?;
    let record = apply_overrides(set.get(profile)?, &bindings)?;
    debug!(
        profile,
        overrides = bindings.len(),
        experiment_id = record.experiment_id(),
        "resolved configuration record"
    );
    Ok(record)
}
