use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::mode::Mode;
use crate::record::ConfigurationRecord;
use crate::render::{document_from_text, record_from_document, Format};
use crate::schema::{check_document, PROFILE_SET_SCHEMA};

pub const DEFAULT_PROFILE: &str = "debug";

const FLY_SERVER: &str = "https://magpie-cogsciprag.fly.dev";
const FLY_SOCKET: &str = "wss://magpie-cogsciprag.fly.dev/socket";
const COMPLETION_PLACEHOLDER: &str = "https://...";
const CONTACT: &str = "exprag@gmail.com";
const STIMULI: &str = "stimuli/vignettes.csv";

/// Named configuration records, one per deployment environment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileSet {
    profiles: BTreeMap<String, ConfigurationRecord>,
}

impl ProfileSet {
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "debug".to_string(),
            ConfigurationRecord::from_literals(
                "9",
                FLY_SERVER,
                FLY_SOCKET,
                COMPLETION_PLACEHOLDER,
                CONTACT,
                Mode::Debug,
                "en",
                STIMULI,
            ),
        );
        profiles.insert(
            "direct-link".to_string(),
            ConfigurationRecord::from_literals(
                "43",
                FLY_SERVER,
                FLY_SOCKET,
                COMPLETION_PLACEHOLDER,
                CONTACT,
                Mode::DirectLink,
                "en",
                STIMULI,
            ),
        );
        profiles.insert(
            "production".to_string(),
            ConfigurationRecord::from_literals(
                "44",
                "https://magpie-exprag.fly.dev",
                "wss://magpie-sockets.fly.dev/socket",
                COMPLETION_PLACEHOLDER,
                CONTACT,
                Mode::DirectLink,
                "en",
                STIMULI,
            ),
        );
        Self { profiles }
    }

    /// Reads a `{ profiles: { <name>: <record> } }` document from YAML or JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read profiles from {}", path.display()))?;
        let format = Format::from_path(path)?;
        if format == Format::Js {
            return Err(anyhow!("profile sets must be yaml or json: {}", path.display()));
        }
        let document = document_from_text(&text, format)
            .with_context(|| format!("failed to parse profiles from {}", path.display()))?;
        let set = Self::from_document(document, &path.display().to_string())?;
        debug!(path = %path.display(), profiles = set.len(), "loaded profile set");
        Ok(set)
    }

    pub fn from_document(document: Value, origin: &str) -> Result<Self> {
        check_document(PROFILE_SET_SCHEMA, &document, origin)?;
        let mut profiles = BTreeMap::new();
        if let Some(Value::Object(entries)) = document.get("profiles") {
            for (name, raw) in entries {
                let record = record_from_document(raw.clone(), &format!("{}#{}", origin, name))
                    .with_context(|| format!("invalid profile '{}' in {}", name, origin))?;
                profiles.insert(name.clone(), record);
            }
        }
        Ok(Self { profiles })
    }

    /// Entries from `other` replace same-named entries in `self`.
    pub fn merge(mut self, other: ProfileSet) -> Self {
        self.profiles.extend(other.profiles);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ConfigurationRecord> {
        self.profiles.get(name).ok_or_else(|| {
            ConfigError::UnknownProfile {
                name: name.to_string(),
                available: self.names(),
            }
            .into()
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigurationRecord)> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
