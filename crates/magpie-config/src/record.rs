use std::path::{Component, Path};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::endpoints::{derive_socket_url, is_http_url, is_socket_url, url_host};
use crate::error::ConfigError;
use crate::mode::Mode;

/// Dotted paths of every field a record carries, in declaration order.
pub const FIELD_PATHS: [&str; 8] = [
    "experimentId",
    "serverUrl",
    "socketUrl",
    "completionUrl",
    "contactEmail",
    "mode",
    "language",
    "stimuli.main",
];

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stimuli {
    main: String,
}

impl Stimuli {
    pub fn new(main: impl Into<String>) -> Self {
        Self { main: main.into() }
    }

    pub fn main(&self) -> &str {
        &self.main
    }
}

/// Static deployment parameters handed to the experiment runtime.
///
/// Built once through [`RecordBuilder`] or deserialized from a config file;
/// there are no setters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigurationRecord {
    experiment_id: String,
    server_url: String,
    socket_url: String,
    completion_url: String,
    contact_email: String,
    mode: Mode,
    language: String,
    stimuli: Stimuli,
}

impl ConfigurationRecord {
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Assembles a record from trusted literals without validating it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_literals(
        experiment_id: &str,
        server_url: &str,
        socket_url: &str,
        completion_url: &str,
        contact_email: &str,
        mode: Mode,
        language: &str,
        stimuli_main: &str,
    ) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            server_url: server_url.to_string(),
            socket_url: socket_url.to_string(),
            completion_url: completion_url.to_string(),
            contact_email: contact_email.to_string(),
            mode,
            language: language.to_string(),
            stimuli: Stimuli::new(stimuli_main),
        }
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn socket_url(&self) -> &str {
        &self.socket_url
    }

    pub fn completion_url(&self) -> &str {
        &self.completion_url
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn stimuli(&self) -> &Stimuli {
        &self.stimuli
    }

    pub fn stimuli_main(&self) -> &str {
        &self.stimuli.main
    }

    pub fn socket_shares_server_host(&self) -> bool {
        match (url_host(&self.server_url), url_host(&self.socket_url)) {
            (Some(server), Some(socket)) => server.eq_ignore_ascii_case(socket),
            _ => false,
        }
    }

    /// Checks every field and reports all problems together.
    ///
    /// A socket host that differs from the server host is logged, not rejected.
    pub fn validate(&self) -> Result<()> {
        let missing = self.empty_fields();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields { fields: missing }.into());
        }

        let mut problems = Vec::new();
        if !is_http_url(&self.server_url) {
            problems.push(format!(
                "serverUrl must be an absolute http(s) url: {}",
                self.server_url
            ));
        }
        if !is_socket_url(&self.socket_url) {
            problems.push(format!(
                "socketUrl must be an absolute ws(s) url: {}",
                self.socket_url
            ));
        }
        if !is_http_url(&self.completion_url) {
            problems.push(format!(
                "completionUrl must be an absolute http(s) url: {}",
                self.completion_url
            ));
        }
        if !is_language_code(&self.language) {
            problems.push(format!(
                "language must be a short language code: {}",
                self.language
            ));
        }
        let stimuli_path = Path::new(&self.stimuli.main);
        if stimuli_path.is_absolute() || self.stimuli.main.starts_with('/') {
            problems.push(format!(
                "stimuli.main must be a relative path: {}",
                self.stimuli.main
            ));
        } else if stimuli_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            problems.push(format!(
                "stimuli.main must not leave the experiment directory: {}",
                self.stimuli.main
            ));
        }
        if !problems.is_empty() {
            return Err(ConfigError::Invalid { problems }.into());
        }

        if !self.socket_shares_server_host() {
            warn!(
                experiment_id = %self.experiment_id,
                server_url = %self.server_url,
                socket_url = %self.socket_url,
                "socketUrl host differs from serverUrl host"
            );
        }
        Ok(())
    }

    /// `sha256:<hex>` over the sorted-key compact JSON form.
    pub fn digest(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        let canonical = serde_json::to_vec(&value)?;
        Ok(format!("sha256:{}", hex::encode(Sha256::digest(&canonical))))
    }

    fn empty_fields(&self) -> Vec<&'static str> {
        let values = [
            self.experiment_id.as_str(),
            self.server_url.as_str(),
            self.socket_url.as_str(),
            self.completion_url.as_str(),
            self.contact_email.as_str(),
            self.mode.as_str(),
            self.language.as_str(),
            self.stimuli.main.as_str(),
        ];
        FIELD_PATHS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(path, _)| *path)
            .collect()
    }
}

fn is_language_code(code: &str) -> bool {
    (2..=8).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
        && !code.starts_with('-')
        && !code.ends_with('-')
}

/// Collects field values and produces a validated [`ConfigurationRecord`].
#[derive(Clone, Debug, Default)]
pub struct RecordBuilder {
    experiment_id: Option<String>,
    server_url: Option<String>,
    socket_url: Option<String>,
    completion_url: Option<String>,
    contact_email: Option<String>,
    mode: Option<Mode>,
    language: Option<String>,
    stimuli_main: Option<String>,
}

impl RecordBuilder {
    pub fn experiment_id(mut self, value: impl Into<String>) -> Self {
        self.experiment_id = Some(value.into());
        self
    }

    pub fn server_url(mut self, value: impl Into<String>) -> Self {
        self.server_url = Some(value.into());
        self
    }

    /// Leave unset to derive the socket endpoint from the server url.
    pub fn socket_url(mut self, value: impl Into<String>) -> Self {
        self.socket_url = Some(value.into());
        self
    }

    pub fn completion_url(mut self, value: impl Into<String>) -> Self {
        self.completion_url = Some(value.into());
        self
    }

    pub fn contact_email(mut self, value: impl Into<String>) -> Self {
        self.contact_email = Some(value.into());
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn language(mut self, value: impl Into<String>) -> Self {
        self.language = Some(value.into());
        self
    }

    pub fn stimuli_main(mut self, value: impl Into<String>) -> Self {
        self.stimuli_main = Some(value.into());
        self
    }

    pub fn build(self) -> Result<ConfigurationRecord> {
        // A server url that cannot yield a socket url is reported only once
        // every absent field has been collected.
        let mut derive_error = None;
        let socket_url = match (&self.socket_url, &self.server_url) {
            (Some(socket), _) => Some(socket.clone()),
            (None, Some(server)) if !server.trim().is_empty() => match derive_socket_url(server) {
                Ok(socket) => Some(socket),
                Err(err) => {
                    derive_error = Some(err);
                    None
                }
            },
            (None, _) => None,
        };

        let mut missing = Vec::new();
        let mut take = |path: &'static str, value: Option<String>| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(path);
                    String::new()
                }
            }
        };
        let experiment_id = take("experimentId", self.experiment_id);
        let server_url = take("serverUrl", self.server_url);
        let socket_url = match derive_error {
            Some(_) => String::new(),
            None => take("socketUrl", socket_url),
        };
        let completion_url = take("completionUrl", self.completion_url);
        let contact_email = take("contactEmail", self.contact_email);
        let language = take("language", self.language);
        let stimuli_main = take("stimuli.main", self.stimuli_main);
        if self.mode.is_none() {
            missing.push("mode");
        }
        if !missing.is_empty() {
            missing.sort_by_key(|path| FIELD_PATHS.iter().position(|p| p == path));
            return Err(ConfigError::MissingFields { fields: missing }.into());
        }
        if let Some(err) = derive_error {
            return Err(err);
        }

        let record = ConfigurationRecord {
            experiment_id,
            server_url,
            socket_url,
            completion_url,
            contact_email,
            mode: self.mode.unwrap_or(Mode::Debug),
            language,
            stimuli: Stimuli::new(stimuli_main),
        };
        record.validate()?;
        Ok(record)
    }
}
