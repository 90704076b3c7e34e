use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Deployment behavior selector read by the experiment runtime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "directLink")]
    DirectLink,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Debug, Mode::DirectLink];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::DirectLink => "directLink",
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "debug" => Ok(Self::Debug),
            "directLink" => Ok(Self::DirectLink),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
