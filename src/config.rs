use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const DEFAULT_TOOL: &str = "avian-flu-clusters";

#[derive(Debug, Deserialize, Serialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

/// Contact details sent with every E-utilities request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub api_key: Option<String>,
    pub tool: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: None,
            tool: DEFAULT_TOOL.to_string(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Utf8Path>) -> Result<Credentials, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::locate()?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::Read(config_path.clone()))?;
        let file: CredentialsFile =
            serde_json::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let mut credentials = Self::resolve_file(file)?;
        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                credentials.api_key = Some(api_key.trim().to_string());
            }
        }
        tracing::debug!(path = %config_path, "loaded credentials");
        Ok(credentials)
    }

    pub fn resolve_file(file: CredentialsFile) -> Result<Credentials, ConfigError> {
        let email = file
            .email
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingEmail)?;
        let api_key = file
            .api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let tool = file
            .tool
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TOOL.to_string());

        Ok(Credentials {
            email,
            api_key,
            tool,
        })
    }

    /// First existing file among the default locations.
    pub fn locate() -> Result<Utf8PathBuf, ConfigError> {
        let candidates = default_locations();
        candidates
            .iter()
            .find(|candidate| candidate.is_file())
            .cloned()
            .ok_or_else(|| ConfigError::Missing {
                searched: candidates
                    .iter()
                    .map(|path| path.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

pub fn default_locations() -> Vec<Utf8PathBuf> {
    let mut locations = vec![
        Utf8PathBuf::from(CREDENTIALS_FILE),
        Utf8PathBuf::from("..").join(CREDENTIALS_FILE),
    ];
    if let Some(home) = BaseDirs::new().and_then(|dirs| {
        Utf8PathBuf::from_path_buf(dirs.home_dir().join(".config").join(DEFAULT_TOOL)).ok()
    }) {
        locations.push(home.join(CREDENTIALS_FILE));
    }
    locations
}
