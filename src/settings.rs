use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bookmap::ColumnConfig;

/// Tool settings, read from a JSON (or YAML) file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logfile: PathBuf,
    #[serde(flatten)]
    pub columns: ColumnConfig,
    pub source_server: String,
    pub destination_server: String,
    pub destination_credentials: String,
    #[serde(flatten)]
    pub roles: Roles,
}

/// People assigned to copied content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Roles {
    pub authors: Vec<String>,
    pub maintainers: Vec<String>,
    pub rightsholders: Vec<String>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read settings: {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );
        let mut settings: Self = if is_yaml {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parse settings yaml: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("parse settings json: {}", path.display()))?
        };

        settings.source_server =
            normalize_server(&settings.source_server).context("source_server")?;
        settings.destination_server =
            normalize_server(&settings.destination_server).context("destination_server")?;
        Ok(settings)
    }

    /// The user half of `user:password` credentials.
    #[must_use]
    pub fn destination_user(&self) -> &str {
        self.destination_credentials
            .split_once(':')
            .map_or(self.destination_credentials.as_str(), |(user, _)| user)
    }
}

/// Prefixes `http://` when no scheme is given and drops trailing slashes.
pub fn normalize_server(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        anyhow::bail!("server address is empty");
    }
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else {
        format!("http://{raw}")
    };
    Url::parse(&with_scheme).with_context(|| format!("invalid server address: {raw}"))?;
    Ok(with_scheme.trim_end_matches('/').to_owned())
}
