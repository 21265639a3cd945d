// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Network configuration types

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RestClientError, RestClientResult};

/// Network configuration for the replay service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Replay service base URL
    #[serde(rename = "service-base-url")]
    pub service_base_url: Option<String>,
    /// Monitored package this client queries sessions for
    #[serde(rename = "package-name")]
    pub package_name: Option<String>,
    /// Backend server type discriminator forwarded with every query
    #[serde(rename = "server-type")]
    pub server_type: Option<String>,
}

impl NetworkConfig {
    /// Load from a TOML or JSON file, keyed off the extension
    pub fn from_file(path: &Path) -> RestClientResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RestClientError::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => toml::from_str(&text)
                .map_err(|e| RestClientError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    /// Overlay values from `other`, preferring `other` where set
    pub fn merged_with(self, other: NetworkConfig) -> NetworkConfig {
        NetworkConfig {
            service_base_url: other.service_base_url.or(self.service_base_url),
            package_name: other.package_name.or(self.package_name),
            server_type: other.server_type.or(self.server_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_toml_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "service-base-url = \"http://replay.internal:8080\"\npackage-name = \"com.example.shop\""
        )
        .unwrap();

        let config = NetworkConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.service_base_url.as_deref(),
            Some("http://replay.internal:8080")
        );
        assert_eq!(config.package_name.as_deref(), Some("com.example.shop"));
        assert_eq!(config.server_type, None);
    }

    #[test]
    fn loads_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"service-base-url\": \"http://localhost:3001\"}}").unwrap();

        let config = NetworkConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.service_base_url.as_deref(),
            Some("http://localhost:3001")
        );
    }

    #[test]
    fn merge_prefers_overlay_values() {
        let base = NetworkConfig {
            service_base_url: Some("http://base".to_string()),
            package_name: Some("base-pkg".to_string()),
            server_type: None,
        };
        let overlay = NetworkConfig {
            service_base_url: Some("http://overlay".to_string()),
            package_name: None,
            server_type: Some("java".to_string()),
        };

        let merged = base.merged_with(overlay);
        assert_eq!(merged.service_base_url.as_deref(), Some("http://overlay"));
        assert_eq!(merged.package_name.as_deref(), Some("base-pkg"));
        assert_eq!(merged.server_type.as_deref(), Some("java"));
    }
}
