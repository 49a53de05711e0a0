use launchprobe_core::{Error, Result};
use launchprobe_egress::{DEFAULT_DEADLINE_SECS, client::HttpClientConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Base URL of the build/launch service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binder_url: Option<String>,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default = "default_ref", alias = "ref")]
    pub git_ref: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            binder_url: None,
            repo: default_repo(),
            git_ref: default_ref(),
            timeout_secs: default_timeout_secs(),
            logging: LoggingConfig::default(),
            client: ClientSettings::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl ProbeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid YAML in {}: {}", path.display(), e)))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("BINDER_URL") {
            self.binder_url = Some(val);
        }

        if let Ok(val) = std::env::var("LAUNCHPROBE_REPO") {
            self.repo = val;
        }

        if let Ok(val) = std::env::var("LAUNCHPROBE_REF") {
            self.git_ref = val;
        }

        if let Ok(val) = std::env::var("LAUNCHPROBE_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => eprintln!(
                    "Warning: Invalid LAUNCHPROBE_TIMEOUT_SECS '{}', using {}",
                    val, self.timeout_secs
                ),
            }
        }

        if let Ok(val) = std::env::var("LAUNCHPROBE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self
            .binder_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::Config("binder_url is required (set BINDER_URL or --binder-url)".to_string())
            })?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "binder_url must be an http(s) URL, got '{}'",
                url
            )));
        }

        if self.repo.trim().is_empty() || self.git_ref.trim().is_empty() {
            return Err(Error::Config("repo and ref must not be empty".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn client_config(&self) -> HttpClientConfig {
        let defaults = HttpClientConfig::default();
        HttpClientConfig {
            connect_timeout_secs: self.client.connect_timeout_secs,
            user_agent: self.client.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }
}

fn default_repo() -> String {
    "binder-examples/requirements".to_string()
}

fn default_ref() -> String {
    "50533eb".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_VARS: &[&str] = &[
        "BINDER_URL",
        "LAUNCHPROBE_REPO",
        "LAUNCHPROBE_REF",
        "LAUNCHPROBE_TIMEOUT_SECS",
        "LAUNCHPROBE_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            // SAFETY: env tests run under #[serial], no other thread touches the environment
            unsafe { std::env::remove_var(var) };
        }
    }

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.binder_url, None);
        assert_eq!(config.repo, "binder-examples/requirements");
        assert_eq!(config.git_ref, "50533eb");
        assert_eq!(config.timeout_secs, 497);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.client.connect_timeout_secs, 10);
    }

    #[test]
    fn test_from_yaml_file() {
        let file = write_config(
            ".yaml",
            "binder_url: http://localhost:8585\nrepo: org/notebooks\nref: main\nlogging:\n  level: debug\n",
        );

        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.binder_url.as_deref(), Some("http://localhost:8585"));
        assert_eq!(config.repo, "org/notebooks");
        assert_eq!(config.git_ref, "main");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.timeout_secs, 497);
    }

    #[test]
    fn test_from_toml_file() {
        let file = write_config(
            ".toml",
            "binder_url = \"https://mybinder.org\"\ntimeout_secs = 120\n\n[client]\nconnect_timeout_secs = 3\nuser_agent = \"ci/1.0\"\n",
        );

        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.binder_url.as_deref(), Some("https://mybinder.org"));
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.repo, "binder-examples/requirements");

        let client = config.client_config();
        assert_eq!(client.connect_timeout_secs, 3);
        assert_eq!(client.user_agent, "ci/1.0");
    }

    #[test]
    fn test_from_missing_file() {
        let err = ProbeConfig::from_file("/nonexistent/launchprobe.yaml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_invalid_yaml() {
        let file = write_config(".yaml", "timeout_secs: [not, a, number]\n");
        let err = ProbeConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }

    #[test]
    #[serial]
    fn test_merge_env_overrides_file_values() {
        clear_env();
        let mut config = ProbeConfig {
            binder_url: Some("http://from-file".to_string()),
            ..Default::default()
        };

        // SAFETY: serialized env test
        unsafe {
            std::env::set_var("BINDER_URL", "http://from-env:8585");
            std::env::set_var("LAUNCHPROBE_REF", "HEAD");
            std::env::set_var("LAUNCHPROBE_TIMEOUT_SECS", "60");
            std::env::set_var("LAUNCHPROBE_LOG_LEVEL", "trace");
        }
        config.merge_env();
        clear_env();

        assert_eq!(config.binder_url.as_deref(), Some("http://from-env:8585"));
        assert_eq!(config.git_ref, "HEAD");
        assert_eq!(config.repo, "binder-examples/requirements");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    #[serial]
    fn test_merge_env_ignores_bad_timeout() {
        clear_env();
        let mut config = ProbeConfig::default();

        // SAFETY: serialized env test
        unsafe { std::env::set_var("LAUNCHPROBE_TIMEOUT_SECS", "soon") };
        config.merge_env();
        clear_env();

        assert_eq!(config.timeout_secs, 497);
    }

    #[test]
    fn test_validate() {
        let config = ProbeConfig {
            binder_url: Some("https://mybinder.org".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let missing = ProbeConfig::default();
        assert!(missing.validate().unwrap_err().to_string().contains("BINDER_URL"));

        let blank = ProbeConfig {
            binder_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let bad_scheme = ProbeConfig {
            binder_url: Some("ftp://mybinder.org".to_string()),
            ..Default::default()
        };
        assert!(bad_scheme.validate().unwrap_err().to_string().contains("http(s)"));

        let zero_timeout = ProbeConfig {
            timeout_secs: 0,
            ..config
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_client_config_defaults_user_agent() {
        let client = ProbeConfig::default().client_config();
        assert!(client.user_agent.starts_with("launchprobe/"));
        assert_eq!(client.connect_timeout_secs, 10);
    }
}
