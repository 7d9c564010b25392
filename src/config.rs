use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE: &str = "geofeed.db";

#[derive(Parser, Debug)]
#[command(name = "geofeed", about = "Location-tagged social feed")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: u64,
    pub min_password_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: 168,
            min_password_len: 6,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join(DEFAULT_DB_FILE));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".geofeed"))
                .context("Could not determine home directory"),
        }
    }

    pub fn db_path(&self) -> &Path {
        self.database
            .path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_DB_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(dir: &Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.auth.session_hours, 168);
        assert_eq!(config.auth.min_password_len, 6);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_value() {
        let cli = cli_for(Path::new("/tmp/test-geofeed"));
        assert_eq!(
            Config::data_dir(&cli).unwrap(),
            PathBuf::from("/tmp/test-geofeed")
        );
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.db_path(), tmp.path().join("geofeed.db"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[database]
path = "/var/lib/geofeed/feed.db"

[auth]
session_hours = 24
min_password_len = 10
"#,
        )
        .unwrap();

        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.db_path(), Path::new("/var/lib/geofeed/feed.db"));
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.min_password_len, 10);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("custom.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[server\nport = ").unwrap();
        assert!(Config::load(&cli_for(tmp.path())).is_err());
    }
}
