use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_IMAP_SERVER: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub imap_server: Option<String>,
    pub imap_port: Option<u16>,
    pub user_email: Option<String>,
}

/// Connection values handed to the session layer as opaque strings.
#[derive(Clone, PartialEq, Eq)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ImapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ImapSettings {
    pub fn resolve(cfg: &Config, password: impl Into<String>) -> Result<Self> {
        let username = cfg
            .user_email
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("user_email not set in config"))?;

        Ok(Self {
            host: cfg
                .imap_server
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAP_SERVER.to_string()),
            port: cfg.imap_port.unwrap_or(DEFAULT_IMAP_PORT),
            username,
            password: password.into(),
        })
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("latest_mail"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            imap_server: Some(DEFAULT_IMAP_SERVER.to_string()),
            imap_port: Some(DEFAULT_IMAP_PORT),
            user_email: Some("you@example.com".to_string()),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        return Err(anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            imap_server = "mail.example.org"
            imap_port = 1993
            user_email = "me@example.org"
            "#,
        )
        .unwrap();
        let settings = ImapSettings::resolve(&cfg, "hunter2").unwrap();
        assert_eq!(settings.host, "mail.example.org");
        assert_eq!(settings.port, 1993);
        assert_eq!(settings.username, "me@example.org");
        assert_eq!(settings.password, "hunter2");
    }

    #[test]
    fn defaults_host_and_port() {
        let cfg: Config = toml::from_str(r#"user_email = "me@gmail.com""#).unwrap();
        let settings = ImapSettings::resolve(&cfg, "pw").unwrap();
        assert_eq!(settings.host, DEFAULT_IMAP_SERVER);
        assert_eq!(settings.port, DEFAULT_IMAP_PORT);
    }

    #[test]
    fn missing_user_is_an_error() {
        let cfg: Config = toml::from_str("").unwrap();
        let err = ImapSettings::resolve(&cfg, "pw").unwrap_err();
        assert!(err.to_string().contains("user_email"));
    }

    #[test]
    fn debug_hides_password() {
        let cfg: Config = toml::from_str(r#"user_email = "me@gmail.com""#).unwrap();
        let settings = ImapSettings::resolve(&cfg, "s3cret").unwrap();
        let shown = format!("{settings:?}");
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("me@gmail.com"));
    }

    #[test]
    fn template_written_when_missing() {
        let path = std::env::temp_dir().join(format!(
            "latest_mail_config_test_{}.toml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("Created template config"));

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.imap_server.as_deref(), Some(DEFAULT_IMAP_SERVER));
        assert_eq!(cfg.user_email.as_deref(), Some("you@example.com"));

        fs::remove_file(&path).unwrap();
    }
}
