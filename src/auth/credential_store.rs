use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "latest_mail";

/// Environment fallback when the keyring has no entry.
pub const PASSWORD_ENV: &str = "MAIL_PASSWORD";

/// Save the mail account password into the OS keyring for the given username (email)
pub fn save_password(username: &str, password: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, username);
    entry?
        .set_password(password)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the mail account password from the keyring for the given username (email)
pub fn load_password(username: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, username);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Keyring first, then `MAIL_PASSWORD`.
pub fn resolve_password(username: &str) -> Result<String> {
    let from_env = std::env::var(PASSWORD_ENV).ok();
    let stored = match load_password(username) {
        Ok(p) => p,
        // no keyring backend (headless box): the env var may still cover it
        Err(e) if from_env.is_some() => {
            log::debug!("keyring unavailable, using {PASSWORD_ENV}: {e}");
            None
        }
        Err(e) => return Err(e),
    };
    pick_password(stored, from_env).ok_or_else(|| {
        anyhow!(
            "no password for {username}: run `latest_mail set-password --user {username}` or set {PASSWORD_ENV}"
        )
    })
}

fn pick_password(stored: Option<String>, from_env: Option<String>) -> Option<String> {
    stored
        .or(from_env)
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_value_wins() {
        assert_eq!(
            pick_password(Some("stored".into()), Some("env".into())).as_deref(),
            Some("stored")
        );
    }

    #[test]
    fn env_used_when_keyring_empty() {
        assert_eq!(pick_password(None, Some("env".into())).as_deref(), Some("env"));
    }

    #[test]
    fn nothing_or_empty_is_none() {
        assert_eq!(pick_password(None, None), None);
        assert_eq!(pick_password(None, Some(String::new())), None);
    }
}
