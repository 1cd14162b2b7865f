//! Error type for the mail retrieval core.

use std::fmt::Display;

/// The single failure type handed to callers of [`crate::mail::fetch::fetch_latest`].
///
/// Callers are expected to show the message, not branch on the variant.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Mail authentication error: {0}")]
    Authentication(String),

    #[error("Fetch error: {0}")]
    Fetch(String),
}

impl MailError {
    /// Classify a failure raised while opening a session (connect, login, select).
    ///
    /// Protocol-level rejections count as authentication failures, anything
    /// below the protocol (socket, DNS, TLS, dropped connection) as a
    /// connection failure.
    pub fn from_open(err: imap::Error) -> Self {
        match err {
            imap::Error::No(_)
            | imap::Error::Bad(_)
            | imap::Error::Parse(_)
            | imap::Error::Validate(_) => MailError::Authentication(err.to_string()),
            other => MailError::Connection(other.to_string()),
        }
    }

    pub fn fetch(context: &str, cause: impl Display) -> Self {
        MailError::Fetch(format!("{context}: {cause}"))
    }
}

impl From<native_tls::Error> for MailError {
    fn from(err: native_tls::Error) -> Self {
        MailError::Connection(format!("TLS setup failed: {err}"))
    }
}
