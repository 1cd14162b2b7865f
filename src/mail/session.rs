use std::net::TcpStream;
use std::ops::{Deref, DerefMut};

use log::{debug, warn};
use native_tls::{TlsConnector, TlsStream};

use crate::config::ImapSettings;
use crate::error::MailError;

pub const MAILBOX: &str = "INBOX";

/// Message identifier as returned by `SEARCH` (a sequence number).
pub type MessageId = u32;

/// One item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    /// Literal payload carrying the full message.
    Literal(Vec<u8>),
    /// Any other fetch item (flags, metadata only).
    Attributes,
}

/// The FETCH response envelope for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub parts: Vec<ResponsePart>,
}

impl RawMessage {
    pub fn from_literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            parts: vec![ResponsePart::Literal(bytes.into())],
        }
    }

    /// First part carrying the message bytes.
    pub fn literal(&self) -> Option<&[u8]> {
        self.parts.iter().find_map(|p| match p {
            ResponsePart::Literal(bytes) => Some(bytes.as_slice()),
            ResponsePart::Attributes => None,
        })
    }
}

/// An authenticated session with the mailbox already selected.
pub trait MailSession {
    /// Identifiers of every message in the mailbox, ascending.
    fn search_all(&mut self) -> Result<Vec<MessageId>, MailError>;
    fn fetch_raw(&mut self, id: MessageId) -> Result<RawMessage, MailError>;
    fn close(&mut self) -> Result<(), MailError>;
    fn logout(&mut self) -> Result<(), MailError>;
}

/// Opens a fresh session per call.
pub trait Connector {
    type Session: MailSession;

    fn open(&self) -> Result<Self::Session, MailError>;
}

/// Owns a session and tears it down when dropped, whatever the exit path.
pub struct SessionGuard<S: MailSession> {
    session: S,
}

impl<S: MailSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: MailSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        // Teardown errors never replace the primary outcome.
        if let Err(e) = self.session.close() {
            warn!("IMAP CLOSE failed during teardown: {e}");
        }
        if let Err(e) = self.session.logout() {
            warn!("IMAP LOGOUT failed during teardown: {e}");
        }
        debug!("IMAP session released");
    }
}

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// Session over implicit TLS.
pub struct ImapSession {
    inner: TlsSession,
}

impl MailSession for ImapSession {
    fn search_all(&mut self) -> Result<Vec<MessageId>, MailError> {
        let mut ids: Vec<MessageId> = self
            .inner
            .search("ALL")
            .map_err(|e| MailError::fetch("SEARCH ALL failed", e))?
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_raw(&mut self, id: MessageId) -> Result<RawMessage, MailError> {
        let fetches = self
            .inner
            .fetch(id.to_string(), "RFC822")
            .map_err(|e| MailError::fetch(&format!("FETCH {id} failed"), e))?;

        let parts = fetches
            .iter()
            .map(|f| match f.body() {
                Some(bytes) => ResponsePart::Literal(bytes.to_vec()),
                None => ResponsePart::Attributes,
            })
            .collect();
        Ok(RawMessage { parts })
    }

    fn close(&mut self) -> Result<(), MailError> {
        self.inner
            .close()
            .map_err(|e| MailError::fetch("CLOSE failed", e))
    }

    fn logout(&mut self) -> Result<(), MailError> {
        self.inner
            .logout()
            .map_err(|e| MailError::fetch("LOGOUT failed", e))
    }
}

/// Connects to the configured server, logs in and selects the inbox.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: ImapSettings,
}

impl ImapConnector {
    pub fn new(settings: ImapSettings) -> Self {
        Self { settings }
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn open(&self) -> Result<ImapSession, MailError> {
        let ImapSettings {
            host,
            port,
            username,
            password,
        } = &self.settings;

        debug!("Connecting to {host}:{port}");
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect((host.as_str(), *port), host.as_str(), &tls)
            .map_err(MailError::from_open)?;

        let mut inner = client
            .login(username, password)
            .map_err(|(e, _client)| MailError::Authentication(e.to_string()))?;

        if let Err(e) = inner.select(MAILBOX) {
            if let Err(logout_err) = inner.logout() {
                warn!("IMAP LOGOUT failed after SELECT error: {logout_err}");
            }
            return Err(MailError::from_open(e));
        }

        debug!("Logged in as {username}, {MAILBOX} selected");
        Ok(ImapSession { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        calls: Rc<RefCell<Vec<&'static str>>>,
        fail_close: bool,
    }

    impl MailSession for Recorder {
        fn search_all(&mut self) -> Result<Vec<MessageId>, MailError> {
            Ok(vec![])
        }

        fn fetch_raw(&mut self, _id: MessageId) -> Result<RawMessage, MailError> {
            Ok(RawMessage::default())
        }

        fn close(&mut self) -> Result<(), MailError> {
            self.calls.borrow_mut().push("close");
            if self.fail_close {
                return Err(MailError::fetch("CLOSE failed", "no mailbox selected"));
            }
            Ok(())
        }

        fn logout(&mut self) -> Result<(), MailError> {
            self.calls.borrow_mut().push("logout");
            Ok(())
        }
    }

    #[test]
    fn guard_closes_then_logs_out() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        drop(SessionGuard::new(Recorder {
            calls: Rc::clone(&calls),
            fail_close: false,
        }));
        assert_eq!(*calls.borrow(), vec!["close", "logout"]);
    }

    #[test]
    fn guard_logs_out_even_if_close_fails() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        drop(SessionGuard::new(Recorder {
            calls: Rc::clone(&calls),
            fail_close: true,
        }));
        assert_eq!(*calls.borrow(), vec!["close", "logout"]);
    }

    #[test]
    fn literal_skips_attribute_parts() {
        let raw = RawMessage {
            parts: vec![
                ResponsePart::Attributes,
                ResponsePart::Literal(b"Subject: x\r\n\r\nbody".to_vec()),
                ResponsePart::Literal(b"ignored".to_vec()),
            ],
        };
        assert_eq!(raw.literal(), Some(&b"Subject: x\r\n\r\nbody"[..]));
    }

    #[test]
    fn literal_absent() {
        let raw = RawMessage {
            parts: vec![ResponsePart::Attributes],
        };
        assert_eq!(raw.literal(), None);
    }
}
