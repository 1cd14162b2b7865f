//! Fetch the newest message of an IMAP inbox and decode it into plain text.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;

pub use domain::message::NormalizedMessage;
pub use error::MailError;
pub use mail::fetch::fetch_latest;
