use log::{debug, info};

use crate::domain::message::NormalizedMessage;
use crate::error::MailError;
use crate::mail::decoders::decode_message;
use crate::mail::session::{Connector, MailSession, SessionGuard};

/// Fetch and decode the newest message of the inbox.
///
/// `Ok(None)` means the mailbox is empty. The session is released on
/// every path, and teardown failures never surface here.
///
/// "Newest" is the highest sequence number. Servers number messages in
/// arrival order by convention, not by guarantee.
pub fn fetch_latest<C: Connector>(connector: &C) -> Result<Option<NormalizedMessage>, MailError> {
    let mut session = SessionGuard::new(connector.open()?);
    latest_from(&mut *session)
}

fn latest_from<S: MailSession>(session: &mut S) -> Result<Option<NormalizedMessage>, MailError> {
    let ids = session.search_all()?;
    let Some(&latest) = ids.last() else {
        debug!("Mailbox is empty");
        return Ok(None);
    };

    info!("Fetching message {latest} of {}", ids.len());
    let raw = session.fetch_raw(latest)?;
    match raw.literal() {
        Some(bytes) => decode_message(bytes).map(Some),
        None => {
            debug!("FETCH {latest} returned no message literal");
            Ok(None)
        }
    }
}
