// User Inboxes
//
// A per-user view over a message table. Sending runs the optimistic
// retry loop that the repository leaves to its callers:
// observe next qid → append → on conflict, observe again.

use std::ops::Range;

use tracing::{debug, warn};

use crate::config::InboxConfig;
use crate::log::{Message, MessageRepository, NewMessage, Qid, RepositoryError};
use crate::registry::{TableHandle, TableRegistry};

/// Message types used for request acknowledgements.
pub mod message_types {
    pub const SUCCESS: &str = "urn:simpleq/success";
    pub const FAILED: &str = "urn:simpleq/failed";
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InboxError {
    #[error("inbox `{owner}` still contended after {attempts} attempts: {last}")]
    Contended {
        owner: String,
        attempts: u32,
        last: RepositoryError,
    },
}

/// Table name backing `owner`'s inbox.
pub fn inbox_table_name(owner: &str) -> String {
    format!("inbox/{owner}")
}

/// One user's inbox.
#[derive(Debug, Clone)]
pub struct Inbox<R = TableHandle> {
    owner: String,
    table: R,
    max_send_attempts: u32,
}

impl Inbox<TableHandle> {
    /// Open (creating if needed) the inbox of `owner`.
    pub fn open(registry: &TableRegistry, owner: &str, config: &InboxConfig) -> Self {
        Self::new(registry.create(&inbox_table_name(owner)), owner, config)
    }
}

impl<R: MessageRepository> Inbox<R> {
    pub fn new(table: R, owner: &str, config: &InboxConfig) -> Self {
        Self {
            owner: owner.to_string(),
            table,
            max_send_attempts: config.max_send_attempts.max(1),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn table(&self) -> &R {
        &self.table
    }

    /// Append `batch` at the end of the inbox, retrying on concurrent writes.
    pub fn send(&self, batch: &[NewMessage]) -> Result<Range<Qid>, InboxError> {
        let mut attempt = 1;

        loop {
            let expected = self.table.next_qid();

            match self.table.append(batch, expected) {
                Ok(qids) => return Ok(qids),
                Err(err) if attempt < self.max_send_attempts => {
                    debug!(owner = %self.owner, attempt, error = %err, "inbox send contended, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(owner = %self.owner, attempts = attempt, error = %err, "inbox send gave up");
                    return Err(InboxError::Contended {
                        owner: self.owner.clone(),
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }

    pub fn messages(&self, message_type: &str, offset: usize, limit: usize) -> Vec<Message> {
        self.table.read(message_type, offset, limit)
    }
}

/// Status message reporting the outcome of a send.
pub fn acknowledgement(outcome: &Result<Range<Qid>, InboxError>) -> NewMessage {
    match outcome {
        Ok(qids) => NewMessage::new(message_types::SUCCESS)
            .with_field("first_qid", qids.start)
            .with_field("count", qids.end - qids.start),
        Err(err) => NewMessage::new(message_types::FAILED).with_field("error", err.to_string()),
    }
}
