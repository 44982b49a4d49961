// Message Replay
//
// Loads a previously exported message sequence back into a table.
// The sequence is vetted by the invariant engine, then each message is
// re-appended with its recorded qid as the expected qid.

use crate::invariants::{InvariantEngine, InvariantViolation};
use crate::log::{Message, MessageRepository, NewMessage, Qid, RepositoryError};

/// Errors that can occur during replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Replay `messages` into `table`, returning the table's next qid afterwards.
///
/// The first message must carry the table's current next qid. Nothing is
/// appended if the sequence fails validation or starts at the wrong qid.
pub fn replay_into<R: MessageRepository + ?Sized>(
    table: &R,
    messages: &[Message],
    invariants: &InvariantEngine,
) -> Result<Qid, ReplayError> {
    invariants.evaluate(messages)?;

    let Some(first) = messages.first() else {
        return Ok(table.next_qid());
    };

    let batch: Vec<NewMessage> = messages.iter().cloned().map(NewMessage::from).collect();
    let qids = table.append(&batch, first.qid)?;

    Ok(qids.end)
}
