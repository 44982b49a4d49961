// Message Repository Contract
//
// The boundary that request handlers call into. Implementations must be
// shareable across threads; every method takes `&self`.

use std::ops::Range;

use super::{Message, NewMessage, Qid, RepositoryError};

/// Shared, append-only message table.
///
/// Properties required from implementations:
/// - Append-only
/// - Ordered by qid
/// - Gapless qids starting at zero
/// - Compare-and-append on the expected qid
///
/// Implementations MUST NOT:
/// - Reorder messages
/// - Mutate or delete existing messages
/// - Partially apply a batch
pub trait MessageRepository: Send + Sync {
    /// Name the table was created under.
    fn table_name(&self) -> &str;

    /// Qid the next appended message will receive.
    fn next_qid(&self) -> Qid;

    /// Append `batch` if the table's next qid equals `expected`.
    ///
    /// The check and the append happen atomically with respect to every
    /// other append on the same table.
    fn append(&self, batch: &[NewMessage], expected: Qid) -> Result<Range<Qid>, RepositoryError>;

    /// Read a page of messages of one type. Never fails.
    fn read(&self, message_type: &str, offset: usize, limit: usize) -> Vec<Message>;
}
