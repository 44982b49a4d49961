// Message Log
//
// Append-only, per-table sequence of messages. Every appended message
// receives the next qid; qids start at zero and never skip or repeat.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;
use uuid::Uuid;

pub mod store;

pub use store::MessageRepository;

/// Sequence number of a message within one table.
pub type Qid = u64;

/// Stable identifier for a table, assigned when it is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub Uuid);

impl TableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

/// A message as supplied by a caller, before the repository assigns a qid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl NewMessage {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            body: Map::new(),
        }
    }

    /// Add a body field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    fn stamp(&self, qid: Qid) -> Message {
        let mut body = self.body.clone();
        // `qid` and `type` are owned by the repository.
        body.remove("qid");
        body.remove("type");

        Message {
            qid,
            message_type: self.message_type.clone(),
            body,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub qid: Qid,

    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Message {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

impl From<Message> for NewMessage {
    fn from(message: Message) -> Self {
        Self {
            message_type: message.message_type,
            body: message.body,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("concurrency conflict on table `{table}`: expected qid {expected}, actual {actual}")]
    ConcurrencyConflict {
        table: String,
        expected: Qid,
        actual: Qid,
    },
}

impl RepositoryError {
    /// The table's real next qid at the time of the conflict.
    pub fn actual_qid(&self) -> Qid {
        match self {
            RepositoryError::ConcurrencyConflict { actual, .. } => *actual,
        }
    }
}

/// Unsynchronized message log for a single table.
///
/// Callers sharing a log across threads wrap it in a lock; see
/// [`crate::registry`].
#[derive(Debug, Default)]
pub struct MessageLog {
    name: String,
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
        }
    }

    /// Append a batch whose first message is expected to receive `expected`.
    ///
    /// Either every message is appended or none is. Returns the qids assigned.
    pub fn append(
        &mut self,
        batch: &[NewMessage],
        expected: Qid,
    ) -> Result<Range<Qid>, RepositoryError> {
        let actual = self.next_qid();

        if expected != actual {
            return Err(RepositoryError::ConcurrencyConflict {
                table: self.name.clone(),
                expected,
                actual,
            });
        }

        self.messages.reserve(batch.len());
        for (offset, message) in batch.iter().enumerate() {
            self.messages.push(message.stamp(actual + offset as Qid));
        }

        Ok(actual..self.next_qid())
    }

    /// Messages of `message_type` in qid order, skipping `offset` matches and
    /// returning at most `limit`.
    pub fn read(&self, message_type: &str, offset: usize, limit: usize) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.message_type == message_type)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn replay(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn next_qid(&self) -> Qid {
        self.messages.len() as Qid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn msg(message_type: &str) -> NewMessage {
        NewMessage::new(message_type)
    }

    #[test]
    fn empty_log_reads_nothing() {
        let log = MessageLog::new("tablename");
        assert!(log.read("type", 0, 1).is_empty());
        assert_eq!(log.next_qid(), 0);
    }

    #[test]
    fn first_message_gets_qid_zero() {
        let mut log = MessageLog::new("tablename");
        log.append(&[msg("urn:test")], 0).unwrap();

        let read = log.read("urn:test", 0, 1);
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].qid, 0);
        assert_eq!(read[0].message_type, "urn:test");

        assert!(log.read("urn:test", 1, 1).is_empty());
        assert!(log.read("urn:test2", 0, 1).is_empty());
    }

    #[test]
    fn batch_gets_consecutive_qids() {
        let mut log = MessageLog::new("t");
        assert_eq!(log.append(&[msg("a"), msg("b")], 0).unwrap(), 0..2);
        assert_eq!(log.append(&[msg("a"), msg("a"), msg("b")], 2).unwrap(), 2..5);

        let qids: Vec<_> = log.replay().map(|m| m.qid).collect();
        assert_eq!(qids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stale_expected_qid_conflicts_and_leaves_log_untouched() {
        let mut log = MessageLog::new("t");
        log.append(&[msg("a")], 0).unwrap();

        let err = log.append(&[msg("b"), msg("c")], 0).unwrap_err();
        assert_eq!(
            err,
            RepositoryError::ConcurrencyConflict {
                table: "t".into(),
                expected: 0,
                actual: 1,
            }
        );
        assert_eq!(err.actual_qid(), 1);
        assert_eq!(log.next_qid(), 1);
        assert!(log.read("b", 0, 10).is_empty());
    }

    #[test]
    fn future_expected_qid_conflicts() {
        let mut log = MessageLog::new("t");
        assert!(log.append(&[msg("a")], 5).is_err());
        assert_eq!(log.next_qid(), 0);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut log = MessageLog::new("t");
        assert_eq!(log.append(&[], 0).unwrap(), 0..0);
        assert!(log.append(&[], 3).is_err());
        assert_eq!(log.next_qid(), 0);
    }

    #[test]
    fn pagination_counts_only_matching_messages() {
        let mut log = MessageLog::new("t");
        let batch: Vec<_> = (0..6)
            .map(|i| msg(if i % 2 == 0 { "even" } else { "odd" }).with_field("i", i))
            .collect();
        log.append(&batch, 0).unwrap();

        let page: Vec<_> = log.read("even", 1, 5).iter().map(|m| m.qid).collect();
        assert_eq!(page, vec![2, 4]);

        let page: Vec<_> = log.read("odd", 0, 2).iter().map(|m| m.qid).collect();
        assert_eq!(page, vec![1, 3]);

        assert!(log.read("odd", 0, 0).is_empty());
        assert!(log.read("odd", 10, 1).is_empty());
    }

    #[test]
    fn caller_cannot_set_qid_or_type_through_body() {
        let mut log = MessageLog::new("t");
        let mut message = msg("urn:test").with_field("text", "hello");
        message.body.insert("qid".into(), Value::from(99));
        log.append(&[message], 0).unwrap();

        let stored = &log.read("urn:test", 0, 1)[0];
        assert_eq!(stored.qid, 0);
        assert_eq!(stored.get("text"), Some(&Value::from("hello")));
        assert!(stored.get("qid").is_none());
    }

    #[test]
    fn message_serializes_flat() {
        let mut log = MessageLog::new("t");
        log.append(&[msg("urn:test").with_field("text", "hi")], 0)
            .unwrap();

        let json = serde_json::to_value(&log.read("urn:test", 0, 1)[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "qid": 0, "type": "urn:test", "text": "hi" })
        );

        let parsed: NewMessage =
            serde_json::from_str(r#"{ "type": "urn:x", "to": "bob" }"#).unwrap();
        assert_eq!(parsed.message_type, "urn:x");
        assert_eq!(parsed.body.get("to"), Some(&Value::from("bob")));
    }

    proptest! {
        #[test]
        fn prop_qids_are_gapless(sizes in proptest::collection::vec(0usize..5, 0..20)) {
            let mut log = MessageLog::new("t");
            let mut total = 0u64;

            for size in sizes {
                let batch: Vec<_> = (0..size).map(|_| msg("a")).collect();
                let range = log.append(&batch, total).unwrap();
                prop_assert_eq!(range, total..total + size as u64);
                total += size as u64;
            }

            let qids: Vec<_> = log.replay().map(|m| m.qid).collect();
            prop_assert_eq!(qids, (0..total).collect::<Vec<_>>());
        }

        #[test]
        fn prop_read_matches_reference_filter(
            kinds in proptest::collection::vec(0u8..3, 0..40),
            offset in 0usize..20,
            limit in 0usize..20,
        ) {
            let mut log = MessageLog::new("t");
            let batch: Vec<_> = kinds.iter().map(|k| msg(&format!("k{k}"))).collect();
            log.append(&batch, 0).unwrap();

            let expected: Vec<Qid> = kinds
                .iter()
                .enumerate()
                .filter(|(_, k)| **k == 1)
                .map(|(i, _)| i as Qid)
                .skip(offset)
                .take(limit)
                .collect();
            let actual: Vec<Qid> = log.read("k1", offset, limit).iter().map(|m| m.qid).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
