// Table State
//
// A table is either empty or holds messages up to some next qid.
// The only transition is a successful append.

use serde::Serialize;

use crate::log::Qid;

/// Observable lifecycle state of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableState {
    /// No message has been appended yet.
    Empty,

    /// At least one message exists; `next_qid` equals the message count.
    NonEmpty { next_qid: Qid },
}

impl TableState {
    pub fn from_next_qid(next_qid: Qid) -> Self {
        if next_qid == 0 {
            TableState::Empty
        } else {
            TableState::NonEmpty { next_qid }
        }
    }

    pub fn next_qid(&self) -> Qid {
        match self {
            TableState::Empty => 0,
            TableState::NonEmpty { next_qid } => *next_qid,
        }
    }
}
