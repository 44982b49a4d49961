// Table Registry
//
// Owns every message table in the process. Tables are created lazily by
// name and are never removed. Each table carries its own lock, so appends
// to different tables never wait on each other; the registry map lock is
// only held while a handle is looked up or inserted.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::RepositoryConfig;
use crate::log::{Message, MessageLog, MessageRepository, NewMessage, Qid, RepositoryError, TableId};
use crate::state::TableState;

#[derive(Debug)]
struct Table {
    id: TableId,
    name: String,
    log: RwLock<MessageLog>,
}

impl Table {
    fn new(name: &str) -> Self {
        Self {
            id: TableId::new(),
            name: name.to_string(),
            log: RwLock::new(MessageLog::new(name)),
        }
    }
}

/// Cheaply cloneable handle to one table.
#[derive(Debug, Clone)]
pub struct TableHandle {
    table: Arc<Table>,
}

impl TableHandle {
    pub fn id(&self) -> TableId {
        self.table.id
    }

    pub fn state(&self) -> TableState {
        TableState::from_next_qid(self.next_qid())
    }

    /// Every message in the table, in qid order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.table.log.read().replay().cloned().collect()
    }
}

impl MessageRepository for TableHandle {
    fn table_name(&self) -> &str {
        &self.table.name
    }

    fn next_qid(&self) -> Qid {
        self.table.log.read().next_qid()
    }

    fn append(&self, batch: &[NewMessage], expected: Qid) -> Result<Range<Qid>, RepositoryError> {
        let result = self.table.log.write().append(batch, expected);

        match &result {
            Ok(qids) => debug!(
                table = %self.table.name,
                first_qid = qids.start,
                count = batch.len(),
                "appended messages"
            ),
            Err(err) => warn!(
                table = %self.table.name,
                expected,
                actual = err.actual_qid(),
                "append rejected by concurrency check"
            ),
        }

        result
    }

    fn read(&self, message_type: &str, offset: usize, limit: usize) -> Vec<Message> {
        let messages = self.table.log.read().read(message_type, offset, limit);
        trace!(
            table = %self.table.name,
            message_type,
            offset,
            limit,
            returned = messages.len(),
            "read messages"
        );
        messages
    }
}

/// Process-wide collection of message tables.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the configured tables already present.
    pub fn with_config(config: &RepositoryConfig) -> Self {
        let registry = Self::new();
        for name in &config.tables {
            registry.create(name);
        }
        registry
    }

    /// Return the table called `name`, creating it if it does not exist.
    ///
    /// Repeated calls with the same name share one underlying table.
    pub fn create(&self, name: &str) -> TableHandle {
        if let Some(handle) = self.get(name) {
            return handle;
        }

        let mut tables = self.tables.write();
        let table = tables.entry(name.to_string()).or_insert_with(|| {
            debug!(table = name, "created table");
            Arc::new(Table::new(name))
        });

        TableHandle {
            table: Arc::clone(table),
        }
    }

    /// Look up an existing table without creating it.
    pub fn get(&self, name: &str) -> Option<TableHandle> {
        self.tables.read().get(name).map(|table| TableHandle {
            table: Arc::clone(table),
        })
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
