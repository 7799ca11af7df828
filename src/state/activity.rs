use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::config::HISTORY_CAP;
use crate::types::TransactionRecord;

/// Session activity history. In-memory only, lost on restart.
pub struct ActivityLog {
    entries: RwLock<VecDeque<TransactionRecord>>,
}

impl ActivityLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(VecDeque::new()),
        })
    }

    pub fn push(&self, record: TransactionRecord) {
        let mut entries = match self.entries.write() {
            Ok(e) => e,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_front(record);
        entries.truncate(HISTORY_CAP);
    }

    /// Newest first.
    pub fn list(&self) -> Vec<TransactionRecord> {
        match self.entries.read() {
            Ok(e) => e.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeAction;

    fn record(n: usize) -> TransactionRecord {
        TransactionRecord {
            question_id: format!("q{n}"),
            title: format!("question {n}"),
            action: TradeAction::Yes,
            nominal: 10.0,
            timestamp: format!("2025-01-01T00:00:{n:02}Z"),
        }
    }

    #[test]
    fn newest_entry_listed_first() {
        let log = ActivityLog::new();
        log.push(record(1));
        log.push(record(2));
        let listed = log.list();
        assert_eq!(listed[0].question_id, "q2");
        assert_eq!(listed[1].question_id, "q1");
    }

    #[test]
    fn history_is_capped() {
        let log = ActivityLog::new();
        for n in 0..HISTORY_CAP + 10 {
            log.push(record(n));
        }
        assert_eq!(log.len(), HISTORY_CAP);
    }
}
