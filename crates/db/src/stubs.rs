//! In-memory stand-ins for testing things above the database.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{traits::WriterDatabase, types::RelayRecord, DbError, DbResult};

/// Vec-backed [`WriterDatabase`] with a switch to make appends fail, for
/// exercising the write path's persistence-failure branch.
#[derive(Debug, Default)]
pub struct StubWriterDb {
    records: Mutex<Vec<RelayRecord>>,
    fail_appends: AtomicBool,
}

impl StubWriterDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append return an error.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<RelayRecord> {
        self.records.lock().clone()
    }
}

impl WriterDatabase for StubWriterDb {
    fn append_record(&self, record: RelayRecord) -> DbResult<u64> {
        if self.fail_appends.load(Ordering::Relaxed) {
            return Err(DbError::Other("stub append failure".to_string()));
        }
        let mut records = self.records.lock();
        records.push(record);
        Ok(records.len() as u64 - 1)
    }

    fn get_record_by_idx(&self, idx: u64) -> DbResult<Option<RelayRecord>> {
        Ok(self.records.lock().get(idx as usize).cloned())
    }

    fn get_next_record_idx(&self) -> DbResult<u64> {
        Ok(self.records.lock().len() as u64)
    }
}
