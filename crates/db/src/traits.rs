use crate::{types::RelayRecord, DbResult};

/// Append-only store for write-path commitment records. Indexes are assigned
/// by the store, monotonically from 0, and must stay correct under a
/// concurrent appender.
pub trait WriterDatabase: Send + Sync + 'static {
    /// Appends a record, returning the index it was assigned.
    fn append_record(&self, record: RelayRecord) -> DbResult<u64>;

    /// Fetches the record at the given index, if any.
    fn get_record_by_idx(&self, idx: u64) -> DbResult<Option<RelayRecord>>;

    /// Index the next appended record will get.
    fn get_next_record_idx(&self) -> DbResult<u64>;
}
