use std::sync::Arc;

use dalink_db::{
    errors::DbError, traits::WriterDatabase, types::RelayRecord, DbResult,
};
use rockbound::{utils::get_last, OptimisticTransactionDB as DB, SchemaDBOperationsExt};

use super::schemas::RelayRecordSchema;
use crate::{sequence::get_next_id, DbOpsConfig};

pub struct RBWriterDb {
    db: Arc<DB>,
    ops: DbOpsConfig,
}

impl RBWriterDb {
    /// Wraps an existing database handle.
    ///
    /// Assumes it was opened with column families as defined in
    /// `STORE_COLUMN_FAMILIES`.
    pub fn new(db: Arc<DB>, ops: DbOpsConfig) -> Self {
        Self { db, ops }
    }
}

impl WriterDatabase for RBWriterDb {
    fn append_record(&self, record: RelayRecord) -> DbResult<u64> {
        self.db
            .with_optimistic_txn(
                rockbound::TransactionRetry::Count(self.ops.retry_count),
                |tx| -> Result<u64, DbError> {
                    let idx = get_next_id::<RelayRecordSchema, DB>(tx)?;
                    tracing::debug!(%idx, "putting relay record");
                    tx.put::<RelayRecordSchema>(&idx, &record)?;
                    Ok(idx)
                },
            )
            .map_err(|e| DbError::TransactionError(e.to_string()))
    }

    fn get_record_by_idx(&self, idx: u64) -> DbResult<Option<RelayRecord>> {
        Ok(self.db.get::<RelayRecordSchema>(&idx)?)
    }

    fn get_next_record_idx(&self) -> DbResult<u64> {
        Ok(get_last::<RelayRecordSchema>(&*self.db)?
            .map(|(x, _)| x + 1)
            .unwrap_or(0))
    }
}

#[cfg(feature = "test_utils")]
#[cfg(test)]
mod tests {
    use dalink_db::{traits::WriterDatabase, types::RelayRecord};

    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn record(n: u64) -> RelayRecord {
        RelayRecord::new(format!("txid{n}"), 1_700_000_000 + n)
    }

    #[test]
    fn test_append_assigns_monotonic_idx() {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        let writer_db = RBWriterDb::new(db, db_ops);

        assert_eq!(writer_db.get_next_record_idx().unwrap(), 0);

        let idx0 = writer_db.append_record(record(0)).unwrap();
        let idx1 = writer_db.append_record(record(1)).unwrap();
        let idx2 = writer_db.append_record(record(2)).unwrap();

        assert_eq!((idx0, idx1, idx2), (0, 1, 2));
        assert_eq!(writer_db.get_next_record_idx().unwrap(), 3);
    }

    #[test]
    fn test_get_record_by_idx() {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        let writer_db = RBWriterDb::new(db, db_ops);

        let idx = writer_db.append_record(record(7)).unwrap();

        let stored = writer_db.get_record_by_idx(idx).unwrap();
        assert_eq!(stored, Some(record(7)));

        let missing = writer_db.get_record_by_idx(idx + 1).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_records_survive_in_append_order() {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        let writer_db = RBWriterDb::new(db, db_ops);

        for n in 0..5 {
            writer_db.append_record(record(n)).unwrap();
        }

        for n in 0..5 {
            let rec = writer_db.get_record_by_idx(n).unwrap().unwrap();
            assert_eq!(rec.reference(), format!("txid{n}"));
        }
    }
}
