//! rocksdb-backed implementation of the relay storage traits, built on
//! rockbound schemas and optimistic transactions.

pub mod macros;
mod sequence;
pub mod writer;

#[cfg(feature = "test_utils")]
pub mod test_utils;

use std::{fs, path::Path, sync::Arc};

use anyhow::Context;
use rockbound::{rocksdb, schema::ColumnFamilyName, Schema};

use crate::{sequence::SequenceSchema, writer::schemas::RelayRecordSchema};

pub use writer::db::RBWriterDb;

pub const ROCKSDB_NAME: &str = "dalink";

pub const STORE_COLUMN_FAMILIES: &[ColumnFamilyName] = &[
    SequenceSchema::COLUMN_FAMILY_NAME,
    RelayRecordSchema::COLUMN_FAMILY_NAME,
];

/// Database operation config, currently just retry count.
#[derive(Clone, Copy, Debug)]
pub struct DbOpsConfig {
    pub retry_count: u16,
}

impl DbOpsConfig {
    pub fn new(retry_count: u16) -> Self {
        Self { retry_count }
    }
}

/// Opens (creating if missing) the rocksdb database under `datadir/rocksdb`
/// with all column families precreated.
pub fn open_rocksdb_database(
    datadir: &Path,
) -> anyhow::Result<Arc<rockbound::OptimisticTransactionDB>> {
    let mut database_dir = datadir.to_path_buf();
    database_dir.push("rocksdb");

    if !database_dir.exists() {
        fs::create_dir_all(&database_dir)?;
    }

    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let rbdb = rockbound::OptimisticTransactionDB::open(
        &database_dir,
        ROCKSDB_NAME,
        STORE_COLUMN_FAMILIES.iter().map(|s| s.to_string()),
        &opts,
    )
    .context("opening database")?;

    Ok(Arc::new(rbdb))
}
