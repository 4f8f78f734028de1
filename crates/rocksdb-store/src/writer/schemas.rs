use dalink_db::types::RelayRecord;

use crate::{
    define_table_with_seek_key_codec, define_table_without_codec, impl_borsh_value_codec,
};

define_table_with_seek_key_codec!(
    /// A table to store idx -> commitment record mapping
    (RelayRecordSchema) u64 => RelayRecord
);
