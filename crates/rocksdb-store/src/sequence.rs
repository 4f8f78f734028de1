use rockbound::{Schema, TransactionCtx, TransactionDBMarker};

use crate::{define_table_with_default_codec, define_table_without_codec, impl_borsh_value_codec};

define_table_with_default_codec!(
    /// A table to hold sequence numbers
    (SequenceSchema) Vec<u8> => u64
);

/// Get the next incremental id for the given `Schema`, atomically within the
/// enclosing transaction. Ids start from 0. Never update the sequence row
/// outside of this method.
pub(crate) fn get_next_id<S: Schema, DB: TransactionDBMarker>(
    txn: &TransactionCtx<DB>,
) -> anyhow::Result<u64> {
    let sequence_key = S::COLUMN_FAMILY_NAME.as_bytes().to_vec();
    let next_idx = txn
        .get_for_update::<SequenceSchema>(&sequence_key)?
        .map(|last_idx| last_idx + 1)
        .unwrap_or(0);
    txn.put::<SequenceSchema>(&sequence_key, &next_idx)?;
    Ok(next_idx)
}
