//! Table-definition macros shared by the schema modules.

/// Declares a schema struct and wires it to a column family, without picking
/// key/value codecs.
#[macro_export]
macro_rules! define_table_without_codec {
    ($(#[$docs:meta])+ ($table_name:ident) $key:ty => $value:ty) => {
        $(#[$docs])+
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $table_name;

        impl ::rockbound::schema::Schema for $table_name {
            const COLUMN_FAMILY_NAME: ::rockbound::schema::ColumnFamilyName =
                ::core::stringify!($table_name);
            type Key = $key;
            type Value = $value;
        }

        impl ::core::fmt::Display for $table_name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::write!(f, "{}", ::core::stringify!($table_name))
            }
        }
    };
}

/// Implements the value half of a schema via borsh.
#[macro_export]
macro_rules! impl_borsh_value_codec {
    ($table_name:ident, $value:ty) => {
        impl ::rockbound::schema::ValueCodec<$table_name> for $value {
            fn encode_value(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<u8>, ::rockbound::CodecError> {
                ::borsh::to_vec(self).map_err(|e| e.into())
            }

            fn decode_value(
                data: &[u8],
            ) -> ::std::result::Result<Self, ::rockbound::CodecError> {
                ::borsh::from_slice(data).map_err(|e| e.into())
            }
        }
    };
}

/// Schema with borsh codecs on both key and value. Borsh keys do not iterate
/// in numeric order, so only use this where seeks don't matter.
#[macro_export]
macro_rules! define_table_with_default_codec {
    ($(#[$docs:meta])+ ($table_name:ident) $key:ty => $value:ty) => {
        $crate::define_table_without_codec!($(#[$docs])+ ($table_name) $key => $value);

        impl ::rockbound::schema::KeyEncoder<$table_name> for $key {
            fn encode_key(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<u8>, ::rockbound::CodecError> {
                ::borsh::to_vec(self).map_err(|e| e.into())
            }
        }

        impl ::rockbound::schema::KeyDecoder<$table_name> for $key {
            fn decode_key(data: &[u8]) -> ::std::result::Result<Self, ::rockbound::CodecError> {
                ::borsh::from_slice(data).map_err(|e| e.into())
            }
        }

        $crate::impl_borsh_value_codec!($table_name, $value);
    };
}

/// Schema whose key encodes big-endian fixint so that rocksdb iteration
/// order matches numeric order. Required for tables we seek to the last
/// index of.
#[macro_export]
macro_rules! define_table_with_seek_key_codec {
    ($(#[$docs:meta])+ ($table_name:ident) $key:ty => $value:ty) => {
        $crate::define_table_without_codec!($(#[$docs])+ ($table_name) $key => $value);

        impl ::rockbound::schema::KeyEncoder<$table_name> for $key {
            fn encode_key(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<u8>, ::rockbound::CodecError> {
                use ::anyhow::Context as _;
                use ::bincode::Options as _;

                let bincode_options = ::bincode::options()
                    .with_fixint_encoding()
                    .with_big_endian();

                bincode_options
                    .serialize(self)
                    .context("Failed to serialize key")
                    .map_err(Into::into)
            }
        }

        impl ::rockbound::schema::KeyDecoder<$table_name> for $key {
            fn decode_key(data: &[u8]) -> ::std::result::Result<Self, ::rockbound::CodecError> {
                use ::anyhow::Context as _;
                use ::bincode::Options as _;

                let bincode_options = ::bincode::options()
                    .with_fixint_encoding()
                    .with_big_endian();

                bincode_options
                    .deserialize_from(&mut &data[..])
                    .context("Failed to deserialize key")
                    .map_err(Into::into)
            }
        }

        $crate::impl_borsh_value_codec!($table_name, $value);
    };
}
