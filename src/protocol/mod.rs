//! Memcached ASCII protocol: request builders, response tokenizers, records

pub mod command;
pub mod parser;
pub mod types;

pub use command::{CommandWriter, MAX_KEY_LENGTH, is_valid_key, validate_key};
pub use parser::{
    ValueHeader, parse_cachedump_item, parse_slab_count, parse_stat, parse_value_header,
};
pub use types::{Key, KeyValue, Stat};
