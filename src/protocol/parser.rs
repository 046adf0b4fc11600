//! Hand-written response line tokenizers
//!
//! Each parser accepts exactly one grammar and returns a typed error on any
//! mismatch, carrying the offending line.

use crate::ProtocolError;
use crate::protocol::types::{Key, Stat};

/// Parsed `VALUE <key> <flags> <bytes> [<cas>]` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHeader<'a> {
    pub key: &'a str,
    pub flags: u32,
    pub length: usize,
}

/// Parse the header line of a `get` response
pub fn parse_value_header(line: &str) -> Result<ValueHeader<'_>, ProtocolError> {
    let malformed = || ProtocolError::MalformedValue(line.to_string());

    let mut parts = line.split(' ');
    if parts.next() != Some("VALUE") {
        return Err(malformed());
    }

    let key = match parts.next() {
        Some(k) if !k.is_empty() => k,
        _ => return Err(malformed()),
    };

    let flags = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;

    let length = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;

    // Optional cas unique (gets); nothing may follow it
    if let Some(cas) = parts.next()
        && cas.parse::<u64>().is_err()
    {
        return Err(malformed());
    }
    if parts.next().is_some() {
        return Err(malformed());
    }

    Ok(ValueHeader { key, flags, length })
}

/// Parse a `STAT <name> <value>` line, splitting on the first two spaces
pub fn parse_stat(line: &str) -> Result<Stat, ProtocolError> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("STAT"), Some(name), Some(value)) if !name.is_empty() => Ok(Stat::new(name, value)),
        _ => Err(ProtocolError::MalformedStat(line.to_string())),
    }
}

/// Parse a `stats items` line into `(slab_id, item_count)`.
///
/// Only `STAT items:<slab>:number <count>` lines yield a value; every other
/// slab statistic is `Ok(None)`.
pub fn parse_slab_count(line: &str) -> Result<Option<(u32, u64)>, ProtocolError> {
    let malformed = || ProtocolError::MalformedSlabStat(line.to_string());

    let stat = parse_stat(line).map_err(|_| malformed())?;

    let mut name = stat.name.split(':');
    if name.next() != Some("items") {
        return Ok(None);
    }
    let (Some(slab_id), Some(field), None) = (name.next(), name.next(), name.next()) else {
        return Err(malformed());
    };
    if field != "number" {
        return Ok(None);
    }

    let slab_id = slab_id.parse().map_err(|_| malformed())?;
    let count = stat.value.trim().parse().map_err(|_| malformed())?;
    Ok(Some((slab_id, count)))
}

/// Parse an `ITEM <name> [<bytes> b; <expiry> s]` cachedump line
///
/// `<expiry>` is taken as reported. Servers that print 0 for items without
/// expiration yield 0; older 1.4.x releases that print the process start
/// time for them yield that timestamp, which cannot be told apart from a
/// real expiry.
pub fn parse_cachedump_item(line: &str) -> Result<Key, ProtocolError> {
    let malformed = || ProtocolError::MalformedItem(line.to_string());

    let rest = line.strip_prefix("ITEM").ok_or_else(malformed)?;
    if !rest.starts_with(char::is_whitespace) {
        return Err(malformed());
    }
    let rest = rest.trim_start();

    let split = rest.find(char::is_whitespace).ok_or_else(malformed)?;
    let (name, meta) = rest.split_at(split);
    let name = name.trim();

    let meta = meta
        .trim()
        .strip_prefix('[')
        .and_then(|m| m.strip_suffix(']'))
        .ok_or_else(malformed)?;

    let (size, expiry) = meta.split_once(';').ok_or_else(malformed)?;
    parse_suffixed(size, "b").ok_or_else(malformed)?;
    let expiry = parse_suffixed(expiry, "s").ok_or_else(malformed)?;

    if name.is_empty() {
        return Err(malformed());
    }

    Ok(Key {
        original: line.to_string(),
        name: name.to_string(),
        expiry,
    })
}

/// Parse `<number> <unit>` with arbitrary surrounding whitespace
fn parse_suffixed(field: &str, unit: &str) -> Option<u64> {
    let number = field.trim().strip_suffix(unit)?;
    number.trim_end().parse().ok()
}
