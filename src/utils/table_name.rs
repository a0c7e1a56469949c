//! User-facing table names
//!
//! Variant tables can be given arbitrary names on the command line
//! (`"my selection"`, `"a-b"`). Names that are already plain SQL identifiers
//! are used as-is; everything else is encoded into an identifier so it can be
//! spliced into statements, and decoded again for messages.
//!
//! Encoded form: `_E_` followed by the name with every byte that is not an
//! ASCII letter or digit written as `_XX` (uppercase hex).

const ENCODED_PREFIX: &str = "_E_";

fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with(ENCODED_PREFIX)
}

pub fn encode_table_name(name: &str) -> String {
    if is_plain(name) {
        return name.to_string();
    }
    let mut encoded = String::from(ENCODED_PREFIX);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of [`encode_table_name`]. Names that were never encoded are returned unchanged.
pub fn decode_table_name(name: &str) -> String {
    let Some(body) = name.strip_prefix(ENCODED_PREFIX) else {
        return name.to_string();
    };
    let bytes = body.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'_' && idx + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[idx + 1..idx + 3]).unwrap_or("");
            match u8::from_str_radix(hex, 16) {
                Ok(b) => {
                    decoded.push(b);
                    idx += 3;
                    continue;
                }
                Err(_) => return name.to_string(),
            }
        }
        decoded.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8(decoded).unwrap_or_else(|_| name.to_string())
}

/// Display form of `backup`, a backup of `table` (`_<table>_backup[_N]`):
/// the base name is decoded and the backup suffix kept.
pub fn decode_backup_name(table: &str, backup: &str) -> String {
    match backup.strip_prefix('_').and_then(|rest| rest.strip_prefix(table)) {
        Some(suffix) => format!("_{}{}", decode_table_name(table), suffix),
        None => decode_table_name(backup),
    }
}
