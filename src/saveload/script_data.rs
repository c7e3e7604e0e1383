//! Decodes the Squirrel-like tagged script-data tail appended to rows of the
//! `special` chunks (`AIPL`/`GSDT`: AI and Game Script persistent data).
//!
//! Every value starts with a one-byte type tag:
//!
//! - 0: a raw `u64`
//! - 1: a length-prefixed byte string
//! - 2: an array of values, terminated by a `0xFF` tag
//! - 3: a table of key/value pairs, terminated by a `0xFF` tag
//! - 4: a `u8`
//! - 5: nothing (null)
//!
//! Arrays and tables are sentinel-terminated rather than length-prefixed:
//! after reading an element, the next tag is peeked, and only consumed if it
//! is the `0xFF` terminator. Otherwise it is left in place to be re-read as
//! the next element's own type tag.

use crate::wire::{read_bytes, read_uint8, read_uint64, WireError};

const SENTINEL: u8 = 0xFF;

/// One decoded script-data value. Only the shape is preserved; nested
/// contents beyond what is needed to stay byte-accurate are discarded, same
/// as the surrounding row fields (see `table.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ScriptValue {
    Integer(u64),
    Bytes(Vec<u8>),
    Array(Vec<ScriptValue>),
    Table(Vec<(ScriptValue, ScriptValue)>),
    Byte(u8),
    Null,
}

/// Reads one script-data value, dispatching on its leading type tag.
pub(super) fn read_script_data(data: &mut &[u8]) -> Result<ScriptValue, WireError> {
    let tag = read_uint8(data)?;
    read_script_value(tag, data)
}

fn read_script_value(tag: u8, data: &mut &[u8]) -> Result<ScriptValue, WireError> {
    match tag {
        0 => Ok(ScriptValue::Integer(read_uint64(data)?)),
        1 => {
            let length = read_uint8(data)?;
            let bytes = read_bytes(data, length as usize)?.to_vec();
            Ok(ScriptValue::Bytes(bytes))
        }
        2 => {
            let mut items = Vec::new();
            loop {
                let Some(&next) = data.first() else {
                    return Err(WireError::PacketTooShort);
                };
                if next == SENTINEL {
                    let _ = read_uint8(data)?;
                    break;
                }
                items.push(read_script_data(data)?);
            }
            Ok(ScriptValue::Array(items))
        }
        3 => {
            let mut entries = Vec::new();
            loop {
                let Some(&next) = data.first() else {
                    return Err(WireError::PacketTooShort);
                };
                if next == SENTINEL {
                    let _ = read_uint8(data)?;
                    break;
                }
                let key = read_script_data(data)?;
                let value = read_script_data(data)?;
                entries.push((key, value));
            }
            Ok(ScriptValue::Table(entries))
        }
        4 => Ok(ScriptValue::Byte(read_uint8(data)?)),
        5 => Ok(ScriptValue::Null),
        other => Err(WireError::UnhandledScriptFieldType(other)),
    }
}
