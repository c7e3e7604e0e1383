//! Table and SparseTable chunk shapes: a nested schema header followed by
//! rows decoded against that schema.

use std::collections::{HashMap, VecDeque};

use crate::wire::{read_bytes, read_gamma, read_uint16, read_uint32, read_uint64, read_uint8, WireError};

use super::script_data::read_script_data;

/// A decoded row: only type-10 (raw byte) fields survive decoding, keyed by
/// field name. Numeric fields are consumed off the wire but discarded, and
/// nested-struct fields are decoded (to stay byte-accurate) but their
/// contents are not retained either, matching upstream's row-dict shape.
pub type TableRow = HashMap<String, Vec<u8>>;

/// A struct's key path from the table root, e.g. `[]` for the root struct or
/// `["foo"]` for a nested struct reached through field `foo`.
type StructKey = Vec<String>;

/// One field in a struct definition: its wire type byte and name.
type FieldDef = (u8, String);

/// Parses a table header (struct definitions) and decodes rows against it.
///
/// Holds the full set of struct definitions discovered in the header,
/// keyed by path, plus whether script-data tails should be read after rows
/// (`special` chunks: `AIPL`/`GSDT`).
pub(super) struct TableReader {
    structs: HashMap<StructKey, Vec<FieldDef>>,
    special: bool,
}

impl TableReader {
    fn new() -> Self {
        Self {
            structs: HashMap::new(),
            special: false,
        }
    }

    /// Parses the table header: a gamma `header_size` followed by a queue of
    /// struct definitions starting at the empty-path root. Nested structs
    /// are inserted into the queue at the current position so sibling order
    /// in the encoded stream is preserved (see `spec.md` §9 "Nested struct
    /// queue").
    fn read_header(&mut self, data: &mut &[u8]) -> Result<(), WireError> {
        let header_size = read_gamma(data)?;
        let expected_remaining = data.len() as i64 - i64::from(header_size) + 1;

        let mut to_process: VecDeque<StructKey> = VecDeque::new();
        to_process.push_back(StructKey::new());

        while let Some(key) = to_process.pop_front() {
            let mut insert_at = 0usize;
            let mut fields = Vec::new();
            loop {
                let field_type = read_uint8(data)?;
                if field_type == 0 {
                    break;
                }
                let key_length = read_gamma(data)?;
                let key_raw = read_bytes(data, key_length as usize)?;
                let field_name = std::str::from_utf8(key_raw)
                    .map_err(|_| WireError::InvalidUtf8)?
                    .to_string();

                if field_type & 0xF == 11 {
                    let mut child = key.clone();
                    child.push(field_name.clone());
                    to_process.insert(insert_at, child);
                    insert_at += 1;
                }
                fields.push((field_type, field_name));
            }
            self.structs.insert(key, fields);
        }

        if (data.len() as i64) < expected_remaining {
            return Err(WireError::TableHeaderSizeMismatch {
                expected: expected_remaining.max(0) as usize,
                got: data.len(),
            });
        }
        Ok(())
    }

    /// Decodes one row of `row_size` bytes (inclusive of its own length
    /// prefix) against the root struct's fields.
    fn read_row(&self, row_size: u32, data: &mut &[u8]) -> Result<TableRow, WireError> {
        if row_size == 1 {
            return Ok(TableRow::new());
        }
        let expected_remaining = data.len() as i64 - i64::from(row_size) + 1;

        let row = self.read_row_struct(&StructKey::new(), data)?;

        if (data.len() as i64) != expected_remaining && self.special {
            let has_script_data = read_uint8(data)?;
            if has_script_data != 0 {
                read_script_data(data)?;
            }
        }

        if (data.len() as i64) != expected_remaining {
            return Err(WireError::TableRowSizeMismatch {
                expected: expected_remaining.max(0) as usize,
                got: data.len(),
            });
        }
        Ok(row)
    }

    fn read_row_struct(
        &self,
        struct_name: &StructKey,
        data: &mut &[u8],
    ) -> Result<TableRow, WireError> {
        let mut row = TableRow::new();
        let fields = self
            .structs
            .get(struct_name)
            .expect("struct header must have been parsed before its rows are read");

        for (field_type, key) in fields {
            let repeat = if field_type & 0x10 != 0 {
                read_gamma(data)?
            } else {
                1
            };

            let mut value: Option<Vec<u8>> = None;
            match field_type & 0xF {
                1 | 2 => {
                    for _ in 0..repeat {
                        read_uint8(data)?;
                    }
                }
                3 | 4 | 9 => {
                    for _ in 0..repeat {
                        read_uint16(data)?;
                    }
                }
                5 | 6 => {
                    for _ in 0..repeat {
                        read_uint32(data)?;
                    }
                }
                7 | 8 => {
                    for _ in 0..repeat {
                        read_uint64(data)?;
                    }
                }
                10 => {
                    value = Some(read_bytes(data, repeat as usize)?.to_vec());
                }
                11 => {
                    let mut child = struct_name.clone();
                    child.push(key.clone());
                    for _ in 0..repeat {
                        self.read_row_struct(&child, data)?;
                    }
                }
                other => return Err(WireError::UnhandledFieldType(other)),
            }

            if let Some(v) = value {
                row.insert(key.clone(), v);
            }
        }
        Ok(row)
    }
}

/// Decodes a Table chunk body: header then rows until a zero-length row
/// terminates the sequence.
pub(super) fn read_table(data: &mut &[u8], special: bool) -> Result<Vec<TableRow>, WireError> {
    let mut reader = TableReader::new();
    reader.read_header(data)?;
    reader.special = special;

    let mut rows = Vec::new();
    loop {
        let row_size = read_gamma(data)?;
        if row_size == 0 {
            break;
        }
        rows.push(reader.read_row(row_size, data)?);
    }
    Ok(rows)
}

/// Decodes a SparseTable chunk body: like [`read_table`], but each row is
/// preceded by a gamma index that becomes its key, and `row_size` counts the
/// index bytes plus the row body.
pub(super) fn read_sparse_table(data: &mut &[u8]) -> Result<HashMap<u32, TableRow>, WireError> {
    let mut reader = TableReader::new();
    reader.read_header(data)?;
    reader.special = false;

    let mut elements = HashMap::new();
    loop {
        let total_row_size = read_gamma(data)?;
        if total_row_size == 0 {
            break;
        }
        let before_index = data.len();
        let index = read_gamma(data)?;
        let index_bytes = before_index - data.len();
        let row_size = total_row_size - index_bytes as u32;
        let row = reader.read_row(row_size, data)?;
        elements.insert(index, row);
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::write_gamma;

    fn framed_header(fields: &[(u8, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (t, name) in fields {
            body.push(*t);
            write_gamma(&mut body, name.len() as u32);
            body.extend_from_slice(name.as_bytes());
        }
        body.push(0);
        let mut out = Vec::new();
        write_gamma(&mut out, body.len() as u32 + 1);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn nested_struct_preserves_parent_before_child_order() {
        // Root has one nested-struct field "child" (type 11) and one raw
        // field "tail" (type 10). The child struct has one raw field "leaf".
        let mut data = framed_header(&[(11, "child"), (10, "tail")]);
        // The child struct's own definition follows immediately in the same
        // header, per the spec's parent-before-child queue ordering.
        let child_def = {
            let mut body = Vec::new();
            body.push(10u8);
            write_gamma(&mut body, "leaf".len() as u32);
            body.extend_from_slice(b"leaf");
            body.push(0);
            body
        };
        // Splice the child definition into the still-open header body: undo
        // the outer framing, append, and re-frame.
        let header_size = {
            let mut reread = data.as_slice();
            read_gamma(&mut reread).unwrap()
        };
        let prefix_len = data.len() - (header_size as usize - 1);
        let mut full_body = data.split_off(prefix_len);
        full_body.extend_from_slice(&child_def);
        let mut out = Vec::new();
        write_gamma(&mut out, full_body.len() as u32 + 1);
        out.extend_from_slice(&full_body);

        let mut reader = TableReader::new();
        let mut slice = out.as_slice();
        reader.read_header(&mut slice).unwrap();
        assert!(reader.structs.contains_key(&StructKey::new()));
        assert!(reader.structs.contains_key(&vec!["child".to_string()]));
    }

    #[test]
    fn row_with_raw_field_round_trips() {
        let header = framed_header(&[(10, "name")]);
        let mut data = header;
        let mut row = Vec::new();
        write_gamma(&mut row, 3);
        row.extend_from_slice(b"Acy");
        write_gamma(&mut data, row.len() as u32 + 1);
        data.extend_from_slice(&row);
        write_gamma(&mut data, 0);

        let mut slice = data.as_slice();
        let rows = read_table(&mut slice, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&b"Acy".to_vec()));
        assert!(slice.is_empty());
    }

    #[test]
    fn empty_row_has_no_allocated_fields() {
        let mut data = framed_header(&[(10, "name")]);
        write_gamma(&mut data, 1); // row_size == 1: empty row
        write_gamma(&mut data, 0);
        let mut slice = data.as_slice();
        let rows = read_table(&mut slice, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
    }

    #[test]
    fn sparse_table_indices_become_keys() {
        let header = framed_header(&[(10, "name")]);
        let mut data = header;

        // One sparse row at index 5: a gamma index followed by the row body
        // (repeat count + raw bytes). `row_size` counts only the row body
        // (inclusive of its own length prefix, like a normal table row);
        // `total_row_size` adds the index's own encoded length on top.
        let mut index_bytes = Vec::new();
        write_gamma(&mut index_bytes, 5);

        let mut row_body = Vec::new();
        write_gamma(&mut row_body, 2);
        row_body.extend_from_slice(b"Hi");
        let row_size = row_body.len() as u32 + 1;

        let total_row_size = index_bytes.len() as u32 + row_size;

        write_gamma(&mut data, total_row_size);
        data.extend_from_slice(&index_bytes);
        data.extend_from_slice(&row_body);
        write_gamma(&mut data, 0);

        let mut slice = data.as_slice();
        let elements = read_sparse_table(&mut slice).unwrap();
        assert_eq!(elements.get(&5).and_then(|r| r.get("name")), Some(&b"Hi".to_vec()));
    }
}
