//! On-disk page layout.
//!
//! A heap page is a fixed-size block laid out as
//!
//! ```text
//! [ occupancy bitmap: header_len(slots) bytes ][ slot 0 ][ slot 1 ] ... [ slot n-1 ][ padding ]
//! ```
//!
//! Bit `i` of the bitmap lives in byte `i / 8` at bit position `i % 8` (least significant bit
//! first) and is set iff slot `i` holds a live row. Every slot is exactly one row wide. Ints are
//! stored as 4 big-endian bytes. Strings are a 4 byte big-endian length followed by
//! [`STRING_LEN`] payload bytes, zero padded.
//!
//! Deleting a row only clears its bit. The slot keeps its stale bytes so a page serializes back
//! to exactly the bytes it was read from.

use std::{fmt::Display, sync::Arc};

use crate::{
    error::{DbError, DbResult},
    row::{RecordId, Row},
    transaction::TransactionId,
    types::{Field, FieldType, Schema, INT_BYTES, STRING_LEN},
};

pub type TableId = u32;

/// The page id container that names a specific page number of a specific table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// Number of row slots that fit on a page: every slot costs its row bytes plus one bitmap bit.
pub fn slots_per_page(page_size: usize, row_width: usize) -> usize {
    if row_width == 0 {
        return 0;
    }
    (page_size * 8) / (row_width * 8 + 1)
}

/// Bytes taken by the occupancy bitmap for `slots` slots
pub fn header_len(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// The raw contents of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page {
    pub contents: Vec<u8>,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        Self {
            contents: vec![0; page_size],
        }
    }

    /// Create a new page from the given bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { contents: bytes }
    }

    /// Get an integer from the page at the given offset
    pub fn get_int(&self, offset: usize) -> i32 {
        let mut bytes = [0u8; INT_BYTES];
        bytes.copy_from_slice(&self.contents[offset..offset + INT_BYTES]);
        i32::from_be_bytes(bytes)
    }

    /// Set an integer at the given offset
    pub fn set_int(&mut self, offset: usize, n: i32) {
        self.contents[offset..offset + INT_BYTES].copy_from_slice(&n.to_be_bytes());
    }

    /// Get a fixed-width string at the given offset. Read the length and then the bytes.
    ///
    /// A corrupt length is clamped to the reserved width and invalid UTF-8 is replaced rather
    /// than rejected.
    pub fn get_string(&self, offset: usize) -> String {
        let length = (self.get_int(offset).max(0) as usize).min(STRING_LEN);
        let start = offset + INT_BYTES;
        String::from_utf8_lossy(&self.contents[start..start + length]).into_owned()
    }

    /// Set a fixed-width string at the given offset. Write the length and then the bytes, zero
    /// filling the rest of the reserved width.
    pub fn set_string(&mut self, offset: usize, string: &str) {
        let bytes = truncate_to_char_boundary(string, STRING_LEN).as_bytes();
        self.set_int(offset, bytes.len() as i32);
        let start = offset + INT_BYTES;
        self.contents[start..start + bytes.len()].copy_from_slice(bytes);
        self.contents[start + bytes.len()..start + STRING_LEN].fill(0);
    }

    pub fn get_field(&self, offset: usize, field_type: FieldType) -> Field {
        match field_type {
            FieldType::Int => Field::Int(self.get_int(offset)),
            FieldType::String => Field::String(self.get_string(offset)),
        }
    }

    pub fn set_field(&mut self, offset: usize, field: &Field) {
        match field {
            Field::Int(n) => self.set_int(offset, *n),
            Field::String(s) => self.set_string(offset, s),
        }
    }
}

fn truncate_strings(row: &mut Row) -> DbResult<()> {
    for index in 0..row.fields().len() {
        let shortened = match row.field(index) {
            Some(Field::String(s)) if s.len() > STRING_LEN => {
                truncate_to_char_boundary(s, STRING_LEN).to_string()
            }
            _ => continue,
        };
        row.set_field(index, Field::String(shortened))?;
    }
    Ok(())
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One page of a heap file, decoded enough to address its slots.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    schema: Arc<Schema>,
    num_slots: usize,
    header_len: usize,
    page: Page,
    dirty: bool,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Wrap `bytes` read from disk as the page `pid` of a table with `schema`
    pub fn new(
        pid: PageId,
        schema: Arc<Schema>,
        bytes: Vec<u8>,
        page_size: usize,
    ) -> DbResult<Self> {
        if bytes.len() != page_size {
            return Err(DbError::schema_mismatch(format!(
                "page {pid} has {} bytes, expected {page_size}",
                bytes.len()
            )));
        }
        let row_width = schema.row_width();
        let num_slots = slots_per_page(page_size, row_width);
        if num_slots == 0 {
            return Err(DbError::schema_mismatch(format!(
                "rows of {row_width} bytes do not fit on a {page_size} byte page"
            )));
        }
        Ok(Self {
            pid,
            schema,
            num_slots,
            header_len: header_len(num_slots),
            page: Page::from_bytes(bytes),
            dirty: false,
            dirtied_by: None,
        })
    }

    /// A page with every slot free
    pub fn empty(pid: PageId, schema: Arc<Schema>, page_size: usize) -> DbResult<Self> {
        Self::new(pid, schema, Page::new(page_size).contents, page_size)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        if slot >= self.num_slots {
            return false;
        }
        (self.page.contents[slot / 8] >> (slot % 8)) & 1 == 1
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.page.contents[slot / 8] |= mask;
        } else {
            self.page.contents[slot / 8] &= !mask;
        }
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.header_len + slot * self.schema.row_width()
    }

    /// The live row in `slot`, tagged with its location
    pub fn row(&self, slot: usize) -> DbResult<Option<Row>> {
        if !self.is_slot_used(slot) {
            return Ok(None);
        }
        let mut offset = self.slot_offset(slot);
        let mut fields = Vec::with_capacity(self.schema.num_fields());
        for desc in self.schema.fields() {
            fields.push(self.page.get_field(offset, desc.field_type));
            offset += desc.field_type.byte_len();
        }
        let mut row = Row::new(Arc::clone(&self.schema), fields)?;
        row.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(Some(row))
    }

    /// Every live row in ascending slot order
    pub fn rows(&self) -> DbResult<Vec<Row>> {
        let mut rows = Vec::new();
        for slot in 0..self.num_slots {
            if let Some(row) = self.row(slot)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Store `row` in the first free slot and tag it with its new location. String fields longer
    /// than [`STRING_LEN`] bytes are shortened in `row` to exactly what the page keeps.
    pub fn insert_row(&mut self, row: &mut Row) -> DbResult<RecordId> {
        if !row.schema().same_types(&self.schema) {
            return Err(DbError::schema_mismatch(format!(
                "cannot insert a row of ({}) into a page of ({})",
                row.schema(),
                self.schema
            )));
        }
        let slot = (0..self.num_slots)
            .find(|&i| !self.is_slot_used(i))
            .ok_or_else(|| DbError::not_found(format!("free slot on page {}", self.pid)))?;

        truncate_strings(row)?;
        let mut offset = self.slot_offset(slot);
        for field in row.fields() {
            self.page.set_field(offset, field);
            offset += field.field_type().byte_len();
        }
        self.set_slot_used(slot, true);

        let record_id = RecordId::new(self.pid, slot);
        row.set_record_id(Some(record_id));
        Ok(record_id)
    }

    /// Free the slot named by the row's location tag
    pub fn delete_row(&mut self, row: &Row) -> DbResult<()> {
        let record_id = row
            .record_id()
            .ok_or_else(|| DbError::not_found("record id on row"))?;
        if record_id.page_id != self.pid {
            return Err(DbError::not_found(format!(
                "row {record_id} on page {}",
                self.pid
            )));
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(DbError::not_found(format!("live row at {record_id}")));
        }
        self.set_slot_used(record_id.slot, false);
        Ok(())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: Option<TransactionId>) {
        self.dirty = dirty;
        self.dirtied_by = if dirty { tid } else { None };
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The transaction that last dirtied this page, if it is dirty
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    /// The page serialized exactly as it goes to disk
    pub fn page_data(&self) -> &[u8] {
        &self.page.contents
    }
}
