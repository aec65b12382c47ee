use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{HeapDbError, HeapPageId, PageId, RecordId, Result, TransactionId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// ```text
/// +------------------+
/// | Header Bitmap    |  ceil(num_slots / 8) bytes
/// +------------------+
/// | [slot 0]         |  tuple_size bytes each
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// | Zero Padding     |
/// +------------------+
/// ```
///
/// `num_slots = floor(page_size * 8 / (tuple_size * 8 + 1))`: each slot costs
/// its tuple bytes plus one header bit. Bit `i % 8` of header byte `i / 8`
/// (least significant bit first) is set when slot `i` holds a tuple.
#[derive(Debug, Clone)]
pub struct HeapPage {
    id: HeapPageId,
    schema: Arc<Schema>,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
}

/// Returns the number of tuple slots a page of `page_size` bytes holds.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Returns the zeroed image of a page with no tuples.
pub fn empty_page_data(page_size: usize) -> Vec<u8> {
    vec![0u8; page_size]
}

impl HeapPage {
    /// Parses a page image. Each stored tuple gets its record id.
    pub fn new(id: HeapPageId, data: &[u8], schema: Arc<Schema>) -> Result<Self> {
        let page_size = data.len();
        let tuple_size = schema.byte_size();
        let num_slots = slots_per_page(page_size, tuple_size);
        if num_slots == 0 {
            return Err(HeapDbError::InvalidSchema(format!(
                "tuples of {} bytes do not fit in a {} byte page",
                tuple_size, page_size
            )));
        }

        let header_size = num_slots.div_ceil(8);
        let header = data[..header_size].to_vec();

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                tuples.push(None);
                continue;
            }

            let start = header_size + slot * tuple_size;
            let mut tuple = Tuple::from_bytes(schema.clone(), &data[start..start + tuple_size])?;
            tuple.set_record_id(Some(RecordId::new(id, slot)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            id,
            schema,
            page_size,
            header,
            tuples,
            dirtied_by: None,
        })
    }

    /// Creates a page with every slot free.
    pub fn empty(id: HeapPageId, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        Self::new(id, &empty_page_data(page_size), schema)
    }

    pub fn id(&self) -> HeapPageId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the total number of tuple slots.
    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    /// Returns the size of the occupancy bitmap in bytes.
    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Returns the number of free slots.
    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// Returns whether the slot holds a tuple. Out-of-range slots are free.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Stores the tuple in the first free slot and assigns its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<usize> {
        if **tuple.schema() != *self.schema {
            return Err(HeapDbError::Db(format!(
                "tuple schema [{}] does not match page schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        let slot = (0..self.num_slots())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(HeapDbError::PageFull(PageId::Heap(self.id)))?;

        // Validate the image before touching the page
        tuple.to_bytes()?;

        let record_id = RecordId::new(self.id, slot);
        tuple.set_record_id(Some(record_id));

        let mut stored = tuple.clone();
        stored.reset_schema(self.schema.clone());
        self.tuples[slot] = Some(stored);
        self.mark_slot_used(slot, true);

        Ok(slot)
    }

    /// Frees the slot.
    pub fn delete_slot(&mut self, slot: usize) -> Result<()> {
        if slot >= self.num_slots() {
            return Err(HeapDbError::IndexOutOfRange {
                index: slot,
                len: self.num_slots(),
            });
        }
        if !self.is_slot_used(slot) {
            return Err(HeapDbError::Db(format!(
                "slot {} of {} is already empty",
                slot, self.id
            )));
        }

        self.tuples[slot] = None;
        self.mark_slot_used(slot, false);
        Ok(())
    }

    /// Returns the tuple in the slot, if any.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(Option::as_ref)
    }

    /// Returns an iterator over stored tuples in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn serialize(&self) -> Result<Bytes> {
        let tuple_size = self.schema.byte_size();
        let mut buf = BytesMut::with_capacity(self.page_size);
        buf.put_slice(&self.header);

        for tuple in &self.tuples {
            match tuple {
                Some(tuple) => tuple.encode_into(&mut buf)?,
                None => buf.put_bytes(0, tuple_size),
            }
        }

        buf.put_bytes(0, self.page_size - buf.len());
        Ok(buf.freeze())
    }

    /// Marks or clears the dirty flag, recording the transaction responsible.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = if dirty { Some(tid) } else { None };
    }

    /// Returns the transaction that last dirtied the page, or None if clean.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }
}
