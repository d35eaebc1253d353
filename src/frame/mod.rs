//! # Fixed-Width Frame Codec
//!
//! Frames carry one row's updatable columns as a fixed-width byte image for
//! non-relational transport. The layout is derived from the compiled schema:
//! fields sit at precomputed offsets, in updatable-column declaration order.
//!
//! ## Field Widths
//!
//! | Column type | Field width | Encoding |
//! |-------------|-------------|----------|
//! | BYTE / BOOLEAN | 1 | two's complement / 0 or 1 |
//! | SHORT | 2 | integer, frame byte order |
//! | INT / FLOAT | 4 | integer / IEEE-754 bits |
//! | LONG / DOUBLE | 8 | integer / IEEE-754 bits |
//! | TIMESTAMP | 8 | millis since epoch |
//! | HEX / ASCII | declared limit | raw bytes, zero-padded |
//!
//! Plain STRING columns have no decidable width and make layout derivation
//! fail; schemas meant for framing declare HEX or ASCII with a limit.
//!
//! Short string values are zero-padded to the field width; values longer
//! than the field are rejected with [`Error::FrameOverflow`] rather than
//! truncated. Null encodes as an all-zero field.

mod buffer;

pub use buffer::FrameBuffer;

use crate::error::Error;
use crate::schema::CompiledSchema;
use crate::types::{DataType, Value};
use eyre::{bail, ensure, Result};

/// Byte order of multi-byte frame fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// One field of a frame: a column's slot in the byte image.
#[derive(Debug, Clone)]
pub struct FrameField {
    pub column: String,
    /// Column position in the schema's result row.
    pub col_index: usize,
    pub data_type: DataType,
    pub offset: usize,
    pub length: usize,
}

/// Precomputed frame geometry for one schema.
#[derive(Debug, Clone)]
pub struct FrameLayout {
    fields: Vec<FrameField>,
    size: usize,
}

impl FrameLayout {
    /// Derives the layout from a schema's updatable columns, in declaration
    /// order. Fails when any of them lacks a fixed width.
    pub fn new(schema: &CompiledSchema) -> Result<FrameLayout> {
        let columns = schema.columns();
        ensure!(
            !schema.updatable().is_empty(),
            "schema {} has no updatable columns to frame",
            schema.name()
        );
        let mut fields = Vec::with_capacity(schema.updatable().len());
        let mut offset = 0;
        for &i in schema.updatable() {
            let col = &columns[i];
            let length = col.data_type.frame_width(&col.name, col.limit)?;
            fields.push(FrameField {
                column: col.name.clone(),
                col_index: i,
                data_type: col.data_type,
                offset,
                length,
            });
            offset += length;
        }
        Ok(FrameLayout {
            fields,
            size: offset,
        })
    }

    /// Total frame size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[FrameField] {
        &self.fields
    }

    pub fn field(&self, column: &str) -> Option<&FrameField> {
        self.fields.iter().find(|f| f.column == column)
    }
}

/// One frame image plus the layout and byte order to interpret it.
pub struct Frame<'a> {
    layout: &'a FrameLayout,
    order: ByteOrder,
    buf: Vec<u8>,
}

impl<'a> Frame<'a> {
    /// An all-zero frame.
    pub fn new(layout: &'a FrameLayout, order: ByteOrder) -> Frame<'a> {
        Frame {
            layout,
            order,
            buf: vec![0; layout.size()],
        }
    }

    /// Wraps received bytes. Short input is zero-padded to the frame size;
    /// input longer than the frame is rejected.
    pub fn from_bytes(layout: &'a FrameLayout, order: ByteOrder, bytes: &[u8]) -> Result<Frame<'a>> {
        ensure!(
            bytes.len() <= layout.size(),
            "frame of {} bytes exceeds layout size {}",
            bytes.len(),
            layout.size()
        );
        let mut buf = vec![0; layout.size()];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Frame { layout, order, buf })
    }

    pub fn layout(&self) -> &FrameLayout {
        self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Decodes the field at `idx` into a runtime value. String fields come
    /// back as uppercase hex text or NUL-trimmed ascii text.
    pub fn value(&self, idx: usize) -> Result<Value> {
        let field = self.field(idx)?;
        let raw = &self.buf[field.offset..field.offset + field.length];
        let value = match field.data_type {
            DataType::Hex => Value::String(hex::encode_upper(raw)),
            DataType::Ascii => {
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                Value::String(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
            DataType::Byte => Value::Byte(raw[0] as i8),
            DataType::Boolean => Value::Bool(raw[0] != 0),
            DataType::Short => Value::Short(self.read_int::<2>(raw) as i16),
            DataType::Int => Value::Int(self.read_int::<4>(raw) as i32),
            DataType::Long => Value::Long(self.read_int::<8>(raw)),
            DataType::Timestamp => Value::Timestamp(self.read_int::<8>(raw)),
            DataType::Float => Value::Float(f32::from_bits(self.read_int::<4>(raw) as u32)),
            DataType::Double => Value::Double(f64::from_bits(self.read_int::<8>(raw) as u64)),
            DataType::String => bail!("{}: STRING field in a frame layout", field.column),
        };
        Ok(value)
    }

    /// Encodes a runtime value into the field at `idx`. Null zero-fills the
    /// field. The value's variant must match the field's type.
    pub fn set_value(&mut self, idx: usize, value: &Value) -> Result<()> {
        let field = self.field(idx)?.clone();
        if value.is_null() {
            self.buf[field.offset..field.offset + field.length].fill(0);
            return Ok(());
        }
        match (field.data_type, value) {
            (DataType::Hex, Value::String(s)) => return self.set_hex(idx, s),
            (DataType::Ascii, Value::String(s)) => return self.set_ascii(idx, s),
            (DataType::Byte, Value::Byte(v)) => self.write_int::<1>(&field, *v as i64),
            (DataType::Boolean, Value::Bool(v)) => self.write_int::<1>(&field, *v as i64),
            (DataType::Short, Value::Short(v)) => self.write_int::<2>(&field, *v as i64),
            (DataType::Int, Value::Int(v)) => self.write_int::<4>(&field, *v as i64),
            (DataType::Long, Value::Long(v)) => self.write_int::<8>(&field, *v),
            (DataType::Timestamp, Value::Timestamp(v)) => self.write_int::<8>(&field, *v),
            (DataType::Float, Value::Float(v)) => {
                self.write_int::<4>(&field, v.to_bits() as i64)
            }
            (DataType::Double, Value::Double(v)) => {
                self.write_int::<8>(&field, v.to_bits() as i64)
            }
            (ty, other) => bail!("{}: cannot encode {other:?} as {ty:?}", field.column),
        }
        Ok(())
    }

    /// Writes hex text into a HEX field, zero-padded. Text decoding to more
    /// bytes than the field holds is an overflow, not a truncation.
    pub fn set_hex(&mut self, idx: usize, text: &str) -> Result<()> {
        let field = self.field(idx)?.clone();
        let bytes = hex::decode(text)
            .map_err(|_| Error::conversion(field.column.clone(), text))?;
        self.write_padded(&field, idx, &bytes)
    }

    /// Writes ascii text into an ASCII field, zero-padded.
    pub fn set_ascii(&mut self, idx: usize, text: &str) -> Result<()> {
        let field = self.field(idx)?.clone();
        self.write_padded(&field, idx, text.as_bytes())
    }

    /// Decodes every field, in layout order.
    pub fn decode(&self) -> Result<Vec<Value>> {
        (0..self.layout.fields.len()).map(|i| self.value(i)).collect()
    }

    /// Encodes one value per field, in layout order.
    pub fn encode(&mut self, values: &[Value]) -> Result<()> {
        ensure!(
            values.len() == self.layout.fields.len(),
            "{} values for a {}-field frame",
            values.len(),
            self.layout.fields.len()
        );
        for (i, value) in values.iter().enumerate() {
            self.set_value(i, value)?;
        }
        Ok(())
    }

    fn field(&self, idx: usize) -> Result<&FrameField> {
        self.layout
            .fields
            .get(idx)
            .ok_or_else(|| eyre::eyre!("frame field {idx} out of range"))
    }

    fn read_int<const N: usize>(&self, raw: &[u8]) -> i64 {
        let mut b = [0u8; 8];
        match self.order {
            ByteOrder::Big => b[8 - N..].copy_from_slice(&raw[..N]),
            ByteOrder::Little => b[..N].copy_from_slice(&raw[..N]),
        }
        let v = match self.order {
            ByteOrder::Big => u64::from_be_bytes(b),
            ByteOrder::Little => u64::from_le_bytes(b),
        };
        // Sign-extend from the field width.
        let shift = 64 - (N as u32 * 8);
        ((v << shift) as i64) >> shift
    }

    fn write_int<const N: usize>(&mut self, field: &FrameField, value: i64) {
        let bytes = match self.order {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        };
        let src = match self.order {
            ByteOrder::Big => &bytes[8 - N..],
            ByteOrder::Little => &bytes[..N],
        };
        self.buf[field.offset..field.offset + N].copy_from_slice(src);
    }

    fn write_padded(&mut self, field: &FrameField, idx: usize, bytes: &[u8]) -> Result<()> {
        if bytes.len() > field.length {
            return Err(Error::frame_overflow(idx, field.length, bytes.len()));
        }
        let slot = &mut self.buf[field.offset..field.offset + field.length];
        slot.fill(0);
        slot[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
