//! Frame-fed buffer: stages device frames and delimited text lines as
//! insert rows, and renders buffer rows back into frames.

use super::{ByteOrder, Frame, FrameLayout};
use crate::engine::DataBuffer;
use crate::error::Error;
use crate::types::Value;
use eyre::{ensure, Result};

/// A [`DataBuffer`] paired with its frame layout.
///
/// Ingestion is all-or-nothing: a frame or line is fully decoded before any
/// row is staged, so a malformed input leaves the buffer untouched.
pub struct FrameBuffer {
    db: DataBuffer,
    layout: FrameLayout,
    order: ByteOrder,
}

impl FrameBuffer {
    /// Wraps a buffer, deriving the frame layout from its schema.
    pub fn new(db: DataBuffer, order: ByteOrder) -> Result<FrameBuffer> {
        let layout = FrameLayout::new(db.schema())?;
        Ok(FrameBuffer { db, layout, order })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Frame size in bytes.
    pub fn frame_size(&self) -> usize {
        self.layout.size()
    }

    pub fn inner(&self) -> &DataBuffer {
        &self.db
    }

    pub fn inner_mut(&mut self) -> &mut DataBuffer {
        &mut self.db
    }

    pub fn into_inner(self) -> DataBuffer {
        self.db
    }

    /// Decodes one frame and stages it as an insert row. Returns the staged
    /// row's one-based number.
    pub fn put_frame(&mut self, bytes: &[u8]) -> Result<usize> {
        let frame = Frame::from_bytes(&self.layout, self.order, bytes)?;
        let values = frame.decode()?;
        Ok(self.stage(values))
    }

    /// Parses one separated text line, one field per frame column in layout
    /// order, and stages it as an insert row. Trailing extra fields are
    /// ignored. Returns the staged row's one-based number.
    pub fn put_line(&mut self, line: &str, sep: char) -> Result<usize> {
        let texts: Vec<&str> = line.split(sep).map(str::trim).collect();
        ensure!(
            texts.len() >= self.layout.fields().len(),
            "line has {} fields, frame layout needs {}",
            texts.len(),
            self.layout.fields().len()
        );
        let mut values = Vec::with_capacity(texts.len());
        for (field, text) in self.layout.fields().iter().zip(&texts) {
            let value = Value::parse_text(text, field.data_type)
                .map_err(|_| Error::conversion(field.column.clone(), *text))?;
            values.push(value);
        }
        Ok(self.stage(values))
    }

    /// Encodes the buffer's current row into a fresh frame image.
    pub fn frame_data(&self) -> Result<Vec<u8>> {
        let row = self
            .db
            .store()
            .current()
            .ok_or_else(|| eyre::eyre!("no current row to frame"))?;
        let mut frame = Frame::new(&self.layout, self.order);
        for (i, field) in self.layout.fields().iter().enumerate() {
            frame.set_value(i, &row[field.col_index])?;
        }
        Ok(frame.into_bytes())
    }

    /// Stages fully-decoded values as a new insert row.
    fn stage(&mut self, values: Vec<Value>) -> usize {
        let row = self.db.insert_row();
        for (field, value) in self.layout.fields().iter().zip(values) {
            // Row was just staged, the cursor is on it.
            self.db.store_set(field.col_index, value);
        }
        row
    }
}
