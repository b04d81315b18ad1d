//! Growable byte buffer.

use classbind_core::{CallError, RegistrationError};
use classbind_registry::{Owned, Shared, TypeRegistry};

/// Largest buffer a script can grow.
pub const MAX_LEN: usize = 1 << 26;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, CallError> {
        let mut buffer = Self::new();
        buffer.reserve(capacity)?;
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    pub fn push_repeated(&mut self, byte: u8, count: usize) -> Result<(), CallError> {
        self.reserve(count)?;
        self.data.resize(self.data.len() + count, byte);
        Ok(())
    }

    /// Make room for `additional` more bytes, within [`MAX_LEN`].
    fn reserve(&mut self, additional: usize) -> Result<(), CallError> {
        let total = self
            .data
            .len()
            .checked_add(additional)
            .filter(|total| *total <= MAX_LEN)
            .ok_or_else(|| {
                CallError::native(format!(
                    "buffer of length {} cannot grow by {additional} bytes (limit {MAX_LEN})",
                    self.data.len()
                ))
            })?;
        self.data
            .try_reserve(total - self.data.len())
            .map_err(|err| CallError::native(err.to_string()))
    }

    pub fn write_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    pub fn get(&self, index: usize) -> Result<u8, CallError> {
        self.data.get(index).copied().ok_or_else(|| {
            CallError::native(format!(
                "index {index} out of range for buffer of length {}",
                self.data.len()
            ))
        })
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Contents as text, replacing invalid UTF-8.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Register `ByteBuffer`.
pub fn register(registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
    registry
        .define_type::<ByteBuffer>("ByteBuffer")?
        .ctor(ByteBuffer::new)?
        .ctor(ByteBuffer::with_capacity)?
        .property_get("length", ByteBuffer::len)
        .overload("push", ByteBuffer::push)?
        .overload("push", ByteBuffer::push_repeated)?
        .method("write", |b: &mut ByteBuffer, s: String| b.write_str(&s))
        .method("get", ByteBuffer::get)
        .method("clear", ByteBuffer::clear)
        .method("text", ByteBuffer::to_text)
        .static_method(
            "concat",
            |a: Shared<ByteBuffer>, b: Shared<ByteBuffer>| {
                let mut joined = a.borrow().clone();
                joined.data.extend_from_slice(b.borrow().as_bytes());
                Owned(joined)
            },
        )
        .copyable();
    Ok(())
}
