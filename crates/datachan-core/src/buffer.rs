use std::fmt;
use zeroize::Zeroize;

use crate::error::BufferError;

/// A fixed-capacity packet buffer with reserved headroom.
///
/// ## Mechanical Sympathy
/// The backing storage is sized once by the caller (headroom + payload +
/// tailroom). Framing on the packet path only moves the `start`/`end`
/// cursors, so `prepend`/`append` never reallocate. Running out of room is
/// an error, not a grow.
pub struct PacketBuf {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl PacketBuf {
    /// Creates an empty buffer of `capacity` bytes whose content starts after
    /// `headroom` bytes.
    pub fn new(headroom: usize, capacity: usize) -> Self {
        let headroom = headroom.min(capacity);
        Self {
            data: vec![0u8; capacity],
            start: headroom,
            end: headroom,
        }
    }

    /// Creates a buffer holding `payload` with the requested room on each side.
    pub fn with_payload(headroom: usize, payload: &[u8], tailroom: usize) -> Self {
        let mut buf = Self::new(headroom, headroom + payload.len() + tailroom);
        buf.data[headroom..headroom + payload.len()].copy_from_slice(payload);
        buf.end = headroom + payload.len();
        buf
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline(always)]
    pub fn headroom(&self) -> usize {
        self.start
    }

    #[inline(always)]
    pub fn tailroom(&self) -> usize {
        self.data.len() - self.end
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.start..self.end]
    }

    /// Grows the content by `n` bytes at the front and returns them.
    #[inline]
    pub fn prepend(&mut self, n: usize) -> Result<&mut [u8], BufferError> {
        if n > self.start {
            return Err(BufferError::HeadroomExhausted { needed: n, available: self.start });
        }
        self.start -= n;
        Ok(&mut self.data[self.start..self.start + n])
    }

    pub fn prepend_from(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.prepend(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Grows the content by `n` bytes at the back and returns them.
    #[inline]
    pub fn append(&mut self, n: usize) -> Result<&mut [u8], BufferError> {
        let available = self.tailroom();
        if n > available {
            return Err(BufferError::TailroomExhausted { needed: n, available });
        }
        let old_end = self.end;
        self.end += n;
        Ok(&mut self.data[old_end..self.end])
    }

    pub fn append_from(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.append(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Removes `n` bytes from the front of the content.
    #[inline]
    pub fn advance(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.len();
        if n > available {
            return Err(BufferError::Underflow { needed: n, available });
        }
        self.start += n;
        Ok(())
    }

    /// Removes `n` bytes from the back of the content.
    #[inline]
    pub fn truncate_back(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.len();
        if n > available {
            return Err(BufferError::Underflow { needed: n, available });
        }
        self.end -= n;
        Ok(())
    }

    /// Sets the content length, keeping the front cursor where it is.
    pub fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        let max = self.data.len() - self.start;
        if len > max {
            return Err(BufferError::TailroomExhausted { needed: len, available: max });
        }
        self.end = self.start + len;
        Ok(())
    }

    /// Content plus `extra` bytes of tailroom, for transforms that grow the
    /// payload in place (block padding).
    pub fn content_with_tailroom(&mut self, extra: usize) -> Result<&mut [u8], BufferError> {
        let available = self.tailroom();
        if extra > available {
            return Err(BufferError::TailroomExhausted { needed: extra, available });
        }
        Ok(&mut self.data[self.start..self.end + extra])
    }

    /// Drops the content and re-centres the cursors at `headroom`.
    pub fn reset(&mut self, headroom: usize) {
        let headroom = headroom.min(self.data.len());
        self.start = headroom;
        self.end = headroom;
    }
}

impl Drop for PacketBuf {
    fn drop(&mut self) {
        // Decrypted payloads must not outlive the buffer.
        self.data.zeroize();
    }
}

impl AsRef<[u8]> for PacketBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuf")
            .field("len", &self.len())
            .field("headroom", &self.headroom())
            .field("tailroom", &self.tailroom())
            .finish()
    }
}
