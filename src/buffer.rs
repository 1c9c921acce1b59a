use crate::error::{exhausted_by, Error, Result};

/// Round `hint` up to the smallest power of two that is at least `minimum`.
#[inline]
pub(crate) fn power_of_two_capacity(hint: usize, minimum: usize) -> Result<usize> {
    hint.max(minimum)
        .checked_next_power_of_two()
        .ok_or_else(|| Error::exhausted(hint))
}

/// A growable, owned byte buffer.
///
/// The buffer keeps a contiguous allocation whose capacity is always a power
/// of two. Growth doubles the capacity and never shrinks it, so appending is
/// amortized `O(1)` per byte. Failing allocations are reported as
/// [`ErrorKind::ResourceExhausted`](crate::ErrorKind::ResourceExhausted) and
/// leave the buffer untouched.
pub struct ByteBuffer {
    // NOTE: `data` is always initialized up to `data.len() == cap` so that
    // readers can be handed the unfilled tail directly.
    data: Vec<u8>,
    len: usize,
}

impl ByteBuffer {
    /// Allocate a new buffer whose capacity is the smallest power of two
    /// greater than or equal to `hint`, and at least 2.
    pub fn with_capacity(hint: usize) -> Result<Self> {
        let cap = power_of_two_capacity(hint, 2)?;

        let mut data = Vec::new();
        data.try_reserve_exact(cap).map_err(exhausted_by(cap))?;
        data.resize(cap, 0);

        Ok(Self { data, len: 0 })
    }

    /// Number of logical bytes held by the buffer.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the buffer holds no bytes.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current capacity of the buffer, always a power of two.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the logical bytes of the buffer.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Logically empty the buffer, without releasing its allocation.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Remove the last byte of the buffer, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }

        self.len -= 1;

        Some(self.data[self.len])
    }

    /// Grow the allocation so it can hold at least `needed` bytes, doubling
    /// the capacity as many times as required but reallocating only once.
    fn reserve_for(&mut self, needed: usize) -> Result<()> {
        let mut cap = self.capacity();

        if needed <= cap {
            return Ok(());
        }

        while cap < needed {
            cap = cap.checked_mul(2).ok_or_else(|| Error::exhausted(needed))?;
        }

        self.data
            .try_reserve_exact(cap - self.data.len())
            .map_err(exhausted_by(cap))?;
        self.data.resize(cap, 0);

        Ok(())
    }

    /// Double the capacity of the buffer.
    #[inline]
    pub(crate) fn grow(&mut self) -> Result<()> {
        let cap = self.capacity();
        self.reserve_for(cap + 1)
    }

    /// Append a single byte, doubling the capacity if the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len == self.capacity() {
            self.grow()?;
        }

        self.data[self.len] = byte;
        self.len += 1;

        Ok(())
    }

    /// Append a run of bytes.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self
            .len
            .checked_add(bytes.len())
            .ok_or_else(|| Error::exhausted(usize::MAX))?;

        self.reserve_for(needed)?;

        self.data[self.len..needed].copy_from_slice(bytes);
        self.len = needed;

        Ok(())
    }

    /// The not-yet-filled part of the allocation, to be written into by a
    /// reader and then committed using [`Self::advance`].
    #[inline(always)]
    pub(crate) fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Commit `amt` bytes written into [`Self::unfilled_mut`].
    #[inline(always)]
    pub(crate) fn advance(&mut self, amt: usize) {
        debug_assert!(self.len + amt <= self.capacity());
        self.len += amt;
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("bytes", &crate::debug::Bytes(self.as_slice()))
            .field("capacity", &self.capacity())
            .finish()
    }
}
