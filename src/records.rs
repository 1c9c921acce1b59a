use std::fmt;
use std::ops::Index;

use crate::buffer::power_of_two_capacity;
use crate::classify::FieldType;
use crate::debug;
use crate::error::{exhausted_by, Error, Result};

/// An owned CSV record, i.e. a growable array of independently owned fields.
///
/// The field array capacity is a power of two and grows by doubling. Clearing
/// a record releases its fields but keeps the array, so a single record can be
/// reused for every row of a stream.
pub struct Record {
    fields: Vec<Box<[u8]>>,
    cap: usize,
}

// The field array of a clone must be able to hold `cap` fields, since
// `push_field` only reserves when the record is full.
impl Clone for Record {
    fn clone(&self) -> Self {
        let mut fields = Vec::with_capacity(self.cap);
        fields.extend(self.fields.iter().cloned());

        Self {
            fields,
            cap: self.cap,
        }
    }
}

fn duplicate(bytes: &[u8]) -> Result<Box<[u8]>> {
    let mut owned = Vec::new();

    owned
        .try_reserve_exact(bytes.len())
        .map_err(exhausted_by(bytes.len()))?;
    owned.extend_from_slice(bytes);

    Ok(owned.into_boxed_slice())
}

impl Record {
    /// Create an empty record that does not allocate until a field is pushed.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            cap: 0,
        }
    }

    /// Create an empty record able to hold the smallest power of two greater
    /// than or equal to `hint` fields without reallocating.
    pub fn with_capacity(hint: usize) -> Result<Self> {
        let cap = power_of_two_capacity(hint, 1)?;

        let mut fields = Vec::new();
        fields.try_reserve_exact(cap).map_err(exhausted_by(cap))?;

        Ok(Self { fields, cap })
    }

    /// Number of fields of the record.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields the record can hold before growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Release every field, keeping the field array for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Append an owned copy of `bytes` as a new field.
    ///
    /// On failure, the record is left as it was.
    pub fn push_field(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fields.len() == self.cap {
            let cap = if self.cap == 0 {
                1
            } else {
                self.cap
                    .checked_mul(2)
                    .ok_or_else(|| Error::exhausted(self.cap))?
            };

            self.fields
                .try_reserve_exact(cap - self.fields.len())
                .map_err(exhausted_by(cap))?;
            self.cap = cap;
        }

        let field = duplicate(bytes)?;
        self.fields.push(field);

        Ok(())
    }

    /// Returns the nth field of the record, if it is not out-of-bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(|field| &field[..])
    }

    /// Returns the nth field as a `&str`, if it is in bounds and valid UTF-8.
    #[inline]
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|field| std::str::from_utf8(field).ok())
    }

    /// Classify the nth field, if it is not out-of-bounds.
    #[inline]
    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.get(index).map(FieldType::of)
    }

    /// Returns the index of the first field equal to `name`.
    ///
    /// Mostly useful to find a column by its title in a header record.
    pub fn position(&self, name: impl AsRef<[u8]>) -> Option<usize> {
        let name = name.as_ref();
        self.fields.iter().position(|field| &field[..] == name)
    }

    /// Returns an iterator over the record's fields.
    #[inline]
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            record: self,
            current_forward: 0,
            current_backward: self.len(),
        }
    }

    /// Copy the record's fields out, e.g. to keep them after the callback
    /// they were given to has returned.
    pub fn to_vec(&self) -> Vec<Vec<u8>> {
        self.iter().map(|field| field.to_vec()).collect()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Record {}

impl Index<usize> for Record {
    type Output = [u8];

    #[inline]
    fn index(&self, i: usize) -> &[u8] {
        &self.fields[i]
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for Record {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut fields = iter
            .into_iter()
            .map(|field| Box::from(field.as_ref()))
            .collect::<Vec<Box<[u8]>>>();

        let cap = fields.len().max(1).next_power_of_two();
        fields.reserve_exact(cap - fields.len());

        Self { fields, cap }
    }
}

impl<'r> IntoIterator for &'r Record {
    type IntoIter = RecordIter<'r>;
    type Item = &'r [u8];

    #[inline]
    fn into_iter(self) -> RecordIter<'r> {
        self.iter()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Record(")?;
        f.debug_list()
            .entries(self.iter().map(debug::Bytes))
            .finish()?;
        write!(f, ")")?;
        Ok(())
    }
}

pub struct RecordIter<'a> {
    record: &'a Record,
    current_forward: usize,
    current_backward: usize,
}

impl ExactSizeIterator for RecordIter<'_> {}

impl<'a> Iterator for RecordIter<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            let field = &self.record.fields[self.current_forward];

            self.current_forward += 1;

            Some(field)
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let size = self.current_backward - self.current_forward;

        (size, Some(size))
    }

    #[inline]
    fn count(self) -> usize
    where
        Self: Sized,
    {
        self.len()
    }
}

impl DoubleEndedIterator for RecordIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.current_forward == self.current_backward {
            None
        } else {
            self.current_backward -= 1;

            Some(&self.record.fields[self.current_backward])
        }
    }
}
