//! Decoding of PIMA 15740 datasets
//!
//! Datasets are packed little-endian structures. Strings are a `u8` count of
//! UCS-2 code units (terminating NUL included), arrays a `u32` count followed
//! by the elements.

use crate::{error::ensure, Result};

/// Cursor over a dataset received in a data phase
pub struct Decoder<'a> {
  data: &'a [u8],
}

macro_rules! decode_ints {
  ($($(# $attr:tt)* $name:ident: $ty:ty,)*) => {
    $(
      $(# $attr)*
      pub fn $name(&mut self) -> Result<$ty> {
        Ok(<$ty>::from_le_bytes(self.array()?))
      }
    )*
  };
}

impl<'a> Decoder<'a> {
  /// Start decoding `data`
  pub fn new(data: &'a [u8]) -> Self {
    Self { data }
  }

  /// Number of bytes not consumed yet
  pub fn remaining(&self) -> usize {
    self.data.len()
  }

  /// Whether every byte has been consumed
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  fn take(&mut self, size: usize) -> Result<&'a [u8]> {
    ensure!(
      self.data.len() >= size,
      DataLength,
      "Dataset truncated: needed {} more bytes, {} left",
      size,
      self.data.len()
    );

    let (head, tail) = self.data.split_at(size);
    self.data = tail;
    Ok(head)
  }

  fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
    let mut out = [0; N];
    out.copy_from_slice(self.take(N)?);
    Ok(out)
  }

  decode_ints!(
    /// Decode an `u8`
    u8: u8,
    /// Decode an `i8`
    i8: i8,
    /// Decode an `u16`
    u16: u16,
    /// Decode an `i16`
    i16: i16,
    /// Decode an `u32`
    u32: u32,
    /// Decode an `i32`
    i32: i32,
    /// Decode an `u64`
    u64: u64,
    /// Decode an `i64`
    i64: i64,
    /// Decode an `u128`
    u128: u128,
    /// Decode an `i128`
    i128: i128,
  );

  /// Decode a PTP string, dropping the terminating NUL
  pub fn string(&mut self) -> Result<String> {
    let count = self.u8()?;
    let mut units = (0..count).map(|_| self.u16()).collect::<Result<Vec<u16>>>()?;

    while units.last() == Some(&0) {
      units.pop();
    }

    Ok(String::from_utf16_lossy(&units))
  }

  /// Decode an array length and check that `elem_size` sized elements fit
  pub(crate) fn array_len(&mut self, elem_size: usize) -> Result<usize> {
    let count = usize::try_from(self.u32()?).unwrap_or(usize::MAX);

    ensure!(
      count.saturating_mul(elem_size) <= self.data.len(),
      DataLength,
      "Array of {} elements does not fit in {} bytes",
      count,
      self.data.len()
    );

    Ok(count)
  }

  /// Decode an array of `u16`
  pub fn u16_array(&mut self) -> Result<Vec<u16>> {
    let count = self.array_len(2)?;
    (0..count).map(|_| self.u16()).collect()
  }

  /// Decode an array of `u32`
  pub fn u32_array(&mut self) -> Result<Vec<u32>> {
    let count = self.array_len(4)?;
    (0..count).map(|_| self.u32()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn integers_are_little_endian() {
    let mut decoder = Decoder::new(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF]);
    assert_eq!(decoder.u16().unwrap(), 0x1234);
    assert_eq!(decoder.u32().unwrap(), 0x1234_5678);
    assert_eq!(decoder.i8().unwrap(), -1);
    assert!(decoder.is_empty());
  }

  #[test]
  fn strings_drop_the_terminator() {
    // "A6" + NUL
    let mut decoder = Decoder::new(&[3, b'A', 0, b'6', 0, 0, 0]);
    assert_eq!(decoder.string().unwrap(), "A6");
    assert_eq!(decoder.remaining(), 0);
  }

  #[test]
  fn empty_string_has_zero_count() {
    assert_eq!(Decoder::new(&[0]).string().unwrap(), "");
  }

  #[test]
  fn arrays_are_bounded_by_the_data() {
    let mut decoder = Decoder::new(&[2, 0, 0, 0, 0x01, 0x10, 0x02, 0x10]);
    assert_eq!(decoder.u16_array().unwrap(), [0x1001, 0x1002]);

    let mut decoder = Decoder::new(&[0xFF, 0xFF, 0xFF, 0x7F, 0x01, 0x10]);
    assert_eq!(decoder.u16_array().unwrap_err().kind(), ErrorKind::DataLength);
  }

  #[test]
  fn truncated_data_fails() {
    let mut decoder = Decoder::new(&[1, 2, 3]);
    assert_eq!(decoder.u32().unwrap_err().kind(), ErrorKind::DataLength);
  }
}
