//! PTP USB container codec
//!
//! Every transfer on the bulk and interrupt pipes starts with a 12 byte
//! little-endian header: total length, container type, operation/response/event
//! code and transaction ID.

use crate::{
  error::{ensure, ErrorKind},
  Error, Result,
};

/// Length of the container header
pub const HEADER_LEN: usize = 12;
/// Maximum number of parameters in a command, response or event
pub const MAX_PARAMS: usize = 5;
/// Largest possible command, response or event container
pub const MAX_PARAMS_LEN: usize = HEADER_LEN + 4 * MAX_PARAMS;

/// Type of a container
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ContainerType {
  /// Undefined or unknown container type
  Undefined,
  /// Command sent by the host
  Command,
  /// Data phase, either direction
  Data,
  /// Response sent by the device
  Response,
  /// Asynchronous event sent by the device
  Event,
}

impl ContainerType {
  fn from_raw(raw: u16) -> Self {
    match raw {
      1 => Self::Command,
      2 => Self::Data,
      3 => Self::Response,
      4 => Self::Event,
      _ => Self::Undefined,
    }
  }

  fn to_raw(self) -> u16 {
    match self {
      Self::Undefined => 0,
      Self::Command => 1,
      Self::Data => 2,
      Self::Response => 3,
      Self::Event => 4,
    }
  }
}

/// Decoded container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  /// Total length, header included
  pub length: u32,
  /// Container type
  pub kind: ContainerType,
  /// Operation, response or event code
  pub code: u16,
  /// Transaction ID
  pub transaction_id: u32,
}

impl Header {
  /// Declared length as `usize`
  pub fn total_len(&self) -> usize {
    usize::try_from(self.length).unwrap_or(usize::MAX)
  }

  /// Length of the payload after the header
  pub fn payload_len(&self) -> usize {
    self.total_len().saturating_sub(HEADER_LEN)
  }
}

fn encode(kind: ContainerType, code: u16, transaction_id: u32, payload_len: usize) -> Result<Vec<u8>> {
  let total = HEADER_LEN + payload_len;
  let length = u32::try_from(total)
    .map_err(|_| Error::new(ErrorKind::BadParameters).with_info("Container too large"))?;

  let mut out = Vec::with_capacity(total);
  out.extend_from_slice(&length.to_le_bytes());
  out.extend_from_slice(&kind.to_raw().to_le_bytes());
  out.extend_from_slice(&code.to_le_bytes());
  out.extend_from_slice(&transaction_id.to_le_bytes());
  Ok(out)
}

/// Encode a container carrying up to [`MAX_PARAMS`] parameters
pub fn encode_params(
  kind: ContainerType,
  code: u16,
  transaction_id: u32,
  params: &[u32],
) -> Result<Vec<u8>> {
  ensure!(
    params.len() <= MAX_PARAMS,
    BadParameters,
    "{} parameters given, at most {} allowed",
    params.len(),
    MAX_PARAMS
  );

  let mut out = encode(kind, code, transaction_id, 4 * params.len())?;
  for param in params {
    out.extend_from_slice(&param.to_le_bytes());
  }
  Ok(out)
}

/// Encode a command container
pub fn encode_command(code: u16, transaction_id: u32, params: &[u32]) -> Result<Vec<u8>> {
  encode_params(ContainerType::Command, code, transaction_id, params)
}

/// Encode a data container
pub fn encode_data(code: u16, transaction_id: u32, payload: &[u8]) -> Result<Vec<u8>> {
  let mut out = encode(ContainerType::Data, code, transaction_id, payload.len())?;
  out.extend_from_slice(payload);
  Ok(out)
}

/// Decode the header at the start of `bytes`
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
  ensure!(
    bytes.len() >= HEADER_LEN,
    DataLength,
    "Data length too short: received {} bytes",
    bytes.len()
  );

  let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
  let u32_at =
    |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

  Ok(Header {
    length: u32_at(0),
    kind: ContainerType::from_raw(u16_at(4)),
    code: u16_at(6),
    transaction_id: u32_at(8),
  })
}

/// Decode a complete response or event container with its parameters
///
/// The declared length must match the number of bytes received.
pub fn decode_params(bytes: &[u8]) -> Result<(Header, Vec<u32>)> {
  let header = decode_header(bytes)?;

  ensure!(
    header.total_len() == bytes.len(),
    DataLength,
    "Transfer length mismatch: received {}, expected {}",
    bytes.len(),
    header.length
  );

  let params = bytes[HEADER_LEN..]
    .chunks_exact(4)
    .take(MAX_PARAMS)
    .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    .collect();

  Ok((header, params))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn command_layout() {
    let bytes = encode_command(0x1002, 0, &[1]).unwrap();
    assert_eq!(bytes, [16, 0, 0, 0, 1, 0, 0x02, 0x10, 0, 0, 0, 0, 1, 0, 0, 0]);
  }

  #[test]
  fn too_many_params_are_rejected() {
    let err = encode_command(0x1001, 1, &[0; 6]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParameters);
  }

  #[test]
  fn data_container_wraps_payload() {
    let bytes = encode_data(0x9205, 7, &[0x12, 0x80]).unwrap();
    let header = decode_header(&bytes).unwrap();

    assert_eq!(header.length, 14);
    assert_eq!(header.kind, ContainerType::Data);
    assert_eq!(header.code, 0x9205);
    assert_eq!(header.transaction_id, 7);
    assert_eq!(header.payload_len(), 2);
    assert_eq!(&bytes[HEADER_LEN..], &[0x12, 0x80]);
  }

  #[test]
  fn short_header_is_rejected() {
    assert_eq!(decode_header(&[0; 8]).unwrap_err().kind(), ErrorKind::DataLength);
  }

  #[test]
  fn params_require_exact_length() {
    let mut bytes = encode_params(ContainerType::Event, 0xC201, 0, &[0xFFFF_C001]).unwrap();
    let (header, params) = decode_params(&bytes).unwrap();
    assert_eq!(header.kind, ContainerType::Event);
    assert_eq!(params, [0xFFFF_C001]);

    bytes.push(0);
    assert_eq!(decode_params(&bytes).unwrap_err().kind(), ErrorKind::DataLength);
  }
}
