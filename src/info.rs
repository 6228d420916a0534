//! Device information
//!
//! [`DeviceInfo`] is what the camera reports for the standard GetDeviceInfo operation.
//! Sony cameras only list their vendor properties and controls through the extended
//! device info ([`SonyExtInfo`]), which [`Camera::device_info`](crate::Camera::device_info)
//! merges in.

use crate::{codes, dataset::Decoder, helper::CodeFmt, Result};
use std::fmt;

/// Information about the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
  /// PTP standard version, in hundredths
  pub version: u16,
  /// Vendor extension ID
  pub vendor_extension_id: u32,
  /// Vendor extension version, in hundredths
  pub vendor_extension_version: u16,
  /// Vendor extension description
  pub vendor_extension_desc: String,
  /// Functional mode
  pub functional_mode: u16,
  /// Supported operation codes
  pub operations: Vec<u16>,
  /// Supported event codes
  pub events: Vec<u16>,
  /// Supported device property codes
  pub properties: Vec<u16>,
  /// Supported capture formats
  pub capture_formats: Vec<u16>,
  /// Supported image formats
  pub image_formats: Vec<u16>,
  /// Manufacturer
  pub manufacturer: String,
  /// Model
  pub model: String,
  /// Device (firmware) version
  pub device_version: String,
  /// Serial number
  pub serial_number: String,
}

/// Sony extended device information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SonyExtInfo {
  /// Extension version, in hundredths
  pub version: u16,
  /// Properties that can be read
  pub properties: Vec<u16>,
  /// Properties used as controls (buttons)
  pub controls: Vec<u16>,
}

impl DeviceInfo {
  /// Decode the dataset returned by GetDeviceInfo
  pub fn decode(data: &[u8]) -> Result<Self> {
    let mut d = Decoder::new(data);

    Ok(Self {
      version: d.u16()?,
      vendor_extension_id: d.u32()?,
      vendor_extension_version: d.u16()?,
      vendor_extension_desc: d.string()?,
      functional_mode: d.u16()?,
      operations: d.u16_array()?,
      events: d.u16_array()?,
      properties: d.u16_array()?,
      capture_formats: d.u16_array()?,
      image_formats: d.u16_array()?,
      manufacturer: d.string()?,
      model: d.string()?,
      device_version: d.string()?,
      serial_number: d.string()?,
    })
  }

  /// Add the properties and controls of the Sony extension
  pub fn merge_sony(&mut self, ext: &SonyExtInfo) {
    for code in ext.properties.iter().chain(&ext.controls) {
      if !self.properties.contains(code) {
        self.properties.push(*code);
      }
    }
  }

  /// Whether the device reports support for an operation
  pub fn supports_operation(&self, code: u16) -> bool {
    self.operations.contains(&code)
  }
}

impl SonyExtInfo {
  /// Decode the dataset returned by GetSDIOExtDevInfo
  pub fn decode(data: &[u8]) -> Result<Self> {
    let mut d = Decoder::new(data);

    Ok(Self { version: d.u16()?, properties: d.u16_array()?, controls: d.u16_array()? })
  }
}

struct Version(u16);

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
  }
}

fn write_codes(
  f: &mut fmt::Formatter<'_>,
  title: &str,
  codes: &[u16],
  names: Option<fn(u16) -> Option<&'static str>>,
) -> fmt::Result {
  writeln!(f, "\nSupported {}:", title)?;

  if codes.is_empty() {
    return writeln!(f, "(None)");
  }

  for &code in codes {
    match names {
      Some(names) => writeln!(f, "{}", CodeFmt(code, names(code)))?,
      None => writeln!(f, "<{:04X}h>", code)?,
    }
  }

  Ok(())
}

impl fmt::Display for DeviceInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Protocol version: {}", Version(self.version))?;
    writeln!(f, "Vendor extension ID: {}", self.vendor_extension_id)?;
    writeln!(f, "Vendor extension version: {}", Version(self.vendor_extension_version))?;
    writeln!(f, "Vendor extension description: {}", self.vendor_extension_desc)?;

    write_codes(f, "operations", &self.operations, Some(codes::operation_name))?;
    write_codes(f, "events", &self.events, None)?;
    write_codes(f, "properties", &self.properties, Some(codes::property_name))?;
    write_codes(f, "capture formats", &self.capture_formats, None)?;
    write_codes(f, "image formats", &self.image_formats, None)?;

    writeln!(f)?;
    writeln!(f, "Manufacturer: {}", self.manufacturer)?;
    writeln!(f, "Model: {}", self.model)?;
    writeln!(f, "Device version: {}", self.device_version)?;
    write!(f, "Serial number: {}", self.serial_number)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn string(out: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    if units.is_empty() {
      out.push(0);
      return;
    }
    out.push(u8::try_from(units.len() + 1).unwrap());
    for unit in units.iter().chain(&[0]) {
      out.extend_from_slice(&unit.to_le_bytes());
    }
  }

  fn array(out: &mut Vec<u8>, values: &[u16]) {
    out.extend_from_slice(&u32::try_from(values.len()).unwrap().to_le_bytes());
    for value in values {
      out.extend_from_slice(&value.to_le_bytes());
    }
  }

  fn sample() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&100u16.to_le_bytes());
    out.extend_from_slice(&0x11u32.to_le_bytes());
    out.extend_from_slice(&100u16.to_le_bytes());
    string(&mut out, "Sony PTP Extensions");
    out.extend_from_slice(&0u16.to_le_bytes());
    array(&mut out, &[0x1001, 0x9201]);
    array(&mut out, &[]);
    array(&mut out, &[0x5007]);
    array(&mut out, &[]);
    array(&mut out, &[0x3801]);
    string(&mut out, "Sony Corporation");
    string(&mut out, "ILCE-6000");
    string(&mut out, "1.00");
    string(&mut out, "0000000000000000");
    out
  }

  #[test]
  fn decodes_and_prints() {
    let info = DeviceInfo::decode(&sample()).unwrap();
    assert_eq!(info.model, "ILCE-6000");
    assert!(info.supports_operation(0x9201));

    insta::assert_snapshot!(info.to_string(), @r###"
    Protocol version: 1.00
    Vendor extension ID: 17
    Vendor extension version: 1.00
    Vendor extension description: Sony PTP Extensions

    Supported operations:
    <1001h> GetDeviceInfo
    <9201h> SDIOConnect

    Supported events:
    (None)

    Supported properties:
    <5007h> F Number

    Supported capture formats:
    (None)

    Supported image formats:
    <3801h>

    Manufacturer: Sony Corporation
    Model: ILCE-6000
    Device version: 1.00
    Serial number: 0000000000000000
    "###);
  }

  #[test]
  fn merging_skips_known_properties() {
    let mut info = DeviceInfo::decode(&sample()).unwrap();

    let mut data = 200u16.to_le_bytes().to_vec();
    array(&mut data, &[0x5007, 0xD21E]);
    array(&mut data, &[0xD2C2]);
    let ext = SonyExtInfo::decode(&data).unwrap();
    assert_eq!(ext.version, 200);

    info.merge_sony(&ext);
    assert_eq!(info.properties, [0x5007, 0xD21E, 0xD2C2]);
  }

  #[test]
  fn truncated_info_fails() {
    let data = sample();
    let err = DeviceInfo::decode(&data[..data.len() - 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataLength);
  }
}
