//! Device properties
//!
//! ## Reading the camera's properties
//! ```no_run
//! use sony_ptp::{codes::property, Context, Result};
//!
//! # fn main() -> Result<()> {
//! let camera = Context::new()?.autodetect_camera()?;
//! camera.handshake()?;
//!
//! for desc in &camera.properties()? {
//!   println!("{}", desc);
//! }
//!
//! let iso = camera.property(property::SONY_ISO)?;
//! println!("ISO is {}", iso.current);
//! # Ok(())
//! # }
//! ```

use crate::{codes, dataset::Decoder, error::ensure, Error, Result};
use std::fmt;

const ARRAY_MASK: u16 = 0x4000;
const STRING_CODE: u16 = 0xFFFF;
// Strings carry a u8 count which includes the terminating NUL
const MAX_STRING_UNITS: usize = 254;

macro_rules! scalar_types {
  ($($variant:ident($prim:ident) = $code:literal, $name:literal;)*) => {
    /// Scalar data type of a property value
    #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum ScalarType {
      $(
        #[doc = concat!("`", stringify!($prim), "`")]
        $variant,
      )*
    }

    impl ScalarType {
      fn from_code(code: u16) -> Option<Self> {
        match code {
          $($code => Some(Self::$variant),)*
          _ => None,
        }
      }

      /// PTP data type code
      pub fn code(self) -> u16 {
        match self {
          $(Self::$variant => $code,)*
        }
      }

      /// Name used in property listings
      pub fn name(self) -> &'static str {
        match self {
          $(Self::$variant => $name,)*
        }
      }

      /// Size of an encoded value in bytes
      pub fn size(self) -> usize {
        match self {
          $(Self::$variant => std::mem::size_of::<$prim>(),)*
        }
      }

      fn decode(self, decoder: &mut Decoder<'_>) -> Result<Value> {
        Ok(match self {
          $(Self::$variant => Value::$variant(decoder.$prim()?),)*
        })
      }
    }

    /// Value of a device property
    #[derive(Debug, Clone, PartialEq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub enum Value {
      $(
        #[doc = concat!("`", stringify!($prim), "` value")]
        $variant($prim),
      )*
      /// Array of scalars of the given type
      Array(ScalarType, Vec<Value>),
      /// String
      String(String),
    }

    impl Value {
      /// Data type of the value
      pub fn data_type(&self) -> DataType {
        match self {
          $(Self::$variant(_) => DataType::Scalar(ScalarType::$variant),)*
          Self::Array(ty, _) => DataType::Array(*ty),
          Self::String(_) => DataType::String,
        }
      }

      /// Numeric value, if this is an integer that fits an `i128`
      pub fn as_i128(&self) -> Option<i128> {
        match self {
          $(Self::$variant(v) => i128::try_from(*v).ok(),)*
          Self::Array(..) | Self::String(_) => None,
        }
      }

      fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
          $(Self::$variant(v) => out.extend_from_slice(&v.to_le_bytes()),)*
          Self::Array(_, values) => {
            let count = u32::try_from(values.len()).unwrap_or(u32::MAX);
            out.extend_from_slice(&count.to_le_bytes());
            for value in values {
              value.encode_into(out);
            }
          }
          Self::String(s) => {
            let units: Vec<u16> = s.encode_utf16().take(MAX_STRING_UNITS).collect();

            if units.is_empty() {
              out.push(0);
              return;
            }

            out.push(u8::try_from(units.len() + 1).unwrap_or(u8::MAX));
            for unit in units.iter().chain(std::iter::once(&0)) {
              out.extend_from_slice(&unit.to_le_bytes());
            }
          }
        }
      }

      fn fmt_scalar(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $(Self::$variant(v) => {
            write!(f, "{} ({:0width$X}h)", v, v, width = 2 * std::mem::size_of::<$prim>())
          })*
          Self::Array(..) | Self::String(_) => Ok(()),
        }
      }
    }
  };
}

scalar_types!(
  Int8(i8) = 0x0001, "INT8";
  UInt8(u8) = 0x0002, "UINT8";
  Int16(i16) = 0x0003, "INT16";
  UInt16(u16) = 0x0004, "UINT16";
  Int32(i32) = 0x0005, "INT32";
  UInt32(u32) = 0x0006, "UINT32";
  Int64(i64) = 0x0007, "INT64";
  UInt64(u64) = 0x0008, "UINT64";
  Int128(i128) = 0x0009, "INT128";
  UInt128(u128) = 0x000A, "UINT128";
);

/// Data type of a device property
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
  /// A single scalar
  Scalar(ScalarType),
  /// Array of scalars
  Array(ScalarType),
  /// UCS-2 string
  String,
}

impl DataType {
  /// Decode a PTP data type code
  pub fn from_code(code: u16) -> Result<Self> {
    if code == STRING_CODE {
      return Ok(Self::String);
    }

    match ScalarType::from_code(code & !ARRAY_MASK) {
      Some(scalar) if code & ARRAY_MASK != 0 => Ok(Self::Array(scalar)),
      Some(scalar) => Ok(Self::Scalar(scalar)),
      None => Err(
        Error::new(crate::error::ErrorKind::NotSupported)
          .with_info(format!("Unsupported data type {:04X}h", code)),
      ),
    }
  }

  /// PTP data type code
  pub fn code(self) -> u16 {
    match self {
      Self::Scalar(scalar) => scalar.code(),
      Self::Array(scalar) => scalar.code() | ARRAY_MASK,
      Self::String => STRING_CODE,
    }
  }

  /// Name used in property listings; arrays share the name of their element
  pub fn name(self) -> &'static str {
    match self {
      Self::Scalar(scalar) | Self::Array(scalar) => scalar.name(),
      Self::String => "STRING",
    }
  }
}

/// Name of a raw data type code, `UNKNOWN` for codes that are not recognised
pub fn type_name(code: u16) -> &'static str {
  DataType::from_code(code).map(DataType::name).unwrap_or("UNKNOWN")
}

impl Value {
  /// Decode a value of type `ty`
  pub fn decode(decoder: &mut Decoder<'_>, ty: DataType) -> Result<Self> {
    match ty {
      DataType::String => Ok(Self::String(decoder.string()?)),
      DataType::Scalar(scalar) => scalar.decode(decoder),
      DataType::Array(scalar) => {
        let count = decoder.array_len(scalar.size())?;
        let values = (0..count).map(|_| scalar.decode(decoder)).collect::<Result<_>>()?;
        Ok(Self::Array(scalar, values))
      }
    }
  }

  /// Encode the value the way it is sent in a data phase
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::new();
    self.encode_into(&mut out);
    out
  }

  /// Compare numerically when both values are integers, structurally otherwise
  pub fn same_as(&self, other: &Value) -> bool {
    match (self.as_i128(), other.as_i128()) {
      (Some(a), Some(b)) => a == b,
      _ => self == other,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::String(s) => write!(f, "\"{}\"", s),
      Self::Array(_, values) => {
        f.write_str("[")?;
        for (i, value) in values.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          value.fmt_scalar(f)?;
        }
        f.write_str("]")
      }
      scalar => scalar.fmt_scalar(f),
    }
  }
}

/// Allowed values of a property
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Form {
  /// Any value of the data type
  None,
  /// Values between `min` and `max`
  Range {
    /// Smallest value
    min: Value,
    /// Largest value
    max: Value,
    /// Increment
    step: Value,
  },
  /// One of the listed values
  Enum(Vec<Value>),
}

impl Form {
  fn decode(decoder: &mut Decoder<'_>, ty: DataType) -> Result<Self> {
    match decoder.u8()? {
      0 => Ok(Self::None),
      1 => Ok(Self::Range {
        min: Value::decode(decoder, ty)?,
        max: Value::decode(decoder, ty)?,
        step: Value::decode(decoder, ty)?,
      }),
      2 => {
        let count = decoder.u16()?;
        let values = (0..count).map(|_| Value::decode(decoder, ty)).collect::<Result<_>>()?;
        Ok(Self::Enum(values))
      }
      flag => Err(
        Error::new(crate::error::ErrorKind::BadParameters)
          .with_info(format!("Unknown property form {:02X}h", flag)),
      ),
    }
  }

  /// Whether `value` is allowed by the form
  pub fn accepts(&self, value: &Value) -> bool {
    match self {
      Self::None => true,
      Self::Range { min, max, .. } => {
        match (min.as_i128(), max.as_i128(), value.as_i128()) {
          (Some(min), Some(max), Some(v)) => min <= v && v <= max,
          _ => false,
        }
      }
      Self::Enum(values) => values.iter().any(|allowed| allowed.same_as(value)),
    }
  }
}

/// Description of a device property
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropDesc {
  /// Property code
  pub code: u16,
  /// Data type of the values
  pub data_type: DataType,
  /// If false, the property can only be read
  pub writable: bool,
  /// Factory default value
  pub default: Value,
  /// Current value
  pub current: Value,
  /// Allowed values
  pub form: Form,
}

impl PropDesc {
  /// Decode a standard PIMA property description
  pub fn decode(decoder: &mut Decoder<'_>) -> Result<Self> {
    Self::decode_inner(decoder, false)
  }

  /// Decode a property description as found in Sony's GetAllDevPropData
  ///
  /// Sony adds an undocumented byte after the get/set flag.
  pub fn decode_sony(decoder: &mut Decoder<'_>) -> Result<Self> {
    Self::decode_inner(decoder, true)
  }

  fn decode_inner(decoder: &mut Decoder<'_>, sony: bool) -> Result<Self> {
    let code = decoder.u16()?;
    let data_type = DataType::from_code(decoder.u16()?)?;
    let writable = decoder.u8()? == 1;

    if sony {
      decoder.u8()?;
    }

    Ok(Self {
      code,
      data_type,
      writable,
      default: Value::decode(decoder, data_type)?,
      current: Value::decode(decoder, data_type)?,
      form: Form::decode(decoder, data_type)?,
    })
  }

  /// Name of the property, if known
  pub fn name(&self) -> Option<&'static str> {
    codes::property_name(self.code)
  }

  /// Whether the camera would accept `value` for this property
  pub fn accepts(&self, value: &Value) -> bool {
    self.form.accepts(value)
  }
}

impl fmt::Display for PropDesc {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "<{:04X}h> {:<30} [{:<7}] {}",
      self.code,
      self.name().unwrap_or("?"),
      self.data_type.name(),
      self.current
    )
  }
}

/// Properties reported by the camera
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropList {
  descs: Vec<PropDesc>,
}

impl PropList {
  /// Decode the dataset returned by Sony's GetAllDevPropData
  pub fn decode_sony(data: &[u8]) -> Result<Self> {
    let mut decoder = Decoder::new(data);
    let count = decoder.u32()?;
    // Reserved, always zero so far
    decoder.u32()?;

    ensure!(
      usize::try_from(count).map_or(false, |count| count <= decoder.remaining()),
      DataLength,
      "{} properties announced in {} bytes",
      count,
      decoder.remaining()
    );

    let descs = (0..count).map(|_| PropDesc::decode_sony(&mut decoder)).collect::<Result<_>>()?;
    Ok(Self { descs })
  }

  /// Look up a property by code
  pub fn get(&self, code: u16) -> Option<&PropDesc> {
    self.descs.iter().find(|desc| desc.code == code)
  }

  pub(crate) fn take(self, code: u16) -> Option<PropDesc> {
    self.descs.into_iter().find(|desc| desc.code == code)
  }

  /// Iterate over all properties
  pub fn iter(&self) -> std::slice::Iter<'_, PropDesc> {
    self.descs.iter()
  }

  /// Number of properties
  pub fn len(&self) -> usize {
    self.descs.len()
  }

  /// Whether the camera reported no properties
  pub fn is_empty(&self) -> bool {
    self.descs.is_empty()
  }
}

impl<'a> IntoIterator for &'a PropList {
  type Item = &'a PropDesc;
  type IntoIter = std::slice::Iter<'a, PropDesc>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl IntoIterator for PropList {
  type Item = PropDesc;
  type IntoIter = std::vec::IntoIter<PropDesc>;

  fn into_iter(self) -> Self::IntoIter {
    self.descs.into_iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  // ISO, UINT32, writable, default 0, current 1000, enum of 100/1000/3200
  const SONY_ISO_DESC: &[u8] = &[
    0x1E, 0xD2, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE8, 0x03, 0x00, 0x00, 0x02,
    0x03, 0x00, 0x64, 0x00, 0x00, 0x00, 0xE8, 0x03, 0x00, 0x00, 0x80, 0x0C, 0x00, 0x00,
  ];

  #[test]
  fn decodes_sony_descriptor() {
    let desc = PropDesc::decode_sony(&mut Decoder::new(SONY_ISO_DESC)).unwrap();

    assert_eq!(desc.code, codes::property::SONY_ISO);
    assert_eq!(desc.data_type, DataType::Scalar(ScalarType::UInt32));
    assert!(desc.writable);
    assert_eq!(desc.current, Value::UInt32(1000));
    assert_eq!(
      desc.form,
      Form::Enum(vec![Value::UInt32(100), Value::UInt32(1000), Value::UInt32(3200)])
    );
    assert_eq!(
      desc.to_string(),
      format!("<D21Eh> {:<30} [{:<7}] 1000 (000003E8h)", "ISO", "UINT32")
    );
  }

  #[test]
  fn enum_form_compares_numerically() {
    let desc = PropDesc::decode_sony(&mut Decoder::new(SONY_ISO_DESC)).unwrap();

    assert!(desc.accepts(&Value::UInt32(3200)));
    assert!(desc.accepts(&Value::UInt16(100)));
    assert!(!desc.accepts(&Value::UInt32(500)));
  }

  #[test]
  fn range_form_is_inclusive() {
    let form =
      Form::Range { min: Value::Int8(0), max: Value::Int8(100), step: Value::Int8(1) };

    assert!(form.accepts(&Value::Int8(0)));
    assert!(form.accepts(&Value::UInt32(100)));
    assert!(!form.accepts(&Value::Int8(-1)));
    assert!(!form.accepts(&Value::String("50".into())));
  }

  #[test]
  fn standard_descriptor_has_no_padding_byte() {
    // Still capture mode, UINT16, writable, default 1, current 0x8012, no form
    let data = [0x13, 0x50, 0x04, 0x00, 0x01, 0x01, 0x00, 0x12, 0x80, 0x00];
    let desc = PropDesc::decode(&mut Decoder::new(&data)).unwrap();

    assert_eq!(desc.default, Value::UInt16(1));
    assert_eq!(desc.current, Value::UInt16(0x8012));
    assert_eq!(desc.form, Form::None);
    assert_eq!(desc.name(), Some("Still capture mode"));
  }

  #[test]
  fn value_formatting() {
    insta::assert_snapshot!(Value::UInt16(18).to_string(), @"18 (0012h)");
    insta::assert_snapshot!(Value::Int8(-1).to_string(), @"-1 (FFh)");
    insta::assert_snapshot!(Value::String("ILCE-6000".into()).to_string(), @r#""ILCE-6000""#);
    insta::assert_snapshot!(
      Value::Array(ScalarType::UInt8, vec![Value::UInt8(1), Value::UInt8(2)]).to_string(),
      @"[1 (01h), 2 (02h)]"
    );
  }

  #[test]
  fn strings_and_arrays_round_trip_through_the_decoder() {
    let string = Value::String("Sony".into());
    let bytes = string.to_bytes();
    assert_eq!(bytes[0], 5);
    assert_eq!(Value::decode(&mut Decoder::new(&bytes), DataType::String).unwrap(), string);

    let array = Value::Array(ScalarType::UInt16, vec![Value::UInt16(1), Value::UInt16(0x8012)]);
    let bytes = array.to_bytes();
    let ty = DataType::from_code(0x4004).unwrap();
    assert_eq!(ty, DataType::Array(ScalarType::UInt16));
    assert_eq!(Value::decode(&mut Decoder::new(&bytes), ty).unwrap(), array);
  }

  #[test]
  fn unknown_types_and_forms_fail() {
    assert_eq!(DataType::from_code(0x0000).unwrap_err().kind(), ErrorKind::NotSupported);
    assert_eq!(type_name(0x0042), "UNKNOWN");
    assert_eq!(type_name(0xFFFF), "STRING");

    // UINT8 property with form flag 3
    let data = [0x01, 0x50, 0x02, 0x00, 0x00, 0x00, 0x50, 0x03];
    let err = PropDesc::decode(&mut Decoder::new(&data)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParameters);
  }

  #[test]
  fn list_lookup() {
    let mut data = vec![1, 0, 0, 0, 0, 0, 0, 0];
    data.extend_from_slice(SONY_ISO_DESC);

    let list = PropList::decode_sony(&data).unwrap();
    assert_eq!(list.len(), 1);
    assert!(list.get(codes::property::SONY_ISO).is_some());
    assert!(list.get(codes::property::F_NUMBER).is_none());
  }
}
