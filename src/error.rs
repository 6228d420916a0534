//! Error handling

use crate::helper::code_names;
use std::{error, fmt};

/// Result type used in this library
pub type Result<T> = std::result::Result<T, Error>;

/// Response code of a PTP transaction
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResponseCode(pub u16);

impl ResponseCode {
  /// The operation completed successfully
  pub const OK: Self = Self(0x2001);
  /// The device failed for an unspecified reason
  pub const GENERAL_ERROR: Self = Self(0x2002);
  /// No session is open
  pub const SESSION_NOT_OPEN: Self = Self(0x2003);
  /// The operation is not supported
  pub const OPERATION_NOT_SUPPORTED: Self = Self(0x2005);
  /// The object handle is not valid
  pub const INVALID_OBJECT_HANDLE: Self = Self(0x2009);
  /// The device property is not supported
  pub const DEVICE_PROP_NOT_SUPPORTED: Self = Self(0x200A);
  /// The device is busy
  pub const DEVICE_BUSY: Self = Self(0x2019);
  /// The device property value is not valid
  pub const INVALID_DEVICE_PROP_VALUE: Self = Self(0x201C);
  /// A session is already open
  pub const SESSION_ALREADY_OPEN: Self = Self(0x201E);

  /// Human readable name of the response code, if it is a standard one
  pub fn name(self) -> Option<&'static str> {
    response_name(self.0)
  }

  /// Whether the code signals success
  pub fn is_ok(self) -> bool {
    self == Self::OK
  }
}

code_names!(
  fn response_name {
    0x2001 => "OK",
    0x2002 => "General error",
    0x2003 => "Session not open",
    0x2004 => "Invalid transaction ID",
    0x2005 => "Operation not supported",
    0x2006 => "Parameter not supported",
    0x2007 => "Incomplete transfer",
    0x2008 => "Invalid storage ID",
    0x2009 => "Invalid object handle",
    0x200A => "Device property not supported",
    0x200B => "Invalid object format code",
    0x200C => "Store full",
    0x200D => "Object write protected",
    0x200E => "Store read-only",
    0x200F => "Access denied",
    0x2010 => "No thumbnail present",
    0x2011 => "Self test failed",
    0x2012 => "Partial deletion",
    0x2013 => "Store not available",
    0x2014 => "Specification by format unsupported",
    0x2015 => "No valid object info",
    0x2016 => "Invalid code format",
    0x2017 => "Unknown vendor code",
    0x2018 => "Capture already terminated",
    0x2019 => "Device busy",
    0x201A => "Invalid parent object",
    0x201B => "Invalid device property format",
    0x201C => "Invalid device property value",
    0x201D => "Invalid parameter",
    0x201E => "Session already open",
    0x201F => "Transaction cancelled",
    0x2020 => "Specification of destination unsupported",
  }
);

impl fmt::Debug for ResponseCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

impl fmt::Display for ResponseCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.name() {
      Some(name) => write!(f, "{} ({:04X}h)", name, self.0),
      None => write!(f, "Unknown response ({:04X}h)", self.0),
    }
  }
}

/// Error type
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ErrorKind {
  /// Something else went wrong
  Other,
  /// Bad parameters were used
  BadParameters,
  /// Io error
  Io,
  /// libusb reported an error without a more specific kind
  Usb,
  /// The device was disconnected
  NoDevice,
  /// The camera, property or object was not found
  NotFound,
  /// Timeout
  Timeout,
  /// An endpoint stalled
  Pipe,
  /// A container or dataset had the wrong length
  DataLength,
  /// The container belongs to another transaction
  TransactionId,
  /// The container type was not the expected one
  ContainerType,
  /// The camera answered with a response code other than OK
  Response(ResponseCode),
  /// A response or event lacked a required parameter
  ResultParam,
  /// A property had an unexpected data type
  PropertyType,
  /// A property value was missing or not accepted
  PropertyValue,
  /// The data type or form is not supported
  NotSupported,
  /// The file already exists
  FileExists,
}

/// General error
#[derive(Clone, PartialEq)]
pub struct Error {
  kind: ErrorKind,
  info: Option<String>,
}

impl Error {
  /// Creates a new error of the given kind
  pub fn new(kind: ErrorKind) -> Self {
    Self { kind, info: None }
  }

  /// Attach additional information to the error
  pub fn with_info(mut self, info: impl Into<String>) -> Self {
    self.info = Some(info.into());
    self
  }

  /// Kind of the error
  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  /// Additional information about the error
  pub fn info(&self) -> Option<&str> {
    self.info.as_deref()
  }

  fn description(&self) -> &'static str {
    match self.kind {
      ErrorKind::Other => "Unspecified error",
      ErrorKind::BadParameters => "Bad parameters",
      ErrorKind::Io => "I/O problem",
      ErrorKind::Usb => "USB error",
      ErrorKind::NoDevice => "Device disconnected",
      ErrorKind::NotFound => "Not found",
      ErrorKind::Timeout => "Timeout reading from or writing to the port",
      ErrorKind::Pipe => "Endpoint stalled",
      ErrorKind::DataLength => "Unexpected data length",
      ErrorKind::TransactionId => "Transaction ID mismatch",
      ErrorKind::ContainerType => "Unexpected container type",
      ErrorKind::Response(_) => "Camera returned an error",
      ErrorKind::ResultParam => "Missing result parameter",
      ErrorKind::PropertyType => "Unexpected property type",
      ErrorKind::PropertyValue => "Invalid property value",
      ErrorKind::NotSupported => "Unsupported operation",
      ErrorKind::FileExists => "File exists",
    }
  }
}

impl From<ErrorKind> for Error {
  fn from(kind: ErrorKind) -> Self {
    Self::new(kind)
  }
}

impl From<rusb::Error> for Error {
  fn from(err: rusb::Error) -> Self {
    let kind = match err {
      rusb::Error::Timeout => ErrorKind::Timeout,
      rusb::Error::Pipe => ErrorKind::Pipe,
      rusb::Error::NoDevice => ErrorKind::NoDevice,
      rusb::Error::NotFound => ErrorKind::NotFound,
      rusb::Error::Io => ErrorKind::Io,
      rusb::Error::InvalidParam => ErrorKind::BadParameters,
      rusb::Error::NotSupported => ErrorKind::NotSupported,
      _ => ErrorKind::Usb,
    };

    Self { kind, info: Some(err.to_string()) }
  }
}

impl From<std::io::Error> for Error {
  fn from(err: std::io::Error) -> Self {
    let kind = match err.kind() {
      std::io::ErrorKind::AlreadyExists => ErrorKind::FileExists,
      _ => ErrorKind::Io,
    };

    Self { kind, info: Some(err.to_string()) }
  }
}

impl From<&str> for Error {
  fn from(message: &str) -> Self {
    Self { kind: ErrorKind::Other, info: Some(message.into()) }
  }
}

impl From<String> for Error {
  fn from(message: String) -> Self {
    Self { kind: ErrorKind::Other, info: Some(message) }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.description())?;

    if let ErrorKind::Response(code) = self.kind {
      write!(f, ": {}", code)?;
    }

    if let Some(error_info) = &self.info {
      f.write_fmt(format_args!(" [{}]", error_info))?;
    }

    Ok(())
  }
}

impl fmt::Debug for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    <Self as fmt::Display>::fmt(self, f)
  }
}

impl error::Error for Error {}

/// Return early with an error of the given kind if the condition does not hold.
macro_rules! ensure {
  ($cond:expr, $kind:ident, $($info:tt)+) => {
    if !$cond {
      return Err($crate::Error::new($crate::error::ErrorKind::$kind).with_info(format!($($info)+)));
    }
  };
}

pub(crate) use ensure;
