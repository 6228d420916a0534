//! Exposure and drive settings
//!
//! ## Configuring a burst
//! ```no_run
//! use sony_ptp::{
//!   settings::{Aperture, CaptureParams, DriveMode, Iso, ShutterSpeed},
//!   Context, Result,
//! };
//!
//! # fn main() -> Result<()> {
//! let camera = Context::new()?.autodetect_camera()?;
//! camera.handshake()?;
//!
//! let params = CaptureParams::new()
//!   .drive_mode(DriveMode::Low)
//!   .iso(Iso::new(1000)?)
//!   .shutter_speed("1/2000".parse()?)
//!   .aperture(Aperture::new(5.6)?);
//!
//! camera.set_params(&params)?;
//! # Ok(())
//! # }
//! ```

use crate::{
  camera::Camera,
  codes::{self, property},
  error::{ensure, ErrorKind},
  port::Transport,
  property::{PropList, Value},
  Error, Result,
};
use std::{fmt, str::FromStr};

/// Continuous drive mode
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DriveMode {
  /// Single shot
  Single,
  /// Continuous, high speed
  High,
  /// Continuous, medium speed
  Mid,
  /// Continuous, low speed
  Low,
}

impl DriveMode {
  /// Value of the still capture mode property
  pub fn code(self) -> u16 {
    match self {
      Self::Single => 0x0001,
      Self::High => 0x0002,
      Self::Mid => 0x8015,
      Self::Low => 0x8012,
    }
  }

  /// Drive mode for a still capture mode value
  pub fn from_code(code: u16) -> Option<Self> {
    match code {
      0x0001 => Some(Self::Single),
      0x0002 => Some(Self::High),
      0x8015 => Some(Self::Mid),
      0x8012 => Some(Self::Low),
      _ => None,
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Single => "single",
      Self::High => "high",
      Self::Mid => "mid",
      Self::Low => "low",
    }
  }
}

impl FromStr for DriveMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    [Self::Single, Self::High, Self::Mid, Self::Low]
      .into_iter()
      .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| {
        Error::new(ErrorKind::BadParameters).with_info(format!("Unknown drive mode '{}'", s))
      })
  }
}

impl fmt::Display for DriveMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// ISO sensitivity
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Iso(u32);

impl Iso {
  /// Let the camera choose
  pub const AUTO: Self = Self(0x00FF_FFFF);

  /// ISO value, must not be zero
  pub fn new(value: u32) -> Result<Self> {
    ensure!(value > 0, BadParameters, "ISO must be positive");
    Ok(Self(value))
  }

  /// Raw property value
  pub fn value(self) -> u32 {
    self.0
  }
}

impl FromStr for Iso {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();

    if s.eq_ignore_ascii_case("auto") {
      return Ok(Self::AUTO);
    }

    let value = s.parse().map_err(|_| {
      Error::new(ErrorKind::BadParameters).with_info(format!("Invalid ISO '{}'", s))
    })?;
    Self::new(value)
  }
}

impl fmt::Display for Iso {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if *self == Self::AUTO {
      f.write_str("AUTO")
    } else {
      write!(f, "{}", self.0)
    }
  }
}

/// Shutter speed as a fraction of seconds
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShutterSpeed {
  numerator: u16,
  denominator: u16,
}

impl ShutterSpeed {
  /// `numerator / denominator` seconds, both must be positive
  pub fn new(numerator: u16, denominator: u16) -> Result<Self> {
    ensure!(
      numerator > 0 && denominator > 0,
      BadParameters,
      "Invalid shutter speed {}/{}",
      numerator,
      denominator
    );
    Ok(Self { numerator, denominator })
  }

  /// Numerator
  pub fn numerator(self) -> u16 {
    self.numerator
  }

  /// Denominator
  pub fn denominator(self) -> u16 {
    self.denominator
  }

  /// Property value, `numerator << 16 | denominator`
  pub fn to_raw(self) -> u32 {
    (u32::from(self.numerator) << 16) | u32::from(self.denominator)
  }

  /// Decode a property value
  pub fn from_raw(raw: u32) -> Result<Self> {
    let [d0, d1, n0, n1] = raw.to_le_bytes();
    Self::new(u16::from_le_bytes([n0, n1]), u16::from_le_bytes([d0, d1]))
  }
}

impl FromStr for ShutterSpeed {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid =
      || Error::new(ErrorKind::BadParameters).with_info(format!("Invalid shutter speed '{}'", s));
    let number = |part: &str| part.trim().parse::<u16>().map_err(|_| invalid());

    match s.trim().trim_end_matches('"').split_once('/') {
      Some((numerator, denominator)) => Self::new(number(numerator)?, number(denominator)?),
      None => Self::new(number(s.trim().trim_end_matches('"'))?, 1),
    }
  }
}

impl fmt::Display for ShutterSpeed {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.denominator == 1 {
      write!(f, "{}\"", self.numerator)
    } else {
      write!(f, "{}/{}", self.numerator, self.denominator)
    }
  }
}

/// Aperture (f-number), stored in hundredths
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Aperture(u16);

impl Aperture {
  /// Largest f-number that fits the property
  pub const MAX: f32 = 655.35;

  /// Aperture from an f-number such as `5.6`
  pub fn new(f_number: f32) -> Result<Self> {
    ensure!(
      f_number.is_finite() && f_number > 0.0 && f_number <= Self::MAX,
      BadParameters,
      "Invalid f-number {}",
      f_number
    );

    // In range, checked above
    #[allow(clippy::as_conversions)]
    let hundredths = (f_number * 100.0).round() as u16;

    Self::from_hundredths(hundredths)
  }

  /// Aperture from the raw property value
  pub fn from_hundredths(hundredths: u16) -> Result<Self> {
    ensure!(hundredths > 0, BadParameters, "Invalid f-number 0");
    Ok(Self(hundredths))
  }

  /// Raw property value
  pub fn hundredths(self) -> u16 {
    self.0
  }

  /// The f-number
  pub fn f_number(self) -> f32 {
    f32::from(self.0) / 100.0
  }
}

impl FromStr for Aperture {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    let number = s
      .strip_prefix("f/")
      .or_else(|| s.strip_prefix("F/"))
      .or_else(|| s.strip_prefix(['f', 'F']))
      .unwrap_or(s);

    let f_number = number.parse().map_err(|_| {
      Error::new(ErrorKind::BadParameters).with_info(format!("Invalid aperture '{}'", s))
    })?;
    Self::new(f_number)
  }
}

impl fmt::Display for Aperture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (whole, fraction) = (self.0 / 100, self.0 % 100);

    match fraction {
      0 => write!(f, "f/{}", whole),
      _ if fraction % 10 == 0 => write!(f, "f/{}.{}", whole, fraction / 10),
      _ => write!(f, "f/{}.{:02}", whole, fraction),
    }
  }
}

/// Settings applied before capturing, unset fields are left alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaptureParams {
  /// Drive mode
  pub drive: Option<DriveMode>,
  /// ISO
  pub iso: Option<Iso>,
  /// Shutter speed
  pub shutter: Option<ShutterSpeed>,
  /// Aperture
  pub aperture: Option<Aperture>,
}

impl CaptureParams {
  /// No settings
  pub fn new() -> Self {
    Self::default()
  }

  /// Set the drive mode
  pub fn drive_mode(mut self, drive: DriveMode) -> Self {
    self.drive = Some(drive);
    self
  }

  /// Set the ISO
  pub fn iso(mut self, iso: Iso) -> Self {
    self.iso = Some(iso);
    self
  }

  /// Set the shutter speed
  pub fn shutter_speed(mut self, shutter: ShutterSpeed) -> Self {
    self.shutter = Some(shutter);
    self
  }

  /// Set the aperture
  pub fn aperture(mut self, aperture: Aperture) -> Self {
    self.aperture = Some(aperture);
    self
  }

  /// Whether no setting is given
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Property writes in the order they are applied
  fn writes(&self) -> Vec<(u16, Value, String)> {
    let mut writes = Vec::new();

    if let Some(drive) = self.drive {
      writes.push((property::STILL_CAPTURE_MODE, Value::UInt16(drive.code()), drive.to_string()));
    }
    if let Some(iso) = self.iso {
      writes.push((property::SONY_ISO, Value::UInt32(iso.value()), iso.to_string()));
    }
    if let Some(shutter) = self.shutter {
      writes.push((property::SONY_SHUTTER_SPEED, Value::UInt32(shutter.to_raw()), shutter.to_string()));
    }
    if let Some(aperture) = self.aperture {
      writes.push((property::F_NUMBER, Value::UInt16(aperture.hundredths()), aperture.to_string()));
    }

    writes
  }
}

impl<T: Transport> Camera<T> {
  /// Apply the given settings: drive mode, ISO, shutter speed and aperture, in that order
  ///
  /// Values the camera reports as not allowed fail with [`ErrorKind::PropertyValue`] before
  /// anything is written for them.
  pub fn set_params(&self, params: &CaptureParams) -> Result<()> {
    if params.is_empty() {
      return Ok(());
    }

    let properties = self.properties()?;
    let writes = params.writes();

    // Nothing is written unless every value is allowed
    for (code, value, label) in &writes {
      check_allowed(&properties, *code, value, label)?;
    }

    for (code, value, label) in writes {
      tracing::info!("Setting {} to {}", codes::property_name(code).unwrap_or("?"), label);
      self.set_control_a(code, &value)?;
    }

    Ok(())
  }

  /// Set the drive mode
  pub fn set_drive_mode(&self, drive: DriveMode) -> Result<()> {
    self.set_params(&CaptureParams::new().drive_mode(drive))
  }

  /// Set the ISO
  pub fn set_iso(&self, iso: Iso) -> Result<()> {
    self.set_params(&CaptureParams::new().iso(iso))
  }

  /// Set the shutter speed
  pub fn set_shutter_speed(&self, shutter: ShutterSpeed) -> Result<()> {
    self.set_params(&CaptureParams::new().shutter_speed(shutter))
  }

  /// Set the aperture
  pub fn set_aperture(&self, aperture: Aperture) -> Result<()> {
    self.set_params(&CaptureParams::new().aperture(aperture))
  }
}

fn check_allowed(properties: &PropList, code: u16, value: &Value, label: &str) -> Result<()> {
  match properties.get(code) {
    Some(desc) => {
      ensure!(
        desc.accepts(value),
        PropertyValue,
        "{} is not allowed for {}",
        label,
        codes::property_name(code).unwrap_or("?")
      );
      Ok(())
    }
    None => {
      tracing::debug!("Property {:04X}h not reported, value not checked", code);
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{camera::EventMode, codes::operation, sample_camera};

  #[test]
  fn drive_modes_parse_case_insensitively() {
    assert_eq!("low".parse::<DriveMode>().unwrap(), DriveMode::Low);
    assert_eq!("HIGH".parse::<DriveMode>().unwrap().code(), 0x0002);
    assert_eq!(DriveMode::from_code(0x8015), Some(DriveMode::Mid));

    let err = "fast".parse::<DriveMode>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParameters);
  }

  #[test]
  fn iso_must_be_positive() {
    assert_eq!("1000".parse::<Iso>().unwrap().value(), 1000);
    assert_eq!("Auto".parse::<Iso>().unwrap(), Iso::AUTO);
    assert_eq!(Iso::AUTO.to_string(), "AUTO");
    assert_eq!(Iso::new(0).unwrap_err().kind(), ErrorKind::BadParameters);
  }

  #[test]
  fn shutter_speeds() {
    let fast: ShutterSpeed = "1/2000".parse().unwrap();
    assert_eq!(fast.to_raw(), 0x0001_07D0);
    assert_eq!(fast.to_string(), "1/2000");
    assert_eq!(ShutterSpeed::from_raw(0x0001_07D0).unwrap(), fast);

    let slow: ShutterSpeed = "2".parse().unwrap();
    assert_eq!(slow.to_raw(), 0x0002_0001);
    assert_eq!(slow.to_string(), "2\"");
    assert_eq!("2\"".parse::<ShutterSpeed>().unwrap(), slow);

    assert!("0/10".parse::<ShutterSpeed>().is_err());
    assert!("1/".parse::<ShutterSpeed>().is_err());
    assert!("1/70000".parse::<ShutterSpeed>().is_err());
  }

  #[test]
  fn apertures() {
    let aperture = Aperture::new(5.6).unwrap();
    assert_eq!(aperture.hundredths(), 560);
    assert_eq!(aperture.to_string(), "f/5.6");

    assert_eq!("f/11".parse::<Aperture>().unwrap().to_string(), "f/11");
    assert_eq!("F1.25".parse::<Aperture>().unwrap().hundredths(), 125);
    assert_eq!(Aperture::from_hundredths(350).unwrap().f_number(), 3.5);

    assert!(Aperture::new(0.0).is_err());
    assert!(Aperture::new(f32::NAN).is_err());
    assert!(Aperture::new(700.0).is_err());
    assert!(Aperture::new(0.001).is_err());
  }

  #[test]
  fn params_are_applied_in_order() {
    let (port, camera) = sample_camera(EventMode::Polling);

    let params = CaptureParams::new()
      .aperture(Aperture::new(5.6).unwrap())
      .shutter_speed("1/2000".parse().unwrap())
      .iso(Iso::new(1000).unwrap())
      .drive_mode(DriveMode::Low);
    camera.set_params(&params).unwrap();

    let written: Vec<u32> = port
      .camera()
      .operations()
      .into_iter()
      .filter(|op| op.code == operation::SONY_SET_CONTROL_DEVICE_A)
      .map(|op| op.params[0])
      .collect();
    assert_eq!(written, [0x5013, 0xD21E, 0xD20D, 0x5007]);

    let properties = camera.properties().unwrap();
    let current = |code| properties.get(code).unwrap().current.clone();
    assert_eq!(current(property::STILL_CAPTURE_MODE), Value::UInt16(0x8012));
    assert_eq!(current(property::SONY_ISO), Value::UInt32(1000));
    assert_eq!(current(property::SONY_SHUTTER_SPEED), Value::UInt32(0x0001_07D0));
    assert_eq!(current(property::F_NUMBER), Value::UInt16(560));
  }

  #[test]
  fn values_outside_the_form_are_rejected() {
    let (port, camera) = sample_camera(EventMode::Polling);

    let err = camera.set_iso(Iso::new(1234).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PropertyValue);

    // Below the range of the lens
    let err = camera.set_aperture(Aperture::new(1.4).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PropertyValue);

    let writes = port
      .camera()
      .operations()
      .into_iter()
      .filter(|op| op.code == operation::SONY_SET_CONTROL_DEVICE_A)
      .count();
    assert_eq!(writes, 0);
  }

  #[test]
  fn rejected_value_leaves_earlier_settings_alone() {
    let (port, camera) = sample_camera(EventMode::Polling);

    let params = CaptureParams::new().drive_mode(DriveMode::Low).iso(Iso::new(1234).unwrap());
    let err = camera.set_params(&params).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PropertyValue);

    let writes = port
      .camera()
      .operations()
      .into_iter()
      .filter(|op| op.code == operation::SONY_SET_CONTROL_DEVICE_A)
      .count();
    assert_eq!(writes, 0);

    let drive = camera.property(property::STILL_CAPTURE_MODE).unwrap().current;
    assert_eq!(drive, Value::UInt16(0x0001));
  }

  #[test]
  fn empty_params_do_nothing() {
    let (port, camera) = sample_camera(EventMode::Polling);
    let before = port.camera().operations().len();

    camera.set_params(&CaptureParams::new()).unwrap();
    assert_eq!(port.camera().operations().len(), before);
  }

  #[test]
  fn single_setters() {
    let (_port, camera) = sample_camera(EventMode::Polling);

    camera.set_drive_mode(DriveMode::High).unwrap();
    camera.set_shutter_speed(ShutterSpeed::new(1, 250).unwrap()).unwrap();

    let drive = camera.property(property::STILL_CAPTURE_MODE).unwrap().current;
    assert_eq!(drive, Value::UInt16(0x0002));
  }
}
