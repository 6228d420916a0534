//! Operation, property and event codes
//!
//! Standard codes come from PIMA 15740, Sony codes from observing the
//! Alpha series in remote control mode.

use crate::helper::code_names;

/// Operation codes
pub mod operation {
  /// GetDeviceInfo
  pub const GET_DEVICE_INFO: u16 = 0x1001;
  /// OpenSession
  pub const OPEN_SESSION: u16 = 0x1002;
  /// CloseSession
  pub const CLOSE_SESSION: u16 = 0x1003;
  /// GetObjectInfo
  pub const GET_OBJECT_INFO: u16 = 0x1008;
  /// GetObject
  pub const GET_OBJECT: u16 = 0x1009;
  /// GetDevicePropDesc
  pub const GET_DEVICE_PROP_DESC: u16 = 0x1014;

  /// Sony SDIOConnect
  pub const SONY_SDIO_CONNECT: u16 = 0x9201;
  /// Sony GetSDIOExtDevInfo
  pub const SONY_GET_SDIO_EXT_DEV_INFO: u16 = 0x9202;
  /// Sony GetDevicePropDesc
  pub const SONY_GET_DEVICE_PROP_DESC: u16 = 0x9203;
  /// Sony SetControlDeviceA, used for settings
  pub const SONY_SET_CONTROL_DEVICE_A: u16 = 0x9205;
  /// Sony SetControlDeviceB, used for buttons
  pub const SONY_SET_CONTROL_DEVICE_B: u16 = 0x9207;
  /// Sony GetAllDevPropData
  pub const SONY_GET_ALL_DEV_PROP_DATA: u16 = 0x9209;
}

/// Device property codes
pub mod property {
  /// F-number, in hundredths
  pub const F_NUMBER: u16 = 0x5007;
  /// Still capture mode (drive mode)
  pub const STILL_CAPTURE_MODE: u16 = 0x5013;

  /// Sony DPC compensation
  pub const SONY_DPC_COMPENSATION: u16 = 0xD200;
  /// Sony D-Range optimizer
  pub const SONY_D_RANGE_OPTIMIZE: u16 = 0xD201;
  /// Sony image size
  pub const SONY_IMAGE_SIZE: u16 = 0xD203;
  /// Sony shutter speed, packed as `numerator << 16 | denominator`
  pub const SONY_SHUTTER_SPEED: u16 = 0xD20D;
  /// Sony color temperature
  pub const SONY_COLOR_TEMP: u16 = 0xD20F;
  /// Sony CC filter
  pub const SONY_CC_FILTER: u16 = 0xD210;
  /// Sony aspect ratio
  pub const SONY_ASPECT_RATIO: u16 = 0xD211;
  /// Sony pending images; bit 15 signals that an image is ready
  pub const SONY_PENDING_IMAGES: u16 = 0xD215;
  /// Sony exposure index
  pub const SONY_EXPOSE_INDEX: u16 = 0xD216;
  /// Sony battery level
  pub const SONY_BATTERY_LEVEL: u16 = 0xD218;
  /// Sony picture effect
  pub const SONY_PICTURE_EFFECT: u16 = 0xD21B;
  /// Sony AB filter
  pub const SONY_AB_FILTER: u16 = 0xD21C;
  /// Sony ISO
  pub const SONY_ISO: u16 = 0xD21E;
  /// Sony AF lock button
  pub const SONY_CTRL_AF_LOCK: u16 = 0xD2C1;
  /// Sony shutter button
  pub const SONY_CTRL_SHUTTER: u16 = 0xD2C2;
  /// Sony AE lock button
  pub const SONY_CTRL_AE_LOCK: u16 = 0xD2C3;
  /// Sony still image button
  pub const SONY_CTRL_STILL_IMAGE: u16 = 0xD2C7;
  /// Sony movie button
  pub const SONY_CTRL_MOVIE: u16 = 0xD2C8;
}

/// Event codes
pub mod event {
  /// Sony: a captured object is available
  pub const SONY_OBJECT_ADDED: u16 = 0xC201;
  /// Sony: a device property changed
  pub const SONY_PROPERTY_CHANGED: u16 = 0xC203;
}

code_names!(
  fn standard_property_name {
    0x5000 => "Undefined",
    0x5001 => "Battery level",
    0x5002 => "Functional mode",
    0x5003 => "Image size",
    0x5004 => "Compression setting",
    0x5005 => "White balance",
    0x5006 => "RGB Gain",
    0x5007 => "F Number",
    0x5008 => "Focal length",
    0x5009 => "Focal distance",
    0x500A => "Focus mode",
    0x500B => "Exposure metering mode",
    0x500C => "Flash mode",
    0x500D => "Exposure time",
    0x500E => "Exposure program mode",
    0x500F => "Exposure index",
    0x5010 => "Exposure bias compensation",
    0x5011 => "Date/Time",
    0x5012 => "Capture delay",
    0x5013 => "Still capture mode",
    0x5014 => "Contrast",
    0x5015 => "Sharpness",
    0x5016 => "Digital zoom",
    0x5017 => "Effect mode",
    0x5018 => "Burst number",
    0x5019 => "Burst interval",
    0x501A => "Timelapse number",
    0x501B => "Timelapse interval",
    0x501C => "Focus metering mode",
    0x501D => "Upload URL",
    0x501E => "Artist",
    0x501F => "Copyright info",
  }
);

code_names!(
  fn sony_property_name {
    property::SONY_DPC_COMPENSATION => "DPC Compensation",
    property::SONY_D_RANGE_OPTIMIZE => "D-Range Optimize",
    property::SONY_IMAGE_SIZE => "Image size",
    property::SONY_SHUTTER_SPEED => "Shutter speed",
    property::SONY_COLOR_TEMP => "Color temperature",
    property::SONY_CC_FILTER => "CC Filter",
    property::SONY_ASPECT_RATIO => "Aspect ratio",
    property::SONY_PENDING_IMAGES => "Pending images",
    property::SONY_EXPOSE_INDEX => "Exposure index",
    property::SONY_BATTERY_LEVEL => "Battery level",
    property::SONY_PICTURE_EFFECT => "Picture effect",
    property::SONY_AB_FILTER => "AB Filter",
    property::SONY_ISO => "ISO",
    property::SONY_CTRL_AF_LOCK => "<CTRL> AF Lock",
    property::SONY_CTRL_SHUTTER => "<CTRL> Shutter",
    property::SONY_CTRL_AE_LOCK => "<CTRL> AE Lock",
    property::SONY_CTRL_STILL_IMAGE => "<CTRL> Still image",
    property::SONY_CTRL_MOVIE => "<CTRL> Movie",
  }
);

code_names!(
  fn standard_operation_name {
    0x1001 => "GetDeviceInfo",
    0x1002 => "OpenSession",
    0x1003 => "CloseSession",
    0x1004 => "GetStorageIDs",
    0x1005 => "GetStorageInfo",
    0x1006 => "GetNumObjects",
    0x1007 => "GetObjectHandles",
    0x1008 => "GetObjectInfo",
    0x1009 => "GetObject",
    0x100A => "GetThumb",
    0x100B => "DeleteObject",
    0x100C => "SendObjectInfo",
    0x100D => "SendObject",
    0x100E => "InitiateCapture",
    0x100F => "FormatStore",
    0x1010 => "ResetDevice",
    0x1011 => "SelfTest",
    0x1012 => "SetObjectProtection",
    0x1013 => "PowerDown",
    0x1014 => "GetDevicePropDesc",
    0x1015 => "GetDevicePropValue",
    0x1016 => "SetDevicePropValue",
    0x1017 => "ResetDevicePropValue",
    0x1018 => "TerminateOpenCapture",
    0x1019 => "MoveObject",
    0x101A => "CopyObject",
    0x101B => "GetPartialObject",
    0x101C => "InitiateOpenCapture",
  }
);

code_names!(
  fn sony_operation_name {
    operation::SONY_SDIO_CONNECT => "SDIOConnect",
    operation::SONY_GET_SDIO_EXT_DEV_INFO => "GetSDIOExtDevInfo",
    operation::SONY_GET_DEVICE_PROP_DESC => "GetDevicePropDesc",
    operation::SONY_SET_CONTROL_DEVICE_A => "SetControlDeviceA",
    operation::SONY_SET_CONTROL_DEVICE_B => "SetControlDeviceB",
    operation::SONY_GET_ALL_DEV_PROP_DATA => "GetAllDevPropData",
  }
);

/// Name of a device property, standard codes first, then Sony extensions
pub fn property_name(code: u16) -> Option<&'static str> {
  standard_property_name(code).or_else(|| sony_property_name(code))
}

/// Name of an operation, standard codes first, then Sony extensions
pub fn operation_name(code: u16) -> Option<&'static str> {
  standard_operation_name(code).or_else(|| sony_operation_name(code))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn standard_names_win_over_vendor_names() {
    assert_eq!(property_name(0x5001), Some("Battery level"));
    assert_eq!(property_name(property::SONY_ISO), Some("ISO"));
    assert_eq!(property_name(0xD2FF), None);
  }

  #[test]
  fn operation_names_cover_both_tables() {
    assert_eq!(operation_name(operation::OPEN_SESSION), Some("OpenSession"));
    assert_eq!(operation_name(operation::SONY_GET_ALL_DEV_PROP_DATA), Some("GetAllDevPropData"));
    assert_eq!(operation_name(0x9999), None);
  }
}
