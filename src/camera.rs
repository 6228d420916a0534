//! Camera related stuff
//!
//! A [`Camera`] is a PTP session with a Sony camera in PC remote mode. Settings and
//! buttons go through Sony's SetControlDevice operations, the state of the camera is
//! read back with GetAllDevPropData.
//!
//! ## Taking a picture
//! ```no_run
//! use sony_ptp::{camera::Button, Context, Result};
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let camera = Context::new()?.autodetect_camera()?;
//! camera.handshake()?;
//!
//! camera.press(Button::AfLock)?;
//! camera.press(Button::Shutter)?;
//! camera.release(Button::Shutter)?;
//! camera.release(Button::AfLock)?;
//!
//! let handle = camera.wait_object(Duration::from_secs(5))?;
//! let file = camera.download(handle)?;
//! file.save("picture.jpg")?;
//! # Ok(())
//! # }
//! ```

use crate::{
  codes::{event, operation, property},
  device::{DataPhase, Device, Event},
  error::{ensure, ErrorKind},
  file::{CameraFile, ObjectInfo},
  info::{DeviceInfo, SonyExtInfo},
  port::{PortInfo, Transport, UsbPort},
  property::{PropDesc, PropList, Value},
  thread::EventListener,
  Error, Result,
};
use std::{
  fmt,
  sync::Arc,
  time::{Duration, Instant},
};

/// Session opened by [`Camera::new`]
pub const SESSION_ID: u32 = 1;

/// Version requested from GetSDIOExtDevInfo
pub const SONY_EXT_VERSION: u32 = 200;

/// Handle under which Sony cameras expose the last captured image
pub const CAPTURED_OBJECT_HANDLE: u32 = 0xFFFF_C001;

const PRESS: u16 = 2;
const RELEASE: u16 = 1;
// Zero would block forever on libusb
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

/// How events are received
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventMode {
  /// A background thread reads events and queues them
  #[default]
  Listener,
  /// Events are read from the interrupt pipe when waited for
  Polling,
}

/// Buttons that can be pressed remotely
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Button {
  /// Half press, focus and lock
  AfLock,
  /// Full press
  Shutter,
  /// Exposure lock
  AeLock,
  /// Still image button
  StillImage,
  /// Movie button
  Movie,
}

impl Button {
  /// Control property code of the button
  pub fn code(self) -> u16 {
    match self {
      Self::AfLock => property::SONY_CTRL_AF_LOCK,
      Self::Shutter => property::SONY_CTRL_SHUTTER,
      Self::AeLock => property::SONY_CTRL_AE_LOCK,
      Self::StillImage => property::SONY_CTRL_STILL_IMAGE,
      Self::Movie => property::SONY_CTRL_MOVIE,
    }
  }
}

/// Images waiting on the camera to be transferred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingObjects {
  /// Number of pending images
  pub count: u16,
  /// An image can be transferred now
  pub ready: bool,
}

impl From<u16> for PendingObjects {
  fn from(raw: u16) -> Self {
    Self { count: raw & 0x7FFF, ready: raw & 0x8000 != 0 }
  }
}

/// Represents a camera
pub struct Camera<T: Transport = UsbPort> {
  device: Device<T>,
  listener: Option<EventListener>,
}

impl<T: Transport + 'static> Camera<T> {
  /// Open a session on the transport
  pub fn new(transport: Arc<T>, mode: EventMode) -> Result<Self> {
    let listener = match mode {
      EventMode::Listener => Some(EventListener::spawn(transport.clone())?),
      EventMode::Polling => None,
    };

    let device = Device::new(transport);
    device.open_session(SESSION_ID)?;

    Ok(Self { device, listener })
  }
}

impl<T: Transport> Camera<T> {
  /// Raw PTP device, for operations not wrapped here
  pub fn device(&self) -> &Device<T> {
    &self.device
  }

  /// How events are received
  pub fn event_mode(&self) -> EventMode {
    match self.listener {
      Some(_) => EventMode::Listener,
      None => EventMode::Polling,
    }
  }

  /// Put the camera into PC remote mode
  ///
  /// Must be called once after opening the camera, before any Sony operation.
  pub fn handshake(&self) -> Result<()> {
    self.sdio_connect(1)?;
    self.sdio_connect(2)?;
    self.sony_ext_info()?;
    self.sony_ext_info()?;
    self.sdio_connect(3)?;
    Ok(())
  }

  /// Run one phase of the Sony SDIO connection
  pub fn sdio_connect(&self, phase: u32) -> Result<()> {
    self.device.transact(operation::SONY_SDIO_CONNECT, &[phase, 0, 0], DataPhase::In)?.ok()?;
    Ok(())
  }

  /// Sony extended device information
  pub fn sony_ext_info(&self) -> Result<SonyExtInfo> {
    let response = self
      .device
      .transact(operation::SONY_GET_SDIO_EXT_DEV_INFO, &[SONY_EXT_VERSION], DataPhase::In)?
      .ok()?;

    SonyExtInfo::decode(&response.data)
  }

  /// Device information, including the Sony properties and controls
  pub fn device_info(&self) -> Result<DeviceInfo> {
    let response = self.device.transact(operation::GET_DEVICE_INFO, &[], DataPhase::In)?.ok()?;
    let mut info = DeviceInfo::decode(&response.data)?;

    info.merge_sony(&self.sony_ext_info()?);
    Ok(info)
  }

  /// All properties with their current values
  pub fn properties(&self) -> Result<PropList> {
    let response =
      self.device.transact(operation::SONY_GET_ALL_DEV_PROP_DATA, &[], DataPhase::In)?.ok()?;

    PropList::decode_sony(&response.data)
  }

  /// A single property
  pub fn property(&self, code: u16) -> Result<PropDesc> {
    self.properties()?.take(code).ok_or_else(|| {
      Error::new(ErrorKind::NotFound).with_info(format!("Property {:04X}h not reported", code))
    })
  }

  fn set_control(&self, operation: u16, code: u16, value: &Value) -> Result<()> {
    self
      .device
      .transact(operation, &[u32::from(code)], DataPhase::Out(&value.to_bytes()))?
      .ok()?;
    Ok(())
  }

  /// Write a setting with SetControlDeviceA
  pub fn set_control_a(&self, code: u16, value: &Value) -> Result<()> {
    self.set_control(operation::SONY_SET_CONTROL_DEVICE_A, code, value)
  }

  /// Write an `u16` setting
  pub fn set_control_a_u16(&self, code: u16, value: u16) -> Result<()> {
    self.set_control_a(code, &Value::UInt16(value))
  }

  /// Write an `u32` setting
  pub fn set_control_a_u32(&self, code: u16, value: u32) -> Result<()> {
    self.set_control_a(code, &Value::UInt32(value))
  }

  /// Operate a control with SetControlDeviceB
  pub fn set_control_b(&self, code: u16, value: &Value) -> Result<()> {
    self.set_control(operation::SONY_SET_CONTROL_DEVICE_B, code, value)
  }

  /// Operate a control with an `u16` value
  pub fn set_control_b_u16(&self, code: u16, value: u16) -> Result<()> {
    self.set_control_b(code, &Value::UInt16(value))
  }

  /// Operate a control with an `u32` value
  pub fn set_control_b_u32(&self, code: u16, value: u32) -> Result<()> {
    self.set_control_b(code, &Value::UInt32(value))
  }

  /// Step a property to the next (`up`) or previous value, like turning a dial
  pub fn adjust_property(&self, code: u16, up: bool) -> Result<()> {
    self.set_control_b(code, &Value::Int8(if up { 1 } else { -1 }))
  }

  /// Press a button
  pub fn press(&self, button: Button) -> Result<()> {
    self.set_control_b_u16(button.code(), PRESS)
  }

  /// Release a button
  pub fn release(&self, button: Button) -> Result<()> {
    self.set_control_b_u16(button.code(), RELEASE)
  }

  /// Images captured but not transferred yet
  pub fn pending_objects(&self) -> Result<PendingObjects> {
    let desc = self.property(property::SONY_PENDING_IMAGES)?;

    match desc.current {
      Value::UInt16(raw) => Ok(raw.into()),
      other => Err(
        Error::new(ErrorKind::PropertyType)
          .with_info(format!("Pending images is {}, expected UINT16", other.data_type().name())),
      ),
    }
  }

  /// Wait for the next event
  pub fn wait_event(&self, timeout: Duration) -> Result<Event> {
    match &self.listener {
      Some(listener) => listener.recv_timeout(timeout),
      None => self.device.wait_event(timeout),
    }
  }

  /// Drop events that arrived before now, returns how many were dropped
  pub(crate) fn discard_events(&self) -> usize {
    let mut discarded = 0;

    loop {
      let event = match &self.listener {
        Some(listener) => listener.try_recv(),
        None => self.device.wait_event(DRAIN_TIMEOUT).ok(),
      };
      let Some(event) = event else { break };

      tracing::trace!("Discarding {}", event);
      discarded += 1;
    }

    discarded
  }

  fn wait_for(&self, code: u16, timeout: Duration) -> Result<Event> {
    let deadline = Instant::now() + timeout;

    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      ensure!(!remaining.is_zero(), Timeout, "No event {:04X}h within {:?}", code, timeout);

      let event = self.wait_event(remaining)?;
      if event.code == code {
        return Ok(event);
      }

      tracing::trace!("Skipping {}", event);
    }
  }

  /// Wait until a captured image is available and return its handle
  pub fn wait_object(&self, timeout: Duration) -> Result<u32> {
    let handle = self.wait_for(event::SONY_OBJECT_ADDED, timeout)?.param()?;
    tracing::debug!("Got object {:08X}h", handle);
    Ok(handle)
  }

  /// Wait until a property changes and return its code
  pub fn wait_property(&self, timeout: Duration) -> Result<u16> {
    let param = self.wait_for(event::SONY_PROPERTY_CHANGED, timeout)?.param()?;
    let [low, high, ..] = param.to_le_bytes();
    Ok(u16::from_le_bytes([low, high]))
  }

  /// Information about an object
  pub fn object_info(&self, handle: u32) -> Result<ObjectInfo> {
    let response = self.device.transact(operation::GET_OBJECT_INFO, &[handle], DataPhase::In)?.ok()?;
    ObjectInfo::decode(&response.data)
  }

  /// Data of an object
  pub fn object(&self, handle: u32) -> Result<Vec<u8>> {
    let response = self.device.transact(operation::GET_OBJECT, &[handle], DataPhase::In)?.ok()?;
    Ok(response.data)
  }

  /// Transfer an object with its information
  pub fn download(&self, handle: u32) -> Result<CameraFile> {
    let info = self.object_info(handle)?;
    let data = self.object(handle)?;
    Ok(CameraFile::new(Some(info), data))
  }
}

impl Camera<UsbPort> {
  /// Port used to connect to the camera
  pub fn port_info(&self) -> &PortInfo {
    self.device.transport().info()
  }
}

impl<T: Transport> Drop for Camera<T> {
  fn drop(&mut self) {
    if let Err(err) = self.device.close_session() {
      tracing::warn!("Could not close session: {}", err);
    }
  }
}

impl<T: Transport> fmt::Debug for Camera<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Camera")
      .field("device", &self.device)
      .field("event_mode", &self.event_mode())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{property::Form, sample_camera, VirtualPort};

  #[test]
  fn session_lives_as_long_as_the_camera() {
    let (port, camera) = sample_camera(EventMode::Polling);
    assert!(port.camera().session_open());

    drop(camera);
    assert!(!port.camera().session_open());
  }

  #[test]
  fn handshake_sequence() {
    let (port, camera) = sample_camera(EventMode::Polling);
    camera.handshake().unwrap();

    let calls: Vec<_> =
      port.camera().operations().into_iter().map(|op| (op.code, op.params)).collect();
    assert_eq!(
      calls,
      [
        (0x1002, vec![1]),
        (0x9201, vec![1, 0, 0]),
        (0x9201, vec![2, 0, 0]),
        (0x9202, vec![200]),
        (0x9202, vec![200]),
        (0x9201, vec![3, 0, 0]),
      ]
    );
  }

  #[test]
  fn device_info_includes_sony_properties() {
    let (_port, camera) = sample_camera(EventMode::Polling);
    let info = camera.device_info().unwrap();

    assert_eq!(info.manufacturer, "Sony Corporation");
    assert_eq!(info.model, "ILCE-6000");
    assert!(info.properties.contains(&property::SONY_ISO));
    assert!(info.properties.contains(&property::SONY_CTRL_SHUTTER));
  }

  #[test]
  fn properties_are_listed() {
    let (_port, camera) = sample_camera(EventMode::Polling);
    let properties = camera.properties().unwrap();

    let iso = properties.get(property::SONY_ISO).unwrap();
    assert_eq!(iso.current, Value::UInt32(100));
    assert!(matches!(iso.form, Form::Enum(_)));

    let err = camera.property(0xD2FF).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
  }

  #[test]
  fn buttons_send_press_and_release() {
    let (port, camera) = sample_camera(EventMode::Polling);

    camera.press(Button::AfLock).unwrap();
    camera.release(Button::AfLock).unwrap();
    camera.press(Button::Movie).unwrap();

    assert_eq!(port.camera().button_log(), [(0xD2C1, 2), (0xD2C1, 1), (0xD2C8, 2)]);
  }

  #[test]
  fn shutter_press_produces_pending_images() {
    let (port, camera) = sample_camera(EventMode::Polling);
    port.camera().set_frames_per_press(2);

    assert_eq!(camera.pending_objects().unwrap(), PendingObjects { count: 0, ready: false });
    camera.press(Button::Shutter).unwrap();
    assert_eq!(camera.pending_objects().unwrap(), PendingObjects { count: 2, ready: true });
  }

  #[test]
  fn pending_images_property_is_checked() {
    let (port, camera) = sample_camera(EventMode::Polling);

    port.camera().set_property(ptp_test::Prop::read_only(
      property::SONY_PENDING_IMAGES,
      ptp_test::PropValue::UInt32(1),
    ));
    assert_eq!(camera.pending_objects().unwrap_err().kind(), ErrorKind::PropertyType);

    port.camera().remove_property(property::SONY_PENDING_IMAGES);
    assert_eq!(camera.pending_objects().unwrap_err().kind(), ErrorKind::NotFound);
  }

  #[test]
  fn pending_objects_bits() {
    assert_eq!(PendingObjects::from(0x8003), PendingObjects { count: 3, ready: true });
    assert_eq!(PendingObjects::from(0x0001), PendingObjects { count: 1, ready: false });
  }

  fn discards_queued_events(mode: EventMode) {
    let (port, camera) = sample_camera(mode);
    port.camera().push_event(event::SONY_OBJECT_ADDED, &[CAPTURED_OBJECT_HANDLE]);
    port.camera().push_event(event::SONY_PROPERTY_CHANGED, &[0xD215]);

    if mode == EventMode::Listener {
      // Let the listener pick both up
      std::thread::sleep(Duration::from_millis(100));
    }

    assert_eq!(camera.discard_events(), 2);
    let err = camera.wait_object(Duration::from_millis(50)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
  }

  #[test]
  fn discard_events_polling() {
    discards_queued_events(EventMode::Polling);
  }

  #[test]
  fn discard_events_listener() {
    discards_queued_events(EventMode::Listener);
  }

  fn wait_object_skips_other_events(mode: EventMode) {
    let (port, camera) = sample_camera(mode);

    port.camera().push_event(event::SONY_PROPERTY_CHANGED, &[0xD215]);
    port.camera().push_event(event::SONY_OBJECT_ADDED, &[CAPTURED_OBJECT_HANDLE]);

    assert_eq!(camera.wait_object(Duration::from_secs(2)).unwrap(), CAPTURED_OBJECT_HANDLE);
  }

  #[test]
  fn wait_object_polling() {
    wait_object_skips_other_events(EventMode::Polling);
  }

  #[test]
  fn wait_object_listener() {
    wait_object_skips_other_events(EventMode::Listener);
  }

  #[test]
  fn wait_property_returns_the_code() {
    let (port, camera) = sample_camera(EventMode::Listener);
    port.camera().push_event(event::SONY_PROPERTY_CHANGED, &[0x0001_D21E]);

    assert_eq!(camera.wait_property(Duration::from_secs(2)).unwrap(), 0xD21E);
  }

  fn events_without_parameter_fail(mode: EventMode) {
    let (port, camera) = sample_camera(mode);
    port.camera().push_event(event::SONY_OBJECT_ADDED, &[]);

    let err = camera.wait_object(Duration::from_secs(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResultParam);
  }

  #[test]
  fn events_without_parameter_fail_polling() {
    events_without_parameter_fail(EventMode::Polling);
  }

  #[test]
  fn events_without_parameter_fail_listener() {
    events_without_parameter_fail(EventMode::Listener);
  }

  #[test]
  fn waiting_times_out() {
    let (_port, camera) = sample_camera(EventMode::Polling);
    let err = camera.wait_object(Duration::from_millis(20)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
  }

  #[test]
  fn rejected_settings_report_the_response() {
    let (_port, camera) = sample_camera(EventMode::Polling);

    let err = camera.set_control_a_u32(property::SONY_ISO, 1234).unwrap_err();
    assert_eq!(
      err.kind(),
      ErrorKind::Response(crate::error::ResponseCode::INVALID_DEVICE_PROP_VALUE)
    );

    camera.set_control_a_u32(property::SONY_ISO, 1000).unwrap();
    assert_eq!(camera.property(property::SONY_ISO).unwrap().current, Value::UInt32(1000));
  }

  #[test]
  fn adjusting_steps_through_values() {
    let (_port, camera) = sample_camera(EventMode::Polling);

    camera.adjust_property(property::SONY_ISO, true).unwrap();
    assert_eq!(camera.property(property::SONY_ISO).unwrap().current, Value::UInt32(200));

    camera.adjust_property(property::SONY_ISO, false).unwrap();
    camera.adjust_property(property::SONY_ISO, false).unwrap();
    assert_eq!(camera.property(property::SONY_ISO).unwrap().current, Value::UInt32(100));
  }

  #[test]
  fn captured_image_is_downloaded() {
    let (_port, camera) = sample_camera(EventMode::Polling);
    camera.press(Button::Shutter).unwrap();

    let file = camera.download(CAPTURED_OBJECT_HANDLE).unwrap();
    assert_eq!(file.data(), ptp_test::sample_image().as_slice());

    let info = file.info().unwrap();
    assert_eq!(info.filename, "DSC00001.JPG");
    assert_eq!(usize::try_from(info.compressed_size).unwrap(), file.len());
  }

  #[test]
  fn unknown_objects_are_rejected() {
    let (_port, camera) = sample_camera(EventMode::Polling);
    let err = camera.object(0x1234).unwrap_err();
    assert_eq!(
      err.kind(),
      ErrorKind::Response(crate::error::ResponseCode::INVALID_OBJECT_HANDLE)
    );
  }

  #[test]
  fn listener_mode_is_reported() {
    let port = VirtualPort::new();
    let camera = Camera::new(port, EventMode::default()).unwrap();
    assert_eq!(camera.event_mode(), EventMode::Listener);
  }
}
