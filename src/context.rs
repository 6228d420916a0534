//! Library context
//!
//! The context owns the libusb session and is the entry point to find and open cameras.
//!
//! ## Opening the Alpha 6000
//! ```no_run
//! use sony_ptp::{Context, PID_SONY_A6000, Result, VID_SONY};
//!
//! # fn main() -> Result<()> {
//! let context = Context::new()?;
//!
//! for camera in context.list_cameras()? {
//!   println!("Found {}", camera);
//! }
//!
//! let camera = context.open_camera(VID_SONY, PID_SONY_A6000)?;
//! camera.handshake()?;
//! # Ok(())
//! # }
//! ```

use crate::{
  camera::{Camera, EventMode},
  error::ErrorKind,
  list::{self, CameraListIter},
  port::UsbPort,
  Error, Result,
};
use std::{fmt, sync::Arc};

/// Vendor ID of Sony
pub const VID_SONY: u16 = 0x054C;
/// Product ID of the Sony Alpha 6000 (ILCE-6000)
pub const PID_SONY_A6000: u16 = 0x094E;

/// USB context used to find and open cameras
#[derive(Clone)]
pub struct Context {
  inner: rusb::Context,
}

impl Context {
  /// Create a new context
  pub fn new() -> Result<Self> {
    Ok(Self { inner: rusb::Context::new()? })
  }

  /// Lists all connected cameras with a PTP interface
  pub fn list_cameras(&self) -> Result<CameraListIter> {
    let cameras = list::still_image_devices(&self.inner)?;
    Ok(CameraListIter::new(cameras.into_iter().map(|(_, descriptor)| descriptor).collect()))
  }

  /// Open and claim the PTP interface of a device, without starting a session
  pub fn open_port(&self, vendor_id: u16, product_id: u16) -> Result<UsbPort> {
    use rusb::UsbContext;

    let handle = self
      .inner
      .open_device_with_vid_pid(vendor_id, product_id)
      .ok_or_else(|| Error::new(ErrorKind::NotFound).with_info("Camera not detected"))?;

    UsbPort::open(handle)
  }

  /// Open a camera by vendor and product ID with the event listener running
  pub fn open_camera(&self, vendor_id: u16, product_id: u16) -> Result<Camera> {
    self.open_camera_with(vendor_id, product_id, EventMode::Listener)
  }

  /// Open a camera by vendor and product ID
  pub fn open_camera_with(&self, vendor_id: u16, product_id: u16, mode: EventMode) -> Result<Camera> {
    let port = self.open_port(vendor_id, product_id)?;
    Camera::new(Arc::new(port), mode)
  }

  /// Open the first connected camera
  pub fn autodetect_camera(&self) -> Result<Camera> {
    let (device, descriptor) = list::still_image_devices(&self.inner)?
      .into_iter()
      .next()
      .ok_or_else(|| Error::new(ErrorKind::NotFound).with_info("Camera not detected"))?;

    tracing::info!("Using camera at {}", descriptor);

    let port = UsbPort::open(device.open()?)?;
    Camera::new(Arc::new(port), EventMode::Listener)
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context").finish_non_exhaustive()
  }
}
