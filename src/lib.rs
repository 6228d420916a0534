#![doc = include_str!("../README.md")]
#![deny(unused_must_use)]
#![deny(missing_docs)] // Force documentation on all public API's
#![deny(clippy::as_conversions)]

pub mod camera;
pub mod capture;
pub mod codes;
pub mod container;
pub mod context;
pub mod dataset;
pub mod device;
pub mod error;
pub mod file;
pub(crate) mod helper;
pub mod info;
pub mod list;
pub mod port;
pub mod property;
pub mod settings;
pub(crate) mod thread;

#[doc(inline)]
pub use crate::{
  camera::Camera,
  context::{Context, PID_SONY_A6000, VID_SONY},
  error::{Error, Result},
};

/// Get the version of the libusb library used
pub fn library_version() -> String {
  let version = rusb::version();
  format!("{}.{}.{}.{}", version.major(), version.minor(), version.micro(), version.nano())
}

/// Virtual camera from `ptp_test` as a [`Transport`](port::Transport)
#[cfg(test)]
pub(crate) struct VirtualPort(ptp_test::VirtualCamera);

#[cfg(test)]
impl VirtualPort {
  pub fn new() -> std::sync::Arc<Self> {
    std::sync::Arc::new(Self(ptp_test::VirtualCamera::new()))
  }

  pub fn camera(&self) -> &ptp_test::VirtualCamera {
    &self.0
  }
}

#[cfg(test)]
fn map_virtual(err: ptp_test::VirtualError) -> Error {
  use error::ErrorKind;

  match err {
    ptp_test::VirtualError::Timeout => ErrorKind::Timeout.into(),
    ptp_test::VirtualError::Pipe => ErrorKind::Pipe.into(),
    ptp_test::VirtualError::NoDevice => ErrorKind::NoDevice.into(),
    ptp_test::VirtualError::Protocol(msg) => Error::new(ErrorKind::Other).with_info(msg),
  }
}

#[cfg(test)]
impl port::Transport for VirtualPort {
  fn write_bulk(&self, data: &[u8], _timeout: std::time::Duration) -> Result<usize> {
    self.0.write(data).map_err(map_virtual)
  }

  fn read_bulk(&self, buf: &mut [u8], _timeout: std::time::Duration) -> Result<usize> {
    self.0.read(buf).map_err(map_virtual)
  }

  fn read_interrupt(&self, buf: &mut [u8], timeout: std::time::Duration) -> Result<usize> {
    self.0.read_event(buf, timeout).map_err(map_virtual)
  }

  fn clear_halt(&self, endpoint: u8) -> Result<()> {
    self.0.clear_halt(endpoint);
    Ok(())
  }

  fn endpoints(&self) -> port::Endpoints {
    port::Endpoints::default()
  }
}

#[cfg(test)]
fn sample_camera(
  mode: camera::EventMode,
) -> (std::sync::Arc<VirtualPort>, Camera<VirtualPort>) {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};

  static INIT: Once = Once::new();
  INIT.call_once(|| {
    // Logs are captured by the test harness and only shown for failing tests
    fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive("sony_ptp=trace".parse().unwrap()))
      .with_test_writer()
      .init();
  });

  let port = VirtualPort::new();
  let camera = Camera::new(port.clone(), mode).unwrap();
  (port, camera)
}

#[test]
fn test_version() {
  assert!(library_version().starts_with("1."));
}
