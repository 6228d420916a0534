//! USB transport
//!
//! [`Transport`] is the seam between the PTP transaction engine and the wire. The
//! library talks to real cameras through [`UsbPort`], a libusb device handle with the
//! still image interface claimed.

use crate::{Error, Result};
use rusb::UsbContext;
use std::{fmt, time::Duration};

/// USB interface class of PTP (still image) devices
pub const STILL_IMAGE_CLASS: u8 = 6;

/// Default timeout of bulk transfers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint addresses used by PTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Endpoints {
  /// Bulk IN, data and responses from the camera
  pub bulk_in: u8,
  /// Bulk OUT, commands and data to the camera
  pub bulk_out: u8,
  /// Interrupt IN, events
  pub interrupt: u8,
}

impl Default for Endpoints {
  fn default() -> Self {
    Self { bulk_in: 0x81, bulk_out: 0x02, interrupt: 0x83 }
  }
}

/// Byte transport between the host and a PTP device
///
/// Implementations map their errors to [`ErrorKind`](crate::error::ErrorKind): timeouts to
/// `Timeout`, stalled endpoints to `Pipe` and a vanished device to `NoDevice`.
pub trait Transport: Send + Sync {
  /// Write `data` to the bulk OUT endpoint, returning the number of bytes written
  fn write_bulk(&self, data: &[u8], timeout: Duration) -> Result<usize>;

  /// Read from the bulk IN endpoint into `buf`, returning the number of bytes read
  fn read_bulk(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

  /// Read from the interrupt endpoint into `buf`, returning the number of bytes read
  fn read_interrupt(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

  /// Clear a halt (stall) condition on an endpoint
  fn clear_halt(&self, endpoint: u8) -> Result<()>;

  /// Endpoints used by the transport
  fn endpoints(&self) -> Endpoints;

  /// Timeout used for bulk transfers
  fn timeout(&self) -> Duration {
    DEFAULT_TIMEOUT
  }
}

/// Negotiated speed of the USB connection
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Speed {
  /// The speed is unknown
  Unknown,
  /// 1.5 Mbps
  Low,
  /// 12 Mbps
  Full,
  /// 480 Mbps
  High,
  /// 5 Gbps
  Super,
  /// 10 Gbps
  SuperPlus,
}

impl From<rusb::Speed> for Speed {
  fn from(speed: rusb::Speed) -> Self {
    match speed {
      rusb::Speed::Low => Self::Low,
      rusb::Speed::Full => Self::Full,
      rusb::Speed::High => Self::High,
      rusb::Speed::Super => Self::Super,
      rusb::Speed::SuperPlus => Self::SuperPlus,
      _ => Self::Unknown,
    }
  }
}

impl fmt::Display for Speed {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Unknown => "unknown speed",
      Self::Low => "low speed (1.5Mbps)",
      Self::Full => "full speed (12Mbps)",
      Self::High => "high speed (480Mbps)",
      Self::Super => "super speed (5Gbps)",
      Self::SuperPlus => "super speed plus (10Gbps)",
    })
  }
}

/// Where the camera is connected
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
  /// USB bus number
  pub bus: u8,
  /// Address on the bus
  pub address: u8,
  /// Vendor ID
  pub vendor_id: u16,
  /// Product ID
  pub product_id: u16,
  /// Connection speed
  pub speed: Speed,
}

impl fmt::Display for PortInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "usb:{:03},{:03} [{:04x}:{:04x}] {}",
      self.bus, self.address, self.vendor_id, self.product_id, self.speed
    )
  }
}

/// PTP interface of a USB device, claimed for the lifetime of the port
pub struct UsbPort {
  handle: rusb::DeviceHandle<rusb::Context>,
  interface: u8,
  endpoints: Endpoints,
  info: PortInfo,
  timeout: Duration,
}

/// Find the still image interface and its endpoints
fn find_interface<T: UsbContext>(device: &rusb::Device<T>) -> Result<(u8, Endpoints)> {
  let config = device.active_config_descriptor()?;

  let still_image = config
    .interfaces()
    .flat_map(|interface| interface.descriptors())
    .find(|descriptor| descriptor.class_code() == STILL_IMAGE_CLASS);

  let Some(descriptor) = still_image else {
    tracing::warn!("No still image interface found, using interface 0");
    return Ok((0, Endpoints::default()));
  };

  let mut endpoints = Endpoints::default();

  for endpoint in descriptor.endpoint_descriptors() {
    match (endpoint.transfer_type(), endpoint.direction()) {
      (rusb::TransferType::Bulk, rusb::Direction::In) => endpoints.bulk_in = endpoint.address(),
      (rusb::TransferType::Bulk, rusb::Direction::Out) => endpoints.bulk_out = endpoint.address(),
      (rusb::TransferType::Interrupt, rusb::Direction::In) => {
        endpoints.interrupt = endpoint.address()
      }
      _ => {}
    }
  }

  Ok((descriptor.interface_number(), endpoints))
}

impl UsbPort {
  /// Claim the PTP interface of an opened device
  pub fn open(handle: rusb::DeviceHandle<rusb::Context>) -> Result<Self> {
    let device = handle.device();
    let descriptor = device.device_descriptor()?;
    let (interface, endpoints) = find_interface(&device)?;

    // Not supported on every platform
    if let Err(err) = handle.set_auto_detach_kernel_driver(true) {
      tracing::debug!("Kernel driver auto-detach unavailable: {}", err);
    }

    handle.claim_interface(interface).map_err(|err| {
      Error::from(err).with_info(format!("Could not claim interface {}", interface))
    })?;

    let info = PortInfo {
      bus: device.bus_number(),
      address: device.address(),
      vendor_id: descriptor.vendor_id(),
      product_id: descriptor.product_id(),
      speed: device.speed().into(),
    };

    tracing::debug!(?endpoints, interface, "Opened {}", info);

    Ok(Self { handle, interface, endpoints, info, timeout: DEFAULT_TIMEOUT })
  }

  /// Change the timeout of bulk transfers
  pub fn set_timeout(&mut self, timeout: Duration) {
    self.timeout = timeout;
  }

  /// Bus, address and speed of the device
  pub fn info(&self) -> &PortInfo {
    &self.info
  }
}

impl Transport for UsbPort {
  fn write_bulk(&self, data: &[u8], timeout: Duration) -> Result<usize> {
    Ok(self.handle.write_bulk(self.endpoints.bulk_out, data, timeout)?)
  }

  fn read_bulk(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
    Ok(self.handle.read_bulk(self.endpoints.bulk_in, buf, timeout)?)
  }

  fn read_interrupt(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
    Ok(self.handle.read_interrupt(self.endpoints.interrupt, buf, timeout)?)
  }

  fn clear_halt(&self, endpoint: u8) -> Result<()> {
    Ok(self.handle.clear_halt(endpoint)?)
  }

  fn endpoints(&self) -> Endpoints {
    self.endpoints
  }

  fn timeout(&self) -> Duration {
    self.timeout
  }
}

impl Drop for UsbPort {
  fn drop(&mut self) {
    if let Err(err) = self.handle.release_interface(self.interface) {
      tracing::warn!("Could not release interface {}: {}", self.interface, err);
    }
  }
}

impl fmt::Debug for UsbPort {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UsbPort")
      .field("interface", &self.interface)
      .field("endpoints", &self.endpoints)
      .field("info", &self.info)
      .field("timeout", &self.timeout)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn speed_names() {
    assert_eq!(Speed::High.to_string(), "high speed (480Mbps)");
    assert_eq!(Speed::from(rusb::Speed::Full), Speed::Full);
    assert_eq!(Speed::from(rusb::Speed::Unknown).to_string(), "unknown speed");
  }

  #[test]
  fn port_info_display() {
    let info = PortInfo {
      bus: 1,
      address: 12,
      vendor_id: 0x054C,
      product_id: 0x094E,
      speed: Speed::High,
    };

    insta::assert_snapshot!(info.to_string(), @"usb:001,012 [054c:094e] high speed (480Mbps)");
  }

  #[test]
  fn fallback_endpoints() {
    let endpoints = Endpoints::default();
    assert_eq!((endpoints.bulk_in, endpoints.bulk_out, endpoints.interrupt), (0x81, 0x02, 0x83));
  }
}
