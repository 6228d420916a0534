//! List of connected cameras

use crate::{port::STILL_IMAGE_CLASS, Result};
use rusb::UsbContext;
use std::fmt;

/// USB identity and location of a connected camera
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraDescriptor {
  /// Vendor ID
  pub vendor_id: u16,
  /// Product ID
  pub product_id: u16,
  /// USB bus number
  pub bus: u8,
  /// Address on the bus
  pub address: u8,
}

impl fmt::Display for CameraDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "usb:{:03},{:03} [{:04x}:{:04x}]", self.bus, self.address, self.vendor_id, self.product_id)
  }
}

/// Iterator over connected cameras.
#[derive(Debug)]
pub struct CameraListIter {
  cameras: std::vec::IntoIter<CameraDescriptor>,
}

impl Iterator for CameraListIter {
  type Item = CameraDescriptor;

  fn next(&mut self) -> Option<Self::Item> {
    self.cameras.next()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.cameras.size_hint()
  }
}

impl ExactSizeIterator for CameraListIter {
  fn len(&self) -> usize {
    self.cameras.len()
  }
}

impl CameraListIter {
  pub(crate) fn new(cameras: Vec<CameraDescriptor>) -> Self {
    Self { cameras: cameras.into_iter() }
  }
}

/// Whether the device exposes a still image (PTP) interface
fn is_still_image<T: UsbContext>(device: &rusb::Device<T>) -> bool {
  let Ok(config) = device.active_config_descriptor() else {
    return false;
  };

  config
    .interfaces()
    .flat_map(|interface| interface.descriptors())
    .any(|descriptor| descriptor.class_code() == STILL_IMAGE_CLASS)
}

/// Connected devices with a still image interface
pub(crate) fn still_image_devices<T: UsbContext>(
  context: &T,
) -> Result<Vec<(rusb::Device<T>, CameraDescriptor)>> {
  let mut cameras = Vec::new();

  for device in context.devices()?.iter() {
    if !is_still_image(&device) {
      continue;
    }

    let descriptor = match device.device_descriptor() {
      Ok(descriptor) => descriptor,
      Err(err) => {
        tracing::debug!("Skipping device without descriptor: {}", err);
        continue;
      }
    };

    let camera = CameraDescriptor {
      vendor_id: descriptor.vendor_id(),
      product_id: descriptor.product_id(),
      bus: device.bus_number(),
      address: device.address(),
    };

    cameras.push((device, camera));
  }

  Ok(cameras)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn descriptor_display() {
    let descriptor = CameraDescriptor { vendor_id: 0x054C, product_id: 0x094E, bus: 2, address: 7 };
    insta::assert_snapshot!(descriptor.to_string(), @"usb:002,007 [054c:094e]");
  }

  #[test]
  fn iterator_knows_its_length() {
    let descriptor = CameraDescriptor { vendor_id: 0x054C, product_id: 0x094E, bus: 2, address: 7 };
    let mut iter = CameraListIter::new(vec![descriptor.clone(), descriptor]);

    assert_eq!(iter.len(), 2);
    iter.next();
    assert_eq!(iter.len(), 1);
  }
}
