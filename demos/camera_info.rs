mod logging;

use sony_ptp::{library_version, Context, Result};

fn main() -> Result<()> {
  logging::setup();

  let camera = Context::new()?.autodetect_camera()?;
  camera.handshake()?;

  println!("==== PORT       ====\n{}", camera.port_info());
  println!("libusb {}", library_version());
  println!("==== DEVICE     ====\n{}", camera.device_info()?);
  println!("==== PROPERTIES ====");

  for property in &camera.properties()? {
    println!("{}", property);
  }

  Ok(())
}
