mod logging;

use sony_ptp::{codes::property_name, error::ErrorKind, Context, Result};
use std::time::Duration;

fn main() -> Result<()> {
  logging::setup();

  let camera = Context::new()?.autodetect_camera()?;
  camera.handshake()?;

  loop {
    let code = match camera.wait_property(Duration::from_secs(10)) {
      Ok(code) => code,
      Err(err) if err.kind() == ErrorKind::Timeout => break,
      Err(err) => return Err(err),
    };

    match camera.property(code) {
      Ok(property) => println!("{}", property),
      Err(_) => println!("<{:04X}h> {} changed", code, property_name(code).unwrap_or("?")),
    }
  }

  Ok(())
}
