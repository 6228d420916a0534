mod logging;

use sony_ptp::{
  settings::{CaptureParams, DriveMode},
  Context, Result, PID_SONY_A6000, VID_SONY,
};

fn main() -> Result<()> {
  logging::setup();

  let camera = Context::new()?.open_camera(VID_SONY, PID_SONY_A6000)?;
  camera.handshake()?;

  camera.set_params(&CaptureParams::new().drive_mode(DriveMode::Low))?;
  // camera.set_params(&CaptureParams::new().iso("1000".parse()?))?;
  // camera.set_params(&CaptureParams::new().shutter_speed("1/2000".parse()?))?;

  Ok(())
}
