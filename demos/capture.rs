mod logging;

use sony_ptp::{
  capture::BurstCapture,
  file::ensure_dir,
  settings::{Aperture, CaptureParams, DriveMode, Iso, ShutterSpeed},
  Context, Result, PID_SONY_A6000, VID_SONY,
};

const OUTPUT_DIR: &str = "images";
const PICTURES: u32 = 30;

fn main() -> Result<()> {
  logging::setup();

  ensure_dir(OUTPUT_DIR)?;

  let camera = Context::new()?.open_camera(VID_SONY, PID_SONY_A6000)?;
  camera.handshake()?;

  let params = CaptureParams::new()
    .iso(Iso::new(1000)?)
    .shutter_speed(ShutterSpeed::new(1, 2000)?)
    .aperture(Aperture::new(5.6)?)
    .drive_mode(DriveMode::Low);
  camera.set_params(&params)?;

  let summary = BurstCapture::new(&camera, PICTURES).output_dir(OUTPUT_DIR).run()?;
  println!("{}", summary);

  Ok(())
}
