//! Burst capture
//!
//! The shutter is held down while images are transferred as soon as the camera reports
//! them, which keeps the camera's buffer from filling up during long bursts.
//!
//! ```no_run
//! use sony_ptp::{capture::BurstCapture, Context, Result};
//!
//! # fn main() -> Result<()> {
//! let camera = Context::new()?.autodetect_camera()?;
//! camera.handshake()?;
//!
//! let summary = BurstCapture::new(&camera, 30).output_dir("images").run()?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

use crate::{
  camera::{Button, Camera, CAPTURED_OBJECT_HANDLE},
  error::ErrorKind,
  file::CameraFile,
  port::{Transport, UsbPort},
  Error, Result,
};
use std::{
  fmt,
  path::PathBuf,
  time::{Duration, Instant},
};

/// How the capture loop learns that an image can be transferred
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WaitMode {
  /// Wait for an object added event
  #[default]
  Events,
  /// Poll the pending images property until it signals ready
  PendingPoll,
}

/// Burst of pictures taken with the shutter held down
pub struct BurstCapture<'a, T: Transport = UsbPort> {
  camera: &'a Camera<T>,
  count: u32,
  output_dir: Option<PathBuf>,
  wait_mode: WaitMode,
  event_timeout: Duration,
}

/// Outcome of a burst
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
  /// Pictures transferred
  pub taken: u32,
  /// Time from pressing the shutter to the last transfer
  pub elapsed: Duration,
  /// Bytes transferred
  pub bytes: u64,
}

impl CaptureSummary {
  /// Average time per picture
  pub fn per_picture(&self) -> Option<Duration> {
    (self.taken > 0).then(|| self.elapsed / self.taken)
  }
}

impl fmt::Display for CaptureSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.per_picture() {
      Some(per_picture) => write!(
        f,
        "Took {} pictures in {}.{:06} seconds ({}.{:06} sec/pic)",
        self.taken,
        self.elapsed.as_secs(),
        self.elapsed.subsec_micros(),
        per_picture.as_secs(),
        per_picture.subsec_micros()
      ),
      None => f.write_str("No pictures taken"),
    }
  }
}

struct Progress {
  taken: u32,
  pending: u16,
  bytes: u64,
}

impl<'a, T: Transport> BurstCapture<'a, T> {
  /// Burst of at least `count` pictures
  pub fn new(camera: &'a Camera<T>, count: u32) -> Self {
    Self {
      camera,
      count,
      output_dir: None,
      wait_mode: WaitMode::default(),
      event_timeout: Duration::from_secs(10),
    }
  }

  /// Save images as `output-<index>.jpg` into `dir`
  pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = Some(dir.into());
    self
  }

  /// How to wait for images
  pub fn wait_mode(mut self, wait_mode: WaitMode) -> Self {
    self.wait_mode = wait_mode;
    self
  }

  /// How long to wait for the next image before giving up
  pub fn event_timeout(mut self, timeout: Duration) -> Self {
    self.event_timeout = timeout;
    self
  }

  /// Take the pictures
  ///
  /// The shutter and AF lock are released at the end, also when the burst fails.
  pub fn run(&self) -> Result<CaptureSummary> {
    let mut progress = Progress { taken: 0, pending: 0, bytes: 0 };

    // Events of earlier bursts must not count as images of this one
    let stale = self.camera.discard_events();
    if stale > 0 {
      tracing::debug!("Discarded {} queued events", stale);
    }

    let start = Instant::now();
    let result = self
      .camera
      .press(Button::AfLock)
      .and_then(|()| self.camera.press(Button::Shutter))
      .and_then(|()| self.shoot(&mut progress));
    let elapsed = start.elapsed();

    // Make sure the buttons are up again
    self.release_buttons();

    let summary = CaptureSummary { taken: progress.taken, elapsed, bytes: progress.bytes };
    match result {
      Ok(()) => {
        tracing::info!("{}", summary);
        Ok(summary)
      }
      Err(err) => {
        tracing::warn!("Burst stopped after {} pictures: {}", progress.taken, err);
        Err(err)
      }
    }
  }

  fn shoot(&self, progress: &mut Progress) -> Result<()> {
    let mut not_ready_since = Instant::now();

    while progress.taken < self.count || progress.pending > 0 {
      let status = self.camera.pending_objects()?;
      progress.pending = status.count;

      match self.wait_mode {
        WaitMode::PendingPoll => {
          if !status.ready {
            if not_ready_since.elapsed() > self.event_timeout {
              return Err(
                Error::new(ErrorKind::Timeout)
                  .with_info(format!("No image ready within {:?}", self.event_timeout)),
              );
            }
            continue;
          }
        }
        WaitMode::Events => {
          if progress.taken >= self.count && progress.pending == 0 {
            break;
          }
          self.camera.wait_object(self.event_timeout)?;
        }
      }

      tracing::info!(
        "[{}/{}] Transferring image... (pending: {}+{})",
        progress.taken + 1,
        self.count,
        progress.pending,
        u8::from(status.ready)
      );

      progress.bytes += self.transfer(progress.taken)?;
      progress.taken += 1;
      not_ready_since = Instant::now();

      if progress.taken == self.count {
        self.release_buttons();
      }
    }

    Ok(())
  }

  fn transfer(&self, index: u32) -> Result<u64> {
    let start = Instant::now();

    let info = self.camera.object_info(CAPTURED_OBJECT_HANDLE)?;
    let data = self.camera.object(CAPTURED_OBJECT_HANDLE)?;
    let elapsed = start.elapsed();

    let size = u32::try_from(data.len()).unwrap_or(u32::MAX);
    let rate = f64::from(size) / elapsed.as_secs_f64().max(f64::EPSILON) / (1024.0 * 1024.0);
    tracing::info!("Image size:    {} bytes", size);
    tracing::info!("Transfer time: {}.{:06} s", elapsed.as_secs(), elapsed.subsec_micros());
    tracing::info!("Transfer rate: {:.2} MB/s", rate);

    if let Some(dir) = &self.output_dir {
      CameraFile::new(Some(info), data).save(dir.join(format!("output-{}.jpg", index)))?;
    }

    Ok(u64::from(size))
  }

  fn release_buttons(&self) {
    for button in [Button::Shutter, Button::AfLock] {
      if let Err(err) = self.camera.release(button) {
        tracing::warn!("Could not release {:?}: {}", button, err);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{camera::EventMode, sample_camera};
  use std::fs;

  fn burst(mode: EventMode, wait_mode: WaitMode) {
    let (port, camera) = sample_camera(mode);
    port.camera().set_frames_per_press(3);
    let dir = tempfile::tempdir().unwrap();

    let summary = BurstCapture::new(&camera, 3)
      .output_dir(dir.path())
      .wait_mode(wait_mode)
      .event_timeout(Duration::from_secs(2))
      .run()
      .unwrap();

    assert_eq!(summary.taken, 3);
    assert_eq!(summary.bytes, 3 * u64::try_from(ptp_test::sample_image().len()).unwrap());
    for index in 0..3 {
      let saved = fs::read(dir.path().join(format!("output-{}.jpg", index))).unwrap();
      assert_eq!(saved, ptp_test::sample_image());
    }

    let buttons = port.camera().button_log();
    assert_eq!(buttons[..2], [(0xD2C1, 2), (0xD2C2, 2)]);
    assert_eq!(buttons[buttons.len() - 2..], [(0xD2C2, 1), (0xD2C1, 1)]);
  }

  #[test]
  fn burst_with_events() {
    burst(EventMode::Listener, WaitMode::Events);
  }

  #[test]
  fn burst_with_polled_events() {
    burst(EventMode::Polling, WaitMode::Events);
  }

  #[test]
  fn burst_polling_pending_images() {
    burst(EventMode::Polling, WaitMode::PendingPoll);
  }

  #[test]
  fn extra_pending_images_are_transferred() {
    let (port, camera) = sample_camera(EventMode::Listener);
    port.camera().set_frames_per_press(4);
    let dir = tempfile::tempdir().unwrap();

    let summary = BurstCapture::new(&camera, 3)
      .output_dir(dir.path())
      .event_timeout(Duration::from_secs(2))
      .run()
      .unwrap();

    assert_eq!(summary.taken, 4);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    assert!(dir.path().join("output-3.jpg").is_file());
  }

  #[test]
  fn second_burst_ignores_events_of_the_first() {
    let (port, camera) = sample_camera(EventMode::Listener);
    port.camera().set_frames_per_press(3);

    let first = BurstCapture::new(&camera, 3)
      .wait_mode(WaitMode::PendingPoll)
      .event_timeout(Duration::from_secs(2))
      .run()
      .unwrap();
    assert_eq!(first.taken, 3);

    // Let the listener queue the object added events nobody waited for
    std::thread::sleep(Duration::from_millis(100));
    port.camera().set_frames_per_press(0);

    let err = BurstCapture::new(&camera, 1)
      .event_timeout(Duration::from_millis(300))
      .run()
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
  }

  #[test]
  fn empty_burst_releases_the_buttons() {
    let (port, camera) = sample_camera(EventMode::Polling);
    port.camera().set_frames_per_press(0);

    let summary = BurstCapture::new(&camera, 0).run().unwrap();
    assert_eq!(summary.taken, 0);
    assert_eq!(summary.to_string(), "No pictures taken");
    assert_eq!(
      port.camera().button_log(),
      [(0xD2C1, 2), (0xD2C2, 2), (0xD2C2, 1), (0xD2C1, 1)]
    );
  }

  #[test]
  fn failed_save_stops_the_burst() {
    let (port, camera) = sample_camera(EventMode::Polling);
    port.camera().set_frames_per_press(2);
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("output-0.jpg"), b"").unwrap();

    let err = BurstCapture::new(&camera, 2).output_dir(dir.path()).run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileExists);

    let buttons = port.camera().button_log();
    assert_eq!(buttons[buttons.len() - 2..], [(0xD2C2, 1), (0xD2C1, 1)]);
  }

  #[test]
  fn missing_images_time_out() {
    let (port, camera) = sample_camera(EventMode::Polling);
    port.camera().set_frames_per_press(0);

    let err = BurstCapture::new(&camera, 1)
      .wait_mode(WaitMode::PendingPoll)
      .event_timeout(Duration::from_millis(50))
      .run()
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
  }

  #[test]
  fn summary_display() {
    let summary =
      CaptureSummary { taken: 4, elapsed: Duration::from_micros(2_500_000), bytes: 4096 };

    assert_eq!(summary.per_picture(), Some(Duration::from_micros(625_000)));
    insta::assert_snapshot!(
      summary.to_string(),
      @"Took 4 pictures in 2.500000 seconds (0.625000 sec/pic)"
    );
  }
}
