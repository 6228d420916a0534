use crate::{
  device::{self, Event},
  error::ErrorKind,
  port::Transport,
  Result,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread::{self, JoinHandle},
  time::Duration,
};

/// Length of a single interrupt read, bounds how long dropping the listener blocks
pub const EVENT_SLICE: Duration = Duration::from_millis(250);

/// Reads events on a background thread and queues them
pub struct EventListener {
  handle: Option<JoinHandle<()>>,
  stop: Arc<AtomicBool>,
  events: Receiver<Event>,
}

impl EventListener {
  pub fn spawn<T: Transport + 'static>(transport: Arc<T>) -> Result<Self> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let stop = Arc::new(AtomicBool::new(false));

    let stop_clone = stop.clone();
    let handle = thread::Builder::new()
      .name("ptp-events".to_string()) // Give the thread a name for debugging
      .spawn(move || listen(&*transport, &tx, &stop_clone))?;

    Ok(Self { handle: Some(handle), stop, events: rx })
  }

  pub fn recv_timeout(&self, timeout: Duration) -> Result<Event> {
    self.events.recv_timeout(timeout).map_err(|err| match err {
      RecvTimeoutError::Timeout => ErrorKind::Timeout.into(),
      RecvTimeoutError::Disconnected => {
        crate::Error::new(ErrorKind::NoDevice).with_info("Event listener stopped")
      }
    })
  }

  pub fn try_recv(&self) -> Option<Event> {
    match self.events.try_recv() {
      Ok(event) => Some(event),
      Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
    }
  }
}

fn listen<T: Transport + ?Sized>(transport: &T, tx: &Sender<Event>, stop: &AtomicBool) {
  while !stop.load(Ordering::Relaxed) {
    match device::read_event(transport, EVENT_SLICE) {
      Ok(event) => {
        tracing::trace!("{}", event);

        if tx.send(event).is_err() {
          break;
        }
      }
      Err(err) => match err.kind() {
        ErrorKind::Timeout => {}
        ErrorKind::NoDevice => {
          tracing::warn!("Device gone, event listener stops");
          break;
        }
        _ => {
          tracing::warn!("Event transfer failed: {}", err);
          thread::sleep(EVENT_SLICE);
        }
      },
    }
  }
}

impl Drop for EventListener {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::Relaxed);

    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        tracing::warn!("Event listener thread panicked");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{codes::event, VirtualPort};

  #[test]
  fn events_arrive_in_order() {
    let port = VirtualPort::new();
    let listener = EventListener::spawn(port.clone()).unwrap();

    port.camera().push_event(event::SONY_OBJECT_ADDED, &[0xFFFF_C001]);
    port.camera().push_event(event::SONY_PROPERTY_CHANGED, &[0xD215]);

    let first = listener.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = listener.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(first.code, event::SONY_OBJECT_ADDED);
    assert_eq!(second.params, [0xD215]);
    assert!(listener.try_recv().is_none());
  }

  #[test]
  fn listener_stops_when_the_device_is_gone() {
    let port = VirtualPort::new();
    let listener = EventListener::spawn(port.clone()).unwrap();

    port.camera().push_event(event::SONY_OBJECT_ADDED, &[0xFFFF_C001]);
    assert_eq!(listener.recv_timeout(Duration::from_secs(2)).unwrap().code, event::SONY_OBJECT_ADDED);

    port.camera().disconnect();
    let err = listener.recv_timeout(Duration::from_secs(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoDevice);
    assert!(listener.try_recv().is_none());
  }

  #[test]
  fn idle_listener_times_out_and_stops() {
    let port = VirtualPort::new();
    let listener = EventListener::spawn(port).unwrap();

    let err = listener.recv_timeout(Duration::from_millis(50)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    drop(listener);
  }
}
