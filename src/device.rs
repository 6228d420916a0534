//! PTP transactions
//!
//! A transaction is a command container sent on the bulk OUT pipe, an optional data
//! phase in either direction and a response container read from the bulk IN pipe. All
//! containers of a transaction carry the same transaction ID.

use crate::{
  codes,
  container::{self, ContainerType, Header, HEADER_LEN, MAX_PARAMS_LEN},
  error::{ensure, ErrorKind, ResponseCode},
  helper::CodeFmt,
  port::Transport,
  Error, Result,
};
use std::{
  fmt,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

/// Size of the first read of a data phase
pub const RECV_CHUNK: usize = 512;

/// Largest single read after the first chunk
const READ_CHUNK: usize = 1 << 20;
const SEND_ATTEMPTS: usize = 2;
const MAX_ZERO_LENGTH_PACKETS: usize = 8;

/// Data phase of a transaction
#[derive(Debug, Clone, Copy)]
pub enum DataPhase<'a> {
  /// No data phase
  None,
  /// Send the bytes to the device
  Out(&'a [u8]),
  /// Receive data from the device
  In,
}

/// Result of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  /// Response code
  pub code: ResponseCode,
  /// Response parameters
  pub params: Vec<u32>,
  /// Data received in the data phase
  pub data: Vec<u8>,
}

impl Response {
  /// Fail with [`ErrorKind::Response`] unless the device answered OK
  pub fn ok(self) -> Result<Self> {
    if self.code.is_ok() {
      Ok(self)
    } else {
      Err(Error::new(ErrorKind::Response(self.code)))
    }
  }

  /// Response parameter at `index`
  pub fn param(&self, index: usize) -> Result<u32> {
    self.params.get(index).copied().ok_or_else(|| {
      Error::new(ErrorKind::ResultParam).with_info(format!("Response has no parameter {}", index))
    })
  }
}

/// Event sent by the device on the interrupt pipe
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
  /// Event code
  pub code: u16,
  /// Event parameters
  pub params: Vec<u32>,
}

impl Event {
  /// Decode an event container
  pub fn decode(bytes: &[u8]) -> Result<Self> {
    let (header, params) = container::decode_params(bytes)?;

    ensure!(
      header.kind == ContainerType::Event,
      ContainerType,
      "Expected an event, got {:?}",
      header.kind
    );

    Ok(Self { code: header.code, params })
  }

  /// First parameter of the event
  pub fn param(&self) -> Result<u32> {
    self.params.first().copied().ok_or_else(|| {
      Error::new(ErrorKind::ResultParam)
        .with_info(format!("Event {:04X}h has no parameter", self.code))
    })
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Event {:04X}h", self.code)?;

    if let Some(param) = self.params.first() {
      write!(f, " with parameter {:08X}h", param)?;
    }

    Ok(())
  }
}

enum Incoming {
  Data(Vec<u8>),
  Response(ResponseCode, Vec<u32>),
}

/// PTP device on top of a [`Transport`]
pub struct Device<T> {
  transport: Arc<T>,
  transaction_id: Mutex<u32>,
}

impl<T: Transport> Device<T> {
  /// Wrap a transport, no session is opened
  pub fn new(transport: Arc<T>) -> Self {
    // Incremented before every transaction, OpenSession uses 0
    Self { transport, transaction_id: Mutex::new(u32::MAX) }
  }

  /// The underlying transport
  pub fn transport(&self) -> &Arc<T> {
    &self.transport
  }

  /// Open a session
  pub fn open_session(&self, session_id: u32) -> Result<()> {
    self.transact(codes::operation::OPEN_SESSION, &[session_id], DataPhase::None)?.ok()?;
    Ok(())
  }

  /// Close the current session
  pub fn close_session(&self) -> Result<()> {
    self.transact(codes::operation::CLOSE_SESSION, &[], DataPhase::None)?.ok()?;
    Ok(())
  }

  /// Run a transaction
  ///
  /// The response code is not checked, use [`Response::ok`] for that.
  pub fn transact(&self, code: u16, params: &[u32], phase: DataPhase<'_>) -> Result<Response> {
    // Held for the whole transaction, containers of two transactions must not interleave
    let mut transaction_id = self.transaction_id.lock().unwrap_or_else(PoisonError::into_inner);
    *transaction_id = transaction_id.wrapping_add(1);
    let tid = *transaction_id;

    let operation = CodeFmt(code, codes::operation_name(code));
    tracing::debug!("{} (transaction {}) {:?}", operation, tid, params);

    self.send(&container::encode_command(code, tid, params)?)?;

    let (data, early_response) = match phase {
      DataPhase::None => (Vec::new(), None),
      DataPhase::Out(payload) => {
        self.send(&container::encode_data(code, tid, payload)?)?;
        (Vec::new(), None)
      }
      DataPhase::In => match self.recv_data(tid)? {
        Incoming::Data(data) => (data, None),
        Incoming::Response(code, params) => (Vec::new(), Some((code, params))),
      },
    };

    let (response_code, params) = match early_response {
      Some(response) => response,
      None => self.recv_response(tid)?,
    };

    tracing::debug!("{} -> {}, {} bytes", operation, response_code, data.len());

    Ok(Response { code: response_code, params, data })
  }

  /// Wait for an event on the interrupt pipe
  pub fn wait_event(&self, timeout: Duration) -> Result<Event> {
    read_event(&*self.transport, timeout)
  }

  fn send(&self, bytes: &[u8]) -> Result<()> {
    let timeout = self.transport.timeout();

    for attempt in 1..=SEND_ATTEMPTS {
      match self.transport.write_bulk(bytes, timeout) {
        Ok(written) => {
          ensure!(
            written == bytes.len(),
            DataLength,
            "Short write: {} of {} bytes",
            written,
            bytes.len()
          );
          return Ok(());
        }
        Err(err) if err.kind() == ErrorKind::Pipe => {
          let endpoint = self.transport.endpoints().bulk_out;
          tracing::warn!("OUT endpoint {:02X}h stalled (attempt {})", endpoint, attempt);

          if let Err(err) = self.transport.clear_halt(endpoint) {
            tracing::warn!("Could not clear halt: {}", err);
          }

          if attempt == SEND_ATTEMPTS {
            return Err(err);
          }
        }
        Err(err) => return Err(err),
      }
    }

    Ok(())
  }

  /// Bulk read that skips zero-length packets
  fn read_packet(&self, buf: &mut [u8]) -> Result<usize> {
    let timeout = self.transport.timeout();

    for _ in 0..MAX_ZERO_LENGTH_PACKETS {
      let read = self.transport.read_bulk(buf, timeout)?;

      if read > 0 {
        return Ok(read);
      }

      tracing::warn!("Detected zero-length packet");
    }

    Err(Error::new(ErrorKind::DataLength).with_info("Only zero-length packets received"))
  }

  fn check_header(header: &Header, tid: u32) -> Result<()> {
    ensure!(
      header.transaction_id == tid,
      TransactionId,
      "Transaction ID mismatch: {:08X}h, expected {:08X}h",
      header.transaction_id,
      tid
    );
    Ok(())
  }

  fn recv_data(&self, tid: u32) -> Result<Incoming> {
    let mut chunk = vec![0; RECV_CHUNK];
    let read = self.read_packet(&mut chunk)?;
    chunk.truncate(read);

    let header = container::decode_header(&chunk)?;
    Self::check_header(&header, tid)?;

    match header.kind {
      ContainerType::Data => {}
      // The device may skip the data phase, when it rejects the operation for example
      ContainerType::Response => {
        let (header, params) = container::decode_params(&chunk)?;
        return Ok(Incoming::Response(ResponseCode(header.code), params));
      }
      kind => {
        return Err(
          Error::new(ErrorKind::ContainerType).with_info(format!("Expected data, got {:?}", kind)),
        )
      }
    }

    let total = header.total_len();

    ensure!(
      total >= HEADER_LEN && total >= read,
      DataLength,
      "Transfer length mismatch: received {}, expected {}",
      read,
      total
    );
    ensure!(
      total == read || read == RECV_CHUNK,
      DataLength,
      "Early termination: received {}, expected {}",
      read,
      total
    );

    let size = total - HEADER_LEN;
    let mut data = chunk.split_off(HEADER_LEN);

    let timeout = self.transport.timeout();
    while data.len() < size {
      // Grows with the received data, the announced size is not trusted
      let start = data.len();
      data.resize(size.min(start + READ_CHUNK), 0);

      let read = self.transport.read_bulk(&mut data[start..], timeout)?;
      ensure!(read > 0, DataLength, "Transfer stopped at {} of {} bytes", start, size);
      data.truncate(start + read);
    }

    Ok(Incoming::Data(data))
  }

  fn recv_response(&self, tid: u32) -> Result<(ResponseCode, Vec<u32>)> {
    let mut buf = [0; MAX_PARAMS_LEN];
    let read = self.read_packet(&mut buf)?;

    let (header, params) = container::decode_params(&buf[..read])?;
    Self::check_header(&header, tid)?;

    ensure!(
      header.kind == ContainerType::Response,
      ContainerType,
      "Expected a response, got {:?}",
      header.kind
    );

    Ok((ResponseCode(header.code), params))
  }
}

/// Read one event container from the interrupt pipe
pub(crate) fn read_event<T: Transport + ?Sized>(transport: &T, timeout: Duration) -> Result<Event> {
  let mut buf = [0; MAX_PARAMS_LEN];
  let read = transport.read_interrupt(&mut buf, timeout)?;
  Event::decode(&buf[..read])
}

impl<T> fmt::Debug for Device<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Device")
      .field("transaction_id", &*self.transaction_id.lock().unwrap_or_else(PoisonError::into_inner))
      .finish_non_exhaustive()
  }
}
