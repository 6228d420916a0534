//! Virtual Sony Alpha camera speaking PTP.
//!
//! The camera consumes the bytes a host writes to the bulk OUT pipe and queues the
//! containers it would send back on the bulk IN pipe, so a transport can be built on top
//! of it without any USB device attached.

use std::{
  collections::VecDeque,
  sync::{Condvar, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

/// Handle of the last captured image
pub const CAPTURED_HANDLE: u32 = 0xFFFF_C001;

const HEADER_LEN: usize = 12;

const COMMAND: u16 = 1;
const DATA: u16 = 2;
const RESPONSE: u16 = 3;
const EVENT: u16 = 4;

const OK: u16 = 0x2001;
const SESSION_NOT_OPEN: u16 = 0x2003;
const OPERATION_NOT_SUPPORTED: u16 = 0x2005;
const INVALID_OBJECT_HANDLE: u16 = 0x2009;
const DEVICE_PROP_NOT_SUPPORTED: u16 = 0x200A;
const ACCESS_DENIED: u16 = 0x200F;
const INVALID_DEVICE_PROP_VALUE: u16 = 0x201C;
const SESSION_ALREADY_OPEN: u16 = 0x201E;

const OBJECT_ADDED: u16 = 0xC201;
const PROPERTY_CHANGED: u16 = 0xC203;

const PENDING_IMAGES: u16 = 0xD215;
const SHUTTER: u16 = 0xD2C2;
const CONTROLS: [u16; 5] = [0xD2C1, SHUTTER, 0xD2C3, 0xD2C7, 0xD2C8];

/// Small but valid JPEG, larger than a single 512 byte USB packet
pub fn sample_image() -> Vec<u8> {
  let filler: Vec<u8> = (0..2000u32).map(|i| b'a' + (i % 26) as u8).collect();
  let comment_len = (filler.len() + 2) as u16;

  let mut image = vec![0xFF, 0xD8];
  image.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
  image.extend_from_slice(b"JFIF\0");
  image.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
  image.extend_from_slice(&[0xFF, 0xFE]);
  image.extend_from_slice(&comment_len.to_be_bytes());
  image.extend_from_slice(&filler);
  image.extend_from_slice(&[0xFF, 0xD9]);
  image
}

/// Failure of a virtual transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualError {
  /// Nothing to read
  Timeout,
  /// The endpoint is stalled
  Pipe,
  /// The camera was unplugged
  NoDevice,
  /// The host sent something the camera does not understand
  Protocol(String),
}

/// Value of a virtual property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
  Int8(i8),
  UInt8(u8),
  UInt16(u16),
  UInt32(u32),
  String(String),
}

impl PropValue {
  fn type_code(&self) -> u16 {
    match self {
      Self::Int8(_) => 0x0001,
      Self::UInt8(_) => 0x0002,
      Self::UInt16(_) => 0x0004,
      Self::UInt32(_) => 0x0006,
      Self::String(_) => 0xFFFF,
    }
  }

  fn encode(&self, out: &mut Vec<u8>) {
    match self {
      Self::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
      Self::UInt8(v) => out.push(*v),
      Self::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
      Self::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
      Self::String(s) => put_string(out, s),
    }
  }

  /// Decode `bytes` as a value of the same type as `self`
  fn parse_like(&self, bytes: &[u8]) -> Option<Self> {
    Some(match self {
      Self::Int8(_) => Self::Int8(i8::from_le_bytes(bytes.try_into().ok()?)),
      Self::UInt8(_) => Self::UInt8(u8::from_le_bytes(bytes.try_into().ok()?)),
      Self::UInt16(_) => Self::UInt16(u16::from_le_bytes(bytes.try_into().ok()?)),
      Self::UInt32(_) => Self::UInt32(u32::from_le_bytes(bytes.try_into().ok()?)),
      Self::String(_) => return None,
    })
  }

  fn number(&self) -> Option<i64> {
    match self {
      Self::Int8(v) => Some(i64::from(*v)),
      Self::UInt8(v) => Some(i64::from(*v)),
      Self::UInt16(v) => Some(i64::from(*v)),
      Self::UInt32(v) => Some(i64::from(*v)),
      Self::String(_) => None,
    }
  }

  fn with_number(&self, n: i64) -> Self {
    match self {
      Self::Int8(_) => Self::Int8(n as i8),
      Self::UInt8(_) => Self::UInt8(n as u8),
      Self::UInt16(_) => Self::UInt16(n as u16),
      Self::UInt32(_) => Self::UInt32(n as u32),
      Self::String(s) => Self::String(s.clone()),
    }
  }
}

/// Allowed values of a virtual property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropForm {
  None,
  Range { min: PropValue, max: PropValue, step: PropValue },
  Enum(Vec<PropValue>),
}

impl PropForm {
  fn accepts(&self, value: &PropValue) -> bool {
    match self {
      Self::None => true,
      Self::Range { min, max, .. } => match (min.number(), max.number(), value.number()) {
        (Some(min), Some(max), Some(v)) => min <= v && v <= max,
        _ => false,
      },
      Self::Enum(values) => values.contains(value),
    }
  }
}

/// Property of the virtual camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prop {
  pub code: u16,
  pub writable: bool,
  pub default: PropValue,
  pub current: PropValue,
  pub form: PropForm,
}

impl Prop {
  /// Property that can not be set
  pub fn read_only(code: u16, value: PropValue) -> Self {
    Self { code, writable: false, default: value.clone(), current: value, form: PropForm::None }
  }

  /// Settable property with a range of allowed values
  pub fn range(code: u16, value: PropValue, min: PropValue, max: PropValue, step: PropValue) -> Self {
    Self {
      code,
      writable: true,
      default: value.clone(),
      current: value,
      form: PropForm::Range { min, max, step },
    }
  }

  /// Settable property with a list of allowed values
  pub fn enumeration(code: u16, value: PropValue, allowed: Vec<PropValue>) -> Self {
    Self { code, writable: true, default: value.clone(), current: value, form: PropForm::Enum(allowed) }
  }

  /// Settable property without restrictions
  pub fn control(code: u16, value: PropValue) -> Self {
    Self { writable: true, ..Self::read_only(code, value) }
  }

  fn encode(&self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.code.to_le_bytes());
    out.extend_from_slice(&self.current.type_code().to_le_bytes());
    out.push(u8::from(self.writable));
    // Sony specific, meaning unknown
    out.push(1);
    self.default.encode(out);
    self.current.encode(out);

    match &self.form {
      PropForm::None => out.push(0),
      PropForm::Range { min, max, step } => {
        out.push(1);
        min.encode(out);
        max.encode(out);
        step.encode(out);
      }
      PropForm::Enum(values) => {
        out.push(2);
        out.extend_from_slice(&(values.len() as u16).to_le_bytes());
        for value in values {
          value.encode(out);
        }
      }
    }
  }

  /// Move one step along the form, clamped at the ends
  fn step(&mut self, up: bool) {
    match &self.form {
      PropForm::Enum(values) => {
        let Some(index) = values.iter().position(|v| *v == self.current) else {
          return;
        };
        let next = if up { (index + 1).min(values.len() - 1) } else { index.saturating_sub(1) };
        self.current = values[next].clone();
      }
      PropForm::Range { min, max, step } => {
        if let (Some(min), Some(max), Some(step), Some(current)) =
          (min.number(), max.number(), step.number(), self.current.number())
        {
          let next = if up { current + step } else { current - step };
          self.current = self.current.with_number(next.clamp(min, max));
        }
      }
      PropForm::None => {}
    }
  }
}

fn uint16_enum(values: &[u16]) -> Vec<PropValue> {
  values.iter().map(|v| PropValue::UInt16(*v)).collect()
}

fn uint32_enum(values: &[u32]) -> Vec<PropValue> {
  values.iter().map(|v| PropValue::UInt32(*v)).collect()
}

fn default_properties() -> Vec<Prop> {
  vec![
    Prop::range(
      0x5007,
      PropValue::UInt16(560),
      PropValue::UInt16(350),
      PropValue::UInt16(2200),
      PropValue::UInt16(10),
    ),
    Prop::enumeration(0x5013, PropValue::UInt16(0x0001), uint16_enum(&[0x0001, 0x0002, 0x8015, 0x8012])),
    Prop::enumeration(
      0xD20D,
      PropValue::UInt32(0x0001_003C),
      uint32_enum(&[
        0x0001_0FA0,
        0x0001_07D0,
        0x0001_03E8,
        0x0001_01F4,
        0x0001_00FA,
        0x0001_007D,
        0x0001_003C,
        0x0001_001E,
        0x0001_0001,
        0x0002_0001,
      ]),
    ),
    Prop::read_only(PENDING_IMAGES, PropValue::UInt16(0)),
    Prop {
      form: PropForm::Range { min: PropValue::Int8(-1), max: PropValue::Int8(100), step: PropValue::Int8(1) },
      ..Prop::read_only(0xD218, PropValue::Int8(80))
    },
    Prop::enumeration(
      0xD21E,
      PropValue::UInt32(100),
      uint32_enum(&[100, 200, 400, 800, 1000, 1600, 3200, 0x00FF_FFFF]),
    ),
    Prop::control(0xD2C1, PropValue::UInt16(1)),
    Prop::control(SHUTTER, PropValue::UInt16(1)),
  ]
}

/// Operation received by the virtual camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
  pub code: u16,
  pub transaction_id: u32,
  pub params: Vec<u32>,
}

struct State {
  reads: VecDeque<Vec<u8>>,
  events: VecDeque<Vec<u8>>,
  awaiting_data: Option<Operation>,
  stalls: usize,
  halts_cleared: usize,
  session_open: bool,
  disconnected: bool,
  frames_per_press: u16,
  pending: u16,
  properties: Vec<Prop>,
  buttons: Vec<(u16, u16)>,
  operations: Vec<Operation>,
}

/// Virtual ILCE-6000
pub struct VirtualCamera {
  state: Mutex<State>,
  event_added: Condvar,
}

impl Default for VirtualCamera {
  fn default() -> Self {
    Self::new()
  }
}

impl VirtualCamera {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(State {
        reads: VecDeque::new(),
        events: VecDeque::new(),
        awaiting_data: None,
        stalls: 0,
        halts_cleared: 0,
        session_open: false,
        disconnected: false,
        frames_per_press: 1,
        pending: 0,
        properties: default_properties(),
        buttons: Vec::new(),
        operations: Vec::new(),
      }),
      event_added: Condvar::new(),
    }
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Bulk OUT transfer from the host
  pub fn write(&self, bytes: &[u8]) -> Result<usize, VirtualError> {
    let mut state = self.state();

    if state.disconnected {
      return Err(VirtualError::NoDevice);
    }
    if state.stalls > 0 {
      state.stalls -= 1;
      return Err(VirtualError::Pipe);
    }

    let (kind, code, transaction_id, payload) = parse_container(bytes)?;

    match kind {
      COMMAND => {
        let params = payload
          .chunks(4)
          .map(|chunk| chunk.try_into().map(u32::from_le_bytes))
          .collect::<Result<Vec<_>, _>>()
          .map_err(|_| VirtualError::Protocol("Parameters are not 32 bit".into()))?;

        let operation = Operation { code, transaction_id, params };
        state.operations.push(operation.clone());

        if matches!(code, 0x9205 | 0x9207) {
          state.awaiting_data = Some(operation);
        } else {
          state.handle(&operation, None);
        }
      }
      DATA => {
        let operation = state
          .awaiting_data
          .take()
          .filter(|op| op.code == code && op.transaction_id == transaction_id)
          .ok_or_else(|| VirtualError::Protocol(format!("Unexpected data for {:04X}h", code)))?;

        state.handle(&operation, Some(payload));
      }
      kind => return Err(VirtualError::Protocol(format!("Host sent container type {}", kind))),
    }

    if !state.events.is_empty() {
      self.event_added.notify_all();
    }

    Ok(bytes.len())
  }

  /// Bulk IN transfer to the host
  ///
  /// Every queued transfer is delivered separately, in pieces of at most `buf.len()` bytes.
  pub fn read(&self, buf: &mut [u8]) -> Result<usize, VirtualError> {
    let mut state = self.state();
    if state.disconnected {
      return Err(VirtualError::NoDevice);
    }

    let front = state.reads.front_mut().ok_or(VirtualError::Timeout)?;

    let len = front.len().min(buf.len());
    buf[..len].copy_from_slice(&front[..len]);
    front.drain(..len);

    if front.is_empty() {
      state.reads.pop_front();
    }

    Ok(len)
  }

  /// Interrupt transfer to the host
  pub fn read_event(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, VirtualError> {
    let state = self.state();
    let (mut state, _) = self
      .event_added
      .wait_timeout_while(state, timeout, |state| state.events.is_empty() && !state.disconnected)
      .unwrap_or_else(PoisonError::into_inner);

    if state.disconnected {
      return Err(VirtualError::NoDevice);
    }

    let event = state.events.pop_front().ok_or(VirtualError::Timeout)?;
    let len = event.len().min(buf.len());
    buf[..len].copy_from_slice(&event[..len]);
    Ok(len)
  }

  /// Unplug the camera, every transfer fails from now on
  pub fn disconnect(&self) {
    self.state().disconnected = true;
    self.event_added.notify_all();
  }

  pub fn clear_halt(&self, _endpoint: u8) {
    self.state().halts_cleared += 1;
  }

  pub fn halts_cleared(&self) -> usize {
    self.state().halts_cleared
  }

  /// Stall the next `count` bulk OUT transfers
  pub fn stall_writes(&self, count: usize) {
    self.state().stalls = count;
  }

  pub fn push_event(&self, code: u16, params: &[u32]) {
    self.state().push_event(code, params);
    self.event_added.notify_all();
  }

  /// Queue a zero-length packet on the bulk IN pipe
  pub fn inject_zero_length_packet(&self) {
    self.state().reads.push_back(Vec::new());
  }

  /// Images produced by one press of the shutter button
  pub fn set_frames_per_press(&self, frames: u16) {
    self.state().frames_per_press = frames;
  }

  /// Add or replace a property
  pub fn set_property(&self, prop: Prop) {
    let mut state = self.state();
    state.properties.retain(|p| p.code != prop.code);
    state.properties.push(prop);
  }

  pub fn remove_property(&self, code: u16) {
    self.state().properties.retain(|p| p.code != code);
  }

  pub fn property(&self, code: u16) -> Option<Prop> {
    self.state().properties.iter().find(|p| p.code == code).cloned()
  }

  /// Button presses and releases as `(control, value)`
  pub fn button_log(&self) -> Vec<(u16, u16)> {
    self.state().buttons.clone()
  }

  /// Every operation received so far
  pub fn operations(&self) -> Vec<Operation> {
    self.state().operations.clone()
  }

  pub fn session_open(&self) -> bool {
    self.state().session_open
  }
}

impl State {
  fn respond(&mut self, op: &Operation, code: u16) {
    self.reads.push_back(container(RESPONSE, code, op.transaction_id, &[]));
  }

  fn respond_with_data(&mut self, op: &Operation, data: &[u8]) {
    self.reads.push_back(container(DATA, op.code, op.transaction_id, data));
    self.respond(op, OK);
  }

  fn push_event(&mut self, code: u16, params: &[u32]) {
    let payload: Vec<u8> = params.iter().flat_map(|p| p.to_le_bytes()).collect();
    self.events.push_back(container(EVENT, code, 0, &payload));
  }

  fn handle(&mut self, op: &Operation, data: Option<&[u8]>) {
    let param = op.params.first().copied().unwrap_or(0);

    if !self.session_open && !matches!(op.code, 0x1001 | 0x1002) {
      return self.respond(op, SESSION_NOT_OPEN);
    }

    match op.code {
      0x1001 => self.respond_with_data(op, &device_info()),
      0x1002 if self.session_open => self.respond(op, SESSION_ALREADY_OPEN),
      0x1002 => {
        self.session_open = true;
        self.respond(op, OK);
      }
      0x1003 => {
        self.session_open = false;
        self.respond(op, OK);
      }
      0x1008 | 0x1009 if param != CAPTURED_HANDLE => self.respond(op, INVALID_OBJECT_HANDLE),
      0x1008 => self.respond_with_data(op, &object_info()),
      0x1009 => {
        self.pending = self.pending.saturating_sub(1);
        self.respond_with_data(op, &sample_image());
      }
      0x9201 => self.respond_with_data(op, &[]),
      0x9202 => self.respond_with_data(op, &ext_info()),
      0x9205 => {
        let code = self.set_property(param as u16, data.unwrap_or_default());
        self.respond(op, code);
      }
      0x9207 => {
        let code = self.operate_control(param as u16, data.unwrap_or_default());
        self.respond(op, code);
      }
      0x9209 => {
        let data = self.all_properties();
        self.respond_with_data(op, &data);
      }
      _ => self.respond(op, OPERATION_NOT_SUPPORTED),
    }
  }

  fn set_property(&mut self, code: u16, data: &[u8]) -> u16 {
    let Some(prop) = self.properties.iter_mut().find(|p| p.code == code) else {
      return DEVICE_PROP_NOT_SUPPORTED;
    };
    if !prop.writable {
      return ACCESS_DENIED;
    }

    match prop.current.parse_like(data) {
      Some(value) if prop.form.accepts(&value) => prop.current = value,
      _ => return INVALID_DEVICE_PROP_VALUE,
    }

    self.push_event(PROPERTY_CHANGED, &[u32::from(code)]);
    OK
  }

  fn operate_control(&mut self, code: u16, data: &[u8]) -> u16 {
    if CONTROLS.contains(&code) {
      let Ok(value) = data.try_into().map(u16::from_le_bytes) else {
        return INVALID_DEVICE_PROP_VALUE;
      };

      self.buttons.push((code, value));
      if code == SHUTTER && value == 2 {
        for _ in 0..self.frames_per_press {
          self.pending += 1;
          self.push_event(OBJECT_ADDED, &[CAPTURED_HANDLE]);
        }
      }
      return OK;
    }

    // Dial: one signed byte, +1 or -1
    let Some(prop) = self.properties.iter_mut().find(|p| p.code == code) else {
      return DEVICE_PROP_NOT_SUPPORTED;
    };
    match data {
      [1] => prop.step(true),
      [0xFF] => prop.step(false),
      _ => return INVALID_DEVICE_PROP_VALUE,
    }

    self.push_event(PROPERTY_CHANGED, &[u32::from(code)]);
    OK
  }

  fn all_properties(&self) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(self.properties.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for prop in &self.properties {
      if prop.code == PENDING_IMAGES && matches!(prop.current, PropValue::UInt16(_)) {
        let ready = if self.pending > 0 { 0x8000 } else { 0 };
        let prop = Prop { current: PropValue::UInt16(self.pending | ready), ..prop.clone() };
        prop.encode(&mut out);
      } else {
        prop.encode(&mut out);
      }
    }

    out
  }
}

fn parse_container(bytes: &[u8]) -> Result<(u16, u16, u32, &[u8]), VirtualError> {
  if bytes.len() < HEADER_LEN {
    return Err(VirtualError::Protocol(format!("Container of {} bytes", bytes.len())));
  }

  let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
  if length != bytes.len() {
    return Err(VirtualError::Protocol(format!(
      "Container announces {} bytes, got {}",
      length,
      bytes.len()
    )));
  }

  let kind = u16::from_le_bytes([bytes[4], bytes[5]]);
  let code = u16::from_le_bytes([bytes[6], bytes[7]]);
  let transaction_id = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
  Ok((kind, code, transaction_id, &bytes[HEADER_LEN..]))
}

fn container(kind: u16, code: u16, transaction_id: u32, payload: &[u8]) -> Vec<u8> {
  let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
  out.extend_from_slice(&((HEADER_LEN + payload.len()) as u32).to_le_bytes());
  out.extend_from_slice(&kind.to_le_bytes());
  out.extend_from_slice(&code.to_le_bytes());
  out.extend_from_slice(&transaction_id.to_le_bytes());
  out.extend_from_slice(payload);
  out
}

fn put_string(out: &mut Vec<u8>, s: &str) {
  if s.is_empty() {
    out.push(0);
    return;
  }

  let units: Vec<u16> = s.encode_utf16().chain([0]).collect();
  out.push(units.len() as u8);
  for unit in units {
    out.extend_from_slice(&unit.to_le_bytes());
  }
}

fn put_array(out: &mut Vec<u8>, codes: &[u16]) {
  out.extend_from_slice(&(codes.len() as u32).to_le_bytes());
  for code in codes {
    out.extend_from_slice(&code.to_le_bytes());
  }
}

fn device_info() -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(&100u16.to_le_bytes());
  out.extend_from_slice(&0x11u32.to_le_bytes());
  out.extend_from_slice(&100u16.to_le_bytes());
  put_string(&mut out, "Sony PTP Extensions");
  out.extend_from_slice(&0u16.to_le_bytes());
  put_array(
    &mut out,
    &[0x1001, 0x1002, 0x1003, 0x1008, 0x1009, 0x9201, 0x9202, 0x9205, 0x9207, 0x9209],
  );
  put_array(&mut out, &[OBJECT_ADDED, PROPERTY_CHANGED]);
  put_array(&mut out, &[]);
  put_array(&mut out, &[]);
  put_array(&mut out, &[0x3801]);
  put_string(&mut out, "Sony Corporation");
  put_string(&mut out, "ILCE-6000");
  put_string(&mut out, "3.20");
  put_string(&mut out, "00000000000000003282933003613521");
  out
}

fn ext_info() -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(&200u16.to_le_bytes());
  put_array(&mut out, &[0x5007, 0x5013, 0xD20D, PENDING_IMAGES, 0xD218, 0xD21E]);
  put_array(&mut out, &CONTROLS);
  out
}

fn object_info() -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(&0x0001_0001u32.to_le_bytes());
  out.extend_from_slice(&0x3801u16.to_le_bytes());
  out.extend_from_slice(&0u16.to_le_bytes());
  out.extend_from_slice(&(sample_image().len() as u32).to_le_bytes());
  out.extend_from_slice(&0x3808u16.to_le_bytes());
  for value in [0u32, 160, 120, 6000, 4000, 24, 0] {
    out.extend_from_slice(&value.to_le_bytes());
  }
  out.extend_from_slice(&0u16.to_le_bytes());
  out.extend_from_slice(&0u32.to_le_bytes());
  out.extend_from_slice(&0u32.to_le_bytes());
  put_string(&mut out, "DSC00001.JPG");
  put_string(&mut out, "20261018T120000");
  put_string(&mut out, "");
  put_string(&mut out, "");
  out
}
