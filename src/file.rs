//! Files transferred from the camera

use crate::{dataset::Decoder, error::ErrorKind, Error, Result};
use std::{fmt, fs, io::Write, path::Path};

/// Information about an object stored on the camera
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectInfo {
  /// Storage the object is on
  pub storage_id: u32,
  /// Object format code
  pub object_format: u16,
  /// Protection status
  pub protection_status: u16,
  /// Size of the object in bytes
  pub compressed_size: u32,
  /// Thumbnail format code
  pub thumb_format: u16,
  /// Size of the thumbnail in bytes
  pub thumb_compressed_size: u32,
  /// Thumbnail width in pixels
  pub thumb_width: u32,
  /// Thumbnail height in pixels
  pub thumb_height: u32,
  /// Image width in pixels
  pub image_width: u32,
  /// Image height in pixels
  pub image_height: u32,
  /// Bits per pixel
  pub image_bit_depth: u32,
  /// Handle of the parent object
  pub parent_object: u32,
  /// Association type
  pub association_type: u16,
  /// Association description
  pub association_desc: u32,
  /// Sequence number
  pub sequence_number: u32,
  /// File name
  pub filename: String,
  /// Capture date
  pub capture_date: String,
  /// Modification date
  pub modification_date: String,
  /// Keywords
  pub keywords: String,
}

impl ObjectInfo {
  /// Decode the dataset returned by GetObjectInfo
  pub fn decode(data: &[u8]) -> Result<Self> {
    let mut d = Decoder::new(data);

    Ok(Self {
      storage_id: d.u32()?,
      object_format: d.u16()?,
      protection_status: d.u16()?,
      compressed_size: d.u32()?,
      thumb_format: d.u16()?,
      thumb_compressed_size: d.u32()?,
      thumb_width: d.u32()?,
      thumb_height: d.u32()?,
      image_width: d.u32()?,
      image_height: d.u32()?,
      image_bit_depth: d.u32()?,
      parent_object: d.u32()?,
      association_type: d.u16()?,
      association_desc: d.u32()?,
      sequence_number: d.u32()?,
      filename: d.string()?,
      capture_date: d.string()?,
      modification_date: d.string()?,
      keywords: d.string()?,
    })
  }
}

fn or_none(s: &str) -> &str {
  if s.is_empty() {
    "<None>"
  } else {
    s
  }
}

impl fmt::Display for ObjectInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Storage ID: {:08X}h", self.storage_id)?;
    writeln!(f, "Object format: {:04X}h", self.object_format)?;
    writeln!(f, "Protection status: {:04X}h", self.protection_status)?;
    writeln!(f, "Object compressed size: {}", self.compressed_size)?;
    writeln!(f)?;
    writeln!(f, "Thumb format: {:04X}h", self.thumb_format)?;
    writeln!(f, "Thumb compressed size: {}", self.thumb_compressed_size)?;
    writeln!(f, "Thumb pixel width: {}", self.thumb_width)?;
    writeln!(f, "Thumb pixel height: {}", self.thumb_height)?;
    writeln!(f, "Image pixel width: {}", self.image_width)?;
    writeln!(f, "Image pixel height: {}", self.image_height)?;
    writeln!(f, "Image bit depth: {}", self.image_bit_depth)?;
    writeln!(f)?;
    writeln!(f, "Parent object: {:08X}h", self.parent_object)?;
    writeln!(f, "Association type: {:04X}h", self.association_type)?;
    writeln!(f, "Association desc: {:08X}h", self.association_desc)?;
    writeln!(f, "Sequence number: {}", self.sequence_number)?;
    writeln!(f)?;
    writeln!(f, "File name: {}", or_none(&self.filename))?;
    writeln!(f, "Capture date: {}", or_none(&self.capture_date))?;
    writeln!(f, "Modification date: {}", or_none(&self.modification_date))?;
    write!(f, "Keywords: {}", or_none(&self.keywords))
  }
}

/// File downloaded from the camera
///
/// ## Saving the last captured image
/// ```no_run
/// use sony_ptp::{camera::CAPTURED_OBJECT_HANDLE, Context, Result};
///
/// # fn main() -> Result<()> {
/// let camera = Context::new()?.autodetect_camera()?;
/// let file = camera.download(CAPTURED_OBJECT_HANDLE)?;
/// file.save("image.jpg")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFile {
  info: Option<ObjectInfo>,
  data: Vec<u8>,
}

impl CameraFile {
  /// Wrap downloaded data
  pub fn new(info: Option<ObjectInfo>, data: Vec<u8>) -> Self {
    Self { info, data }
  }

  /// Object information, if it was requested
  pub fn info(&self) -> Option<&ObjectInfo> {
    self.info.as_ref()
  }

  /// Contents of the file
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// Take the contents
  pub fn into_data(self) -> Vec<u8> {
    self.data
  }

  /// Size in bytes
  pub fn len(&self) -> usize {
    self.data.len()
  }

  /// Whether the file is empty
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Write the contents to a new file
  ///
  /// Existing files are not overwritten, [`ErrorKind::FileExists`] is returned instead.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path).map_err(|err| {
      Error::from(err).with_info(format!("Could not create {}", path.display()))
    })?;

    file.write_all(&self.data)?;
    tracing::debug!("Saved {} bytes to {}", self.data.len(), path.display());
    Ok(())
  }
}

/// Create a directory
///
/// A directory that already exists is left as is. Any other failure, including a file in
/// the way, is returned.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref();

  match fs::create_dir(path) {
    Ok(()) => Ok(()),
    Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
    Err(err) => Err(Error::new(ErrorKind::Io).with_info(format!("{}: {}", path.display(), err))),
  }
}
