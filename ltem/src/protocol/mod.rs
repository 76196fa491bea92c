//! Binary request/response codec used by the stdin/stdout server.
//!
//! Everything is little-endian. A request is a `u32` opcode followed by the
//! opcode's arguments; a response is a `u32` status followed by either an
//! opcode-specific payload (success) or a newline-terminated message.


use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use common::Grid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("Argument '{name}' must not be negative, got {value}")]
    NegativeArgument { name: &'static str, value: i32 },

    #[error("Path is not valid UTF-8")]
    InvalidPath,

    /// The pixel payload length cannot be derived, so the stream is lost.
    #[error("Invalid array shape {rows}x{cols}")]
    InvalidArrayShape { rows: i32, cols: i32 },
}

impl ProtocolError {
    /// Whether the stream is still aligned on a request boundary, so the
    /// server can answer with an error and keep going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::InvalidArrayShape { .. }
        )
    }
}

// ============================================================================
// Opcodes and statuses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    ImageRequest = 0,
    LoadFromFile = 1,
    LoadFromArray = 2,
    RunAlgorithm = 3,
    Equalize = 4,
    CalculateBackground = 5,
    CalculateSignal = 6,
    CalculateSignificance = 7,
    Cluster = 8,
}

impl TryFrom<u32> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Opcode::ImageRequest,
            1 => Opcode::LoadFromFile,
            2 => Opcode::LoadFromArray,
            3 => Opcode::RunAlgorithm,
            4 => Opcode::Equalize,
            5 => Opcode::CalculateBackground,
            6 => Opcode::CalculateSignal,
            7 => Opcode::CalculateSignificance,
            8 => Opcode::Cluster,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Success = 0,
    NotImplemented = 1,
    Error = 2,
}

impl TryFrom<u32> for Status {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(Status::Success),
            1 => Ok(Status::NotImplemented),
            2 => Ok(Status::Error),
            other => Err(other),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ImageRequest,
    LoadFromFile(PathBuf),
    LoadFromArray { rows: usize, cols: usize, pixels: Vec<u8> },
    RunAlgorithm,
    Equalize,
    CalculateBackground(usize),
    CalculateSignal(usize),
    CalculateSignificance(f64),
    Cluster,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::ImageRequest => Opcode::ImageRequest,
            Request::LoadFromFile(_) => Opcode::LoadFromFile,
            Request::LoadFromArray { .. } => Opcode::LoadFromArray,
            Request::RunAlgorithm => Opcode::RunAlgorithm,
            Request::Equalize => Opcode::Equalize,
            Request::CalculateBackground(_) => Opcode::CalculateBackground,
            Request::CalculateSignal(_) => Opcode::CalculateSignal,
            Request::CalculateSignificance(_) => Opcode::CalculateSignificance,
            Request::Cluster => Opcode::Cluster,
        }
    }

    /// Decodes the next request. Returns `Ok(None)` when the stream ends
    /// cleanly before an opcode.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Option<Self>, ProtocolError> {
        let Some(code) = read_u32_or_eof(reader)? else {
            return Ok(None);
        };

        let request = match Opcode::try_from(code)? {
            Opcode::ImageRequest => Request::ImageRequest,
            Opcode::LoadFromFile => Request::LoadFromFile(read_path_line(reader)?),
            Opcode::LoadFromArray => {
                let (rows, cols) = read_array_shape(reader)?;
                let pixels = read_pixels(reader, rows * cols)?;
                Request::LoadFromArray { rows, cols, pixels }
            }
            Opcode::RunAlgorithm => Request::RunAlgorithm,
            Opcode::Equalize => Request::Equalize,
            Opcode::CalculateBackground => {
                Request::CalculateBackground(non_negative("window", read_i32(reader)?)?)
            }
            Opcode::CalculateSignal => {
                Request::CalculateSignal(non_negative("window", read_i32(reader)?)?)
            }
            Opcode::CalculateSignificance => Request::CalculateSignificance(read_f64(reader)?),
            Opcode::Cluster => Request::Cluster,
        };

        Ok(Some(request))
    }

    /// Client side of [`Request::read_from`].
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&(self.opcode() as u32).to_le_bytes())?;
        match self {
            Request::LoadFromFile(path) => {
                writer.write_all(path.to_string_lossy().as_bytes())?;
                writer.write_all(b"\n")?;
            }
            Request::LoadFromArray { rows, cols, pixels } => {
                writer.write_all(&dimension(*rows)?.to_le_bytes())?;
                writer.write_all(&dimension(*cols)?.to_le_bytes())?;
                writer.write_all(pixels)?;
            }
            Request::CalculateBackground(window) | Request::CalculateSignal(window) => {
                writer.write_all(&dimension(*window)?.to_le_bytes())?;
            }
            Request::CalculateSignificance(sigma) => {
                writer.write_all(&sigma.to_le_bytes())?;
            }
            Request::ImageRequest
            | Request::RunAlgorithm
            | Request::Equalize
            | Request::Cluster => {}
        }
        Ok(())
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Success without payload.
    Done,
    /// Success carrying the main image as row-major bytes.
    Image(Grid<u8>),
    /// Success carrying the number of clusters kept after filtering.
    ClusterCount(u32),
    NotImplemented(String),
    Error(String),
}

impl Response {
    pub fn status(&self) -> Status {
        match self {
            Response::Done | Response::Image(_) | Response::ClusterCount(_) => Status::Success,
            Response::NotImplemented(_) => Status::NotImplemented,
            Response::Error(_) => Status::Error,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&(self.status() as u32).to_le_bytes())?;
        match self {
            Response::Done => Ok(()),
            Response::Image(image) => writer.write_all(image.cells()),
            Response::ClusterCount(count) => writer.write_all(&count.to_le_bytes()),
            Response::NotImplemented(message) | Response::Error(message) => {
                write_message_line(writer, message)
            }
        }
    }
}

/// Messages travel as single lines, so embedded newlines are flattened.
fn write_message_line<W: Write>(writer: &mut W, message: &str) -> io::Result<()> {
    let line = message.replace(['\r', '\n'], " ");
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")
}

// ============================================================================
// Primitive readers
// ============================================================================

fn read_u32_or_eof<R: Read>(reader: &mut R) -> io::Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_le_bytes(buf))),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended inside an opcode",
        )),
    }
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_path_line<R: BufRead>(reader: &mut R) -> Result<PathBuf, ProtocolError> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.pop() != Some(b'\n') {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated path").into());
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    let path = String::from_utf8(line).map_err(|_| ProtocolError::InvalidPath)?;
    Ok(PathBuf::from(path))
}

/// Reads both dimensions before validating them. The product must fit in
/// `usize` since it is the payload length.
fn read_array_shape<R: Read>(reader: &mut R) -> Result<(usize, usize), ProtocolError> {
    let raw_rows = read_i32(reader)?;
    let raw_cols = read_i32(reader)?;
    let invalid = || ProtocolError::InvalidArrayShape {
        rows: raw_rows,
        cols: raw_cols,
    };

    let rows = usize::try_from(raw_rows).map_err(|_| invalid())?;
    let cols = usize::try_from(raw_cols).map_err(|_| invalid())?;
    rows.checked_mul(cols).ok_or_else(invalid)?;
    Ok((rows, cols))
}

/// Reads exactly `len` bytes. The buffer grows with the data that actually
/// arrives instead of trusting the announced length up front.
fn read_pixels<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut pixels = Vec::new();
    reader.take(len as u64).read_to_end(&mut pixels)?;
    if pixels.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} pixel bytes, got {}", len, pixels.len()),
        )
        .into());
    }
    Ok(pixels)
}

fn non_negative(name: &'static str, value: i32) -> Result<usize, ProtocolError> {
    usize::try_from(value).map_err(|_| ProtocolError::NegativeArgument { name, value })
}

fn dimension(value: usize) -> io::Result<i32> {
    i32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "dimension exceeds i32"))
}
