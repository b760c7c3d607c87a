//! Raw RGBA pixel dumps.
//!
//! The dump format has no header: pixels are emitted row-major, four bytes
//! each, in red, green, blue, alpha order. A `w`x`h` canvas dumps to exactly
//! `w * h * 4` bytes. Converting to and from the canvas' BGRA storage is a
//! pure channel swap.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::canvas::{BGRA_STRIDE, Canvas, CanvasError, CanvasLayout};

/// Failure producing or consuming a dump.
#[derive(Debug)]
pub enum DumpError {
    /// Only tightly packed 4-byte pixels can be dumped.
    UnsupportedStride(u32),
    /// The input does not hold `width * height * 4` bytes.
    Canvas(CanvasError),
    Io(io::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedStride(stride) => {
                write!(f, "cannot dump canvas with {stride}-byte stride")
            }
            Self::Canvas(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Canvas(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::UnsupportedStride(_) => None,
        }
    }
}

impl From<io::Error> for DumpError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CanvasError> for DumpError {
    fn from(err: CanvasError) -> Self {
        Self::Canvas(err)
    }
}

#[inline]
fn swap_rb(px: &[u8]) -> [u8; 4] {
    [px[2], px[1], px[0], px[3]]
}

/// Dump `canvas` into a freshly allocated buffer.
pub fn dump_rgba(canvas: &Canvas) -> Result<Vec<u8>, DumpError> {
    if canvas.stride() != BGRA_STRIDE {
        return Err(DumpError::UnsupportedStride(canvas.stride()));
    }
    let mut out = Vec::with_capacity(canvas.as_bytes().len());
    for px in canvas.as_bytes().chunks_exact(4) {
        out.extend_from_slice(&swap_rb(px));
    }
    Ok(out)
}

/// Stream the dump of `canvas` into `writer`, one row at a time.
pub fn write_rgba<W: Write>(canvas: &Canvas, mut writer: W) -> Result<(), DumpError> {
    if canvas.stride() != BGRA_STRIDE {
        return Err(DumpError::UnsupportedStride(canvas.stride()));
    }
    let row_bytes = canvas.layout().row_bytes();
    if row_bytes == 0 {
        return Ok(());
    }
    let mut row = vec![0u8; row_bytes];
    for src in canvas.as_bytes().chunks_exact(row_bytes) {
        for (dst, px) in row.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            dst.copy_from_slice(&swap_rb(px));
        }
        writer.write_all(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the dump of `canvas` to `path`, replacing any existing file.
pub fn write_rgba_file(canvas: &Canvas, path: &Path) -> Result<(), DumpError> {
    let file = File::create(path)?;
    write_rgba(canvas, BufWriter::new(file))
}

/// Rebuild a canvas from a dump. The alpha channel is carried through as is.
pub fn load_rgba(width: u16, height: u16, bytes: &[u8]) -> Result<Canvas, DumpError> {
    let layout = CanvasLayout::bgra(width, height);
    let expected = layout.buffer_size();
    if bytes.len() as u64 != expected {
        return Err(CanvasError::LengthMismatch {
            expected,
            actual: bytes.len() as u64,
        }
        .into());
    }
    let mut buf = Vec::with_capacity(bytes.len());
    for px in bytes.chunks_exact(4) {
        buf.extend_from_slice(&swap_rb(px));
    }
    Ok(Canvas::from_bytes(layout, buf)?)
}
