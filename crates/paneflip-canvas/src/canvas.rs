#![forbid(unsafe_code)]

//! Fixed-size BGRA pixel buffers.
//!
//! A [`Canvas`] owns `width * height * stride` bytes laid out row-major. Each
//! pixel occupies one stride unit whose first four bytes are blue, green,
//! red and a constant opaque alpha. Canvases never resize; a canvas that must
//! match a display is created from the display's [`CanvasLayout`].

use std::fmt;

use crate::color::Color;

/// Bytes per pixel for 32-bit BGRA canvases.
pub const BGRA_STRIDE: u32 = 4;

/// Geometry shared between a canvas and whatever displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasLayout {
    pub width: u16,
    pub height: u16,
    /// Bytes per pixel unit. At least [`BGRA_STRIDE`].
    pub stride: u32,
}

impl CanvasLayout {
    #[inline]
    #[must_use]
    pub const fn bgra(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            stride: BGRA_STRIDE,
        }
    }

    /// Exact byte size of a buffer with this layout.
    #[inline]
    #[must_use]
    pub const fn buffer_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.stride as u64
    }

    /// Bytes in one row of pixels.
    #[inline]
    #[must_use]
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.stride as usize
    }
}

/// Canvas construction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    /// The stride cannot hold one BGRA pixel.
    BadStride(u32),
    /// The allocator refused the buffer.
    OutOfMemory { bytes: u64 },
    /// Supplied pixel data does not match the layout.
    LengthMismatch { expected: u64, actual: u64 },
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStride(stride) => {
                write!(f, "stride of {stride} bytes cannot hold a 32-bit pixel")
            }
            Self::OutOfMemory { bytes } => write!(f, "out of memory allocating {bytes} bytes"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "pixel data is {actual} bytes, layout needs {expected}")
            }
        }
    }
}

impl std::error::Error for CanvasError {}

/// An owned pixel buffer plus its geometry.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    layout: CanvasLayout,
    buf: Vec<u8>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.layout.width)
            .field("height", &self.layout.height)
            .field("stride", &self.layout.stride)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Zeroed in-memory canvas with a 4-byte stride.
    #[must_use]
    pub fn bgra(width: u16, height: u16) -> Self {
        let layout = CanvasLayout::bgra(width, height);
        Self {
            layout,
            buf: vec![0; layout.buffer_size() as usize],
        }
    }

    /// Zeroed canvas matching `layout`, reporting allocation failure instead
    /// of aborting.
    pub fn try_with_layout(layout: CanvasLayout) -> Result<Self, CanvasError> {
        if layout.stride < BGRA_STRIDE {
            return Err(CanvasError::BadStride(layout.stride));
        }
        let bytes = layout.buffer_size();
        let len = usize::try_from(bytes).map_err(|_| CanvasError::OutOfMemory { bytes })?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| CanvasError::OutOfMemory { bytes })?;
        buf.resize(len, 0);
        Ok(Self { layout, buf })
    }

    /// Wrap existing pixel bytes. The length must match the layout exactly.
    pub fn from_bytes(layout: CanvasLayout, buf: Vec<u8>) -> Result<Self, CanvasError> {
        if layout.stride < BGRA_STRIDE {
            return Err(CanvasError::BadStride(layout.stride));
        }
        let expected = layout.buffer_size();
        let actual = buf.len() as u64;
        if expected != actual {
            return Err(CanvasError::LengthMismatch { expected, actual });
        }
        Ok(Self { layout, buf })
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.layout.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.layout.height
    }

    #[inline]
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.layout.stride
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> CanvasLayout {
        self.layout
    }

    #[inline]
    #[must_use]
    pub const fn buffer_size(&self) -> u64 {
        self.layout.buffer_size()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.layout.width) && y < i64::from(self.layout.height)
    }

    #[inline]
    fn offset(&self, x: u16, y: u16) -> usize {
        (y as usize * self.layout.width as usize + x as usize) * self.layout.stride as usize
    }

    /// Read back the color at `(x, y)`, or `None` outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> Option<Color> {
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        let at = self.offset(x, y);
        let px: [u8; 4] = self.buf[at..at + 4].try_into().ok()?;
        Some(Color::from_bgra(px))
    }

    /// Write one pixel.
    ///
    /// Does not clip: callers must pass in-bounds coordinates. An
    /// out-of-range coordinate panics on the slice bound rather than
    /// touching memory past the buffer.
    #[inline]
    pub fn put_pixel(&mut self, x: u16, y: u16, color: Color) {
        let at = self.offset(x, y);
        self.buf[at..at + 4].copy_from_slice(&color.to_bgra());
    }

    /// Set every pixel.
    pub fn fill(&mut self, color: Color) {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!(
            "canvas.fill",
            width = self.layout.width,
            height = self.layout.height
        )
        .entered();

        let px = color.to_bgra();
        for unit in self.buf.chunks_exact_mut(self.layout.stride as usize) {
            unit[..4].copy_from_slice(&px);
        }
    }

    /// Fill `[x0, x1]` on row `y`, clipped to the canvas. Coordinates may lie
    /// anywhere, including off-canvas.
    pub(crate) fn hspan(&mut self, x0: i64, x1: i64, y: i64, color: Color) {
        if y < 0 || y >= i64::from(self.layout.height) {
            return;
        }
        let (lo, hi) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let lo = lo.max(0);
        let hi = hi.min(i64::from(self.layout.width) - 1);
        if lo > hi {
            return;
        }
        let px = color.to_bgra();
        let stride = self.layout.stride as usize;
        let start = self.offset(lo as u16, y as u16);
        let end = self.offset(hi as u16, y as u16) + stride;
        for unit in self.buf[start..end].chunks_exact_mut(stride) {
            unit[..4].copy_from_slice(&px);
        }
    }

    /// Write one pixel if it falls on the canvas.
    #[inline]
    pub(crate) fn plot(&mut self, x: i64, y: i64, color: Color) {
        if self.contains(x, y) {
            self.put_pixel(x as u16, y as u16, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_matches_layout() {
        let c = Canvas::bgra(20, 10);
        assert_eq!(c.buffer_size(), 20 * 10 * 4);
        assert_eq!(c.as_bytes().len() as u64, c.buffer_size());
    }

    #[test]
    fn zero_area_canvas_is_empty() {
        let c = Canvas::bgra(0, 10);
        assert!(c.as_bytes().is_empty());
        assert_eq!(c.pixel(0, 0), None);
    }

    #[test]
    fn try_with_layout_rejects_narrow_stride() {
        let layout = CanvasLayout {
            width: 4,
            height: 4,
            stride: 3,
        };
        assert_eq!(
            Canvas::try_with_layout(layout).unwrap_err(),
            CanvasError::BadStride(3)
        );
    }

    #[test]
    fn wide_stride_leaves_padding_alone() {
        let layout = CanvasLayout {
            width: 2,
            height: 1,
            stride: 8,
        };
        let mut c = Canvas::try_with_layout(layout).unwrap();
        c.fill(Color::rgb(1, 2, 3));
        assert_eq!(c.as_bytes(), &[3, 2, 1, 0xFF, 0, 0, 0, 0, 3, 2, 1, 0xFF, 0, 0, 0, 0]);
        assert_eq!(c.pixel(1, 0), Some(Color::rgb(1, 2, 3)));
    }

    #[test]
    fn put_pixel_writes_bgra_at_offset() {
        let mut c = Canvas::bgra(3, 2);
        c.put_pixel(2, 1, Color::rgb(0xAA, 0xBB, 0xCC));
        let at = (3 + 2) * 4;
        assert_eq!(&c.as_bytes()[at..at + 4], &[0xCC, 0xBB, 0xAA, 0xFF]);
        assert_eq!(c.pixel(2, 1), Some(Color::rgb(0xAA, 0xBB, 0xCC)));
    }

    #[test]
    #[should_panic]
    fn put_pixel_out_of_bounds_panics() {
        let mut c = Canvas::bgra(3, 2);
        c.put_pixel(0, 2, Color::WHITE);
    }

    #[test]
    fn from_bytes_checks_length() {
        let err = Canvas::from_bytes(CanvasLayout::bgra(2, 2), vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            CanvasError::LengthMismatch {
                expected: 16,
                actual: 15
            }
        );
        assert!(Canvas::from_bytes(CanvasLayout::bgra(2, 2), vec![0; 16]).is_ok());
    }

    #[test]
    fn hspan_clips_both_ends() {
        let mut c = Canvas::bgra(4, 1);
        c.hspan(-10, 10, 0, Color::WHITE);
        for x in 0..4 {
            assert_eq!(c.pixel(x, 0), Some(Color::WHITE));
        }
        let mut c = Canvas::bgra(4, 1);
        c.hspan(2, 1, 0, Color::WHITE);
        assert_eq!(c.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(c.pixel(1, 0), Some(Color::WHITE));
        assert_eq!(c.pixel(2, 0), Some(Color::WHITE));
        assert_eq!(c.pixel(3, 0), Some(Color::BLACK));
    }

    #[test]
    fn hspan_off_canvas_row_is_noop() {
        let mut c = Canvas::bgra(4, 1);
        c.hspan(0, 3, 1, Color::WHITE);
        c.hspan(0, 3, -1, Color::WHITE);
        assert!(c.as_bytes().iter().all(|&b| b == 0));
    }
}
