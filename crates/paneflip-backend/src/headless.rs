#![forbid(unsafe_code)]

//! In-memory display backend.
//!
//! Behaves like a double-buffered display of fixed geometry: each present
//! copies into the back canvas and flips. Optionally every presented frame
//! is written to `dump_dir` as `frame-NNNNNN.rgba` in the raw dump format,
//! which makes the rotation loop observable in tests and on machines
//! without a display.
//!
//! The dump is written from the front buffer in
//! [`after_present`](DisplayBackend::after_present), not in `present`, so
//! the caller's canvas is not borrowed during file I/O. A dump still
//! outstanding when the next `present` or `shutdown` arrives is written
//! then.

use std::path::PathBuf;

use paneflip_canvas::{Canvas, CanvasError, CanvasLayout, DumpError, write_rgba_file};
use thiserror::Error;

use crate::{BufferPair, DisplayBackend};

/// Geometry and capture settings for [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub width: u16,
    pub height: u16,
    /// Directory receiving one dump per presented frame. Files are written
    /// synchronously by the thread that presents.
    pub dump_dir: Option<PathBuf>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            dump_dir: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("headless display must have a non-zero area, got {width}x{height}")]
    ZeroArea { width: u16, height: u16 },

    #[error("canvas error: {0}")]
    Canvas(#[from] CanvasError),

    #[error("presented canvas is {actual:?}, display is {expected:?}")]
    LayoutMismatch {
        expected: CanvasLayout,
        actual: CanvasLayout,
    },

    #[error("frame dump failed: {0}")]
    Dump(#[from] DumpError),

    #[error("dump directory {path} is unusable: {source}")]
    DumpDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Double-buffered in-memory display.
#[derive(Debug)]
pub struct HeadlessBackend {
    layout: CanvasLayout,
    buffers: BufferPair<Canvas>,
    dump_dir: Option<PathBuf>,
    presents: u64,
    /// Frame number of a front buffer not yet dumped.
    pending_dump: Option<u64>,
}

impl HeadlessBackend {
    /// Allocate both buffers and prepare the dump directory, if any.
    pub fn open(config: HeadlessConfig) -> Result<Self, HeadlessError> {
        if config.width == 0 || config.height == 0 {
            return Err(HeadlessError::ZeroArea {
                width: config.width,
                height: config.height,
            });
        }
        if let Some(dir) = &config.dump_dir {
            std::fs::create_dir_all(dir).map_err(|source| HeadlessError::DumpDir {
                path: dir.clone(),
                source,
            })?;
        }

        let layout = CanvasLayout::bgra(config.width, config.height);
        let buffers = BufferPair::new(
            Canvas::try_with_layout(layout)?,
            Canvas::try_with_layout(layout)?,
        );

        tracing::debug!(
            target: "paneflip.headless",
            width = config.width,
            height = config.height,
            dump_dir = ?config.dump_dir,
            "headless display opened"
        );

        Ok(Self {
            layout,
            buffers,
            dump_dir: config.dump_dir,
            presents: 0,
            pending_dump: None,
        })
    }

    /// Canvas currently on "screen".
    #[must_use]
    pub fn front(&self) -> &Canvas {
        self.buffers.front()
    }

    /// Number of successful presents so far.
    #[must_use]
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Write the front buffer if its dump is still outstanding.
    fn flush_dump(&mut self) -> Result<(), HeadlessError> {
        let (Some(frame), Some(dir)) = (self.pending_dump.take(), &self.dump_dir) else {
            return Ok(());
        };
        let path = dir.join(format!("frame-{frame:06}.rgba"));
        write_rgba_file(self.buffers.front(), &path)?;
        Ok(())
    }
}

impl DisplayBackend for HeadlessBackend {
    type Error = HeadlessError;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn layout(&self) -> CanvasLayout {
        self.layout
    }

    fn log_state(&self) {
        tracing::info!(
            target: "paneflip.headless",
            width = self.layout.width,
            height = self.layout.height,
            front = self.buffers.front_index(),
            back = self.buffers.back_index(),
            dump_dir = ?self.dump_dir,
            "headless display state"
        );
    }

    fn present(&mut self, canvas: &Canvas) -> Result<(), Self::Error> {
        if canvas.layout() != self.layout {
            return Err(HeadlessError::LayoutMismatch {
                expected: self.layout,
                actual: canvas.layout(),
            });
        }
        self.flush_dump()?;
        self.buffers
            .back_mut()
            .as_bytes_mut()
            .copy_from_slice(canvas.as_bytes());
        self.buffers.flip();
        if self.dump_dir.is_some() {
            self.pending_dump = Some(self.presents);
        }
        self.presents += 1;
        Ok(())
    }

    fn after_present(&mut self) -> Result<(), Self::Error> {
        self.flush_dump()
    }

    fn front_index(&self) -> usize {
        self.buffers.front_index()
    }

    fn shutdown(mut self) -> Result<(), Self::Error> {
        self.flush_dump()?;
        tracing::debug!(
            target: "paneflip.headless",
            presents = self.presents,
            "headless display closed"
        );
        Ok(())
    }
}
