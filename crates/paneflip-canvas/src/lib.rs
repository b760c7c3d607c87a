#![forbid(unsafe_code)]

//! Canvas kernel: BGRA pixel buffers and a clipping software rasterizer.
//!
//! # Role in paneflip
//! `paneflip-canvas` is the leaf of the workspace. Display backends hand out
//! canvases whose [`CanvasLayout`] matches their scan-out buffers, the pane
//! manager owns one canvas per pane, and the rasterizer draws into them.
//!
//! # Primary responsibilities
//! - **Canvas**: fixed-size, row-major BGRA buffer with a one-pixel write
//!   primitive that does not clip.
//! - **Rasterizer**: rectangles, filled disks, lines, triangles, quadratic
//!   Bezier curves and block copies, all clipped to the canvas.
//! - **Dump**: headerless RGBA export and import for fixtures.

pub mod canvas;
pub mod color;
pub mod dump;
pub mod geometry;
mod raster;

pub use canvas::{BGRA_STRIDE, Canvas, CanvasError, CanvasLayout};
pub use color::{Color, ParseColorError};
pub use dump::{DumpError, dump_rgba, load_rgba, write_rgba, write_rgba_file};
pub use geometry::{Bezier2, Circle, Line, Rect, RectCopy, Triangle};
