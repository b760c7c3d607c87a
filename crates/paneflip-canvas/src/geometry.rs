//! Drawing primitives.
//!
//! These are plain value inputs to the rasterizer; nothing here outlives the
//! draw call that consumes it. Coordinates are in pixels with the origin at
//! the top-left corner of the canvas.

/// Axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Exclusive right edge, widened so it cannot wrap.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x as u32 + self.w as u32
    }

    /// Exclusive bottom edge, widened so it cannot wrap.
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y as u32 + self.h as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Filled disk centred on `(x, y)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Circle {
    pub x: u16,
    pub y: u16,
    pub r: u16,
}

impl Circle {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, r: u16) -> Self {
        Self { x, y, r }
    }
}

/// One-pixel-wide segment between two inclusive endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Line {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Line {
    #[inline]
    #[must_use]
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// Quadratic Bezier curve.
///
/// Control points are wider than the canvas coordinate space and signed, so
/// a curve may start or bend outside the canvas and still cross it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bezier2 {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Bezier2 {
    #[inline]
    #[must_use]
    pub const fn new(p0: (i32, i32), p1: (i32, i32), p2: (i32, i32)) -> Self {
        Self {
            x0: p0.0,
            y0: p0.1,
            x1: p1.0,
            y1: p1.1,
            x2: p2.0,
            y2: p2.1,
        }
    }

    /// Point on the curve at parameter `t` in `[0, 1]`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let u = 1.0 - t;
        let a = u * u;
        let b = 2.0 * u * t;
        let c = t * t;
        (
            a * f64::from(self.x0) + b * f64::from(self.x1) + c * f64::from(self.x2),
            a * f64::from(self.y0) + b * f64::from(self.y1) + c * f64::from(self.y2),
        )
    }

    /// Control points widened to `f64` for subdivision.
    #[must_use]
    pub fn control_points(&self) -> [(f64, f64); 3] {
        [
            (f64::from(self.x0), f64::from(self.y0)),
            (f64::from(self.x1), f64::from(self.y1)),
            (f64::from(self.x2), f64::from(self.y2)),
        ]
    }
}

/// Filled triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl Triangle {
    #[inline]
    #[must_use]
    pub const fn new(p0: (u16, u16), p1: (u16, u16), p2: (u16, u16)) -> Self {
        Self {
            x0: p0.0,
            y0: p0.1,
            x1: p1.0,
            y1: p1.1,
            x2: p2.0,
            y2: p2.1,
        }
    }
}

/// Block copy of a `w`x`h` region between two places on the same canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RectCopy {
    pub dst_x: u16,
    pub dst_y: u16,
    pub src_x: u16,
    pub src_y: u16,
    pub w: u16,
    pub h: u16,
}
