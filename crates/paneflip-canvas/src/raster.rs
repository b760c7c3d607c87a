//! Software rasterizer.
//!
//! Every operation clips to `[0, width) x [0, height)` before touching the
//! buffer. Shapes may extend past any edge; the visible part is drawn and the
//! rest is discarded, never wrapped.

use crate::canvas::Canvas;
use crate::color::Color;
use crate::geometry::{Bezier2, Circle, Line, Rect, RectCopy, Triangle};

/// A Bezier piece is drawn as its chord once it bows less than this many
/// pixels away from it.
const BEZIER_FLATNESS: f64 = 0.25;

/// Subdivision depth limit. Each split quarters the bow, so 32 levels
/// flatten any curve with `i32` control points well below a pixel.
const MAX_BEZIER_DEPTH: u32 = 32;

type Quad = [(f64, f64); 3];

impl Canvas {
    /// Fill an axis-aligned box, clipped against both canvas edges.
    pub fn draw_rect(&mut self, rect: &Rect, color: Color) {
        let right = rect.right().min(u32::from(self.width()));
        let bottom = rect.bottom().min(u32::from(self.height()));
        if u32::from(rect.x) >= right {
            return;
        }
        for y in u32::from(rect.y)..bottom {
            self.hspan(i64::from(rect.x), i64::from(right) - 1, i64::from(y), color);
        }
    }

    /// Filled disk via the integer midpoint circle walk.
    ///
    /// Walks one octant with `y` increasing from the centre and `x` starting
    /// at the radius. Each step fills the horizontal spans joining the eight
    /// symmetric boundary points across the vertical axis, which covers the
    /// whole disk.
    pub fn draw_circle(&mut self, circle: &Circle, color: Color) {
        let cx = i64::from(circle.x);
        let cy = i64::from(circle.y);
        let mut x = i64::from(circle.r);
        let mut y = 0_i64;
        let mut t1 = x / 16;

        while x >= y {
            self.hspan(cx - x, cx + x, cy + y, color);
            self.hspan(cx - x, cx + x, cy - y, color);
            self.hspan(cx - y, cx + y, cy + x, color);
            self.hspan(cx - y, cx + y, cy - x, color);

            y += 1;
            t1 += y;
            let t2 = t1 - x;
            if t2 >= 0 {
                t1 = t2;
                x -= 1;
            }
        }
    }

    /// One-pixel line with inclusive endpoints.
    pub fn draw_line(&mut self, line: &Line, color: Color) {
        self.segment(
            f64::from(line.x0),
            f64::from(line.y0),
            f64::from(line.x1),
            f64::from(line.y1),
            color,
        );
    }

    /// Filled triangle. Pixels on an edge count as inside.
    pub fn draw_triangle(&mut self, tri: &Triangle, color: Color) {
        let mut v = [
            (i64::from(tri.x0), i64::from(tri.y0)),
            (i64::from(tri.x1), i64::from(tri.y1)),
            (i64::from(tri.x2), i64::from(tri.y2)),
        ];
        let area = edge(v[0], v[1], v[2]);
        if area == 0 {
            // Collinear: the triangle degenerates to its outline.
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                self.segment(a.0 as f64, a.1 as f64, b.0 as f64, b.1 as f64, color);
            }
            return;
        }
        if area < 0 {
            v.swap(1, 2);
        }

        let w = i64::from(self.width());
        let h = i64::from(self.height());
        let min_x = v.iter().map(|p| p.0).min().unwrap_or(0).max(0);
        let max_x = v.iter().map(|p| p.0).max().unwrap_or(0).min(w - 1);
        let min_y = v.iter().map(|p| p.1).min().unwrap_or(0).max(0);
        let max_y = v.iter().map(|p| p.1).max().unwrap_or(0).min(h - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x, y);
                if edge(v[1], v[2], p) >= 0 && edge(v[2], v[0], p) >= 0 && edge(v[0], v[1], p) >= 0
                {
                    self.put_pixel(x as u16, y as u16, color);
                }
            }
        }
    }

    /// Quadratic Bezier curve by adaptive de Casteljau subdivision.
    ///
    /// Pieces are split at `t = 0.5` until each one is flat enough to draw as
    /// a chord. Pieces whose control hull lies entirely off the canvas are
    /// dropped, so the work follows the visible part of the curve however
    /// far the control points reach.
    pub fn draw_bezier2(&mut self, curve: &Bezier2, color: Color) {
        let max_x = f64::from(self.width());
        let max_y = f64::from(self.height());
        let mut pending: Vec<(Quad, u32)> = vec![(curve.control_points(), 0)];

        while let Some((q, depth)) = pending.pop() {
            if hull_outside(&q, max_x, max_y) {
                continue;
            }
            if depth >= MAX_BEZIER_DEPTH || bow(&q) <= BEZIER_FLATNESS {
                let [(x0, y0), _, (x1, y1)] = q;
                self.segment(x0.round(), y0.round(), x1.round(), y1.round(), color);
                continue;
            }
            let (head, tail) = split_half(&q);
            // Tail first so the head is drawn first.
            pending.push((tail, depth + 1));
            pending.push((head, depth + 1));
        }
    }

    /// Move a block of pixels within this canvas.
    ///
    /// Source and destination are clipped independently; only the part that
    /// is on-canvas at both ends is copied. Overlapping regions are safe:
    /// rows are visited bottom-up when moving down and each row move handles
    /// horizontal overlap itself.
    pub fn copy_rect(&mut self, copy: &RectCopy) {
        let width = u32::from(self.width());
        let height = u32::from(self.height());
        let (sx, sy) = (u32::from(copy.src_x), u32::from(copy.src_y));
        let (dx, dy) = (u32::from(copy.dst_x), u32::from(copy.dst_y));
        if sx >= width || dx >= width || sy >= height || dy >= height {
            return;
        }
        let w = u32::from(copy.w).min(width - sx).min(width - dx) as usize;
        let h = u32::from(copy.h).min(height - sy).min(height - dy) as usize;
        if w == 0 || h == 0 {
            return;
        }

        let stride = self.stride() as usize;
        let row_bytes = self.layout().row_bytes();
        let len = w * stride;
        let src_at = |row: usize| (sy as usize + row) * row_bytes + sx as usize * stride;
        let dst_at = |row: usize| (dy as usize + row) * row_bytes + dx as usize * stride;

        let buf = self.as_bytes_mut();
        if dy > sy {
            for row in (0..h).rev() {
                let from = src_at(row);
                buf.copy_within(from..from + len, dst_at(row));
            }
        } else {
            for row in 0..h {
                let from = src_at(row);
                buf.copy_within(from..from + len, dst_at(row));
            }
        }
    }

    /// Bresenham between two points that may lie anywhere, after clipping
    /// the segment to the canvas.
    fn segment(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
        let Some((x0, y0, x1, y1)) = clip_segment(
            (x0, y0),
            (x1, y1),
            f64::from(self.width()) - 1.0,
            f64::from(self.height()) - 1.0,
        ) else {
            return;
        };

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.plot(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)`; positive when `p` is left of `a->b`
/// in screen coordinates.
#[inline]
fn edge(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Maximum distance between a quadratic piece and its chord: the curve
/// point at `t = 0.5` sits `(p0 - 2 p1 + p2) / 4` away from the chord midpoint.
#[inline]
fn bow(q: &Quad) -> f64 {
    let [(x0, y0), (x1, y1), (x2, y2)] = *q;
    let dx = x0 - 2.0 * x1 + x2;
    let dy = y0 - 2.0 * y1 + y2;
    dx.hypot(dy) / 4.0
}

/// De Casteljau split at `t = 0.5`.
fn split_half(q: &Quad) -> (Quad, Quad) {
    let mid = |a: (f64, f64), b: (f64, f64)| ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    let [p0, p1, p2] = *q;
    let l1 = mid(p0, p1);
    let r1 = mid(p1, p2);
    let m = mid(l1, r1);
    ([p0, l1, m], [m, r1, p2])
}

/// True when the control hull, and hence the curve, misses
/// `[-1, max_x] x [-1, max_y]`.
fn hull_outside(q: &Quad, max_x: f64, max_y: f64) -> bool {
    let xs = q.map(|p| p.0);
    let ys = q.map(|p| p.1);
    let lo = |v: [f64; 3]| v[0].min(v[1]).min(v[2]);
    let hi = |v: [f64; 3]| v[0].max(v[1]).max(v[2]);
    hi(xs) < -1.0 || lo(xs) > max_x || hi(ys) < -1.0 || lo(ys) > max_y
}

/// Liang-Barsky clip of a segment against `[0, max_x] x [0, max_y]`,
/// returning rounded integer endpoints.
fn clip_segment(
    p0: (f64, f64),
    p1: (f64, f64),
    max_x: f64,
    max_y: f64,
) -> Option<(i64, i64, i64, i64)> {
    if max_x < 0.0 || max_y < 0.0 {
        return None;
    }
    let dx = p1.0 - p0.0;
    let dy = p1.1 - p0.1;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, p0.0),
        (dx, max_x - p0.0),
        (-dy, p0.1),
        (dy, max_y - p0.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let clamp_x = |v: f64| v.round().clamp(0.0, max_x) as i64;
    let clamp_y = |v: f64| v.round().clamp(0.0, max_y) as i64;
    Some((
        clamp_x(p0.0 + t0 * dx),
        clamp_y(p0.1 + t0 * dy),
        clamp_x(p0.0 + t1 * dx),
        clamp_y(p0.1 + t1 * dy),
    ))
}
