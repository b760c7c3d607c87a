#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use paneflip_canvas::{Bezier2, Canvas, Circle, Color, Line, Rect, RectCopy, Triangle};

type P16 = (u16, u16);
type P32 = (i32, i32);

#[derive(Debug, Arbitrary)]
enum Op {
    Fill(u8),
    Rect(u16, u16, u16, u16, u8),
    Circle(u16, u16, u16, u8),
    Line(P16, P16, u8),
    Triangle(P16, P16, P16, u8),
    Bezier(P32, P32, P32, u8),
    Copy(P16, P16, P16),
}

#[derive(Debug, Arbitrary)]
struct Input {
    width: u8,
    height: u8,
    ops: Vec<Op>,
}

fn gray(v: u8) -> Color {
    Color::rgb(v, v, v)
}

fuzz_target!(|input: Input| {
    // 1..=64 on each side keeps iterations fast.
    let width = u16::from(input.width % 64) + 1;
    let height = u16::from(input.height % 64) + 1;
    let mut canvas = Canvas::bgra(width, height);
    let size = canvas.buffer_size();

    for op in input.ops.iter().take(64) {
        match *op {
            Op::Fill(v) => canvas.fill(gray(v)),
            Op::Rect(x, y, w, h, v) => canvas.draw_rect(&Rect::new(x, y, w, h), gray(v)),
            Op::Circle(x, y, r, v) => canvas.draw_circle(&Circle::new(x, y, r), gray(v)),
            Op::Line(a, b, v) => canvas.draw_line(&Line::new(a.0, a.1, b.0, b.1), gray(v)),
            Op::Triangle(a, b, c, v) => canvas.draw_triangle(&Triangle::new(a, b, c), gray(v)),
            Op::Bezier(a, b, c, v) => canvas.draw_bezier2(&Bezier2::new(a, b, c), gray(v)),
            Op::Copy(dst, src, wh) => canvas.copy_rect(&RectCopy {
                dst_x: dst.0,
                dst_y: dst.1,
                src_x: src.0,
                src_y: src.1,
                w: wh.0,
                h: wh.1,
            }),
        }
    }

    // Geometry never changes; alpha bytes are either untouched or opaque.
    assert_eq!(canvas.buffer_size(), size);
    assert_eq!((canvas.width(), canvas.height()), (width, height));
    for px in canvas.as_bytes().chunks_exact(4) {
        assert!(px[3] == 0 || px[3] == 0xFF, "alpha corrupted");
    }
});
