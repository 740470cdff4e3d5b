//! Drawing primitives on RGB frames, built on `imageproc`.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut, text_size,
};
use imageproc::point::Point;

/// Pixel height of text drawn at font scale 1.0.
pub const BASE_TEXT_PX: f32 = 24.0;

/// Line segment `thickness` pixels wide, with round caps.
pub fn line(frame: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Rgb<u8>, thickness: u32) {
    let thickness = thickness.max(1);
    if thickness == 1 {
        draw_line_segment_mut(frame, start, end, color);
        return;
    }

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if length > 0.0 { (-dy / length, dx / length) } else { (0.0, 0.0) };

    let half = (thickness as f32 - 1.0) / 2.0;
    for step in 0..thickness {
        let offset = step as f32 - half;
        draw_line_segment_mut(
            frame,
            (start.0 + nx * offset, start.1 + ny * offset),
            (end.0 + nx * offset, end.1 + ny * offset),
            color,
        );
    }

    let cap = (thickness / 2) as i32;
    draw_filled_circle_mut(frame, (start.0 as i32, start.1 as i32), cap, color);
    draw_filled_circle_mut(frame, (end.0 as i32, end.1 as i32), cap, color);
}

/// Closed polygon outline.
pub fn polygon_outline(frame: &mut RgbImage, vertices: &[Point<i32>], color: Rgb<u8>, thickness: u32) {
    if vertices.len() < 2 {
        return;
    }
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        line(frame, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color, thickness);
    }
}

/// Filled polygon. Consecutive duplicate vertices and a repeated closing
/// vertex are dropped; fewer than three distinct vertices draws nothing.
pub fn filled_polygon(frame: &mut RgbImage, vertices: &[Point<i32>], color: Rgb<u8>) {
    let mut open: Vec<Point<i32>> = Vec::with_capacity(vertices.len());
    for &v in vertices {
        if open.last() != Some(&v) {
            open.push(v);
        }
    }
    while open.len() > 1 && open.first() == open.last() {
        open.pop();
    }
    if open.len() < 3 {
        return;
    }
    draw_polygon_mut(frame, &open, color);
}

/// Axis-aligned rectangle outline between two corners.
pub fn rectangle(frame: &mut RgbImage, p1: (i32, i32), p2: (i32, i32), color: Rgb<u8>, thickness: u32) {
    let corners = [
        Point::new(p1.0, p1.1),
        Point::new(p2.0, p1.1),
        Point::new(p2.0, p2.1),
        Point::new(p1.0, p2.1),
    ];
    polygon_outline(frame, &corners, color, thickness);
}

/// Circle outline `thickness` pixels wide.
pub fn circle(frame: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>, thickness: u32) {
    let thickness = thickness.max(1) as i32;
    let inner = radius.saturating_sub((thickness - 1) / 2);
    for r in inner.max(0)..inner.saturating_add(thickness) {
        draw_hollow_circle_mut(frame, center, r, color);
    }
}

/// Text with its bottom-left corner at `origin`.
pub fn text(frame: &mut RgbImage, content: &str, origin: (i32, i32), font: &FontArc, font_scale: f32, color: Rgb<u8>) {
    let scale = PxScale::from(BASE_TEXT_PX * font_scale);
    let (_, height) = text_size(scale, font, content);
    draw_text_mut(frame, color, origin.0, origin.1 - height as i32, scale, font, content);
}

/// Composite `overlay` over `frame` with opacity `alpha`, in place.
/// Pixels where the two images agree are left untouched.
pub fn blend(frame: &mut RgbImage, overlay: &RgbImage, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    for (dst, src) in frame.pixels_mut().zip(overlay.pixels()) {
        if dst == src {
            continue;
        }
        for c in 0..3 {
            let mixed = alpha * src[c] as f32 + (1.0 - alpha) * dst[c] as f32;
            dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Centroid from polygon moments, or the first vertex when the area is zero.
pub fn polygon_centroid(vertices: &[Point<i32>]) -> Option<(i32, i32)> {
    let first = vertices.first()?;
    let (mut m00, mut m10, mut m01) = (0.0f64, 0.0f64, 0.0f64);

    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
        let cross = ax * by - bx * ay;
        m00 += cross;
        m10 += (ax + bx) * cross;
        m01 += (ay + by) * cross;
    }

    if m00 == 0.0 {
        return Some((first.x, first.y));
    }

    // m00 holds twice the signed area, m10/m01 six times the first moments
    let cx = m10 / (3.0 * m00);
    let cy = m01 / (3.0 * m00);
    Some((cx as i32, cy as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> RgbImage {
        RgbImage::new(w, h)
    }

    #[test]
    fn test_centroid_square() {
        let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10), Point::new(0, 10)];
        assert_eq!(polygon_centroid(&square), Some((5, 5)));
    }

    #[test]
    fn test_centroid_degenerate_falls_back_to_first_vertex() {
        let flat = [Point::new(3, 4), Point::new(8, 4), Point::new(12, 4)];
        assert_eq!(polygon_centroid(&flat), Some((3, 4)));
        assert_eq!(polygon_centroid(&[]), None);
    }

    #[test]
    fn test_blend_only_touches_differing_pixels() {
        let mut frame = blank(4, 4);
        let mut overlay = frame.clone();
        overlay.put_pixel(1, 1, Rgb([100, 200, 0]));

        blend(&mut frame, &overlay, 0.3);
        assert_eq!(*frame.get_pixel(1, 1), Rgb([30, 60, 0]));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_filled_polygon_accepts_closed_input() {
        let mut frame = blank(20, 20);
        let closed = [
            Point::new(2, 2),
            Point::new(15, 2),
            Point::new(15, 15),
            Point::new(2, 15),
            Point::new(2, 2),
        ];
        filled_polygon(&mut frame, &closed, Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(8, 8), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(18, 18), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_thick_circle_and_rectangle() {
        let mut frame = blank(60, 60);
        circle(&mut frame, (30, 30), 10, Rgb([255, 0, 0]), 3);
        assert_eq!(*frame.get_pixel(40, 30), Rgb([255, 0, 0]));
        assert_eq!(*frame.get_pixel(30, 30), Rgb([0, 0, 0]));

        let mut frame = blank(60, 60);
        rectangle(&mut frame, (5, 5), (50, 40), Rgb([0, 0, 255]), 2);
        assert_eq!(*frame.get_pixel(20, 5), Rgb([0, 0, 255]));
        assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 0, 0]));
    }
}
