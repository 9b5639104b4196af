// Piano-roll layout and SVG rendering.
//
// Maps each note of a sequence to a rectangle on a fixed-size surface: time
// runs left to right across the full width, pitch bottom to top with one
// row per semitone between the lowest and highest note. Rectangles fill 80%
// of their row. Color hue runs from 0 (lowest pitch, red) to 240 (highest,
// blue); a sequence of one repeated pitch is drawn at hue 0.
//
// `layout` is the pure mapping; `render_svg` draws it as a standalone SVG
// document for the CLI's `--svg` output.

use crate::sequence::NoteSequence;
use std::fmt::Write;

/// Default surface height, in pixels.
pub const DEFAULT_HEIGHT: f64 = 300.0;

/// Default surface width, in pixels.
pub const DEFAULT_WIDTH: f64 = 800.0;

/// Fraction of a pitch row a note rectangle fills.
const ROW_FILL: f64 = 0.8;

/// Hue of the highest pitch, in degrees.
const MAX_HUE: f64 = 240.0;

/// A note's rectangle on the surface. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Fill hue in degrees, 0..=240.
    pub hue: f64,
}

/// Lay out every note of `seq` on a `width` x `height` surface.
///
/// Returns an empty list for a sequence without notes. A non-positive
/// `total_time` falls back to the latest note end.
pub fn layout(seq: &NoteSequence, width: f64, height: f64) -> Vec<NoteRect> {
    let Some((min_pitch, max_pitch)) = seq.pitch_range() else {
        return Vec::new();
    };
    let total_time = if seq.total_time > 0.0 {
        seq.total_time
    } else {
        seq.max_end_time()
    };
    if total_time <= 0.0 {
        return Vec::new();
    }

    let time_scale = width / total_time;
    let span = f64::from(max_pitch - min_pitch);
    let pitch_scale = height / (span + 1.0);

    seq.notes
        .iter()
        .map(|note| {
            let offset = f64::from(note.pitch - min_pitch);
            NoteRect {
                x: note.start_time * time_scale,
                y: height - (offset + 1.0) * pitch_scale,
                width: note.duration() * time_scale,
                height: ROW_FILL * height / (span + 1.0),
                hue: if span > 0.0 {
                    offset * MAX_HUE / span
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Render `seq` as an SVG document.
pub fn render_svg(seq: &NoteSequence, width: f64, height: f64) -> String {
    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );

    let rects = layout(seq, width, height);
    if rects.is_empty() {
        let _ = writeln!(
            svg,
            r##"  <text x="{}" y="{}" fill="#999" font-family="Arial" font-size="16" text-anchor="middle">No music to visualize</text>"##,
            width / 2.0,
            height / 2.0
        );
    }
    for r in &rects {
        let _ = writeln!(
            svg,
            r##"  <rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="hsl({:.1}, 70%, 60%)" stroke="#333" stroke-width="1"/>"##,
            r.x, r.y, r.width, r.height, r.hue
        );
    }
    svg.push_str("</svg>\n");
    svg
}
