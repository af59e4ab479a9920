//! Span highlight geometry.
//!
//! Span boxes are converted from page units to canvas units by scaling each
//! axis with `canvas / page`, using the native page size. This is not the
//! aspect-preserving scale used to place the bitmap, so the two can disagree
//! when the viewport and page aspect ratios differ.

use super::renderer::Viewport;
use crate::document::BBox;

/// Horizontal line drawn under the spoken span, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightMark {
    pub x0: f32,
    pub x1: f32,
    pub y: f32,
}

pub fn highlight_mark(bbox: BBox, canvas: Viewport, page_size: (f32, f32)) -> HighlightMark {
    let (page_width, page_height) = page_size;
    let sx = if page_width > 0.0 {
        canvas.width / page_width
    } else {
        0.0
    };
    let sy = if page_height > 0.0 {
        canvas.height / page_height
    } else {
        0.0
    };
    HighlightMark {
        x0: bbox.x0 * sx,
        x1: bbox.x1 * sx,
        y: (bbox.y0 * sy + bbox.y1 * sy) / 2.0,
    }
}

/// Marks drawn on the current page, cleared in bulk on every display.
#[derive(Debug, Clone, Default)]
pub struct HighlightMarks {
    marks: Vec<HighlightMark>,
}

impl HighlightMarks {
    pub fn push(&mut self, mark: HighlightMark) {
        self.marks.push(mark);
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn as_slice(&self) -> &[HighlightMark] {
        &self.marks
    }
}
