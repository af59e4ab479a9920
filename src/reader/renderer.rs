//! Fits page bitmaps into the viewport and keeps the highlight marks that
//! belong to the page on screen.

use super::highlight::{HighlightMarks, highlight_mark};
use crate::document::{BBox, DocumentSource};
use anyhow::{Context, Result};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Where the scaled bitmap lands inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Uniform scale that shows the whole bitmap, centered.
pub fn fit_to_viewport(bitmap_width: u32, bitmap_height: u32, viewport: Viewport) -> Placement {
    let ratio = (viewport.width / bitmap_width.max(1) as f32)
        .min(viewport.height / bitmap_height.max(1) as f32);
    let width = ((bitmap_width as f32 * ratio) as u32).max(1);
    let height = ((bitmap_height as f32 * ratio) as u32).max(1);
    Placement {
        x: (viewport.width as i32 - width as i32).div_euclid(2),
        y: (viewport.height as i32 - height as i32).div_euclid(2),
        width,
        height,
    }
}

#[derive(Debug, Clone)]
pub struct DisplayedPage {
    pub index: usize,
    pub page_size: (f32, f32),
    pub placement: Placement,
    /// RGBA pixels already scaled to `placement`.
    pub pixels: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct PageRenderer {
    current: Option<DisplayedPage>,
    marks: HighlightMarks,
    generation: u64,
}

impl PageRenderer {
    /// Clear the canvas, then rasterize `index` and fit it into `viewport`.
    pub fn display(
        &mut self,
        document: &dyn DocumentSource,
        index: usize,
        viewport: Viewport,
    ) -> Result<&DisplayedPage> {
        self.clear();

        let raster = document.render_page(index)?;
        let page_size = document.page_size(index)?;
        let placement = fit_to_viewport(raster.width, raster.height, viewport);
        let source = RgbaImage::from_raw(raster.width, raster.height, raster.pixels)
            .context("Page raster does not match its dimensions")?;
        let scaled = imageops::resize(
            &source,
            placement.width,
            placement.height,
            FilterType::Lanczos3,
        );
        debug!(
            page = index,
            x = placement.x,
            y = placement.y,
            width = placement.width,
            height = placement.height,
            "Displayed page"
        );

        Ok(&*self.current.insert(DisplayedPage {
            index,
            page_size,
            placement,
            pixels: scaled.into_raw(),
        }))
    }

    /// Drop the displayed page and all of its marks.
    pub fn clear(&mut self) {
        self.current = None;
        self.marks.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Add a mark for a span on `page`. Marks for any other page are ignored
    /// so the overlay never shows stale highlights.
    pub fn highlight(&mut self, page: usize, bbox: BBox, canvas: Viewport) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        if current.index != page {
            return false;
        }
        self.marks.push(highlight_mark(bbox, canvas, current.page_size));
        true
    }

    pub fn current(&self) -> Option<&DisplayedPage> {
        self.current.as_ref()
    }

    pub fn marks(&self) -> &HighlightMarks {
        &self.marks
    }

    /// Changes whenever the displayed bitmap changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
