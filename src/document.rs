//! PDF access for the reader.
//!
//! The rest of the crate only sees [`DocumentSource`]; `mupdf` types stay in
//! this module. A document handle is not `Send`, so the reading worker opens
//! its own copy through a [`DocumentOpener`].

use anyhow::{Context, Result, anyhow, bail};
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, TextPageFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Axis-aligned box in page units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn union(self, other: BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Smallest unit of positioned text on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

/// Structured text of a single page in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub blocks: Vec<TextBlock>,
}

impl PageText {
    /// All spans in (block, line, span) order.
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.blocks
            .iter()
            .flat_map(|block| block.lines.iter())
            .flat_map(|line| line.spans.iter())
    }
}

/// RGBA page bitmap.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait DocumentSource {
    fn path(&self) -> &Path;
    fn page_count(&self) -> usize;
    /// Native page size in page units.
    fn page_size(&self, index: usize) -> Result<(f32, f32)>;
    fn render_page(&self, index: usize) -> Result<PageRaster>;
    fn page_text(&self, index: usize) -> Result<PageText>;
}

pub type DocumentOpener = Arc<dyn Fn(&Path) -> Result<Box<dyn DocumentSource>> + Send + Sync>;

pub fn pdf_opener() -> DocumentOpener {
    Arc::new(|path: &Path| {
        let document = PdfDocument::open(path)?;
        Ok(Box::new(document) as Box<dyn DocumentSource>)
    })
}

pub struct PdfDocument {
    path: PathBuf,
    document: Document,
    page_count: usize,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path.to_string_lossy();
        let document = Document::open(path_str.as_ref())
            .with_context(|| format!("Failed to open PDF file: {}", path.display()))?;
        let page_count = document
            .page_count()
            .with_context(|| format!("Failed to read page count of {}", path.display()))?;
        if page_count <= 0 {
            bail!("{} contains no pages", path.display());
        }
        info!(path = %path.display(), pages = page_count, "Opened PDF");
        Ok(Self {
            path: path.to_path_buf(),
            document,
            page_count: page_count as usize,
        })
    }

    fn load_page(&self, index: usize) -> Result<Page> {
        if index >= self.page_count {
            return Err(anyhow!(
                "Page index {index} out of range (document has {} pages)",
                self.page_count
            ));
        }
        self.document
            .load_page(index as i32)
            .with_context(|| format!("Failed to load page {index}"))
    }
}

impl DocumentSource for PdfDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let bounds = self.load_page(index)?.bounds()?;
        Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn render_page(&self, index: usize) -> Result<PageRaster> {
        let page = self.load_page(index)?;
        let rgb = Colorspace::device_rgb();
        let pixmap = page
            .to_pixmap(&Matrix::new_scale(1.0, 1.0), &rgb, false, false)
            .with_context(|| format!("Failed to rasterize page {index}"))?;
        let raster = pixmap_to_rgba(&pixmap)?;
        debug!(
            page = index,
            width = raster.width,
            height = raster.height,
            "Rasterized page"
        );
        Ok(raster)
    }

    fn page_text(&self, index: usize) -> Result<PageText> {
        let page = self.load_page(index)?;
        let text_page = page
            .to_text_page(TextPageFlags::COLLECT_STYLES)
            .with_context(|| format!("Failed to extract text of page {index}"))?;

        let mut blocks = Vec::new();
        for block in text_page.blocks() {
            if !is_spoken_block(block.r#type()) {
                continue;
            }
            let mut lines = Vec::new();
            for line in block.lines() {
                let glyphs = line.chars().filter_map(|ch| {
                    let quad = ch.quad();
                    let bbox = BBox {
                        x0: quad.ul.x.min(quad.ll.x),
                        y0: quad.ul.y.min(quad.ur.y),
                        x1: quad.ur.x.max(quad.lr.x),
                        y1: quad.ll.y.max(quad.lr.y),
                    };
                    ch.char().map(|c| Glyph {
                        c,
                        size: ch.size(),
                        bbox,
                    })
                });
                let spans = group_spans(glyphs);
                if !spans.is_empty() {
                    lines.push(TextLine { spans });
                }
            }
            if !lines.is_empty() {
                blocks.push(TextBlock { lines });
            }
        }
        Ok(PageText { blocks })
    }
}

/// Only text blocks are read; image blocks carry no spans.
fn is_spoken_block(kind: TextBlockType) -> bool {
    kind == TextBlockType::Text
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<PageRaster> {
    let n = pixmap.n() as usize;
    if n < 3 {
        bail!("Unsupported pixmap format: {n} channels");
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        bail!("Pixmap buffer size mismatch");
    }

    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        for px in row.chunks_exact(n) {
            pixels.extend_from_slice(&px[..3]);
            pixels.push(if n >= 4 { px[3] } else { 255 });
        }
    }

    Ok(PageRaster {
        width: width as u32,
        height: height as u32,
        pixels,
    })
}

/// One extracted character with its style and box.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Glyph {
    pub c: char,
    pub size: f32,
    pub bbox: BBox,
}

const SIZE_TOLERANCE: f32 = 0.01;

/// Group the characters of one line into spans: a new span starts whenever
/// the font size changes. Whitespace-only spans are dropped.
pub(crate) fn group_spans(glyphs: impl IntoIterator<Item = Glyph>) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut current: Option<(String, f32, BBox)> = None;

    for glyph in glyphs {
        match current.as_mut() {
            Some((text, size, bbox)) if (*size - glyph.size).abs() <= SIZE_TOLERANCE => {
                text.push(glyph.c);
                *bbox = bbox.union(glyph.bbox);
            }
            _ => {
                if let Some((text, _, bbox)) = current.take() {
                    push_span(&mut spans, text, bbox);
                }
                current = Some((glyph.c.to_string(), glyph.size, glyph.bbox));
            }
        }
    }
    if let Some((text, _, bbox)) = current {
        push_span(&mut spans, text, bbox);
    }
    spans
}

fn push_span(spans: &mut Vec<TextSpan>, text: String, bbox: BBox) {
    if text.chars().any(|c| !c.is_whitespace()) {
        spans.push(TextSpan { text, bbox });
    }
}
