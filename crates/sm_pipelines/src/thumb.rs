//! PDF-page-to-thumbnail rendering and aspect-driven size selection.
//!
//! The original renderer rasterizes via PyMuPDF (`fitz`), falling back to a
//! solid placeholder canvas only when that module isn't installed. This
//! port rasterizes via `pdfium-render` against the system's pdfium shared
//! library, with the same placeholder fallback when no such library is
//! bound on the host. The size selection and on-disk contract (JPEG at
//! `<width>x<height>`) are exact either way.

use std::path::Path;
use std::sync::OnceLock;

use image::{ImageBuffer, Rgb};
use pdfium_render::prelude::*;
use sm_protocol::Aspect;

use crate::error::{PipelineError, Result};

pub fn thumb_size(aspect: Aspect, width: u32, height_4_3: u32, height_16_9: u32) -> (u32, u32) {
    match aspect {
        Aspect::Ratio4x3 => (width, height_4_3),
        Aspect::Ratio16x9 => (width, height_16_9),
        Aspect::Unknown => (width, height_16_9),
    }
}

/// Binds the system pdfium library once and reuses it for every render
/// call. `None` means no usable pdfium library was found on this host.
fn pdfium() -> Option<&'static Pdfium> {
    static INSTANCE: OnceLock<Option<Pdfium>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| Pdfium::bind_to_system_library().ok().map(Pdfium::new))
        .as_ref()
}

/// Renders page `page_index0` (0-based) of `pdf_path` to `out_path` at
/// `(width, height)`: loads the PDF, scales the page's rectangle to the
/// target dimensions, and rasterizes an opaque pixmap.
pub fn render_pdf_page_to_thumb(
    pdf_path: &Path,
    page_index0: u32,
    out_path: &Path,
    width: u32,
    height: u32,
) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let Some(pdfium) = pdfium() else {
        return write_placeholder(out_path, width, height);
    };

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| PipelineError::Pdf(e.to_string()))?;
    let page = document
        .pages()
        .get(page_index0 as u16)
        .map_err(|e| PipelineError::Pdf(e.to_string()))?;

    // Setting width and height independently (rather than via a single
    // aspect-preserving helper) stretches non-uniformly to the exact box,
    // matching the original's `fitz.Matrix(sx, sy)` per-axis scale.
    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_target_height(height as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PipelineError::Pdf(e.to_string()))?;

    bitmap.as_image().to_rgb8().save(out_path)?;
    Ok(())
}

fn write_placeholder(out_path: &Path, width: u32, height: u32) -> Result<()> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([255, 255, 255]));
    img.save(out_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_selection_matches_aspect() {
        assert_eq!(thumb_size(Aspect::Ratio4x3, 320, 240, 180), (320, 240));
        assert_eq!(thumb_size(Aspect::Ratio16x9, 320, 240, 180), (320, 180));
        assert_eq!(thumb_size(Aspect::Unknown, 320, 240, 180), (320, 180));
    }
}
