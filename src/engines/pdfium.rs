//! Default rasteriser and recomposer.
//!
//! PDFs go through pdfium; image files are decoded and re-encoded with the
//! `image` crate and never touch pdfium, so image-only runs work on hosts
//! without the pdfium library.
//!
//! ## Binding
//!
//! pdfium is a shared library loaded at runtime, first match wins:
//!
//! 1. `PDFIUM_LIB_PATH`, if it points at an existing file;
//! 2. the platform library name in the working directory;
//! 3. the system library search path.
//!
//! A failed bind is [`EngineError::Unavailable`].

use super::{EngineError, Rasterizer, Recomposer};
use crate::model::{ImageKind, OutputFormat, SourceFormat};
use image::{DynamicImage, ImageReader, RgbImage};
use pdfium_render::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use tracing::debug;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

fn bind_pdfium() -> Result<Pdfium, EngineError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| {
                    EngineError::Unavailable(format!(
                        "cannot load pdfium from '{}': {e}",
                        path.display()
                    ))
                });
        }
        debug!("PDFIUM_LIB_PATH '{}' does not exist, searching", path.display());
    }
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| {
            EngineError::Unavailable(format!("pdfium not found ({e}); set PDFIUM_LIB_PATH"))
        })
}

fn open_image(path: &Path) -> Result<ImageReader<BufReader<File>>, EngineError> {
    ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| EngineError::Failed(format!("cannot open '{}': {e}", path.display())))
}

/// Convert a decoded image to the 8-bit RGB page raster.
///
/// Only 8-bit grey and RGB convert without loss. Alpha variants are accepted
/// when every pixel is opaque; transparency and 16-bit or float samples are
/// refused rather than flattened.
fn page_raster(image: DynamicImage) -> Result<RgbImage, EngineError> {
    let opaque = match &image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => true,
        DynamicImage::ImageLumaA8(img) => img.pixels().all(|p| p[1] == u8::MAX),
        DynamicImage::ImageRgba8(img) => img.pixels().all(|p| p[3] == u8::MAX),
        other => {
            return Err(EngineError::Failed(format!(
                "unsupported colour type {:?}; convert the image to 8-bit RGB first",
                other.color()
            )));
        }
    };
    if !opaque {
        return Err(EngineError::Failed(
            "image has transparent pixels; flatten the alpha channel first".into(),
        ));
    }
    Ok(image.to_rgb8())
}

/// Rasterises PDFs with pdfium and decodes images with `image`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRasterizer;

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, path: &Path, format: SourceFormat) -> Result<usize, EngineError> {
        match format {
            SourceFormat::Image(_) => {
                open_image(path)?
                    .into_dimensions()
                    .map_err(|e| EngineError::Failed(format!("unreadable image: {e}")))?;
                Ok(1)
            }
            SourceFormat::Pdf => {
                let pdfium = bind_pdfium()?;
                let document = pdfium
                    .load_pdf_from_file(path, None)
                    .map_err(|e| EngineError::Failed(format!("cannot open PDF: {e:?}")))?;
                Ok(document.pages().len() as usize)
            }
        }
    }

    fn rasterize(
        &self,
        path: &Path,
        format: SourceFormat,
        dpi: u32,
    ) -> Result<Vec<RgbImage>, EngineError> {
        match format {
            SourceFormat::Image(_) => {
                let image = open_image(path)?
                    .decode()
                    .map_err(|e| EngineError::Failed(format!("cannot decode image: {e}")))?;
                Ok(vec![page_raster(image)?])
            }
            SourceFormat::Pdf => {
                let pdfium = bind_pdfium()?;
                let document = pdfium
                    .load_pdf_from_file(path, None)
                    .map_err(|e| EngineError::Failed(format!("cannot open PDF: {e:?}")))?;

                let render_config = PdfRenderConfig::new()
                    .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
                    .render_form_data(true)
                    .render_annotations(true);

                let mut pages = Vec::with_capacity(document.pages().len() as usize);
                for (idx, page) in document.pages().iter().enumerate() {
                    let bitmap = page
                        .render_with_config(&render_config)
                        .map_err(|e| EngineError::Failed(format!("page {}: {e:?}", idx + 1)))?;
                    pages.push(bitmap.as_image().to_rgb8());
                }
                Ok(pages)
            }
        }
    }
}

/// Writes images with `image` and PDFs with pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRecomposer;

impl Recomposer for PdfiumRecomposer {
    fn assemble(
        &self,
        pages: &[&RgbImage],
        dpi: u32,
        format: OutputFormat,
    ) -> Result<Vec<u8>, EngineError> {
        match format {
            OutputFormat::Image(kind) => match pages {
                [page] => encode_image(page, kind),
                _ => Err(EngineError::Failed(format!(
                    "an image holds one page, got {}",
                    pages.len()
                ))),
            },
            OutputFormat::Pdf => build_pdf(pages, dpi),
        }
    }
}

fn encode_image(page: &RgbImage, kind: ImageKind) -> Result<Vec<u8>, EngineError> {
    let mut buf = Cursor::new(Vec::new());
    page.write_to(&mut buf, kind.image_format())
        .map_err(|e| EngineError::Failed(format!("{} encoding failed: {e}", kind.extension())))?;
    Ok(buf.into_inner())
}

/// One PDF page per raster, sized so the raster maps back to `dpi`.
fn build_pdf(pages: &[&RgbImage], dpi: u32) -> Result<Vec<u8>, EngineError> {
    let pdfium = bind_pdfium()?;
    let failed = |e: PdfiumError| EngineError::Failed(format!("PDF assembly: {e:?}"));

    let mut document = pdfium.create_new_pdf().map_err(failed)?;
    for raster in pages {
        let width = PdfPoints::new(raster.width() as f32 * POINTS_PER_INCH / dpi as f32);
        let height = PdfPoints::new(raster.height() as f32 * POINTS_PER_INCH / dpi as f32);
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::from_points(width, height))
            .map_err(failed)?;
        let image = DynamicImage::ImageRgb8((*raster).clone());
        page.objects_mut()
            .create_image_object(
                PdfPoints::ZERO,
                PdfPoints::ZERO,
                &image,
                Some(width),
                Some(height),
            )
            .map_err(failed)?;
    }
    document.save_to_bytes().map_err(failed)
}
