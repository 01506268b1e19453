//! Page rasterizer adapter: input file → ordered [`Document`].
//!
//! The actual decoding is delegated to a [`Rasterizer`] collaborator. This
//! stage owns the contract around it: DPI bounds, one page per image input,
//! page order, and mapping engine failures into the fatal error taxonomy.
//!
//! Rasterisation is CPU-bound and pdfium is not async-safe, so the
//! collaborator runs inside `spawn_blocking`.

use crate::config::{MAX_DPI, MIN_DPI};
use crate::engines::{EngineError, Rasterizer};
use crate::error::RedactError;
use crate::model::{Document, Page, Raster, SourceFormat};
use crate::pipeline::input::ResolvedInput;
use std::sync::Arc;
use tracing::{debug, info};

/// Rasterise every page of `input` at `dpi`.
pub async fn rasterize_document(
    input: &ResolvedInput,
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
) -> Result<Document, RedactError> {
    if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
        return Err(RedactError::InvalidParameter(format!(
            "DPI must be {MIN_DPI}–{MAX_DPI}, got {dpi}"
        )));
    }

    let path = input.path.clone();
    let format = input.format;
    let images = tokio::task::spawn_blocking(move || rasterizer.rasterize(&path, format, dpi))
        .await
        .map_err(|e| RedactError::Internal(format!("Render task panicked: {}", e)))?
        .map_err(map_engine_error)?;

    if images.is_empty() {
        return Err(RedactError::Rasterization {
            detail: format!("'{}' has no pages", input.path.display()),
        });
    }
    if matches!(format, SourceFormat::Image(_)) && images.len() != 1 {
        return Err(RedactError::Rasterization {
            detail: format!(
                "image input produced {} pages, expected exactly one",
                images.len()
            ),
        });
    }

    let pages: Vec<Page> = images
        .into_iter()
        .enumerate()
        .map(|(idx, image)| {
            debug!(
                "Rasterised page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            Page::new(idx, Raster::new(image, dpi))
        })
        .collect();

    info!("Rasterised {} pages at {} DPI", pages.len(), dpi);

    Ok(Document {
        path: input.path.clone(),
        source: format,
        dpi,
        pages,
    })
}

/// Count pages without rendering them.
pub async fn count_pages(
    input: &ResolvedInput,
    rasterizer: Arc<dyn Rasterizer>,
) -> Result<usize, RedactError> {
    let path = input.path.clone();
    let format = input.format;
    tokio::task::spawn_blocking(move || rasterizer.page_count(&path, format))
        .await
        .map_err(|e| RedactError::Internal(format!("Page-count task panicked: {}", e)))?
        .map_err(map_engine_error)
}

fn map_engine_error(e: EngineError) -> RedactError {
    match e {
        EngineError::Unavailable(detail) => RedactError::EngineUnavailable {
            engine: "Rasteriser".into(),
            detail,
        },
        EngineError::Failed(detail) => RedactError::Rasterization { detail },
    }
}
