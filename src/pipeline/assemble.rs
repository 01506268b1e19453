//! Output assembly: finished pages → one image or PDF artifact.
//!
//! Pages arrive here only once every worker is done, already sorted by
//! index. This stage re-checks that order and that every buffer is intact
//! before handing them to the [`Recomposer`]; any doubt is an
//! [`RedactError::Assembly`] and no artifact is produced.

use crate::engines::{EngineError, Recomposer};
use crate::error::RedactError;
use crate::model::{OutputFormat, Page, SourceFormat};
use image::RgbImage;
use std::sync::Arc;
use tracing::info;

/// Encode `pages` into the artifact for `source`.
pub async fn assemble_document(
    pages: &[Page],
    source: SourceFormat,
    dpi: u32,
    recomposer: Arc<dyn Recomposer>,
) -> Result<(Vec<u8>, OutputFormat), RedactError> {
    if pages.is_empty() {
        return Err(RedactError::Assembly {
            detail: "no pages to assemble".into(),
        });
    }

    for (expected, page) in pages.iter().enumerate() {
        if page.index != expected {
            return Err(RedactError::Assembly {
                detail: format!(
                    "page order broken: position {} holds page {}",
                    expected + 1,
                    page.number()
                ),
            });
        }
        let img = &page.raster.image;
        let expected_len = img.width() as usize * img.height() as usize * 3;
        if page.raster.is_empty() || img.as_raw().len() != expected_len {
            return Err(RedactError::Assembly {
                detail: format!("page {} buffer is missing or corrupt", page.number()),
            });
        }
    }

    let format = OutputFormat::for_source(source, pages.len());
    let images: Vec<Arc<RgbImage>> = pages.iter().map(|p| Arc::clone(&p.raster.image)).collect();

    let bytes = tokio::task::spawn_blocking(move || {
        let refs: Vec<&RgbImage> = images.iter().map(|i| i.as_ref()).collect();
        recomposer.assemble(&refs, dpi, format)
    })
    .await
    .map_err(|e| RedactError::Internal(format!("Assembly task panicked: {}", e)))?
    .map_err(|e| match e {
        EngineError::Unavailable(detail) => RedactError::EngineUnavailable {
            engine: "Recomposer".into(),
            detail,
        },
        EngineError::Failed(detail) => RedactError::Assembly { detail },
    })?;

    if bytes.is_empty() {
        return Err(RedactError::Assembly {
            detail: "recomposer produced an empty artifact".into(),
        });
    }

    info!(
        "Assembled {} pages as {:?} ({} bytes)",
        pages.len(),
        format,
        bytes.len()
    );
    Ok((bytes, format))
}
