//! Screenshot pagination: one tall full-page screenshot → a fixed-page PDF.
//!
//! Full-page screenshots of long webpages are tens of thousands of pixels
//! tall. The retrieval backend embeds documents page by page, so the image is
//! cut into [`SCREENSHOT_PAGE_COUNT`] horizontal bands of equal height (the
//! last one clamped to the image bottom) and each band becomes one PDF page
//! sized in points to its pixel dimensions.
//!
//! ## Why spawn_blocking?
//!
//! Decoding, cropping and deflating a multi-megapixel image is CPU-bound.
//! It runs on the blocking pool so the Tokio workers keep serving I/O.

use crate::config::AssistantConfig;
use crate::error::WebRagError;
use crate::pipeline::encode::{self, SLICE_XOBJECT_NAME};
use crate::pipeline::write_document;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Number of pages every screenshot is cut into.
///
/// Fixed rather than derived from the image height; it keeps each page of a
/// typical landing page within the indexing service's input-size limits.
pub const SCREENSHOT_PAGE_COUNT: u32 = 10;

/// File name of the assembled screenshot PDF inside the work directory.
pub const SCREENSHOT_PDF_NAME: &str = "screenshot_slices.pdf";

/// Vertical crop band `[top, bottom)` of the source image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliceRect {
    pub top: u32,
    pub bottom: u32,
}

impl SliceRect {
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Result of [`create_pdf_from_screenshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotPdf {
    /// Where the PDF was written.
    pub path: PathBuf,
    /// Source image width in pixels (= page width in points).
    pub width: u32,
    /// Source image height in pixels.
    pub height: u32,
    /// `ceil(height / page_count)`.
    pub slice_height: u32,
    /// Crop band of each page, in page order.
    pub slices: Vec<SliceRect>,
}

/// Height of every band but possibly the last: `ceil(height / page_count)`.
pub fn slice_height(height: u32, page_count: u32) -> u32 {
    height.div_ceil(page_count.max(1))
}

/// Crop bands for an image `height` pixels tall cut into `page_count` pages.
///
/// Always returns exactly `page_count` bands. Both edges are clamped to
/// `height`, so on short images trailing bands are empty (`top == bottom`).
pub fn slice_plan(height: u32, page_count: u32) -> Vec<SliceRect> {
    let page_count = page_count.max(1);
    let step = u64::from(slice_height(height, page_count));
    let limit = u64::from(height);

    (0..u64::from(page_count))
        .map(|i| SliceRect {
            top: (i * step).min(limit) as u32,
            bottom: ((i + 1) * step).min(limit) as u32,
        })
        .collect()
}

/// Build the paginated PDF for `img` in memory.
///
/// Page `i` has a MediaBox of `width × slice_i.height()` points and draws
/// band `i` at the origin, scaled 1 pt per pixel. Empty bands produce a
/// page with an empty content stream and zero height.
pub fn paginate_image(img: &DynamicImage) -> Result<Vec<u8>, WebRagError> {
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(WebRagError::EmptyImage { width, height });
    }

    let plan = slice_plan(height, SCREENSHOT_PAGE_COUNT);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(plan.len());

    for (idx, band) in plan.iter().enumerate() {
        let band_height = band.height();

        let (resources, operations) = if band_height > 0 {
            let slice = img.crop_imm(0, band.top, width, band_height);
            let image_id = doc.add_object(encode::encode_slice(&slice));
            (
                dictionary! {
                    "XObject" => dictionary! { SLICE_XOBJECT_NAME => image_id },
                },
                draw_slice(width, band_height),
            )
        } else {
            (dictionary! {}, Vec::new())
        };

        let content = Content { operations }
            .encode()
            .map_err(|e| WebRagError::PdfAssemblyFailed {
                detail: format!("page {} content: {e}", idx + 1),
            })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(width)),
                Object::Integer(i64::from(band_height)),
            ],
        });
        debug!(
            "Page {}: rows {}..{} → {}x{} pt",
            idx + 1,
            band.top,
            band.bottom,
            width,
            band_height
        );
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| WebRagError::PdfAssemblyFailed {
            detail: e.to_string(),
        })?;
    Ok(bytes)
}

/// Content stream drawing the page's slice image over the whole page.
fn draw_slice(width: u32, height: u32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Integer(i64::from(width)),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(height)),
                Object::Integer(0),
                Object::Integer(0),
            ],
        ),
        Operation::new("Do", vec![Object::Name(SLICE_XOBJECT_NAME.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Download a screenshot and write it to `work_dir` as a paginated PDF.
///
/// Overwrites any previous [`SCREENSHOT_PDF_NAME`]. No retry: a failed
/// download aborts processing of this document.
pub async fn create_pdf_from_screenshot(
    screenshot_url: &str,
    config: &AssistantConfig,
) -> Result<ScreenshotPdf, WebRagError> {
    let bytes = fetch_screenshot(screenshot_url, config.download_timeout_secs).await?;
    let path = config.work_dir.join(SCREENSHOT_PDF_NAME);

    tokio::task::spawn_blocking(move || -> Result<ScreenshotPdf, WebRagError> {
        let img = image::load_from_memory(&bytes).map_err(|e| WebRagError::ImageDecodeFailed {
            detail: e.to_string(),
        })?;
        drop(bytes);

        let (width, height) = (img.width(), img.height());
        info!("Paginating {}x{} px screenshot", width, height);

        let pdf = paginate_image(&img)?;
        drop(img);
        write_document(&path, &pdf)?;

        info!(
            "Wrote {} pages ({} bytes) to {}",
            SCREENSHOT_PAGE_COUNT,
            pdf.len(),
            path.display()
        );
        Ok(ScreenshotPdf {
            path,
            width,
            height,
            slice_height: slice_height(height, SCREENSHOT_PAGE_COUNT),
            slices: slice_plan(height, SCREENSHOT_PAGE_COUNT),
        })
    })
    .await
    .map_err(|e| WebRagError::Internal(format!("Pagination task panicked: {e}")))?
}

/// Fetch the raw screenshot bytes.
///
/// Accepts an HTTP(S) URL or an inline `data:image/...;base64,` URI, which
/// self-hosted scraper deployments return instead of a hosted file.
pub async fn fetch_screenshot(url: &str, timeout_secs: u64) -> Result<Vec<u8>, WebRagError> {
    if url.starts_with("data:") {
        return decode_data_uri(url);
    }

    info!("Downloading screenshot");
    debug!("Screenshot URL: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| WebRagError::ScreenshotDownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            WebRagError::ScreenshotDownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            WebRagError::ScreenshotDownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(WebRagError::ScreenshotDownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;
    debug!("Downloaded {} screenshot bytes", bytes.len());
    Ok(bytes.to_vec())
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, WebRagError> {
    let invalid = |reason: &str| WebRagError::ScreenshotDownloadFailed {
        url: "data: URI".to_string(),
        reason: reason.to_string(),
    };
    let (header, payload) = uri.split_once(',').ok_or_else(|| invalid("missing ','"))?;
    if !header.ends_with(";base64") {
        return Err(invalid("only base64 data URIs are supported"));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid(&e.to_string()))
}
