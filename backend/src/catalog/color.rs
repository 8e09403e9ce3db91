//! Dominant colour of a cover image.

use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;

use super::ImageFetcher;
use crate::config::{http_client, DEFAULT_COVER_TIMEOUT};
use crate::error::{CatalogError, CatalogResult};
use crate::models::Rgb;

/// Side of the thumbnail the average is computed over.
const SAMPLE_SIZE: u32 = 24;

/// Pixels below this alpha are treated as transparent and skipped.
const MIN_ALPHA: u8 = 200;

/// Average colour of the opaque pixels, or `None` for a fully transparent image.
pub fn dominant_color(bytes: &[u8]) -> CatalogResult<Option<Rgb>> {
    let img = image::load_from_memory(bytes).map_err(|e| CatalogError::Image(e.to_string()))?;
    let thumb = img
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgba8();

    let (mut r, mut g, mut b, mut count) = (0u64, 0u64, 0u64, 0u64);
    for pixel in thumb.pixels() {
        let [pr, pg, pb, alpha] = pixel.0;
        if alpha < MIN_ALPHA {
            continue;
        }
        r += u64::from(pr);
        g += u64::from(pg);
        b += u64::from(pb);
        count += 1;
    }

    if count == 0 {
        return Ok(None);
    }
    let avg = |sum: u64| (sum as f64 / count as f64).round() as u8;
    Ok(Some(Rgb {
        r: avg(r),
        g: avg(g),
        b: avg(b),
    }))
}

/// Downloads cover images over HTTP.
#[derive(Clone)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COVER_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CatalogResult<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
