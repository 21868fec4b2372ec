//! # Image bank
//!
//! Lists brand imagery from the customer backend's storage. Every active brand of the
//! configured company owns one bucket named after its `brand_name`; the image bank
//! flattens those buckets into [`ImageItem`]s the views can filter, sort and download.
//!
//! The listing helpers ([`search_images`], [`sort_images`], [`format_file_size`],
//! [`is_image_file`], [`mime_type`]) are pure and operate on already-loaded items.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::backend::ImageStorage;
use crate::error::BackendError;
use crate::models::{Brand, ImageItem, StorageObject};

/// Lifetime of download links unless configured otherwise.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

const IMAGE_TYPES: [(&str, &str); 7] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Name,
    Date,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone)]
pub struct ImageBank {
    name: String,
    storage: Arc<dyn ImageStorage>,
    company_id: String,
    signed_url_ttl_secs: u64,
}

impl ImageBank {
    /// `name` identifies the backend client the bank reads through.
    pub fn new(name: &str, storage: Arc<dyn ImageStorage>, company_id: &str) -> Self {
        Self {
            name: name.to_string(),
            storage,
            company_id: company_id.to_string(),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }

    pub fn with_signed_url_ttl(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active brands of the configured company, ordered by name.
    pub async fn load_brands(&self) -> Result<Vec<Brand>, BackendError> {
        let brands = self.storage.list_brands(&self.company_id).await?;
        tracing::debug!(
            source = %self.name,
            company = %self.company_id,
            count = brands.len(),
            "loaded brands"
        );
        Ok(brands)
    }

    /// Images of one brand, or of every brand when `brand_id` is `None`.
    ///
    /// A bucket that cannot be listed is logged and skipped.
    pub async fn load_images(
        &self,
        brand_id: Option<&str>,
    ) -> Result<Vec<ImageItem>, BackendError> {
        let brands = self.load_brands().await?;
        let mut items = Vec::new();

        for brand in brands
            .iter()
            .filter(|b| brand_id.is_none() || brand_id == Some(b.id.as_str()))
        {
            let objects = match self.storage.list_objects(&brand.brand_name).await {
                Ok(objects) => objects,
                Err(e) => {
                    tracing::warn!(
                        bucket = %brand.brand_name,
                        "skipping unreadable brand bucket: {}",
                        e
                    );
                    continue;
                }
            };
            items.extend(
                objects
                    .iter()
                    .filter(|o| is_image_file(&o.name))
                    .map(|o| self.image_item(brand, o)),
            );
        }

        tracing::debug!(count = items.len(), "loaded images");
        Ok(items)
    }

    fn image_item(&self, brand: &Brand, object: &StorageObject) -> ImageItem {
        ImageItem {
            id: object
                .id
                .clone()
                .unwrap_or_else(|| format!("{}_{}", brand.id, object.name)),
            name: object.name.clone(),
            url: self.storage.public_url(&brand.brand_name, &object.name),
            brand_id: brand.id.clone(),
            brand_name: brand.brand_name.clone(),
            brand_normalized: brand.brand_normalized.clone(),
            bucket: brand.brand_name.clone(),
            size: object.size(),
            uploaded_at: object
                .created_at
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            content_type: object
                .mimetype()
                .map(str::to_string)
                .unwrap_or_else(|| mime_type(&object.name).to_string()),
        }
    }

    /// Time-limited download link, or the public URL when signing fails.
    pub async fn download_url(&self, image: &ImageItem) -> String {
        match self
            .storage
            .signed_url(&image.bucket, &image.name, self.signed_url_ttl_secs)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    bucket = %image.bucket,
                    name = %image.name,
                    "signed URL failed, using public URL: {}",
                    e
                );
                image.url.clone()
            }
        }
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let buckets = self.storage.list_buckets().await?;
        if buckets.is_empty() {
            tracing::warn!("no storage buckets visible, the key may lack list permission");
        }
        Ok(buckets)
    }

    /// Probe the backend by listing brands. Returns the number of active brands.
    pub async fn test_connection(&self) -> Result<usize, BackendError> {
        match self.storage.list_brands(&self.company_id).await {
            Ok(brands) => {
                tracing::info!(
                    source = %self.name,
                    count = brands.len(),
                    "image bank connection ok"
                );
                Ok(brands.len())
            }
            Err(e) => {
                tracing::error!(source = %self.name, "image bank connection failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Items whose name or brand contains `query`, case-insensitively. A blank query
/// keeps everything.
pub fn search_images(images: &[ImageItem], query: &str) -> Vec<ImageItem> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return images.to_vec();
    }
    images
        .iter()
        .filter(|i| {
            i.name.to_lowercase().contains(&query) || i.brand_name.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

fn compare_dates(a: &str, b: &str) -> Ordering {
    match (
        chrono::DateTime::parse_from_rfc3339(a),
        chrono::DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

pub fn sort_images(images: &[ImageItem], by: SortBy, order: SortOrder) -> Vec<ImageItem> {
    let mut sorted = images.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = match by {
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Date => compare_dates(&a.uploaded_at, &b.uploaded_at),
            SortBy::Size => a.size.cmp(&b.size),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

/// Human-readable size: bytes, then KB with one decimal, then MB with two.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / (KB * KB) as f64)
    }
}

fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

pub fn is_image_file(name: &str) -> bool {
    extension(name).is_some_and(|ext| IMAGE_TYPES.iter().any(|(e, _)| *e == ext))
}

/// MIME type from the file extension, `image/jpeg` when unknown.
pub fn mime_type(name: &str) -> &'static str {
    extension(name)
        .and_then(|ext| IMAGE_TYPES.iter().find(|(e, _)| *e == ext))
        .map(|(_, mime)| *mime)
        .unwrap_or("image/jpeg")
}
