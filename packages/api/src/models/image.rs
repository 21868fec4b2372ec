//! Image bank records: brands, raw storage objects and the items shown in the grid.

use serde::{Deserialize, Serialize};

/// A brand row in the secondary backend's `brands` table. Each brand's imagery lives
/// in a storage bucket named after `brand_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub brand_name: String,
    pub brand_normalized: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub company_id: Option<String>,
}

/// A file listed in a storage bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl StorageObject {
    pub fn size(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("mimetype"))
            .and_then(|v| v.as_str())
    }
}

/// An image ready to display or download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: String,
    pub name: String,
    /// Public URL of the object.
    pub url: String,
    pub brand_id: String,
    pub brand_name: String,
    pub brand_normalized: String,
    /// Bucket the object was listed from.
    pub bucket: String,
    pub size: u64,
    /// RFC 3339 upload time.
    pub uploaded_at: String,
    pub content_type: String,
}
