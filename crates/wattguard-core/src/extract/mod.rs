//! Bill extraction backends
//!
//! Turns photographed or scanned bills into an [`AnalysisResult`] using a
//! vision model.
//!
//! # Architecture
//!
//! - `BillExtractor` trait: interface for all extraction backends
//! - `ExtractorClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleExtractor`, `MockExtractor`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod mock;
mod openai_compatible;
pub mod parsing;

pub use mock::MockExtractor;
pub use openai_compatible::OpenAICompatibleExtractor;
pub use parsing::parse_analysis_response;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::analysis::AnalysisResult;
use crate::error::{Error, Result};

/// Largest accepted upload
pub const MAX_BILL_FILE_SIZE: usize = 10 * 1024 * 1024;

/// MIME types a bill may be uploaded as
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "application/pdf"];

/// One page of a bill
#[derive(Debug, Clone)]
pub struct BillImage {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: Option<String>,
}

impl BillImage {
    /// Validate and wrap raw upload bytes.
    ///
    /// The MIME type is sniffed from the content when not supplied (or when
    /// the client sent the generic `application/octet-stream`).
    pub fn new(data: Vec<u8>, mime_type: Option<&str>, filename: Option<&str>) -> Result<Self> {
        let mime_type = validate_bill_file(&data, mime_type, filename)?;
        Ok(Self {
            data,
            mime_type,
            filename: filename.map(str::to_string),
        })
    }

    /// `data:` URL for embedding in a vision request
    pub fn data_url(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.mime_type, encoded)
    }
}

/// Guess a MIME type from magic bytes
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"%PDF") {
        Some("application/pdf")
    } else {
        None
    }
}

/// Check type and size of an uploaded bill, returning the effective MIME type
pub fn validate_bill_file(
    data: &[u8],
    mime_type: Option<&str>,
    filename: Option<&str>,
) -> Result<String> {
    let name = filename.unwrap_or("upload");

    if data.is_empty() {
        return Err(Error::InvalidData(format!("Empty file: {}", name)));
    }
    if data.len() > MAX_BILL_FILE_SIZE {
        return Err(Error::InvalidData(format!(
            "File size exceeded (10MB): {}",
            name
        )));
    }

    let mime = match mime_type.map(str::trim) {
        Some(m) if !m.is_empty() && m != "application/octet-stream" => m.to_lowercase(),
        _ => sniff_mime_type(data)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidData(format!("Unsupported file format: {}", name)))?,
    };

    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(Error::InvalidData(format!("Unsupported file format: {}", name)));
    }

    Ok(mime)
}

/// SHA-256 over every page, used to spot re-uploads of the same bill
pub fn content_hash(images: &[BillImage]) -> String {
    let mut hasher = Sha256::new();
    for image in images {
        hasher.update(&image.data);
    }
    hex::encode(hasher.finalize())
}

/// Trait defining the interface for all extraction backends
#[async_trait]
pub trait BillExtractor: Send + Sync {
    /// Analyze one bill (possibly several pages)
    async fn analyze_bill(&self, images: &[BillImage]) -> Result<AnalysisResult>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Model name in use
    fn model(&self) -> &str;

    /// Backend host URL
    fn host(&self) -> &str;
}

/// Concrete extractor with compile-time dispatch
#[derive(Clone)]
pub enum ExtractorClient {
    OpenAICompatible(OpenAICompatibleExtractor),
    Mock(MockExtractor),
}

impl ExtractorClient {
    /// Create an extractor from environment variables
    ///
    /// Checks `AI_BACKEND`:
    /// - `openai_compatible` (default): Uses OPENAI_COMPATIBLE_HOST and OPENAI_COMPATIBLE_MODEL
    /// - `mock`: Canned responses for tests and demos
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" => {
                OpenAICompatibleExtractor::from_env().map(ExtractorClient::OpenAICompatible)
            }
            "mock" => Some(ExtractorClient::Mock(MockExtractor::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai_compatible");
                OpenAICompatibleExtractor::from_env().map(ExtractorClient::OpenAICompatible)
            }
        }
    }

    pub fn mock() -> Self {
        ExtractorClient::Mock(MockExtractor::new())
    }
}

#[async_trait]
impl BillExtractor for ExtractorClient {
    async fn analyze_bill(&self, images: &[BillImage]) -> Result<AnalysisResult> {
        match self {
            ExtractorClient::OpenAICompatible(b) => b.analyze_bill(images).await,
            ExtractorClient::Mock(b) => b.analyze_bill(images).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ExtractorClient::OpenAICompatible(b) => b.health_check().await,
            ExtractorClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ExtractorClient::OpenAICompatible(b) => b.model(),
            ExtractorClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ExtractorClient::OpenAICompatible(b) => b.host(),
            ExtractorClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_sniff_mime_type() {
        assert_eq!(sniff_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime_type(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(sniff_mime_type(b"hello"), None);
    }

    #[test]
    fn test_validate_accepts_declared_type() {
        let mime = validate_bill_file(b"anything", Some("image/PNG"), Some("bill.png")).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_validate_sniffs_octet_stream() {
        let mime =
            validate_bill_file(b"%PDF-1.4", Some("application/octet-stream"), None).unwrap();
        assert_eq!(mime, "application/pdf");
    }

    #[test]
    fn test_validate_rejects_unsupported() {
        let err = validate_bill_file(b"GIF89a", Some("image/gif"), Some("bill.gif")).unwrap_err();
        assert!(err.to_string().contains("Unsupported file format: bill.gif"));
        assert!(validate_bill_file(b"plain text", None, None).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_and_empty() {
        let big = vec![0u8; MAX_BILL_FILE_SIZE + 1];
        let err = validate_bill_file(&big, Some("image/png"), Some("huge.png")).unwrap_err();
        assert!(err.to_string().contains("10MB"));
        assert!(validate_bill_file(&[], Some("image/png"), None).is_err());
    }

    #[test]
    fn test_data_url() {
        let image = BillImage::new(PNG_HEADER.to_vec(), None, None).unwrap();
        assert!(image.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = BillImage::new(PNG_HEADER.to_vec(), None, None).unwrap();
        let b = BillImage::new(b"%PDF-1.4".to_vec(), None, None).unwrap();
        let h1 = content_hash(&[a.clone(), b.clone()]);
        assert_eq!(h1.len(), 64);
        assert_eq!(h1, content_hash(&[a.clone(), b]));
        assert_ne!(h1, content_hash(&[a]));
    }

    #[tokio::test]
    async fn test_client_dispatch_to_mock() {
        let client = ExtractorClient::mock();
        assert!(client.health_check().await);
        assert_eq!(client.model(), "mock");
        let image = BillImage::new(PNG_HEADER.to_vec(), None, None).unwrap();
        let result = client.analyze_bill(&[image]).await.unwrap();
        assert!(result.total_amount > 0.0);
    }
}
