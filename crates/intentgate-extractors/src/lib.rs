//! intentgate-extractors - Site-aware page content extraction.
//!
//! Turns the page at a URL into a short, labelled text summary the matcher
//! can hand to the classifier. Video, forum and image-search sites get
//! dedicated extractors; everything else falls back to ranked text blocks.
//!
//! # Example
//!
//! ```ignore
//! use intentgate_core::config::ExtractorConfig;
//! use intentgate_extractors::ExtractionPipeline;
//!
//! let pipeline = ExtractionPipeline::http(ExtractorConfig::default())?;
//! let content = pipeline.extract_url("https://www.youtube.com/watch?v=abc").await?;
//! println!("{}", content.text);
//! ```

mod document;
mod error;
mod noise;
mod pipeline;
mod sites;
mod source;
mod types;

pub use document::PageDocument;
pub use error::{ExtractError, ExtractResult};
pub use noise::{clean_metadata, is_noise, strip_notification_count};
pub use pipeline::ExtractionPipeline;
pub use sites::{
    default_extractors, ForumExtractor, GenericExtractor, ImageSearchExtractor, SiteExtractor,
    VideoExtractor,
};
pub use source::{HttpPageSource, PageSource, StaticPageSource};
pub use types::{ExtractedContent, SiteKind, TextBlock};
