//! Translation gateway: one HTTP request to the external segmentation and
//! translation service per text.
//!
//! The gateway never retries. Every failure comes back as a
//! [`GatewayError`] value which the translation job records as a soft
//! failure.

pub mod client;
pub mod error;
pub mod parse;

use async_trait::async_trait;

pub use client::HttpGateway;
pub use error::GatewayError;
pub use parse::{parse_word_results, WordResult};

/// Adapter to the external translation service.
#[async_trait]
pub trait TranslationGateway: Send + Sync {
    /// Segments and translates `text` from `source_lang` to `target_lang`.
    ///
    /// An `Ok` value always holds at least one word.
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<WordResult>, GatewayError>;
}
