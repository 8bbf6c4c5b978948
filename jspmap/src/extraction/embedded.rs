//! Direct byte scan of a compiled artifact for an embedded mapping blob
//!
//! The blob is plain ASCII even inside a binary container, so the artifact
//! is searched byte-wise and the hit decoded one byte per character.

use memchr::memmem;

use super::{ExtractionInput, ExtractionTier, Extractor};
use crate::config::ResolverConfig;
use crate::domain::ExtractError;
use crate::smap::{self, MappingTable};

/// Locate `start ..= end` (both tokens included) in `data`
///
/// # Errors
/// - [`ExtractError::NotFound`] if the start token is absent
/// - [`ExtractError::Malformed`] if the start token has no end token after it
pub fn find_blob<'d>(data: &'d [u8], start: &str, end: &str) -> Result<&'d [u8], ExtractError> {
    let begin = memmem::find(data, start.as_bytes())
        .ok_or_else(|| ExtractError::NotFound(format!("no {start:?} token")))?;

    let tail = &data[begin..];
    let close = memmem::find(tail, end.as_bytes()).ok_or_else(|| {
        ExtractError::Malformed(format!("{start:?} at byte {begin} has no {end:?} after it"))
    })?;

    Ok(&tail[..close + end.len()])
}

/// Decode bytes one per character (ISO-8859-1)
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub struct EmbeddedExtractor {
    start_token: String,
    end_token: String,
}

impl EmbeddedExtractor {
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            start_token: config.blob_start_token.clone(),
            end_token: config.blob_end_token.clone(),
        }
    }
}

impl Extractor for EmbeddedExtractor {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::EmbeddedBlob
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError> {
        let bytes = input
            .artifact_bytes
            .ok_or_else(|| ExtractError::NotFound("compiled artifact not readable".to_string()))?;

        let blob = find_blob(bytes, &self.start_token, &self.end_token)?;
        Ok(smap::parse(&decode_latin1(blob), input.template))
    }
}
