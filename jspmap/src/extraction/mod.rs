//! # Mapping Extraction Tiers
//!
//! A mapping table can come from four independent sources, ordered by how
//! much they can be trusted:
//!
//! ```text
//! 1. ToolDump           disassembler output  ──┐
//! 2. EmbeddedBlob       raw artifact bytes   ──┼──▶ smap::parse ──▶ MappingTable
//! 3. SourceComments     `//line N "x.jsp"` annotations in the generated source
//! 4. StructuralEstimate linear spread over the generated service method
//! ```
//!
//! Tiers 1 and 2 read the same SMAP blob and differ only in how they reach
//! it. Tier 3 is a coarse, line-oriented mapping. Tier 4 never fails as long
//! as the generated source exists, but its positions are approximate.
//!
//! The tiers are kept as data: an [`ExtractionChain`] is an ordered list of
//! [`Extractor`]s and the first one that yields a non-empty table wins. A
//! failing tier is logged and skipped, never propagated.
//!
//! ## Module Structure
//!
//! - **`tool`**: runs the disassembler ([`SubprocessRunner`]) and cuts the
//!   debug-extension section out of its output
//! - **`embedded`**: locates the blob between its start and end tokens
//! - **`comments`**: reads per-line annotations and densifies small gaps
//! - **`structural`**: last-resort estimate from the anchor method's extent

pub mod comments;
pub mod embedded;
pub mod structural;
pub mod tool;

pub use comments::CommentExtractor;
pub use embedded::{find_blob, EmbeddedExtractor};
pub use structural::StructuralHeuristic;
pub use tool::{
    cancellation, CancelToken, Canceller, CommandRunner, SubprocessRunner, ToolExtractor,
};

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::config::ResolverConfig;
use crate::domain::{ExtractError, TemplateFile};
use crate::smap::MappingTable;

/// Source of a mapping table, most reliable first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionTier {
    ToolDump,
    EmbeddedBlob,
    SourceComments,
    StructuralEstimate,
}

impl ExtractionTier {
    /// All tiers in fallback order
    pub const ALL: [ExtractionTier; 4] = [
        ExtractionTier::ToolDump,
        ExtractionTier::EmbeddedBlob,
        ExtractionTier::SourceComments,
        ExtractionTier::StructuralEstimate,
    ];

    /// Returns true if positions from this tier are estimates
    #[must_use]
    pub fn is_approximate(self) -> bool {
        matches!(self, ExtractionTier::StructuralEstimate)
    }
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionTier::ToolDump => "tool-dump",
            ExtractionTier::EmbeddedBlob => "embedded-blob",
            ExtractionTier::SourceComments => "source-comments",
            ExtractionTier::StructuralEstimate => "structural-estimate",
        };
        f.write_str(name)
    }
}

/// Everything an extractor may look at
///
/// Missing inputs are `None`; tiers that need them report `NotFound`.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub artifact_path: &'a Path,
    pub artifact_bytes: Option<&'a [u8]>,
    pub generated_source: Option<&'a str>,
    pub template: &'a TemplateFile,
}

/// One tier of the chain
pub trait Extractor {
    fn tier(&self) -> ExtractionTier;

    /// Produce a table or explain why this tier has nothing
    ///
    /// # Errors
    /// Any [`ExtractError`]; the chain treats all of them as "try the next tier"
    fn extract(&self, input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError>;
}

/// Ordered list of extractors; the first non-empty table wins
pub struct ExtractionChain<'a> {
    extractors: Vec<Box<dyn Extractor + 'a>>,
}

impl<'a> ExtractionChain<'a> {
    #[must_use]
    pub fn new(extractors: Vec<Box<dyn Extractor + 'a>>) -> Self {
        Self { extractors }
    }

    /// The four tiers in their standard order
    #[must_use]
    pub fn standard(config: &ResolverConfig, runner: &'a dyn SubprocessRunner) -> Self {
        Self::new(vec![
            Box::new(ToolExtractor::new(runner, config)),
            Box::new(EmbeddedExtractor::new(config)),
            Box::new(CommentExtractor::new(config)),
            Box::new(StructuralHeuristic::new(config)),
        ])
    }

    #[must_use]
    pub fn tiers(&self) -> Vec<ExtractionTier> {
        self.extractors.iter().map(|e| e.tier()).collect()
    }

    /// Run the tiers in order and return the first usable table
    pub fn run(&self, input: &ExtractionInput<'_>) -> Option<(ExtractionTier, MappingTable)> {
        for extractor in &self.extractors {
            let tier = extractor.tier();
            match extractor.extract(input) {
                Ok(table) if table.is_empty() => {
                    debug!("{tier}: produced no segments for {}", input.template);
                }
                Ok(table) => {
                    info!(
                        "{tier}: {} segments for {} from {}",
                        table.len(),
                        input.template,
                        input.artifact_path.display()
                    );
                    if tier.is_approximate() {
                        warn!("Using estimated line positions for {}", input.template);
                    }
                    return Some((tier, table));
                }
                Err(ExtractError::ToolUnavailable(reason)) => {
                    warn!("{tier}: {reason}");
                }
                Err(e) => {
                    debug!("{tier} skipped ({}): {e}", e.kind());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smap::MappingSegment;
    use std::cell::RefCell;

    /// Fixed outcome per tier, recording that it was asked
    struct Scripted<'a> {
        tier: ExtractionTier,
        outcome: Result<MappingTable, ExtractError>,
        calls: &'a RefCell<Vec<ExtractionTier>>,
    }

    impl Extractor for Scripted<'_> {
        fn tier(&self) -> ExtractionTier {
            self.tier
        }

        fn extract(&self, _input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError> {
            self.calls.borrow_mut().push(self.tier);
            self.outcome.clone()
        }
    }

    fn input<'a>(template: &'a TemplateFile) -> ExtractionInput<'a> {
        ExtractionInput {
            artifact_path: Path::new("/work/index_jsp.class"),
            artifact_bytes: None,
            generated_source: None,
            template,
        }
    }

    #[test]
    fn test_first_table_wins() {
        let calls = RefCell::new(Vec::new());
        let table = MappingTable::new(vec![MappingSegment::single(1, 10)]);
        let chain = ExtractionChain::new(vec![
            Box::new(Scripted {
                tier: ExtractionTier::ToolDump,
                outcome: Err(ExtractError::ToolUnavailable("no javap".to_string())),
                calls: &calls,
            }),
            Box::new(Scripted {
                tier: ExtractionTier::EmbeddedBlob,
                outcome: Err(ExtractError::Malformed("no end token".to_string())),
                calls: &calls,
            }),
            Box::new(Scripted {
                tier: ExtractionTier::SourceComments,
                outcome: Ok(table.clone()),
                calls: &calls,
            }),
            Box::new(Scripted {
                tier: ExtractionTier::StructuralEstimate,
                outcome: Ok(table.clone()),
                calls: &calls,
            }),
        ]);

        let template = TemplateFile::new("index.jsp");
        let (tier, found) = chain.run(&input(&template)).unwrap();
        assert_eq!(tier, ExtractionTier::SourceComments);
        assert_eq!(found, table);
        assert_eq!(*calls.borrow(), ExtractionTier::ALL[..3].to_vec());
    }

    #[test]
    fn test_empty_table_falls_through() {
        let calls = RefCell::new(Vec::new());
        let chain = ExtractionChain::new(vec![
            Box::new(Scripted {
                tier: ExtractionTier::EmbeddedBlob,
                outcome: Ok(MappingTable::default()),
                calls: &calls,
            }),
            Box::new(Scripted {
                tier: ExtractionTier::StructuralEstimate,
                outcome: Err(ExtractError::NotFound("no generated source".to_string())),
                calls: &calls,
            }),
        ]);

        let template = TemplateFile::new("index.jsp");
        assert!(chain.run(&input(&template)).is_none());
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_standard_chain_order() {
        let runner = CommandRunner::new(Vec::new());
        let chain = ExtractionChain::standard(&ResolverConfig::default(), &runner);
        assert_eq!(chain.tiers(), ExtractionTier::ALL.to_vec());
    }

    #[test]
    fn test_tier_display_and_approximation() {
        assert_eq!(ExtractionTier::ToolDump.to_string(), "tool-dump");
        assert_eq!(ExtractionTier::StructuralEstimate.to_string(), "structural-estimate");
        assert!(ExtractionTier::StructuralEstimate.is_approximate());
        assert!(!ExtractionTier::SourceComments.is_approximate());
        assert!(ExtractionTier::ToolDump < ExtractionTier::EmbeddedBlob);
    }
}
