//! Last-resort estimate from the shape of the generated source
//!
//! Generators put almost all template output inside a single service method.
//! When no mapping data exists at all, the template is assumed to be spread
//! linearly over that method, at a fixed number of generated lines per
//! template line.

use log::{debug, warn};

use super::{ExtractionInput, ExtractionTier, Extractor};
use crate::config::ResolverConfig;
use crate::domain::ExtractError;
use crate::smap::{MappingSegment, MappingTable};

/// 0-based line span of the anchor method, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpan {
    pub start: usize,
    pub end: usize,
}

impl MethodSpan {
    #[must_use]
    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Find the first line declaring `anchor` and the line closing its body
///
/// The body closes on the first line where the brace depth returns to zero
/// after at least one `{` was seen. An unbalanced body runs to the last line.
#[must_use]
pub fn find_method(lines: &[&str], anchor: &str) -> Option<MethodSpan> {
    let start = lines.iter().position(|line| line.contains(anchor) && line.contains('('))?;

    let mut depth: i64 = 0;
    let mut opened = false;
    for (index, line) in lines.iter().enumerate().skip(start) {
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 && index > start {
            return Some(MethodSpan { start, end: index });
        }
    }

    Some(MethodSpan { start, end: lines.len().saturating_sub(1) })
}

pub struct StructuralHeuristic {
    anchor: String,
    divisor: u32,
    boilerplate_lines: u32,
    boilerplate_fraction: f64,
}

impl StructuralHeuristic {
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            anchor: config.structural_anchor.clone(),
            divisor: config.structural_divisor,
            boilerplate_lines: config.boilerplate_lines,
            boilerplate_fraction: config.boilerplate_fraction,
        }
    }

    /// Spread an estimated template length linearly over the method span
    #[must_use]
    pub fn spread(&self, span: MethodSpan) -> MappingTable {
        let width = span.width() as u64;
        let estimated = (width / u64::from(self.divisor.max(1))).max(1);
        let steps = (estimated - 1).max(1);

        (1..=estimated)
            .map(|template_line| {
                let offset = (template_line - 1) * width / steps;
                let generated = span.start as u64 + offset + 1;
                MappingSegment::single(clamp_u32(template_line), clamp_u32(generated))
            })
            .collect()
    }

    /// Template line 1 after an assumed block of leading boilerplate
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn boilerplate_offset(&self, total_lines: usize) -> MappingTable {
        let by_fraction = (total_lines as f64 * self.boilerplate_fraction).floor() as u64;
        let start = by_fraction.min(u64::from(self.boilerplate_lines)).max(1);
        MappingTable::new(vec![MappingSegment::single(1, clamp_u32(start))])
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl Extractor for StructuralHeuristic {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::StructuralEstimate
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError> {
        let source = input
            .generated_source
            .ok_or_else(|| ExtractError::NotFound("generated source not readable".to_string()))?;
        let lines: Vec<&str> = source.lines().collect();

        match find_method(&lines, &self.anchor) {
            Some(span) => {
                debug!(
                    "{} spans generated lines {} to {}",
                    self.anchor,
                    span.start + 1,
                    span.end + 1
                );
                Ok(self.spread(span))
            }
            None => {
                warn!("No {} method in generated source, assuming boilerplate", self.anchor);
                Ok(self.boilerplate_offset(lines.len()))
            }
        }
    }
}
