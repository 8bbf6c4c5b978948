//! Line queries against a mapping table
//!
//! Forward resolution answers "where did template line N end up", reverse
//! resolution answers "which template line produced generated line N".
//! The two are not symmetric: a segment declares its template extent but
//! not its generated extent, so the reverse direction rebuilds generated
//! boundaries from the start of the following segment.
//!
//! # Strategy
//!
//! ```text
//! forward(q)                              reverse(g)
//!   1. segment range contains q   exact     1. some segment starts at g   exact
//!   2. between two segment starts interp    2. between two starts / tail  interp
//!   3. past the last start        extrap    3. before the first start     extrap
//!   4. before the first start     extrap
//! ```
//!
//! Queries never fail on out-of-range input. Results are clamped to line 1.

use serde::Serialize;
use std::fmt;

use crate::domain::MappingError;
use crate::extraction::ExtractionTier;
use crate::resolver::TableHandle;
use crate::smap::{MappingSegment, MappingTable};

/// How a resolved line was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    /// Read directly from a segment
    ExactMatch,
    /// Derived from the segments on either side
    Interpolated,
    /// Continued 1:1 from the nearest segment
    Extrapolated,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Confidence::ExactMatch => "exact",
            Confidence::Interpolated => "interpolated",
            Confidence::Extrapolated => "extrapolated",
        };
        f.write_str(name)
    }
}

/// Answer to a single line query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub line: u32,
    pub confidence: Confidence,
    /// Tier that produced the table this answer came from
    pub tier: ExtractionTier,
}

impl ResolutionResult {
    /// Returns true if the line is a guess rather than mapping data
    ///
    /// Structural estimates are always approximate, whatever the confidence
    /// of the lookup inside them.
    #[must_use]
    pub fn is_approximate(&self) -> bool {
        self.tier.is_approximate() || self.confidence == Confidence::Extrapolated
    }
}

/// Template line → generated line
///
/// # Errors
/// Returns [`MappingError::EmptyTable`] if the handle holds no segments
pub fn resolve_forward(
    handle: &TableHandle,
    template_line: i64,
) -> Result<ResolutionResult, MappingError> {
    let (line, confidence) = forward_line(handle.table(), template_line)?;
    Ok(ResolutionResult { line, confidence, tier: handle.tier() })
}

/// Generated line → template line
///
/// # Errors
/// Returns [`MappingError::EmptyTable`] if the handle holds no segments
pub fn resolve_reverse(
    handle: &TableHandle,
    generated_line: i64,
) -> Result<ResolutionResult, MappingError> {
    let (line, confidence) = reverse_line(handle.table(), generated_line)?;
    Ok(ResolutionResult { line, confidence, tier: handle.tier() })
}

/// Forward lookup on a bare table
///
/// # Errors
/// Returns [`MappingError::EmptyTable`] if the table has no segments
pub fn forward_line(table: &MappingTable, q: i64) -> Result<(u32, Confidence), MappingError> {
    if table.is_empty() {
        return Err(MappingError::EmptyTable);
    }

    // Earlier segments win when ranges overlap
    if let Some(generated) = table.iter().find_map(|seg| seg.generated_for(q)) {
        return Ok((clamp_line(generated), Confidence::ExactMatch));
    }

    let mut previous: Option<&MappingSegment> = None;
    let mut next: Option<&MappingSegment> = None;
    for seg in table {
        let start = i64::from(seg.template_start);
        if start <= q && previous.map_or(true, |p| start > i64::from(p.template_start)) {
            previous = Some(seg);
        }
        if start >= q && next.map_or(true, |n| start < i64::from(n.template_start)) {
            next = Some(seg);
        }
    }

    match (previous, next) {
        (Some(p), Some(n)) if p.template_start != n.template_start => {
            let template_span = f64::from(n.template_start) - f64::from(p.template_start);
            let generated_span = f64::from(n.generated_start) - f64::from(p.generated_start);
            #[allow(clippy::cast_precision_loss)]
            let ratio = q.saturating_sub(i64::from(p.template_start)) as f64 / template_span;
            #[allow(clippy::cast_possible_truncation)]
            let offset = (ratio * generated_span).round() as i64;
            let generated = i64::from(p.generated_start).saturating_add(offset);
            Ok((clamp_line(generated), Confidence::Interpolated))
        }
        (Some(p), _) => {
            let distance = q.saturating_sub(i64::from(p.template_start));
            let generated = i64::from(p.generated_start).saturating_add(distance);
            Ok((clamp_line(generated), Confidence::Extrapolated))
        }
        (None, Some(n)) => {
            let distance = i64::from(n.template_start).saturating_sub(q);
            let generated = i64::from(n.generated_start).saturating_sub(distance);
            Ok((clamp_line(generated), Confidence::Extrapolated))
        }
        (None, None) => Err(MappingError::EmptyTable),
    }
}

/// Reverse lookup on a bare table
///
/// # Errors
/// Returns [`MappingError::EmptyTable`] if the table has no segments
pub fn reverse_line(table: &MappingTable, g: i64) -> Result<(u32, Confidence), MappingError> {
    let mut sorted: Vec<&MappingSegment> = table.iter().collect();
    // Stable: equal generated starts keep table order
    sorted.sort_by_key(|seg| seg.generated_start);

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Err(MappingError::EmptyTable);
    };

    if let Some(seg) = sorted.iter().find(|seg| i64::from(seg.generated_start) == g) {
        return Ok((seg.template_start.max(1), Confidence::ExactMatch));
    }

    let offset_from = |seg: &MappingSegment| {
        let distance = g.saturating_sub(i64::from(seg.generated_start));
        clamp_line(i64::from(seg.template_start).saturating_add(distance))
    };

    if g < i64::from(first.generated_start) {
        return Ok((offset_from(*first), Confidence::Extrapolated));
    }

    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if g >= i64::from(current.generated_start) && g < i64::from(next.generated_start) {
            return Ok((offset_from(current), Confidence::Interpolated));
        }
    }

    // At or past the last segment start: same offset arithmetic against it
    Ok((offset_from(*last), Confidence::Interpolated))
}

fn clamp_line(line: i64) -> u32 {
    u32::try_from(line.max(1)).unwrap_or(u32::MAX)
}
