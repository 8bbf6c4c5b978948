//! Line annotations left in the generated source
//!
//! Jasper and other generators can emit a comment before the code produced
//! for each template line. Several shapes have been used over time:
//!
//! ```text
//! //line 15 "index.jsp"              slash-delimited marker
//! // Line 15, JSP file: /index.jsp   labelled marker
//! /* Line 15, file: index.jsp */     block-comment marker
//! // generated from line 15 (x.jsp)  loose marker, needs the template extension
//! ```
//!
//! Each annotation maps its template line onto the generated line right
//! after it. Small gaps between annotated template lines are then filled by
//! linear interpolation.

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{ExtractionInput, ExtractionTier, Extractor};
use crate::config::ResolverConfig;
use crate::domain::{ExtractError, NameMatch, TemplateFile};
use crate::smap::{MappingSegment, MappingTable};

fn slash_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*//\s*line\s+(\d+)\s+"([^"]*)""#).expect("valid slash marker regex")
    })
}

fn labelled_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*//\s*line\s+(\d+),\s*(?:\w+\s+)?file:\s*(\S+)")
            .expect("valid labelled marker regex")
    })
}

fn block_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*/\*\s*line\s+(\d+),\s*file:\s*(\S+?)\s*\*/")
            .expect("valid block marker regex")
    })
}

fn loose_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)//.*?\bline\s*(\d+)").expect("valid loose marker regex"))
}

/// Template line named by an annotation, if the line is one for this template
#[must_use]
pub fn annotation_line(line: &str, template: &TemplateFile) -> Option<u32> {
    for re in [slash_marker(), labelled_marker(), block_marker()] {
        if let Some(caps) = re.captures(line) {
            let file = caps.get(2).map_or("", |m| m.as_str());
            if template.match_name(file) == NameMatch::None {
                return None;
            }
            return caps[1].parse().ok();
        }
    }

    let extension = template.extension()?;
    if !line.to_ascii_lowercase().contains(&format!(".{}", extension.to_ascii_lowercase())) {
        return None;
    }
    loose_marker().captures(line).and_then(|caps| caps[1].parse().ok())
}

/// Fill gaps of at most `max_gap` template lines by linear interpolation
///
/// `exact` maps template line to generated line. Gaps wider than the bound,
/// or where generated lines do not increase, stay sparse.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn densify(exact: &BTreeMap<u32, u32>, max_gap: u32) -> BTreeMap<u32, u32> {
    let mut dense = exact.clone();
    let pairs: Vec<(u32, u32)> = exact.iter().map(|(&t, &g)| (t, g)).collect();

    for window in pairs.windows(2) {
        let (t1, g1) = window[0];
        let (t2, g2) = window[1];
        let template_gap = t2 - t1;
        let generated_gap = f64::from(g2) - f64::from(g1);

        if template_gap <= 1 || template_gap > max_gap || generated_gap <= 0.0 {
            continue;
        }

        for step in 1..template_gap {
            let ratio = generated_gap / f64::from(template_gap);
            let generated = (f64::from(g1) + f64::from(step) * ratio).round() as u32;
            dense.entry(t1 + step).or_insert(generated);
        }
    }

    dense
}

pub struct CommentExtractor {
    max_gap: u32,
}

impl CommentExtractor {
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self { max_gap: config.densify_max_gap }
    }

    /// Exact annotations: template line → generated line following it
    ///
    /// When a template line is annotated more than once, the first wins.
    #[must_use]
    pub fn annotations(source: &str, template: &TemplateFile) -> BTreeMap<u32, u32> {
        let mut exact = BTreeMap::new();
        for (index, line) in source.lines().enumerate() {
            let Some(template_line) = annotation_line(line, template) else {
                continue;
            };
            // `index` is 0-based; the annotated code sits on the next 1-based line
            let generated = u32::try_from(index + 2).unwrap_or(u32::MAX);
            exact.entry(template_line).or_insert(generated);
        }
        exact
    }
}

impl Extractor for CommentExtractor {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::SourceComments
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<MappingTable, ExtractError> {
        let source = input
            .generated_source
            .ok_or_else(|| ExtractError::NotFound("generated source not readable".to_string()))?;

        let exact = Self::annotations(source, input.template);
        if exact.is_empty() {
            return Err(ExtractError::NotFound(format!(
                "no line annotations for {}",
                input.template
            )));
        }

        let dense = densify(&exact, self.max_gap);
        debug!(
            "{} annotations, {} after densifying gaps up to {}",
            exact.len(),
            dense.len(),
            self.max_gap
        );

        Ok(dense.into_iter().map(|(t, g)| MappingSegment::single(t, g)).collect())
    }
}
