//! Parsed mapping records and the immutable table that holds them

use std::fmt;

/// One mapping record
///
/// Template lines `[template_start, template_start + template_count)` map onto
/// generated lines `generated_start, generated_start + generated_increment, ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSegment {
    pub template_start: u32,
    pub template_count: u32,
    pub generated_start: u32,
    pub generated_increment: u32,
    /// Line-file identifier the record was scoped to, if the source had any
    pub file_id: Option<String>,
}

impl MappingSegment {
    /// Build a segment, normalising count and increment to at least 1
    ///
    /// A single-line segment always gets an increment of 1.
    #[must_use]
    pub fn new(
        template_start: u32,
        template_count: u32,
        generated_start: u32,
        generated_increment: u32,
    ) -> Self {
        let template_count = template_count.max(1);
        let generated_increment = if template_count == 1 { 1 } else { generated_increment.max(1) };
        Self { template_start, template_count, generated_start, generated_increment, file_id: None }
    }

    /// One template line onto one generated line
    #[must_use]
    pub fn single(template_line: u32, generated_line: u32) -> Self {
        Self::new(template_line, 1, generated_line, 1)
    }

    #[must_use]
    pub fn with_file_id(mut self, file_id: Option<String>) -> Self {
        self.file_id = file_id;
        self
    }

    /// Exclusive end of the template range
    #[must_use]
    pub fn template_end(&self) -> i64 {
        i64::from(self.template_start) + i64::from(self.template_count)
    }

    #[must_use]
    pub fn contains_template(&self, line: i64) -> bool {
        line >= i64::from(self.template_start) && line < self.template_end()
    }

    /// Generated line for a template line inside this segment's range
    #[must_use]
    pub fn generated_for(&self, line: i64) -> Option<i64> {
        if !self.contains_template(line) {
            return None;
        }
        let step = line - i64::from(self.template_start);
        let offset = step.saturating_mul(i64::from(self.generated_increment));
        Some(i64::from(self.generated_start).saturating_add(offset))
    }
}

impl fmt::Display for MappingSegment {
    /// Renders in the record syntax it was parsed from (`124,4:246,3`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template_start)?;
        if let Some(ref id) = self.file_id {
            write!(f, "#{id}")?;
        }
        if self.template_count != 1 {
            write!(f, ",{}", self.template_count)?;
        }
        write!(f, ":{}", self.generated_start)?;
        if self.generated_increment != 1 {
            write!(f, ",{}", self.generated_increment)?;
        }
        Ok(())
    }
}

/// Ordered, immutable sequence of segments
///
/// Order is the order of appearance in the mapping source; when entries
/// overlap, the earlier one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    segments: Vec<MappingSegment>,
}

impl MappingTable {
    #[must_use]
    pub fn new(segments: Vec<MappingSegment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[MappingSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingSegment> {
        self.segments.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromIterator<MappingSegment> for MappingTable {
    fn from_iter<I: IntoIterator<Item = MappingSegment>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a MappingSegment;
    type IntoIter = std::slice::Iter<'a, MappingSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalises_single_line_increment() {
        let seg = MappingSegment::new(15, 1, 67, 4);
        assert_eq!(seg.generated_increment, 1);

        let seg = MappingSegment::new(15, 0, 67, 0);
        assert_eq!(seg.template_count, 1);
        assert_eq!(seg.generated_increment, 1);
    }

    #[test]
    fn test_generated_for_strided_segment() {
        let seg = MappingSegment::new(124, 4, 246, 3);
        assert_eq!(seg.generated_for(124), Some(246));
        assert_eq!(seg.generated_for(126), Some(252));
        assert_eq!(seg.generated_for(127), Some(255));
        assert_eq!(seg.generated_for(128), None);
        assert_eq!(seg.generated_for(123), None);
    }

    #[test]
    fn test_generated_for_saturates_on_wide_stride() {
        let seg = MappingSegment::new(0, u32::MAX, 0, u32::MAX);
        assert_eq!(seg.generated_for(4_294_967_294), Some(i64::MAX));
        assert_eq!(seg.generated_for(1), Some(i64::from(u32::MAX)));
    }

    #[test]
    fn test_display_uses_record_syntax() {
        assert_eq!(MappingSegment::new(7, 52, 128, 1).to_string(), "7,52:128");
        assert_eq!(MappingSegment::new(124, 4, 246, 3).to_string(), "124,4:246,3");
        assert_eq!(
            MappingSegment::single(15, 67).with_file_id(Some("1".to_string())).to_string(),
            "15#1:67"
        );
    }

    #[test]
    fn test_table_keeps_insertion_order() {
        let segments = vec![MappingSegment::single(10, 140), MappingSegment::single(1, 100)];
        let table: MappingTable = segments.into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.segments()[0].template_start, 10);
        assert!(!table.is_empty());
        assert!(MappingTable::default().is_empty());
    }
}
