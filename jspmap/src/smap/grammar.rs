//! Parser for the stratum-mapping text format
//!
//! Parsing is two-phase: the first pass collects file entries and line
//! records exactly as written, the second decides which file identifiers
//! belong to the template of interest and keeps the matching records.
//! Unparseable records are skipped; only the end marker stops the scan.

use log::debug;

use super::segment::{MappingSegment, MappingTable};
use crate::domain::{NameMatch, TemplateFile};

const FILE_SECTION: &str = "*F";
const LINE_SECTION: &str = "*L";
const END_MARKER: &str = "*E";

/// Which section the scanner is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Files,
    Lines,
}

/// One `*F` entry: `+ 0 index.jsp` (followed by a path line) or `0 index.jsp`
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileEntry {
    id: String,
    name: String,
    path: Option<String>,
}

impl FileEntry {
    fn best_match(&self, template: &TemplateFile) -> NameMatch {
        let by_name = template.match_name(&self.name);
        let by_path = match self.path.as_deref() {
            Some(path) => template.match_name(path),
            None => NameMatch::None,
        };
        by_name.max(by_path)
    }
}

/// Parse a mapping blob into the table for one template file
///
/// Text without any `*L` marker is read as a bare list of line records.
#[must_use]
pub fn parse(text: &str, template: &TemplateFile) -> MappingTable {
    let (files, records) = scan(text);
    let retained = retained_file_ids(&files, template);

    if retained.is_empty() && !files.is_empty() {
        debug!(
            "No file entry matches {template} among {} declared files, accepting all line records",
            files.len()
        );
    }

    let keep = |segment: &MappingSegment| {
        let Some(id) = segment.file_id.as_deref() else {
            return retained.is_empty();
        };
        retained.is_empty() || retained.iter().any(|r| r == id)
    };
    let table: MappingTable = records.into_iter().filter(keep).collect();

    debug!("Parsed {} mapping segments for {template}", table.len());
    table
}

/// First pass: raw file entries and line records in file order
fn scan(text: &str) -> (Vec<FileEntry>, Vec<MappingSegment>) {
    let has_line_section = text.lines().any(|l| l.trim() == LINE_SECTION);
    let mut section = if has_line_section { Section::Other } else { Section::Lines };

    let mut files: Vec<FileEntry> = Vec::new();
    let mut records = Vec::new();
    let mut awaiting_path = false;
    // Line-file ids are sticky: records without `#id` inherit the last one
    let mut line_file_id: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(END_MARKER) {
            break;
        }
        if line == FILE_SECTION {
            section = Section::Files;
            awaiting_path = false;
            continue;
        }
        if line == LINE_SECTION {
            section = Section::Lines;
            line_file_id = files.first().map(|f| f.id.clone());
            continue;
        }
        if line.starts_with('*') {
            section = Section::Other;
            continue;
        }

        match section {
            Section::Files => {
                if awaiting_path {
                    awaiting_path = false;
                    if let Some(entry) = files.last_mut() {
                        entry.path = Some(line.to_string());
                    }
                } else if let Some((entry, has_path)) = parse_file_entry(line) {
                    debug!("File entry {} -> {}", entry.id, entry.name);
                    awaiting_path = has_path;
                    files.push(entry);
                } else {
                    debug!("Skipping malformed file entry: {line:?}");
                }
            }
            Section::Lines => match parse_line_record(line) {
                Some((segment, explicit_id)) => {
                    if explicit_id.is_some() {
                        line_file_id = explicit_id;
                    }
                    records.push(segment.with_file_id(line_file_id.clone()));
                }
                None => debug!("Skipping malformed line record: {line:?}"),
            },
            Section::Other => {}
        }
    }

    (files, records)
}

/// Second pass: ids of the files that are the template
///
/// Exact matches win; substring matches are used only when nothing matched
/// exactly. An empty result means "accept everything".
fn retained_file_ids(files: &[FileEntry], template: &TemplateFile) -> Vec<String> {
    let ids_with = |quality: NameMatch| -> Vec<String> {
        files.iter().filter(|f| f.best_match(template) == quality).map(|f| f.id.clone()).collect()
    };

    let exact = ids_with(NameMatch::Exact);
    if exact.is_empty() {
        ids_with(NameMatch::Contains)
    } else {
        exact
    }
}

/// Returns the entry and whether a path line follows it
fn parse_file_entry(line: &str) -> Option<(FileEntry, bool)> {
    let (has_path, rest) = match line.strip_prefix('+') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };

    let (id, name) = rest.split_once(char::is_whitespace)?;
    let name = name.trim();
    if !is_file_id(id) || name.is_empty() {
        return None;
    }

    let entry = FileEntry { id: id.to_string(), name: name.to_string(), path: None };
    Some((entry, has_path))
}

/// `start[#id][,count]:generated[,increment]`
///
/// Returns the segment (without file scope) and the explicit file id, if any.
fn parse_line_record(line: &str) -> Option<(MappingSegment, Option<String>)> {
    let (input, output) = line.split_once(':')?;

    let (input_head, count) = match input.split_once(',') {
        Some((head, count)) => (head, parse_number(count)?),
        None => (input, 1),
    };
    let (start, file_id) = match input_head.split_once('#') {
        Some((start, id)) if is_file_id(id) => (parse_number(start)?, Some(id.to_string())),
        Some(_) => return None,
        None => (parse_number(input_head)?, None),
    };
    let (generated, increment) = match output.split_once(',') {
        Some((generated, increment)) => (parse_number(generated)?, parse_number(increment)?),
        None => (parse_number(output)?, 1),
    };

    if count == 0 || (increment == 0 && count > 1) {
        return None;
    }

    let segment = MappingSegment::new(start, count, generated, increment);
    Some((segment, file_id))
}

fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn is_file_id(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILE_SMAP: &str = "SMAP
index_jsp.java
JSP
*S JSP
*F
+ 0 index.jsp
index.jsp
+ 1 header.jspf
WEB-INF/jspf/header.jspf
*L
1,5:122
7,52:128
1#1,3:90
4:95
60#0:190
*E
";

    fn segment(start: u32, count: u32, generated: u32, increment: u32) -> MappingSegment {
        MappingSegment::new(start, count, generated, increment)
    }

    #[test]
    fn test_range_record() {
        let table = parse("7,52:128", &TemplateFile::new("index.jsp"));
        assert_eq!(table.segments(), &[segment(7, 52, 128, 1)]);
    }

    #[test]
    fn test_strided_record() {
        let table = parse("124,4:246,3", &TemplateFile::new("index.jsp"));
        assert_eq!(table.segments(), &[segment(124, 4, 246, 3)]);
    }

    #[test]
    fn test_defaults_for_omitted_count_and_increment() {
        let table = parse("15:67", &TemplateFile::new("index.jsp"));
        assert_eq!(table.segments(), &[segment(15, 1, 67, 1)]);
    }

    #[test]
    fn test_selects_template_file_records() {
        let table = parse(TWO_FILE_SMAP, &TemplateFile::new("index.jsp"));
        let rendered: Vec<String> = table.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["1#0,5:122", "7#0,52:128", "60#0:190"]);
    }

    #[test]
    fn test_sticky_file_id_selects_included_file() {
        let table = parse(TWO_FILE_SMAP, &TemplateFile::new("header.jspf"));
        let rendered: Vec<String> = table.iter().map(ToString::to_string).collect();
        // `4:95` has no id of its own and inherits `#1` from the previous record
        assert_eq!(rendered, vec!["1#1,3:90", "4#1:95"]);
    }

    #[test]
    fn test_unknown_template_accepts_all_records() {
        let table = parse(TWO_FILE_SMAP, &TemplateFile::new("other.jsp"));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_contains_match_used_when_no_exact_match() {
        let smap = "*F\n0 old_index.jsp\n1 footer.jsp\n*L\n1:10\n1#1:20\n*E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.segments()[0].generated_start, 10);
    }

    #[test]
    fn test_exact_match_beats_contains_match() {
        let smap = "*F\n0 old_index.jsp\n1 index.jsp\n*L\n1:10\n1#1:20\n*E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.segments()[0].generated_start, 20);
    }

    #[test]
    fn test_path_line_participates_in_matching() {
        let smap = "*F\n+ 0 a.jsp\n/views/index.jsp\n+ 1 b.jsp\n/views/b.jsp\n\
                    *L\n1:10\n1#1:20\n*E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.segments()[0].generated_start, 10);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let smap = "*L\n1:10\nbogus\n2,x:20\n3#:30\n4,0:40\n5,2:50,0\n6:60\n*E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        let starts: Vec<u32> = table.iter().map(|s| s.template_start).collect();
        assert_eq!(starts, vec![1, 6]);
    }

    #[test]
    fn test_end_marker_stops_parsing() {
        let smap = "*L\n1:10\n*E\n2:20\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_other_marker_resets_sections() {
        let smap = "*L\n1:10\n*V\n2:20\n*L\n3:30\n*E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        let starts: Vec<u32> = table.iter().map(|s| s.template_start).collect();
        assert_eq!(starts, vec![1, 3]);
    }

    #[test]
    fn test_zero_increment_on_single_line_is_normalised() {
        let table = parse("*L\n9:40,0\n*E", &TemplateFile::new("index.jsp"));
        assert_eq!(table.segments(), &[segment(9, 1, 40, 1)]);
    }

    #[test]
    fn test_indented_tool_output_is_accepted() {
        let smap = "  SMAP\n  index_jsp.java\n  JSP\n  *S JSP\n  *F\n  + 0 index.jsp\n  \
                    index.jsp\n  *L\n  1,5:122\n  *E\n";
        let table = parse(smap, &TemplateFile::new("index.jsp"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.segments()[0].file_id.as_deref(), Some("0"));
    }
}
