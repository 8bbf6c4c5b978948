//! Domain types for the files involved in a line lookup
//!
//! A lookup always involves a template (the `.jsp` the user edits) and a
//! compiled artifact (the servlet `.class`) with an optional companion
//! generated source (the servlet `.java`).

use std::fmt;
use std::path::{Path, PathBuf};

/// Template file of interest, identified by its basename
///
/// Mapping blobs may describe several input files (includes, tag files);
/// the basename is what disambiguates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateFile {
    name: String,
}

/// How well a file name recorded in a mapping source matches a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameMatch {
    None,
    /// Name merely contains the basename (`index.jsp.bak`, `old_index.jsp`)
    Contains,
    /// Exact basename or a path ending in `/<basename>`
    Exact,
}

impl TemplateFile {
    /// Create from a basename or a full path (only the basename is kept)
    #[must_use]
    pub fn new(name_or_path: &str) -> Self {
        let name = name_or_path.rsplit(['/', '\\']).next().unwrap_or(name_or_path);
        Self { name: name.to_string() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension without the dot (`jsp`, `jspx`), if any
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str()).filter(|e| !e.is_empty())
    }

    /// Classify a file name found in a mapping source against this template
    #[must_use]
    pub fn match_name(&self, candidate: &str) -> NameMatch {
        let candidate = candidate.trim().replace('\\', "/");
        if self.name.is_empty() || candidate.is_empty() {
            return NameMatch::None;
        }

        if candidate == self.name || candidate.ends_with(&format!("/{}", self.name)) {
            NameMatch::Exact
        } else if candidate.contains(&self.name) {
            NameMatch::Contains
        } else {
            NameMatch::None
        }
    }
}

impl fmt::Display for TemplateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Identity of a compiled artifact and its companion generated source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    compiled: PathBuf,
    generated_source: PathBuf,
}

impl ArtifactId {
    /// Derive the generated source by swapping the artifact's extension
    ///
    /// `work/org/apache/jsp/index_jsp.class` → `work/org/apache/jsp/index_jsp.java`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(compiled: P, generated_extension: &str) -> Self {
        let compiled = compiled.into();
        let generated_source = compiled.with_extension(generated_extension);
        Self { compiled, generated_source }
    }

    /// Use an explicit generated source path instead of the derived one
    #[must_use]
    pub fn with_generated_source<P: Into<PathBuf>>(mut self, source: P) -> Self {
        self.generated_source = source.into();
        self
    }

    #[must_use]
    pub fn compiled(&self) -> &Path {
        &self.compiled
    }

    #[must_use]
    pub fn generated_source(&self) -> &Path {
        &self.generated_source
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compiled.display())
    }
}
