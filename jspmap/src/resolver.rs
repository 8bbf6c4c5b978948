//! Table construction and caching
//!
//! [`LineResolver`] owns the per-artifact cache. Building a table reads the
//! compiled artifact and its generated source, runs the extraction chain and
//! keeps the first table it yields. Entries are keyed by artifact path and
//! template name and remember the artifact's modification time; a changed
//! time rebuilds the whole entry.

use log::{debug, info};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::ResolverConfig;
use crate::domain::{ArtifactId, MappingError, TemplateFile};
use crate::extraction::{ExtractionChain, ExtractionInput, ExtractionTier, SubprocessRunner};
use crate::resolution::{self, ResolutionResult};
use crate::smap::MappingTable;

/// Shared, immutable table plus the tier it came from
///
/// Cloning is cheap; every clone points at the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableHandle {
    table: Arc<MappingTable>,
    tier: ExtractionTier,
}

impl TableHandle {
    #[must_use]
    pub fn new(table: MappingTable, tier: ExtractionTier) -> Self {
        Self { table: Arc::new(table), tier }
    }

    #[must_use]
    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    #[must_use]
    pub fn tier(&self) -> ExtractionTier {
        self.tier
    }

    /// See [`resolution::resolve_forward`]
    ///
    /// # Errors
    /// Returns [`MappingError::EmptyTable`] if the table has no segments
    pub fn resolve_forward(&self, template_line: i64) -> Result<ResolutionResult, MappingError> {
        resolution::resolve_forward(self, template_line)
    }

    /// See [`resolution::resolve_reverse`]
    ///
    /// # Errors
    /// Returns [`MappingError::EmptyTable`] if the table has no segments
    pub fn resolve_reverse(&self, generated_line: i64) -> Result<ResolutionResult, MappingError> {
        resolution::resolve_reverse(self, generated_line)
    }

    /// Returns true if both handles share the same table allocation
    #[must_use]
    pub fn same_table(&self, other: &TableHandle) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}

type CacheKey = (PathBuf, String);

struct CacheEntry {
    mtime: Option<SystemTime>,
    handle: TableHandle,
}

/// Builds mapping tables and caches them per artifact
///
/// The cache uses interior mutability so lookups only need `&self`; one
/// resolver is meant to be owned by one caller.
pub struct LineResolver {
    config: ResolverConfig,
    cache: RefCell<HashMap<CacheKey, CacheEntry>>,
}

impl Default for LineResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl LineResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config, cache: RefCell::new(HashMap::new()) }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Derive the artifact identity for a compiled path using the
    /// configured generated-source extension
    #[must_use]
    pub fn artifact<P: Into<PathBuf>>(&self, compiled: P) -> ArtifactId {
        ArtifactId::new(compiled, &self.config.generated_source_extension)
    }

    /// Return the cached table for `artifact`, building it if needed
    ///
    /// # Errors
    /// Returns [`MappingError::NotFound`] if no tier produced a table
    pub fn build_table(
        &self,
        artifact: &ArtifactId,
        template: &TemplateFile,
        runner: &dyn SubprocessRunner,
    ) -> Result<TableHandle, MappingError> {
        let key: CacheKey = (artifact.compiled().to_path_buf(), template.name().to_string());
        let mtime = modified_time(artifact);

        if let Some(entry) = self.cache.borrow().get(&key) {
            if entry.mtime == mtime {
                info!("Cache hit for {artifact} ({template})");
                return Ok(entry.handle.clone());
            }
            info!("{artifact} changed on disk, rebuilding its mapping table");
        }

        let artifact_bytes = read_optional(artifact.compiled());
        let generated_source = read_optional(artifact.generated_source())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

        let input = ExtractionInput {
            artifact_path: artifact.compiled(),
            artifact_bytes: artifact_bytes.as_deref(),
            generated_source: generated_source.as_deref(),
            template,
        };

        let handle = self.build_table_from(&input, runner).ok_or_else(|| MappingError::NotFound {
            artifact: artifact.to_string(),
        })?;

        self.cache.borrow_mut().insert(key, CacheEntry { mtime, handle: handle.clone() });
        Ok(handle)
    }

    /// Run the standard chain over already-loaded inputs, bypassing the cache
    pub fn build_table_from(
        &self,
        input: &ExtractionInput<'_>,
        runner: &dyn SubprocessRunner,
    ) -> Option<TableHandle> {
        let chain = ExtractionChain::standard(&self.config, runner);
        chain.run(input).map(|(tier, table)| TableHandle::new(table, tier))
    }

    /// Drop every cached table for a compiled artifact
    pub fn invalidate(&self, compiled: &Path) {
        self.cache.borrow_mut().retain(|(path, _), _| path != compiled);
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    #[must_use]
    pub fn cached_tables(&self) -> usize {
        self.cache.borrow().len()
    }
}

/// Modification time of the compiled artifact, or of the generated source
/// when the artifact does not exist
fn modified_time(artifact: &ArtifactId) -> Option<SystemTime> {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    modified(artifact.compiled()).or_else(|| modified(artifact.generated_source()))
}

fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!("Cannot read {}: {e}", path.display());
            None
        }
    }
}
