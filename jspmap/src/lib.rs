//! # jspmap - Bidirectional JSP Line Mapping
//!
//! A debugger stopped in a generated servlet reports positions in the
//! generated `.java` source, while the user set breakpoints in the `.jsp`
//! template. jspmap translates line numbers between the two, even when the
//! template compresses, expands or reorders lines relative to the generated
//! code.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │      compiled artifact (.class)   +   generated source (.java)   │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ bytes / text
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     ExtractionChain (first wins)                 │
//! │  1. ToolDump           disassembler output ──┐                   │
//! │  2. EmbeddedBlob       raw artifact bytes  ──┴──▶ smap grammar   │
//! │  3. SourceComments     //line annotations in the generated text  │
//! │  4. StructuralEstimate spread over the service method            │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ MappingTable + tier
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │           LineResolver (cache keyed by artifact + mtime)         │
//! │                                                                  │
//! │   TableHandle ──▶ resolve_forward(template line)  ──▶ generated  │
//! │               ──▶ resolve_reverse(generated line) ──▶ template   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`smap`]: the stratum-mapping text format and the segment/table model
//! - [`extraction`]: the four tiers and the ordered chain that runs them
//!   - `tool`: subprocess runner with timeout, output cap and cancellation
//!   - `embedded`: byte scan for the blob inside the compiled artifact
//!   - `comments`: per-line annotations in the generated source
//!   - `structural`: last-resort linear estimate
//! - [`resolution`]: forward and reverse line queries with confidence tags
//! - [`resolver`]: table construction and the per-artifact cache
//! - [`config`]: every tunable, loadable from JSON
//! - [`domain`]: file identities and error types
//! - [`cli`]: command-line arguments for the `jspmap` binary
//!
//! ## Typical Usage
//!
//! ```no_run
//! use jspmap::{CommandRunner, LineResolver, ResolverConfig, TemplateFile};
//!
//! let resolver = LineResolver::new(ResolverConfig::default());
//! let runner = CommandRunner::new(vec!["javap".into(), "-v".into()]);
//! let artifact = resolver.artifact("work/org/apache/jsp/index_jsp.class");
//!
//! let table = resolver.build_table(&artifact, &TemplateFile::new("index.jsp"), &runner)?;
//! let hit = table.resolve_forward(9)?;
//! println!("line {} ({}, {})", hit.line, hit.confidence, hit.tier);
//! # Ok::<(), jspmap::MappingError>(())
//! ```
//!
//! ## Key Concepts
//!
//! - **SMAP**: the JSR-45 source map a JSP compiler embeds in the class file
//! - **Segment**: a run of template lines mapped onto a strided run of generated lines
//! - **Tier**: one way of obtaining a table, ordered by reliability
//! - **Confidence**: whether a line was read, interpolated or extrapolated

pub mod cli;
pub mod config;
pub mod domain;
pub mod extraction;
pub mod resolution;
pub mod resolver;
pub mod smap;

pub use config::ResolverConfig;
pub use domain::{ArtifactId, ExtractError, MappingError, TemplateFile, ToolError};
pub use extraction::{CommandRunner, ExtractionTier, SubprocessRunner};
pub use resolution::{resolve_forward, resolve_reverse, Confidence, ResolutionResult};
pub use resolver::{LineResolver, TableHandle};
pub use smap::{MappingSegment, MappingTable};
