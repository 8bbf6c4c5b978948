//! # jspmap - Main Entry Point
//!
//! Builds the mapping table for one compiled servlet and answers the line
//! queries given on the command line, as text or as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use jspmap::cli::Args;
use jspmap::{
    CommandRunner, LineResolver, MappingError, ResolutionResult, ResolverConfig, TableHandle,
    TemplateFile,
};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NO_MAPPING: i32 = 3;

/// Disassembler used when neither `--tool` nor the config names one
const DEFAULT_TOOL: &str = "javap -v";

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if matches!(err.downcast_ref::<MappingError>(), Some(MappingError::NotFound { .. })) {
        EXIT_NO_MAPPING
    } else if err.to_string().to_lowercase().contains("nothing to do") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// One answered query, as printed with `--json`
#[derive(Serialize)]
struct QueryReport {
    query: i64,
    #[serde(flatten)]
    result: ResolutionResult,
    approximate: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    artifact: String,
    template: &'a str,
    tier: jspmap::ExtractionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    segments: Option<Vec<String>>,
    forward: Vec<QueryReport>,
    reverse: Vec<QueryReport>,
}

fn run() -> Result<()> {
    let args = Args::parse();

    if args.has_no_queries() {
        anyhow::bail!(
            "Nothing to do: give at least one --forward, --reverse or --dump\n\n\
             Run 'jspmap --help' for more options"
        );
    }

    let config = load_config(&args)?;
    let runner = CommandRunner::from_config(&config);
    let resolver = LineResolver::new(config);

    let mut artifact = resolver.artifact(&args.compiled);
    if let Some(ref source) = args.source {
        artifact = artifact.with_generated_source(source);
    }
    let template = TemplateFile::new(&args.template);

    info!("Resolving {template} against {artifact}");
    let table = resolver.build_table(&artifact, &template, &runner)?;

    if !args.quiet && table.tier().is_approximate() {
        eprintln!("warning: no mapping data found, line numbers are estimates");
    }

    let forward = answer(&table, &args.forward, TableHandle::resolve_forward)?;
    let reverse = answer(&table, &args.reverse, TableHandle::resolve_reverse)?;
    let segments =
        args.dump.then(|| table.table().iter().map(ToString::to_string).collect::<Vec<_>>());

    if args.json {
        let report = Report {
            artifact: artifact.to_string(),
            template: template.name(),
            tier: table.tier(),
            segments,
            forward,
            reverse,
        };
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to encode report")?);
        return Ok(());
    }

    if !args.quiet {
        println!("jspmap v{}", env!("CARGO_PKG_VERSION"));
        println!("artifact: {artifact}");
        println!("table: {} segments ({})", table.table().len(), table.tier());
    }
    for segment in segments.iter().flatten() {
        println!("  {segment}");
    }
    for q in &forward {
        println!(
            "template {} -> generated {} ({}, {})",
            q.query, q.result.line, q.result.confidence, q.result.tier
        );
    }
    for q in &reverse {
        println!(
            "generated {} -> template {} ({}, {})",
            q.query, q.result.line, q.result.confidence, q.result.tier
        );
    }

    Ok(())
}

/// Config file (if any), then command-line overrides
fn load_config(args: &Args) -> Result<ResolverConfig> {
    let mut config = match args.config {
        Some(ref path) => ResolverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResolverConfig::default(),
    };

    if let Some(ref tool) = args.tool {
        config.set_tool_command(tool).context("Invalid --tool")?;
    } else if config.tool_command.is_empty() {
        config.set_tool_command(DEFAULT_TOOL)?;
    }

    if let Some(ms) = args.timeout_ms {
        config.tool_timeout_ms = ms;
    }

    Ok(config)
}

fn answer(
    table: &TableHandle,
    queries: &[i64],
    resolve: fn(&TableHandle, i64) -> Result<ResolutionResult, MappingError>,
) -> Result<Vec<QueryReport>> {
    queries
        .iter()
        .map(|&query| {
            let result = resolve(table, query)?;
            if result.is_approximate() {
                warn!("Line {query} resolved to an approximate position {}", result.line);
            }
            Ok(QueryReport { query, result, approximate: result.is_approximate() })
        })
        .collect()
}
