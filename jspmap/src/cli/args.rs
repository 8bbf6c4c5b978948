//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "jspmap",
    about = "Map line numbers between a JSP template and its generated servlet",
    after_help = "\
EXAMPLES:
    jspmap work/index_jsp.class -t index.jsp -f 9            Template line 9 in the servlet
    jspmap work/index_jsp.class -t index.jsp -r 130          Servlet line 130 in the template
    jspmap work/index_jsp.class -t index.jsp --dump --json   Print the whole table as JSON"
)]
pub struct Args {
    /// Compiled servlet class (the generated source is looked up next to it)
    #[arg(value_name = "COMPILED")]
    pub compiled: PathBuf,

    /// Template file name or path (only the basename is used)
    #[arg(short, long, value_name = "NAME")]
    pub template: String,

    /// Generated source, if it does not sit next to the compiled class
    #[arg(short, long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// Template line to map to a generated line (repeatable)
    #[arg(short, long = "forward", value_name = "LINE", allow_negative_numbers = true)]
    pub forward: Vec<i64>,

    /// Generated line to map back to a template line (repeatable)
    #[arg(short, long = "reverse", value_name = "LINE", allow_negative_numbers = true)]
    pub reverse: Vec<i64>,

    /// Disassembler command, e.g. "javap -v"; the class path is appended
    #[arg(long, value_name = "CMD")]
    pub tool: Option<String>,

    /// Disassembler timeout in milliseconds (overrides the config file)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// JSON file overriding resolver settings
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Print every segment of the mapping table
    #[arg(long)]
    pub dump: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Returns true if nothing was asked of the table
    #[must_use]
    pub fn has_no_queries(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty() && !self.dump
    }
}
