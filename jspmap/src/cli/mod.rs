//! Command-line interface for the `jspmap` binary

mod args;

pub use args::Args;
