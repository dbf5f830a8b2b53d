//! # Cli
//!
//! Argument parsing for the remes binary.

use clap::Parser;

/// Run a RemesPath query against a JSON document.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The query to run.
    #[arg(index = 1)]
    pub query: String,

    /// The path to the input JSON document. Read from stdin when omitted
    /// and the query depends on its input.
    #[arg(short, long)]
    pub input: Option<std::path::PathBuf>,

    /// Print the result on a single line instead of pretty-printing.
    #[arg(long)]
    pub compact: bool,

    /// How much to log: off, error, warn, info, debug or trace.
    #[arg(short, long, default_value = "error")]
    pub verbosity: log::LevelFilter,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}
