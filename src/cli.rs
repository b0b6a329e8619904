//! Command line interface.
//!
//! ```sh
//! obo-graph terms go.obo
//! obo-graph names go.obo
//! obo-graph --config obo.yaml relations go.obo
//! ```
use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::{
    config::Config,
    logger,
    obo::{OboParser, ParseReport, Relation, Term},
    Result,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an ontology and print its terms
    Terms {
        /// OBO file
        path: PathBuf,
    },
    /// Print a map from term id to term name
    Names {
        /// OBO file
        path: PathBuf,
    },
    /// Compute the transitive closure of an ontology and print its relations
    Relations {
        /// OBO file
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct TermsOutput<'a> {
    terms: Vec<&'a Term>,
    report: ParseReport,
}

#[derive(Serialize)]
struct RelationsOutput<'a> {
    relations: &'a [Relation],
    report: ParseReport,
}

/// Runs the command line.
///
/// # Errors
///
/// Fails when configuration, parsing or the closure engine fail, or output
/// cannot be written.
pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    logger::init(&config.logger);

    let mut parser = OboParser::from_config(&config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Terms { path } => {
            parser.process_ontology_file(&path)?;
            let output = TermsOutput {
                terms: parser.all_terms().collect(),
                report: parser.report(),
            };
            serde_json::to_writer_pretty(&mut out, &output)?;
        }
        Commands::Names { path } => {
            let names = parser.term_id_to_name_file(&path)?;
            serde_json::to_writer_pretty(&mut out, &names)?;
        }
        Commands::Relations { path } => {
            parser.process_ontology_file(&path)?;
            parser.process_relations(&path)?;
            let output = RelationsOutput {
                relations: parser.all_relations(),
                report: parser.report(),
            };
            serde_json::to_writer_pretty(&mut out, &output)?;
        }
    }

    writeln!(out)?;
    Ok(())
}
