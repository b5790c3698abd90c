//! Data requirements command-line interface

use clap::{Parser, Subcommand};
use octofhir_datareq::cli::{analyze, list, output};
use std::path::PathBuf;

/// CQL data requirements tool
#[derive(Parser)]
#[command(name = "datareq")]
#[command(author, version, about = "Derive the data requirements of compiled CQL (ELM JSON)", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, pretty, summary)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze expression definitions of an ELM library
    Analyze {
        /// ELM JSON file to analyze
        file: PathBuf,

        /// Expression to analyze (repeatable; default: all)
        #[arg(short, long = "expression")]
        expressions: Vec<String>,

        /// Fail when an And combines OR branches instead of dropping constants
        #[arg(short, long)]
        strict: bool,

        /// Parameter bindings (name=value), as CQL literals
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Library search paths for includes
        #[arg(short = 'L', long = "library-path")]
        library_paths: Vec<PathBuf>,
    },

    /// List the definitions of an ELM library
    List {
        /// ELM JSON file
        file: PathBuf,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    output::setup_colors(&cli.color);

    let result = match cli.command {
        Commands::Analyze {
            file,
            expressions,
            strict,
            params,
            library_paths,
        } => {
            let config = analyze::AnalyzeConfig {
                file,
                expressions,
                strict,
                params,
                library_paths,
                verbose: cli.verbose,
                output_format: cli.format.clone(),
                output_file: cli.output.clone(),
            };
            analyze::analyze(config)
        }

        Commands::List { file } => {
            let config = list::ListConfig {
                file,
                output_format: cli.format.clone(),
                output_file: cli.output.clone(),
            };
            list::list(config)
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
