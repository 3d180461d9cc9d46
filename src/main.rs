use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use titer_tables::data::loader;
use titer_tables::data::search::labels;
use titer_tables::{
    CityTable, ConsistencyBuilder, EntryKind, ExportConfig, MatrixExporter, RecordIndex,
    SearchConfig,
};

/// Resolve antigen/serum records and export titer tables
#[derive(Parser, Debug)]
#[clap(name = "titer-tables")]
struct Args {
    /// Antigen records (.json or .csv)
    #[clap(long, value_name = "FILE")]
    antigens: PathBuf,

    /// Serum records (.json or .csv)
    #[clap(long, value_name = "FILE")]
    sera: PathBuf,

    /// City table as a JSON object of abbreviation → name
    #[clap(long, value_name = "FILE")]
    cities: Option<PathBuf>,

    /// Match names regardless of point mutations
    #[clap(long)]
    ignore_mutations: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one result set and write it as CSV to stdout
    Table {
        /// Results document
        #[clap(long, value_name = "FILE")]
        results: PathBuf,

        #[clap(long, default_value = "0")]
        experiment: usize,

        #[clap(long, default_value = "0")]
        result: usize,

        /// Export options as JSON; flags below are applied on top
        #[clap(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Keep censored titers as <b / >b
        #[clap(long)]
        thresholded: bool,

        /// Write titers exactly as recorded
        #[clap(long)]
        as_is: bool,

        #[clap(long)]
        round: bool,

        #[clap(long)]
        add_ids: bool,

        #[clap(long)]
        add_serum_strain_ids: bool,

        /// Label rows and columns with short names
        #[clap(long)]
        short_names: bool,
    },
    /// Find entries by approximate name
    Alias {
        query: String,
        /// Search sera instead of antigens
        #[clap(long)]
        serum: bool,
    },
    /// Find entries where a regular expression matches any field
    Deep {
        pattern: String,
        /// Search sera instead of antigens
        #[clap(long)]
        serum: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cities = match &args.cities {
        Some(path) => loader::load_city_table(path)?,
        None => CityTable::builtin(),
    };
    let search = SearchConfig {
        ignore_mutations: args.ignore_mutations,
        ..SearchConfig::default()
    };

    let antigens = loader::load_index(&args.antigens, EntryKind::Antigen, &cities, search.clone())?;
    let sera = loader::load_index(&args.sera, EntryKind::Serum, &cities, search)?;

    match args.command {
        Command::Table {
            results,
            experiment,
            result,
            config,
            thresholded,
            as_is,
            round,
            add_ids,
            add_serum_strain_ids,
            short_names,
        } => {
            let doc = loader::load_results_document(&results)?;
            let set = loader::select_result_set(&doc, experiment, result)?;
            let matrix = ConsistencyBuilder::new(&antigens, &sera)?.build(&set)?;

            let mut export_config = match config {
                Some(path) => loader::load_export_config(&path)?,
                None => ExportConfig::default(),
            };
            export_config.thresholded |= thresholded;
            export_config.as_is |= as_is;
            export_config.do_rounding |= round;
            export_config.add_ids |= add_ids;
            export_config.add_serum_strain_ids |= add_serum_strain_ids;
            if short_names {
                export_config.antigen_names =
                    Some(matrix.antigens().iter().map(|e| e.short.clone()).collect());
                export_config.serum_names =
                    Some(matrix.sera().iter().map(|e| e.short.clone()).collect());
            }

            let export = MatrixExporter::new(&matrix).export(&export_config)?;
            export
                .table
                .write_csv(io::stdout().lock())
                .context("writing CSV")?;
        }
        Command::Alias { query, serum } => {
            let index = pick(&antigens, &sera, serum);
            print_hits(&labels(&index.aliased_search(&query)));
        }
        Command::Deep { pattern, serum } => {
            let index = pick(&antigens, &sera, serum);
            print_hits(&labels(&index.deep_search(&pattern)?));
        }
    }
    Ok(())
}

fn pick<'a>(antigens: &'a RecordIndex, sera: &'a RecordIndex, serum: bool) -> &'a RecordIndex {
    if serum {
        sera
    } else {
        antigens
    }
}

fn print_hits(hits: &[(&str, &str)]) {
    if hits.is_empty() {
        println!("No matches");
        return;
    }
    for (id, long) in hits {
        println!("{id}\t{long}");
    }
}
