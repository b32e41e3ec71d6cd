// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pivots a JSON table and prints the flattened tree.
//!
//! ```text
//! cargo run -p reltab_examples -- --data-dir reltab_examples/data \
//!     --pivot Job --pivot Title --open '{"Safety": true}'
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use futures::executor::block_on;
use reltab::{LoaderConfig, RelTab};
use reltab_aggtree::{OpenPaths, vpivot};
use reltab_core::TableData;
use reltab_core::path::SEPARATOR;
use reltab_transforms::QueryExp;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Pivot a JSON table and print the flattened tree")]
struct Args {
    /// Directory holding `<table>.json` files.
    #[arg(long, env = LoaderConfig::DATA_DIR_ENV, default_value = "json")]
    data_dir: PathBuf,

    /// Table to load.
    #[arg(long, default_value = "bart-comp-sample")]
    table: String,

    /// Columns to keep, in order. Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Pivot column; repeat for deeper levels.
    #[arg(long = "pivot")]
    pivots: Vec<String>,

    /// Open nodes as JSON, e.g. `{"Safety": {"Officer": true}}`. Without it only the root and
    /// its children are shown.
    #[arg(long)]
    open: Option<String>,

    /// Print the children of this single path instead of the tree. Takes an encoded `_path`
    /// such as `#Safety#%`, or plain components separated by `/`.
    #[arg(long, conflicts_with = "open")]
    path: Option<String>,

    /// Print the result as JSON instead of a text table.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match block_on(run(&args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let rt = RelTab::local(LoaderConfig::default().with_data_dir(&args.data_dir));

    let mut base = QueryExp::table(args.table.as_str());
    if !args.columns.is_empty() {
        base = base.project(args.columns.iter().cloned());
    }

    let query = if args.pivots.is_empty() {
        base
    } else {
        let tree = vpivot(&rt, base, args.pivots.iter().cloned()).await?;
        match &args.path {
            Some(path) if path.starts_with(SEPARATOR) => tree.apply_encoded_path(path)?,
            Some(path) => {
                let path: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
                tree.apply_path(path.as_slice())?
            }
            None => {
                let open = match &args.open {
                    Some(json) => serde_json::from_str(json)?,
                    None => OpenPaths::new(),
                };
                tree.get_tree_query(Some(&open))?
            }
        }
    };
    tracing::info!(%query, "evaluating");

    let table = rt.eval_query(&query).await?;
    print_table(&table, args.json)?;
    Ok(())
}

fn print_table(table: &TableData, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
    } else {
        print!("{table}");
    }
    Ok(())
}
