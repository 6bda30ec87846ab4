//! `inputgen` command-line tool.
//!
//! # Usage
//!
//! ```bash
//! inputgen remap-1d --src pop_depth.json --src-units cm --dst woa_depth.json --dst-units m
//! inputgen regrid --mapping map_r05_to_gx1v7.json --input runoff.json \
//!   --variable din_riv_flux --config regrid.toml --output din_riv_flux.json
//! inputgen time-axis --years 2000 2001
//! ```

use clap::{Parser, Subcommand};
use inputgen::axis_remap::gen_remap_weights_1d;
use inputgen::calendar::{time_bounds_month, time_mid_month_days};
use inputgen::config::InputgenConfig;
use inputgen::field::Dataset;
use inputgen::mapping::{GridOperator, MappingFields};
use inputgen::metadata::clean_fill_values;
use inputgen::regrid::SparseRegridder;
use inputgen::InputgenResult;
use ndarray::Array2;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "inputgen")]
#[command(about = "Remap and regrid input datasets for ocean biogeochemistry models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print conservative weights between two 1D axes as JSON
    Remap1d {
        /// JSON file with source cell bounds, `[[lo, hi], ...]`
        #[arg(long)]
        src: PathBuf,

        /// JSON file with destination cell bounds
        #[arg(long)]
        dst: PathBuf,

        #[arg(long, default_value = "m")]
        src_units: String,

        #[arg(long, default_value = "m")]
        dst_units: String,
    },
    /// Map one variable of a dataset with ESMF weights
    Regrid {
        /// Mapping weights, JSON or (with the `netcdf` feature) netCDF
        #[arg(long)]
        mapping: PathBuf,

        /// Source dataset as JSON
        #[arg(long)]
        input: PathBuf,

        /// Variable to map
        #[arg(long)]
        variable: String,

        /// TOML configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the mapped dataset as JSON
        #[arg(long)]
        output: PathBuf,
    },
    /// Print mid-month times and monthly bounds on the noleap calendar
    TimeAxis {
        #[arg(long, num_args = 1.., required = true)]
        years: Vec<i32>,
    },
}

#[derive(Serialize)]
struct TimeAxis {
    time: Vec<f64>,
    time_bnds: Vec<[f64; 2]>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> InputgenResult<()> {
    match command {
        Commands::Remap1d {
            src,
            dst,
            src_units,
            dst_units,
        } => {
            let src = read_bounds(&src)?;
            let dst = read_bounds(&dst)?;
            let weights = gen_remap_weights_1d(src.view(), dst.view(), &src_units, &dst_units)?;
            let dense: Vec<Vec<f64>> = weights
                .to_dense()
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect();
            println!("{}", serde_json::to_string_pretty(&dense)?);
        }
        Commands::Regrid {
            mapping,
            input,
            variable,
            config,
            output,
        } => {
            let config = match config {
                Some(path) => InputgenConfig::from_path(path)?,
                None => InputgenConfig::default(),
            };
            let operator = load_operator(&mapping)?;
            let regridder = SparseRegridder::new(operator, config.regrid);
            let dataset = Dataset::from_json_path(&input)?;

            let mut mapped = regridder.map_variables(&dataset, &[variable.as_str()])?;
            clean_fill_values(&mut mapped);
            std::fs::write(&output, serde_json::to_string(&mapped)?)?;
            info!(variable = %variable, output = %output.display(), "wrote mapped dataset");
        }
        Commands::TimeAxis { years } => {
            let axis = TimeAxis {
                time: time_mid_month_days(&years).to_vec(),
                time_bnds: time_bounds_month(&years)
                    .rows()
                    .into_iter()
                    .map(|row| [row[0], row[1]])
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&axis)?);
        }
    }
    Ok(())
}

fn read_bounds(path: &Path) -> InputgenResult<Array2<f64>> {
    let pairs: Vec<[f64; 2]> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(Array2::from_shape_fn((pairs.len(), 2), |(i, side)| pairs[i][side]))
}

fn load_operator(path: &Path) -> InputgenResult<GridOperator> {
    let is_netcdf = path.extension().is_some_and(|ext| ext == "nc");
    if is_netcdf {
        #[cfg(feature = "netcdf")]
        return GridOperator::from_netcdf(path);
        #[cfg(not(feature = "netcdf"))]
        return Err(inputgen::InputgenError::Config(format!(
            "{} is a netCDF file; rebuild with the `netcdf` feature to read it",
            path.display()
        )));
    }
    GridOperator::load(&MappingFields::from_json_path(path)?)
}
