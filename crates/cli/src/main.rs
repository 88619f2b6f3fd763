//! Rent Predictor CLI
//!
//! Trains and inspects the local model artifact, and queries a running
//! rent-server for predictions and status.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, remote, train};
use rent_lib::ApartmentFeatures;

/// Rent Predictor CLI
#[derive(Parser)]
#[command(name = "rentctl")]
#[command(author, version, about = "CLI for the Apartment Rent Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RENT_API_URL env var)
    #[arg(long, env = "RENT_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from the configured data source
    Train {
        /// Retrain even if an artifact already exists
        #[arg(long)]
        force: bool,

        /// Seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Predict rent locally from raw listing values
    Predict {
        #[arg(long)]
        area: f64,

        #[arg(long)]
        construction_year: i64,

        #[arg(long)]
        bedrooms: i64,

        /// Garden description, e.g. "Present (20 m²)"
        #[arg(long, default_value = "Not present")]
        garden: String,

        #[arg(long, default_value = "no")]
        balcony: String,

        #[arg(long, default_value = "no")]
        parking: String,

        #[arg(long, default_value = "no")]
        furnished: String,

        #[arg(long, default_value = "no")]
        garage: String,

        #[arg(long, default_value = "no")]
        storage: String,
    },

    /// Verify and describe the stored model artifact
    Inspect,

    /// Request a prediction from the server
    Query {
        #[arg(long)]
        area: u32,

        #[arg(long)]
        construction_year: u32,

        #[arg(long)]
        bedrooms: u32,

        /// Garden area in m²
        #[arg(long, default_value = "0")]
        garden_area: u32,

        #[arg(long, default_value = "0")]
        balcony_present: u8,

        #[arg(long, default_value = "0")]
        parking_present: u8,

        #[arg(long, default_value = "0")]
        furnished: u8,

        #[arg(long, default_value = "0")]
        garage_present: u8,

        #[arg(long, default_value = "0")]
        storage_present: u8,
    },

    /// Show server health and the loaded model
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { force, seed } => {
            let settings = commands::load_settings(cli.verbose)?;
            train::train(&settings, force, seed, cli.format).await?;
        }
        Commands::Predict {
            area,
            construction_year,
            bedrooms,
            garden,
            balcony,
            parking,
            furnished,
            garage,
            storage,
        } => {
            let settings = commands::load_settings(cli.verbose)?;
            let listing = predict::RawListing {
                area,
                construction_year,
                bedrooms,
                garden,
                balcony,
                parking,
                furnished,
                garage,
                storage,
            };
            predict::predict(&settings, &listing, cli.format).await?;
        }
        Commands::Inspect => {
            let settings = commands::load_settings(cli.verbose)?;
            inspect::inspect(&settings, cli.format)?;
        }
        Commands::Query {
            area,
            construction_year,
            bedrooms,
            garden_area,
            balcony_present,
            parking_present,
            furnished,
            garage_present,
            storage_present,
        } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            let apartment = ApartmentFeatures {
                area,
                construction_year,
                bedrooms,
                garden_area,
                balcony_present,
                parking_present,
                furnished,
                garage_present,
                storage_present,
            };
            remote::query(&client, &apartment, cli.format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            remote::status(&client, cli.format).await?;
        }
    }

    Ok(())
}
