//! fxgate - command-line currency converter backed by the gateway.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fxgate_client::{render_line_chart, GatewayClient, DEFAULT_GATEWAY_URL};
use fxgate_core::conversion::parse_amount;
use fxgate_core::currency::{parse_rate_date, today_utc};
use fxgate_core::{CurrencyPair, SeriesStats};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fxgate")]
#[command(about = "Convert currencies and chart exchange-rate history")]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "FXGATE_URL", default_value = DEFAULT_GATEWAY_URL)]
    url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available currency codes
    Currencies,

    /// Convert an amount between two currencies
    Convert {
        amount: String,
        from: String,
        to: String,

        /// Use the rate published on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Chart the rate history of a currency pair
    Series {
        from: String,
        to: String,

        /// Last day of the series (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to_date: Option<String>,

        /// Chart width in columns
        #[arg(long, default_value = "72")]
        width: usize,

        /// Chart height in rows
        #[arg(long, default_value = "16")]
        height: usize,
    },
}

fn optional_date(field: &str, raw: Option<&str>, today: NaiveDate) -> fxgate_core::Result<Option<NaiveDate>> {
    raw.map(|d| parse_rate_date(field, d, today)).transpose()
}

async fn run(cli: Cli) -> Result<()> {
    let client = GatewayClient::with_timeout(Some(&cli.url), Duration::from_secs(cli.timeout_secs))?;
    let today = today_utc();

    match cli.command {
        Command::Currencies => {
            for code in client.currencies().await? {
                println!("{}", code);
            }
        }
        Command::Convert {
            amount,
            from,
            to,
            date,
        } => {
            let amount = parse_amount(&amount)?;
            let pair = CurrencyPair::parse(&from, &to)?;
            let date = optional_date("date", date.as_deref(), today)?;
            let conversion = client.convert(&pair, amount, date).await?;
            println!("Rate ({}): {}", conversion.date, conversion.rate);
            println!("Result: {}", conversion.display_result());
        }
        Command::Series {
            from,
            to,
            to_date,
            width,
            height,
        } => {
            let pair = CurrencyPair::parse(&from, &to)?;
            let to_date = optional_date("toDate", to_date.as_deref(), today)?.unwrap_or(today);
            let points = client.time_series(to_date, &pair).await?;
            let values: Vec<f64> = points.iter().map(|p| p.rate).collect();

            println!("{} up to {}", pair, to_date);
            println!("{}", render_line_chart(&values, width, height));
            if let Some(stats) = SeriesStats::from_points(&points) {
                println!(
                    "{} days, min {:.4}, max {:.4}, mean {:.4}, change {:+.2}%",
                    stats.count, stats.min, stats.max, stats.mean, stats.change_percent
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    run(cli).await
}
