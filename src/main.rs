use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openems::config::{self, Config};
use openems::{OpenEmsClient, TimeSeries, TimeseriesQuery};

#[derive(Debug, Parser)]
#[command(
    name = "openems",
    version,
    about = "Query and configure edges through the OpenEMS backend"
)]
struct Args {
    /// Config file (default: $OPENEMS_CONFIG or ~/.config/openems/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend WebSocket URL (e.g. wss://portal.example.com/openems-backend-ui2)
    #[arg(long, global = true, env = "OPENEMS_URL")]
    server: Option<String>,

    #[arg(long, global = true, env = "OPENEMS_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "OPENEMS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Timezone for time-series queries
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Seconds to wait for each call (dispatch path only)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all edges
    Edges,
    /// Show the configuration of an edge
    Config { edge: String },
    /// List the channels of a component
    Channels { edge: String, component: String },
    /// List meter components
    Meters { edge: String },
    /// List PV inverter components
    Pvinverters { edge: String },
    /// Query historic time-series data as CSV
    History {
        edge: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Query historic and forecast data of a component as CSV
    Forecast {
        edge: String,
        component: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Set one configuration property of a component
    Set {
        edge: String,
        component: String,
        name: String,
        /// JSON value; plain text is sent as a string
        value: String,
    },
}

#[derive(Debug, clap::Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,
    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,
    /// Channel address, repeatable (e.g. meter0/ActivePower)
    #[arg(long = "channel", required = true)]
    channels: Vec<String>,
    /// Resolution in seconds
    #[arg(long)]
    resolution: Option<u64>,
    /// Write CSV to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl RangeArgs {
    fn query(&self) -> TimeseriesQuery {
        let query = TimeseriesQuery::new(self.from, self.to, self.channels.clone());
        match self.resolution {
            Some(seconds) => query.with_resolution(seconds),
            None => query,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("openems={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    let settings = merge_args(config, &args)
        .into_settings()
        .context("incomplete connection settings")?;
    debug!(?settings, "resolved settings");

    let client = OpenEmsClient::new(settings)?;
    let outcome = run_command(&client, &args.command);
    client.close();
    outcome
}

fn merge_args(mut config: Config, args: &Args) -> Config {
    if let Some(server) = &args.server {
        config.server_url = Some(server.clone());
    }
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(timezone) = &args.timezone {
        config.timezone = Some(timezone.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }
    config
}

fn run_command(client: &OpenEmsClient, command: &Command) -> Result<()> {
    match command {
        Command::Edges => print_json(&client.get_edges()?),
        Command::Config { edge } => print_json(&client.get_edge_config(edge)?),
        Command::Channels { edge, component } => {
            print_json(&client.get_channels_of_component(edge, component)?)
        }
        Command::Meters { edge } => print_json(&client.get_meter_list(edge)?),
        Command::Pvinverters { edge } => print_json(&client.get_pvinverter_list(edge)?),
        Command::History { edge, range } => {
            let series = client.query_historic_timeseries_data(edge, range.query())?;
            write_series(&series, range.output.as_ref())
        }
        Command::Forecast {
            edge,
            component,
            range,
        } => {
            let series = client.query_futuristic_timeseries_data(edge, range.query(), component)?;
            write_series(&series, range.output.as_ref())
        }
        Command::Set {
            edge,
            component,
            name,
            value,
        } => {
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
            print_json(&client.update_component_config_from_name_value(edge, component, name, value)?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn write_series(series: &TimeSeries, output: Option<&PathBuf>) -> Result<()> {
    let rows = match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
            series.write_csv(file)?
        }
        None => series.write_csv(io::stdout().lock())?,
    };
    debug!(rows, "time series written");
    Ok(())
}
