//! xh-fetch - Fetch posts from x.com accounts within a time window

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use libxharvest::config::{expand_path, Config};
use libxharvest::export::{self, ExportRecord};
use libxharvest::logging::{LogFormat, LoggingConfig};
use libxharvest::session::x_web::XWebFactory;
use libxharvest::{AccountRef, HarvestError, Harvester};

#[derive(Parser, Debug)]
#[command(name = "xh-fetch")]
#[command(version, about = "Fetch posts from x.com accounts within a time window")]
#[command(long_about = r#"Fetch posts from one or more x.com accounts using the cookies of a
logged-in browser session, keep the posts inside a time window, and export
them as JSON or CSV.

EXAMPLES:
    # Latest 20 posts from one account
    xh-fetch rustlang -n 20

    # Everything posted during the first week of March
    xh-fetch @rustlang --from-date 2024-03-01 --to-date 2024-03-07 --json march.json

    # Raw timestamp bounds, numeric account id
    xh-fetch 783214 --start 2024-03-01T12:00:00Z --end 2024-03-01T18:00:00Z

    # Several accounts, 50 posts each, to CSV
    xh-fetch rustlang tokio_rs 783214 -n 50 --csv batch.csv

ACCOUNTS:
    All-digit values are numeric account ids; anything else is a handle.
    A leading @ is optional.

CONFIGURATION:
    Settings are read from $XHARVEST_CONFIG or ~/.config/xharvest/config.toml.
    Command-line flags override the file.

EXIT CODES:
    0 - Success (including empty results)
    1 - Fetch, resolution, configuration or export failure
    2 - Session or authentication failure
    3 - Invalid input
"#)]
struct Cli {
    /// Account handles or numeric ids
    #[arg(required = true, value_name = "ACCOUNT")]
    accounts: Vec<String>,

    /// Only posts at or after this time (YYYY-MM-DDTHH:MM:SSZ)
    #[arg(long, value_name = "TIMESTAMP", conflicts_with_all = ["from_date", "to_date"])]
    start: Option<String>,

    /// Only posts at or before this time (YYYY-MM-DDTHH:MM:SSZ)
    #[arg(long, value_name = "TIMESTAMP", conflicts_with_all = ["from_date", "to_date"])]
    end: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "to_date")]
    from_date: Option<String>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", requires = "from_date")]
    to_date: Option<String>,

    /// Maximum posts per account
    #[arg(short = 'n', long, value_name = "N")]
    max: Option<usize>,

    /// Write results to a JSON file
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Write results to a CSV file
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Do not print the console preview
    #[arg(long)]
    no_preview: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// JSON cookie export from a logged-in browser
    #[arg(long, value_name = "PATH")]
    cookie_file: Option<String>,

    /// Name to register the session under
    #[arg(long, value_name = "NAME")]
    username: Option<String>,

    /// Session pool file (deleted and rebuilt on every run)
    #[arg(long, value_name = "PATH")]
    store_path: Option<String>,

    /// Attempts per lookup and per fetch
    #[arg(long, value_name = "N")]
    retry_count: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long, value_name = "SECS")]
    retry_delay: Option<u64>,

    /// Seconds to wait between accounts
    #[arg(long, value_name = "SECS")]
    rate_limit_delay: Option<f64>,

    /// Override the GraphQL endpoint
    #[arg(long, value_name = "URL", env = "XHARVEST_API_BASE_URL", hide = true)]
    api_base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log format (text, json, pretty)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();

    match run(cli).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<HarvestError>()
                .map(HarvestError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(&expand_path(&path.to_string_lossy()))?,
        None => Config::load()?,
    };

    if let Some(cookie_file) = &cli.cookie_file {
        config.session.cookie_file = cookie_file.clone();
    }
    if let Some(username) = &cli.username {
        config.session.username = username.clone();
    }
    if let Some(store_path) = &cli.store_path {
        config.session.store_path = store_path.clone();
    }
    if let Some(retry_count) = cli.retry_count {
        config.fetch.retry_count = retry_count;
    }
    if let Some(retry_delay) = cli.retry_delay {
        config.fetch.retry_delay_secs = retry_delay;
    }
    if let Some(rate_limit_delay) = cli.rate_limit_delay {
        config.fetch.rate_limit_delay_secs = rate_limit_delay;
    }
    if cli.no_preview {
        config.output.preview = false;
    }
    Ok(config)
}

/// Returns the process exit code for runs that completed
async fn run(cli: Cli) -> Result<i32> {
    let accounts = cli
        .accounts
        .iter()
        .map(|a| AccountRef::parse(a))
        .collect::<libxharvest::Result<Vec<_>>>()?;

    let config = load_config(&cli)?;

    let mut factory = XWebFactory::from_config(&config.session);
    if let Some(base_url) = &cli.api_base_url {
        factory = factory.with_base_url(base_url.clone());
    }
    let mut harvester = Harvester::from_config(&config, Box::new(factory));

    let date_range = cli.from_date.as_deref().zip(cli.to_date.as_deref());
    let multi = accounts.len() > 1;
    let mut exit_code = 0;

    let records: Vec<ExportRecord> = if let [account] = accounts.as_slice() {
        let posts = match date_range {
            Some((from, to)) => {
                harvester
                    .fetch_for_account_in_date_range(account, from, to, cli.max)
                    .await?
            }
            None => {
                harvester
                    .fetch_for_account(account, cli.start.as_deref(), cli.end.as_deref(), cli.max)
                    .await?
            }
        };
        export::records_for_account(&posts, account)
    } else {
        let report = match date_range {
            Some((from, to)) => {
                harvester
                    .fetch_for_accounts_in_date_range(&accounts, from, to, cli.max)
                    .await?
            }
            None => {
                harvester
                    .fetch_for_accounts(&accounts, cli.start.as_deref(), cli.end.as_deref(), cli.max)
                    .await?
            }
        };

        for failure in &report.failures {
            eprintln!("Failed: {}: {}", failure.account.label(), failure.error);
        }
        if report.all_failed() {
            exit_code = 1;
        }
        export::records_from_tagged(&report.posts)
    };

    tracing::info!("Total tweets fetched: {}", records.len());

    if let Some(path) = &cli.json {
        export::write_json(path, &records)
            .with_context(|| format!("Could not export JSON to {}", path.display()))?;
    }
    if let Some(path) = &cli.csv {
        export::write_csv(path, &records)
            .with_context(|| format!("Could not export CSV to {}", path.display()))?;
    }

    if config.output.preview && cli.json.is_none() && cli.csv.is_none() {
        print!("{}", export::render_preview(&records, multi));
    }

    Ok(exit_code)
}
