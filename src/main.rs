use std::path::PathBuf;

use clap::{Parser, Subcommand};
use consentgate::simulate::{self, Simulation, Step};
use consentgate_core::{SiteConfig, Toggles};
use consentgate_runtime::{ConsentStore, MemoryCookieJar};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "consentgate",
    about = "Consent banner state machine: simulate page loads and inspect consent cookies"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one page load and print a JSON report
    Simulate {
        /// Site config file (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cookie header the page loads with, e.g. 'cmp_consent={"analytics":true}'
        #[arg(long)]
        cookie: Option<String>,

        /// Page served over TLS (written cookie gets Secure)
        #[arg(long, default_value_t = false)]
        https: bool,

        /// User interaction, repeatable: accept|reject|customize|save|close|open
        #[arg(long = "action")]
        actions: Vec<Step>,

        /// Analytics checkbox state whenever the modal opens
        #[arg(long)]
        analytics: Option<bool>,

        /// Retargeting checkbox state whenever the modal opens
        #[arg(long)]
        retargeting: Option<bool>,
    },

    /// Decode a cookie header and print the normalized consent
    Inspect {
        #[arg(long)]
        cookie: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default site config as TOML
    DumpConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Command::Simulate { config, .. } | Command::Inspect { config, .. } => config.clone(),
        Command::DumpConfig => None,
    };
    let config = match config_path {
        Some(path) => SiteConfig::from_file(&path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {}", path.display(), e))?,
        None => SiteConfig::default(),
    };

    let default_filter = if config.debug { "consentgate=debug" } else { "consentgate=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Simulate {
            cookie,
            https,
            actions,
            analytics,
            retargeting,
            ..
        } => {
            let toggles = (analytics.is_some() || retargeting.is_some()).then(|| Toggles {
                analytics: analytics.unwrap_or(true),
                retargeting: retargeting.unwrap_or(true),
            });
            let sim = Simulation {
                cookie_header: cookie,
                secure: https,
                toggles,
                steps: actions,
            };
            let report = simulate::run(config, &sim);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Inspect { cookie, .. } => {
            let store = ConsentStore::new(MemoryCookieJar::from_header(&cookie), &config, false);
            let record = store.read();
            let out = json!({
                "present": record.is_some(),
                "valid": store.has_valid_consent(),
                "record": record,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::DumpConfig => {
            println!("{}", SiteConfig::default().to_toml()?);
        }
    }

    Ok(())
}
