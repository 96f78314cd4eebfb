use anyhow::Context;
use clap::{Parser, Subcommand};
use stockscope_core::market::provider::ProviderQuotes;
use stockscope_core::market::yahoo::YahooChartProvider;
use stockscope_core::market::Period;
use stockscope_core::portfolio::{self, PortfolioRules};
use stockscope_core::report::{self, AnalysisSettings};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "stockscope", about = "Rule-based stock and portfolio analysis")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Indicators, key metrics and a Buy/Hold/Sell call for one symbol.
    Analyze {
        symbol: String,

        /// History window: 1mo, 3mo, 6mo, 1y, 2y or 5y.
        #[arg(long, default_value = "1y")]
        period: Period,

        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Value a portfolio CSV with `Symbol` and `Shares` columns.
    Portfolio {
        csv_path: std::path::PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Print the sample portfolio CSV.
    Template,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "command failed");
    }
    result
}

async fn run(command: Command, settings: &stockscope_core::config::Settings) -> anyhow::Result<()> {
    match command {
        Command::Template => {
            print!("{}", portfolio::SAMPLE_PORTFOLIO_CSV);
        }
        Command::Analyze {
            symbol,
            period,
            json,
        } => {
            let provider = YahooChartProvider::from_settings(settings)?;
            let (report, _) =
                report::fetch_report(&provider, &symbol, period, &AnalysisSettings::default())
                    .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::stock_report(&report));
            }
        }
        Command::Portfolio { csv_path, json } => {
            let text = std::fs::read_to_string(&csv_path)
                .with_context(|| format!("failed to read {}", csv_path.display()))?;
            let holdings = portfolio::parse_holdings_csv(&text)
                .with_context(|| format!("invalid portfolio CSV {}", csv_path.display()))?;
            anyhow::ensure!(!holdings.is_empty(), "portfolio CSV has no holdings");

            let provider = YahooChartProvider::from_settings(settings)?;
            let rules = PortfolioRules {
                weighting: settings.portfolio_weighting,
                ..Default::default()
            };
            let summary = portfolio::aggregate(&holdings, &ProviderQuotes(&provider), &rules).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render::portfolio_summary(&summary));
            }
        }
    }

    Ok(())
}

fn init_sentry(settings: &stockscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
