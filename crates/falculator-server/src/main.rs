mod commands;

use clap::{Parser, Subcommand};
use falculator::pricing::cost::DEFAULT_BUDGET;
use falculator::providers::ProviderKind;
use std::path::PathBuf;

use commands::extract::ExtractArgs;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction server
    Serve {
        /// TOML settings file, overridden by FALCULATOR_* environment variables
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Extract pricing from a local screenshot and print the cost breakdown
    Extract {
        /// Path to a PNG, JPEG, GIF or WebP screenshot
        path: PathBuf,
        /// Your own provider API key
        #[arg(long)]
        api_key: Option<String>,
        /// primary (Gemini) or secondary (OpenRouter)
        #[arg(long)]
        provider: Option<ProviderKind>,
        /// Budget in dollars for the "runs for $N" figure
        #[arg(long, default_value_t = DEFAULT_BUDGET)]
        budget: f64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            commands::serve::run(config.as_deref()).await?;
        }
        Commands::Extract {
            path,
            api_key,
            provider,
            budget,
            config,
        } => {
            commands::extract::run(ExtractArgs {
                path: &path,
                api_key,
                provider,
                budget,
                config: config.as_deref(),
            })
            .await?;
        }
    }

    Ok(())
}
