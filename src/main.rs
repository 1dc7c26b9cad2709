//! pychat binary entry point

use color_eyre::Result;
use pychat::{
    cli::{read_prompt, Cli, Commands},
    providers::ApiProvider,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;

    // Pick up OPENAI_* and PYCHAT_* from a local .env
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging; stdout is reserved for results
    let filter = if cli.verbose {
        EnvFilter::new("pychat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Handle commands
    match cli.command {
        Commands::Call {
            prompt,
            messages,
            provider,
        } => {
            let prompt = read_prompt(prompt, messages)?;
            let adapter = provider.build_adapter()?;

            let response = adapter.call_api(&prompt, None).await;
            println!("{}", serde_json::to_string_pretty(&response)?);

            if response.is_error() {
                std::process::exit(1);
            }
        }
        Commands::Options { provider } => {
            let adapter = provider.build_adapter()?;
            let options = adapter.build_call_options()?.redacted();
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Commands::Version => {
            println!("pychat version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
