mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::execute::ExecuteArgs;

#[tokio::main]
async fn main() -> Result<()> {
    execlite_core::observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Execute {
            intent,
            language,
            code,
            request,
            max_tools,
            timeout_ms,
            sandbox,
            approve,
        } => {
            let config = commands::load_config(&cli.paths)?;
            let args = ExecuteArgs {
                intent,
                language,
                code,
                request,
                max_tools,
                timeout_ms,
                sandbox,
                approve,
            };
            let result = commands::execute::run(config, args).await?;
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Validate {
            file,
            language,
            json,
        } => {
            let result = commands::validate::run(&file, language, json)?;
            if result.requires_approval {
                std::process::exit(2);
            }
        }
        Commands::Tools { query, limit, json } => {
            let config = commands::load_config(&cli.paths)?;
            commands::tools::run(&config.paths.tools_dir, query.as_deref(), limit, json)?;
        }
        Commands::Cleanup {
            containers,
            max_age_secs,
        } => {
            let config = commands::load_config(&cli.paths)?;
            commands::cleanup::run(&config.paths, containers, max_age_secs).await?;
        }
        Commands::Audit { n } => {
            let config = commands::load_config(&cli.paths)?;
            commands::audit::run(&config.paths, n).await?;
        }
    }

    Ok(())
}
