//! ArtiMorph CLI - convert images to 3D models and manage the model library.

mod commands;
mod error;

use std::process::ExitCode;

use artimorph::config::ConfigFile;
use artimorph::logging::{init_logging, LoggingGuard};
use clap::{Parser, Subcommand};
use console::style;

use commands::config::ConfigCommands;
use commands::convert::ConvertArgs;
use commands::models::ModelsAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "artimorph", version, about = "Turn 2D images into 3D models")]
struct Cli {
    /// Mirror log output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert an image into a 3D model
    Convert(ConvertArgs),

    /// Manage saved models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands run without installing the log subscriber.
        Commands::Config { command } => commands::config::run(command),
        Commands::Convert(args) => {
            let (config, _logging) = load_config(cli.verbose)?;
            commands::convert::run(args, &config)
        }
        Commands::Models { action } => {
            let (config, _logging) = load_config(cli.verbose)?;
            commands::models::run(action, &config)
        }
    }
}

fn load_config(verbose: bool) -> Result<(ConfigFile, Option<LoggingGuard>), CliError> {
    let config = ConfigFile::load()?;
    let logging = start_logging(&config, verbose);
    tracing::info!(version = artimorph::VERSION, "artimorph starting");
    Ok((config, logging))
}

fn start_logging(config: &ConfigFile, verbose: bool) -> Option<LoggingGuard> {
    match init_logging(&config.logging.directory, &config.logging.level, verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging disabled: {}", style("Warning:").yellow(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert_flags() {
        let cli = Cli::try_parse_from([
            "artimorph",
            "convert",
            "sketch.png",
            "--format",
            "png",
            "--timeout",
            "120",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.image, std::path::PathBuf::from("sketch.png"));
                assert_eq!(args.timeout, Some(120));
                assert!(args.format.is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_models_remove() {
        let cli = Cli::try_parse_from(["artimorph", "models", "remove", "a.glb", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Models {
                action: ModelsAction::Remove { yes: true, .. }
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["artimorph", "convert", "a.gif", "--format", "gif"]).is_err());
    }
}
