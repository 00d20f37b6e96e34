//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Speak lines in the dino character voice.
#[derive(Parser)]
#[command(name = "dino")]
#[command(about = "Speak lines in the dino character voice")]
#[command(version)]
pub struct Cli {
    /// JSON settings file (defaults apply when omitted)
    #[arg(long, global = true, env = "DINO_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["dino", "--verbose", "--settings", "/tmp/dino.json", "voices"]);
        assert!(cli.verbose);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/dino.json")));
        assert!(matches!(cli.command, Commands::Voices));
    }
}
