use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubestash")]
#[command(author, version, about = "Telegram bot that downloads media into local or cloud-synced storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// List storage backends and whether their sync sidecar is alive
    Backends,

    /// Show free space of every available backend
    Storage,

    /// List stored files, newest first
    Files {
        /// Case-insensitive part of the file name
        query: Option<String>,

        /// Maximum number of files to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_subcommand() {
        let cli = Cli::try_parse_from(["tubestash"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_files_subcommand() {
        let cli = Cli::try_parse_from(["tubestash", "files", "holiday", "--limit", "5"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Files {
                query: Some("holiday".to_string()),
                limit: 5
            })
        );

        let cli = Cli::try_parse_from(["tubestash", "files"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Files { query: None, limit: 20 }));
    }
}
