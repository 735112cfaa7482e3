use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kinotreyler")]
#[command(author, version, about = "Telegram movie catalog bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (the default when no subcommand is given)
    Run {
        /// Use webhook mode instead of long polling (implied when PUBLIC_URL is set)
        #[arg(long)]
        webhook: bool,
    },

    /// Create a database backup and exit
    Backup,

    /// Apply database migrations and exit
    Migrate,
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
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["kinotreyler", "run", "--webhook"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Run { webhook: true }));

        let cli = Cli::try_parse_from(["kinotreyler", "backup"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Backup));

        let cli = Cli::try_parse_from(["kinotreyler"]).unwrap();
        assert_eq!(cli.command, None);
    }
}
