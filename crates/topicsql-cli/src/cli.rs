use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "topicsql")]
#[command(about = "Rewrite per-topic SQL onto a shared jsonb table")]
pub struct Cli {
    /// Path to config.yaml; defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "config.yaml", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite a query offline, with numeric fields given on the command line.
    Rewrite(RewriteArgs),
    /// Rewrite a query with field metadata loaded from the database.
    Shot(ShotArgs),
    /// Print the per-topic field metadata found in the database.
    Fields(FieldsArgs),
}

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Fields that receive the ::FLOAT cast, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub numeric: Vec<String>,

    /// SQL text. Omit or use '-' to read from stdin.
    pub sql: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShotArgs {
    /// SQL text. Omit or use '-' to read from stdin.
    pub sql: Option<String>,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Only list numeric fields.
    #[arg(long)]
    pub numeric: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rewrite_args() {
        let cli = Cli::parse_from([
            "topicsql",
            "--json",
            "rewrite",
            "--numeric",
            "threshold,value",
            "SELECT a FROM t",
        ]);

        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        let Command::Rewrite(args) = cli.command else {
            panic!("expected rewrite");
        };
        assert_eq!(args.numeric, vec!["threshold", "value"]);
        assert_eq!(args.sql.as_deref(), Some("SELECT a FROM t"));
    }

    #[test]
    fn test_shot_reads_stdin_when_sql_omitted() {
        let cli = Cli::parse_from(["topicsql", "shot", "--config", "prod.yaml"]);
        assert_eq!(cli.config, PathBuf::from("prod.yaml"));
        assert!(matches!(cli.command, Command::Shot(ShotArgs { sql: None })));
    }
}
