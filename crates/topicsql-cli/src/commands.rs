//! Subcommand handlers

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use topicsql_meta::{rewrite_with_metadata, MetadataSource, PgMetadata, PipelineOptions};
use topicsql_rewrite::rewrite_with_options;
use topicsql_schema::NumericFields;
use tracing::info;

use crate::cli::{Cli, Command, FieldsArgs, RewriteArgs, ShotArgs};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct RewriteOutput<'a> {
    original: &'a str,
    mapped: &'a str,
}

pub async fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Command::Rewrite(args) => rewrite(args, config, cli.json),
        Command::Shot(args) => shot(args, config, cli.json).await,
        Command::Fields(args) => fields(args, config, cli.json).await,
    }
}

fn rewrite(args: RewriteArgs, config: &Config, json: bool) -> Result<()> {
    let sql = read_sql(args.sql)?;
    let ctx = config
        .schema_names()
        .with_numeric(NumericFields::flat(args.numeric));

    let mapped = rewrite_with_options(&sql, &ctx, &config.rewrite)?;
    print_mapped(&sql, &mapped, json)
}

async fn shot(args: ShotArgs, config: &Config, json: bool) -> Result<()> {
    let sql = read_sql(args.sql)?;
    let connection = config.connection(Config::db_password()?);
    info!(connection = %connection, "loading field metadata");

    let options = PipelineOptions {
        numeric_policy: config.schema.numeric_policy,
        rewrite: config.rewrite,
    };
    let mapped = rewrite_with_metadata(&connection, &config.schema_names(), &sql, &options).await?;
    print_mapped(&sql, &mapped, json)
}

async fn fields(args: FieldsArgs, config: &Config, json: bool) -> Result<()> {
    let connection = config.connection(Config::db_password()?);
    let names = config.schema_names();
    let source = PgMetadata::connect_lazy(&connection)?;

    let loaded: Result<BTreeMap<String, Vec<String>>> = if args.numeric {
        source
            .numeric_fields(&names.physical_table, &names.payload_column, &names.topic_column)
            .await
            .map(|fields| {
                fields
                    .into_iter()
                    .map(|(topic, set)| (topic, set.into_iter().collect()))
                    .collect()
            })
            .context("load numeric fields failed")
    } else {
        source
            .all_fields(&names.physical_table, &names.payload_column, &names.topic_column)
            .await
            .context("load all fields failed")
    };
    source.close().await;
    let fields = loaded?;

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        for (topic, fields) in &fields {
            println!("{topic}: {}", fields.join(", "));
        }
    }
    Ok(())
}

/// SQL from the argument, or stdin when it is absent or `-`
fn read_sql(sql: Option<String>) -> Result<String> {
    match sql {
        Some(sql) if sql != "-" => Ok(sql),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read SQL from stdin")?;
            Ok(buffer.trim().to_string())
        }
    }
}

fn print_mapped(original: &str, mapped: &str, json: bool) -> Result<()> {
    if json {
        let output = RewriteOutput { original, mapped };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{mapped}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sql_from_argument() {
        assert_eq!(
            read_sql(Some("SELECT a FROM t".to_string())).unwrap(),
            "SELECT a FROM t"
        );
    }

    #[test]
    fn test_output_shape() {
        let output = RewriteOutput {
            original: "SELECT a FROM t",
            mapped: "SELECT (payload ->> 'a') AS a FROM tsdb_table",
        };
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["original"], "SELECT a FROM t");
        assert_eq!(value["mapped"], "SELECT (payload ->> 'a') AS a FROM tsdb_table");
    }
}
