//! Table commands: provision, replace, append, show, list, check
//!
//! Each command opens the configured database, runs one engine operation and
//! prints the result as a table or, with `--json`, as JSON.

use crate::cli::config::{resolve_db_path, Config};
use crate::cli::error::{exit_code_for, HelpfulError};
use crate::cli::output;
use anyhow::Context;
use clap::Args;
use dyntables_db::{DbConfig, DbConnection};
use dyntables_schema::{ErrorKind, FieldSpec, SchemaEngine, TableId};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Field list of a request, as repeated `--field` flags or one JSON document.
#[derive(Debug, Args)]
pub struct FieldArgs {
    /// Field as NAME:TYPE (type is string, number or boolean); repeatable
    #[arg(short = 'f', long = "field", value_name = "NAME:TYPE")]
    pub fields: Vec<FieldSpec>,

    /// Fields as JSON: `[{"name": .., "type": ..}]` or `{"fields": [..]}`
    #[arg(long, value_name = "JSON", conflicts_with = "fields")]
    pub fields_json: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldsPayload {
    List(Vec<FieldSpec>),
    Wrapped { fields: Vec<FieldSpec> },
}

impl FieldArgs {
    pub fn specs(&self) -> anyhow::Result<Vec<FieldSpec>> {
        match &self.fields_json {
            Some(text) => parse_fields_json(text),
            None => Ok(self.fields.clone()),
        }
    }
}

pub fn parse_fields_json(text: &str) -> anyhow::Result<Vec<FieldSpec>> {
    let payload: FieldsPayload = serde_json::from_str(text).map_err(|e| {
        let mut err = HelpfulError::new("Could not parse --fields-json")
            .with_context(e.to_string())
            .with_suggestion(r#"TRY: --fields-json '[{"name": "email", "type": "string"}]'"#);
        err.kind = Some(ErrorKind::Validation);
        err
    })?;
    Ok(match payload {
        FieldsPayload::List(fields) => fields,
        FieldsPayload::Wrapped { fields } => fields,
    })
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Name of the new table
    pub table: String,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ChangeArgs {
    /// Catalog id of the table
    pub id: TableId,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Catalog id of the table
    pub id: TableId,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug)]
pub enum TableCommand {
    Provision(ProvisionArgs),
    Replace(ChangeArgs),
    Append(ChangeArgs),
    Show(IdArgs),
    List(ListArgs),
    Check(IdArgs),
}

/// Run a table command; returns the exit code on success.
pub fn run(command: TableCommand, db_flag: Option<&Path>) -> anyhow::Result<u8> {
    let config = Config::load()?;
    let (db_path, source) = resolve_db_path(db_flag, &config);
    debug!(path = %db_path.display(), source = source.as_str(), "Resolved database path");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let engine = open_engine(&db_path, config.database.max_connections).await?;
        let code = run_async(command, &engine).await;
        engine.connection().clone().close().await;
        code
    })
}

async fn open_engine(db_path: &Path, max_connections: u32) -> anyhow::Result<SchemaEngine> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let db_config = DbConfig::sqlite(db_path).with_max_connections(max_connections);
    let conn = DbConnection::open_with(&db_config)
        .await
        .map_err(|e| HelpfulError::database_open_failed(db_path, e))?;

    let engine = SchemaEngine::new(conn)
        .await
        .map_err(|e| HelpfulError::database_open_failed(db_path, e))?;
    Ok(engine)
}

async fn run_async(command: TableCommand, engine: &SchemaEngine) -> anyhow::Result<u8> {
    match command {
        TableCommand::Provision(args) => {
            let specs = args.fields.specs()?;
            let record = engine
                .provision(&args.table, &specs)
                .await
                .map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&record)?;
            } else {
                println!("Table created.");
                output::print_record(&record);
            }
        }
        TableCommand::Replace(args) => {
            let specs = args.fields.specs()?;
            let record = engine
                .replace_schema(args.id, &specs)
                .await
                .map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&record)?;
            } else {
                println!("Table structure replaced. Existing rows were discarded.");
                output::print_record(&record);
            }
        }
        TableCommand::Append(args) => {
            let specs = args.fields.specs()?;
            let record = engine
                .append_fields(args.id, &specs)
                .await
                .map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&record)?;
            } else {
                println!("Table updated.");
                output::print_record(&record);
            }
        }
        TableCommand::Show(args) => {
            let fields = engine
                .read_schema(args.id)
                .await
                .map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&fields)?;
            } else {
                println!("{}", output::fields_table(&fields));
            }
        }
        TableCommand::List(args) => {
            let records = engine.list_tables().await.map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&records)?;
            } else {
                output::print_records(&records);
            }
        }
        TableCommand::Check(args) => {
            let report = engine
                .check_consistency(args.id)
                .await
                .map_err(HelpfulError::from)?;
            if args.json {
                output::print_json(&report)?;
            } else {
                output::print_consistency(&report);
            }
            if !report.is_consistent() {
                return Ok(exit_code_for(ErrorKind::Inconsistent));
            }
        }
    }
    Ok(0)
}
