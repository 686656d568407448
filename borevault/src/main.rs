// borevault/src/main.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "borevault")]
#[command(about = "Immutable, versioned Parquet storage for geotechnical borelog records", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🗂️ Inspect and transition versioned records
    Records {
        #[command(subcommand)]
        command: RecordsCommands,
    },

    /// 📥 Bulk-ingest a CSV file into a versioned record
    Ingest {
        /// CSV file to ingest
        file: PathBuf,

        /// Schema-registry table to validate against
        #[arg(long)]
        table: String,

        #[arg(long)]
        project_id: String,

        /// Entity type segment of the record address (e.g. "borelog")
        #[arg(long, default_value = "borelog")]
        entity_type: String,

        #[arg(long)]
        entity_id: String,

        /// User recorded in the version history
        #[arg(long)]
        user: String,

        /// Optional history comment (defaults to the bulk-upload summary)
        #[arg(long)]
        comment: Option<String>,

        /// Abort at the first invalid row instead of collecting errors
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// 🔬 Parse a borelog CSV/XLSX document and print strata + depth index
    Parse {
        /// Document to parse (.csv, .xlsx)
        file: PathBuf,
    },

    /// ⚙️ Run the upload parse worker against the configured store
    Worker {
        /// JSON event payload (direct or batched queue shape)
        event: String,
    },

    /// 📨 Feed a JSON request event through the dispatcher
    Dispatch {
        /// JSON request event
        event: String,
    },
}

#[derive(Subcommand)]
enum RecordsCommands {
    /// List entities of a type in a project
    List {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value = "borelog")]
        entity_type: String,
        /// Filter by status (draft, approved, rejected)
        #[arg(long)]
        status: Option<String>,
    },

    /// Show the latest (or a specific) version of an entity
    Get {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value = "borelog")]
        entity_type: String,
        #[arg(long)]
        entity_id: String,
        #[arg(long)]
        version: Option<u32>,
    },

    /// Show the append-only history of an entity
    History {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value = "borelog")]
        entity_type: String,
        #[arg(long)]
        entity_id: String,
    },

    /// Approve the current draft version
    Approve {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value = "borelog")]
        entity_type: String,
        #[arg(long)]
        entity_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Reject the current draft version
    Reject {
        #[arg(long)]
        project_id: String,
        #[arg(long, default_value = "borelog")]
        entity_type: String,
        #[arg(long)]
        entity_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug borevault ... for the details
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Records { command } => match command {
            RecordsCommands::List {
                project_id,
                entity_type,
                status,
            } => commands::records::list(&project_id, &entity_type, status.as_deref()).await,
            RecordsCommands::Get {
                project_id,
                entity_type,
                entity_id,
                version,
            } => commands::records::get(&project_id, &entity_type, &entity_id, version).await,
            RecordsCommands::History {
                project_id,
                entity_type,
                entity_id,
            } => commands::records::history(&project_id, &entity_type, &entity_id).await,
            RecordsCommands::Approve {
                project_id,
                entity_type,
                entity_id,
                user,
                comment,
            } => {
                commands::records::approve(
                    &project_id,
                    &entity_type,
                    &entity_id,
                    &user,
                    comment.as_deref(),
                )
                .await
            }
            RecordsCommands::Reject {
                project_id,
                entity_type,
                entity_id,
                user,
                comment,
            } => {
                commands::records::reject(
                    &project_id,
                    &entity_type,
                    &entity_id,
                    &user,
                    comment.as_deref(),
                )
                .await
            }
        },

        Commands::Ingest {
            file,
            table,
            project_id,
            entity_type,
            entity_id,
            user,
            comment,
            strict,
        } => {
            commands::ingest::run(
                &file,
                &table,
                &project_id,
                &entity_type,
                &entity_id,
                &user,
                comment.as_deref(),
                strict,
            )
            .await
        }

        Commands::Parse { file } => commands::parse::run(&file),

        Commands::Worker { event } => commands::worker::run(&event).await,

        Commands::Dispatch { event } => commands::dispatch::run(&event).await,
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_records_list_defaults() {
        let args = Cli::parse_from(["borevault", "records", "list", "--project-id", "p1"]);
        match args.command {
            Commands::Records {
                command:
                    RecordsCommands::List {
                        project_id,
                        entity_type,
                        status,
                    },
            } => {
                assert_eq!(project_id, "p1");
                assert_eq!(entity_type, "borelog");
                assert_eq!(status, None);
            }
            _ => panic!("Expected records list"),
        }
    }

    #[test]
    fn test_cli_parse_ingest() {
        let args = Cli::parse_from([
            "borevault",
            "ingest",
            "rows.csv",
            "--table",
            "borelog_versions",
            "--project-id",
            "p1",
            "--entity-id",
            "bh-1",
            "--user",
            "u1",
            "--strict",
        ]);
        match args.command {
            Commands::Ingest { table, strict, .. } => {
                assert_eq!(table, "borelog_versions");
                assert!(strict);
            }
            _ => panic!("Expected ingest"),
        }
    }
}
