use anyhow::{anyhow, Context, Result};
use ca_core::collections::RecordKind;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

mod client;

use client::AdminClient;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8081";

#[derive(Parser)]
#[command(name = "ca", version, about = "Community admin dashboard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the admin HTTP API
    AdminApi,
    /// Check a running admin API
    Health {
        #[command(flatten)]
        api: ApiArgs,
    },
    Records {
        #[command(subcommand)]
        command: RecordsCommand,
    },
    Community {
        #[command(subcommand)]
        command: CommunityCommand,
    },
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Base URL of a running admin API
    #[arg(long, env = "ADMIN_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Pretty-print JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum RecordsCommand {
    List {
        #[command(flatten)]
        api: ApiArgs,
        /// users, posts, news, businesses, resources, resource-content, documents, communities
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        /// Community name or identifier to filter by
        #[arg(long)]
        community: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Get {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        #[arg(long)]
        id: String,
    },
    Create {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        /// Record fields as a JSON object
        #[arg(long)]
        data: String,
    },
    Update {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        #[arg(long)]
        id: String,
        /// Fields to merge as a JSON object
        #[arg(long)]
        data: String,
    },
    Delete {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long, value_parser = parse_kind)]
        kind: RecordKind,
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum CommunityCommand {
    List {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Resolve a display name (any spelling) to the community identity
    Resolve {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        name: String,
    },
    /// Find a community by document id, formatted id or name
    Lookup {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        identifier: String,
    },
    Members {
        #[command(flatten)]
        api: ApiArgs,
        /// Community document id, formatted id or name
        #[arg(long)]
        community: String,
    },
    /// Rewrite every record that refers to the community to its canonical name
    Associate {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        name: String,
        /// Also assign users that have no community
        #[arg(long, default_value_t = false)]
        include_unaffiliated: bool,
    },
}

#[derive(Subcommand)]
enum DocumentsCommand {
    List {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        community: Option<String>,
    },
    Upload {
        #[command(flatten)]
        api: ApiArgs,
        /// File to upload
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        community: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        /// Extra metadata as key=value (repeatable)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },
    Download {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        id: String,
        /// Destination file
        #[arg(long)]
        output: PathBuf,
    },
    Delete {
        #[command(flatten)]
        api: ApiArgs,
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::AdminApi => {
            let config = ca_admin_api::load_config()?;
            ca_admin_api::run(config).await?;
        }
        Commands::Health { api } => {
            let output = connect(&api)?.health().await?;
            print_json(&output, api.pretty)?;
        }
        Commands::Records { command } => {
            ca_core::logging::init("ca-cli");
            run_records(command).await?;
        }
        Commands::Community { command } => {
            ca_core::logging::init("ca-cli");
            run_community(command).await?;
        }
        Commands::Documents { command } => {
            ca_core::logging::init("ca-cli");
            run_documents(command).await?;
        }
    }

    Ok(())
}

async fn run_records(command: RecordsCommand) -> Result<()> {
    match command {
        RecordsCommand::List {
            api,
            kind,
            community,
            limit,
        } => {
            let output = connect(&api)?
                .list_records(kind, community.as_deref(), limit)
                .await?;
            print_json(&output, api.pretty)
        }
        RecordsCommand::Get { api, kind, id } => {
            let output = connect(&api)?.get_record(kind, &id).await?;
            print_json(&output, api.pretty)
        }
        RecordsCommand::Create { api, kind, data } => {
            let fields = parse_object(&data)?;
            let output = connect(&api)?.create_record(kind, &fields).await?;
            print_json(&output, api.pretty)
        }
        RecordsCommand::Update {
            api,
            kind,
            id,
            data,
        } => {
            let fields = parse_object(&data)?;
            let output = connect(&api)?.update_record(kind, &id, &fields).await?;
            print_json(&output, api.pretty)
        }
        RecordsCommand::Delete { api, kind, id } => {
            let output = connect(&api)?.delete_record(kind, &id).await?;
            print_json(&output, api.pretty)
        }
    }
}

async fn run_community(command: CommunityCommand) -> Result<()> {
    match command {
        CommunityCommand::List { api } => {
            let output = connect(&api)?
                .list_records(RecordKind::Communities, None, None)
                .await?;
            print_json(&output, api.pretty)
        }
        CommunityCommand::Resolve { api, name } => {
            let output = connect(&api)?.resolve_community(&name).await?;
            print_json(&output, api.pretty)
        }
        CommunityCommand::Lookup { api, identifier } => {
            let output = connect(&api)?.lookup_community(&identifier).await?;
            print_json(&output, api.pretty)
        }
        CommunityCommand::Members { api, community } => {
            let output = connect(&api)?.community_members(&community).await?;
            print_json(&output, api.pretty)
        }
        CommunityCommand::Associate {
            api,
            name,
            include_unaffiliated,
        } => {
            let output = connect(&api)?
                .associate_community(&name, include_unaffiliated)
                .await?;
            tracing::debug!(community = %name, "association sweep requested");
            print_json(&output, api.pretty)
        }
    }
}

async fn run_documents(command: DocumentsCommand) -> Result<()> {
    match command {
        DocumentsCommand::List { api, community } => {
            let output = connect(&api)?
                .list_records(RecordKind::Documents, community.as_deref(), None)
                .await?;
            print_json(&output, api.pretty)
        }
        DocumentsCommand::Upload {
            api,
            file,
            title,
            community,
            content_type,
            mut fields,
        } => {
            if let Some(title) = title {
                fields.push(("title".to_string(), title));
            }
            if let Some(community) = community {
                fields.push(("community".to_string(), community));
            }
            let output = connect(&api)?
                .upload_document(&file, content_type.as_deref(), &fields)
                .await
                .with_context(|| format!("upload {}", file.display()))?;
            print_json(&output, api.pretty)
        }
        DocumentsCommand::Download { api, id, output } => {
            let download = connect(&api)?
                .download_document(&id, &output)
                .await
                .with_context(|| format!("download document {id}"))?;
            let summary = serde_json::json!({
                "id": id,
                "path": output.display().to_string(),
                "content_type": download.content_type,
                "bytes": download.bytes_written
            });
            print_json(&summary, api.pretty)
        }
        DocumentsCommand::Delete { api, id } => {
            let output = connect(&api)?
                .delete_record(RecordKind::Documents, &id)
                .await?;
            print_json(&output, api.pretty)
        }
    }
}

fn connect(api: &ApiArgs) -> Result<AdminClient> {
    Ok(AdminClient::new(&api.api_url)?)
}

fn print_json(output: &Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };
    println!("{rendered}");
    Ok(())
}

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--data must be valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("--data must be a JSON object"));
    }
    Ok(value)
}

fn parse_kind(raw: &str) -> Result<RecordKind, String> {
    RecordKind::from_route_segment(raw.trim()).ok_or_else(|| format!("unknown record kind: {raw}"))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {raw}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn kind_parser_accepts_route_segments() {
        assert_eq!(
            parse_kind("resource-content"),
            Ok(RecordKind::ResourceContent)
        );
        assert!(parse_kind("resourceContent").is_err());
    }

    #[test]
    fn key_value_parser_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("description=a=b"),
            Ok(("description".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn parse_object_rejects_arrays() {
        assert!(parse_object("[1]").is_err());
        assert!(parse_object(r#"{"title":"x"}"#).is_ok());
    }

    #[test]
    fn associate_flag_defaults_off() {
        let cli = Cli::try_parse_from(["ca", "community", "associate", "--name", "Eskasoni"])
            .expect("parse");
        match cli.command {
            Commands::Community {
                command:
                    CommunityCommand::Associate {
                        include_unaffiliated,
                        api,
                        ..
                    },
            } => {
                assert!(!include_unaffiliated);
                assert!(!api.api_url.is_empty());
            }
            _ => panic!("unexpected command"),
        }
    }
}
