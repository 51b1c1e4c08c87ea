use anyhow::Result;
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;

use formdrop_cli::{init_tracing, render_table, upload_outcome};
use formdrop_core::Config;
use formdrop_engine::{ContentTypeMode, Engine, EngineOptions};
use formdrop_storage::create_client;

#[derive(Parser, Debug)]
#[command(name = "upload_file")]
#[command(about = "Stream local files into object storage the way form uploads are stored")]
struct Args {
    /// Files to upload
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Bucket (overrides S3_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Content type, or "auto" to sniff it (overrides FORMDROP_CONTENT_TYPE)
    #[arg(long)]
    content_type: Option<String>,

    /// Form field name reported for each file
    #[arg(long, default_value = "file")]
    field: String,

    /// Number of files uploaded at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env()?;
    let client = create_client(&config).await?;

    let mut options = EngineOptions::from_config(&config).client(client);
    if let Some(bucket) = args.bucket {
        options = options.bucket(bucket);
    }
    if let Some(content_type) = args.content_type {
        options = options.content_type(ContentTypeMode::parse(content_type));
    }
    let engine = Engine::new(options)?;

    tracing::info!(
        files = args.paths.len(),
        bucket = %engine.bucket(),
        concurrency = args.concurrency,
        "Uploading files"
    );

    let outcomes: Vec<_> = stream::iter(args.paths.iter())
        .map(|path| upload_outcome(&engine, path, &args.field))
        .buffered(args.concurrency.max(1))
        .collect()
        .await;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        _ => {
            print!("{}", render_table(&outcomes));
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, outcomes.len());
    }

    Ok(())
}
