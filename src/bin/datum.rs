//! Avro Datum CLI
//!
//! Decodes and encodes single Avro datums from the shell, resolving schemas
//! the same way a consumer does.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use avro_consumer::{
    ConsumerConfig, Message, MessageHandler, OutboundBody, Properties, AVRO_DATUM_CONTENT_TYPE,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "avro-datum")]
#[command(about = "Decode and encode Avro datums using local or remote schemas")]
struct Cli {
    /// Config file (defaults to avro-consumer.toml and AVRO_CONSUMER__* variables)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory of {type}.avsc schema files
    #[arg(short = 'p', long, conflicts_with = "schema_uri_format")]
    schema_path: Option<PathBuf>,

    /// URI format with a {} slot for the type name
    #[arg(short = 'u', long)]
    schema_uri_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a message body and print it as JSON
    Decode {
        /// Type name of the message (e.g. push.apns.v1)
        #[arg(short, long)]
        r#type: Option<String>,
        /// Content type of the body
        #[arg(long, default_value = AVRO_DATUM_CONTENT_TYPE)]
        content_type: String,
        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Encode a JSON document as an Avro datum
    Encode {
        /// Type name of the message
        #[arg(short, long)]
        r#type: String,
        /// JSON input file (stdin when omitted)
        input: Option<PathBuf>,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a schema and print its fingerprint and canonical form
    Schema {
        /// Type name to resolve
        r#type: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ConsumerConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    // Command-line options replace whichever resolver the config selected
    if let Some(path) = cli.schema_path {
        config.schema_path = Some(path);
        config.schema_uri_format = None;
    } else if let Some(format) = cli.schema_uri_format {
        config.schema_uri_format = Some(format);
        config.schema_path = None;
    }

    let handler = MessageHandler::from_config(&config)?;

    match cli.command {
        Commands::Decode { r#type, content_type, input } => {
            let message = Message {
                content_type: Some(content_type),
                type_name: r#type,
                body: read_input(input.as_ref())?,
                ..Default::default()
            };
            let value = handler.decode(&message).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Commands::Encode { r#type, input, output } => {
            let value: serde_json::Value = serde_json::from_slice(&read_input(input.as_ref())?)
                .context("input is not valid JSON")?;
            let outbound = handler
                .publish("", "", Some(Properties::avro(r#type)), value)
                .await?;

            let OutboundBody::Avro(bytes) = outbound.body else {
                anyhow::bail!("expected an encoded datum");
            };
            match output {
                Some(path) => fs::write(&path, &bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => io::stdout().write_all(&bytes)?,
            }
        }

        Commands::Schema { r#type } => {
            let schema = handler.resolver().resolve(&r#type).await?;
            println!("type:      {}", schema.type_name());
            if let Some(name) = schema.full_name() {
                println!("name:      {}", name);
            }
            println!("sha256:    {}", schema.checksum());
            println!("canonical: {}", schema.canonical_form());
        }
    }

    Ok(())
}

fn read_input(input: Option<&PathBuf>) -> anyhow::Result<Vec<u8>> {
    match input {
        Some(path) => fs::read(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
