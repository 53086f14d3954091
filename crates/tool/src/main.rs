use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use xfer_config::XferConfig;
use xfer_tool::{decode_entity, decode_frames, render, unmasked, OutputFormat, Selector};

#[derive(Parser)]
#[command(
    name = "xferdump",
    version,
    about = "Decode entity snapshots and chunked-transfer captures"
)]
struct Cli {
    /// Directory holding xferoptions.txt and objecttypes.txt.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Json, global = true)]
    format: Format,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode one entity snapshot.
    Entity {
        /// Path to the snapshot bytes.
        file: PathBuf,
        #[command(flatten)]
        selector: SelectorArgs,
    },
    /// Decode a capture of back-to-back chunked-transfer frames.
    Frames {
        /// Path to the capture bytes.
        file: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SelectorArgs {
    /// Type tag of the top-level entity.
    #[arg(long)]
    tag: Option<String>,
    /// Object type name, resolved through the object-type table.
    #[arg(long)]
    object_type: Option<String>,
    /// Object type ID, resolved through the object-type table.
    #[arg(long)]
    object_id: Option<u16>,
}

impl SelectorArgs {
    fn into_selector(self) -> Option<Selector> {
        self.tag
            .map(Selector::Tag)
            .or(self.object_type.map(Selector::ObjectType))
            .or(self.object_id.map(Selector::ObjectId))
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Pretty,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => OutputFormat::Json,
            Format::Pretty => OutputFormat::Pretty,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(dir) => XferConfig::load_from_dir(dir)
            .with_context(|| format!("load config from {}", dir.display()))?,
        None => XferConfig::default(),
    };
    init_tracing(&config.log_level);
    config.display();

    let format = OutputFormat::from(cli.format);
    match cli.command {
        Command::Entity { file, selector } => {
            let selector = selector
                .into_selector()
                .context("one of --tag, --object-type or --object-id is required")?;
            let data = read_input(&file, &config)?;

            match decode_entity(&data, &selector, &config) {
                Ok(entity) => println!("{}", render(&entity, format)?),
                Err(err) => {
                    let (kind, partial) = err.into_parts();
                    if let Some(partial) = partial {
                        println!("{}", render(&partial, format)?);
                    }
                    return Err(kind)
                        .with_context(|| format!("decode entity {}", file.display()));
                }
            }
        }
        Command::Frames { file } => {
            let data = read_input(&file, &config)?;
            let (frames, err) = decode_frames(&data);

            for frame in &frames {
                println!("{}", render(frame, format)?);
            }
            tracing::info!("Decoded {} frames", frames.len());
            if let Some(err) = err {
                return Err(err).with_context(|| {
                    format!("decode frame {} of {}", frames.len() + 1, file.display())
                });
            }
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: &Path, config: &XferConfig) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(unmasked(&data, config))
}
