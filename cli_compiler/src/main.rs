use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crowd_config::{
    load_settings_from_env, CompiledDocument, Compiler, CompilerSettings, SimulationDescription,
    SvgIngestor,
};
use crowd_schema::{decode_document, DecodedDocument, EndTime, Record};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Crowd simulation parameter compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a description into a binary parameter document
    Compile {
        /// Path to the JSON simulation description
        description: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Compiler settings JSON (defaults to CROWD_COMPILER_SETTINGS_PATH or builtin)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Compile without writing; report record count and digest
    Check {
        description: PathBuf,
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Decode a compiled document and print its records
    Inspect {
        document: PathBuf,
        /// Emit JSON instead of one line per record
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile {
            description,
            output,
            settings,
        } => {
            let compiled = compile_file(&description, settings.as_deref())?;
            match output {
                Some(path) => {
                    fs::write(&path, &compiled.bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(
                        path = %path.display(),
                        bytes = compiled.bytes.len(),
                        digest = %format_args!("{:016x}", compiled.digest),
                        "document.written"
                    );
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout
                        .write_all(&compiled.bytes)
                        .with_context(|| "Failed to write document to stdout")?;
                    stdout.flush()?;
                }
            }
        }
        Command::Check {
            description,
            settings,
        } => {
            let compiled = compile_file(&description, settings.as_deref())?;
            println!(
                "{}: {} records, {} bytes, digest {:016x}",
                description.display(),
                compiled.record_count,
                compiled.bytes.len(),
                compiled.digest
            );
        }
        Command::Inspect { document, json } => {
            let bytes = fs::read(&document)
                .with_context(|| format!("Failed to read {}", document.display()))?;
            let decoded = decode_document(&bytes)
                .with_context(|| format!("Failed to decode {}", document.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&decoded)?);
            } else {
                print_document(&decoded);
            }
        }
    }

    Ok(())
}

fn compile_file(path: &Path, settings_path: Option<&Path>) -> Result<CompiledDocument> {
    let settings = match settings_path {
        Some(path) => Arc::new(
            CompilerSettings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        ),
        None => load_settings_from_env().0,
    };
    let description = SimulationDescription::from_file(path)
        .with_context(|| format!("Failed to load description {}", path.display()))?;
    let ingestor = SvgIngestor;
    Compiler::new(&ingestor)
        .with_settings(settings)
        .compile(&description)
        .with_context(|| format!("Failed to compile {}", path.display()))
}

fn print_document(document: &DecodedDocument) {
    println!("type {}", document.simulation_type.name());
    for record in &document.records {
        println!("{}", describe(record));
    }
}

fn describe(record: &Record) -> String {
    match record {
        Record::Geometry(geometry) => format!("scene.{} {:?}", geometry.tag.as_str(), geometry.values),
        Record::SceneFile { name } => format!("scene.file {name:?}"),
        Record::SceneScale { scale } => format!("scene.scale {scale}"),
        Record::EndTime {
            end_time: EndTime::Infinite,
        } => "time.end_time infinite".to_string(),
        Record::EndTime {
            end_time: EndTime::Finite(seconds),
        } => format!("time.end_time {seconds}s"),
        Record::Tick { tick } => format!("time.tick {tick}"),
        Record::SpawnRate { rate } => format!("spawn.rate {rate}"),
        Record::Distribution {
            section,
            element,
            value,
        } => {
            let (first, second) = value.parameters();
            format!(
                "{}[{element:#06x}] {} {first} {second}",
                section.name(),
                value.kind().name()
            )
        }
        Record::DensityMapEnabled { enabled } => format!("density_map.enabled {enabled}"),
        Record::DensityMapMinThreshold { threshold } => {
            format!("density_map.min_threshold {threshold}")
        }
        Record::DensityMapMaxThreshold { threshold } => {
            format!("density_map.max_threshold {threshold}")
        }
    }
}
