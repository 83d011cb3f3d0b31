//! # `hpetl` Library Crate
//!
//! Command-line surface of the pipeline. Each subcommand resolves its paths
//! and settings from `EtlConfig`, lets explicit flags override them, and hands
//! off to the stage crates.

pub mod pipeline;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hpetl::constants::CHARACTERS_COLLECTION;
use hpetl::store::pipeline_collections;
use hpetl::{get_config, Character, DocumentStore, EtlConfig, Stage, StageReport, ValidationPolicy};
use hpetl_extract::{ApiExtractor, ApiSource, ExtractStage};
use hpetl_load::{drop_collections, load_snapshot, setup_store, LoadOptions, MongoStore};
use hpetl_transform::{CharacterTransformer, TransformStage};
use pipeline::{run_pipeline, PipelinePlan, PipelineReport};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// --- CLI Argument Structs ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file. Defaults to `hpetl.yml` when present.
    #[arg(long, global = true, env = "HPETL_CONFIG")]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every character from the API into the raw snapshot
    Extract(ExtractArgs),
    /// Validate and normalize the raw snapshot into the transformed snapshot
    Transform(TransformArgs),
    /// Create the MongoDB collections and indexes (or drop them)
    Setup(SetupArgs),
    /// Upsert the transformed snapshot into MongoDB
    Load(LoadArgs),
    /// Run extract, transform, setup and load in one go
    Run(RunArgs),
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Base URL of the API.
    #[arg(long)]
    pub base_url: Option<String>,
    /// Resource path under the base URL.
    #[arg(long)]
    pub resource: Option<String>,
    /// Page size to request when the API paginates.
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Where to write the raw snapshot.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct TransformArgs {
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// What to do with a record that fails validation.
    #[arg(long)]
    pub policy: Option<ValidationPolicy>,
}

#[derive(Parser, Debug)]
pub struct SetupArgs {
    /// Drop the pipeline's collections instead of creating them.
    #[arg(long)]
    pub drop: bool,
    /// Skip the confirmation prompt for `--drop`.
    #[arg(long, requires = "drop")]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct LoadArgs {
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Delete existing documents before loading.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Stop after transform; MongoDB is never contacted.
    #[arg(long, conflicts_with = "replace")]
    pub skip_load: bool,
    #[arg(long)]
    pub replace: bool,
    #[arg(long)]
    pub policy: Option<ValidationPolicy>,
}

// --- Public Entrypoint ---

pub async fn run(cli: Cli) -> Result<()> {
    let config = get_config(cli.config.as_deref()).context("Failed to load configuration")?;
    info!("Data directory: {}", config.data_dir.display());

    match cli.command {
        Commands::Extract(args) => handle_extract(&config, args).await,
        Commands::Transform(args) => handle_transform(&config, args).await,
        Commands::Setup(args) => handle_setup(&config, args).await,
        Commands::Load(args) => handle_load(&config, args).await,
        Commands::Run(args) => handle_run(&config, args).await,
    }
}

// --- Stage Construction ---

fn extract_stage(config: &EtlConfig, args: ExtractArgs) -> Result<ExtractStage> {
    let base_url = args.base_url.unwrap_or_else(|| config.api_base_url.clone());
    let resource = args.resource.unwrap_or_else(|| config.api_resource.clone());
    let source = ApiSource::new(&base_url, &resource)
        .with_page_size(args.page_size.or(config.page_size))
        .with_request_delay(Duration::from_millis(config.request_delay_ms));

    Ok(ExtractStage {
        extractor: ApiExtractor::new(config.retry.clone())?,
        source,
        output: args.output.unwrap_or_else(|| config.raw_snapshot_path()),
    })
}

fn transform_stage(config: &EtlConfig, args: TransformArgs) -> TransformStage {
    TransformStage {
        transformer: CharacterTransformer::new(args.policy.unwrap_or(config.validation_policy)),
        input: args.input.unwrap_or_else(|| config.raw_snapshot_path()),
        output: args.output.unwrap_or_else(|| config.transformed_snapshot_path()),
    }
}

async fn connect(config: &EtlConfig) -> Result<MongoStore, hpetl::EtlError> {
    MongoStore::connect(&config.mongo_connection, &config.mongo_database, &config.retry).await
}

// --- Command Handlers ---

async fn handle_extract(config: &EtlConfig, args: ExtractArgs) -> Result<()> {
    let stage = extract_stage(config, args)?;
    println!("🔎 Extracting from '{}'...", stage.source.base_url);

    let report = stage.run().await.context("Extract failed")?;
    print_report(&report);
    Ok(())
}

async fn handle_transform(config: &EtlConfig, args: TransformArgs) -> Result<()> {
    let stage = transform_stage(config, args);
    println!(
        "🔧 Transforming '{}' (policy: {})...",
        stage.input.display(),
        stage.transformer.policy()
    );

    let report = stage.run().await.context("Transform failed")?;
    print_report(&report);
    Ok(())
}

async fn handle_setup(config: &EtlConfig, args: SetupArgs) -> Result<()> {
    let specs = pipeline_collections();

    if args.drop {
        if !args.yes && !confirm("Drop all pipeline collections? (yes/no): ")? {
            println!("Aborted; nothing was dropped.");
            return Ok(());
        }
        let store = connect(config).await.context("Setup failed")?;
        let dropped = drop_collections(&store, &specs).await;
        store.close().await;
        let dropped = dropped.context("Drop failed")?;
        println!("🗑️  Dropped collections: {}", display_list(&dropped));
        return Ok(());
    }

    let store = connect(config).await.context("Setup failed")?;
    let report = setup_store(&store, &specs).await;
    store.close().await;
    let report = report.context("Setup failed")?;
    println!(
        "✅ Setup complete on '{}'. Collections created: {}. Indexes created: {}.",
        config.mongo_database,
        display_list(&report.collections_created),
        display_list(&report.indexes_created)
    );
    Ok(())
}

async fn handle_load(config: &EtlConfig, args: LoadArgs) -> Result<()> {
    let input = args.input.unwrap_or_else(|| config.transformed_snapshot_path());
    let options = LoadOptions {
        replace: args.replace,
        retry: config.retry.clone(),
        ..Default::default()
    };

    // A missing snapshot must fail before any connection attempt.
    hpetl::snapshot::ensure_input(&input).context("Load failed")?;
    let store = connect(config).await.context("Load failed")?;
    let report = load_snapshot(&store, &input, &options).await;
    store.close().await;
    print_report(&report.context("Load failed")?);
    Ok(())
}

async fn handle_run(config: &EtlConfig, args: RunArgs) -> Result<()> {
    let plan = PipelinePlan {
        extract: extract_stage(
            config,
            ExtractArgs {
                base_url: None,
                resource: None,
                page_size: None,
                output: None,
            },
        )?,
        transform: transform_stage(
            config,
            TransformArgs {
                input: None,
                output: None,
                policy: args.policy,
            },
        ),
        collections: pipeline_collections(),
        load: (!args.skip_load).then(|| LoadOptions {
            replace: args.replace,
            retry: config.retry.clone(),
            ..Default::default()
        }),
    };

    println!("🚀 Running the full pipeline...");
    let store_config = config.clone();
    let report = run_pipeline(plan, async move {
        let store = connect(&store_config).await?;
        Ok(Arc::new(store) as Arc<dyn DocumentStore>)
    })
    .await
    .context("Pipeline failed")?;

    print_pipeline_report(&report);
    Ok(())
}

// --- Output Helpers ---

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        bail!("no confirmation received; pass --yes to drop non-interactively");
    }
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn print_report(report: &StageReport) {
    println!(
        "✅ {}: {} read, {} written, {} skipped ({} -> {})",
        report.stage,
        report.records_read,
        report.records_written,
        report.records_skipped,
        report.source,
        report.destination
    );
    if let Some(counts) = &report.load {
        println!(
            "   {} inserted, {} updated, {} unchanged, {} failed",
            counts.inserted, counts.updated, counts.unchanged, counts.failed
        );
    }
}

fn print_pipeline_report(report: &PipelineReport) {
    print_report(&report.extract);
    print_report(&report.transform);
    if let Some(setup) = &report.setup {
        println!(
            "✅ setup: collections created: {}, indexes created: {}",
            display_list(&setup.collections_created),
            display_list(&setup.indexes_created)
        );
    }
    match &report.load {
        Some(load) => print_report(load),
        None => println!("⏭️  load skipped"),
    }

    if let Ok(characters) =
        hpetl::snapshot::read_snapshot::<Character>(std::path::Path::new(&report.transform.destination))
    {
        if let Some(character) = characters.first() {
            print_sample(character);
        }
    }
}

fn print_sample(character: &Character) {
    println!("\n--- Sample {} document ---", CHARACTERS_COLLECTION);
    println!("ID: {}", character.id);
    println!("Name: {}", character.name);
    println!("House: {}", character.house.as_deref().unwrap_or("-"));
    println!(
        "Year of birth: {}",
        character
            .year_of_birth
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Ancestry: {}", character.ancestry.as_deref().unwrap_or("-"));
    println!(
        "Wand: wood {}, core {}, length {}",
        character.wand.wood.as_deref().unwrap_or("-"),
        character.wand.core.as_deref().unwrap_or("-"),
        character
            .wand
            .length
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}
