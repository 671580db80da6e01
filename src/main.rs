use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use prodscribe::{
    CompletionService, FailurePolicy, MockCompletionService, OpenAiClient, OpenAiConfig, Pipeline,
    PipelineConfig, ReadConfig, RenderConfig, RetryConfig, read_product_table,
    template::starter_template,
};

#[derive(Parser)]
#[command(name = "prodscribe")]
#[command(author, version, about = "Generate product marketing copy into a Word document", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate copy for every product and render the document
    Generate {
        /// Input product table (needs `name` and `url` columns)
        #[arg(short, long, default_value = "products.csv")]
        input: PathBuf,

        /// DOCX template with a {#products}...{/products} section
        #[arg(short, long, default_value = "template.docx")]
        template: PathBuf,

        /// Directory for the rendered document
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Field delimiter of the input table
        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,

        /// Maximum number of products processed at once
        #[arg(short, long, default_value = "5")]
        concurrency: usize,

        /// Retries per completion call after the first attempt
        #[arg(long, default_value = "0")]
        max_retries: u32,

        /// Delay before the first retry in milliseconds (doubles per retry)
        #[arg(long, default_value = "500")]
        retry_backoff_ms: u64,

        /// Render the products that succeeded instead of aborting on the first failure
        #[arg(long)]
        skip_failed: bool,

        /// Use canned responses instead of calling the API
        #[arg(long)]
        dry_run: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Summarize a product table without calling the API
    Inspect {
        /// Input product table
        #[arg(short, long, default_value = "products.csv")]
        input: PathBuf,

        /// Field delimiter of the input table
        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a starter DOCX template
    InitTemplate {
        /// Where to write the template
        #[arg(short, long, default_value = "template.docx")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            template,
            output_dir,
            delimiter,
            concurrency,
            max_retries,
            retry_backoff_ms,
            skip_failed,
            dry_run,
            verbose,
        } => {
            setup_logging(verbose);
            let config = PipelineConfig {
                read: ReadConfig {
                    input_path: input,
                    delimiter,
                },
                render: RenderConfig {
                    template_path: template,
                    output_dir,
                },
                concurrency,
                retry: RetryConfig {
                    max_retries,
                    backoff_ms: retry_backoff_ms,
                },
                failure_policy: if skip_failed {
                    FailurePolicy::SkipFailed
                } else {
                    FailurePolicy::FailFast
                },
            };
            generate(config, dry_run).await
        }
        Commands::Inspect {
            input,
            delimiter,
            verbose,
        } => {
            setup_logging(verbose);
            inspect(input, delimiter)
        }
        Commands::InitTemplate { path, force } => {
            setup_logging(false);
            init_template(path, force)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got {:?}", s)),
        },
    }
}

async fn generate(config: PipelineConfig, dry_run: bool) -> Result<()> {
    let client: Box<dyn CompletionService> = if dry_run {
        info!("Dry run: using canned responses");
        Box::new(MockCompletionService::new(
            "Sample product description.",
            "Sample product copy.\nReplace this run with a real one to get generated content.",
        ))
    } else {
        let api_config = OpenAiConfig::from_env().context("Failed to configure the API client")?;
        let client = OpenAiClient::new(api_config)?;
        info!("Using model {}", client.model());
        Box::new(client)
    };

    let mut pipeline = Pipeline::new(&config, client.as_ref());
    let report = pipeline.run().await.context("Pipeline failed")?;

    info!("Output written to {:?}", report.output_path);
    if !report.skipped.is_empty() {
        warn!(
            "{} of {} products skipped",
            report.skipped.len(),
            report.total
        );
    }
    info!(
        "Complete: {}/{} products generated in {:.1}s",
        report.generated,
        report.total,
        report.elapsed.as_secs_f64()
    );

    Ok(())
}

fn inspect(input: PathBuf, delimiter: u8) -> Result<()> {
    info!("Inspecting product table {:?}", input);
    let table = read_product_table(&input, delimiter).context("Failed to read product table")?;

    println!("Product Table");
    println!("=============");
    println!("File: {}", input.display());
    println!("Columns: {}", table.columns.join(", "));
    println!("Products: {}", table.records.len());
    println!("With existing description: {}", table.described_count());
    println!();

    for (i, record) in table.records.iter().enumerate() {
        println!("{:>4}. {} <{}>", i + 1, record.name, record.source_url);
    }

    Ok(())
}

fn init_template(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let bytes = starter_template().context("Failed to build starter template")?;
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Starter template written to {:?}", path);

    Ok(())
}
