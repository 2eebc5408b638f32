use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dryercount::pipeline::build_report;
use dryercount::{HistoryStore, PipelineContext, ReportGenerator, Settings, YoloConfig, YoloDetector};

#[derive(Parser)]
#[command(name = "dryercount")]
#[command(about = "Count hair dryers in workspace photos and report on past runs")]
#[command(version)]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Detection model weights (.rten)
    #[arg(long, global = true, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Class id to count, in the model's label taxonomy
    #[arg(long, global = true)]
    target_class: Option<u32>,

    /// Directory for the input, annotated and report artifacts
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// History log file
    #[arg(long, global = true, value_name = "FILE")]
    history: Option<PathBuf>,

    /// Unicode TTF font for the report
    #[arg(long, global = true, value_name = "FILE")]
    font: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and count the target class in one image
    Process {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,
    },

    /// Render the history log into a PDF report
    Report,

    /// Print the history log
    History,

    /// Serve the HTTP interface
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(model) = &self.model {
            settings.model_path = model.clone();
        }
        if let Some(target) = self.target_class {
            settings.target_class_id = target;
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(history) = &self.history {
            settings.history_path = history.clone();
        }
        if let Some(font) = &self.font {
            settings.font_path = font.clone();
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            settings.bind = bind.clone();
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Load the model once; the process cannot serve requests without it.
fn load_context(settings: Settings) -> anyhow::Result<Arc<PipelineContext>> {
    let detector = YoloDetector::load(&settings.model_path, YoloConfig::from(&settings))
        .context("Failed to load detection model")?;
    Ok(Arc::new(PipelineContext::new(Arc::new(detector), settings)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings = args.settings()?;

    match args.command {
        Command::Process { image_path } => {
            let ctx = load_context(settings)?;
            let outcome = ctx
                .process_file(&image_path)
                .await
                .with_context(|| format!("Failed to process {:?}", image_path))?;

            println!("\n=== Hair Dryer Detection Results ===");
            println!("Detected: {}", outcome.detected_count);
            if args.verbose {
                println!("Objects of any class: {}", outcome.total_detections);
            }
            println!("Input image:     {}", outcome.input_image.display());
            println!("Annotated image: {}", outcome.output_image.display());
        }
        Command::Report => {
            let history = HistoryStore::new(&settings.history_path);
            let generator = ReportGenerator::from_settings(&settings);
            let report = build_report(&history, &generator)
                .await
                .context("Failed to generate report")?;
            println!(
                "Report written to {} ({} entries, {} page(s), {:?} text)",
                report.path.display(),
                report.entries,
                report.pages,
                report.mode
            );
        }
        Command::History => {
            let records = HistoryStore::new(&settings.history_path).read_all().await?;
            if records.is_empty() {
                println!("No runs recorded yet.");
            }
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{}. {} | {} | {}",
                    i + 1,
                    record.timestamp_seconds(),
                    record.filename,
                    record.detected_count
                );
            }
        }
        Command::Serve { .. } => {
            let bind = settings.bind.clone();
            let ctx = load_context(settings)?;
            dryercount::server::serve(&bind, ctx).await?;
        }
    }

    Ok(())
}
