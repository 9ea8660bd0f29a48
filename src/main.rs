use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use stampwell::{
    Config, ConfigResolver, DEFAULT_CONFIG_FILE, Result, WatermarkError, WatermarkOverrides,
    batch::TracingReporter,
    color::Color,
    layout::Anchor,
    startup_checks,
    templates::{MergeStrategy, TemplateStore},
    watermark::OutputFormat,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark a single image or every image in a directory
    Apply(ApplyArgs),

    /// Manage saved watermark templates
    #[command(subcommand)]
    Template(TemplateCommands),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Image file or directory of images
    source: PathBuf,

    /// Output file or directory (default: <dir>/<dir name>_watermark)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Start from a saved template
    #[arg(short, long)]
    template: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    #[command(flatten)]
    watermark: WatermarkArgs,
}

/// Every flag is optional so that only explicitly given values override a template.
#[derive(Args, Debug, Default)]
struct WatermarkArgs {
    /// Literal text (default: the photo's capture time)
    #[arg(long)]
    text: Option<String>,

    /// Image to composite as a watermark
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long)]
    font_size: Option<u32>,

    /// Color name or R,G,B
    #[arg(long)]
    color: Option<String>,

    /// One of top-left, top-center, top-right, center-left, center,
    /// center-right, bottom-left, bottom-center, bottom-right
    #[arg(long)]
    position: Option<String>,

    /// 0 (invisible) to 100 (opaque)
    #[arg(long)]
    opacity: Option<u8>,

    /// JPEG, PNG, TIFF or BMP
    #[arg(long)]
    format: Option<String>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u8>,

    /// Scale factor applied to the overlay image
    #[arg(long)]
    image_scale: Option<f32>,
}

impl WatermarkArgs {
    fn to_overrides(&self) -> Result<WatermarkOverrides> {
        Ok(WatermarkOverrides {
            text: self.text.clone(),
            overlay_image_path: self.image.clone(),
            font_size: self.font_size,
            color: self.color.as_deref().map(Color::parse).transpose()?,
            position: self
                .position
                .as_deref()
                .map(str::parse::<Anchor>)
                .transpose()?,
            opacity: self.opacity,
            output_format: self
                .format
                .as_deref()
                .map(str::parse::<OutputFormat>)
                .transpose()?,
            quality: self.quality,
            overlay_scale: self.image_scale,
        })
    }
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List saved templates
    List,
    /// Print one template as JSON
    Show { name: String },
    /// Save the given settings under a name, replacing any existing template
    Save {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        watermark: WatermarkArgs,
    },
    /// Remove a template
    Delete { name: String },
    /// Write all templates, or one with --name, to a file
    Export {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Merge templates from a file into the store
    Import {
        path: PathBuf,
        /// Keep existing templates when names collide
        #[arg(long)]
        skip_existing: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install logger: {}", e);
    }

    let outcome = match Config::load(&cli.config) {
        Ok(config) => match cli.command {
            Commands::Apply(args) => run_apply(config, args).await,
            Commands::Template(cmd) => handle_template_command(&config.template_store(), cmd),
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run_apply(config: Config, args: ApplyArgs) -> Result<u8> {
    // Configuration problems surface before any file is read
    let overrides = args.watermark.to_overrides()?;
    let store = config.template_store();
    let watermark = ConfigResolver::new(&store).resolve(args.template.as_deref(), &overrides)?;
    debug!("Resolved watermark configuration: {:?}", watermark);

    if let Err(errors) = startup_checks::perform_startup_checks(&config, &args.source).await {
        for e in &errors {
            eprintln!("Error: {}", e);
        }
        return Ok(1);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let processor = config
        .batch_processor(args.output, args.recursive)?
        .with_stop_flag(stop.clone());

    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, finishing the current image");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let source = args.source;
    let result = tokio::task::spawn_blocking(move || {
        processor.run(&source, &watermark, &TracingReporter)
    })
    .await
    .map_err(|e| WatermarkError::IoError(std::io::Error::other(e)))??;
    signal_task.abort();

    println!(
        "Processed {} images: {} succeeded, {} skipped, {} failed",
        result.total(),
        result.succeeded,
        result.skipped,
        result.failed
    );
    for failure in &result.failures {
        println!("  {}: {}", failure.path.display(), failure.reason);
    }

    Ok(result.exit_code() as u8)
}

fn handle_template_command(store: &TemplateStore, cmd: TemplateCommands) -> Result<u8> {
    match cmd {
        TemplateCommands::List => {
            let templates = store.list()?;
            if templates.is_empty() {
                println!("No templates saved in {}", store.path().display());
            } else {
                println!("Templates in {}:", store.path().display());
                for (name, template) in &templates {
                    println!("  {:<20} {}", name, template.summary());
                    if let Some(description) = &template.description {
                        println!("  {:<20} {}", "", description);
                    }
                }
            }
        }
        TemplateCommands::Show { name } => {
            let template = store.get(&name)?;
            let json = serde_json::to_string_pretty(&template)
                .map_err(|e| WatermarkError::InvalidTemplate {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            println!("{}", json);
        }
        TemplateCommands::Save {
            name,
            description,
            watermark,
        } => {
            let overrides = watermark.to_overrides()?;
            let config = ConfigResolver::without_templates().resolve(None, &overrides)?;
            let template = store.save(&name, &config, description.as_deref())?;
            info!("Saved template '{}'", name);
            println!("Saved template '{}': {}", name, template.summary());
        }
        TemplateCommands::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted template '{}'", name);
        }
        TemplateCommands::Export { path, name } => match name {
            Some(name) => {
                store.export_one(&name, &path)?;
                println!("Exported template '{}' to {}", name, path.display());
            }
            None => {
                let count = store.export_all(&path)?;
                println!("Exported {} templates to {}", count, path.display());
            }
        },
        TemplateCommands::Import {
            path,
            skip_existing,
        } => {
            let strategy = if skip_existing {
                MergeStrategy::Skip
            } else {
                MergeStrategy::Overwrite
            };
            let summary = store.import_all(&path, strategy)?;
            println!(
                "Imported {} templates, skipped {}",
                summary.imported.len(),
                summary.skipped.len()
            );
            for name in &summary.skipped {
                println!("  kept existing '{}'", name);
            }
        }
    }
    Ok(0)
}
