use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use offer_composer::{
    ChartAsset, ChartLayout, DataSource, EmptySource, Error, GenerationRequest, Generator,
    GeneratorConfig, JsonSource, MergeResult, SharedSources,
};

/// Compose offer PDFs from background templates, coordinate maps and charts
#[derive(Parser, Debug)]
#[command(name = "offer-composer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Generator configuration (JSON)
    #[arg(short, long, global = true, default_value = "offer-composer.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one document
    Generate {
        /// Document variant as named in the configuration
        #[arg(long)]
        variant: String,

        /// Explicit form context (JSON object)
        #[arg(long)]
        context: PathBuf,

        #[command(flatten)]
        shared: SharedArgs,

        /// Output PDF
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Generate one document per context file, in parallel
    Batch {
        #[arg(long)]
        variant: String,

        /// Context files, or directories containing *.json context files
        #[arg(long, num_args = 1.., required = true)]
        contexts: Vec<PathBuf>,

        #[command(flatten)]
        shared: SharedArgs,

        /// Directory receiving one PDF per context, named after the context file
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Validate the coordinate maps and templates of one or all variants
    Check {
        #[arg(long)]
        variant: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct SharedArgs {
    /// Ambient state shared by all documents (JSON object)
    #[arg(long)]
    ambient: Option<PathBuf>,

    /// Computed results (JSON object)
    #[arg(long)]
    computed: Option<PathBuf>,

    /// Chart manifest: [{"key", "path", "category", "caption", "description"}]
    #[arg(long)]
    charts: Option<PathBuf>,

    /// Chart layout: one_per_page, two_per_page or four_per_page
    #[arg(long)]
    layout: Option<String>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    key: String,
    path: PathBuf,
    #[serde(default)]
    category: String,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    description: Option<String>,
}

/// Read the chart manifest. Unreadable image files become assets without
/// bytes so the slot is rendered blank instead of aborting.
fn load_charts(manifest: &Path) -> Result<Vec<ChartAsset>, Error> {
    let text = std::fs::read_to_string(manifest)?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&text)?;
    let base = manifest.parent().unwrap_or(Path::new("."));
    Ok(entries
        .into_iter()
        .map(|entry| {
            let path = base.join(&entry.path);
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    log::warn!("Chart '{}' unreadable ({}): {e}", entry.key, path.display());
                    None
                }
            };
            ChartAsset {
                key: entry.key,
                bytes,
                category: entry.category,
                caption: entry.caption,
                description: entry.description,
            }
        })
        .collect())
}

fn load_source(path: Option<&Path>) -> Result<Box<dyn DataSource>, Error> {
    Ok(match path {
        Some(p) => Box::new(JsonSource::from_path(p)?),
        None => Box::new(EmptySource),
    })
}

fn collect_contexts(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();
            out.extend(files);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn report(label: &str, result: &MergeResult) {
    for diagnostic in &result.diagnostics {
        log::debug!("{label}: {diagnostic}");
    }
    if !result.success {
        eprintln!(
            "Warning: {label}: chart pages omitted ({})",
            result.failure_reason.as_deref().unwrap_or("unknown reason")
        );
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = GeneratorConfig::load(&cli.config)?;
    let generator = Generator::new(config)?;

    match cli.command {
        Command::Generate {
            variant,
            context,
            shared,
            output,
        } => {
            let ambient = load_source(shared.ambient.as_deref())?;
            let computed = load_source(shared.computed.as_deref())?;
            let charts = match &shared.charts {
                Some(manifest) => load_charts(manifest)?,
                None => Vec::new(),
            };
            let layout = shared.layout.as_deref().map(ChartLayout::parse_lossy);
            let request = GenerationRequest::new(variant, JsonSource::from_path(&context)?)
                .with_charts(charts, layout);
            let sources = SharedSources {
                ambient: ambient.as_ref(),
                computed: computed.as_ref(),
            };

            let result = generator.generate(&request, sources)?;
            std::fs::write(&output, &result.bytes)?;
            report(&output.display().to_string(), &result);
            println!("{} ({} pages)", output.display(), result.page_count);
        }
        Command::Batch {
            variant,
            contexts,
            shared,
            output_dir,
        } => {
            let ambient = load_source(shared.ambient.as_deref())?;
            let computed = load_source(shared.computed.as_deref())?;
            let charts = match &shared.charts {
                Some(manifest) => load_charts(manifest)?,
                None => Vec::new(),
            };
            let layout = shared.layout.as_deref().map(ChartLayout::parse_lossy);

            let files = collect_contexts(&contexts)?;
            let requests = files
                .iter()
                .map(|file| {
                    Ok(GenerationRequest::new(variant.clone(), JsonSource::from_path(file)?)
                        .with_charts(charts.clone(), layout))
                })
                .collect::<Result<Vec<_>, Error>>()?;
            let sources = SharedSources {
                ambient: ambient.as_ref(),
                computed: computed.as_ref(),
            };

            std::fs::create_dir_all(&output_dir)?;
            let mut failed = 0;
            for (file, result) in files.iter().zip(generator.generate_batch(&requests, sources)) {
                let stem = file.file_stem().unwrap_or(file.as_os_str());
                let output = output_dir.join(stem).with_extension("pdf");
                match result {
                    Ok(result) => {
                        std::fs::write(&output, &result.bytes)?;
                        report(&output.display().to_string(), &result);
                        println!("{} ({} pages)", output.display(), result.page_count);
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("Error: {}: {e}", file.display());
                    }
                }
            }
            if failed > 0 {
                return Err(Error::Config(format!(
                    "{failed} of {} documents failed",
                    files.len()
                )));
            }
        }
        Command::Check { variant } => {
            let names: Vec<String> = match variant {
                Some(v) => vec![v],
                None => generator.config().variants.keys().cloned().collect(),
            };
            for name in names {
                let elements = generator.check_variant(&name)?;
                println!("{name}: ok ({elements} placements)");
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
