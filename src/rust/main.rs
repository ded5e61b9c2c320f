use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use proofread::{Editor, ExplainerConfig, FeatureSelection, ModelManager, OptimizationLevel, RuntimeConfig};

#[derive(Parser)]
#[command(author, version, about = "Score a question and suggest how to improve it", long_about = None)]
struct Args {
    /// Directory holding installed models (defaults to $PROOFREAD_MODELS or the user cache)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Name of the model to load
    #[arg(short, long, default_value = "question-quality")]
    model: String,

    /// List installed models and exit
    #[arg(long)]
    list: bool,

    /// Number of recommendations to show
    #[arg(short = 'n', long, default_value_t = 10)]
    top_n: usize,

    /// Print only the score
    #[arg(long)]
    score_only: bool,

    /// Print structured JSON instead of the recommendation text
    #[arg(long)]
    json: bool,

    /// Seed of the explanation sampler
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Perturbed samples drawn per explanation
    #[arg(long, default_value_t = 5000)]
    samples: usize,

    #[arg(long, value_enum, default_value_t = FeatureSelection::Auto)]
    selection: FeatureSelection,

    #[arg(long, value_enum, default_value_t = OptimizationLevel::All)]
    optimization: OptimizationLevel,

    /// Text to score; read from stdin when omitted
    text: Vec<String>,
}

fn read_input(args: &Args) -> Result<String> {
    if !args.text.is_empty() {
        return Ok(args.text.join(" "));
    }
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read text from stdin")?;
    if input.trim().is_empty() {
        bail!("No text given; pass it as arguments or on stdin");
    }
    Ok(input.trim_end().to_string())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let manager = match &args.models_dir {
        Some(dir) => ModelManager::new(dir),
        None => ModelManager::new_default(),
    }
    .context("Failed to open the models directory")?;

    if args.list {
        for name in manager.list_models()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let start_time = Instant::now();
    info!("Loading model '{}' from {:?}", args.model, manager.models_dir());
    let editor = Editor::builder()
        .with_runtime_config(RuntimeConfig {
            optimization_level: args.optimization,
            ..RuntimeConfig::default()
        })
        .with_explainer_config(ExplainerConfig {
            num_samples: args.samples,
            seed: args.seed,
            feature_selection: args.selection,
            ..ExplainerConfig::default()
        })
        .with_top_n(args.top_n.max(1))
        .with_model_from(&manager, &args.model)
        .with_context(|| format!("Failed to load model '{}'", args.model))?
        .build()?;
    info!("Editor built in {:.2?}", start_time.elapsed());

    let text = read_input(&args)?;
    let run_start = Instant::now();

    if args.score_only {
        let score = editor.score_text(&text)?;
        if args.json {
            println!("{}", serde_json::json!({ "score": score }));
        } else {
            println!("{:.*}", editor.config().score_precision, score);
        }
    } else {
        let recommendation = editor.recommend(&text, args.top_n)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        } else {
            println!("{}", recommendation);
        }
    }

    info!("Processed input in {:.2?}", run_start.elapsed());
    Ok(())
}
