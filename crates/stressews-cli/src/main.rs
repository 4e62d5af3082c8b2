//! `stressews` - academic stress early-warning system.
//!
//! # Commands
//!
//! - `schema` - list the survey features and accepted values
//! - `predict` - predict from a JSON file and/or `--set name=value` pairs
//! - `form` - answer the survey interactively in the terminal
//! - `evaluate` - score the model against a labelled CSV dataset
//! - `ranges` - compare a dataset's observed values with the schema
//! - `serve` - start the web form and JSON API

mod display;
mod evaluate;
mod form;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stressews_ai::Predictor;
use stressews_core::{ArtifactPaths, FeatureVector, PredictionResult};
use stressews_store::SampleDataset;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::evaluate::Evaluation;

const DEFAULT_DATASET: &str = "data/student_sample.csv";

/// Academic stress early-warning system
#[derive(Parser)]
#[command(name = "stressews", version, about, long_about = None)]
struct Cli {
    /// Directory holding `models/` and `data/`
    #[arg(long, global = true, env = "PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Pipeline artifact (default: <project root>/models/logistic_pipeline.json)
    #[arg(long, global = true, env = "STRESSEWS_MODEL")]
    model: Option<PathBuf>,

    /// Feature names file (default: <project root>/models/feature_names.json)
    #[arg(long, global = true, env = "STRESSEWS_FEATURES")]
    features: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the survey features with their accepted values
    Schema {
        /// Print the schema as JSON
        #[arg(long)]
        json: bool,
    },
    /// Predict the stress level for one student
    ///
    /// Examples:
    ///   stressews predict --input student.json
    ///   stressews predict --defaults --set G1=8 --set failures=2
    Predict {
        /// JSON object mapping feature names to values
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Start from the form defaults
        #[arg(long)]
        defaults: bool,

        /// Set one feature, e.g. `--set studytime=2` (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Print the result and the input sent to the model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Answer the survey interactively and predict
    Form,
    /// Score the model against a labelled dataset
    Evaluate {
        /// CSV file (default: <project root>/data/student_sample.csv)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Compare a dataset's observed values with the schema's accepted ranges
    Ranges {
        /// CSV file (default: <project root>/data/student_sample.csv)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Start the web form and JSON API
    Serve {
        #[arg(long, env = "STRESSEWS_ADDR", default_value = "127.0.0.1:8501")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let paths = ArtifactPaths::from_project_root(&cli.project_root)
        .with_model(cli.model.clone())
        .with_features(cli.features.clone());

    match cli.command {
        Commands::Schema { json } => {
            let schema = stressews_core::FeatureSchema::load(&paths.features)
                .context("loading feature names")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print!("{}", display::render_schema(&schema));
            }
        }
        Commands::Predict {
            input,
            defaults,
            set,
            json,
        } => {
            let predictor = load_predictor(&paths)?;
            let vector = build_input(&predictor, input.as_deref(), defaults, &set)?;
            predict_and_print(&predictor, &vector, json)?;
        }
        Commands::Form => {
            let predictor = load_predictor(&paths)?;
            let stdin = std::io::stdin();
            let vector = form::run_form(predictor.schema(), &mut stdin.lock(), &mut std::io::stdout())?;
            println!();
            predict_and_print(&predictor, &vector, false)?;
        }
        Commands::Evaluate { dataset } => {
            let predictor = load_predictor(&paths)?;
            let path = dataset_path(&cli.project_root, dataset);
            let dataset = SampleDataset::load(&path, predictor.schema())
                .with_context(|| format!("loading {}", path.display()))?;
            let rows = dataset.rows()?;
            let eval = Evaluation::run(&predictor, &rows);
            info!(rows = eval.total, failed = eval.failed, "evaluation finished");
            print!("{}", display::render_evaluation(&eval));
        }
        Commands::Ranges { dataset } => {
            let schema = stressews_core::FeatureSchema::load(&paths.features)
                .context("loading feature names")?;
            let path = dataset_path(&cli.project_root, dataset);
            let dataset = SampleDataset::load(&path, &schema)
                .with_context(|| format!("loading {}", path.display()))?;
            let profiles = dataset.profile()?;
            print!("{}", display::render_ranges(&profiles));
            let outside = profiles.iter().filter(|p| !p.fits_schema()).count();
            if outside > 0 {
                bail!("{outside} feature(s) have values the schema does not accept");
            }
        }
        Commands::Serve { addr } => {
            let predictor = load_predictor(&paths)?;
            stressews_web::serve(addr, stressews_web::AppState::new(predictor)).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_predictor(paths: &ArtifactPaths) -> anyhow::Result<Predictor> {
    Predictor::load(paths).with_context(|| {
        format!(
            "loading model {} with feature names {}",
            paths.model.display(),
            paths.features.display()
        )
    })
}

fn dataset_path(root: &Path, dataset: Option<PathBuf>) -> PathBuf {
    dataset.unwrap_or_else(|| root.join(DEFAULT_DATASET))
}

/// Assemble the input: defaults first, then the file, then `--set` pairs.
/// Later sources win.
fn build_input(
    predictor: &Predictor,
    input: Option<&Path>,
    defaults: bool,
    set: &[String],
) -> anyhow::Result<FeatureVector> {
    let schema = predictor.schema();
    let mut vector = if defaults {
        schema.default_vector()
    } else {
        FeatureVector::new()
    };

    if let Some(path) = input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let from_file: FeatureVector = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        if vector.is_empty() {
            vector = from_file;
        } else {
            for (name, value) in from_file {
                vector.set(&name, value);
            }
        }
    }

    for pair in set {
        let (name, raw) = pair
            .split_once('=')
            .with_context(|| format!("--set {pair:?}: expected NAME=VALUE"))?;
        let value = schema
            .parse_value(name.trim(), raw)
            .map_err(|issue| anyhow::anyhow!("--set {issue}"))?;
        vector.set(name.trim(), value);
    }

    if vector.is_empty() {
        bail!("no input: pass --input, --defaults or --set");
    }
    Ok(vector)
}

/// `predict --json` output.
#[derive(Serialize)]
struct JsonReport<'a> {
    model_id: &'a str,
    prediction: &'a PredictionResult,
    /// Normalised values in schema order.
    input: FeatureVector,
}

fn predict_and_print(predictor: &Predictor, vector: &FeatureVector, json: bool) -> anyhow::Result<()> {
    let validated = match predictor.schema().validate(vector) {
        Ok(validated) => validated,
        Err(err) => {
            for issue in &err.issues {
                eprintln!("  {issue}");
            }
            bail!("{} invalid field(s)", err.issues.len());
        }
    };
    let result = predictor
        .predict_validated(&validated)
        .context("prediction failed")?;

    if json {
        let out = JsonReport {
            model_id: predictor.model_id(),
            prediction: &result,
            input: predictor.schema().named(&validated),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", display::render_result(&result, Some(vector)));
    }
    Ok(())
}
