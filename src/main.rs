mod api;
mod server;

use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trendify::batch::{read_csv_path, BatchPredictor, HttpBatchBackend};
use trendify::config::EngineConfig;
use trendify::engine::rng_from_seed;
use trendify::metrics::sample_roster;
use trendify::store::JsonFileStore;
use trendify::{
    format_float, format_percent, ContentItem, ContentType, HistoryFilter, ModelId, Platform,
    ViralityEngine,
};

#[derive(Parser)]
#[command(name = "trendify", about = "Content virality scoring and model evaluation")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Score one post with a single model and record it in history.
    Predict(PredictArgs),
    /// Score one post with every model in the metrics roster.
    Compare(CompareArgs),
    /// Classify every row of a CSV file through the batch backend.
    Batch(BatchArgs),
    History(HistoryArgs),
    Metrics(MetricsArgs),
    /// Write the reference model roster into the store.
    SeedMetrics,
    Config(ConfigArgs),
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct ContentArgs {
    #[arg(long)]
    text: Option<String>,
    #[arg(long, default_value = "")]
    hashtags: String,
    #[arg(long, default_value = "instagram")]
    platform: String,
    #[arg(long, default_value = "text")]
    content_type: String,
    #[arg(long)]
    seed: Option<u64>,
}

impl Default for ContentArgs {
    fn default() -> Self {
        Self {
            text: None,
            hashtags: String::new(),
            platform: "instagram".to_string(),
            content_type: "text".to_string(),
            seed: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct PredictArgs {
    #[command(flatten)]
    content: ContentArgs,
    #[arg(long, default_value = "logistic")]
    model: String,
    #[arg(long)]
    details: bool,
}

impl Default for PredictArgs {
    fn default() -> Self {
        Self {
            content: ContentArgs::default(),
            model: "logistic".to_string(),
            details: false,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct CompareArgs {
    #[command(flatten)]
    content: ContentArgs,
}

#[derive(Args, Debug, Clone)]
struct BatchArgs {
    #[arg(long, default_value = "logistic")]
    model: String,
    #[arg(long)]
    csv: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct HistoryArgs {
    #[arg(long, default_value = "all")]
    filter: String,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
struct MetricsArgs {
    /// Model to break down; lists the leaderboard when omitted.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Write the effective config to this path instead of printing it.
    #[arg(long)]
    write: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8787)]
    port: u16,
    #[arg(long)]
    web_root: Option<String>,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (config, _) = EngineConfig::load(cli.config).map_err(|err| err.to_string())?;
    let command = cli.command.unwrap_or(Command::Predict(PredictArgs::default()));

    match command {
        Command::Config(args) => run_config(&config, args),
        Command::Batch(args) => run_batch(&config, args).await,
        command => {
            let engine = build_engine(&config).await?;
            match command {
                Command::Predict(args) => run_predict(&engine, args).await,
                Command::Compare(args) => run_compare(&engine, args).await,
                Command::History(args) => run_history(&engine, args).await,
                Command::Metrics(args) => run_metrics(&engine, args).await,
                Command::SeedMetrics => run_seed_metrics(&engine).await,
                Command::Serve(args) => server::serve(args, Arc::new(engine), config).await,
                Command::Config(_) | Command::Batch(_) => Ok(()),
            }
        }
    }
}

async fn build_engine(config: &EngineConfig) -> Result<ViralityEngine<JsonFileStore>, String> {
    let registry = config.registry().map_err(|err| err.to_string())?;
    let store = JsonFileStore::open(config.store.data_dir.clone())
        .await
        .map_err(|err| err.to_string())?;
    Ok(ViralityEngine::new(registry, store).with_history_limit(config.history.limit))
}

fn build_content(args: &ContentArgs) -> Result<ContentItem, String> {
    let platform = Platform::from_str(&args.platform)
        .ok_or_else(|| format!("invalid platform: {}", args.platform))?;
    let content_type = ContentType::from_str(&args.content_type)
        .ok_or_else(|| format!("invalid content type: {}", args.content_type))?;
    let text = read_text(args.text.clone())?;
    Ok(ContentItem::new(text, platform, content_type).with_hashtags(&args.hashtags))
}

async fn run_predict(engine: &ViralityEngine<JsonFileStore>, args: PredictArgs) -> Result<(), String> {
    let model = ModelId::from_str(&args.model).map_err(|err| err.to_string())?;
    let content = build_content(&args.content)?;
    let mut rng = rng_from_seed(args.content.seed);

    let outcome = engine
        .predict(&content, model, &mut rng)
        .await
        .map_err(|err| err.to_string())?;
    let prediction = &outcome.prediction;

    println!(
        "Virality score: {} ({})",
        prediction.virality_score,
        prediction.predicted_class.label()
    );
    println!("Model: {}", prediction.model_used.label());
    if let Some(err) = &outcome.persist_error {
        println!("Warning: not saved to history ({})", err);
    }

    if args.details {
        println!("\nFeatures:");
        for (name, value) in prediction.features.to_map() {
            println!("  {}: {}", name, format_float(value, 2));
        }
    }

    Ok(())
}

async fn run_compare(engine: &ViralityEngine<JsonFileStore>, args: CompareArgs) -> Result<(), String> {
    let content = build_content(&args.content)?;
    let mut rng = rng_from_seed(args.content.seed);
    let entries = engine
        .compare(&content, &mut rng)
        .await
        .map_err(|err| err.to_string())?;

    if entries.is_empty() {
        return Err("no models in the metrics roster: run `trendify seed-metrics`".to_string());
    }

    for entry in entries {
        println!(
            "{:>2}. {:<30} score {:>2} ({:<6}) accuracy {} | f1 {}{}",
            entry.rank,
            entry.model_name,
            entry.score,
            entry.class.label(),
            format_percent(entry.accuracy),
            format_percent(entry.f1_score),
            if entry.top_performer { "  <- highest score" } else { "" }
        );
    }
    Ok(())
}

async fn run_batch(config: &EngineConfig, args: BatchArgs) -> Result<(), String> {
    let model = ModelId::from_str(&args.model).map_err(|err| err.to_string())?;
    let rows = read_csv_path(&args.csv).map_err(|err| err.to_string())?;
    let backend = HttpBatchBackend::from_config(&config.batch).map_err(|err| err.to_string())?;
    let predictor = BatchPredictor::new(backend);

    let response = predictor
        .predict(model, rows)
        .await
        .map_err(|err| err.to_string())?;

    println!("Model: {} | {} posts analyzed", response.model, response.results.len());
    for row in &response.results {
        let field = |name: &str| {
            row.data
                .get(name)
                .filter(|value| !value.is_null())
                .map(|value| value.to_string().trim_matches('"').to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:>4}  {:<10} {:<12} {:<10} {:>6}  views {}  likes {}  shares {}",
            row.row_index + 1,
            field("platform"),
            field("topic"),
            row.prediction.label(),
            format_percent(row.confidence),
            field("views"),
            field("likes"),
            field("shares")
        );
    }

    let summary = response.summary();
    println!(
        "\nViral: {} | Not viral: {} | mean confidence {}",
        summary.viral,
        summary.not_viral,
        format_percent(summary.mean_confidence)
    );
    Ok(())
}

async fn run_history(engine: &ViralityEngine<JsonFileStore>, args: HistoryArgs) -> Result<(), String> {
    let filter = HistoryFilter::parse(&args.filter);
    let view = match args.limit {
        Some(limit) => engine.history_with_limit(&filter, limit).await,
        None => engine.history(&filter).await,
    }
    .map_err(|err| err.to_string())?;

    let summary = &view.summary;
    println!(
        "Total: {} | High: {} | Medium: {} | Low: {} | Avg score: {}",
        summary.total, summary.high, summary.medium, summary.low, summary.average_score
    );
    for prediction in &view.predictions {
        let hashtags: Vec<String> = prediction
            .content
            .hashtags
            .iter()
            .map(|tag| format!("#{}", tag))
            .collect();
        println!(
            "{}  {:>2} {:<9} {:<28} {:<9} {} {}",
            prediction.created_at.format("%Y-%m-%d %H:%M"),
            prediction.virality_score,
            prediction.predicted_class.label(),
            prediction.model_used.label(),
            prediction.content.platform.label(),
            truncate(&prediction.content.text, 60),
            hashtags.join(" ")
        );
    }
    Ok(())
}

async fn run_metrics(engine: &ViralityEngine<JsonFileStore>, args: MetricsArgs) -> Result<(), String> {
    let Some(name) = args.model else {
        let roster = engine.roster().await.map_err(|err| err.to_string())?;
        if roster.is_empty() {
            return Err("no models in the metrics roster: run `trendify seed-metrics`".to_string());
        }
        for (idx, model) in roster.iter().enumerate() {
            println!(
                "{:>2}. {:<30} accuracy {} | f1 {} | precision {} | recall {}",
                idx + 1,
                model.model_name,
                format_percent(model.accuracy),
                format_percent(model.f1_score),
                format_percent(model.precision_score),
                format_percent(model.recall_score)
            );
        }
        return Ok(());
    };

    let (model, breakdown) = engine.metrics_for(&name).await.map_err(|err| err.to_string())?;
    println!("{} (trained {}, {} samples)", model.model_name, model.training_date.format("%Y-%m-%d"), model.dataset_size);
    println!(
        "Accuracy {} ({:?}) | F1 {} ({:?}) | Precision {} ({:?}) | Recall {} ({:?})",
        format_percent(model.accuracy),
        breakdown.bands.accuracy,
        format_percent(model.f1_score),
        breakdown.bands.f1_score,
        format_percent(model.precision_score),
        breakdown.bands.precision_score,
        format_percent(model.recall_score),
        breakdown.bands.recall_score
    );

    println!("\nConfusion matrix (rows: actual, columns: predicted)");
    print!("{:<12}", "");
    for label in &breakdown.labels {
        print!("{:>16}", label);
    }
    println!("{:>10}", "total");
    for (row, cells) in breakdown.cells.iter().enumerate() {
        print!("{:<12}", breakdown.labels[row]);
        for cell in cells {
            print!("{:>16}", format!("{} ({})", cell.count, cell.percentage_label()));
        }
        println!("{:>10}", breakdown.row_totals[row]);
    }
    for warning in &breakdown.warnings {
        println!("Warning: {}", warning);
    }
    Ok(())
}

async fn run_seed_metrics(engine: &ViralityEngine<JsonFileStore>) -> Result<(), String> {
    let roster = sample_roster(chrono::Utc::now());
    let count = roster.len();
    engine
        .store()
        .replace_model_metrics(roster)
        .await
        .map_err(|err| err.to_string())?;
    println!(
        "Seeded {} models into {}",
        count,
        engine.store().dir().display()
    );
    Ok(())
}

fn run_config(config: &EngineConfig, args: ConfigArgs) -> Result<(), String> {
    config.registry().map_err(|err| err.to_string())?;
    match args.write {
        Some(path) => {
            config.write(&path).map_err(|err| err.to_string())?;
            println!("Wrote config to {}", path.display());
        }
        None => {
            let payload = toml::to_string_pretty(config)
                .map_err(|err| format!("failed to serialize config: {}", err))?;
            print!("{}", payload);
        }
    }
    Ok(())
}

fn read_text(arg: Option<String>) -> Result<String, String> {
    if let Some(text) = arg {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("failed reading stdin: {}", err))?;
    piped_text(buffer)
}

// Only the line ending added by the pipe is dropped; the post itself is
// scored as written.
fn piped_text(mut buffer: String) -> Result<String, String> {
    if buffer.trim().is_empty() {
        return Err("missing post text: pass --text or pipe stdin".to_string());
    }
    if buffer.ends_with('\n') {
        buffer.pop();
        if buffer.ends_with('\r') {
            buffer.pop();
        }
    }
    Ok(buffer)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
