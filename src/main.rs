use grievance::cli::{ClusterAction, Cli, Commands, ConfigAction, MaintainAction};
use grievance::clustering::{cluster_summary, dashboard_stats, trending_clusters};
use grievance::config::Config;
use grievance::error::{GrievanceError, Result};
use grievance::lexicon::BUILTIN_LEXICON;
use grievance::pipeline::{Submission, SubmissionPipeline};
use grievance::storage::{ComplaintStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Submit {
            text,
            category,
            student_id,
            json,
        } => {
            cmd_submit(cli.config, text, category, student_id, json)?;
        }
        Commands::Import { file } => {
            cmd_import(cli.config, &file)?;
        }
        Commands::Severity { text, explain } => {
            cmd_severity(cli.config, &text, explain)?;
        }
        Commands::Clusters { action } => {
            cmd_clusters(cli.config, action)?;
        }
        Commands::Maintain { action } => {
            cmd_maintain(cli.config, action)?;
        }
        Commands::Merge { keep, absorb } => {
            cmd_merge(cli.config, keep, absorb)?;
        }
        Commands::Upvote { id } => {
            cmd_upvote(cli.config, id)?;
        }
        Commands::Stats { json } => {
            cmd_stats(cli.config, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "grievance=debug"
    } else {
        "grievance=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn open_store(config: &Config) -> Result<Arc<dyn ComplaintStore>> {
    let store = SqliteStore::open(&expand_path(&config.database_path())?)?;
    Ok(Arc::new(store))
}

fn open_pipeline(config_path: Option<PathBuf>) -> Result<SubmissionPipeline> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    SubmissionPipeline::from_config(&config, store)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| GrievanceError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn cmd_submit(
    config_path: Option<PathBuf>,
    text: String,
    category: Option<String>,
    student_id: Option<String>,
    json: bool,
) -> Result<()> {
    let pipeline = open_pipeline(config_path)?;

    let mut submission = Submission::new(text);
    submission.category = category;
    submission.student_id = student_id;

    let complaint = pipeline.submit(submission)?;

    if json {
        println!("{}", to_json(&complaint)?);
        return Ok(());
    }

    println!("✓ Complaint {} stored", complaint.id);
    println!("  Category: {}", complaint.category);
    println!("  Severity: {}", complaint.severity);
    match complaint.cluster_id {
        Some(id) => println!("  Cluster:  {}", id),
        None => println!("  Cluster:  (none)"),
    }
    if complaint.rewritten_text != complaint.raw_text {
        println!("  Rewritten: {}", complaint.rewritten_text);
    }

    Ok(())
}

fn cmd_import(config_path: Option<PathBuf>, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file).map_err(|e| GrievanceError::Io {
        source: e,
        context: format!("Failed to read complaints file: {:?}", file),
    })?;

    let submissions: Vec<Submission> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(Submission::new)
        .collect();

    let pipeline = open_pipeline(config_path)?;
    let results = pipeline.submit_batch(submissions)?;

    let mut stored = 0;
    for (line, result) in results.iter().enumerate() {
        match result {
            Ok(complaint) => {
                stored += 1;
                println!(
                    "  #{} {} / {} -> cluster {:?}",
                    complaint.id, complaint.category, complaint.severity, complaint.cluster_id
                );
            }
            Err(e) => println!("  entry {} rejected: {}", line + 1, e),
        }
    }

    println!("✓ Imported {} of {} complaints", stored, results.len());
    Ok(())
}

fn cmd_severity(config_path: Option<PathBuf>, text: &str, explain: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let generator = grievance::pipeline::text_generator(&config);
    let lexicon = grievance::lexicon::SeverityLexicon::load_or_builtin(
        config.severity.lexicon_file.as_deref(),
    )?;
    let scorer = grievance::severity::SeverityScorer::new(
        generator,
        Arc::new(lexicon),
        grievance::severity::SeverityThresholds::from(&config.severity),
    );

    let assessment = scorer.assess(text);
    println!("Severity: {}", assessment.severity);
    println!("Score:    {}", assessment.score);
    println!("Decision: {:?}", assessment.decision);

    if explain {
        let explanation = scorer.explain_severity(text, assessment.severity);
        println!("Reasons:");
        for reason in explanation.reasons {
            println!("  - {}", reason);
        }
    }

    Ok(())
}

fn cmd_clusters(config_path: Option<PathBuf>, action: ClusterAction) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    match action {
        ClusterAction::List { json } => {
            let clusters = store.list_clusters()?;
            if json {
                println!("{}", to_json(&clusters)?);
                return Ok(());
            }
            if clusters.is_empty() {
                println!("No clusters yet");
            }
            for cluster in clusters {
                println!(
                    "{:>5}  {:<32} {:>4} complaints  updated {}",
                    cluster.id,
                    cluster.name,
                    cluster.count,
                    cluster.last_updated.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ClusterAction::Show { id, limit } => match cluster_summary(store.as_ref(), id, limit)? {
            Some(summary) => {
                println!("Cluster {}: {}", summary.id, summary.name);
                println!("  Complaints: {}", summary.count);
                println!(
                    "  Last updated: {}",
                    summary.last_updated.format("%Y-%m-%d %H:%M:%S")
                );
                for complaint in summary.complaints {
                    println!(
                        "  - #{} [{}] ({} upvotes) {}",
                        complaint.id,
                        complaint.created_at.format("%Y-%m-%d"),
                        complaint.upvotes,
                        complaint.text
                    );
                }
            }
            None => println!("Cluster {} not found", id),
        },
        ClusterAction::Trending { days, limit } => {
            let trending = trending_clusters(store.as_ref(), days, limit)?;
            if trending.is_empty() {
                println!("No activity in the last {} days", days);
            }
            for item in trending {
                println!(
                    "{:>5}  {:<32} {} new",
                    item.cluster.id, item.cluster.name, item.recent_count
                );
            }
        }
    }

    Ok(())
}

fn cmd_maintain(config_path: Option<PathBuf>, action: MaintainAction) -> Result<()> {
    let pipeline = open_pipeline(config_path)?;
    let engine = pipeline.engine();

    match action {
        MaintainAction::Update => {
            let report = engine.update_clusters()?;
            println!(
                "✓ Updated {} clusters, removed {} empty ({} failed)",
                report.updated, report.removed, report.failed
            );
        }
        MaintainAction::Cleanup => {
            let deleted = engine.cleanup_empty_clusters()?;
            println!("✓ Deleted {} empty clusters", deleted);
        }
        MaintainAction::Recalculate => {
            let report = engine.recalculate_all_clusters()?;
            println!(
                "✓ Reassigned {} complaints ({} failed)",
                report.reassigned, report.failed
            );
            println!(
                "  Updated {} clusters, removed {} empty",
                report.update.updated,
                report.update.removed + report.cleaned
            );
        }
    }

    Ok(())
}

fn cmd_merge(config_path: Option<PathBuf>, keep: i64, absorb: i64) -> Result<()> {
    let pipeline = open_pipeline(config_path)?;
    let moved = pipeline.engine().merge_clusters(keep, absorb)?;
    println!(
        "✓ Merged cluster {} into {} ({} complaints moved)",
        absorb, keep, moved
    );
    Ok(())
}

fn cmd_upvote(config_path: Option<PathBuf>, id: i64) -> Result<()> {
    let pipeline = open_pipeline(config_path)?;
    let upvotes = pipeline.upvote(id)?;
    println!("✓ Complaint {} now has {} upvotes", id, upvotes);
    Ok(())
}

fn cmd_stats(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let stats = dashboard_stats(store.as_ref())?;

    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!("Complaints: {}", stats.total_complaints);
    println!("  Last 7 days: {}", stats.last_7_days);
    println!("Clusters:   {}", stats.total_clusters);
    println!("By severity:");
    for (severity, count) in &stats.by_severity {
        println!("  {:<8} {}", severity, count);
    }
    println!("By category:");
    for (category, count) in &stats.by_category {
        println!("  {:<20} {}", category, count);
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&config_dir).map_err(|e| GrievanceError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", config_dir),
            })?;

            let lexicon_path = config_dir.join("severity.toml");
            if force || !lexicon_path.exists() {
                std::fs::write(&lexicon_path, BUILTIN_LEXICON).map_err(|e| GrievanceError::Io {
                    source: e,
                    context: format!("Failed to write severity.toml: {:?}", lexicon_path),
                })?;
            }

            let mut config = Config::default();
            config.severity.lexicon_file = Some(lexicon_path.clone());
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("✓ Severity lexicon installed at: {}", lexicon_path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'grievance config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| GrievanceError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            GrievanceError::Config("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
