use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use segue::model::{SequenceMode, SequenceOptions, SequencePlan, SimilarityResult, TrackAnalysis, TrackId};
use segue::sequencer::edge::{TrackProfile, score_edge};
use segue::snapshot::find_track;

/// Upper bound on similarity results per query.
const MAX_LIMIT: usize = 50;

/// Used when neither `-n` nor the config sets a limit.
const DEFAULT_LIMIT: usize = 15;

#[derive(Parser)]
#[command(name = "segue", version, about = "Harmonic DJ set sequencer and similar-track finder")]
struct Cli {
    /// Path to the track analysis snapshot (JSON array)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Config file (defaults to ~/.config/segue/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    WarmUp,
    PeakTime,
    OpenFormat,
}

impl From<ModeArg> for SequenceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::WarmUp => SequenceMode::WarmUp,
            ModeArg::PeakTime => SequenceMode::PeakTime,
            ModeArg::OpenFormat => SequenceMode::OpenFormat,
        }
    }
}

#[derive(clap::Args)]
struct SequenceArgs {
    /// Sequencing mode (decides the start track and energy direction)
    #[arg(short, long, value_enum, default_value = "warm-up")]
    mode: ModeArg,

    /// Soften the penalty for clashing or unknown keys
    #[arg(long)]
    allow_key_jumps: bool,

    /// Soft limit on BPM distance between neighbors (0 = unconstrained)
    #[arg(long, default_value = "0")]
    max_bpm_step: f64,
}

impl SequenceArgs {
    fn options(&self, must_play: &[String], ban: &[String]) -> SequenceOptions {
        SequenceOptions {
            mode: self.mode.into(),
            allow_key_jumps: self.allow_key_jumps,
            max_bpm_step: self.max_bpm_step,
            must_play: must_play.iter().map(|id| TrackId::new(id.as_str())).collect(),
            ban: ban.iter().map(|id| TrackId::new(id.as_str())).collect(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Order every track in the snapshot into a playable set
    Sequence {
        #[command(flatten)]
        args: SequenceArgs,

        /// Track id that must be present (repeatable)
        #[arg(long)]
        must_play: Vec<String>,

        /// Track id to leave out (repeatable)
        #[arg(long)]
        ban: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find tracks that sound similar to a given track
    Similar {
        /// Track id (or unique id prefix)
        track: String,

        /// Number of results (1-50)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u16).range(1..=50))]
        limit: Option<u16>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank neighbors for every track in parallel
    Neighbors {
        /// Neighbors per track (1-50)
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u16).range(1..=50))]
        limit: Option<u16>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Show the edge score breakdown for playing one track after another
    Explain {
        /// Track id (or unique id prefix) playing first
        from: String,

        /// Track id (or unique id prefix) playing next
        to: String,

        #[command(flatten)]
        args: SequenceArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Explicit --config must load cleanly; the default location falls back to defaults
    let config = match &cli.config {
        Some(path) => segue::config::AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => segue::config::AppConfig::load(),
    };

    // Resolve snapshot path: CLI > config
    let snapshot_path = cli
        .snapshot
        .or(config.snapshot.clone())
        .context("No snapshot given. Pass --snapshot or set `snapshot` in the config file.")?;
    let tracks = segue::snapshot::load_snapshot(&snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    let scoring = &config.scoring;
    let resolve_limit = |limit: Option<u16>| -> usize {
        let fallback = if config.default_limit > 0 { config.default_limit } else { DEFAULT_LIMIT };
        limit.map(usize::from).unwrap_or(fallback).min(MAX_LIMIT)
    };

    match cli.command {
        Commands::Sequence { args, must_play, ban, json } => {
            let options = args.options(&must_play, &ban);
            let plan = segue::sequencer::build_sequence(&tracks, &options, &scoring.edge)
                .context("Sequencing failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!(
                    "Set of {} tracks ({} mode):",
                    plan.order.len(),
                    options.mode.label()
                );
                println!();
                print_plan(&plan, &tracks);
            }
        }

        Commands::Similar { track, limit, json } => {
            let query = find_track(&tracks, &track)
                .with_context(|| format!("No track with id matching \"{track}\""))?;
            let results = segue::similarity::rank_similar(
                query,
                &tracks,
                resolve_limit(limit),
                &scoring.similarity,
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            if results.is_empty() {
                println!("No similar tracks (the query may have no embedding).");
                return Ok(());
            }

            println!("Tracks similar to {} ({}):", query.id, display_name(&query.path));
            println!();
            print_similar(&results, &tracks);
        }

        Commands::Neighbors { limit, jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };

            let pb = ProgressBar::new(tracks.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tracks ({eta} remaining)")
                    .unwrap()
                    .progress_chars("=>-"),
            );

            let table = segue::similarity::neighbor_table(
                &tracks,
                resolve_limit(limit),
                &scoring.similarity,
                workers,
                || pb.inc(1),
            )
            .context("Neighbor ranking failed")?;
            pb.finish_with_message("done");

            for row in &table {
                let neighbors: Vec<String> = row
                    .results
                    .iter()
                    .map(|r| format!("{} ({:.2})", r.track_id, r.score))
                    .collect();
                println!("{:<16} {}", row.track_id, neighbors.join("  "));
            }
        }

        Commands::Explain { from, to, args } => {
            let from = find_track(&tracks, &from)
                .with_context(|| format!("No track with id matching \"{from}\""))?;
            let to = find_track(&tracks, &to)
                .with_context(|| format!("No track with id matching \"{to}\""))?;
            let options = args.options(&[], &[]);
            let edge = score_edge(
                &TrackProfile::new(from),
                &TrackProfile::new(to),
                &options,
                &scoring.edge,
            );

            println!("{} -> {} ({} mode)", from.id, to.id, options.mode.label());
            println!();
            println!("  tempo   {:>7.2}", edge.tempo);
            println!("  key     {:>7.2}", edge.key);
            println!("  energy  {:>7.2}", edge.energy);
            println!("  window  {:>7.2}", edge.window);
            println!("  {}", "-".repeat(15));
            println!("  total   {:>7.2}", edge.total);
            println!();
            println!("{}", edge.explanation.reason);
        }
    }

    Ok(())
}

/// File stem of a track path, truncated for table display.
fn display_name(path: &Path) -> String {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "?".to_string());
    if name.chars().count() > 30 {
        format!("{}...", name.chars().take(27).collect::<String>())
    } else {
        name
    }
}

fn name_for(tracks: &[TrackAnalysis], id: &TrackId) -> String {
    tracks
        .iter()
        .find(|t| &t.id == id)
        .map(|t| display_name(&t.path))
        .unwrap_or_else(|| "?".to_string())
}

/// Print the playing order with the edge that led to each track.
fn print_plan(plan: &SequencePlan, tracks: &[TrackAnalysis]) {
    println!("{:>3}  {:<16} {:<30} {:>7}  {}", "#", "Id", "Track", "Score", "Why");
    println!("{}", "-".repeat(100));

    for (i, id) in plan.order.iter().enumerate() {
        let (score, why) = match i.checked_sub(1).and_then(|prev| plan.explanations.get(prev)) {
            Some(edge) => (format!("{:>7.2}", edge.score), edge.reason.clone()),
            None => (format!("{:>7}", "start"), String::new()),
        };
        println!(
            "{:>3}  {:<16} {:<30} {}  {}",
            i + 1,
            id.as_str(),
            name_for(tracks, id),
            score,
            why
        );
    }
}

/// Print ranked similarity results.
fn print_similar(results: &[SimilarityResult], tracks: &[TrackAnalysis]) {
    println!(
        "{:<16} {:<30} {:>5}  {:>4} {:>4} {:>4} {:>4}",
        "Id", "Track", "Score", "Vibe", "Tmp", "Key", "Eng"
    );
    println!("{}", "-".repeat(78));

    for r in results {
        println!(
            "{:<16} {:<30} {:>5.3}  {:>4} {:>4} {:>4} {:>4}",
            r.track_id.as_str(),
            name_for(tracks, &r.track_id),
            r.score,
            r.vibe_match,
            r.tempo_match,
            r.key_match,
            r.energy_match,
        );
    }

    println!();
    println!("Vibe=Embedding  Tmp=Tempo  Key=Key  Eng=Energy (match %, 0-100)");
    if let Some(top) = results.first() {
        println!("Top match: {}", top.explanation);
    }
}
