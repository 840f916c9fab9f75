#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use elo_arena::judge::{ChatJudge, JudgeConfig, VerdictPrompt};
use elo_arena::{GroupKey, GroupStats, JsonlTraceSink, RankingConfig, Tournament, TraceSink};

#[derive(Parser)]
#[command(name = "arena", version, about = "Pairwise Elo tournament CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank items from a request JSON (LLM calls)
    Rank {
        /// Path to rank request JSON
        #[arg(long)]
        request: PathBuf,

        /// Output report JSON
        #[arg(long)]
        out: PathBuf,

        /// JSONL trace of every comparison
        #[arg(long)]
        trace: Option<PathBuf>,

        /// OpenRouter model ID for the judge (overrides request and env)
        #[arg(long)]
        model: Option<String>,

        /// Cap on comparisons per group (overrides request)
        #[arg(long)]
        max_pairs: Option<usize>,

        /// Scheduler seed (overrides request)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run synthetic evaluation suite
    Eval {
        #[arg(long)]
        case: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
}

/// Input document for `arena rank`.
#[derive(Debug, Deserialize)]
struct RankRequest {
    /// Judging instructions; the default asks for overall quality.
    instructions: Option<String>,
    model: Option<String>,
    max_pairs: Option<usize>,
    seed: Option<u64>,
    items: Vec<RankRequestItem>,
}

#[derive(Debug, Deserialize)]
struct RankRequestItem {
    id: String,
    text: String,
    /// Items sharing an index compete with each other; absent means the
    /// shared pool.
    group: Option<u32>,
}

/// Judge-facing view of one request item.
struct ArenaItem {
    id: String,
    text: String,
}

impl AsRef<str> for ArenaItem {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Serialize)]
struct RankReport {
    model: String,
    groups: Vec<GroupReport>,
}

#[derive(Debug, Serialize)]
struct GroupReport {
    group: GroupKey,
    stats: GroupStats,
    standings: Vec<StandingEntry>,
}

#[derive(Debug, Serialize)]
struct StandingEntry {
    rank: usize,
    id: String,
    rating: f64,
    comparisons: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            request,
            out,
            trace,
            model,
            max_pairs,
            seed,
        } => {
            let RankRequest {
                instructions,
                model: request_model,
                max_pairs: request_max_pairs,
                seed: request_seed,
                items,
            } = read_json(&request)?;
            if items.is_empty() {
                return Err("rank request has no items".into());
            }

            let mut config = RankingConfig::default();
            if let Some(seed) = seed.or(request_seed) {
                config.rng_seed = seed;
            }
            let max_pairs = max_pairs.or(request_max_pairs);

            let mut judge_config = JudgeConfig::from_env()?;
            if let Some(model) = model.or(request_model) {
                judge_config.model = model;
            }
            if let Some(instructions) = instructions {
                judge_config.prompt = VerdictPrompt::new(instructions);
            }
            let judge = ChatJudge::with_config(judge_config)?;

            let mut grouped: BTreeMap<GroupKey, Vec<ArenaItem>> = BTreeMap::new();
            for item in items {
                let key = item
                    .group
                    .map(GroupKey::Index)
                    .unwrap_or(GroupKey::Ungrouped);
                grouped.entry(key).or_default().push(ArenaItem {
                    id: item.id,
                    text: item.text,
                });
            }

            let mut tournament = Tournament::new(config)?;
            for (key, members) in grouped {
                tournament.setup_group(key, members, max_pairs)?;
            }

            let (trace_sink, trace_worker) = if let Some(path) = trace {
                let (sink, worker) = JsonlTraceSink::new(path)?;
                (Some(sink), Some(worker))
            } else {
                (None, None)
            };
            let trace_ref = trace_sink.as_ref().map(|sink| sink as &dyn TraceSink);

            tournament.run_all_traced(&judge, trace_ref).await?;

            drop(trace_sink);
            if let Some(worker) = trace_worker {
                worker.join()?;
            }

            let mut groups = Vec::new();
            for key in tournament.group_keys() {
                let stats = tournament.group_stats(key)?;
                let standings = tournament
                    .finish_group(key)?
                    .into_iter()
                    .map(|entry| StandingEntry {
                        rank: entry.rank,
                        id: entry.item.id,
                        rating: entry.rating,
                        comparisons: entry.comparisons,
                    })
                    .collect();
                groups.push(GroupReport {
                    group: key,
                    stats,
                    standings,
                });
            }
            let report = RankReport {
                model: judge.model().to_string(),
                groups,
            };
            write_json(&out, &report)?;
        }
        Commands::Eval { case, out } => {
            let results = elo_arena::evaluation::run_synthetic_suite(case.as_deref()).await?;
            let mut file = File::create(out)?;
            for result in &results {
                let line = serde_json::to_string(result)?;
                writeln!(file, "{line}")?;
            }
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
