use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use env_logger::Env;
use log::LevelFilter;

use passview::diff;
use passview::frontend::{Frontend, Invocation, PipelineRequest};
use passview::group::TimelineEntry;
use passview::id::RecordIndex;
use passview::record::Timeline;
use passview::render::{GroupedList, RecordList};
use passview::resolve::{self, Edge, SessionCache};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitKind {
    Records,
    Groups,
    Json,
    Validate,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EdgeArg {
    Before,
    After,
}

impl From<EdgeArg> for Edge {
    fn from(e: EdgeArg) -> Self {
        match e {
            EdgeArg::Before => Edge::Before,
            EdgeArg::After => Edge::After,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "passview",
    version,
    about = "Optimizer pass timeline: parses IR dump traces and resolves per-pass IR"
)]
struct Cli {
    /// Trace file captured from the optimizer's IR dump output
    trace: PathBuf,

    /// Source file the trace was produced from (selects the frontend)
    #[arg(long, conflicts_with = "file_kind")]
    source: Option<PathBuf>,

    /// Frontend kind: ll, c, cpp, rs
    #[arg(long)]
    file_kind: Option<String>,

    /// Optimization level (O0..Oz) or pass pipeline the trace was captured with
    #[arg(long, default_value = "O2")]
    pipeline: String,

    /// Output form
    #[arg(long, value_enum, default_value_t = EmitKind::Groups)]
    emit: EmitKind,

    /// Expand every group in the grouped listing
    #[arg(long)]
    expand: bool,

    /// Print the resolved IR of record N instead of a listing
    #[arg(long, value_name = "N")]
    show: Option<u32>,

    /// Which side of the pass to print with --show
    #[arg(long, value_enum, default_value_t = EdgeArg::After, requires = "show")]
    edge: EdgeArg,

    /// Print only the pass's target functions and their declarations
    #[arg(long, requires = "show")]
    focus: bool,

    /// Demote passes whose resolved IR does not change
    #[arg(long)]
    reclassify: bool,

    /// Print stage timing and debug logging
    #[arg(long)]
    verbose: bool,
}

/// `--emit json` document: the timeline's fields plus the grouped view.
#[derive(serde::Serialize)]
struct JsonSession<'a> {
    #[serde(flatten)]
    timeline: &'a Timeline,
    groups: &'a [TimelineEntry],
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp(None);
    let _ = builder.try_init();
}

fn stage_done(verbose: bool, stage: &str, started: Instant) {
    if verbose {
        eprintln!(
            "passview: {} complete, {:.1}ms",
            stage,
            started.elapsed().as_secs_f64() * 1000.0
        );
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.verbose {
        eprintln!("passview: trace    = {}", cli.trace.display());
        eprintln!("passview: pipeline = {}", cli.pipeline);
    }

    // ── Invocation ──
    let frontend = match (&cli.source, &cli.file_kind) {
        (Some(path), _) => Frontend::from_path(path),
        (None, Some(kind)) => kind.parse::<Frontend>(),
        (None, None) => Ok(Frontend::LlvmIr),
    };
    let frontend = match frontend {
        Ok(f) => f,
        Err(e) => {
            eprintln!("passview: error: {}", e);
            std::process::exit(2);
        }
    };
    let request = match PipelineRequest::parse(&cli.pipeline) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("passview: error: {}", e);
            std::process::exit(2);
        }
    };
    let invocation = Invocation::new(frontend, request);

    // ── Read and parse trace ──
    let text = match std::fs::read_to_string(&cli.trace) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("passview: error: {}: {}", cli.trace.display(), e);
            std::process::exit(2);
        }
    };

    let started = Instant::now();
    let mut timeline = match passview::trace::parse_trace(&text, &invocation) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("passview: error: {}", e);
            std::process::exit(1);
        }
    };
    stage_done(cli.verbose, "parse", started);
    if cli.verbose {
        let changed = timeline.records().iter().filter(|r| r.changed).count();
        eprintln!(
            "passview: {} records, {} changed{}",
            timeline.len(),
            changed,
            if timeline.initial_is_partial() {
                " (no initial dump)"
            } else {
                ""
            }
        );
    }

    if cli.reclassify {
        let started = Instant::now();
        match resolve::reclassify_unchanged(&mut timeline) {
            Ok(demoted) => {
                stage_done(cli.verbose, "reclassify", started);
                if cli.verbose {
                    eprintln!("passview: {} records demoted", demoted.len());
                }
            }
            Err(e) => {
                eprintln!("passview: error: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut cache = SessionCache::new(&timeline);

    // ── Show one record ──
    if let Some(n) = cli.show {
        let index = RecordIndex(n);
        let edge = Edge::from(cli.edge);
        let started = Instant::now();
        let lines = if cli.focus {
            resolve::focused(&timeline, &mut cache, index, edge)
        } else {
            resolve::resolve(&timeline, &mut cache, index, edge).map(|s| s.as_ref().clone())
        };
        match lines {
            Ok(lines) => {
                stage_done(cli.verbose, "resolve", started);
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => {
                eprintln!("passview: error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Emit ──
    match cli.emit {
        EmitKind::Records => print!("{}", RecordList { timeline: &timeline }),
        EmitKind::Groups => {
            let started = Instant::now();
            let entries = match cache.groups(&timeline) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("passview: error: {}", e);
                    std::process::exit(1);
                }
            };
            stage_done(cli.verbose, "group", started);
            print!(
                "{}",
                GroupedList {
                    timeline: &timeline,
                    entries,
                    expand_all: cli.expand,
                }
            );
        }
        EmitKind::Json => {
            let groups = match cache.groups(&timeline) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("passview: error: {}", e);
                    std::process::exit(1);
                }
            };
            let session = JsonSession {
                timeline: &timeline,
                groups,
            };
            match serde_json::to_string_pretty(&session) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("passview: error: {}", e);
                    std::process::exit(2);
                }
            }
        }
        EmitKind::Validate => {
            let started = Instant::now();
            let diags = match diff::validate(&timeline, &mut cache) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("passview: error: {}", e);
                    std::process::exit(1);
                }
            };
            stage_done(cli.verbose, "validate", started);
            for d in &diags {
                eprintln!("passview: {}", d);
            }
            let errors = diags.iter().filter(|d| d.is_error()).count();
            println!(
                "{} records checked, {} warnings, {} errors",
                timeline.len(),
                diags.len() - errors,
                errors
            );
            if errors > 0 {
                std::process::exit(1);
            }
        }
    }
}
