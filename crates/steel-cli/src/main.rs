//! steelvoice: pedal steel voicing search and voice-leading from the command line
//!
//! - `combos`: list legal control combinations and unresolved conflicts
//! - `voicings`: find every voicing of a chord
//! - `identify`: name the chord a set of strings produces
//! - `progression`: voice a chord progression with minimal movement
//! - `config`: write or show the engine config

mod config;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use steel_core::{
    Chord, ControlCombination, Copedent, Direction, DirectionalHints, SteelError,
    detect_conflicts, extend_to_upper_octave, filter_intervals, generate_valid_control_combinations,
    identify_chord,
};
use steel_services::{EngineConfig, ProgressionPlanner, VoicingCache, load_copedent};
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pedal steel guitar voicing assistant
#[derive(Parser)]
#[command(name = "steelvoice")]
#[command(about = "Find pedal steel voicings and voice-lead chord progressions")]
#[command(version)]
struct Cli {
    /// Copedent JSON file (default: built-in standard E9)
    #[arg(short, long, global = true)]
    copedent: Option<PathBuf>,

    /// Engine config file (default: <config dir>/steelvoice/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum DirectionArg {
    Any,
    Ascending,
    Descending,
    Minimal,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Any => Direction::Any,
            DirectionArg::Ascending => Direction::Ascending,
            DirectionArg::Descending => Direction::Descending,
            DirectionArg::Minimal => Direction::Minimal,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List legal control combinations
    Combos {
        /// Show conflicting controls with no declared split instead
        #[arg(long)]
        conflicts: bool,
    },

    /// Find voicings of a chord across frets 0-11
    Voicings {
        /// Chord root (e.g. "C", "Bb", "F#")
        root: String,

        /// Chord type name or symbol (e.g. "Major Triad", "m7")
        chord_type: String,

        /// Maximum voicings kept per fret
        #[arg(short = 'n', long)]
        max: Option<usize>,

        /// Restrict to these strings (best voicing per fret)
        #[arg(long, value_delimiter = ',')]
        strings: Option<Vec<u8>>,

        /// Silence duplicate unisons
        #[arg(long)]
        collapse: bool,

        /// Leave out these intervals (semitones above the root)
        #[arg(long, value_delimiter = ',')]
        omit: Vec<u8>,

        /// Retry without the fifth and upper extensions when nothing fits
        #[arg(long)]
        simplify: bool,

        /// Also list the same shapes at frets 12-23
        #[arg(long)]
        upper_octave: bool,
    },

    /// Name the chord sounded by strings at a fret
    Identify {
        #[arg(long)]
        fret: u8,

        /// Played strings, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        strings: Vec<u8>,

        #[arg(long, value_delimiter = ',')]
        pedals: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        levers: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        mechanisms: Vec<String>,
    },

    /// Voice a progression given as ROOT:TYPE steps (e.g. "C:Major Triad" "G:7")
    Progression {
        #[arg(required = true, num_args = 1..)]
        chords: Vec<String>,

        /// Preferred bar movement between every pair of chords
        #[arg(long, default_value = "any")]
        direction: DirectionArg,

        /// Override the movement into one step, as STEP=DIRECTION (1-based)
        #[arg(long = "step-direction", value_parser = parse_step_direction)]
        step_directions: Vec<(usize, Direction)>,

        /// Restrict to these strings
        #[arg(long, value_delimiter = ',')]
        strings: Option<Vec<u8>>,

        /// Rank alternatives for this step (1-based) of the chosen path
        #[arg(long)]
        alternatives: Option<usize>,
    },

    /// Manage the engine config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config in effect
    Show,
}

fn parse_step_direction(s: &str) -> Result<(usize, Direction), String> {
    let (step, direction) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STEP=DIRECTION, got '{s}'"))?;
    let step: usize = step.trim().parse().map_err(|_| format!("invalid step '{step}'"))?;
    if step < 2 {
        return Err("the first step has no incoming movement".to_string());
    }
    let direction = match direction.trim().to_ascii_lowercase().as_str() {
        "any" => Direction::Any,
        "ascending" | "up" => Direction::Ascending,
        "descending" | "down" => Direction::Descending,
        "minimal" | "stay" => Direction::Minimal,
        other => return Err(format!("unknown direction '{other}'")),
    };
    Ok((step - 1, direction))
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["steelvoice=info", "steel_services=info"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_instrument(path: Option<&Path>) -> anyhow::Result<Copedent> {
    match path {
        Some(path) => {
            load_copedent(path).with_context(|| format!("loading copedent {}", path.display()))
        }
        None => Ok(Copedent::standard_e9()),
    }
}

fn print<T: Serialize>(format: OutputFormat, value: &T, table: impl FnOnce() -> String) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => println!("{}", table()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Reject string and control ids the copedent does not define
fn check_ids(copedent: &Copedent, strings: &[u8], combo: &ControlCombination) -> Result<(), SteelError> {
    if let Some(&id) = strings.iter().find(|&&id| copedent.string(id).is_none()) {
        return Err(SteelError::UnknownString(id));
    }
    if let Some(id) = combo.ids().find(|id| copedent.changes_for(id).is_none()) {
        return Err(SteelError::UnknownControl(id.to_string()));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let engine = config::load_config(cli.config.as_deref());
    let copedent = load_instrument(cli.copedent.as_deref())?;
    debug!(copedent = %copedent.id, strings = copedent.strings.len(), "Using copedent");

    let cache = Arc::new(match engine.cache.max_entries {
        Some(max) => VoicingCache::with_capacity(max),
        None => VoicingCache::new(),
    });
    let planner = ProgressionPlanner::new(Arc::clone(&cache), engine.clone());

    match cli.command {
        Commands::Combos { conflicts } => {
            if conflicts {
                let found = detect_conflicts(&copedent);
                print(cli.format, &found, || render::conflicts(&found))?;
            } else {
                let combos = generate_valid_control_combinations(&copedent);
                print(cli.format, &combos, || render::combinations(&combos))?;
            }
        }

        Commands::Voicings { root, chord_type, max, strings, collapse, omit, simplify, upper_octave } => {
            let chord = Chord::parse(&root, &chord_type)?;
            let mut options = planner.default_options();
            if let Some(max) = max {
                options.max_per_fret = max;
            }
            options.collapse_unisons |= collapse;

            let search = |intervals: &[u8]| match &strings {
                Some(ids) => cache.find_voicings_on_strings(&copedent, chord.root, intervals, ids, options.tier),
                None => cache.find_voicings(&copedent, chord.root, intervals, &options),
            };
            let intervals = filter_intervals(chord.intervals(), &omit);
            let mut voicings = search(&intervals);
            if voicings.is_empty() && simplify {
                let reduced = filter_intervals(&chord.chord_type.reduced_intervals(), &omit);
                info!(chord = %chord, ?reduced, "No voicings, retrying simplified");
                voicings = search(&reduced);
            }
            if upper_octave {
                voicings = extend_to_upper_octave(&voicings);
            }
            print(cli.format, &voicings, || render::voicings(&voicings, chord.root))?;
        }

        Commands::Identify { fret, strings, pedals, levers, mechanisms } => {
            let combo = ControlCombination { pedals, levers, mechanisms };
            check_ids(&copedent, &strings, &combo)?;
            let candidates = identify_chord(&copedent, fret, &strings, &combo);
            print(cli.format, &candidates, || render::candidates(&candidates))?;
        }

        Commands::Progression { chords, direction, step_directions, strings, alternatives } => {
            let chords = chords
                .iter()
                .map(|spec| Chord::parse_spec(spec).with_context(|| format!("parsing chord '{spec}'")))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut hints = DirectionalHints::global(direction.into());
            hints.per_step.extend(step_directions);
            let options = planner.default_options();

            let path = planner.optimize_progression(&copedent, &chords, strings.as_deref(), &hints, &options)?;

            match alternatives {
                Some(step) if step == 0 || step > chords.len() => {
                    bail!("step {step} is outside the progression (1-{})", chords.len());
                }
                Some(step) => {
                    let i = step - 1;
                    let ranked = planner.rank_alternatives_for_step(
                        &copedent,
                        i,
                        &chords[i],
                        i.checked_sub(1).map(|p| &path.path[p]),
                        path.path.get(i + 1),
                        strings.as_deref(),
                        &hints,
                        &options,
                    );
                    print(cli.format, &ranked, || render::alternatives(&ranked, chords[i].root))?;
                }
                None => print(cli.format, &path, || render::path(&chords, &path))?,
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                let path = cli.config.clone().unwrap_or_else(config::config_path);
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                let written = config::save_config(&EngineConfig::default(), Some(&path))?;
                info!(path = %written.display(), "Wrote default config");
            }
            ConfigAction::Show => {
                print(cli.format, &engine, || toml::to_string_pretty(&engine).unwrap_or_default())?;
            }
        },
    }

    cache.cleanup(engine.cache.max_age(), engine.cache.max_entries);
    debug!(stats = ?cache.stats(), "Voicing cache");
    Ok(())
}
