use std::fs;
use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use dra::{to_text, DraError, Teacher};
use dra_learning::ActiveLearner;

/// Learn a register automaton equivalent to a target DRA via active learning.
#[derive(Parser, Debug)]
#[command(about = "Actively learn a DRA equivalent to a target", version)]
struct Args {
    /// Path to the target DRA in textual format.
    #[arg(long = "inp")]
    inp: String,

    /// Path to write the learned hypothesis DRA.
    #[arg(long = "out")]
    out: String,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(level),
        )
        .init();

    match run(&args) {
        Ok(()) => ExitCode::from(0),
        Err(CliError::MalformedInput(msg)) => {
            error!("malformed input: {msg}");
            ExitCode::from(1)
        }
        Err(CliError::LearningFailure(msg)) => {
            error!("learning failed: {msg}");
            ExitCode::from(2)
        }
    }
}

enum CliError {
    MalformedInput(String),
    LearningFailure(String),
}

impl From<DraError> for CliError {
    fn from(e: DraError) -> Self {
        CliError::MalformedInput(e.to_string())
    }
}

impl From<dra_learning::LearningError> for CliError {
    fn from(e: dra_learning::LearningError) -> Self {
        match e {
            dra_learning::LearningError::Dra(inner) => CliError::MalformedInput(inner.to_string()),
            dra_learning::LearningError::LearningFailure(msg) => CliError::LearningFailure(msg),
        }
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let text = fs::read_to_string(&args.inp).map_err(|e| CliError::MalformedInput(e.to_string()))?;
    let target = dra::from_text(&text)?;
    info!(
        "loaded target DRA with {} locations, {} transitions",
        target.num_locations(),
        target.num_transitions()
    );

    let alphabet = *target.alphabet();
    let mut teacher = Teacher::new(&target);
    let mut learner = ActiveLearner::new(&mut teacher, alphabet);
    let hypothesis = learner.learn()?;

    if args.verbose {
        println!("{}", learner.table().render());
    }

    let rendered = to_text(&hypothesis);
    fs::write(&args.out, rendered).map_err(|e| CliError::MalformedInput(e.to_string()))?;

    let counts = teacher.counts();
    println!("{}", "learning succeeded".green());
    println!("membership queries:   {}", counts.membership);
    println!("equivalence queries:  {}", counts.equivalence);
    println!("memorability queries: {}", counts.memorability);
    println!(
        "target:     {} states, {} transitions",
        target.num_locations(),
        target.num_transitions()
    );
    println!(
        "hypothesis: {} states, {} transitions",
        hypothesis.num_locations(),
        hypothesis.num_transitions()
    );
    Ok(())
}
