use std::fs;
use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use dra::{to_text, DraError};
use dra_learning::RpniLearner;

/// Learn a register automaton from a labeled sample via the RPNI-style
/// passive learner.
#[derive(Parser, Debug)]
#[command(about = "Passively learn a DRA from a labeled sample", version)]
struct Args {
    /// Path to the sample in textual format.
    #[arg(long = "inp")]
    inp: String,

    /// Path to write the learned DRA.
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
    let sample = dra::sample_from_text(&text)?;
    info!(
        "loaded sample with {} positive, {} negative words",
        sample.positive.len(),
        sample.negative.len()
    );

    let learner = RpniLearner::new(&sample);
    let hypothesis = learner.learn()?;

    let rendered = to_text(&hypothesis);
    fs::write(&args.out, rendered).map_err(|e| CliError::MalformedInput(e.to_string()))?;

    println!("{}", "learning succeeded".green());
    println!(
        "hypothesis: {} states, {} transitions",
        hypothesis.num_locations(),
        hypothesis.num_transitions()
    );
    Ok(())
}
