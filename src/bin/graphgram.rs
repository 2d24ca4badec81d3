//! Command-line front end (§4.9): apply one or more grammar files in
//! sequence to a single evolving graph, then write the result as SVG.
//!
//! `NoMatch` is caught here rather than propagated: per §7, a grammar
//! running out of applicable rules is a normal stopping condition, not
//! a failure, so it logs and moves on to the next grammar file (or to
//! rendering, if it was the last one) instead of producing a nonzero
//! exit code.

use clap::Parser;
use graphgram::driver::{EngineOptions, Profile, Runner};
use graphgram::error::GraphGramError;
use graphgram::{parse, render};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "graphgram", about = "A graph grammar engine", version)]
struct Cli {
    /// One or more grammar files (JSON), applied in sequence to the
    /// same evolving graph. The first file's `start` graph seeds the
    /// run; later files continue from where the previous one stopped.
    #[arg(required = true)]
    grammar: Vec<PathBuf>,

    /// Maximum number of rewrite iterations per grammar file.
    #[arg(short, long, default_value_t = 100)]
    iterations: usize,

    /// Where to write the final graph as SVG.
    #[arg(short, long, default_value = "soffit.svg")]
    output: PathBuf,

    /// Log per-rule match-finding timing after each grammar file.
    #[arg(long)]
    profile: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seed the random number generator for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn run(cli: &Cli) -> Result<(), GraphGramError> {
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let opts = EngineOptions {
        iterations: cli.iterations,
        seed: cli.seed,
        profile: cli.profile,
        ..EngineOptions::default()
    };

    let mut runner: Option<Runner> = None;

    for path in &cli.grammar {
        let text = std::fs::read_to_string(path).map_err(|source| GraphGramError::Io {
            path: path.clone(),
            source,
        })?;
        let grammar = parse::load_grammar(&text)?;

        let r = runner.get_or_insert_with(|| Runner::new(grammar.start.clone()));

        let mut profile = cli.profile.then(Profile::new);
        log::info!("applying grammar {:?} for up to {} iteration(s)", path, cli.iterations);
        match r.run(&grammar, cli.iterations, &mut rng, &opts, profile.as_mut()) {
            Ok(()) => log::info!("grammar {:?} reached its iteration limit", path),
            Err(no_match) => log::info!(
                "grammar {:?} stopped at iteration {}: no rule matched",
                path,
                no_match.iteration
            ),
        }
        if let Some(p) = &profile {
            p.log_report();
        }
    }

    let Some(runner) = runner else {
        return Ok(());
    };
    render::write_svg(&runner.graph, &cli.output).map_err(|source| GraphGramError::Io {
        path: cli.output.clone(),
        source,
    })?;
    log::info!("wrote {:?}", cli.output);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
