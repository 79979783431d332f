//! Headless match runner (default binary).
//!
//! Plays one authoritative match with scripted inputs and prints the final
//! boards. Logging goes through `env_logger` (`RUST_LOG=debug` for phase detail).
//!
//! ```text
//! towers-sim [--seed N] [--seats N] [--ticks N] [--verbosity quiet|normal|verbose]
//! ```

use anyhow::Result;

use towers::core::GameConfig;
use towers::sim::{parse_sim_args, run_sim};
use towers::term::BoardRenderer;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let sim = parse_sim_args(&args)?;
    let report = run_sim(&sim, GameConfig::from_env())?;

    let renderer = BoardRenderer::new(sim.verbosity);
    let mut out = String::new();
    for board in &report.snapshot.boards {
        renderer.render_into(board, &mut out);
        out.push('\n');
    }
    print!("{}", out);
    println!(
        "seed {} | {} ticks | {} rejected | {}",
        report.snapshot.seed,
        report.ticks_run,
        report.rejected,
        if report.ended { "match over" } else { "tick limit" }
    );
    Ok(())
}
