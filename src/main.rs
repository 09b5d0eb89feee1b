use clap::{Parser, Subcommand};
use serde::Serialize;

use corpus_planner::api::{
    GoalArgs, PlanArgs, build_goal, build_plan, goal_response, monte_carlo_response,
    run_http_server, simulate_response,
};
use corpus_planner::core::SimulationCache;

#[derive(Parser, Debug)]
#[command(
    name = "corpus-planner",
    about = "Project an investment corpus through accumulation and retirement withdrawals"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run the deterministic two-phase projection
    Simulate(PlanArgs),
    /// Run randomized-return scenarios and print percentile bands
    MonteCarlo(PlanArgs),
    /// Solve for the monthly contribution that funds a spending goal
    Goal(GoalArgs),
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Simulate(args) => build_plan(&args)
            .map(|request| simulate_response(&mut SimulationCache::default(), &request))
            .map_err(|e| e.to_string())
            .and_then(|response| print_json(&response)),
        Command::MonteCarlo(args) => build_plan(&args)
            .map(|request| monte_carlo_response(&request))
            .map_err(|e| e.to_string())
            .and_then(|aggregate| print_json(&aggregate)),
        Command::Goal(args) => build_goal(&args)
            .map(|inputs| goal_response(&inputs))
            .map_err(|e| e.to_string())
            .and_then(|result| print_json(&result)),
    };

    if let Err(e) = outcome {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("JSON error: {e}"))?;
    println!("{json}");
    Ok(())
}
