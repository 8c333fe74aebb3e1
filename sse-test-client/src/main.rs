use anyhow::Result;
use clap::Parser;
use colored::*;

mod api_client;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the relay (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Handshake frame on a fresh subscription (relay in broadcast mode)
    Handshake,
    /// Fan-out reaches same-category subscribers only (broadcast mode)
    Fanout,
    /// Wildcard subscribers see every category (broadcast mode)
    Wildcard,
    /// Live stream counts on /events/stats (broadcast mode)
    Stats,
    /// Attach, conflict, publish, and delivery for one session (session mode)
    SessionLifecycle,
    /// Re-attach after the consumer disconnects (session mode)
    SessionReattach,
    /// Run every broadcast-mode scenario
    AllBroadcast,
    /// Run every session-mode scenario
    AllSession,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    println!("{} Checking relay health...", "→".blue());
    let client = reqwest::Client::new();
    let api_client = ApiClient::new(client, cli.base_url.clone());
    api_client.check_health().await?;
    println!("{} Relay is reachable at {}", "✓".green(), cli.base_url);

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::Handshake => {
            results.push(scenarios::test_handshake(&cli.base_url).await?);
        }
        ScenarioChoice::Fanout => {
            results.push(scenarios::test_fanout(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::Wildcard => {
            results.push(scenarios::test_wildcard(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::Stats => {
            results.push(scenarios::test_stats(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::SessionLifecycle => {
            results.push(scenarios::test_session_lifecycle(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::SessionReattach => {
            results.push(scenarios::test_session_reattach(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::AllBroadcast => {
            results.push(scenarios::test_handshake(&cli.base_url).await?);
            results.push(scenarios::test_fanout(&api_client, &cli.base_url).await?);
            results.push(scenarios::test_wildcard(&api_client, &cli.base_url).await?);
            results.push(scenarios::test_stats(&api_client, &cli.base_url).await?);
        }
        ScenarioChoice::AllSession => {
            results.push(scenarios::test_session_lifecycle(&api_client, &cli.base_url).await?);
            results.push(scenarios::test_session_reattach(&api_client, &cli.base_url).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
