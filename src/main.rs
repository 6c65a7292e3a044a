use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

use steward::app::Steward;
use steward::commands::Commands;
use steward::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    // Load configuration from .env, then the environment
    dotenv().ok();
    let config = Config::from_env()?;

    let mut app = Steward::open(&config)?;
    if let Some(user_id) = config.user_id {
        app.sign_in(user_id)
            .inspect_err(|err| log::error!("Could not sign in as {user_id}: {err}"))
            .ok();
    }

    println!("Type `help` for a list of commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Could not read from stdin.")? {
        let line = line.trim();
        if line == "quit" || line == "exit" {
            break;
        }

        let response = match Commands::run_command(&mut app, line).await {
            Ok(message) => message,
            Err(err) => format!("Error: {err:#}"),
        };

        // Blank lines get no answer.
        if response.is_empty() { continue; }
        println!("{response}");
    }

    Ok(())
}
