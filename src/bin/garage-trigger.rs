//! Command-line client for the garage door manager.
//!
//! Usage:
//!   garage-trigger state
//!   garage-trigger --host 10.0.0.5 open
//!   garage-trigger firebase:<device-id>

use clap::Parser;
use garage_door_manager::command::send_command;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "garage-trigger")]
#[command(about = "Send one command to the garage door manager")]
struct Cli {
    /// Manager host
    #[arg(long, env = "LISTEN_HOST", default_value = "localhost")]
    host: String,

    /// Manager port
    #[arg(long, env = "LISTEN_PORT", default_value_t = 6000)]
    port: u16,

    /// Shared authentication key
    #[arg(long, env = "AUTH_KEY", default_value = "secret password", hide_env_values = true)]
    key: String,

    /// Command to send (open, close, trigger, away, home, state)
    command: Option<String>,
}

fn main() -> ExitCode {
    garage_door_manager::config::load_dotenv();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("You must pass a parameter. (open, close, trigger, away, home, state)");
        return ExitCode::FAILURE;
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = format!("{}:{}", cli.host, cli.port);
    match runtime.block_on(send_command(&addr, cli.key.as_bytes(), &command)) {
        Ok(response) => {
            println!("{}", response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to send command to {}: {}", addr, e);
            ExitCode::FAILURE
        }
    }
}
