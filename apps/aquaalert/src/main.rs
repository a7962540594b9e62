use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{load_settings, AquaClient, ClientSettings, PumpState, SignalOutcome};
use shared::domain::PumpCommand;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aquaalert", about = "Leak prediction and pump control client")]
struct Cli {
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[arg(long, global = true)]
    signal_path: Option<String>,
    /// JSON field carrying the pump command (`signal` or `state`).
    #[arg(long, global = true)]
    signal_field: Option<String>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit three pressure readings; unparsable values count as 0.
    Predict {
        #[arg(long, default_value = "")]
        sensor1: String,
        #[arg(long, default_value = "")]
        sensor2: String,
        #[arg(long, default_value = "")]
        pump: String,
    },
    /// Switch the pump on or off.
    Pump { command: PumpCommand },
}

impl Cli {
    fn settings(&self) -> ClientSettings {
        let mut settings = load_settings();
        if let Some(url) = &self.service_url {
            settings.service_url = url.clone();
        }
        if let Some(path) = &self.signal_path {
            settings.signal_path = path.clone();
        }
        if let Some(field) = &self.signal_field {
            settings.signal_field = field.clone();
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let cli = Cli::parse();
    let client = AquaClient::from_settings(&cli.settings())?;

    match &cli.command {
        Command::Predict {
            sensor1,
            sensor2,
            pump,
        } => {
            client.prediction.set_inputs(sensor1, sensor2, pump).await;
            let result = client.prediction.evaluate_inputs().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&client.prediction.snapshot().await)?);
            } else {
                println!("Leakage: {}", result.display_text());
            }
        }
        Command::Pump { command } => {
            let outcome = client.pump.set_state_and_wait(*command).await;
            let state = client.pump.snapshot().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_pump_state(&state, &outcome, client.pump.animation().await);
            }
        }
    }

    Ok(())
}

fn print_pump_state(
    state: &PumpState,
    outcome: &SignalOutcome,
    animation: client_core::AnimationDirective,
) {
    let confirmed = state
        .confirmed
        .map(|command| command.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("Pump: {confirmed}");
    println!("Output: {}", state.output());
    println!(
        "Animation: playing={} opacity={} transition={}ms",
        animation.playing,
        animation.target_opacity,
        animation.transition().as_millis()
    );
    if let SignalOutcome::RolledBack { error, .. } = outcome {
        println!("Error: {error}");
    }
}
