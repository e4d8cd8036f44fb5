//! CLI interface for beconfident

use anyhow::{Result, Context, bail};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::exchange::{Exchange, Session};
use crate::agent::interactive::{self, ChatOptions};
use crate::agent::scenario::Scenario;
use crate::config::{self, Config};
use crate::types::Payload;

#[derive(Parser)]
#[command(name = "beconfident")]
#[command(about = "Practice spoken English in roleplay scenarios with instant feedback", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive practice session (default)
    Chat {
        /// Roleplay scenario
        #[arg(short, long, value_enum)]
        scenario: Option<Scenario>,
        /// Don't speak replies
        #[arg(long)]
        no_voice: bool,
        /// Save each reply's audio into this directory
        #[arg(long, value_name = "DIR")]
        save_audio: Option<PathBuf>,
        /// Write the conversation as JSON to this file on exit
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },
    /// Send one message (or recording) and print the tutor's reply as JSON
    #[command(group(ArgGroup::new("input").required(true).args(["text", "audio"])))]
    Ask {
        /// What to say
        text: Option<String>,
        /// Recording to send instead of text
        #[arg(short, long, value_name = "FILE")]
        audio: Option<PathBuf>,
        /// Roleplay scenario
        #[arg(short, long, value_enum)]
        scenario: Option<Scenario>,
        /// Don't synthesize the reply
        #[arg(long)]
        no_voice: bool,
        /// Write the reply audio to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List roleplay scenarios
    Scenarios,
    /// Manage configuration
    Config {
        /// Store the Google API key in the keyring
        #[arg(long)]
        set_api_key: Option<String>,
        /// Remove the stored API key
        #[arg(long)]
        delete_api_key: bool,
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Comma separated model candidates, tried in order
        #[arg(long, value_name = "LIST")]
        set_models: Option<String>,
        /// Voice for spoken replies
        #[arg(long)]
        set_voice: Option<String>,
        /// Default scenario
        #[arg(long, value_enum)]
        set_scenario: Option<Scenario>,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            interactive::run_chat(ChatOptions::default()).await?;
        }
        Some(Commands::Chat { scenario, no_voice, save_audio, transcript }) => {
            interactive::run_chat(ChatOptions {
                scenario,
                no_voice,
                save_audio,
                transcript,
            })
            .await?;
        }
        Some(Commands::Ask { text, audio, scenario, no_voice, output }) => {
            ask(text, audio, scenario, no_voice, output).await?;
        }
        Some(Commands::Scenarios) => {
            let default = Config::load().map(|c| c.session.scenario).unwrap_or_default();
            println!("Scenarios:\n");
            for scenario in Scenario::ALL {
                let marker = if scenario == default { "*" } else { " " };
                println!("{} {:<22} {}", marker, scenario.slug(), scenario.character());
            }
            println!("\n* default (change with: beconfident config --set-scenario <name>)");
        }
        Some(Commands::Config { set_api_key, delete_api_key, show, set_models, set_voice, set_scenario, reset }) => {
            if let Some(key) = set_api_key {
                if key.trim().is_empty() {
                    bail!("API key cannot be empty");
                }
                crate::security::set_api_key(key.trim())?;
                println!("Google API key stored securely in keyring.");
            } else if delete_api_key {
                crate::security::delete_api_key()?;
                println!("Google API key removed.");
            } else if let Some(list) = set_models {
                config::set_models(&list)?;
            } else if let Some(voice) = set_voice {
                config::set_voice(&voice)?;
            } else if let Some(scenario) = set_scenario {
                config::set_scenario(scenario)?;
            } else if reset {
                config::reset_config()?;
            } else if show {
                config::show_config()?;
            } else {
                config::show_config()?;
                println!();
                println!("Use --help to see configuration options.");
            }
        }
    }

    Ok(())
}

async fn ask(
    text: Option<String>,
    audio: Option<PathBuf>,
    scenario: Option<Scenario>,
    no_voice: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let payload = match (text, audio) {
        (_, Some(path)) => Payload::Audio(crate::voice::audio::load_recording(&path)?),
        (Some(text), None) if !text.trim().is_empty() => Payload::Text(text.trim().to_string()),
        _ => bail!("Nothing to say: pass some text or --audio <file>"),
    };

    let config = Config::load()?;
    let api_key = crate::security::resolve_default(false)?;
    let exchange = Exchange::from_config(&config, &api_key, !no_voice);
    let mut session = Session::new(scenario.unwrap_or(config.session.scenario));

    let report = exchange.run_turn(&mut session, payload).await;
    let turn = session
        .conversation
        .last()
        .context("Exchange finished without a reply")?;

    if let (Some(path), Some(audio)) = (&output, turn.rendered_audio()) {
        std::fs::write(path, audio.bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Reply audio written to {} ({})", path.display(), audio.format().extension());
    } else if output.is_some() {
        eprintln!("No reply audio was produced.");
    }

    let out = serde_json::json!({
        "model": &report.model,
        "scenario": session.scenario,
        "turn": turn,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
