//! Interactive practice session
//!
//! A rustyline loop over one [`Session`]: typed lines are sent as text
//! payloads, `/audio <path>` sends a recording, slash commands manage the
//! session. Each submission runs one exchange to completion before the next
//! prompt is shown.

use anyhow::{Result, Context};
use crossterm::{execute, style::{Color, Print, ResetColor, SetForegroundColor}};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Helper;
use serde::Serialize;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::exchange::{Exchange, ExchangeReport, Session};
use crate::agent::scenario::Scenario;
use crate::config::Config;
use crate::types::{Payload, Role, Turn};
use crate::voice::audio;

const COMMANDS: &[&str] = &["/audio", "/reset", "/history", "/help", "/quit", "/exit"];

/// Options for a chat session
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Overrides the configured scenario
    pub scenario: Option<Scenario>,
    /// Turn off spoken replies
    pub no_voice: bool,
    /// Directory to write each reply's audio into
    pub save_audio: Option<PathBuf>,
    /// File to write the conversation to on exit
    pub transcript: Option<PathBuf>,
}

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Message(String),
    Audio(PathBuf),
    Reset(Option<Scenario>),
    History,
    Help,
    Quit,
}

/// Parse a non-empty input line
pub fn parse_input(line: &str) -> Result<ChatCommand> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(ChatCommand::Message(line.to_string()));
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command.to_lowercase().as_str() {
        "/audio" if arg.is_empty() => anyhow::bail!("Usage: /audio <path-to-recording>"),
        "/audio" => Ok(ChatCommand::Audio(PathBuf::from(arg))),
        "/reset" | "/new" if arg.is_empty() => Ok(ChatCommand::Reset(None)),
        "/reset" | "/new" => Ok(ChatCommand::Reset(Some(arg.parse()?))),
        "/history" => Ok(ChatCommand::History),
        "/help" | "/?" => Ok(ChatCommand::Help),
        "/quit" | "/exit" => Ok(ChatCommand::Quit),
        other => anyhow::bail!("Unknown command {} (try /help)", other),
    }
}

/// Command and scenario completion
struct TutorHelper;

impl Completer for TutorHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let partial = &line[..pos];

        if let Some(arg) = partial.strip_prefix("/reset ") {
            let matches = Scenario::ALL
                .iter()
                .map(|s| s.slug())
                .filter(|slug| slug.starts_with(arg))
                .map(|slug| Pair {
                    display: slug.to_string(),
                    replacement: slug[arg.len()..].to_string(),
                })
                .collect();
            return Ok((pos, matches));
        }

        if partial.starts_with('/') && !partial.contains(' ') {
            let matches = COMMANDS
                .iter()
                .filter(|c| c.starts_with(partial))
                .map(|c| Pair {
                    display: c.to_string(),
                    replacement: c[partial.len()..].to_string(),
                })
                .collect();
            return Ok((pos, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for TutorHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() || !line.starts_with('/') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|c| c.starts_with(line) && **c != line)
            .map(|c| c[line.len()..].to_string())
    }
}

impl Validator for TutorHelper {
    fn validate(&self, _ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

impl Highlighter for TutorHelper {}

impl Helper for TutorHelper {}

fn print_colored(text: &str, color: Color) {
    let _ = execute!(io::stdout(), SetForegroundColor(color), Print(text), ResetColor);
}

fn print_dim(text: &str) {
    print_colored(text, Color::DarkGrey);
}

fn print_success(text: &str) {
    print_colored(text, Color::Green);
}

fn print_error(text: &str) {
    print_colored(text, Color::Red);
}

fn create_thinking_spinner(scenario: Scenario) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.dim} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("{} is thinking...", scenario.label()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn print_banner(session: &Session, speech: bool) {
    println!();
    print_colored("  BeConfident", Color::Cyan);
    println!(" v{}", crate::VERSION);
    println!("  \x1b[90mscenario\x1b[0m  {}", session.scenario);
    println!("  \x1b[90mvoice\x1b[0m     {}", if speech { "on" } else { "off" });
    println!();
    print_dim("  Type in English to practice. /help for commands.\n\n");
}

fn print_help() {
    println!("  /audio <path>       Send a recording (wav, mp3, ogg, flac)");
    println!("  /reset [scenario]   Start over, optionally in another scenario");
    println!("  /history            Show the conversation so far");
    println!("  /help               Show this help");
    println!("  /quit               Leave the session");
    println!();
    println!("  Scenarios: {}", Scenario::ALL.iter().map(|s| s.slug()).collect::<Vec<_>>().join(", "));
    println!();
}

/// Print an assistant turn: reply, feedback, suggestions and score
pub fn render_assistant_turn(turn: &Turn, spoken_input: bool) {
    if turn.failed {
        print_error(&format!("  {}\n\n", turn.content));
        return;
    }

    print_colored(&format!("  {}\n", turn.content), Color::White);

    if let Some(feedback) = turn.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        print_colored("  Feedback: ", Color::Yellow);
        println!("{}", feedback);
    }

    if !turn.suggestions.is_empty() {
        print_colored("  Try saying:\n", Color::Green);
        for suggestion in &turn.suggestions {
            println!("    - {}", suggestion);
        }
    }

    if spoken_input {
        if let Some(score) = turn.pronunciation_score {
            print_colored("  Pronunciation: ", Color::Magenta);
            println!("{}/100", score);
        }
    }
    println!();
}

fn print_history(session: &Session) {
    if session.conversation.is_empty() {
        print_dim("  (no turns yet)\n\n");
        return;
    }
    for turn in session.conversation.turns() {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "Tutor",
        };
        println!("  [{}] {}: {}", turn.timestamp.format("%H:%M:%S"), speaker, turn.content);
    }
    println!();
}

/// Conversation as written to a transcript file
#[derive(Serialize)]
struct Transcript<'a> {
    session_id: &'a str,
    scenario: Scenario,
    conversation: &'a crate::agent::conversation::Conversation,
}

/// Write the session's conversation as pretty JSON
pub fn write_transcript(session: &Session, path: &Path) -> Result<()> {
    let transcript = Transcript {
        session_id: &session.id,
        scenario: session.scenario,
        conversation: &session.conversation,
    };
    let json = serde_json::to_string_pretty(&transcript)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write transcript {}", path.display()))?;
    Ok(())
}

/// Play and optionally save the audio of the newest assistant turn
async fn deliver_audio(session: &Session, save_dir: Option<&Path>) {
    let index = session.conversation.len().saturating_sub(1);
    let Some(audio) = session.conversation.last().and_then(|t| t.rendered_audio()).cloned() else {
        return;
    };

    if let Some(dir) = save_dir {
        if let Err(e) = audio::save_rendered(&audio, dir, &format!("turn-{:03}", index)) {
            tracing::warn!("Could not save reply audio: {}", e);
        }
    }

    match tokio::task::spawn_blocking(move || audio::play(&audio)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Playback failed: {}", e),
        Err(e) => tracing::warn!("Playback task failed: {}", e),
    }
}

async fn submit(exchange: &Exchange, session: &mut Session, payload: Payload, options: &ChatOptions) -> ExchangeReport {
    let spoken_input = payload.is_audio();
    let thinking = create_thinking_spinner(session.scenario);
    let report = exchange.run_turn(session, payload).await;
    thinking.finish_and_clear();

    if let Some(turn) = session.conversation.last() {
        render_assistant_turn(turn, spoken_input);
    }
    if report.succeeded() {
        deliver_audio(session, options.save_audio.as_deref()).await;
    }
    report
}

/// Run an interactive chat session
pub async fn run_chat(options: ChatOptions) -> Result<()> {
    let config = Config::load()?;
    let api_key = crate::security::resolve_default(io::stdin().is_terminal())?;

    let exchange = Exchange::from_config(&config, &api_key, !options.no_voice);
    let mut session = Session::new(options.scenario.unwrap_or(config.session.scenario));

    print_banner(&session, exchange.speech_enabled());

    let rl_config = rustyline::Config::builder()
        .completion_type(rustyline::CompletionType::List)
        .edit_mode(rustyline::EditMode::Emacs)
        .auto_add_history(true)
        .build();

    let mut rl = rustyline::Editor::<TutorHelper, rustyline::history::DefaultHistory>::with_config(rl_config)
        .context("Failed to initialize line editor")?;
    rl.set_helper(Some(TutorHelper));

    loop {
        let readline = rl.readline("\x1b[32m❯\x1b[0m ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                let command = match parse_input(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        print_error(&format!("  {}\n", e));
                        continue;
                    }
                };

                match command {
                    ChatCommand::Message(text) => {
                        submit(&exchange, &mut session, Payload::Text(text), &options).await;
                    }
                    ChatCommand::Audio(path) => match audio::load_recording(&path) {
                        Ok(clip) => {
                            submit(&exchange, &mut session, Payload::Audio(clip), &options).await;
                        }
                        Err(e) => print_error(&format!("  {:#}\n", e)),
                    },
                    ChatCommand::Reset(scenario) => {
                        session.reset(scenario);
                        print_success(&format!("  New conversation: {}\n\n", session.scenario));
                    }
                    ChatCommand::History => print_history(&session),
                    ChatCommand::Help => print_help(),
                    ChatCommand::Quit => break,
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(err) => {
                print_error(&format!("Error: {}\n", err));
                break;
            }
        }
    }

    if let Some(path) = &options.transcript {
        write_transcript(&session, path)?;
        println!("Transcript saved to {}", path.display());
    }
    print_success("Great practice today. See you next time!\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_message() {
        assert_eq!(
            parse_input("  I go to school yesterday ").unwrap(),
            ChatCommand::Message("I go to school yesterday".into())
        );
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse_input("/quit").unwrap(), ChatCommand::Quit);
        assert_eq!(parse_input("/EXIT").unwrap(), ChatCommand::Quit);
        assert_eq!(parse_input("/history").unwrap(), ChatCommand::History);
        assert_eq!(parse_input("/reset").unwrap(), ChatCommand::Reset(None));
        assert_eq!(
            parse_input("/reset job-interview").unwrap(),
            ChatCommand::Reset(Some(Scenario::JobInterview))
        );
        assert_eq!(
            parse_input("/audio  recordings/take 1.wav").unwrap(),
            ChatCommand::Audio(PathBuf::from("recordings/take 1.wav"))
        );
    }

    #[test]
    fn test_bad_commands() {
        assert!(parse_input("/audio").is_err());
        assert!(parse_input("/reset karaoke").is_err());
        assert!(parse_input("/dance").is_err());
    }

    #[test]
    fn test_write_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(Scenario::OrderingFood);
        session.conversation.push(Turn::user_text("A coffee please"));
        session.conversation.push(Turn::assistant("Coming right up!", "", vec![], 0, None));

        let path = dir.path().join("logs/session.json");
        write_transcript(&session, &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["scenario"], "ordering-food");
        assert_eq!(json["conversation"]["turns"][1]["content"], "Coming right up!");
    }
}
