//! PodcastAI CLI - Live AI Podcast
//!
//! Runs the show headless: two AI hosts discuss listener-voted topics while
//! events stream to the console and commands are read from stdin.

mod commands;
mod console;

use clap::{ArgAction, Parser};
use colored::Colorize;
use podcastai_core::{
    ApiConfig, AudioDirectory, Collaborators, Config, KokoroSynthesizer, OpenAiCommentGenerator,
    OpenAiDialogueGenerator, Show, default_config,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use commands::Command;

#[derive(Parser)]
#[command(
    name = "podcastai",
    version,
    about = "Live AI Podcast - two AI hosts discuss the topics you vote for",
    long_about = "Runs a never-ending podcast between two AI hosts using OpenAI-compatible APIs and local kokoro TTS."
)]
struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed topic (specify once per topic)
    #[arg(short, long, action = ArgAction::Append, value_name = "TOPIC")]
    topic: Vec<String>,

    /// Do not start the show until the `start` command
    #[arg(long)]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });
    let api = ApiConfig::new(api_base, api_key);

    println!("{}", "Loading TTS model...".dimmed());
    let audio = AudioDirectory::new(&config.audio)?;
    let speech = KokoroSynthesizer::new(config.voices.clone(), audio.clone()).await?;

    let collaborators = Collaborators {
        dialogue: Arc::new(OpenAiDialogueGenerator::new(&api, &config.models)?),
        speech: Arc::new(speech),
        comments: Arc::new(OpenAiCommentGenerator::new(&api, &config.models)?),
        artifacts: Arc::new(audio),
    };
    let show = Show::new(config, collaborators);

    for text in &cli.topic {
        show.create_topic(text, Some("cli"))?;
    }

    let mut events = show.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            console::print_event(&event);
        }
    });

    console::print_header(cli.topic.len(), !cli.no_autostart);
    if !cli.no_autostart {
        show.start();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    // Headless: keep broadcasting until interrupted.
                    stdin_open = false;
                    continue;
                };
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(command)) => match commands::execute(&show, command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                    },
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                }
            }
        }
    }

    show.stop().await;
    printer.abort();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Show ended.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}
