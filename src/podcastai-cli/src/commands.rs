//! Line-oriented commands read from stdin while the show runs.

use colored::Colorize;
use podcastai_core::{EnqueueOutcome, PodcastError, Reaction, Show, TopicId};

pub const HELP: &str = "\
Commands:
  add <text>                 submit a topic
  topics                     list topics by score
  vote <id> [delta]          vote on a topic (default +1)
  react <id> <up|down>       thumbs up / thumbs down
  queue [id]                 show the queue, or enqueue a topic
  clear                      clear the queue
  chat <nick> <message>      post a chat message
  transcript [n]             last n transcript lines (default 10)
  status                     engine status
  start | stop               control the engine
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(String),
    Topics,
    Vote { topic: String, delta: i64 },
    React { topic: String, reaction: Reaction },
    ShowQueue,
    Enqueue(String),
    Clear,
    Chat { nickname: String, message: String },
    Transcript(usize),
    Status,
    Start,
    Stop,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match word.to_lowercase().as_str() {
            "add" if !rest.is_empty() => Command::Add(rest.to_string()),
            "add" => return Err("usage: add <text>".to_string()),
            "topics" | "ls" => Command::Topics,
            "vote" => {
                let topic = args.next().ok_or("usage: vote <id> [delta]")?.to_string();
                let delta = match args.next() {
                    Some(d) => d.parse().map_err(|_| format!("invalid delta '{}'", d))?,
                    None => 1,
                };
                Command::Vote { topic, delta }
            }
            "react" => {
                let topic = args.next().ok_or("usage: react <id> <up|down>")?.to_string();
                let reaction = args
                    .next()
                    .ok_or("usage: react <id> <up|down>")?
                    .parse()
                    .map_err(|e: PodcastError| e.to_string())?;
                Command::React { topic, reaction }
            }
            "queue" | "q" => match args.next() {
                Some(id) => Command::Enqueue(id.to_string()),
                None => Command::ShowQueue,
            },
            "clear" => Command::Clear,
            "chat" => {
                let (nickname, message) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: chat <nick> <message>")?;
                Command::Chat {
                    nickname: nickname.to_string(),
                    message: message.trim().to_string(),
                }
            }
            "transcript" | "t" => match args.next() {
                Some(n) => Command::Transcript(n.parse().map_err(|_| format!("invalid count '{}'", n))?),
                None => Command::Transcript(10),
            },
            "status" => Command::Status,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };

        Ok(Some(command))
    }
}

/// Resolve a full topic id or a unique prefix of one.
fn resolve_topic(show: &Show, needle: &str) -> Result<TopicId, String> {
    if let Ok(id) = needle.parse::<TopicId>() {
        return Ok(id);
    }

    let matches: Vec<TopicId> = show
        .list_topics()
        .into_iter()
        .map(|ranked| ranked.topic.id)
        .filter(|id| id.to_string().starts_with(needle))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(format!("no topic matches '{}'", needle)),
        _ => Err(format!("'{}' is ambiguous", needle)),
    }
}

fn short_id(id: &TopicId) -> String {
    id.to_string().chars().take(8).collect()
}

/// Run a command. Returns `false` when the user asked to quit.
pub async fn execute(show: &Show, command: Command) -> Result<bool, String> {
    match command {
        Command::Add(text) => {
            let topic = show.create_topic(&text, Some("cli")).map_err(|e| e.to_string())?;
            println!("{} {} {}", "added".green(), short_id(&topic.id).dimmed(), topic.text);
        }
        Command::Topics => {
            let topics = show.list_topics();
            if topics.is_empty() {
                println!("{}", "no topics yet".dimmed());
            }
            for ranked in topics {
                println!(
                    "  {}  {:>7.2}  {:>3} votes  👍{} 👎{}  {}",
                    short_id(&ranked.topic.id).dimmed(),
                    ranked.score,
                    ranked.topic.votes,
                    ranked.topic.thumbs_up,
                    ranked.topic.thumbs_down,
                    ranked.topic.text
                );
            }
        }
        Command::Vote { topic, delta } => {
            let id = resolve_topic(show, &topic)?;
            let topic = show.vote(&id, delta).map_err(|e| e.to_string())?;
            println!("{} now has {} votes", topic.text.bright_white(), topic.votes);
        }
        Command::React { topic, reaction } => {
            let id = resolve_topic(show, &topic)?;
            let topic = show.react(&id, reaction).map_err(|e| e.to_string())?;
            println!("{} {}", reaction.emoji(), topic.text.bright_white());
        }
        Command::ShowQueue => {
            let info = show.queue_info();
            println!(
                "{} {}",
                "on air:".bold(),
                info.current_topic.as_deref().unwrap_or("-")
            );
            for (i, queued) in info.queue.iter().enumerate() {
                println!("  {}. {} {}", i + 1, short_id(&queued.id).dimmed(), queued.text);
            }
            println!("{}", format!("{} used", info.used_count).dimmed());
        }
        Command::Enqueue(topic) => {
            let id = resolve_topic(show, &topic)?;
            match show.enqueue(&id).map_err(|e| e.to_string())? {
                EnqueueOutcome::Queued { position } => {
                    println!("{} at position {}", "queued".green(), position)
                }
                EnqueueOutcome::AlreadyQueued => println!("{}", "already queued".yellow()),
                EnqueueOutcome::AlreadyUsed => println!("{}", "already discussed".yellow()),
            }
        }
        Command::Clear => {
            show.clear_queue();
            println!("{}", "queue cleared".green());
        }
        Command::Chat { nickname, message } => {
            // Echoed through the CHAT_MESSAGE event.
            show.post_chat(&nickname, &message).map_err(|e| e.to_string())?;
        }
        Command::Transcript(count) => {
            for entry in show.recent_transcript(count) {
                println!(
                    "  {} {}",
                    format!("[{}] {}:", entry.exchange, entry.speaker).bright_cyan(),
                    entry.text
                );
            }
        }
        Command::Status => {
            let status = show.status();
            println!(
                "{} {}  {} {:?}  {} {}  {} {:.0}s",
                "running:".bold(),
                status.running,
                "phase:".bold(),
                status.phase,
                "turns:".bold(),
                status.turn_count,
                "uptime:".bold(),
                status.uptime_secs
            );
            if let Some(topic) = status.current_topic {
                println!("{} {}", "topic:".bold(), topic);
            }
        }
        Command::Start => {
            if show.start() {
                println!("{}", "show started".green());
            } else {
                println!("{}", "already running".yellow());
            }
        }
        Command::Stop => {
            if show.stop().await {
                println!("{}", "show stopped".green());
            } else {
                println!("{}", "not running".yellow());
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(false),
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_keeps_full_text() {
        assert_eq!(
            Command::parse("add  Is nuclear power green? ").unwrap(),
            Some(Command::Add("Is nuclear power green?".to_string()))
        );
        assert!(Command::parse("add").is_err());
    }

    #[test]
    fn test_parse_vote_defaults_to_one() {
        assert_eq!(
            Command::parse("vote 1a2b").unwrap(),
            Some(Command::Vote { topic: "1a2b".to_string(), delta: 1 })
        );
        assert_eq!(
            Command::parse("vote 1a2b -2").unwrap(),
            Some(Command::Vote { topic: "1a2b".to_string(), delta: -2 })
        );
        assert!(Command::parse("vote 1a2b lots").is_err());
    }

    #[test]
    fn test_parse_react_and_queue() {
        assert_eq!(
            Command::parse("react abc down").unwrap(),
            Some(Command::React { topic: "abc".to_string(), reaction: Reaction::ThumbsDown })
        );
        assert_eq!(Command::parse("queue").unwrap(), Some(Command::ShowQueue));
        assert_eq!(Command::parse("q abc").unwrap(), Some(Command::Enqueue("abc".to_string())));
    }

    #[test]
    fn test_parse_chat_and_misc() {
        assert_eq!(
            Command::parse("chat sam great point!").unwrap(),
            Some(Command::Chat { nickname: "sam".to_string(), message: "great point!".to_string() })
        );
        assert!(Command::parse("chat sam").is_err());
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("transcript 3").unwrap(), Some(Command::Transcript(3)));
        assert!(Command::parse("dance").is_err());
    }
}
