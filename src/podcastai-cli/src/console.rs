//! Console rendering of show events.

use colored::Colorize;
use podcastai_core::{PodcastEvent, Speaker};

pub fn print_header(topic_count: usize, autostart: bool) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  PodcastAI - Live AI Podcast".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {}   {} {}",
        "Topics:".bold(),
        topic_count,
        "Autostart:".bold(),
        if autostart { "yes".green() } else { "no".yellow() }
    );
    println!("{}", "Type 'help' for commands.".dimmed());
    println!("{}", "─".repeat(70).dimmed());
}

/// Print one event as it arrives.
pub fn print_event(event: &PodcastEvent) {
    match event {
        PodcastEvent::TopicChanged { topic_text, .. } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!("{}", format!("  🎙  NOW DISCUSSING: {}", topic_text).bright_magenta().bold());
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        PodcastEvent::NowPlaying {
            speaker,
            text,
            exchange,
            duration_secs,
            ..
        } => {
            let name = match speaker {
                Speaker::Alex => speaker.display_name().bright_cyan().bold(),
                Speaker::Mira => speaker.display_name().bright_yellow().bold(),
            };
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                name,
                format!("(exchange {}, {:.1}s)", exchange, duration_secs).dimmed()
            );
            for line in textwrap(text, 66).lines() {
                println!("  {}", line);
            }
            println!();
        }
        PodcastEvent::ChatMessage(message) => {
            let nickname = if message.is_synthetic {
                message.nickname.dimmed()
            } else {
                message.nickname.green().bold()
            };
            println!("  💬 {}: {}", nickname, message.message);
        }
        PodcastEvent::QueueUpdated(info) if !info.queue.is_empty() => {
            println!(
                "{}",
                format!("  queue: {} waiting, {} used", info.queue_length, info.used_count).dimmed()
            );
        }
        // Transcript lines repeat NOW_PLAYING; topic lists are shown on demand.
        PodcastEvent::QueueUpdated(_)
        | PodcastEvent::TranscriptUpdate { .. }
        | PodcastEvent::TopicsUpdated { .. } => {}
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textwrap_breaks_at_width() {
        let wrapped = textwrap("one two three four five", 9);
        assert_eq!(wrapped, "one two\nthree\nfour five");
    }
}
