//! The two fixed podcast hosts.
//!
//! Every exchange has exactly one line per host and is always played
//! Alex first, then Mira.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two hosts of the show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// Speaker A, the optimistic visionary.
    Alex,
    /// Speaker B, the skeptical pragmatist.
    Mira,
}

impl Speaker {
    /// Playback order within a turn.
    pub const ORDER: [Speaker; 2] = [Speaker::Alex, Speaker::Mira];

    pub fn display_name(&self) -> &'static str {
        match self {
            Speaker::Alex => "Alex",
            Speaker::Mira => "Mira",
        }
    }

    /// Lowercase identifier handed to the speech synthesizer and used in
    /// artifact file names.
    pub fn id(&self) -> &'static str {
        match self {
            Speaker::Alex => "alex",
            Speaker::Mira => "mira",
        }
    }

    pub fn persona(&self) -> HostPersona {
        match self {
            Speaker::Alex => HostPersona {
                role: "Optimistic Visionary",
                traits: "enthusiastic, forward-thinking, sees opportunities",
                style: "energetic, conversational, uses examples",
            },
            Speaker::Mira => HostPersona {
                role: "Skeptical Pragmatist",
                traits: "analytical, pragmatic, asks tough questions",
                style: "thoughtful, measured, considers challenges",
            },
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Character sheet used when prompting for a host's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPersona {
    pub role: &'static str,
    pub traits: &'static str,
    pub style: &'static str,
}
