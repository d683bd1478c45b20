//! Classification of raw server log lines into chat events.
//!
//! A [`LineClassifier`] holds an ordered list of [`ClassifierRule`]s. Each
//! line is checked against the rules in order and the first rule that
//! produces an event wins. Lines no rule recognises yield `None`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A chat-relevant event recognised in the server log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A player said something in chat.
    ChatMessage {
        /// Name shown between the angle brackets.
        speaker: String,
        /// Message text, verbatim.
        text: String,
    },
    /// A player joined the server.
    ParticipantJoined {
        /// Player name.
        name: String,
    },
    /// A player left the server.
    ParticipantLeft {
        /// Player name.
        name: String,
    },
}

impl LogEvent {
    /// Render the event as the line relayed to chat.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// The player this event concerns.
    #[must_use]
    pub fn participant(&self) -> &str {
        match self {
            Self::ChatMessage { speaker, .. } => speaker,
            Self::ParticipantJoined { name } | Self::ParticipantLeft { name } => name,
        }
    }
}

impl std::fmt::Display for LogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChatMessage { speaker, text } => write!(f, "<{speaker}> {text}"),
            Self::ParticipantJoined { name } => write!(f, "{name} joined the game"),
            Self::ParticipantLeft { name } => write!(f, "{name} left the game"),
        }
    }
}

/// Error type for classifier operations.
#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    /// Invalid regex pattern.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Builds an event from the captures of a matched rule.
pub type EventBuilder = fn(&Captures<'_>) -> Option<LogEvent>;

/// Chat line from the async chat thread: `<name> message`.
pub const CHAT_PATTERN: &str =
    r"\[Async Chat Thread - #\d+/INFO\]: <(?P<name>[^>]+)> (?P<message>.+)";

/// Player disconnect notice.
pub const LEAVE_PATTERN: &str = r"\[Server thread/INFO\]: (?P<name>.+) left the game";

/// Player login notice; the bracketed address suffix is discarded.
pub const JOIN_PATTERN: &str = r"\[Server thread/INFO\]: (?P<name>.+?)\[/[^\]]*\] logged in";

/// A single pattern paired with the event it produces.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    name: &'static str,
    pattern: Regex,
    build: EventBuilder,
}

impl ClassifierRule {
    /// Create a new classifier rule.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidPattern` if the regex is invalid.
    pub fn new(
        name: &'static str,
        pattern: &str,
        build: EventBuilder,
    ) -> Result<Self, ClassifierError> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            build,
        })
    }

    /// Apply this rule to a line.
    #[must_use]
    pub fn apply(&self, line: &str) -> Option<LogEvent> {
        self.pattern
            .captures(line)
            .and_then(|captures| (self.build)(&captures))
    }

    /// Get the rule name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn capture(captures: &Captures<'_>, group: &str) -> Option<String> {
    captures.name(group).map(|m| m.as_str().to_string())
}

fn chat_message(captures: &Captures<'_>) -> Option<LogEvent> {
    Some(LogEvent::ChatMessage {
        speaker: capture(captures, "name")?,
        text: capture(captures, "message")?,
    })
}

fn participant_left(captures: &Captures<'_>) -> Option<LogEvent> {
    Some(LogEvent::ParticipantLeft {
        name: capture(captures, "name")?,
    })
}

fn participant_joined(captures: &Captures<'_>) -> Option<LogEvent> {
    Some(LogEvent::ParticipantJoined {
        name: capture(captures, "name")?,
    })
}

/// Ordered set of rules mapping a log line to at most one event.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    rules: Vec<ClassifierRule>,
}

impl LineClassifier {
    /// Create a classifier with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a classifier with the chat, leave and join rules, in that order.
    #[must_use]
    pub fn new() -> Self {
        let rules = Self::default_rules()
            .into_iter()
            .filter_map(|result| match result {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to compile default classifier rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Append a rule. It is checked after every existing rule.
    pub fn add_rule(&mut self, rule: ClassifierRule) {
        self.rules.push(rule);
    }

    /// Classify a line. The first rule that yields an event wins.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<LogEvent> {
        self.rules.iter().find_map(|rule| rule.apply(line))
    }

    /// Get all rules, in priority order.
    #[must_use]
    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    fn default_rules() -> Vec<Result<ClassifierRule, ClassifierError>> {
        vec![
            ClassifierRule::new("chat", CHAT_PATTERN, chat_message),
            ClassifierRule::new("leave", LEAVE_PATTERN, participant_left),
            ClassifierRule::new("join", JOIN_PATTERN, participant_joined),
        ]
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}
