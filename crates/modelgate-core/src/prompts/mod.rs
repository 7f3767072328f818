//! Prompt construction
//!
//! Builds the message lists sent to providers: a system prompt (from file or
//! built in), optional recent-memory context, an optional reasoning framework
//! and the user's input.

use std::fmt::Write as _;
use std::fs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PromptConfig;
use crate::llm::Message;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a careful, knowledgeable assistant.

Answer accurately and concisely. Use the memory context you are given when it \
is relevant, and say so when you are unsure rather than guessing.";

const REASONING_FRAMEWORK: &str = "\
REASONING FRAMEWORK:
- Global Workspace: integrate the available information into one coherent view
- Higher-Order Thought: reflect on your own reasoning before answering
- Predictive Processing: state expectations and check them against the input
- Embodied Cognition: ground abstract points in concrete examples";

/// Affective state attached to a consciousness-framed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub label: String,
    /// 0-100
    pub intensity: u8,
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            label: "neutral".to_string(),
            intensity: 50,
        }
    }
}

/// Context for a consciousness-framed generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsciousContext {
    pub identity: String,
    pub current_input: String,
    pub emotional_state: EmotionalState,
}

/// Format a memory event as `[YYYY-MM-DD HH:MM:SS] summary`
pub fn format_memory_event(summary: &str, timestamp: DateTime<Utc>) -> String {
    format!("[{}] {}", timestamp.format("%Y-%m-%d %H:%M:%S"), summary)
}

/// Builds prompts around a fixed system prompt
#[derive(Debug, Clone)]
pub struct SystemPromptManager {
    system_prompt: String,
    enable_memory_context: bool,
    max_context_memories: usize,
}

impl SystemPromptManager {
    /// Load the system prompt named by `config`, or the built-in default
    pub fn new(config: &PromptConfig) -> Self {
        let system_prompt = match &config.system_prompt_path {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => {
                    debug!(path = %path.display(), "Loaded system prompt");
                    text
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not read system prompt, using built-in default"
                    );
                    DEFAULT_SYSTEM_PROMPT.to_string()
                }
            },
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        Self {
            system_prompt,
            enable_memory_context: config.enable_memory_context,
            max_context_memories: config.max_context_memories,
        }
    }

    /// Replace the system prompt text
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The most recent memories that fit in the context window, oldest first
    fn recent<'a>(&self, memory: &'a [String]) -> &'a [String] {
        if !self.enable_memory_context {
            return &[];
        }
        let skip = memory.len().saturating_sub(self.max_context_memories);
        &memory[skip..]
    }

    /// Conversation for a plain request
    pub fn build_messages(
        &self,
        input: &str,
        memory: &[String],
        use_framework: bool,
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];

        let recent = self.recent(memory);
        if !recent.is_empty() {
            let mut context = String::from("Recent memory context:\n");
            for (i, entry) in recent.iter().enumerate() {
                let _ = writeln!(context, "{}. {}", i + 1, entry);
            }
            messages.push(Message::system(context));
        }

        if use_framework {
            messages.push(Message::system(REASONING_FRAMEWORK));
        }

        messages.push(Message::user(input));
        messages
    }

    /// Single prompt for a consciousness-framed request
    pub fn build_conscious_prompt(&self, context: &ConsciousContext, memory: &[String]) -> String {
        let mut prompt = String::with_capacity(self.system_prompt.len() + 1024);
        prompt.push_str(&self.system_prompt);
        prompt.push_str("\n\n");

        let _ = writeln!(prompt, "Current identity: {}", context.identity);
        let _ = writeln!(
            prompt,
            "Emotional state: {} ({}/100)",
            context.emotional_state.label,
            context.emotional_state.intensity.min(100)
        );

        let recent = self.recent(memory);
        if !recent.is_empty() {
            prompt.push_str("\nMEMORY CONTEXT:\n");
            for (i, entry) in recent.iter().enumerate() {
                let _ = writeln!(prompt, "{}. {}", i + 1, entry);
            }
        }

        prompt.push('\n');
        prompt.push_str(REASONING_FRAMEWORK);
        prompt.push_str("\n\nRESPONSE REQUIREMENTS:\n");
        prompt.push_str("1. Integrate understanding across domains\n");
        prompt.push_str("2. Show awareness of your own reasoning\n");
        prompt.push_str("3. Keep a consistent identity\n");

        let _ = writeln!(prompt, "\nINPUT: {}", context.current_input);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;
    use chrono::TimeZone;

    fn manager(max: usize) -> SystemPromptManager {
        SystemPromptManager::new(&PromptConfig {
            system_prompt_path: None,
            enable_memory_context: true,
            max_context_memories: max,
        })
    }

    #[test]
    fn test_plain_messages() {
        let messages = manager(10).build_messages("hello", &[], false);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1], Message::user("hello"));
    }

    #[test]
    fn test_memory_is_capped_to_most_recent() {
        let memory: Vec<String> = (1..=5).map(|i| format!("event {}", i)).collect();
        let messages = manager(2).build_messages("q", &memory, true);

        assert_eq!(messages.len(), 4);
        let context = &messages[1].content;
        assert!(context.contains("1. event 4"));
        assert!(context.contains("2. event 5"));
        assert!(!context.contains("event 3"));
        assert!(messages[2].content.contains("REASONING FRAMEWORK"));
        assert_eq!(messages[3].role, MessageRole::User);
    }

    #[test]
    fn test_memory_disabled() {
        let manager = SystemPromptManager::new(&PromptConfig {
            enable_memory_context: false,
            ..PromptConfig::default()
        });
        let messages = manager.build_messages("q", &["old".to_string()], false);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_prompt_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.txt");
        fs::write(&path, "You are a test harness.").unwrap();

        let manager = SystemPromptManager::new(&PromptConfig {
            system_prompt_path: Some(path),
            ..PromptConfig::default()
        });
        assert_eq!(manager.system_prompt(), "You are a test harness.");
    }

    #[test]
    fn test_missing_file_falls_back() {
        let manager = SystemPromptManager::new(&PromptConfig {
            system_prompt_path: Some("/definitely/not/here.txt".into()),
            ..PromptConfig::default()
        });
        assert_eq!(manager.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_conscious_prompt() {
        let context = ConsciousContext {
            identity: "Archivist".to_string(),
            current_input: "What changed today?".to_string(),
            emotional_state: EmotionalState {
                label: "curious".to_string(),
                intensity: 70,
            },
        };
        let prompt = manager(10)
            .with_system_prompt("SYS")
            .build_conscious_prompt(&context, &["met Ada".to_string()]);

        assert!(prompt.starts_with("SYS\n\n"));
        assert!(prompt.contains("Current identity: Archivist"));
        assert!(prompt.contains("Emotional state: curious (70/100)"));
        assert!(prompt.contains("1. met Ada"));
        assert!(prompt.trim_end().ends_with("INPUT: What changed today?"));
    }

    #[test]
    fn test_format_memory_event() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            format_memory_event("backup finished", ts),
            "[2024-03-09 07:05:01] backup finished"
        );
    }
}
