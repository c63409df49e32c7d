use serde::{Deserialize, Serialize};

/// Header placed before the example prompts
pub const EXAMPLES_HEADER: &str = "Example Text Prompts:";

/// Header placed before the user's topic
pub const TOPIC_HEADER: &str = "User Input:";

/// Separator between the sections of an assembled prompt
pub const SECTION_SEPARATOR: &str = "\n\n";

/// Everything one generation request sends to the model
///
/// Both API dialects share one layout: the system instructions, then the
/// examples under [`EXAMPLES_HEADER`] one per line, then the topic under
/// [`TOPIC_HEADER`], sections separated by [`SECTION_SEPARATOR`]. Ollama
/// receives all of it as a single prompt string; chat endpoints get the
/// system instructions as their own message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub examples: Vec<String>,
    pub topic: String,
}

impl GenerationRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        examples: Vec<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            examples,
            topic: topic.into(),
        }
    }

    /// Examples and topic, without the system instructions
    pub fn user_message(&self) -> String {
        format!(
            "{}\n{}{}{}\n{}",
            EXAMPLES_HEADER,
            self.examples.join("\n"),
            SECTION_SEPARATOR,
            TOPIC_HEADER,
            self.topic
        )
    }

    /// Single combined prompt for Ollama's `/api/generate`
    pub fn combined_prompt(&self) -> String {
        if self.system_prompt.is_empty() {
            return self.user_message();
        }
        format!(
            "{}{}{}",
            self.system_prompt,
            SECTION_SEPARATOR,
            self.user_message()
        )
    }
}
