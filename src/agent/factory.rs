use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Display name given to every chat agent.
pub const CHAT_AGENT_NAME: &str = "ChatAgent";

/// Model-facing settings the agent is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            instructions: config.system_prompt.clone(),
            model: config.default_model.clone(),
            temperature: config.default_temperature,
        }
    }
}

/// Stateless description of the agent driving a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub temperature: f64,
}

/// Build the chat agent. Pure; called once per turn.
pub fn create_agent(settings: &AgentSettings) -> AgentDescriptor {
    AgentDescriptor {
        name: CHAT_AGENT_NAME.to_string(),
        instructions: settings.instructions.clone(),
        model: settings.model.clone(),
        temperature: settings.temperature,
    }
}

/// Build a single-purpose agent that shares the chat agent's model settings.
pub fn create_task_agent(name: &str, instructions: &str, settings: &AgentSettings) -> AgentDescriptor {
    AgentDescriptor {
        name: name.to_string(),
        instructions: instructions.to_string(),
        model: settings.model.clone(),
        temperature: settings.temperature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};

    #[test]
    fn default_config_yields_default_agent() {
        let agent = create_agent(&AgentSettings::from_config(&Config::default()));
        assert_eq!(agent.name, "ChatAgent");
        assert_eq!(agent.model, DEFAULT_MODEL);
        assert_eq!(agent.instructions, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn repeated_calls_are_equivalent() {
        let settings = AgentSettings {
            instructions: "Answer in haiku.".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
        };
        assert_eq!(create_agent(&settings), create_agent(&settings));
    }

    #[test]
    fn task_agent_keeps_model_but_not_instructions() {
        let settings = AgentSettings::from_config(&Config::default());
        let agent = create_task_agent("Router", "Reply with JSON.", &settings);
        assert_eq!(agent.name, "Router");
        assert_eq!(agent.instructions, "Reply with JSON.");
        assert_eq!(agent.model, settings.model);
        assert_eq!(agent.temperature, settings.temperature);
    }
}
