//! Chat agent construction and the streaming runtime that drives it.

pub mod factory;
pub mod runtime;

pub use factory::{create_agent, create_task_agent, AgentDescriptor, AgentSettings, CHAT_AGENT_NAME};
pub use runtime::{AgentEvent, AgentEventStream, AgentRuntime};
