//! Parsed natural-language instructions.
//!
//! The parser itself is an external collaborator (an LLM call). The orchestration
//! core only consumes its output: an ordered list of function calls plus a
//! human-readable explanation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::outcome::Parameters;

/// One operation requested by the user, in the order it should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInstruction {
    pub functions: Vec<FunctionCall>,
    #[serde(default)]
    pub explanation: String,
}

/// Translates free text into a [`ParsedInstruction`].
#[async_trait]
pub trait InstructionParser: Send + Sync {
    async fn parse(&self, text: &str) -> anyhow::Result<ParsedInstruction>;
}
