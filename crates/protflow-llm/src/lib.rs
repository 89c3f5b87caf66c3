//! protflow-llm: turns chat messages into job batches.
//!
//! [`backend`] talks to any OpenAI-compatible chat-completions endpoint
//! (Groq, OpenAI, a local vLLM or Ollama). [`parser`] prompts it with the
//! operation catalogue and decodes the reply into a `ParsedInstruction`.

pub mod backend;
pub mod parser;

pub use backend::{LlmBackend, LlmError, OpenAiCompatibleBackend};
pub use parser::LlmInstructionParser;
