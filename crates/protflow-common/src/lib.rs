//! protflow-common: Shared types, errors, and traits used across all Protflow crates.

pub mod error;
pub mod instruction;
pub mod nvcf;
pub mod outcome;
pub mod sandbox;

pub use error::{ProtflowError, Result};
pub use instruction::{FunctionCall, InstructionParser, ParsedInstruction};
pub use outcome::{Parameters, ToolOutcome};
