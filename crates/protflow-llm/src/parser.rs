//! LLM-backed [`InstructionParser`].

use anyhow::{bail, Context};
use async_trait::async_trait;
use protflow_common::instruction::{FunctionCall, InstructionParser, ParsedInstruction};
use protflow_common::outcome::Parameters;
use protflow_config::LlmConfig;
use protflow_jobs::Operation;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::backend::{LlmBackend, LlmRequest, Message};

pub const SYSTEM_PROMPT: &str = r#"You are a protein engineering assistant. Translate the user's request into an ordered list of pipeline operations.

Available operations:
- generate_protein: design a new protein sequence. Parameters: prompt (string).
- predict_structure: predict a 3D structure. Parameters: sequence (string, optional when a generate_protein step comes first), model_type (required, one of "esmfold_predict", "alphafold2_predict", "openfold_predict").
- search_structure: find similar structures with Foldseek. Parameters: pdb_file (optional when a predict_structure step comes first).
- evaluate_structure: compare two structures with USalign. Parameters: pdb_file1, pdb_file2.
- search_similarity: find similar sequences. Parameters: sequence, model_type (required, one of "ncbi_blast_search", "colabfold_search", "local_blast_search"), database (for local_blast_search).
- build_database: build a BLAST database. Parameters: fasta_file or pfam_ids (list), db_name.
- perform_docking: dock a ligand with AutoDock Vina. Parameters: pdb_file, molecule_file, center_x, center_y, center_z, size_x, size_y, size_z.
- file_upload: use an uploaded file. Parameters: filePath, outputType ("structure" or "molecule").

Reply with JSON only, in this shape:
{"functions": [{"name": "<operation>", "parameters": {}}], "explanation": "<one or two sentences for the user>"}"#;

/// Older single-call reply shape.
#[derive(Deserialize)]
struct SingleCall {
    function: String,
    #[serde(default)]
    parameters: Parameters,
    #[serde(default)]
    explanation: String,
}

/// The JSON object inside a reply, without any Markdown code fence.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode and validate a model reply. Unknown operation tags are rejected.
pub fn decode_instruction(content: &str) -> anyhow::Result<ParsedInstruction> {
    let body = strip_code_fence(content);
    let value: serde_json::Value =
        serde_json::from_str(body).with_context(|| format!("Model reply is not JSON: {body}"))?;

    let instruction = if value.get("functions").is_some() {
        serde_json::from_value::<ParsedInstruction>(value)?
    } else {
        let single: SingleCall = serde_json::from_value(value).context("Model reply has no functions")?;
        ParsedInstruction {
            functions: vec![FunctionCall { name: single.function, parameters: single.parameters }],
            explanation: single.explanation,
        }
    };

    if instruction.functions.is_empty() {
        bail!("No pipeline operation matched the request");
    }
    for call in &instruction.functions {
        if let Err(msg) = call.name.parse::<Operation>() {
            bail!(msg);
        }
    }
    Ok(instruction)
}

pub struct LlmInstructionParser {
    backend: Arc<dyn LlmBackend>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmInstructionParser {
    pub fn new(backend: Arc<dyn LlmBackend>, config: &LlmConfig) -> Self {
        Self {
            backend,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl InstructionParser for LlmInstructionParser {
    #[instrument(skip(self, text), fields(model = %self.backend.model_id()))]
    async fn parse(&self, text: &str) -> anyhow::Result<ParsedInstruction> {
        let request = LlmRequest {
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(text)],
            model: None,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };
        let response = self.backend.complete(request).await.context("Error processing text input")?;
        match decode_instruction(&response.content) {
            Ok(instruction) => {
                info!(functions = instruction.functions.len(), "Parsed instruction");
                Ok(instruction)
            }
            Err(e) => {
                warn!(error = %e, "Could not decode model reply");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LlmError, LlmResponse};

    struct CannedBackend(String);

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
            assert_eq!(req.messages[0].role, "system");
            Ok(LlmResponse {
                content: self.0.clone(),
                model: "canned".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn test_system_prompt_lists_every_operation() {
        for op in Operation::ALL {
            assert!(SYSTEM_PROMPT.contains(op.as_str()), "{op} missing from prompt");
        }
    }

    #[test]
    fn test_decode_rejects_unknown_tags() {
        let err = decode_instruction(r#"{"functions": [{"name": "evaluate_sequence"}]}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: evaluate_sequence");
        assert!(decode_instruction(r#"{"functions": []}"#).is_err());
        assert!(decode_instruction("I think you want a protein").is_err());
    }

    #[test]
    fn test_decode_single_call_shape() {
        let parsed = decode_instruction(r#"{"function": "generate_protein", "parameters": {"prompt": "GFP"}}"#).unwrap();
        assert_eq!(parsed.functions.len(), 1);
        assert_eq!(parsed.functions[0].parameters["prompt"], "GFP");
    }

    #[tokio::test]
    async fn test_parse_fenced_reply() {
        let reply = "```json\n{\"functions\": [{\"name\": \"generate_protein\", \"parameters\": {\"prompt\": \"binder\"}}, {\"name\": \"predict_structure\", \"parameters\": {\"model_type\": \"esmfold_predict\"}}], \"explanation\": \"Design then fold.\"}\n```";
        let parser = LlmInstructionParser::new(Arc::new(CannedBackend(reply.to_string())), &LlmConfig::default());

        let parsed = parser.parse("design a binder and fold it").await.unwrap();
        assert_eq!(parsed.explanation, "Design then fold.");
        let names: Vec<_> = parsed.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["generate_protein", "predict_structure"]);
    }
}
