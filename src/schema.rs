//! The quiz payload contract shared by the tool definition and the result
//! validator. The model's tool arguments are untrusted input: they only
//! become a [`QuizSetPayload`] after passing [`validate_payload`].

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GenerationError;

pub const QUIZ_COUNT: usize = 5;
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Five 4-option quizzes generated from a document")]
pub struct QuizSetPayload {
    #[schemars(length(min = 5, max = 5))]
    pub quizzes: Vec<GeneratedQuiz>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    /// The question text of the quiz
    pub question: String,
    #[schemars(length(min = 4, max = 4))]
    pub options: Vec<GeneratedOption>,
    /// The index number of the correct option
    pub answer_index: i64,
    /// The explanation of the correct answer
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedOption {
    /// The number of the option
    pub index: i64,
    /// The text of the option
    pub text: String,
}

/// JSON Schema used as the `parameters` of the quiz tool.
///
/// Subschemas are inlined and the `$schema` meta key is dropped; function
/// parameters are a bare, self-contained object schema.
pub fn tool_parameters() -> serde_json::Value {
    let generator = SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let schema = generator.into_root_schema_for::<QuizSetPayload>();
    let mut value = serde_json::to_value(schema).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
    }
    value
}

/// Parse and check raw tool arguments.
///
/// Malformed JSON and schema mismatches are both generation errors. Beyond
/// shape, each quiz's option indices must be exactly 1..=4 (any order) and
/// its answer must name one of them.
pub fn validate_payload(raw: &str) -> Result<QuizSetPayload, GenerationError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        warn!(target: "doc_quiz::schema", error = %e, raw_len = raw.len(), "Tool arguments are not JSON");
        GenerationError::MalformedJson(e)
    })?;

    let payload: QuizSetPayload = serde_json::from_value(value)
        .map_err(|e| GenerationError::SchemaViolation(e.to_string()))?;

    check_shape(&payload).map_err(|reason| {
        warn!(target: "doc_quiz::schema", %reason, "Tool arguments fail quiz schema");
        GenerationError::SchemaViolation(reason)
    })?;

    debug!(target: "doc_quiz::schema", quizzes = payload.quizzes.len(), "Payload validated");
    Ok(payload)
}

fn check_shape(payload: &QuizSetPayload) -> Result<(), String> {
    if payload.quizzes.len() != QUIZ_COUNT {
        return Err(format!("expected {} quizzes, got {}", QUIZ_COUNT, payload.quizzes.len()));
    }

    for (i, quiz) in payload.quizzes.iter().enumerate() {
        if quiz.options.len() != OPTION_COUNT {
            return Err(format!(
                "quiz {} has {} options, expected {}",
                i + 1,
                quiz.options.len(),
                OPTION_COUNT
            ));
        }

        let mut seen = [false; OPTION_COUNT];
        for option in &quiz.options {
            let slot = usize::try_from(option.index)
                .ok()
                .filter(|n| (1..=OPTION_COUNT).contains(n))
                .ok_or_else(|| format!("quiz {} has option index {} outside 1..=4", i + 1, option.index))?;
            if std::mem::replace(&mut seen[slot - 1], true) {
                return Err(format!("quiz {} repeats option index {}", i + 1, option.index));
            }
        }

        if !quiz.options.iter().any(|o| o.index == quiz.answer_index) {
            return Err(format!(
                "quiz {} answer index {} matches no option",
                i + 1,
                quiz.answer_index
            ));
        }
    }

    Ok(())
}
