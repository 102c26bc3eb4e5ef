//! Deep-analysis questionnaire.
//!
//! Step 5 asks the user one free-text question per diagnostic aspect; every
//! answer is required. Validation failures are input errors returned to the
//! caller, never recorded as the workflow's `last_error`.

use phytodx_types::diagnosis::{DeepAnalysisRequest, InferenceId};

/// Built-in diagnostic questions.
pub const DEFAULT_QUESTIONS: [&str; 5] = [
    "Which parts of the plant show symptoms (leaves, stem, fruit, roots)?",
    "When did you first notice the symptoms, and how quickly are they spreading?",
    "Describe the colour, shape, and texture of the spots or lesions.",
    "Have weather, irrigation, or fertilisation changed recently?",
    "Which treatments, if any, have already been applied?",
];

/// Answer validation failures, reported per field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionnaireError {
    #[error("expected {expected} answers, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// 0-based indexes of the questions left blank.
    #[error("answers required for questions {}", format_indexes(.0))]
    MissingAnswers(Vec<usize>),
}

fn format_indexes(indexes: &[usize]) -> String {
    indexes
        .iter()
        .map(|i| (i + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The ordered question list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Questionnaire {
    questions: Vec<String>,
}

impl Questionnaire {
    pub fn new(questions: Vec<String>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Validate answers and build the remote request.
    ///
    /// Answers are trimmed; every question needs a non-blank answer.
    pub fn build_request(
        &self,
        inference_id: &InferenceId,
        answers: &[String],
    ) -> Result<DeepAnalysisRequest, QuestionnaireError> {
        if answers.len() != self.questions.len() {
            return Err(QuestionnaireError::CountMismatch {
                expected: self.questions.len(),
                actual: answers.len(),
            });
        }

        let missing: Vec<usize> = answers
            .iter()
            .enumerate()
            .filter(|(_, a)| a.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            return Err(QuestionnaireError::MissingAnswers(missing));
        }

        Ok(DeepAnalysisRequest {
            inference_id: inference_id.clone(),
            questions: self.questions.clone(),
            answers: answers.iter().map(|a| a.trim().to_string()).collect(),
        })
    }
}

impl Default for Questionnaire {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect())
    }
}
