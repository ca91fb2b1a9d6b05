pub mod loader;
pub mod scoring;
pub mod selection;
pub mod session;

/// The literal token the backend embeds in a sentence for each blank.
pub const BLANK_MARKER: &str = "_____________";

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question_id: String,
    /// Sentence text with one blank marker per missing word.
    pub question: String,
    /// Word bank shown to the user; may contain distractors.
    pub options: Vec<String>,
    /// The words that fill the blanks, in order.
    pub correct_answer: Vec<String>,
}

impl QuizQuestion {
    pub fn new(
        question_id: String,
        question: String,
        options: Vec<String>,
        correct_answer: Vec<String>,
    ) -> Self {
        Self {
            question_id,
            question,
            options,
            correct_answer,
        }
    }

    pub fn blank_count(&self) -> usize {
        self.correct_answer.len()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDocument {
    pub test_id: String,
    pub questions: Vec<QuizQuestion>,
}

impl QuizDocument {
    pub fn new(test_id: String, questions: Vec<QuizQuestion>) -> Self {
        Self { test_id, questions }
    }
}
