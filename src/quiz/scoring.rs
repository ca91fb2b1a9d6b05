use crate::quiz::QuizDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub question_id: String,
    pub question_text: String,
    /// `None` when the question timed out with nothing submitted.
    pub user_answer: Option<Vec<String>>,
    pub correct_answer: Vec<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredResult {
    pub per_question: Vec<QuestionResult>,
    pub score: usize,
    pub total_questions: usize,
    pub percentage: u32,
}

/// Compares the answer history against the document. A question counts only
/// when the recorded vector matches its correct answer word-for-word, in
/// order; an absent vector never matches.
pub fn score(document: &QuizDocument, answers: &[Option<Vec<String>>]) -> ScoredResult {
    let per_question: Vec<QuestionResult> = document
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let user_answer = answers.get(index).cloned().flatten();
            let is_correct = user_answer.as_deref() == Some(question.correct_answer.as_slice());
            QuestionResult {
                question_id: question.question_id.clone(),
                question_text: question.question.clone(),
                user_answer,
                correct_answer: question.correct_answer.clone(),
                is_correct,
            }
        })
        .collect();

    let score = per_question.iter().filter(|result| result.is_correct).count();
    let total_questions = document.questions.len();
    ScoredResult {
        score,
        total_questions,
        percentage: percentage(score, total_questions),
        per_question,
    }
}

// Round-half-up on the exact rational 100 * score / total.
fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * score + total) / (2 * total)) as u32
}
