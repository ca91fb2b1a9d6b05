use std::collections::HashMap;

use thiserror::Error;

use crate::quiz::{QuizDocument, BLANK_MARKER};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch quiz data: {0}")]
    Network(#[from] reqwest::Error),
    #[error("no questions found in the quiz data")]
    Empty,
    #[error("question {question_id} is malformed: {reason}")]
    Malformed { question_id: String, reason: String },
}

/// Fetches the quiz document from the backend. One attempt, made once at
/// startup; any failure is terminal for the session.
pub struct QuizLoader {
    client: reqwest::Client,
    url: String,
}

impl QuizLoader {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn load(&self) -> Result<QuizDocument, LoadError> {
        let document: QuizDocument = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        validate(&document)?;
        Ok(document)
    }
}

/// A document that fails any of these checks is rejected exactly like a
/// transport failure: the quiz never starts on bad data.
pub fn validate(document: &QuizDocument) -> Result<(), LoadError> {
    if document.questions.is_empty() {
        return Err(LoadError::Empty);
    }
    for question in &document.questions {
        if question.correct_answer.is_empty() {
            return Err(malformed(&question.question_id, "it has no blanks to fill"));
        }

        let markers = question.question.matches(BLANK_MARKER).count();
        if markers != question.blank_count() {
            return Err(malformed(
                &question.question_id,
                format!(
                    "the text has {} blank marker(s) but the answer has {} word(s)",
                    markers,
                    question.blank_count()
                ),
            ));
        }

        // Every answer word must be coverable by the option pool, counting
        // duplicates.
        let mut pool: HashMap<&str, usize> = HashMap::new();
        for option in &question.options {
            *pool.entry(option.as_str()).or_insert(0) += 1;
        }
        for word in &question.correct_answer {
            match pool.get_mut(word.as_str()) {
                Some(count) if *count > 0 => *count -= 1,
                _ => {
                    return Err(malformed(
                        &question.question_id,
                        format!("the answer word \"{word}\" is not covered by the options"),
                    ))
                }
            }
        }
    }
    Ok(())
}

fn malformed(question_id: &str, reason: impl Into<String>) -> LoadError {
    LoadError::Malformed {
        question_id: question_id.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizQuestion;

    fn question(options: &[&str], answer: &[&str]) -> QuizQuestion {
        let text = answer
            .iter()
            .map(|_| BLANK_MARKER)
            .collect::<Vec<_>>()
            .join(" and ");
        QuizQuestion::new(
            "q1".to_string(),
            text,
            options.iter().map(|word| word.to_string()).collect(),
            answer.iter().map(|word| word.to_string()).collect(),
        )
    }

    fn document(questions: Vec<QuizQuestion>) -> QuizDocument {
        QuizDocument::new("test-1".to_string(), questions)
    }

    #[test]
    fn a_well_formed_document_passes() {
        let doc = document(vec![question(
            &["quick", "jumped", "lazy"],
            &["quick", "jumped"],
        )]);
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn duplicate_answer_words_need_duplicate_options() {
        let enough = document(vec![question(&["the", "the", "a"], &["the", "the"])]);
        assert!(validate(&enough).is_ok());

        let short = document(vec![question(&["the", "a"], &["the", "the"])]);
        assert!(matches!(
            validate(&short),
            Err(LoadError::Malformed { .. })
        ));
    }

    #[test]
    fn an_empty_document_is_rejected() {
        assert!(matches!(validate(&document(vec![])), Err(LoadError::Empty)));
    }

    #[test]
    fn an_answer_word_missing_from_the_options_is_rejected() {
        let doc = document(vec![question(&["quick", "lazy"], &["quick", "jumped"])]);
        assert!(matches!(validate(&doc), Err(LoadError::Malformed { .. })));
    }

    #[test]
    fn a_marker_count_mismatch_is_rejected() {
        let mut bad = question(&["quick", "jumped"], &["quick", "jumped"]);
        bad.question = format!("only one {BLANK_MARKER} here");
        assert!(matches!(
            validate(&document(vec![bad])),
            Err(LoadError::Malformed { .. })
        ));
    }

    #[test]
    fn a_question_without_blanks_is_rejected() {
        let doc = document(vec![question(&["quick"], &[])]);
        assert!(matches!(validate(&doc), Err(LoadError::Malformed { .. })));
    }

    #[test]
    fn deserializes_the_backend_wire_format() {
        let body = format!(
            r#"{{
                "testId": "oihq2eo9h1029921-210-20112",
                "questions": [{{
                    "questionId": "b28af948-db8b-465e-92e6-3d42534c4533",
                    "question": "Yesterday the fox {BLANK_MARKER} over the {BLANK_MARKER}.",
                    "questionType": "text",
                    "answerType": "options",
                    "options": ["jumped", "fence", "slept", "river"],
                    "correctAnswer": ["jumped", "fence"]
                }}]
            }}"#
        );
        let doc: QuizDocument = serde_json::from_str(&body).unwrap();
        assert_eq!(doc.test_id, "oihq2eo9h1029921-210-20112");
        assert_eq!(doc.questions.len(), 1);
        assert_eq!(doc.questions[0].blank_count(), 2);
        assert_eq!(doc.questions[0].options.len(), 4);
        assert!(validate(&doc).is_ok());
    }
}
