use std::sync::Arc;

use thiserror::Error;

use crate::quiz::scoring::{self, ScoredResult};
use crate::quiz::selection::{Selection, SelectionError};
use crate::quiz::{QuizDocument, QuizQuestion};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {op} while the quiz is {phase}")]
    InvalidTransition { op: &'static str, phase: &'static str },
    #[error("question {index} does not exist, the quiz has {count} questions")]
    MissingQuestion { index: usize, count: usize },
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Which screen the session is on. The active question's countdown and
/// selection only exist while a question is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Welcome,
    InProgress {
        current: usize,
        time_remaining: u32,
        selection: Selection,
    },
    Results,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Welcome => "on the welcome screen",
            Phase::InProgress { .. } => "in progress",
            Phase::Results => "showing results",
        }
    }
}

/// Where the machine went after a question was answered or timed out. `Next`
/// carries the epoch the new question was activated under, so a countdown is
/// always scheduled against the exact activation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next { index: usize, epoch: u64 },
    Finished,
}

/// Outcome of a one-second countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The tick was scheduled for a question that is no longer active.
    Stale,
    Running { remaining: u32 },
    Expired(Advance),
}

/// The whole quiz session as one value: phase, answer history and timer
/// epoch, mutated only through the transition methods below.
#[derive(Debug, Clone)]
pub struct QuizSession {
    document: Arc<QuizDocument>,
    seconds_per_question: u32,
    phase: Phase,
    answers: Vec<Option<Vec<String>>>,
    timer_epoch: u64,
}

impl QuizSession {
    pub fn new(document: Arc<QuizDocument>, seconds_per_question: u32) -> Self {
        let count = document.questions.len();
        Self {
            document,
            seconds_per_question,
            phase: Phase::Welcome,
            answers: vec![None; count],
            timer_epoch: 0,
        }
    }

    /// Welcome → first question.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Welcome) {
            return Err(SessionError::InvalidTransition {
                op: "start the quiz",
                phase: self.phase.label(),
            });
        }
        let selection = match self.document.questions.first() {
            Some(question) => Selection::new(question),
            None => return Err(SessionError::MissingQuestion { index: 0, count: 0 }),
        };
        self.answers = vec![None; self.document.questions.len()];
        self.timer_epoch += 1;
        self.phase = Phase::InProgress {
            current: 0,
            time_remaining: self.seconds_per_question,
            selection,
        };
        Ok(())
    }

    /// Records the completed selection for the active question and moves on.
    /// The selection engine refuses to yield a vector with empty slots, so an
    /// incomplete answer never reaches the history.
    pub fn submit_answer(&mut self) -> Result<Advance, SessionError> {
        let (index, answer) = match &self.phase {
            Phase::InProgress {
                current, selection, ..
            } => (*current, selection.answer()?),
            phase => {
                return Err(SessionError::InvalidTransition {
                    op: "submit an answer",
                    phase: phase.label(),
                })
            }
        };
        let count = self.document.questions.len();
        let slot = self
            .answers
            .get_mut(index)
            .ok_or(SessionError::MissingQuestion { index, count })?;
        *slot = Some(answer);
        Ok(self.advance_from(index))
    }

    /// One second of countdown for the question active under `epoch`. Ticks
    /// scheduled under an older epoch are stale and change nothing.
    pub fn tick(&mut self, epoch: u64) -> Tick {
        if epoch != self.timer_epoch {
            return Tick::Stale;
        }
        let (index, remaining) = match &mut self.phase {
            Phase::InProgress {
                current,
                time_remaining,
                ..
            } => {
                *time_remaining = time_remaining.saturating_sub(1);
                (*current, *time_remaining)
            }
            _ => return Tick::Stale,
        };
        if remaining == 0 {
            // The answer slot stays absent; scoring treats it as incorrect.
            Tick::Expired(self.advance_from(index))
        } else {
            Tick::Running { remaining }
        }
    }

    /// Hard reset back to the welcome screen, reusing the same document.
    pub fn restart(&mut self) {
        self.timer_epoch += 1;
        self.answers = vec![None; self.document.questions.len()];
        self.phase = Phase::Welcome;
    }

    pub fn select_word(&mut self, word: &str, slot: usize) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::InProgress { selection, .. } => Ok(selection.select_word(word, slot)?),
            phase => Err(SessionError::InvalidTransition {
                op: "select a word",
                phase: phase.label(),
            }),
        }
    }

    pub fn select_first_empty(&mut self, word: &str) -> Result<bool, SessionError> {
        match &mut self.phase {
            Phase::InProgress { selection, .. } => Ok(selection.select_first_empty(word)?),
            phase => Err(SessionError::InvalidTransition {
                op: "select a word",
                phase: phase.label(),
            }),
        }
    }

    pub fn unselect_slot(&mut self, slot: usize) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::InProgress { selection, .. } => Ok(selection.unselect_slot(slot)?),
            phase => Err(SessionError::InvalidTransition {
                op: "clear a blank",
                phase: phase.label(),
            }),
        }
    }

    pub fn results(&self) -> ScoredResult {
        scoring::score(&self.document, &self.answers)
    }

    /// Everything the presentation layer needs to draw the active question.
    pub fn question_view(&self) -> Result<QuestionView<'_>, SessionError> {
        match &self.phase {
            Phase::InProgress {
                current,
                time_remaining,
                selection,
            } => Ok(QuestionView {
                index: *current,
                total: self.document.questions.len(),
                time_remaining: *time_remaining,
                question: self.question_at(*current)?,
                selection,
            }),
            phase => Err(SessionError::InvalidTransition {
                op: "show a question",
                phase: phase.label(),
            }),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    pub fn total_questions(&self) -> usize {
        self.document.questions.len()
    }

    pub fn seconds_per_question(&self) -> u32 {
        self.seconds_per_question
    }

    pub fn document(&self) -> &QuizDocument {
        &self.document
    }

    // Moving on from `index` invalidates any countdown still scheduled for it.
    fn advance_from(&mut self, index: usize) -> Advance {
        self.timer_epoch += 1;
        let next = index + 1;
        let selection = match self.document.questions.get(next) {
            Some(question) => Selection::new(question),
            None => {
                self.phase = Phase::Results;
                return Advance::Finished;
            }
        };
        self.phase = Phase::InProgress {
            current: next,
            time_remaining: self.seconds_per_question,
            selection,
        };
        Advance::Next {
            index: next,
            epoch: self.timer_epoch,
        }
    }

    fn question_at(&self, index: usize) -> Result<&QuizQuestion, SessionError> {
        self.document
            .questions
            .get(index)
            .ok_or(SessionError::MissingQuestion {
                index,
                count: self.document.questions.len(),
            })
    }
}

pub struct QuestionView<'a> {
    pub index: usize,
    pub total: usize,
    pub time_remaining: u32,
    pub question: &'a QuizQuestion,
    pub selection: &'a Selection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Arc<QuizDocument> {
        Arc::new(QuizDocument::new(
            "test-1".to_string(),
            vec![
                QuizQuestion::new(
                    "q1".to_string(),
                    "The _____________ fox _____________".to_string(),
                    vec![
                        "quick".to_string(),
                        "jumped".to_string(),
                        "lazy".to_string(),
                    ],
                    vec!["quick".to_string(), "jumped".to_string()],
                ),
                QuizQuestion::new(
                    "q2".to_string(),
                    "A _____________ day for a _____________".to_string(),
                    vec![
                        "sunny".to_string(),
                        "walk".to_string(),
                        "storm".to_string(),
                    ],
                    vec!["sunny".to_string(), "walk".to_string()],
                ),
            ],
        ))
    }

    fn session() -> QuizSession {
        QuizSession::new(document(), 30)
    }

    fn fill_correct(session: &mut QuizSession) {
        let words: Vec<String> = {
            let view = session.question_view().unwrap();
            view.question.correct_answer.clone()
        };
        for word in &words {
            session.select_first_empty(word).unwrap();
        }
    }

    #[test]
    fn starts_on_the_welcome_screen() {
        let session = session();
        assert_eq!(session.phase(), &Phase::Welcome);
        assert!(session.question_view().is_err());
    }

    #[test]
    fn start_is_only_valid_from_welcome() {
        let mut session = session();
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn submitting_outside_a_question_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.submit_answer(),
            Err(SessionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.select_first_empty("quick"),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn start_activates_the_first_question_with_a_full_countdown() {
        let mut session = session();
        session.start().unwrap();

        let view = session.question_view().unwrap();
        assert_eq!(view.index, 0);
        assert_eq!(view.total, 2);
        assert_eq!(view.time_remaining, 30);
        assert_eq!(view.question.question_id, "q1");
        assert!(!view.selection.is_complete());
    }

    #[test]
    fn selection_intents_reach_the_active_question() {
        let mut session = session();
        session.start().unwrap();

        session.select_word("jumped", 1).unwrap();
        session.unselect_slot(1).unwrap();
        session.select_word("quick", 0).unwrap();

        let view = session.question_view().unwrap();
        assert_eq!(view.selection.slots()[0].as_deref(), Some("quick"));
        assert_eq!(view.selection.slots()[1], None);
    }

    #[test]
    fn an_incomplete_answer_cannot_be_submitted() {
        let mut session = session();
        session.start().unwrap();
        session.select_first_empty("quick").unwrap();

        assert_eq!(
            session.submit_answer(),
            Err(SessionError::Selection(SelectionError::Incomplete {
                empty: 1
            }))
        );
        // Still on the same question, countdown untouched.
        let view = session.question_view().unwrap();
        assert_eq!(view.index, 0);
    }

    #[test]
    fn submitting_moves_to_the_next_question_and_resets_the_countdown() {
        let mut session = session();
        session.start().unwrap();

        for _ in 0..5 {
            session.tick(session.timer_epoch());
        }
        fill_correct(&mut session);
        assert!(matches!(
            session.submit_answer().unwrap(),
            Advance::Next { index: 1, .. }
        ));

        let view = session.question_view().unwrap();
        assert_eq!(view.index, 1);
        assert_eq!(view.time_remaining, 30);
        assert_eq!(view.question.question_id, "q2");
    }

    #[test]
    fn the_countdown_expires_exactly_at_zero() {
        let mut session = QuizSession::new(document(), 3);
        session.start().unwrap();
        let epoch = session.timer_epoch();

        assert_eq!(session.tick(epoch), Tick::Running { remaining: 2 });
        assert_eq!(session.tick(epoch), Tick::Running { remaining: 1 });
        assert!(matches!(
            session.tick(epoch),
            Tick::Expired(Advance::Next { index: 1, .. })
        ));
        // The expired question's answer stays absent.
        assert_eq!(session.results().per_question[0].user_answer, None);
    }

    #[test]
    fn a_stale_tick_never_advances_twice() {
        let mut session = session();
        session.start().unwrap();
        let epoch = session.timer_epoch();

        fill_correct(&mut session);
        session.submit_answer().unwrap();

        // The countdown scheduled for question 1 fires late.
        assert_eq!(session.tick(epoch), Tick::Stale);
        let view = session.question_view().unwrap();
        assert_eq!(view.index, 1);
        assert_eq!(view.time_remaining, 30);
    }

    #[test]
    fn ticks_are_ignored_outside_a_question() {
        let mut session = session();
        assert_eq!(session.tick(session.timer_epoch()), Tick::Stale);
    }

    #[test]
    fn finishing_the_last_question_shows_results() {
        let mut session = session();
        session.start().unwrap();
        fill_correct(&mut session);
        session.submit_answer().unwrap();
        fill_correct(&mut session);

        assert_eq!(session.submit_answer().unwrap(), Advance::Finished);
        assert_eq!(session.phase(), &Phase::Results);

        let results = session.results();
        assert_eq!(results.score, 2);
        assert_eq!(results.percentage, 100);
    }

    #[test]
    fn answering_one_and_timing_out_the_other_scores_half() {
        let mut session = QuizSession::new(document(), 2);
        session.start().unwrap();

        fill_correct(&mut session);
        session.submit_answer().unwrap();

        let epoch = session.timer_epoch();
        assert_eq!(session.tick(epoch), Tick::Running { remaining: 1 });
        assert_eq!(session.tick(epoch), Tick::Expired(Advance::Finished));

        assert_eq!(session.phase(), &Phase::Results);
        let results = session.results();
        assert_eq!(results.score, 1);
        assert_eq!(results.percentage, 50);
        assert_eq!(results.per_question[1].user_answer, None);
        assert!(!results.per_question[1].is_correct);
    }

    #[test]
    fn restart_resets_everything_but_the_document() {
        let mut session = session();
        session.start().unwrap();
        fill_correct(&mut session);
        session.submit_answer().unwrap();
        fill_correct(&mut session);
        session.submit_answer().unwrap();

        let before: Vec<String> = session
            .document()
            .questions
            .iter()
            .map(|question| question.question_id.clone())
            .collect();
        let epoch = session.timer_epoch();
        session.restart();

        assert_eq!(session.phase(), &Phase::Welcome);
        assert!(session.timer_epoch() > epoch);
        assert!(session.results().per_question.iter().all(|result| result.user_answer.is_none()));
        let after: Vec<String> = session
            .document()
            .questions
            .iter()
            .map(|question| question.question_id.clone())
            .collect();
        assert_eq!(before, after);

        // The session is playable again from the top.
        session.start().unwrap();
        assert_eq!(session.question_view().unwrap().index, 0);
    }

    #[test]
    fn restart_also_cancels_a_running_question() {
        let mut session = session();
        session.start().unwrap();
        let epoch = session.timer_epoch();

        session.restart();
        assert_eq!(session.tick(epoch), Tick::Stale);
        assert_eq!(session.phase(), &Phase::Welcome);
    }
}
