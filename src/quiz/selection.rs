use thiserror::Error;

use crate::quiz::QuizQuestion;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("blank {slot} does not exist, this question has {slots} blanks")]
    SlotOutOfRange { slot: usize, slots: usize },
    #[error("the word \"{word}\" is not available")]
    WordNotAvailable { word: String },
    #[error("{empty} blank(s) are still unfilled")]
    Incomplete { empty: usize },
}

/// Word pool and blank slots for the active question. Every word instance
/// lives either in the pool or in exactly one slot, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    available: Vec<String>,
    slots: Vec<Option<String>>,
}

impl Selection {
    pub fn new(question: &QuizQuestion) -> Self {
        Self {
            available: question.options.clone(),
            slots: vec![None; question.blank_count()],
        }
    }

    /// Places one instance of `word` into `slot`. A word already occupying
    /// the slot is returned to the pool, not lost.
    pub fn select_word(&mut self, word: &str, slot: usize) -> Result<(), SelectionError> {
        if slot >= self.slots.len() {
            return Err(SelectionError::SlotOutOfRange {
                slot,
                slots: self.slots.len(),
            });
        }

        // Duplicates in the pool are distinct instances, so remove exactly one.
        let found = self
            .available
            .iter()
            .position(|candidate| candidate == word)
            .ok_or_else(|| SelectionError::WordNotAvailable {
                word: word.to_string(),
            })?;
        let word = self.available.remove(found);

        if let Some(displaced) = self.slots[slot].replace(word) {
            self.available.push(displaced);
        }
        Ok(())
    }

    /// Places `word` into the lowest-indexed empty slot. Returns `Ok(false)`
    /// when every slot is already filled; the word stays available.
    pub fn select_first_empty(&mut self, word: &str) -> Result<bool, SelectionError> {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => self.select_word(word, slot).map(|()| true),
            None => {
                if !self.available.iter().any(|candidate| candidate == word) {
                    return Err(SelectionError::WordNotAvailable {
                        word: word.to_string(),
                    });
                }
                Ok(false)
            }
        }
    }

    /// Empties `slot`, returning its word to the pool. No-op if already empty.
    pub fn unselect_slot(&mut self, slot: usize) -> Result<(), SelectionError> {
        if slot >= self.slots.len() {
            return Err(SelectionError::SlotOutOfRange {
                slot,
                slots: self.slots.len(),
            });
        }
        if let Some(word) = self.slots[slot].take() {
            self.available.push(word);
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// The ordered answer vector. Refuses while any slot is empty, which is
    /// what gates submission upstream.
    pub fn answer(&self) -> Result<Vec<String>, SelectionError> {
        let empty = self.slots.iter().filter(|slot| slot.is_none()).count();
        if empty > 0 {
            return Err(SelectionError::Incomplete { empty });
        }
        Ok(self.slots.iter().flatten().cloned().collect())
    }

    pub fn available_words(&self) -> &[String] {
        &self.available
    }

    pub fn slots(&self) -> &[Option<String>] {
        &self.slots
    }
}
