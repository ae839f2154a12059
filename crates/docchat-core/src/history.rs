use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Question/answer pairs of one conversation, oldest first.
///
/// Never mutated in place: each turn produces a new value via [`ChatHistory::with_turn`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `self` followed by one more turn.
    #[must_use]
    pub fn with_turn(&self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
        Self { turns }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `Human:` / `Assistant:` transcript used by the question-condensing prompt.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Human: ");
            out.push_str(&turn.question);
            out.push_str("\nAssistant: ");
            out.push_str(&turn.answer);
        }
        out
    }
}
