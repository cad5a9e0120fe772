use chrono::{DateTime, Utc};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct Turn {
    pub asked_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

/// Questions and answers of the current chat, oldest first.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(Turn {
            asked_at: Utc::now(),
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn render(&self) -> String {
        if self.turns.is_empty() {
            return "(no questions yet)".to_string();
        }

        let mut out = String::new();
        for (position, turn) in self.turns.iter().enumerate() {
            let _ = writeln!(
                out,
                "[{}] {} you: {}",
                position + 1,
                turn.asked_at.format("%H:%M:%S"),
                turn.question
            );
            let _ = writeln!(out, "    assistant: {}", turn.answer);
        }
        out
    }
}
