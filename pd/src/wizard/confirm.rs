//! Yes/no confirmation step

use tracing::debug;

use super::{Completion, FlowStep, PendingAction};

#[derive(Debug, Clone)]
pub struct ConfirmStep {
    pub question: String,
    pub action: PendingAction,
    /// Answer used for empty input
    pub default_yes: bool,
    /// Highlighted button in the TUI dialog
    pub selected_yes: bool,
}

impl ConfirmStep {
    /// Destructive commands: empty input means no
    pub fn destructive(question: impl Into<String>, action: PendingAction) -> Self {
        Self {
            question: question.into(),
            action,
            default_yes: false,
            selected_yes: false,
        }
    }

    /// Interactive intent confirmation: empty input means yes
    pub fn intent(question: impl Into<String>, action: PendingAction) -> Self {
        Self {
            question: question.into(),
            action,
            default_yes: true,
            selected_yes: true,
        }
    }

    pub fn prompt(&self) -> String {
        let choices = if self.default_yes { "[Y/n]" } else { "[y/N]" };
        format!("{} {}", self.question, choices)
    }

    pub fn toggle(&mut self) {
        self.selected_yes = !self.selected_yes;
    }

    pub fn submit(&mut self, input: &str) -> FlowStep {
        let answer = input.trim().to_lowercase();
        debug!(%answer, default_yes = self.default_yes, "ConfirmStep::submit: called");
        let yes = match answer.as_str() {
            "" => self.default_yes,
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => return FlowStep::notice("Please answer y or n"),
        };
        if yes {
            FlowStep::Done(Completion::Confirmed(self.action.clone()))
        } else {
            FlowStep::Done(Completion::Declined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action() -> PendingAction {
        PendingAction::Argv(vec!["node".into(), "delete".into(), "abc".into(), "--yes".into()])
    }

    #[test]
    fn test_destructive_defaults_to_no() {
        let mut step = ConfirmStep::destructive("Delete node abc?", action());
        assert_eq!(step.prompt(), "Delete node abc? [y/N]");
        assert_eq!(step.submit(""), FlowStep::Done(Completion::Declined));
    }

    #[test]
    fn test_intent_defaults_to_yes() {
        let mut step = ConfirmStep::intent("Apply?", action());
        assert_eq!(step.submit("  "), FlowStep::Done(Completion::Confirmed(action())));
    }

    #[test]
    fn test_explicit_answers_and_garbage() {
        let mut step = ConfirmStep::destructive("Delete?", action());
        assert_eq!(step.submit("YES"), FlowStep::Done(Completion::Confirmed(action())));
        assert_eq!(step.submit("n"), FlowStep::Done(Completion::Declined));
        assert!(matches!(step.submit("maybe"), FlowStep::Continue { .. }));
    }
}
