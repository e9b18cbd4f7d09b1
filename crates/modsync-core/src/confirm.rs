//! Confirmation port
//!
//! Destructive reconciliation steps ask before acting. The engine only sees
//! this trait; terminals, tests and unattended runs plug in their own answer.

/// Synchronous yes/no confirmation.
pub trait Confirm: Send + Sync {
    /// Ask `prompt`. Implementations report `on_yes` or `on_no` to the user
    /// depending on the answer.
    fn confirm(&self, prompt: &str, on_yes: &str, on_no: &str) -> bool;
}

/// Answers every prompt with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str, on_yes: &str, on_no: &str) -> bool {
        tracing::debug!(prompt = %prompt, answer = self.0, "Answering prompt automatically");
        report(self.0, on_yes, on_no);
        self.0
    }
}

/// Answers prompts with a closure.
pub struct ConfirmFn<F>(pub F);

impl<F> Confirm for ConfirmFn<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str, on_yes: &str, on_no: &str) -> bool {
        let answer = (self.0)(prompt);
        report(answer, on_yes, on_no);
        answer
    }
}

/// Log the outcome message for an answer.
pub fn report(answer: bool, on_yes: &str, on_no: &str) {
    if answer {
        tracing::info!("{on_yes}");
    } else {
        tracing::warn!("{on_no}");
    }
}
