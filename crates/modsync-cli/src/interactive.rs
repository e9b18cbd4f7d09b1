//! Terminal confirmation prompts
//!
//! Uses dialoguer for yes/no questions asked during reconciliation.

use dialoguer::Confirm as Prompt;
use modsync_core::Confirm;
use modsync_core::confirm::report;

/// Asks the user on the terminal.
///
/// A prompt that cannot be shown (no terminal, interrupted) counts as "no",
/// which keeps the working copy untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirm;

impl Confirm for DialoguerConfirm {
    fn confirm(&self, prompt: &str, on_yes: &str, on_no: &str) -> bool {
        let answer = match Prompt::new().with_prompt(prompt).default(false).interact() {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt failed, answering no");
                false
            }
        };
        report(answer, on_yes, on_no);
        answer
    }
}
