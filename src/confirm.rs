//! Operator confirmation before registration transactions.

use std::io::BufRead;

use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tracing::warn;

#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Says yes to everything (`--auto-interaction`).
pub struct AutoConfirm;

#[async_trait::async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _question: &str) -> bool {
        true
    }
}

/// Asks on the terminal; only an explicit yes counts.
pub struct StdinConfirm;

#[async_trait::async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, question: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("{question} [Y]/n \n> ");
        if let Err(e) = stdout.write_all(prompt.as_bytes()).await {
            warn!(error = %e, "Cannot prompt operator");
            return false;
        }
        let _ = stdout.flush().await;

        match read_answer().await {
            Ok(answer) => is_yes(&answer),
            Err(e) => {
                warn!(error = %e, "Cannot read operator answer");
                false
            }
        }
    }
}

/// Reads one line on a detached thread. A pending read on the runtime's
/// blocking pool would hold up shutdown after an interrupt.
async fn read_answer() -> std::io::Result<String> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut answer = String::new();
        let read = std::io::stdin().lock().read_line(&mut answer).map(|_| answer);
        let _ = tx.send(read);
    });
    rx.await
        .map_err(|_| std::io::Error::other("stdin reader exited"))?
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim(), "Y" | "y" | "yes" | "Yes")
}
