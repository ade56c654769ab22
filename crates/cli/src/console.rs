//! Terminal implementations of the library's user-facing collaborators.

use async_trait::async_trait;
use imgshelf_library::host::{Confirm, Notifier};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Prints notices to stdout, one per line.
pub struct ConsoleNotifier;
impl Notifier for ConsoleNotifier {
    fn notice(&self, message: &str) {
        println!("{message}");
    }
}

/// Asks on stdout and reads the answer from stdin.
///
/// Only `y` or `yes` (any case) count as agreement. A closed or unreadable
/// stdin is a no.
pub struct StdinConfirm;
#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(format!("{prompt} [y/N] ").as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }
        let mut answer = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut answer).await {
            Ok(0) => {
                println!();
                false
            },
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!("Could not read answer: {e}");
                false
            },
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
