//! User interaction needed by some migration steps.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStatus {
    Confirmed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPrompt {
    pub status: PromptStatus,
    pub value: Option<String>,
}

impl PasswordPrompt {
    pub fn confirmed(value: impl Into<String>) -> Self {
        Self {
            status: PromptStatus::Confirmed,
            value: Some(value.into()),
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: PromptStatus::Canceled,
            value: None,
        }
    }

    /// The entered password, if the user confirmed a non empty one.
    pub fn password(&self) -> Option<&str> {
        match self.status {
            PromptStatus::Confirmed => self.value.as_deref().filter(|value| !value.is_empty()),
            PromptStatus::Canceled => None,
        }
    }
}

/// Dialogs a migration step may open.
///
/// `witness` is a known ciphertext the implementation may use to check the
/// password before returning it. It is `None` when the user is choosing a new
/// password.
#[async_trait]
pub trait ModalService: Send + Sync {
    async fn prompt_password(
        &self,
        title: &str,
        message: &str,
        witness: Option<&str>,
    ) -> PasswordPrompt;

    /// Resolves once the warning has been shown or acknowledged.
    async fn warning(&self, title: &str, message: &str);
}

/// Answers every prompt with the same password and records warnings.
#[derive(Debug, Default)]
pub struct StaticModal {
    password: Option<String>,
    prompts: AtomicUsize,
    warnings: AtomicUsize,
}

impl StaticModal {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// A modal that cancels every password prompt.
    pub fn denying() -> Self {
        Self::default()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModalService for StaticModal {
    async fn prompt_password(
        &self,
        title: &str,
        _message: &str,
        _witness: Option<&str>,
    ) -> PasswordPrompt {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        info!(target: "abc_migrate", event = "modal_password_prompt", title, answered = self.password.is_some());
        match &self.password {
            Some(password) => PasswordPrompt::confirmed(password.clone()),
            None => PasswordPrompt::canceled(),
        }
    }

    async fn warning(&self, title: &str, message: &str) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        warn!(target: "abc_migrate", event = "modal_warning", title, message);
    }
}

/// Interactive modal for the command line: messages go to stderr and each
/// password is read as one line from stdin. An empty line cancels.
/// One buffered reader serves every prompt.
pub struct TerminalModal {
    reader: Mutex<BufReader<Stdin>>,
}

impl TerminalModal {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for TerminalModal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TerminalModal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalModal").finish_non_exhaustive()
    }
}

async fn read_password_line<R>(reader: &mut R) -> PasswordPrompt
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => PasswordPrompt::canceled(),
        Ok(_) => {
            let value = line.trim_end_matches(['\r', '\n']);
            if value.is_empty() {
                PasswordPrompt::canceled()
            } else {
                PasswordPrompt::confirmed(value)
            }
        }
    }
}

#[async_trait]
impl ModalService for TerminalModal {
    async fn prompt_password(
        &self,
        title: &str,
        message: &str,
        _witness: Option<&str>,
    ) -> PasswordPrompt {
        let mut stderr = tokio::io::stderr();
        let banner = format!("\n== {title} ==\n{message}\nPassword (empty to cancel): ");
        if stderr.write_all(banner.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return PasswordPrompt::canceled();
        }

        let mut reader = self.reader.lock().await;
        read_password_line(&mut *reader).await
    }

    async fn warning(&self, title: &str, message: &str) {
        let mut stderr = tokio::io::stderr();
        let text = format!("\n== {title} ==\n{message}\n");
        let _ = stderr.write_all(text.as_bytes()).await;
        let _ = stderr.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_confirmed_value_is_not_a_password() {
        let prompt = PasswordPrompt::confirmed("");
        assert_eq!(prompt.password(), None);
        assert_eq!(PasswordPrompt::canceled().password(), None);
        assert_eq!(PasswordPrompt::confirmed("azerty1234").password(), Some("azerty1234"));
    }

    #[tokio::test]
    async fn one_reader_serves_consecutive_prompts() {
        let mut reader = BufReader::new(&b"first\r\nsecond\n\n"[..]);
        assert_eq!(read_password_line(&mut reader).await.password(), Some("first"));
        assert_eq!(read_password_line(&mut reader).await.password(), Some("second"));
        assert_eq!(read_password_line(&mut reader).await.status, PromptStatus::Canceled);
        assert_eq!(read_password_line(&mut reader).await.status, PromptStatus::Canceled);
    }

    #[tokio::test]
    async fn static_modal_counts_interactions() {
        let modal = StaticModal::with_password("secret");
        let answer = modal.prompt_password("t", "m", None).await;
        assert_eq!(answer.password(), Some("secret"));
        modal.warning("t", "m").await;
        modal.warning("t", "m").await;
        assert_eq!(modal.prompt_count(), 1);
        assert_eq!(modal.warning_count(), 2);

        let denying = StaticModal::denying();
        assert_eq!(
            denying.prompt_password("t", "m", Some("w")).await.status,
            PromptStatus::Canceled
        );
    }
}
