//! Terminal stand-in for a browser page context.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use intentgate_core::error::{GateError, GateResult};
use intentgate_core::{BlockingPrompt, ConflictPrompt, Navigator};

/// Renders prompts to stdout and turns navigation into page-load events.
pub struct ConsoleNavigator {
    history: Mutex<Vec<String>>,
    loads: mpsc::UnboundedSender<String>,
}

impl ConsoleNavigator {
    /// Create a navigator and the receiver of the page loads it triggers.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (loads, rx) = mpsc::unbounded_channel();
        let navigator = Self {
            history: Mutex::new(Vec::new()),
            loads,
        };
        (navigator, rx)
    }

    /// Record a load the user typed, as opposed to one the gate triggered.
    pub fn visit(&self, url: &str) {
        self.history_mut().push(url.to_string());
    }

    fn history_mut(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn load(&self, url: &str) -> GateResult<()> {
        self.loads
            .send(url.to_string())
            .map_err(|_| GateError::Navigation("page context closed".to_string()))
    }
}

pub fn render_prompt(prompt: &BlockingPrompt) -> String {
    let mut out = format!("[{}] What do you want to do here?", prompt.domain);
    if prompt.accepts_minutes {
        out.push_str(" (or a number of minutes for a timed pass)");
    }
    if prompt.submitting {
        out.push_str("\n  checking...");
    }
    if let Some(error) = &prompt.error {
        out.push_str(&format!("\n  rejected: {}", error));
    }
    if let Some(confirmation) = &prompt.confirmation {
        out.push_str(&format!("\n  {}", confirmation));
    }
    out
}

pub fn render_conflict(conflict: &ConflictPrompt) -> String {
    format!(
        "You are working on {} (\"{}\").\n  Opening {} would end that.\n  continue | new | back",
        conflict.active_domain, conflict.active_intention, conflict.target_domain
    )
}

#[async_trait]
impl Navigator for ConsoleNavigator {
    async fn show_blocking_prompt(&self, prompt: &BlockingPrompt) -> GateResult<()> {
        println!("{}", render_prompt(prompt));
        Ok(())
    }

    async fn show_conflict(&self, conflict: &ConflictPrompt) -> GateResult<()> {
        println!("{}", render_conflict(conflict));
        Ok(())
    }

    async fn clear_prompt(&self) -> GateResult<()> {
        Ok(())
    }

    async fn navigate(&self, url: &str) -> GateResult<()> {
        println!("-> {}", url);
        self.visit(url);
        self.load(url)
    }

    async fn history_back(&self) -> GateResult<()> {
        let previous = {
            let mut history = self.history_mut();
            history.pop();
            history.last().cloned()
        };
        match previous {
            Some(url) => {
                println!("<- {}", url);
                self.load(&url)
            }
            None => {
                println!("<- (no history)");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigate_emits_load() {
        let (nav, mut rx) = ConsoleNavigator::new();
        nav.navigate("https://youtube.com/").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "https://youtube.com/");
    }

    #[tokio::test]
    async fn test_history_back_loads_previous() {
        let (nav, mut rx) = ConsoleNavigator::new();
        nav.visit("https://docs.rs/");
        nav.visit("https://reddit.com/");
        nav.history_back().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "https://docs.rs/");

        tokio_test::assert_ok!(nav.history_back().await);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_render_prompt_shows_error_and_minutes() {
        let mut prompt = BlockingPrompt::new("instagram.com", "https://instagram.com/");
        prompt.accepts_minutes = true;
        prompt.error = Some("Too vague".to_string());
        let text = render_prompt(&prompt);
        assert!(text.starts_with("[instagram.com]"));
        assert!(text.contains("timed pass"));
        assert!(text.contains("rejected: Too vague"));
    }
}
