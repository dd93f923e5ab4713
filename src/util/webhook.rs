use crate::util::notify::{Notification, NotificationChannel};
use serde_json::json;

/// POSTs a Slack/Discord-compatible JSON payload for each notification.
/// Runs `curl` in a detached background thread so it never blocks the caller.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    url: String,
}

impl WebhookChannel {
    /// `None` when `url` is empty (webhook disabled).
    pub fn new(url: &str) -> Option<Self> {
        if url.trim().is_empty() { return None; }
        Some(Self { url: url.trim().to_string() })
    }

    pub fn payload(n: &Notification) -> serde_json::Value {
        // Slack/Discord both accept {"text": "..."} as a minimal payload.
        json!({
            "text": format!("[{}] {}: {}", n.severity.label(), n.title, n.body),
            "group": n.group_tag,
        })
    }
}

impl NotificationChannel for WebhookChannel {
    fn notify(&self, n: &Notification) {
        let payload = Self::payload(n).to_string();
        let url = self.url.clone();

        std::thread::spawn(move || {
            let _ = std::process::Command::new("curl")
                .args([
                    "-s", "--max-time", "10",
                    "-X", "POST",
                    "-H", "Content-Type: application/json",
                    "-d", &payload,
                    &url,
                ])
                .output();
        });
    }
}
