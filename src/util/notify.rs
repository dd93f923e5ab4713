use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// UI-level severity of a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifySeverity {
    Error,
    Warn,
}

impl NotifySeverity {
    pub fn label(&self) -> &'static str {
        match self {
            NotifySeverity::Error => "ERROR",
            NotifySeverity::Warn  => "WARN",
        }
    }
}

/// One user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity:  NotifySeverity,
    pub title:     String,
    pub body:      String,
    #[serde(rename = "ttlMs", serialize_with = "ser_millis")]
    pub ttl:       Duration,
    /// Lets the channel group or clear related notifications together.
    #[serde(rename = "groupTag")]
    pub group_tag: String,
}

fn ser_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Fire-and-forget delivery channel. Delivery failures are the channel's
/// problem and must not surface to the caller.
pub trait NotificationChannel: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Emits notifications as tracing events. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn notify(&self, n: &Notification) {
        match n.severity {
            NotifySeverity::Error => error!(group = %n.group_tag, title = %n.title, "{}", n.body),
            NotifySeverity::Warn  => warn!(group = %n.group_tag, title = %n.title, "{}", n.body),
        }
    }
}

/// Desktop notifications via `notify-send`.
/// Best-effort: silently ignored if notify-send is not installed or DISPLAY is unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySendChannel;

impl NotificationChannel for NotifySendChannel {
    fn notify(&self, n: &Notification) {
        let urgency = match n.severity {
            NotifySeverity::Error => "critical",
            NotifySeverity::Warn  => "normal",
        };
        let expire = n.ttl.as_millis().to_string();

        let _ = std::process::Command::new("notify-send")
            .args([
                "--urgency", urgency,
                "--expire-time", &expire,
                "--category", &n.group_tag,
                "--app-name", "duewatch",
                &n.title, &n.body,
            ])
            .spawn();
    }
}

/// Forwards every notification to each inner channel in order.
#[derive(Default, Clone)]
pub struct FanoutChannel {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl FanoutChannel {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }
}

impl NotificationChannel for FanoutChannel {
    fn notify(&self, n: &Notification) {
        for ch in &self.channels {
            ch.notify(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Sink(Mutex<Vec<String>>);

    impl NotificationChannel for Sink {
        fn notify(&self, n: &Notification) {
            self.0.lock().push(n.body.clone());
        }
    }

    fn sample() -> Notification {
        Notification {
            severity:  NotifySeverity::Error,
            title:     "Deadline alert".into(),
            body:      "Ada: expires today!".into(),
            ttl:       Duration::from_millis(8000),
            group_tag: "deadline-alerts".into(),
        }
    }

    #[test]
    fn fanout_reaches_every_channel() {
        let a = Arc::new(Sink::default());
        let b = Arc::new(Sink::default());
        let fan = FanoutChannel::new(vec![a.clone(), b.clone(), Arc::new(LogChannel)]);
        fan.notify(&sample());
        assert_eq!(a.0.lock().as_slice(), ["Ada: expires today!"]);
        assert_eq!(b.0.lock().len(), 1);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["severity"], "error");
        assert_eq!(v["ttlMs"], 8000);
        assert_eq!(v["groupTag"], "deadline-alerts");
    }
}
