//! One-shot, staggered notification burst for the first evaluation cycle.
//!
//! The dispatcher only schedules delivery calls; it never waits on them and
//! never sees delivery failures.

use crate::alerts::{Alert, Severity};
use crate::util::notify::{Notification, NotificationChannel, NotifySeverity};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Pacing and volume limits for the initial burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Alerts notified individually; the rest fold into one summary.
    pub max_individual: usize,
    pub stagger:        Duration,
    pub ttl:            Duration,
    pub group_tag:      String,
    pub title:          String,
}

impl DispatchPolicy {
    /// Delay of the last notification a burst can schedule: the summary,
    /// one stagger after the last individual alert.
    pub fn burst_len(&self) -> Duration {
        self.stagger.saturating_mul(saturating_u32(self.max_individual).saturating_add(1))
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_individual: 5,
            stagger:        Duration::from_millis(500),
            ttl:            Duration::from_millis(8000),
            group_tag:      "deadline-alerts".into(),
            title:          "Deadline alert".into(),
        }
    }
}

/// A notification and how long after dispatch it should be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub delay:        Duration,
    pub notification: Notification,
}

pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    policy:  DispatchPolicy,
}

impl NotificationDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>, policy: DispatchPolicy) -> Self {
        Self { channel, policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// The burst for `alerts`: the first `max_individual` alerts at
    /// `index * stagger`, then one summary for the remainder once they have
    /// all had time to appear.
    pub fn plan(&self, alerts: &[Alert]) -> Vec<Scheduled> {
        let p = &self.policy;
        let mut out: Vec<Scheduled> = alerts.iter()
            .take(p.max_individual)
            .enumerate()
            .map(|(i, alert)| Scheduled {
                delay:        p.stagger.saturating_mul(saturating_u32(i)),
                notification: self.notification(ui_severity(alert.severity), alert.message.clone()),
            })
            .collect();

        if alerts.len() > p.max_individual {
            let rest = alerts.len() - p.max_individual;
            out.push(Scheduled {
                delay:        p.burst_len(),
                notification: self.notification(
                    NotifySeverity::Warn,
                    format!("{} other(s) require attention", rest),
                ),
            });
        }
        out
    }

    /// Spawn one delayed delivery task per planned notification and return
    /// immediately. The tasks are detached: they complete even if the
    /// owning coordinator is torn down meanwhile.
    pub fn dispatch_initial(&self, alerts: &[Alert]) -> Vec<JoinHandle<()>> {
        let plan = self.plan(alerts);
        debug!(alerts = alerts.len(), scheduled = plan.len(), "dispatching initial notifications");

        plan.into_iter()
            .map(|s| {
                let channel = Arc::clone(&self.channel);
                tokio::spawn(async move {
                    tokio::time::sleep(s.delay).await;
                    channel.notify(&s.notification);
                })
            })
            .collect()
    }

    fn notification(&self, severity: NotifySeverity, body: String) -> Notification {
        Notification {
            severity,
            title:     self.policy.title.clone(),
            body,
            ttl:       self.policy.ttl,
            group_tag: self.policy.group_tag.clone(),
        }
    }
}

fn ui_severity(severity: Severity) -> NotifySeverity {
    match severity {
        Severity::Danger => NotifySeverity::Error,
        Severity::Warn | Severity::Info => NotifySeverity::Warn,
    }
}
