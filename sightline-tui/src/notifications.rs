//! Notification line messages.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Notifications kept for the footer; older ones are dropped.
pub const NOTIFICATION_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationLevel {
    pub fn label(self) -> &'static str {
        match self {
            NotificationLevel::Info => "INFO",
            NotificationLevel::Warning => "WARN",
            NotificationLevel::Error => "ERROR",
            NotificationLevel::Success => "OK",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Bounded, oldest-first notification history.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
}

impl NotificationLog {
    pub fn push(&mut self, notification: Notification) {
        if self.entries.len() == NOTIFICATION_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(notification);
    }

    pub fn last(&self) -> Option<&Notification> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let mut log = NotificationLog::default();
        for n in 0..NOTIFICATION_CAPACITY + 5 {
            log.push(Notification::new(NotificationLevel::Info, n.to_string()));
        }
        assert_eq!(log.len(), NOTIFICATION_CAPACITY);
        assert_eq!(log.iter().next().unwrap().message, "5");
        assert_eq!(log.last().unwrap().message, (NOTIFICATION_CAPACITY + 4).to_string());
    }
}
