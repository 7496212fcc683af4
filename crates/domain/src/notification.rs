//! Push notifications — the payload handed to the notification transport.

/// An outbound push notification.
///
/// `title`, `priority`, and `attach` are optional; an empty string means
/// "unset" and lets the transport apply its configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Routing topic on the notification service.
    pub topic: String,
    pub title: String,
    pub body: String,
    pub priority: String,
    /// URL of an attachment to include.
    pub attach: String,
}

impl Notification {
    /// Create a notification with only the required fields set.
    #[must_use]
    pub fn new(topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_leave_optional_fields_empty() {
        let n = Notification::new("alerts", "pump failed");
        assert_eq!(n.topic, "alerts");
        assert_eq!(n.body, "pump failed");
        assert!(n.title.is_empty());
        assert!(n.priority.is_empty());
        assert!(n.attach.is_empty());
    }
}
