// Single-slot alert state: the non-blocking dialog every flow reports
// through.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    #[default]
    Default,
    Cancel,
    Destructive,
}

/// A button on an alert. `id` is what the front end hands back when the
/// button is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertAction {
    pub id: String,
    pub text: String,
    pub style: ActionStyle,
}

impl AlertAction {
    pub fn new(id: impl Into<String>, text: impl Into<String>, style: ActionStyle) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
    pub actions: Vec<AlertAction>,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: AlertAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Holds at most one visible alert. Showing a new alert replaces the
/// current one; hiding keeps the last alert around for inspection.
#[derive(Debug, Default)]
pub struct AlertCenter {
    current: Option<Alert>,
    visible: bool,
    shown: u64,
}

impl AlertCenter {
    pub fn show(&mut self, alert: Alert) {
        self.current = Some(alert);
        self.visible = true;
        self.shown += 1;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The visible alert, if any.
    pub fn current(&self) -> Option<&Alert> {
        self.current.as_ref().filter(|_| self.visible)
    }

    /// The most recent alert, visible or not.
    pub fn last(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    /// Total number of alerts shown since creation.
    pub fn shown_count(&self) -> u64 {
        self.shown
    }

    /// Resolve a pressed button. Hides the alert and returns the action id
    /// when it belongs to the visible alert.
    pub fn press(&mut self, action_id: &str) -> Option<String> {
        let id = self
            .current()?
            .actions
            .iter()
            .find(|a| a.id == action_id)
            .map(|a| a.id.clone())?;
        self.hide();
        Some(id)
    }
}
