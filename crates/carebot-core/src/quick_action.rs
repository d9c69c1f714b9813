//! Quick action domain models.
//!
//! Quick actions are backend-declared entry points (upload a document,
//! register a complaint, browse the standards library, ...) fetched once per
//! session and filtered at render time by authentication state. The catalog
//! is static per session; the client never mutates it.

use serde::{Deserialize, Serialize};

/// A single quick action catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Longer description shown alongside the title.
    #[serde(default)]
    pub description: String,
    /// Label for the rendered button.
    #[serde(default)]
    pub button_text: String,
    /// Icon name, interpreted by the rendering layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Intent triggered when the action is clicked.
    pub intent_type: String,
    /// Whether the action is only shown to authenticated users.
    #[serde(default)]
    pub requires_auth: bool,
}

impl QuickAction {
    /// Whether this action should be rendered for the given auth state.
    pub fn is_visible_to(&self, authenticated: bool) -> bool {
        authenticated || !self.requires_auth
    }
}

/// Filters a catalog down to the actions renderable for the given auth state.
pub fn visible_actions(actions: &[QuickAction], authenticated: bool) -> Vec<&QuickAction> {
    actions
        .iter()
        .filter(|a| a.is_visible_to(authenticated))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, requires_auth: bool) -> QuickAction {
        QuickAction {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            button_text: id.to_string(),
            icon: None,
            intent_type: format!("{id}_intent"),
            requires_auth,
        }
    }

    #[test]
    fn anonymous_users_only_see_public_actions() {
        let catalog = vec![action("upload", true), action("faq", false)];
        let visible = visible_actions(&catalog, false);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "faq");
    }

    #[test]
    fn authenticated_users_see_everything() {
        let catalog = vec![action("upload", true), action("faq", false)];
        assert_eq!(visible_actions(&catalog, true).len(), 2);
    }
}
