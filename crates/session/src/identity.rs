//! Authenticated-user identity collaborator

use serde::{Deserialize, Serialize};

/// Identity of the current session's user, as provided by the external
/// identity collaborator. No further contract is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque unique user id
    pub uid: String,

    /// Account email, if the provider exposes one
    pub email: Option<String>,

    /// Preferred display name
    pub display_name: Option<String>,

    /// Avatar URL
    pub photo_url: Option<String>,
}

impl UserIdentity {
    /// Create an identity with only a uid
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the avatar URL
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Display label: the display name, or a placeholder derived from the
    /// uid prefix when the provider has none.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                let prefix: String = self.uid.chars().take(4).collect();
                format!("User-{}", prefix)
            }
        }
    }

    /// Avatar URL with a generated-initials fallback for users without one
    pub fn photo_or_placeholder(&self) -> String {
        match &self.photo_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => {
                let name = self
                    .display_name
                    .clone()
                    .or_else(|| self.email.clone())
                    .unwrap_or_else(|| "U".to_string());
                format!(
                    "https://ui-avatars.com/api/?name={}&background=random",
                    urlencode(&name)
                )
            }
        }
    }
}

fn urlencode(input: &str) -> String {
    url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_prefers_display_name() {
        let identity = UserIdentity::new("abcdef").with_display_name("Ada Lovelace");
        assert_eq!(identity.label(), "Ada Lovelace");
    }

    #[test]
    fn test_label_falls_back_to_uid_prefix() {
        let identity = UserIdentity::new("abcdef");
        assert_eq!(identity.label(), "User-abcd");
    }

    #[test]
    fn test_label_with_short_uid() {
        let identity = UserIdentity::new("ab");
        assert_eq!(identity.label(), "User-ab");
    }

    #[test]
    fn test_photo_placeholder_encodes_name() {
        let identity = UserIdentity::new("u1").with_display_name("Ada Lovelace");
        let url = identity.photo_or_placeholder();
        assert!(url.contains("Ada+Lovelace"));
    }

    #[test]
    fn test_photo_url_passthrough() {
        let identity = UserIdentity::new("u1").with_photo_url("https://example.org/a.png");
        assert_eq!(identity.photo_or_placeholder(), "https://example.org/a.png");
    }
}
