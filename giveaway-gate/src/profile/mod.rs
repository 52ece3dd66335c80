//! Visitor profile model
//!
//! [`UserProfile`] is the only entity of the application: created in memory
//! after a successful login, held in the visitor's session, and optionally
//! merged into the document store under its subject identifier.

use serde::{Deserialize, Serialize};

use crate::oauth2::{LoginError, UserInfoResponse};

/// Profile of an authenticated visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider-assigned stable identifier (`sub`)
    pub subject_id: String,
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar/profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

impl UserProfile {
    /// Create a profile with only the subject identifier set
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: None,
            display_name: None,
            picture_url: None,
        }
    }

    /// Set the email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the picture URL
    #[must_use]
    pub fn with_picture_url(mut self, url: impl Into<String>) -> Self {
        self.picture_url = Some(url.into());
        self
    }

    /// Best human-readable label: name, then email, then subject
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(self.subject_id.as_str())
    }

    /// Document fields supplied by this profile, in `{email, name, picture}` order
    ///
    /// Absent values are left out so that a merge never clears stored fields.
    #[must_use]
    pub fn document_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("email", self.email.as_deref()),
            ("name", self.display_name.as_deref()),
            ("picture", self.picture_url.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect()
    }
}

impl TryFrom<UserInfoResponse> for UserProfile {
    type Error = LoginError;

    fn try_from(info: UserInfoResponse) -> Result<Self, Self::Error> {
        let subject_id = info
            .sub
            .map(|sub| sub.trim().to_string())
            .filter(|sub| !sub.is_empty())
            .ok_or(LoginError::MissingSubject)?;

        Ok(Self {
            subject_id,
            email: non_empty(info.email),
            display_name: non_empty(info.name),
            picture_url: non_empty(info.picture),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
