//! Page templates
//!
//! The page is one askama template: `index.html` for full loads and
//! `partials/content.html` for HTMX swaps of `#content`. Both render the same
//! [`PageView`].

use askama::Template;
use axum::response::Html;

use crate::config::ContentSettings;
use crate::error::GiveawayError;
use crate::profile::UserProfile;

/// Logged-in visitor as shown on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    /// Name, falling back to email then subject ID
    pub label: String,
    /// Email address, if known
    pub email: Option<String>,
}

impl From<&UserProfile> for UserView {
    fn from(profile: &UserProfile) -> Self {
        Self {
            label: profile.label().to_string(),
            email: profile.email.clone(),
        }
    }
}

/// Everything the page needs to render
#[derive(Debug, Clone)]
pub struct PageView {
    /// Page heading and document title
    pub title: String,
    /// Login call-to-action target
    pub login_url: String,
    /// Logged-in visitor; `None` renders the login view
    pub user: Option<UserView>,
    /// One-shot message from the previous request
    pub flash: Option<String>,
    /// Entry form link, shown only to logged-in visitors
    pub form_url: String,
    /// Product video embed URL
    pub product_video_url: String,
    /// Review video embed URL
    pub review_video_url: String,
    /// Voting site link
    pub vote_url: String,
}

impl PageView {
    /// Build the view for the current visitor
    #[must_use]
    pub fn new(
        content: &ContentSettings,
        login_url: String,
        profile: Option<&UserProfile>,
        flash: Option<String>,
    ) -> Self {
        Self {
            title: content.title.clone(),
            login_url,
            user: profile.map(UserView::from),
            flash,
            form_url: content.form_url.clone(),
            product_video_url: content.product_video_url.clone(),
            review_video_url: content.review_video_url.clone(),
            vote_url: content.vote_url.clone(),
        }
    }

    /// Render the full document, or only the `#content` fragment
    ///
    /// # Errors
    ///
    /// Returns error if template rendering fails
    pub fn render(self, fragment: bool) -> Result<Html<String>, GiveawayError> {
        let html = if fragment {
            ContentTemplate { view: self }.render()?
        } else {
            IndexTemplate { view: self }.render()?
        };
        Ok(Html(html))
    }
}

/// Full page
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    /// Page contents
    pub view: PageView,
}

/// `#content` fragment for HTMX requests
#[derive(Template)]
#[template(path = "partials/content.html")]
pub struct ContentTemplate {
    /// Page contents
    pub view: PageView,
}
