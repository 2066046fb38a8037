//! Redirect Types
//!
//! Parameters carried by the final redirect back to the application.

use url::Url;

/// Parameters parsed from the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl RedirectParams {
    /// Parse from the fragment when one is present, otherwise the query.
    pub fn from_url(url: &Url) -> Self {
        let raw = match url.fragment().filter(|f| !f.is_empty()) {
            Some(fragment) => fragment,
            None => url.query().unwrap_or(""),
        };

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "id_token" => &mut params.id_token,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// Parse `final_url` only if it lands on `redirect_uri`.
    pub fn from_redirect(final_url: &str, redirect_uri: &str) -> Option<Self> {
        if final_url.is_empty() || !final_url.starts_with(redirect_uri) {
            return None;
        }
        Url::parse(final_url).ok().map(|url| Self::from_url(&url))
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
