//! `Origin` header policy for upgrade requests.

use axum::http::HeaderValue;

/// Which browser origins may open a session.
///
/// This filters cross-site pages; it is not authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every request, with or without an `Origin` header.
    #[default]
    AllowAny,
    /// Accept only listed origins. Requests without an `Origin` header are
    /// accepted, since non-browser clients do not send one.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Build from a configured list; empty means [`OriginPolicy::AllowAny`].
    pub fn from_list(origins: &[String]) -> Self {
        if origins.is_empty() {
            Self::AllowAny
        } else {
            Self::AllowList(
                origins
                    .iter()
                    .map(|o| o.trim_end_matches('/').to_ascii_lowercase())
                    .collect(),
            )
        }
    }

    /// Whether a request carrying `origin` may upgrade.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::AllowAny, _) | (Self::AllowList(_), None) => true,
            (Self::AllowList(list), Some(origin)) => {
                let origin = origin.trim_end_matches('/').to_ascii_lowercase();
                list.iter().any(|allowed| *allowed == origin)
            }
        }
    }

    /// Whether a request carrying the raw `Origin` header may upgrade.
    ///
    /// A header that is not visible ASCII matches no allow-list entry.
    pub fn allows_header(&self, value: Option<&HeaderValue>) -> bool {
        match value.map(HeaderValue::to_str) {
            None => self.allows(None),
            Some(Ok(origin)) => self.allows(Some(origin)),
            Some(Err(_)) => matches!(self, Self::AllowAny),
        }
    }
}
