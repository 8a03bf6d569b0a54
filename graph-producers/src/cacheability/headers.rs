use http::HeaderMap;
use http::HeaderName;
use http::HeaderValue;
use http::header::CACHE_CONTROL;
use http::header::InvalidHeaderValue;

use super::CacheabilityFacts;
use super::MaxAge;

/// Space separated cache tags, for CDNs that purge by surrogate key.
pub const SURROGATE_KEY: HeaderName = HeaderName::from_static("surrogate-key");

/// Space separated cache contexts the response varies by.
pub const CACHE_CONTEXTS: HeaderName = HeaderName::from_static("x-cache-contexts");

/// The `user` cache context and its `user.*` children vary per user, which
/// makes a response private.
const USER_CONTEXT: &str = "user";

impl CacheabilityFacts {
    /// The `cache-control` directive for these facts.
    ///
    /// Permanent facts are capped at `permanent_max_age` seconds.
    pub fn to_cache_control_header(&self, permanent_max_age: u32) -> String {
        let seconds = match self.max_age {
            MaxAge::Seconds(0) => {
                // Early return to avoid conflicts https://developer.mozilla.org/en-US/docs/Web/HTTP/Headers/Cache-Control#preventing_storing
                return "no-store".to_string();
            }
            MaxAge::Seconds(seconds) => seconds,
            MaxAge::Permanent => permanent_max_age,
        };

        let visibility = if self.varies_per_user() {
            "private"
        } else {
            "public"
        };
        format!("max-age={seconds},{visibility}")
    }

    /// Fill the header map with cache-control, surrogate-key and cache contexts headers.
    pub fn to_headers(
        &self,
        headers: &mut HeaderMap,
        permanent_max_age: u32,
    ) -> Result<(), InvalidHeaderValue> {
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_str(&self.to_cache_control_header(permanent_max_age))?,
        );

        if !self.tags.is_empty() {
            headers.insert(SURROGATE_KEY, join_header_values(&self.tags)?);
        }
        if !self.contexts.is_empty() {
            headers.insert(CACHE_CONTEXTS, join_header_values(&self.contexts)?);
        }

        Ok(())
    }

    fn varies_per_user(&self) -> bool {
        self.contexts.iter().any(|context| {
            context
                .strip_prefix(USER_CONTEXT)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }
}

fn join_header_values<'a>(
    values: impl IntoIterator<Item = &'a String>,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let joined = values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    HeaderValue::from_str(&joined)
}
