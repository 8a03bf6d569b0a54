use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

use crate::cacheability::CacheabilityFacts;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Key of the cache directive in the response `extensions`.
pub(crate) const CACHEABILITY_EXTENSION: &str = "cacheability";

/// A GraphQL response together with its merged cacheability.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,

    /// The cache directive of the whole response, also exposed as
    /// `extensions.cacheability`.
    #[serde(skip, default)]
    pub cacheability: CacheabilityFacts,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        extensions: Map<ByteString, Value>,
        cacheability: Option<CacheabilityFacts>,
    ) -> Self {
        let cacheability = cacheability.unwrap_or_default();
        let mut extensions = extensions;
        if let Ok(directive) = serde_json_bytes::to_value(&cacheability) {
            extensions.insert(CACHEABILITY_EXTENSION, directive);
        }
        Self {
            data,
            errors,
            extensions,
            cacheability,
        }
    }

    /// A response carrying only errors, which is never cacheable.
    pub(crate) fn from_errors(errors: Vec<Error>) -> Self {
        Response::builder()
            .errors(errors)
            .cacheability(CacheabilityFacts::uncacheable())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::cacheability::MaxAge;

    #[test]
    fn cacheability_is_exposed_in_extensions() {
        let response = Response::builder()
            .data(json!({ "label": "Content" }))
            .cacheability(
                CacheabilityFacts::new()
                    .with_max_age(MaxAge::Seconds(60))
                    .with_tag("entity_types"),
            )
            .build();

        assert_eq!(
            serde_json_bytes::to_value(&response).unwrap(),
            json!({
                "data": { "label": "Content" },
                "extensions": {
                    "cacheability": { "maxAge": 60, "contexts": [], "tags": ["entity_types"] }
                }
            })
        );
    }

    #[test]
    fn error_responses_are_uncacheable() {
        let response = Response::from_errors(vec![Error::builder().message("boom").build()]);
        assert!(response.data.is_none());
        assert!(!response.cacheability.is_cacheable());
    }
}
