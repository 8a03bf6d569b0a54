//! Cacheability facts and their aggregation across a result tree.
//!
//! Every producer invocation yields [`CacheabilityFacts`]: how long the value
//! may be cached ([`MaxAge`]), which request dimensions it varies by (cache
//! contexts) and which invalidation keys it depends on (cache tags). Facts form
//! a commutative monoid: [`CacheabilityFacts::merge`] takes the minimum max-age
//! and the union of contexts and tags, and the permanent, empty value is its
//! identity. The order in which a tree's facts are merged therefore never
//! changes the verdict.

mod accumulator;
mod headers;

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

pub use accumulator::CacheabilityAccumulator;
pub use accumulator::SealedCacheability;
pub use headers::CACHE_CONTEXTS;
pub use headers::SURROGATE_KEY;
use schemars::JsonSchema;
use schemars::Schema;
use schemars::SchemaGenerator;
use schemars::json_schema;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// How long a value may be cached.
///
/// `Permanent` sorts above every finite duration, so merging is a plain
/// minimum and `Seconds(0)` (uncacheable) absorbs everything else.
///
/// Serialized as an integer number of seconds, with `-1` for `Permanent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaxAge {
    /// Cacheable for this many seconds. `0` means uncacheable.
    Seconds(u32),
    /// Cacheable until invalidated through one of its tags.
    Permanent,
}

impl MaxAge {
    pub const UNCACHEABLE: MaxAge = MaxAge::Seconds(0);

    pub fn is_cacheable(&self) -> bool {
        *self != MaxAge::UNCACHEABLE
    }

    /// The wire representation: seconds, or `-1` for permanent.
    pub fn as_i64(&self) -> i64 {
        match self {
            MaxAge::Seconds(seconds) => i64::from(*seconds),
            MaxAge::Permanent => -1,
        }
    }

    fn from_i64(value: i64) -> Result<Self, String> {
        match value {
            -1 => Ok(MaxAge::Permanent),
            seconds if seconds >= 0 => Ok(MaxAge::Seconds(
                u32::try_from(seconds).unwrap_or(u32::MAX),
            )),
            other => Err(format!(
                "invalid max-age {other}: expected -1 (permanent) or a number of seconds"
            )),
        }
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        MaxAge::Permanent
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAge::Seconds(seconds) => write!(f, "{seconds}s"),
            MaxAge::Permanent => f.write_str("permanent"),
        }
    }
}

impl Serialize for MaxAge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for MaxAge {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Keyword(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => MaxAge::from_i64(value).map_err(serde::de::Error::custom),
            Raw::Keyword(keyword) if keyword == "permanent" => Ok(MaxAge::Permanent),
            Raw::Keyword(keyword) => Err(serde::de::Error::custom(format!(
                "invalid max-age '{keyword}': expected 'permanent' or a number of seconds"
            ))),
        }
    }
}

impl JsonSchema for MaxAge {
    fn schema_name() -> Cow<'static, str> {
        "MaxAge".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "description": "Seconds a value may be cached; -1 or \"permanent\" for no expiry, 0 for uncacheable.",
            "oneOf": [
                { "type": "integer", "minimum": -1 },
                { "const": "permanent" }
            ]
        })
    }
}

/// What a result may be cached for, and under which variation and invalidation keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheabilityFacts {
    max_age: MaxAge,
    #[serde(default)]
    contexts: BTreeSet<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl CacheabilityFacts {
    /// The neutral facts: permanent, no contexts, no tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts for a value that must never be cached.
    pub fn uncacheable() -> Self {
        Self {
            max_age: MaxAge::UNCACHEABLE,
            ..Default::default()
        }
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.merge_max_age(max_age);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.contexts.insert(context.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_cacheable(&self) -> bool {
        self.max_age.is_cacheable()
    }

    pub fn add_context(&mut self, context: impl Into<String>) {
        self.contexts.insert(context.into());
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Lowers the max-age to `max_age` if it is shorter.
    pub fn merge_max_age(&mut self, max_age: MaxAge) {
        self.max_age = std::cmp::min(self.max_age, max_age);
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: &CacheabilityFacts) {
        self.merge_max_age(other.max_age);
        self.contexts.extend(other.contexts.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
    }

    pub fn merged(mut self, other: &CacheabilityFacts) -> Self {
        self.merge(other);
        self
    }
}

impl<'a> FromIterator<&'a CacheabilityFacts> for CacheabilityFacts {
    fn from_iter<I: IntoIterator<Item = &'a CacheabilityFacts>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CacheabilityFacts::new(), |acc, facts| acc.merged(facts))
    }
}

impl FromIterator<CacheabilityFacts> for CacheabilityFacts {
    fn from_iter<I: IntoIterator<Item = CacheabilityFacts>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CacheabilityFacts::new(), |acc, facts| acc.merged(&facts))
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn samples() -> Vec<CacheabilityFacts> {
        vec![
            CacheabilityFacts::new().with_context("languages:language_interface"),
            CacheabilityFacts::new()
                .with_max_age(MaxAge::Seconds(300))
                .with_tag("config:core.entity_form_display.node.article.default"),
            CacheabilityFacts::new()
                .with_max_age(MaxAge::Seconds(60))
                .with_tag("entity_field_info"),
            CacheabilityFacts::new()
                .with_context("user.permissions")
                .with_tag("entity_types"),
        ]
    }

    #[rstest]
    #[case(MaxAge::Permanent, MaxAge::Permanent, MaxAge::Permanent)]
    #[case(MaxAge::Permanent, MaxAge::Seconds(60), MaxAge::Seconds(60))]
    #[case(MaxAge::Seconds(60), MaxAge::Seconds(30), MaxAge::Seconds(30))]
    #[case(MaxAge::Seconds(0), MaxAge::Permanent, MaxAge::Seconds(0))]
    #[case(MaxAge::Seconds(3600), MaxAge::Seconds(0), MaxAge::Seconds(0))]
    fn max_age_merges_to_the_minimum(
        #[case] left: MaxAge,
        #[case] right: MaxAge,
        #[case] expected: MaxAge,
    ) {
        let merged = CacheabilityFacts::new()
            .with_max_age(left)
            .merged(&CacheabilityFacts::new().with_max_age(right));
        assert_eq!(merged.max_age(), expected);

        let reversed = CacheabilityFacts::new()
            .with_max_age(right)
            .merged(&CacheabilityFacts::new().with_max_age(left));
        assert_eq!(reversed.max_age(), expected);
    }

    #[test]
    fn permanent_is_not_treated_as_minus_one() {
        let merged = CacheabilityFacts::new()
            .with_max_age(MaxAge::Seconds(10))
            .merged(&CacheabilityFacts::new());
        assert_eq!(merged.max_age(), MaxAge::Seconds(10));
    }

    #[test]
    fn uncacheable_absorbs_everything() {
        let mut facts: CacheabilityFacts = samples().into_iter().collect();
        facts.merge(&CacheabilityFacts::uncacheable());
        for other in samples() {
            facts.merge(&other);
        }
        assert_eq!(facts.max_age(), MaxAge::UNCACHEABLE);
        assert!(!facts.is_cacheable());
    }

    #[test]
    fn merge_is_order_independent() {
        let samples = samples();
        let expected: CacheabilityFacts = samples.iter().collect();
        for permutation in samples.iter().permutations(samples.len()) {
            let merged: CacheabilityFacts = permutation.into_iter().collect();
            assert_eq!(merged, expected);
        }

        assert_eq!(expected.max_age(), MaxAge::Seconds(60));
        assert_eq!(
            expected.contexts().iter().collect::<Vec<_>>(),
            vec!["languages:language_interface", "user.permissions"]
        );
        assert_eq!(expected.tags().len(), 3);
    }

    #[test]
    fn merge_is_associative() {
        let [a, b, c, _] = <[CacheabilityFacts; 4]>::try_from(samples()).unwrap();
        let left = a.clone().merged(&b).merged(&c);
        let right = a.merged(&b.merged(&c));
        assert_eq!(left, right);
    }

    #[test]
    fn neutral_facts_are_the_identity() {
        for facts in samples() {
            assert_eq!(facts.clone().merged(&CacheabilityFacts::new()), facts);
            assert_eq!(CacheabilityFacts::new().merged(&facts), facts);
        }
    }

    #[test]
    fn serializes_with_minus_one_for_permanent() {
        let facts = CacheabilityFacts::new().with_tag("entity_types");
        assert_eq!(
            serde_json::to_value(&facts).unwrap(),
            serde_json::json!({ "maxAge": -1, "contexts": [], "tags": ["entity_types"] })
        );

        let parsed: CacheabilityFacts =
            serde_json::from_value(serde_json::json!({ "maxAge": 0 })).unwrap();
        assert_eq!(parsed, CacheabilityFacts::uncacheable());
    }

    #[rstest]
    #[case(serde_json::json!(-1), MaxAge::Permanent)]
    #[case(serde_json::json!("permanent"), MaxAge::Permanent)]
    #[case(serde_json::json!(0), MaxAge::UNCACHEABLE)]
    #[case(serde_json::json!(600), MaxAge::Seconds(600))]
    fn max_age_deserializes(#[case] raw: serde_json::Value, #[case] expected: MaxAge) {
        assert_eq!(serde_json::from_value::<MaxAge>(raw).unwrap(), expected);
    }

    #[test]
    fn max_age_rejects_other_negative_values() {
        assert!(serde_json::from_value::<MaxAge>(serde_json::json!(-5)).is_err());
        assert!(serde_json::from_value::<MaxAge>(serde_json::json!("forever")).is_err());
    }
}
