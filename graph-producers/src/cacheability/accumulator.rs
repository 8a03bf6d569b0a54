use parking_lot::Mutex;

use super::CacheabilityFacts;
use super::MaxAge;

/// The open state of a subtree's cacheability.
///
/// Facts from producers and from sealed child subtrees are folded in through
/// [`merge`](Self::merge) and [`merge_sealed`](Self::merge_sealed), which take
/// `&self`: sibling subtrees resolving concurrently merge into the same parent
/// accumulator, each merge being a single locked fold. Because the fold is
/// commutative the result does not depend on which sibling finishes first.
///
/// [`seal`](Self::seal) consumes the accumulator, so a sealed subtree can no
/// longer receive facts.
#[derive(Debug, Default)]
pub struct CacheabilityAccumulator {
    facts: Mutex<CacheabilityFacts>,
}

impl CacheabilityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accumulator starting from `facts` instead of the neutral value.
    pub fn starting_from(facts: CacheabilityFacts) -> Self {
        Self {
            facts: Mutex::new(facts),
        }
    }

    pub fn merge(&self, facts: &CacheabilityFacts) {
        self.facts.lock().merge(facts);
    }

    pub fn merge_sealed(&self, sealed: SealedCacheability) {
        self.merge(&sealed.0);
    }

    /// Marks everything accumulated so far, and everything merged later, as uncacheable.
    pub fn mark_uncacheable(&self) {
        self.facts.lock().merge_max_age(MaxAge::UNCACHEABLE);
    }

    /// A copy of the facts accumulated so far.
    pub fn snapshot(&self) -> CacheabilityFacts {
        self.facts.lock().clone()
    }

    pub fn seal(self) -> SealedCacheability {
        SealedCacheability(self.facts.into_inner())
    }
}

/// The final, immutable cacheability of a completed subtree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SealedCacheability(CacheabilityFacts);

impl SealedCacheability {
    pub fn facts(&self) -> &CacheabilityFacts {
        &self.0
    }

    pub fn into_facts(self) -> CacheabilityFacts {
        self.0
    }
}

impl From<SealedCacheability> for CacheabilityFacts {
    fn from(sealed: SealedCacheability) -> Self {
        sealed.0
    }
}
