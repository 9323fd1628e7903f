//! Convergence policies deciding when group collaboration stops early

use crate::agent::AgentResponse;
use std::collections::HashSet;
use std::sync::Arc;

/// Predicate consulted after every full group round
pub trait ConvergencePolicy: Send + Sync {
    /// Decide whether the group has converged
    ///
    /// `round` is 1-based, `latest` holds the round that just finished in
    /// registration order, and `transcript` holds every response so far
    /// (including `latest`).
    fn converged(&self, round: usize, latest: &[AgentResponse], transcript: &[AgentResponse]) -> bool;

    /// Policy name for logging
    fn name(&self) -> &str;
}

/// Converges when a successful response mentions a completion keyword
#[derive(Debug, Clone)]
pub struct KeywordConvergence {
    keywords: Vec<String>,
}

impl KeywordConvergence {
    /// Create a keyword policy; matching is case-insensitive
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl ConvergencePolicy for KeywordConvergence {
    fn converged(&self, _round: usize, latest: &[AgentResponse], _transcript: &[AgentResponse]) -> bool {
        latest.iter().filter(|r| r.is_success()).any(|r| {
            let lower = r.output.to_lowercase();
            self.keywords.iter().any(|k| lower.contains(k.as_str()))
        })
    }

    fn name(&self) -> &str {
        "keywords"
    }
}

/// Converges when consecutive rounds say nearly the same thing
///
/// Scores the mean Jaccard overlap between each member's contribution in
/// the latest round and its contribution in the round before.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityConvergence {
    threshold: f64,
}

impl SimilarityConvergence {
    /// Create a similarity policy with a threshold in `0.0..=1.0`
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    fn word_set(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect()
    }

    /// Jaccard similarity of the two texts' word sets
    pub fn jaccard(a: &str, b: &str) -> f64 {
        let words_a = Self::word_set(a);
        let words_b = Self::word_set(b);
        if words_a.is_empty() && words_b.is_empty() {
            return 1.0;
        }
        if words_a.is_empty() || words_b.is_empty() {
            return 0.0;
        }
        let intersection = words_a.intersection(&words_b).count();
        let union = words_a.union(&words_b).count();
        intersection as f64 / union as f64
    }
}

impl ConvergencePolicy for SimilarityConvergence {
    fn converged(&self, _round: usize, latest: &[AgentResponse], transcript: &[AgentResponse]) -> bool {
        let width = latest.len();
        if width == 0 || transcript.len() < width * 2 {
            return false;
        }
        let previous = &transcript[transcript.len() - width * 2..transcript.len() - width];
        let total: f64 = previous
            .iter()
            .zip(latest)
            .map(|(before, after)| Self::jaccard(&before.output, &after.output))
            .sum();
        total / width as f64 >= self.threshold
    }

    fn name(&self) -> &str {
        "similarity"
    }
}

/// Converges once the given number of rounds has completed
#[derive(Debug, Clone, Copy)]
pub struct AfterRounds(pub usize);

impl ConvergencePolicy for AfterRounds {
    fn converged(&self, round: usize, _latest: &[AgentResponse], _transcript: &[AgentResponse]) -> bool {
        round >= self.0
    }

    fn name(&self) -> &str {
        "after_rounds"
    }
}

/// Never converges; the group runs until `max_iterations`
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConverge;

impl ConvergencePolicy for NeverConverge {
    fn converged(&self, _round: usize, _latest: &[AgentResponse], _transcript: &[AgentResponse]) -> bool {
        false
    }

    fn name(&self) -> &str {
        "never"
    }
}

/// Closure-backed policy: `(round, latest_round) -> converged`
#[derive(Clone)]
pub struct FnConvergence {
    check: Arc<dyn Fn(usize, &[AgentResponse]) -> bool + Send + Sync>,
}

impl FnConvergence {
    /// Wrap a closure
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(usize, &[AgentResponse]) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }
}

impl ConvergencePolicy for FnConvergence {
    fn converged(&self, round: usize, latest: &[AgentResponse], _transcript: &[AgentResponse]) -> bool {
        (self.check)(round, latest)
    }

    fn name(&self) -> &str {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str, text: &str) -> AgentResponse {
        AgentResponse::success(name, text, 0)
    }

    #[test]
    fn test_keyword_policy_ignores_case_and_failures() {
        let policy = KeywordConvergence::new(["Final Answer"]);
        let mut failed = AgentResponse::failure("B", "x", 0);
        failed.output = "final answer".to_string();

        assert!(!policy.converged(1, &[ok("A", "still thinking"), failed.clone()], &[]));
        assert!(policy.converged(1, &[ok("A", "FINAL ANSWER: 42")], &[]));
    }

    #[test]
    fn test_similarity_needs_two_rounds() {
        let policy = SimilarityConvergence::new(0.75);
        let round1 = vec![ok("A", "ship the release tomorrow morning")];
        assert!(!policy.converged(1, &round1, &round1));

        let mut transcript = round1.clone();
        let round2 = vec![ok("A", "ship the release tomorrow morning!")];
        transcript.extend(round2.clone());
        assert!(policy.converged(2, &round2, &transcript));
    }

    #[test]
    fn test_jaccard_edges() {
        assert_eq!(SimilarityConvergence::jaccard("", ""), 1.0);
        assert_eq!(SimilarityConvergence::jaccard("words here", ""), 0.0);
    }

    #[test]
    fn test_after_rounds() {
        assert!(!AfterRounds(2).converged(1, &[], &[]));
        assert!(AfterRounds(2).converged(2, &[], &[]));
    }
}
