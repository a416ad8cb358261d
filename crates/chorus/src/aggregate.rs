//! Aggregation prompt builder.
//!
//! Renders a result set into the synthesis instruction handed to the
//! aggregator model: a fixed preamble followed by every candidate answer as
//! a 1-indexed numbered list in proposer order.
//!
//! Failed proposers render as an explicit `[no response]` marker instead of
//! being omitted. Dropping them would silently renumber the list and
//! mislead the aggregator about how many proposers actually contributed.

use crate::types::ResultSet;

/// Default system instruction for the aggregator model.
pub const DEFAULT_AGGREGATOR_PREAMBLE: &str = "You have been provided with a set of responses \
from various models to the same user question. Your task is to synthesize these responses into \
a single, high-quality answer. Critically evaluate the information in the responses, recognizing \
that some of it may be biased or incorrect. Do not simply repeat the candidates. Offer a refined, \
accurate, and comprehensive reply.\n\nResponses from models:";

/// Placeholder rendered for a proposer that produced no text.
pub const NO_RESPONSE_MARKER: &str = "[no response]";

/// Render the synthesis instruction.
///
/// Pure: identical inputs always yield a byte-identical string. Entry i+1
/// in the numbered list always corresponds to proposer i.
pub fn build_aggregation_prompt(preamble: &str, results: &ResultSet) -> String {
    let mut prompt = String::with_capacity(
        preamble.len()
            + results
                .iter()
                .map(|o| o.text().map_or(NO_RESPONSE_MARKER.len(), str::len) + 8)
                .sum::<usize>(),
    );
    prompt.push_str(preamble);

    for (position, outcome) in results.iter().enumerate() {
        let text = outcome.text().unwrap_or(NO_RESPONSE_MARKER);
        prompt.push_str(&format!("\n{}. {}", position + 1, text));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::CallErrorKind;
    use crate::types::{CallOutcome, CallResult};

    fn success(model: &str, text: &str) -> CallOutcome {
        CallOutcome {
            model: model.to_string(),
            result: CallResult::Success(text.to_string()),
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }

    fn failure(model: &str) -> CallOutcome {
        CallOutcome {
            model: model.to_string(),
            result: CallResult::Failure {
                kind: CallErrorKind::Api,
                message: "backend error (500): down".to_string(),
            },
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn numbering_is_one_indexed_and_ordered() {
        let results = ResultSet::from_outcomes(vec![
            success("a", "alpha"),
            success("b", "beta"),
            success("c", "gamma"),
        ]);
        let prompt = build_aggregation_prompt("Candidates:", &results);
        assert_eq!(prompt, "Candidates:\n1. alpha\n2. beta\n3. gamma");
    }

    #[test]
    fn failed_outcome_keeps_its_position() {
        let results = ResultSet::from_outcomes(vec![
            success("a", "alpha"),
            failure("b"),
            success("c", "gamma"),
        ]);
        let prompt = build_aggregation_prompt("Candidates:", &results);
        assert!(prompt.contains("\n1. alpha"));
        assert!(prompt.contains("\n2. [no response]"));
        assert!(prompt.contains("\n3. gamma"));
    }

    #[test]
    fn build_is_pure() {
        let results = ResultSet::from_outcomes(vec![success("a", "alpha"), failure("b")]);
        let first = build_aggregation_prompt(DEFAULT_AGGREGATOR_PREAMBLE, &results);
        let second = build_aggregation_prompt(DEFAULT_AGGREGATOR_PREAMBLE, &results);
        assert_eq!(first, second);
    }

    #[test]
    fn preamble_is_prepended_verbatim() {
        let results = ResultSet::from_outcomes(vec![success("a", "x")]);
        let prompt = build_aggregation_prompt(DEFAULT_AGGREGATOR_PREAMBLE, &results);
        assert!(prompt.starts_with(DEFAULT_AGGREGATOR_PREAMBLE));
        assert!(prompt.ends_with("\n1. x"));
    }

    #[test]
    fn error_message_text_is_not_leaked() {
        // The aggregator sees the marker, never the raw error message.
        let results = ResultSet::from_outcomes(vec![failure("b")]);
        let prompt = build_aggregation_prompt("P:", &results);
        assert_eq!(prompt, "P:\n1. [no response]");
        assert!(!prompt.contains("backend error"));
    }
}
