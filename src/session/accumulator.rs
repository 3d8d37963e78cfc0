//! Reassembly of streamed tool-call arguments.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{BridgeError, Result};

#[derive(Debug)]
pub struct PendingFunctionCall {
    call_id: String,
    name: Option<String>,
    arguments: String,
    last_update: Instant,
}

impl PendingFunctionCall {
    fn new(call_id: &str, now: Instant) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: None,
            arguments: String::new(),
            last_update: now,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}

/// A tool call whose arguments parsed as one JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub call_id: String,
    pub name: Option<String>,
    pub arguments: serde_json::Value,
}

impl CompletedCall {
    /// The arguments re-serialized for the `function_call_output` item.
    pub fn output(&self) -> String {
        self.arguments.to_string()
    }
}

/// Pending calls keyed by call id, bounded in count and idle age.
pub struct FunctionCallAccumulator {
    pending: HashMap<String, PendingFunctionCall>,
    max_pending: usize,
    ttl: Duration,
}

impl FunctionCallAccumulator {
    pub fn new(max_pending: usize, ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            max_pending: max_pending.max(1),
            ttl,
        }
    }

    /// Records the start of a call. The first non-empty name sticks.
    pub fn start(&mut self, call_id: &str, name: &str) {
        let call = self.entry(call_id);
        if call.name.is_none() && !name.is_empty() {
            call.name = Some(name.to_string());
        }
    }

    /// Appends one arguments fragment, creating the entry on first sight.
    pub fn append(&mut self, call_id: &str, delta: &str) {
        self.entry(call_id).arguments.push_str(delta);
    }

    /// Removes the call and parses its arguments.
    ///
    /// `fallback` is used when no fragments were received for the call. The entry is
    /// gone afterwards whether or not parsing succeeds.
    pub fn complete(&mut self, call_id: &str, fallback: Option<&str>) -> Result<CompletedCall> {
        let call = self
            .pending
            .remove(call_id)
            .ok_or_else(|| BridgeError::UnknownFunctionCall(call_id.to_string()))?;

        let text = match (call.arguments.is_empty(), fallback) {
            (true, Some(fallback)) => fallback,
            _ => call.arguments.as_str(),
        };
        let arguments = serde_json::from_str::<serde_json::Value>(text).map_err(|source| {
            BridgeError::MalformedFunctionArguments {
                call_id: call.call_id.clone(),
                source,
            }
        })?;

        Ok(CompletedCall {
            call_id: call.call_id,
            name: call.name,
            arguments,
        })
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.pending.contains_key(call_id)
    }

    pub fn get(&self, call_id: &str) -> Option<&PendingFunctionCall> {
        self.pending.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn entry(&mut self, call_id: &str) -> &mut PendingFunctionCall {
        let now = Instant::now();
        self.evict_stale(now);
        if !self.pending.contains_key(call_id) && self.pending.len() >= self.max_pending {
            self.evict_oldest();
        }
        let call = self
            .pending
            .entry(call_id.to_string())
            .or_insert_with(|| PendingFunctionCall::new(call_id, now));
        call.last_update = now;
        call
    }

    fn evict_stale(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.pending.retain(|call_id, call| {
            let fresh = now.saturating_duration_since(call.last_update) < ttl;
            if !fresh {
                tracing::warn!(call_id = %call_id, "dropping function call idle for over {:?}", ttl);
            }
            fresh
        });
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .values()
            .min_by_key(|call| call.last_update)
            .map(|call| call.call_id.clone());
        if let Some(call_id) = oldest {
            tracing::warn!(call_id = %call_id, "too many pending function calls, dropping oldest");
            self.pending.remove(&call_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accumulator() -> FunctionCallAccumulator {
        FunctionCallAccumulator::new(8, Duration::from_secs(60))
    }

    #[test]
    fn fragments_are_concatenated_in_order() {
        let mut calls = accumulator();
        calls.append("c1", "{\"a\":1");
        calls.append("c1", ",\"b\":2}");

        let done = calls.complete("c1", None).unwrap();
        assert_eq!(done.arguments, json!({ "a": 1, "b": 2 }));
        assert_eq!(done.output(), r#"{"a":1,"b":2}"#);
        assert!(!calls.contains("c1"));
    }

    #[test]
    fn interleaved_calls_stay_separate() {
        let mut calls = accumulator();
        calls.start("c1", "get_json_object");
        calls.append("c1", "{\"x\":");
        calls.append("c2", "[1,");
        calls.append("c1", "\"one\"}");

        let first = calls.complete("c1", None).unwrap();
        assert_eq!(first.arguments, json!({ "x": "one" }));
        assert_eq!(first.name.as_deref(), Some("get_json_object"));

        calls.append("c2", "2]");
        let second = calls.complete("c2", None).unwrap();
        assert_eq!(second.arguments, json!([1, 2]));
        assert!(calls.is_empty());
    }

    #[test]
    fn malformed_arguments_still_remove_the_entry() {
        let mut calls = accumulator();
        calls.append("c1", "{\"a\":");

        let err = calls.complete("c1", None).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedFunctionArguments { ref call_id, .. } if call_id == "c1"));
        assert!(!calls.contains("c1"));
    }

    #[test]
    fn second_completion_is_unknown() {
        let mut calls = accumulator();
        calls.append("c1", "{}");
        calls.complete("c1", None).unwrap();

        let err = calls.complete("c1", Some("{}")).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownFunctionCall(_)));
    }

    #[test]
    fn fallback_arguments_apply_only_without_fragments() {
        let mut calls = accumulator();
        calls.start("c1", "get_json_object");
        let done = calls.complete("c1", Some(r#"{"tab":"vitals"}"#)).unwrap();
        assert_eq!(done.arguments, json!({ "tab": "vitals" }));

        calls.append("c2", "{\"from\":\"deltas\"}");
        let done = calls.complete("c2", Some(r#"{"from":"done"}"#)).unwrap();
        assert_eq!(done.arguments, json!({ "from": "deltas" }));
    }

    #[test]
    fn name_is_immutable_once_set() {
        let mut calls = accumulator();
        calls.start("c1", "first");
        calls.start("c1", "second");
        assert_eq!(calls.get("c1").and_then(|c| c.name()), Some("first"));
    }

    #[test]
    fn capacity_evicts_the_oldest_call() {
        let mut calls = FunctionCallAccumulator::new(2, Duration::from_secs(60));
        calls.append("c1", "{");
        std::thread::sleep(Duration::from_millis(2));
        calls.append("c2", "{");
        std::thread::sleep(Duration::from_millis(2));
        calls.append("c3", "{");

        assert_eq!(calls.len(), 2);
        assert!(!calls.contains("c1"));
        assert!(calls.contains("c2"));
        assert!(calls.contains("c3"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_calls_age_out() {
        let mut calls = FunctionCallAccumulator::new(8, Duration::from_secs(30));
        calls.append("old", "{");
        tokio::time::advance(Duration::from_secs(31)).await;
        calls.append("new", "{");

        assert!(!calls.contains("old"));
        assert!(calls.contains("new"));
    }
}
