//! PATCH merging and queue clean-up before a batch is serialized

use super::types::{BatchEntry, BatchQueue, QueuedRequest};
use crate::core::transport::HttpMethod;
use serde_json::Value;
use std::sync::Arc;

/// Merges compatible PATCH requests of one change set.
///
/// A PATCH is merged into the closest earlier PATCH for the same URL when both carry
/// identical headers and object bodies without structural conflicts. The chase looks
/// past PATCH requests to other URLs and stops at any other request. The absorbed
/// request's callbacks and result are taken over by the merge target.
pub(super) fn merge_patch_requests(requests: Vec<QueuedRequest>) -> Vec<QueuedRequest> {
    let mut merged: Vec<QueuedRequest> = Vec::with_capacity(requests.len());

    'requests: for request in requests {
        if request.method == HttpMethod::Patch {
            for candidate in merged.iter_mut().rev() {
                if candidate.method != HttpMethod::Patch {
                    break;
                }
                if candidate.url != request.url {
                    continue;
                }
                if candidate.headers == request.headers
                    && can_merge(candidate.body.as_deref(), request.body.as_deref())
                {
                    absorb(candidate, request);
                    continue 'requests;
                }
                break;
            }
        }
        merged.push(request);
    }

    merged
}

fn can_merge(target: Option<&Value>, source: Option<&Value>) -> bool {
    match (target, source) {
        (Some(Value::Object(target)), Some(Value::Object(source))) => {
            source.iter().all(|(key, value)| match target.get(key) {
                Some(existing) => compatible(existing, value),
                None => true,
            })
        }
        _ => false,
    }
}

/// A structured value on one side and a different kind on the other is a conflict
fn compatible(existing: &Value, value: &Value) -> bool {
    match (existing, value) {
        (Value::Object(existing), Value::Object(value)) => value
            .iter()
            .all(|(key, value)| existing.get(key).is_none_or(|old| compatible(old, value))),
        (Value::Array(_), Value::Array(_)) => true,
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => false,
        _ => true,
    }
}

fn absorb(target: &mut QueuedRequest, source: QueuedRequest) {
    if let (Some(target_body), Some(source_body)) = (target.body.as_mut(), source.body.as_deref()) {
        deep_merge(Arc::make_mut(target_body), source_body);
    }
    target.on_submit.extend(source.on_submit);
    target.responders.extend(source.responders);
}

/// Last writer wins; nested objects are merged member by member
pub(super) fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                let nested = value.is_object() && target.get(key).is_some_and(Value::is_object);
                if !nested {
                    target.insert(key.clone(), value.clone());
                } else if let Some(existing) = target.get_mut(key) {
                    deep_merge(existing, value);
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Flattens a queue into serializable entries.
///
/// PATCH requests are merged, empty change sets are dropped and, when
/// `change_set_optional` holds, a change set with a single request becomes a plain
/// request. Reads follow the change sets. The flag tells whether any modifying
/// request remains.
pub(super) fn clean_up_change_sets(
    queue: BatchQueue,
    change_set_optional: bool,
) -> (Vec<BatchEntry>, bool) {
    let mut entries = Vec::with_capacity(queue.change_sets.len() + queue.reads.len());
    let mut has_changes = false;

    for change_set in queue.change_sets {
        let mut requests = merge_patch_requests(change_set.requests);
        match requests.len() {
            0 => continue,
            1 if change_set_optional => {
                if let Some(request) = requests.pop() {
                    entries.push(BatchEntry::Single(request));
                }
            }
            _ => entries.push(BatchEntry::ChangeSet(requests)),
        }
        has_changes = true;
    }

    entries.extend(queue.reads.into_iter().map(BatchEntry::Single));
    (entries, has_changes)
}
