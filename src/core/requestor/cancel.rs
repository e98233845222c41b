//! Cancellation, removal and relocation of queued changes

use super::requestor::Requestor;
use super::types::{Callback, ODataRequest, QueuedRequest, RequestHandle, RequestId};
use crate::core::group_lock::GroupLock;
use crate::core::model::SubmitMode;
use crate::core::transport::HttpMethod;
use crate::utils::error::{RequestorError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

impl Requestor {
    /// Cancels queued changes accepted by `filter`, in one group or in all groups.
    ///
    /// Only changes with a cancel callback can be canceled. Their callbacks run and
    /// their results fail with a canceled error. Returns whether anything was canceled,
    /// or an error while the batch of the given group is running.
    pub fn cancel_changes_by_filter<F>(&self, filter: F, group_id: Option<&str>) -> Result<bool>
    where
        F: Fn(&QueuedRequest) -> bool,
    {
        if let Some(group_id) = group_id {
            self.ensure_not_running(group_id)?;
        }
        Ok(self.cancel_queued(filter, group_id))
    }

    /// Cancels all queued changes of the group and its modifying group locks
    pub fn cancel_changes(&self, group_id: &str) -> Result<()> {
        self.cancel_changes_by_filter(|_| true, Some(group_id))?;
        self.cancel_group_locks(Some(group_id));
        Ok(())
    }

    /// Removes the queued POST with the given body instance
    pub fn remove_post(&self, group_id: &str, body: &Arc<Value>) -> Result<()> {
        let removed = self.cancel_queued(
            |request| request.method == HttpMethod::Post && request.has_body(body),
            Some(group_id),
        );
        if removed {
            return Ok(());
        }

        let running = {
            let state = self.inner.state.lock();
            state.is_running(group_id)
        };
        if running {
            Err(reset_refused())
        } else {
            Err(RequestorError::invalid_request(format!(
                "No queued POST with this body in group '{}'",
                group_id
            )))
        }
    }

    /// Removes the queued PATCH behind the given request
    pub fn remove_patch(&self, id: RequestId) -> Result<()> {
        let removed = self.cancel_queued(
            |request| request.id == id && request.method == HttpMethod::Patch,
            None,
        );
        if removed {
            return Ok(());
        }

        let running = {
            let state = self.inner.state.lock();
            state
                .running
                .iter()
                .any(|batch| batch.request_ids.contains(&id))
        };
        if running {
            Err(reset_refused())
        } else {
            Err(RequestorError::invalid_request(format!(
                "No queued PATCH for request {}",
                id
            )))
        }
    }

    fn ensure_not_running(&self, group_id: &str) -> Result<()> {
        let running = {
            let state = self.inner.state.lock();
            state.is_running(group_id)
        };
        if running {
            return Err(RequestorError::batch_running(format!(
                "Cannot cancel the changes for group '{}', the batch request is running",
                group_id
            )));
        }
        Ok(())
    }

    fn cancel_queued<F>(&self, filter: F, group_id: Option<&str>) -> bool
    where
        F: Fn(&QueuedRequest) -> bool,
    {
        let mut canceled: Vec<(QueuedRequest, String)> = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (queue_group, queue) in state.queues.iter_mut() {
                if group_id.is_some_and(|group_id| group_id != queue_group.as_str()) {
                    continue;
                }
                for change_set in queue.change_sets.iter_mut() {
                    let requests = std::mem::take(&mut change_set.requests);
                    for request in requests {
                        if request.on_cancel.is_some() && filter(&request) {
                            canceled.push((request, queue_group.clone()));
                        } else {
                            change_set.requests.push(request);
                        }
                    }
                }
            }
        }

        let found = !canceled.is_empty();
        for (mut request, group_id) in canceled {
            debug!("Canceled {} {} in group '{}'", request.method, request.url, group_id);
            if let Some(on_cancel) = request.on_cancel.take() {
                on_cancel();
            }
            let error = RequestorError::canceled(format!(
                "Request canceled: {} {}; group: {}",
                request.method, request.url, group_id
            ));
            request.reject(error);
        }
        found
    }

    /// Moves the queued change with the given body instance to another group
    pub fn relocate(&self, from_group_id: &str, body: &Arc<Value>, to_group_id: &str) -> Result<()> {
        let request = {
            let mut state = self.inner.state.lock();
            state.queues.get_mut(from_group_id).and_then(|queue| {
                queue.change_sets.iter_mut().find_map(|change_set| {
                    let position = change_set
                        .requests
                        .iter()
                        .position(|request| request.has_body(body))?;
                    Some(change_set.requests.remove(position))
                })
            })
        };

        match request {
            Some(request) => {
                self.add_change_to_group(request, to_group_id);
                Ok(())
            }
            None => Err(RequestorError::canceled(format!(
                "Request not found in group '{}'",
                from_group_id
            ))),
        }
    }

    /// Moves every queued change of a group, or those whose `If-Match` is `entity`,
    /// to another group. Returns the number of moved changes.
    pub fn relocate_all(
        &self,
        from_group_id: &str,
        entity: Option<&str>,
        to_group_id: &str,
    ) -> usize {
        let moved: Vec<QueuedRequest> = {
            let mut state = self.inner.state.lock();
            let Some(queue) = state.queues.get_mut(from_group_id) else {
                return 0;
            };
            let mut moved = Vec::new();
            for change_set in queue.change_sets.iter_mut() {
                let requests = std::mem::take(&mut change_set.requests);
                for request in requests {
                    if entity.is_none_or(|entity| request.matches_entity(entity)) {
                        moved.push(request);
                    } else {
                        change_set.requests.push(request);
                    }
                }
            }
            moved
        };

        let count = moved.len();
        for request in moved {
            self.add_change_to_group(request, to_group_id);
        }
        count
    }

    /// True if a change is queued or a batch with changes is running in scope
    pub fn has_pending_changes(&self, group_id: Option<&str>, entity: Option<&str>) -> bool {
        let state = self.inner.state.lock();
        let in_scope = |candidate: &str| group_id.is_none_or(|group_id| group_id == candidate);

        let running = state.running.iter().any(|batch| {
            in_scope(&batch.group_id)
                && entity.is_none_or(|entity| {
                    batch
                        .entities
                        .iter()
                        .any(|candidate| candidate.as_deref() == Some(entity))
                })
        });

        running
            || state.queues.iter().any(|(queue_group, queue)| {
                in_scope(queue_group)
                    && queue.changes().any(|request| {
                        entity.is_none_or(|entity| request.matches_entity(entity))
                    })
            })
    }

    fn add_change_to_group(&self, mut request: QueuedRequest, group_id: &str) {
        debug!(
            "Relocating {} {} to group '{}'",
            request.method, request.url, group_id
        );

        if self.group_submit_mode(group_id) != SubmitMode::Direct {
            let created = {
                let mut state = self.inner.state.lock();
                let (queue, created) = state.queue(group_id);
                let index = queue.open_change_set;
                queue.change_sets[index].requests.push(request);
                created
            };
            if created {
                self.inner.model.on_create_group(group_id);
            }
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            request.reject(RequestorError::invalid_request(format!(
                "Cannot send to group '{}' without an async runtime",
                group_id
            )));
            return;
        };

        let on_submit: Vec<Callback> = std::mem::take(&mut request.on_submit);
        let mut direct = ODataRequest::new(request.method, request.url.clone())
            .headers(&request.headers)
            .original_resource_path(request.resource_path.clone())
            .on_submit(move || on_submit.into_iter().for_each(|callback| callback()));
        if let Some(body) = request.body.clone() {
            direct = direct.body(body);
        }
        if let Some(on_cancel) = request.on_cancel.take() {
            direct = direct.on_cancel(on_cancel);
        }

        let lock = GroupLock::new(group_id);
        let handle: Result<RequestHandle> = self.request(direct, Some(&lock));
        match handle {
            Ok(handle) => {
                runtime.spawn(async move {
                    match handle.await {
                        Ok(value) => request.resolve(value),
                        Err(error) => request.reject(error),
                    }
                });
            }
            Err(error) => request.reject(error),
        }
    }
}

fn reset_refused() -> RequestorError {
    RequestorError::batch_running("Cannot reset the changes, the batch request is running")
}
