//! Session context and keep-alive

use super::requestor::{Requestor, RequestorInner};
use super::send::NO_SESSION;
use crate::core::headers::{Headers, SAP_CONTEXT_ID, SAP_ERR_ID};
use crate::core::transport::{HttpMethod, HttpRequest};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

/// Shortest supported `SAP-Http-Session-Timeout`, in seconds
const MIN_SESSION_TIMEOUT_SECS: u64 = 60;
/// Pings are sent this long before the session would expire
const PING_LEAD: Duration = Duration::from_secs(5);

pub(super) struct SessionState {
    pub(super) timer: Option<JoinHandle<()>>,
    /// Last response that carried the current context id
    pub(super) last_activity: Instant,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            timer: None,
            last_activity: Instant::now(),
        }
    }
}

impl Requestor {
    /// Takes over the session context of a response.
    ///
    /// The same context id only marks the session as active. A new one replaces the
    /// old session and starts a keep-alive timer if the timeout is supported.
    pub(super) fn set_session_context(&self, context_id: Option<&str>, timeout: Option<&str>) {
        let Some(context_id) = context_id else {
            return;
        };

        let timeout_secs = timeout
            .filter(|value| !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()))
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|seconds| *seconds >= MIN_SESSION_TIMEOUT_SECS);

        // check and replace in one critical section so a context starts one timer
        let previous = {
            let mut state = self.inner.state.lock();
            if state.headers.get(SAP_CONTEXT_ID) == Some(context_id) {
                state.session.last_activity = Instant::now();
                return;
            }
            state.headers.insert(SAP_CONTEXT_ID, context_id);
            state.session.last_activity = Instant::now();
            let timer = timeout_secs
                .and_then(|seconds| self.start_keep_alive(Duration::from_secs(seconds) - PING_LEAD));
            std::mem::replace(&mut state.session.timer, timer)
        };

        if let Some(previous) = previous {
            previous.abort();
        }
        info!("Session context {} established", context_id);
        if timeout_secs.is_none() {
            warn!(
                "Unsupported SAP-Http-Session-Timeout header: {}",
                timeout.unwrap_or("<none>")
            );
        }
    }

    /// Number of running keep-alive timers; at most one
    #[cfg(test)]
    pub(super) fn keep_alive_timers(&self) -> usize {
        let state = self.inner.state.lock();
        usize::from(
            state
                .session
                .timer
                .as_ref()
                .is_some_and(|timer| !timer.is_finished()),
        )
    }

    /// Forgets the session context and stops the keep-alive
    pub fn clear_session_context(&self) {
        self.clear_session_context_with(false);
    }

    /// Like [`clear_session_context`](Self::clear_session_context); with `timeout`
    /// the model is told that the session ended
    pub(super) fn clear_session_context_with(&self, timeout: bool) {
        let (timer, had_session) = {
            let mut state = self.inner.state.lock();
            let had_session = state.headers.remove(SAP_CONTEXT_ID).is_some();
            (state.session.timer.take(), had_session)
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        if had_session {
            debug!("Session context cleared");
        }
        if timeout {
            self.inner.model.on_session_timeout();
        }
    }

    fn start_keep_alive(&self, period: Duration) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime available, session keep-alive disabled");
            return None;
        };

        debug!("Session keep-alive every {:?}", period);
        let inner = Arc::downgrade(&self.inner);
        Some(handle.spawn(keep_alive(inner, period)))
    }

    /// One keep-alive tick; false ends the keep-alive
    async fn ping_session(&self) -> bool {
        let limit = Duration::from_secs(self.inner.config.session_keep_alive_limit_secs);
        let (idle, context_id) = {
            let state = self.inner.state.lock();
            (
                state.session.last_activity.elapsed(),
                state.headers.get(SAP_CONTEXT_ID).map(str::to_string),
            )
        };

        let Some(context_id) = context_id else {
            return false;
        };
        if idle >= limit {
            info!("Session idle for {:?}, ending keep-alive", idle);
            self.clear_session_context_with(true);
            return false;
        }

        let request = HttpRequest {
            method: HttpMethod::Head,
            url: format!(
                "{}{}",
                self.inner.config.service_url, self.inner.query_string
            ),
            headers: Headers::new().with(SAP_CONTEXT_ID, context_id),
            body: None,
        };

        match self.inner.transport.send(request).await {
            Ok(response) if response.header(SAP_ERR_ID) == Some(NO_SESSION) => {
                error!("Session not found on server");
                self.clear_session_context_with(true);
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!("Session keep-alive failed: {}", e);
                true
            }
        }
    }
}

async fn keep_alive(inner: Weak<RequestorInner>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let requestor = Requestor { inner };
        if !requestor.ping_session().await {
            break;
        }
    }
}
