use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

/// Capability token for enqueueing requests into a group
///
/// Cloning a lock yields another handle to the same lock.
#[derive(Clone)]
pub struct GroupLock {
    inner: Arc<GroupLockInner>,
}

struct GroupLockInner {
    owner: Option<String>,
    modifying: bool,
    serial_number: Option<u64>,
    state: Mutex<GroupLockState>,
    on_cancel: Mutex<Option<CancelCallback>>,
    released: watch::Sender<bool>,
}

struct GroupLockState {
    group_id: Option<String>,
    locked: bool,
    released: bool,
    canceled: bool,
}

/// Builder for [`GroupLock`]
#[derive(Default)]
pub struct GroupLockBuilder {
    group_id: Option<String>,
    locked: bool,
    owner: Option<String>,
    serial_number: Option<u64>,
    modifying: bool,
    on_cancel: Option<CancelCallback>,
}

impl GroupLockBuilder {
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Diagnostic label of whoever holds the lock
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn serial_number(mut self, serial_number: u64) -> Self {
        self.serial_number = Some(serial_number);
        self
    }

    /// Marks the lock as protecting a modification, which makes it cancelable
    pub fn modifying(mut self, modifying: bool) -> Self {
        self.modifying = modifying;
        self
    }

    pub fn on_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    pub fn build(self) -> GroupLock {
        let (released, _) = watch::channel(false);
        GroupLock {
            inner: Arc::new(GroupLockInner {
                owner: self.owner,
                modifying: self.modifying,
                serial_number: self.serial_number,
                state: Mutex::new(GroupLockState {
                    group_id: self.group_id,
                    locked: self.locked,
                    released: false,
                    canceled: false,
                }),
                on_cancel: Mutex::new(self.on_cancel),
                released,
            }),
        }
    }
}

impl GroupLock {
    pub fn builder() -> GroupLockBuilder {
        GroupLockBuilder::default()
    }

    /// Unlocked lock for the given group
    pub fn new(group_id: impl Into<String>) -> Self {
        Self::builder().group_id(group_id).build()
    }

    pub fn create(
        group_id: Option<&str>,
        locked: bool,
        owner: Option<&str>,
        serial_number: Option<u64>,
    ) -> Self {
        let mut builder = Self::builder().locked(locked);
        if let Some(group_id) = group_id {
            builder = builder.group_id(group_id);
        }
        if let Some(owner) = owner {
            builder = builder.owner(owner);
        }
        if let Some(serial_number) = serial_number {
            builder = builder.serial_number(serial_number);
        }
        builder.build()
    }

    pub fn group_id(&self) -> Option<String> {
        self.inner.state.lock().group_id.clone()
    }

    /// Decides the group late, e.g. for deferred operations
    pub fn set_group_id(&self, group_id: impl Into<String>) {
        self.inner.state.lock().group_id = Some(group_id.into());
    }

    pub fn owner(&self) -> Option<&str> {
        self.inner.owner.as_deref()
    }

    pub fn serial_number(&self) -> Option<u64> {
        self.inner.serial_number
    }

    pub fn is_locked(&self) -> bool {
        self.inner.state.lock().locked
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.state.lock().canceled
    }

    pub fn is_modifying(&self) -> bool {
        self.inner.modifying
    }

    /// Releases the lock and returns whether this call released it.
    ///
    /// Unlocking a released lock is a no-op; with `force` it is logged as a diagnostic.
    pub fn unlock(&self, force: bool) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.released {
                if force {
                    warn!("{} unlocked twice", self.describe(&state));
                }
                return false;
            }
            state.released = true;
            state.locked = false;
        }
        self.inner.released.send_replace(true);
        true
    }

    /// Cancels the lock: runs the cancel callback once and releases the lock
    pub fn cancel(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.canceled {
                return;
            }
            state.canceled = true;
            debug!("{} canceled", self.describe(&state));
        }
        let on_cancel = self.inner.on_cancel.lock().take();
        if let Some(on_cancel) = on_cancel {
            on_cancel();
        }
        self.unlock(false);
    }

    /// Resolves once this lock no longer blocks `group_id`
    pub fn wait_for(&self, group_id: &str) -> BoxFuture<'static, ()> {
        let blocking = {
            let state = self.inner.state.lock();
            state.locked && state.group_id.as_deref() == Some(group_id)
        };
        let mut released = self.inner.released.subscribe();

        async move {
            if blocking {
                // the sender lives as long as this lock, so an error means it is gone
                let _ = released.wait_for(|released| *released).await;
            }
        }
        .boxed()
    }

    /// A fresh, unlocked lock for the same group, owner and serial number
    pub fn unlocked_copy(&self) -> GroupLock {
        let group_id = self.group_id();
        GroupLock::create(
            group_id.as_deref(),
            false,
            self.owner(),
            self.serial_number(),
        )
    }

    fn describe(&self, state: &GroupLockState) -> String {
        format!(
            "GroupLock(group={}, owner={}, serial={})",
            state.group_id.as_deref().unwrap_or("<none>"),
            self.inner.owner.as_deref().unwrap_or("<none>"),
            self.inner
                .serial_number
                .map_or_else(|| "<none>".to_string(), |serial| serial.to_string())
        )
    }
}

impl fmt::Debug for GroupLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("GroupLock")
            .field("group_id", &state.group_id)
            .field("locked", &state.locked)
            .field("canceled", &state.canceled)
            .field("owner", &self.inner.owner)
            .field("serial_number", &self.inner.serial_number)
            .field("modifying", &self.inner.modifying)
            .finish()
    }
}

impl fmt::Display for GroupLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.write_str(&self.describe(&state))
    }
}
