//! Per-session lock controller
//!
//! One controller drives one editing session on one resource: acquire,
//! heartbeat renewals while owned, status polling, and a best-effort
//! release on teardown. The server's verdict is authoritative; the
//! controller never extends a deadline on its own.

mod state;

pub use state::{LockListener, LockState, NoopListener};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use editlock_api::{
    AcquireRequest, AcquireResponse, LockInfo, ReleaseRequest, RenewRequest, StatusQuery,
    StatusResponse,
};
use editlock_common::LockKey;

use crate::api::LockApi;
use crate::config::{ControllerConfig, MIN_TIMER_PERIOD};
use crate::error::{ClientError, Result};
use state::Event;

#[derive(Debug)]
struct Session {
    state: LockState,
    token: Option<String>,
    lock: Option<LockInfo>,
    status: Option<StatusResponse>,
    /// Bumped on every grant; a status reply older than the grant is not
    /// allowed to declare the lock lost
    generation: u64,
    missed_heartbeats: u32,
    connection_lost: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            state: LockState::Idle,
            token: None,
            lock: None,
            status: None,
            generation: 0,
            missed_heartbeats: 0,
            connection_lost: false,
        }
    }

    fn mark_lost(&mut self, events: &mut Vec<Event>) {
        if self.token.take().is_some() {
            self.state = LockState::Lost;
            events.push(Event::Lost);
        }
    }

    fn mark_reachable(&mut self, events: &mut Vec<Event>) {
        self.missed_heartbeats = 0;
        if self.connection_lost {
            self.connection_lost = false;
            events.push(Event::ConnectionRestored);
        }
    }
}

/// Clears its flag on drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    api: Arc<dyn LockApi>,
    key: LockKey,
    owner_id: String,
    owner_name: String,
    config: ControllerConfig,
    listener: Arc<dyn LockListener>,
    session: Mutex<Session>,
    renew_in_flight: AtomicBool,
    status_in_flight: AtomicBool,
    torn_down: AtomicBool,
}

impl Inner {
    fn dispatch(&self, events: Vec<Event>) {
        for event in &events {
            event.dispatch(self.listener.as_ref());
        }
    }

    fn restore(&self, previous: LockState, during: LockState) {
        let mut session = self.session.lock();
        if session.state == during {
            session.state = if previous.is_owned() {
                LockState::Owned
            } else {
                previous
            };
        }
    }

    async fn acquire(&self) -> Result<bool> {
        if self.torn_down.load(Ordering::Acquire) {
            return Err(ClientError::TornDown);
        }

        let previous = {
            let mut session = self.session.lock();
            std::mem::replace(&mut session.state, LockState::Acquiring)
        };

        let request = AcquireRequest {
            resource_type: self.key.resource_type.to_string(),
            resource_id: self.key.resource_id.clone(),
            owner_id: self.owner_id.clone(),
            owner_name: self.owner_name.clone(),
        };

        let response = match self.api.acquire(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.restore(previous, LockState::Acquiring);
                return Err(e);
            }
        };

        let mut events = Vec::new();
        let granted = match self.apply_acquire(response, &mut events) {
            Ok(granted) => granted,
            Err(e) => {
                self.restore(previous, LockState::Acquiring);
                return Err(e);
            }
        };
        self.dispatch(events);
        Ok(granted)
    }

    fn apply_acquire(&self, response: AcquireResponse, events: &mut Vec<Event>) -> Result<bool> {
        let mut session = self.session.lock();
        match response {
            AcquireResponse {
                granted: true,
                token: Some(token),
                lock: Some(lock),
            } => {
                info!(
                    key = %self.key,
                    owner_id = %self.owner_id,
                    expires_at = %lock.expires_at,
                    "Lock acquired"
                );
                session.token = Some(token);
                session.lock = Some(lock.clone());
                session.state = LockState::Owned;
                session.generation += 1;
                session.mark_reachable(events);
                events.push(Event::Acquired(lock));
                Ok(true)
            }
            AcquireResponse {
                granted: false,
                lock: Some(holder),
                ..
            } => {
                debug!(key = %self.key, holder = %holder.owner_id, "Lock held by another owner");
                session.token = None;
                session.lock = Some(holder.clone());
                session.state = LockState::LockedByOther;
                session.mark_reachable(events);
                events.push(Event::Denied(holder));
                Ok(false)
            }
            other => Err(ClientError::Protocol(format!(
                "incomplete acquire response: granted={}, token={}, lock={}",
                other.granted,
                other.token.is_some(),
                other.lock.is_some()
            ))),
        }
    }

    async fn release(&self) -> Result<()> {
        let (token, previous) = {
            let mut session = self.session.lock();
            let Some(token) = session.token.clone() else {
                return Ok(());
            };
            let previous = std::mem::replace(&mut session.state, LockState::Releasing);
            (token, previous)
        };

        let request = ReleaseRequest {
            resource_type: self.key.resource_type.to_string(),
            resource_id: self.key.resource_id.clone(),
            token,
        };

        if let Err(e) = self.api.release(&request).await {
            self.restore(previous, LockState::Releasing);
            return Err(e);
        }

        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            session.token = None;
            session.lock = None;
            session.state = LockState::Idle;
            session.mark_reachable(&mut events);
            events.push(Event::Released);
        }
        info!(key = %self.key, owner_id = %self.owner_id, "Lock released");
        self.dispatch(events);
        Ok(())
    }

    async fn heartbeat(&self) {
        let Some(_in_flight) = InFlight::try_begin(&self.renew_in_flight) else {
            debug!(key = %self.key, "Renew still in flight, skipping heartbeat");
            return;
        };

        let token = {
            let mut session = self.session.lock();
            if session.state != LockState::Owned {
                return;
            }
            let Some(token) = session.token.clone() else {
                return;
            };
            session.state = LockState::Renewing;
            token
        };

        let request = RenewRequest {
            resource_type: self.key.resource_type.to_string(),
            resource_id: self.key.resource_id.clone(),
            token: token.clone(),
        };
        let result = self.api.renew(&request).await;

        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            let current = session.state == LockState::Renewing
                && session.token.as_deref() == Some(token.as_str());

            match result {
                Ok(response) => {
                    session.mark_reachable(&mut events);
                    if current {
                        if response.ok {
                            session.state = LockState::Owned;
                        } else {
                            warn!(key = %self.key, owner_id = %self.owner_id, "Lock no longer owned");
                            session.mark_lost(&mut events);
                        }
                    }
                }
                Err(e) if !e.is_transient() => {
                    // The server answered and refused the renewal; retrying cannot succeed
                    warn!(key = %self.key, error = %e, "Heartbeat rejected, giving up the lock");
                    if matches!(e, ClientError::Server { .. }) {
                        session.mark_reachable(&mut events);
                    }
                    if current {
                        session.mark_lost(&mut events);
                    }
                }
                Err(e) => {
                    if current {
                        session.state = LockState::Owned;
                    }
                    session.missed_heartbeats += 1;
                    warn!(
                        key = %self.key,
                        missed = session.missed_heartbeats,
                        error = %e,
                        "Heartbeat failed"
                    );
                    if session.missed_heartbeats >= self.config.max_missed_heartbeats {
                        if !session.connection_lost {
                            session.connection_lost = true;
                            events.push(Event::ConnectionLost);
                        }
                        if session.state.is_owned() {
                            warn!(key = %self.key, "Too many missed heartbeats, lock presumed expired");
                            session.mark_lost(&mut events);
                        }
                    }
                }
            }
        }
        self.dispatch(events);
    }

    async fn refresh_status(&self) -> Result<Option<StatusResponse>> {
        let Some(_in_flight) = InFlight::try_begin(&self.status_in_flight) else {
            return Ok(None);
        };

        let generation = self.session.lock().generation;
        let query = StatusQuery {
            resource_type: self.key.resource_type.to_string(),
            resource_id: self.key.resource_id.clone(),
            caller_id: self.owner_id.clone(),
        };
        let status = self.api.status(&query).await?;

        let mut events = Vec::new();
        {
            let mut session = self.session.lock();
            session.mark_reachable(&mut events);
            match session.state {
                LockState::Owned | LockState::Renewing
                    if !status.is_own_lock && session.generation == generation =>
                {
                    warn!(key = %self.key, "Status shows the lock is no longer ours");
                    session.mark_lost(&mut events);
                }
                LockState::Idle | LockState::LockedByOther => {
                    if status.is_locked && !status.is_own_lock {
                        session.state = LockState::LockedByOther;
                    } else if !status.is_locked {
                        session.state = LockState::Idle;
                        session.lock = None;
                    }
                }
                _ => {}
            }
            session.status = Some(status.clone());
            events.push(Event::Status(status.clone()));
        }
        self.dispatch(events);
        Ok(Some(status))
    }
}

pub struct LockController {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LockController {
    pub fn new(
        api: Arc<dyn LockApi>,
        key: LockKey,
        owner_id: impl Into<String>,
        owner_name: impl Into<String>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                key,
                owner_id: owner_id.into(),
                owner_name: owner_name.into(),
                config,
                listener: Arc::new(NoopListener),
                session: Mutex::new(Session::new()),
                renew_in_flight: AtomicBool::new(false),
                status_in_flight: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Install the callback sink. Only effective before `mount`.
    pub fn with_listener(mut self, listener: Arc<dyn LockListener>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.listener = listener;
        }
        self
    }

    pub fn key(&self) -> &LockKey {
        &self.inner.key
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LockState {
        self.inner.session.lock().state
    }

    pub fn is_owned(&self) -> bool {
        self.state().is_owned()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.session.lock().token.clone()
    }

    /// Latest holder info from an acquire reply (ours or the other owner's)
    pub fn lock_info(&self) -> Option<LockInfo> {
        self.inner.session.lock().lock.clone()
    }

    pub fn last_status(&self) -> Option<StatusResponse> {
        self.inner.session.lock().status.clone()
    }

    pub fn is_connection_lost(&self) -> bool {
        self.inner.session.lock().connection_lost
    }

    /// Start the session: one opportunistic acquire if configured (never
    /// preempting another owner), otherwise one status read, then timers.
    pub async fn mount(&self) {
        if self.inner.config.auto_acquire_on_mount {
            if let Err(e) = self.inner.acquire().await {
                warn!(key = %self.inner.key, error = %e, "Acquire on mount failed");
            }
        } else if let Err(e) = self.inner.refresh_status().await {
            warn!(key = %self.inner.key, error = %e, "Initial status read failed");
        }
        self.start_timers();
    }

    fn start_timers(&self) {
        if self.inner.torn_down.load(Ordering::Acquire) {
            return;
        }
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let period = inner.config.heartbeat_interval.max(MIN_TIMER_PERIOD);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.heartbeat().await;
            }
        }));

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let period = inner.config.status_poll_interval.max(MIN_TIMER_PERIOD);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = inner.refresh_status().await {
                    debug!(key = %inner.key, error = %e, "Status poll failed");
                }
            }
        }));
    }

    /// Manual acquire. Returns whether the lock was granted; fires
    /// `on_acquired` or `on_denied` on success.
    pub async fn acquire(&self) -> Result<bool> {
        self.inner.acquire().await
    }

    /// Manual release. A no-op when no lock is held; fires `on_released` on success.
    pub async fn release(&self) -> Result<()> {
        self.inner.release().await
    }

    /// One renewal round-trip; skipped when a renewal is already outstanding
    /// or the lock is not owned.
    pub async fn heartbeat(&self) {
        self.inner.heartbeat().await
    }

    /// One status round-trip. `Ok(None)` means a poll was already outstanding.
    pub async fn refresh_status(&self) -> Result<Option<StatusResponse>> {
        self.inner.refresh_status().await
    }

    /// End the session: stop the timers and, when configured and a token is
    /// held, emit exactly one detached release. Never blocks, never retries.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let token = {
            let mut session = self.inner.session.lock();
            session.state = LockState::Idle;
            session.lock = None;
            session.token.take()
        };
        let Some(token) = token else {
            return;
        };
        if !self.inner.config.auto_release_on_teardown {
            debug!(key = %self.inner.key, "Leaving lock to expire by TTL");
            return;
        }

        let request = ReleaseRequest {
            resource_type: self.inner.key.resource_type.to_string(),
            resource_id: self.inner.key.resource_id.clone(),
            token,
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let api = self.inner.api.clone();
                handle.spawn(async move {
                    if let Err(e) = api.release(&request).await {
                        debug!(error = %e, "Teardown release failed, lock will expire by TTL");
                    }
                });
            }
            Err(_) => {
                warn!(key = %self.inner.key, "No async runtime for teardown release, lock will expire by TTL");
            }
        }
    }
}

impl Drop for LockController {
    fn drop(&mut self) {
        self.teardown();
    }
}
