//! Per-call values: the caller's invocation and the handler context built from it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use uuid::Uuid;
use warden_core::types::{Actor, Timestamp};

use crate::error::CapabilityError;
use crate::types::ActionEnvelope;

/// Cooperative cancellation flag shared between a caller and a handler.
///
/// The executor never acts on it; handlers that can stop early should poll
/// [`CancellationSignal::check`] or await [`CancellationSignal::cancelled`].
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<SignalState>,
}

#[derive(Default)]
struct SignalState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the signal cancelled and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// `Err(CapabilityError::Cancelled)` once cancelled, for use with `?`.
    pub fn check(&self) -> Result<(), CapabilityError> {
        if self.is_cancelled() {
            Err(CapabilityError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Ephemeral per-invocation bag handed to preconditions and handlers.
pub struct HandlerContext<C> {
    pub request_id: Uuid,
    pub actor: Option<Actor>,
    /// Caller-supplied dependencies (backend adapters and the like).
    pub context: Arc<C>,
    pub dry_run: bool,
    /// The confirmation token exactly as supplied with this call.
    pub confirmation_token: Option<String>,
    pub signal: CancellationSignal,
    pub now: Timestamp,
}

impl<C> Clone for HandlerContext<C> {
    fn clone(&self) -> Self {
        Self {
            request_id: self.request_id,
            actor: self.actor.clone(),
            context: Arc::clone(&self.context),
            dry_run: self.dry_run,
            confirmation_token: self.confirmation_token.clone(),
            signal: self.signal.clone(),
            now: self.now,
        }
    }
}

impl<C> fmt::Debug for HandlerContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("request_id", &self.request_id)
            .field("actor", &self.actor)
            .field("dry_run", &self.dry_run)
            .field("has_confirmation_token", &self.confirmation_token.is_some())
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Everything a caller hands to `Executor::execute` for one request.
pub struct Invocation<C> {
    pub envelope: ActionEnvelope,
    pub actor: Option<Actor>,
    pub context: Arc<C>,
    pub confirmation_token: Option<String>,
    pub signal: Option<CancellationSignal>,
    /// Clock override; wall-clock time is used when absent.
    pub now: Option<Timestamp>,
}

impl<C> Invocation<C> {
    pub fn new(envelope: ActionEnvelope, context: Arc<C>) -> Self {
        Self {
            envelope,
            actor: None,
            context,
            confirmation_token: None,
            signal: None,
            now: None,
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_confirmation_token(mut self, token: impl Into<String>) -> Self {
        self.confirmation_token = Some(token.into());
        self
    }

    pub fn with_signal(mut self, signal: CancellationSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    /// A blank token is treated the same as no token.
    pub(crate) fn has_confirmation_token(&self) -> bool {
        self.confirmation_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}
