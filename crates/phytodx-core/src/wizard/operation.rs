//! Guarded remote operations.
//!
//! Each remote call a wizard step makes is tracked by an `Operation`: an
//! explicit state machine (`Idle -> Pending -> Succeeded | Failed`) in which
//! "pending" is a state of its own, so a second call with the same
//! idempotency key cannot be issued while the first is in flight.
//!
//! Starting a call yields a `Ticket` carrying a generation number and a
//! cancellation token. Cancelling (or superseding) the operation bumps the
//! generation and cancels the token; a completion whose ticket generation no
//! longer matches is stale and must be discarded by the caller.

use std::future::Future;
use std::time::Duration;

use phytodx_types::error::RemoteError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default bound on a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Ticket / Completion
// ---------------------------------------------------------------------------

/// Handle for one issued remote call.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub operation: &'static str,
    pub key: String,
    pub generation: u64,
    /// Correlation id for logs.
    pub request_id: Uuid,
    token: CancellationToken,
}

impl Ticket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Result of a spawned call, delivered back to the owning controller.
#[derive(Debug)]
pub struct Completion<K, O> {
    pub kind: K,
    pub ticket: Ticket,
    pub result: Result<O, RemoteError>,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Observable status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Pending {
        key: String,
        token: CancellationToken,
    },
    Succeeded {
        key: String,
    },
    Failed {
        key: String,
        error: String,
    },
}

/// Errors from starting an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("{operation} is already pending for '{key}'")]
    AlreadyPending { operation: &'static str, key: String },
}

/// State machine for one kind of remote call.
#[derive(Debug)]
pub struct Operation {
    name: &'static str,
    generation: u64,
    phase: Phase,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            phase: Phase::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start a call for `key`.
    ///
    /// A pending call with the same key rejects the request. A pending call
    /// for a different key is superseded: its token is cancelled and its
    /// generation retired.
    pub fn begin(&mut self, key: impl Into<String>) -> Result<Ticket, OperationError> {
        let key = key.into();
        if let Phase::Pending { key: pending, .. } = &self.phase {
            if *pending == key {
                return Err(OperationError::AlreadyPending {
                    operation: self.name,
                    key,
                });
            }
            tracing::debug!(operation = self.name, superseded = %pending, "superseding pending call");
        }
        self.cancel();

        self.generation += 1;
        let token = CancellationToken::new();
        self.phase = Phase::Pending {
            key: key.clone(),
            token: token.clone(),
        };

        Ok(Ticket {
            operation: self.name,
            key,
            generation: self.generation,
            request_id: Uuid::now_v7(),
            token,
        })
    }

    /// Whether `ticket` still belongs to the in-flight call.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.operation == self.name
            && ticket.generation == self.generation
            && matches!(&self.phase, Phase::Pending { key, .. } if *key == ticket.key)
    }

    /// Mark the call as succeeded. Returns false for stale tickets.
    pub fn complete(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = Phase::Succeeded {
            key: ticket.key.clone(),
        };
        true
    }

    /// Mark the call as failed. Returns false for stale tickets.
    pub fn fail(&mut self, ticket: &Ticket, error: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = Phase::Failed {
            key: ticket.key.clone(),
            error: error.into(),
        };
        true
    }

    /// Abort any in-flight call and return to `Idle`.
    ///
    /// Returns true if a call was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Pending { token, key } => {
                token.cancel();
                tracing::debug!(operation = self.name, key = %key, "cancelled in-flight call");
                true
            }
            _ => false,
        };
        self.generation += 1;
        was_pending
    }

    pub fn status(&self) -> OperationStatus {
        match self.phase {
            Phase::Idle => OperationStatus::Idle,
            Phase::Pending { .. } => OperationStatus::Pending,
            Phase::Succeeded { .. } => OperationStatus::Succeeded,
            Phase::Failed { .. } => OperationStatus::Failed,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::Failed { .. })
    }

    /// Key of the current or last call, if any.
    pub fn key(&self) -> Option<&str> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Pending { key, .. } | Phase::Succeeded { key } | Phase::Failed { key, .. } => {
                Some(key)
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Await `call` unless the ticket is cancelled or `timeout` elapses first.
pub async fn run_guarded<O, F>(ticket: &Ticket, timeout: Duration, call: F) -> Result<O, RemoteError>
where
    F: Future<Output = Result<O, RemoteError>>,
{
    tokio::select! {
        biased;
        _ = ticket.token().cancelled() => Err(RemoteError::Cancelled),
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(inner) => inner,
            Err(_elapsed) => Err(RemoteError::Timeout {
                operation: ticket.operation.to_string(),
                secs: timeout.as_secs(),
            }),
        },
    }
}

/// Spawn a guarded call and report its completion on `tx`.
///
/// A closed channel (the controller was dropped) silently discards the
/// result.
pub fn spawn_guarded<K, O, F>(
    tx: &mpsc::UnboundedSender<Completion<K, O>>,
    kind: K,
    ticket: Ticket,
    timeout: Duration,
    call: F,
) where
    K: Send + 'static,
    O: Send + 'static,
    F: Future<Output = Result<O, RemoteError>> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = run_guarded(&ticket, timeout, call).await;
        tracing::debug!(
            operation = ticket.operation,
            request_id = %ticket.request_id,
            ok = result.is_ok(),
            "remote call finished"
        );
        let _ = tx.send(Completion {
            kind,
            ticket,
            result,
        });
    });
}
