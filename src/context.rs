// Per-request context forwarded to backend calls
//
// A RequestContext carries the caller's credentials and request id so every
// backend call can forward them, plus the deadline inherited from the HTTP
// request. Background work gets a detached copy: same credentials, no
// deadline, and a task that outlives the handler future.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Credentials forwarded from the portal session to the backends
#[derive(Clone, Debug)]
pub struct ForwardedAuth {
    pub token: String,
    /// User name recorded as created_by / updated_by
    pub actor: String,
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub auth: Option<ForwardedAuth>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(auth: Option<ForwardedAuth>, timeout: Option<Duration>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            auth,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Context for calls that are not tied to a portal user (CLI, startup)
    pub fn system() -> Self {
        Self::new(None, None)
    }

    pub fn actor(&self) -> &str {
        self.auth.as_ref().map(|a| a.actor.as_str()).unwrap_or("system")
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.token.as_str())
    }

    /// Time left before the deadline; `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }

    /// Copy that keeps credentials and request id but drops the deadline
    pub fn detached(&self) -> Self {
        Self {
            request_id: self.request_id,
            auth: self.auth.clone(),
            deadline: None,
        }
    }
}

/// Run `task` on its own tokio task with a detached context.
///
/// The task is not cancelled when the spawning request finishes or its client
/// disconnects. Failures are logged and dropped.
pub fn spawn_detached<F, Fut, E>(ctx: &RequestContext, label: &'static str, task: F) -> JoinHandle<()>
where
    F: FnOnce(RequestContext) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let detached = ctx.detached();
    let span = tracing::info_span!("detached", task = label, request_id = %detached.request_id);
    let fut = task(detached);

    tokio::spawn(
        async move {
            match fut.await {
                Ok(()) => tracing::debug!("Detached task completed"),
                Err(e) => tracing::warn!("Detached task failed: {}", e),
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn authed(timeout: Option<Duration>) -> RequestContext {
        RequestContext::new(
            Some(ForwardedAuth {
                token: "tok".to_string(),
                actor: "jdoe".to_string(),
            }),
            timeout,
        )
    }

    #[test]
    fn detached_context_keeps_credentials_but_not_deadline() {
        let ctx = authed(Some(Duration::from_secs(5)));
        let detached = ctx.detached();
        assert_eq!(detached.request_id, ctx.request_id);
        assert_eq!(detached.bearer_token(), Some("tok"));
        assert_eq!(detached.actor(), "jdoe");
        assert!(detached.remaining().is_none());
        assert!(ctx.remaining().is_some());
    }

    #[test]
    fn zero_timeout_is_expired() {
        assert!(authed(Some(Duration::ZERO)).is_expired());
        assert!(!authed(None).is_expired());
        assert_eq!(RequestContext::system().actor(), "system");
    }

    #[tokio::test]
    async fn detached_task_runs_after_parent_future_is_dropped() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let parent = authed(Some(Duration::ZERO));

        let handle = {
            let parent_future = async {
                spawn_detached(&parent, "test", move |ctx| async move {
                    assert!(ctx.remaining().is_none());
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok::<(), String>(())
                })
            };
            parent_future.await
        };

        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
