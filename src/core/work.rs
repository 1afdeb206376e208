use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::AgentHandle;
use super::NodeState;
use super::Role;
use crate::Result;

/// What the leader task wants once it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Keep leading; the task runs again on the next leadership term
    Done,
    /// Step down gracefully: release the lease and announce the vacancy
    Relinquish,
}

/// Leader task with its future boxed, as stored by a node and shared by
/// every local agent.
pub type LeaderTask = Arc<dyn Fn(LeaderContext) -> BoxFuture<'static, Result<WorkOutcome>> + Send + Sync>;

/// Handed to the leader task for one leadership term.
#[derive(Debug, Clone)]
pub struct LeaderContext {
    pub cluster_id: String,
    pub holder_id: String,
    /// Tag every order-sensitive side effect with this token
    pub fencing_token: u64,
    /// Cancelled as soon as this term ends
    pub cancel: CancellationToken,
}

/// Runs a user task for every leadership term of one agent.
pub struct LeaderWork;

impl LeaderWork {
    pub fn spawn<F, Fut>(
        handle: AgentHandle,
        shutdown_signal: watch::Receiver<()>,
        task: F,
    ) -> JoinHandle<()>
    where
        F: Fn(LeaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WorkOutcome>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = run_leader_work(handle, shutdown_signal, task).await {
                error!("leader work stopped: {:?}", e);
            }
        })
    }
}

fn holds(
    state: &NodeState,
    fencing_token: u64,
) -> bool {
    state.role == Role::Leader && state.held_fencing_token == Some(fencing_token)
}

async fn run_leader_work<F, Fut>(
    handle: AgentHandle,
    mut shutdown_signal: watch::Receiver<()>,
    task: F,
) -> Result<()>
where
    F: Fn(LeaderContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WorkOutcome>> + Send + 'static,
{
    let mut status = handle.subscribe_state();

    loop {
        // wait for a leadership term
        let fencing_token = loop {
            let current = status.borrow_and_update().clone();
            if let (Role::Leader, Some(token)) = (current.role, current.held_fencing_token) {
                break token;
            }
            tokio::select! {
                _ = shutdown_signal.changed() => return Ok(()),
                changed = status.changed() => if changed.is_err() { return Ok(()) },
            }
        };

        let cancel = CancellationToken::new();
        let ctx = LeaderContext {
            cluster_id: handle.cluster_id().to_string(),
            holder_id: handle.holder_id().to_string(),
            fencing_token,
            cancel: cancel.clone(),
        };
        info!("[{}] starting leader work under token {}", ctx.holder_id, fencing_token);
        let mut work = tokio::spawn(task(ctx));

        let finished = loop {
            tokio::select! {
                result = &mut work => break Some(result),
                _ = shutdown_signal.changed() => {
                    cancel.cancel();
                    work.abort();
                    return Ok(());
                }
                changed = status.changed() => {
                    let still_leader = changed.is_ok() && holds(&status.borrow_and_update(), fencing_token);
                    if !still_leader {
                        warn!("[{}] leadership under token {} ended, cancelling work", handle.holder_id(), fencing_token);
                        cancel.cancel();
                        work.abort();
                        break None;
                    }
                }
            }
        };

        match finished {
            Some(Ok(Ok(WorkOutcome::Relinquish))) => {
                info!("[{}] leader work done, relinquishing", handle.holder_id());
                handle.step_down().await?;
            }
            Some(Ok(Ok(WorkOutcome::Done))) => {}
            Some(Ok(Err(e))) => warn!("[{}] leader work failed: {:?}", handle.holder_id(), e),
            Some(Err(e)) => error!("[{}] leader work panicked: {:?}", handle.holder_id(), e),
            None => {}
        }

        // run once per term: wait for this one to end
        while holds(&status.borrow_and_update(), fencing_token) {
            tokio::select! {
                _ = shutdown_signal.changed() => return Ok(()),
                changed = status.changed() => if changed.is_err() { return Ok(()) },
            }
        }
    }
}
