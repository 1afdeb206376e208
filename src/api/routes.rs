use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::LeaderQuery;
use crate::metrics::gather_metrics;
use crate::AgentHandle;
use crate::HeartbeatStore;
use crate::Member;
use crate::NodeState;
use crate::Result;
use crate::SystemError;

/// Shared state behind the HTTP routes.
pub struct ApiContext {
    query: LeaderQuery,
    agents: Vec<AgentHandle>,
    heartbeats: Option<Arc<dyn HeartbeatStore>>,
    prometheus_enabled: bool,
}

impl ApiContext {
    pub fn new(
        query: LeaderQuery,
        agents: Vec<AgentHandle>,
    ) -> Self {
        Self {
            query,
            agents,
            heartbeats: None,
            prometheus_enabled: true,
        }
    }

    pub fn with_heartbeats(
        mut self,
        heartbeats: Arc<dyn HeartbeatStore>,
    ) -> Self {
        self.heartbeats = Some(heartbeats);
        self
    }

    pub fn with_prometheus(
        mut self,
        enabled: bool,
    ) -> Self {
        self.prometheus_enabled = enabled;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthView {
    pub status: String,
    pub agents: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersView {
    pub cluster_id: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepDownView {
    pub cluster_id: String,
    /// Local holders that were leading and were asked to step down
    pub stepped_down: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorView {
    pub error: String,
}

fn with_ctx(ctx: Arc<ApiContext>) -> impl Filter<Extract = (Arc<ApiContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn error_reply(
    status: StatusCode,
    message: String,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorView { error: message }), status)
}

/// `GET /health`, `GET /metrics`, `GET /status`,
/// `GET /clusters/{id}/leader`, `GET /clusters/{id}/members`,
/// `POST /clusters/{id}/step-down`
pub fn routes(ctx: Arc<ApiContext>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(health_handler);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(metrics_handler);

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(status_handler);

    let leader = warp::path!("clusters" / String / "leader")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(leader_handler);

    let members = warp::path!("clusters" / String / "members")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(members_handler);

    let step_down = warp::path!("clusters" / String / "step-down")
        .and(warp::post())
        .and(with_ctx(ctx))
        .and_then(step_down_handler);

    health.or(metrics).or(status).or(leader).or(members).or(step_down)
}

/// Serves [`routes`] until `shutdown_signal` fires.
pub async fn start_server(
    port: u16,
    ctx: Arc<ApiContext>,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let (bound, server) = warp::serve(routes(ctx))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown_signal.changed().await;
        })
        .map_err(|e| SystemError::NodeStartFailed(format!("api server on {addr}: {e}")))?;

    info!("api server listening on {}", bound);
    server.await;
    info!("api server stopped");
    Ok(())
}

async fn health_handler(ctx: Arc<ApiContext>) -> std::result::Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&HealthView {
        status: "ok".to_string(),
        agents: ctx.agents.len(),
    }))
}

async fn metrics_handler(ctx: Arc<ApiContext>) -> std::result::Result<impl Reply, Rejection> {
    let (body, status) = if ctx.prometheus_enabled {
        (gather_metrics(), StatusCode::OK)
    } else {
        (String::new(), StatusCode::NOT_FOUND)
    };
    Ok(warp::reply::with_status(
        warp::reply::with_header(body, "Content-Type", "text/plain; charset=utf-8"),
        status,
    ))
}

async fn status_handler(ctx: Arc<ApiContext>) -> std::result::Result<impl Reply, Rejection> {
    let states: Vec<NodeState> = ctx.agents.iter().map(|a| a.state()).collect();
    Ok(warp::reply::json(&states))
}

async fn leader_handler(
    cluster_id: String,
    ctx: Arc<ApiContext>,
) -> std::result::Result<impl Reply, Rejection> {
    match ctx.query.current_leader(&cluster_id).await {
        Ok(view) => Ok(warp::reply::with_status(warp::reply::json(&view), StatusCode::OK)),
        Err(e) => Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

async fn members_handler(
    cluster_id: String,
    ctx: Arc<ApiContext>,
) -> std::result::Result<impl Reply, Rejection> {
    let heartbeats = match &ctx.heartbeats {
        Some(h) => h,
        None => {
            return Ok(error_reply(
                StatusCode::NOT_FOUND,
                "heartbeats are not tracked by this node".to_string(),
            ))
        }
    };
    match heartbeats.live_members(&cluster_id).await {
        Ok(members) => Ok(warp::reply::with_status(
            warp::reply::json(&MembersView { cluster_id, members }),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

async fn step_down_handler(
    cluster_id: String,
    ctx: Arc<ApiContext>,
) -> std::result::Result<impl Reply, Rejection> {
    let local: Vec<&AgentHandle> = ctx.agents.iter().filter(|a| a.cluster_id() == cluster_id).collect();
    if local.is_empty() {
        return Ok(error_reply(
            StatusCode::NOT_FOUND,
            format!("no local agent runs for cluster {cluster_id}"),
        ));
    }

    let mut stepped_down = Vec::new();
    for agent in local.into_iter().filter(|a| a.is_leader()) {
        if let Err(e) = agent.step_down().await {
            warn!("step down of {} failed: {:?}", agent.holder_id(), e);
            return Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()));
        }
        stepped_down.push(agent.holder_id().to_string());
    }
    info!("step down requested for {}: {:?}", cluster_id, stepped_down);

    Ok(warp::reply::with_status(
        warp::reply::json(&StepDownView {
            cluster_id,
            stepped_down,
        }),
        StatusCode::ACCEPTED,
    ))
}
