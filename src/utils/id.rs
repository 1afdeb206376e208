use std::env;

/// Builds an opaque, process-unique holder id.
///
/// The host name keeps ids readable in dashboards; the random suffix keeps two
/// processes on one host (or two agents in one process) from sharing an id.
pub fn generate_holder_id(prefix: Option<&str>) -> String {
    let host = prefix
        .map(str::to_string)
        .or_else(|| env::var("HOSTNAME").ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "node".to_string());
    format!("{}-{}", host, nanoid::nanoid!(8))
}
