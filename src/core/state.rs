use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Follower,
    Candidate,
    Leader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        }
    }
}

/// Best-effort view of who leads a cluster.
///
/// `holder_id == None` means the lease was last seen vacant after the holder
/// of `fencing_token` gave it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownLeader {
    pub holder_id: Option<String>,
    pub fencing_token: u64,
}

impl KnownLeader {
    /// Whether an observation carrying `(fencing_token, vacant)` supersedes
    /// this one. A vacancy of the same token supersedes its acquisition.
    pub fn superseded_by(
        &self,
        fencing_token: u64,
        vacant: bool,
    ) -> bool {
        fencing_token > self.fencing_token
            || (fencing_token == self.fencing_token && vacant && self.holder_id.is_some())
    }
}

/// Local state of one election agent.
///
/// Owned by the agent task; everybody else sees published snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub cluster_id: String,
    pub holder_id: String,
    pub role: Role,
    pub held_fencing_token: Option<u64>,
    /// Milliseconds since the Unix epoch of the last successful acquire or renew
    pub last_renewal_at: Option<u64>,
    pub known_leader: Option<KnownLeader>,
    /// Set once the store has been unreachable for several lease windows
    pub store_unavailable: bool,
}

impl NodeState {
    pub fn new(
        cluster_id: &str,
        holder_id: &str,
    ) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            holder_id: holder_id.to_string(),
            role: Role::Follower,
            held_fencing_token: None,
            last_renewal_at: None,
            known_leader: None,
            store_unavailable: false,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Records an observation unless a newer one is already known.
    pub(crate) fn observe_leader(
        &mut self,
        holder_id: Option<String>,
        fencing_token: u64,
    ) -> bool {
        let vacant = holder_id.is_none();
        let newer = match &self.known_leader {
            Some(known) => known.superseded_by(fencing_token, vacant),
            None => true,
        };
        if newer {
            self.known_leader = Some(KnownLeader {
                holder_id,
                fencing_token,
            });
        }
        newer
    }
}
