use serde::{Deserialize, Serialize};
use warden_common::Timestamp;
use warden_envelope::Identity;

/// The per-identity membership record.
///
/// A node records where the identity sits in the hierarchy (its admitting
/// parent and the identities it has admitted, in admission order) and
/// whether it is currently trusted. Nodes are never deleted: a revoked
/// node stays in the graph, untrusted, together with whatever evidence
/// prompted the revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustNode {
    /// Identities admitted by this node, in insertion order
    pub children: Vec<Identity>,

    /// The identity that admitted this node, or `None` for the root
    pub parent: Option<Identity>,

    /// Whether this node may currently exercise its membership
    pub trusted: bool,

    /// When this node was admitted
    pub added_at: Timestamp,

    /// Evidence recorded at revocation time, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_proof: Option<String>,
}

impl TrustNode {
    /// The root record, created out-of-band by an operator.
    pub fn root(added_at: Timestamp) -> Self {
        Self {
            children: Vec::new(),
            parent: None,
            trusted: true,
            added_at,
            ban_proof: None,
        }
    }

    /// A freshly admitted member record.
    pub fn admitted_under(parent: Identity, added_at: Timestamp) -> Self {
        Self {
            children: Vec::new(),
            parent: Some(parent),
            trusted: true,
            added_at,
            ban_proof: None,
        }
    }
}
