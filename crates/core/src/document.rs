use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::clock::{MonotonicClock, Timestamp};
use crate::ids::{AssumptionId, DocumentId, NodeId};
use crate::node::{NodeBody, WorksheetNode};
use crate::Provenance;

pub const DOCUMENT_VERSION: &str = "1.0.0";

/// An entry of the assumption ledger. Scope membership is mirrored into
/// the referenced nodes' `assumptions` lists by the mutation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub id: AssumptionId,
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
    #[serde(default)]
    pub scope: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub provenance: Provenance,
    pub active: bool,
}

/// Historical marker retained for document-format compatibility. The
/// in-memory undo strategy snapshots whole documents and does not read
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMarker {
    pub id: String,
    pub timestamp: Timestamp,
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Document-level metadata. Known keys are typed; anything else a
/// producer wrote rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_domain: Option<String>,
    #[serde(
        default,
        alias = "fromTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub from_template: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The aggregate root: an ordered node collection plus the assumption
/// ledger, compatibility history markers, the append-only audit trail,
/// and metadata. Node order is display order, not dependency order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetDocument {
    pub id: DocumentId,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub nodes: Vec<WorksheetNode>,
    #[serde(default)]
    pub assumptions: Vec<Assumption>,
    #[serde(default)]
    pub history: Vec<HistoryMarker>,
    #[serde(default)]
    pub current_history_id: String,
    #[serde(default)]
    pub audit_trail: Vec<AuditEntry>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl WorksheetDocument {
    /// A fresh empty document with a creation marker.
    pub fn new(name: &str, clock: &mut MonotonicClock) -> Self {
        let now = clock.tick();
        let marker = HistoryMarker {
            id: Uuid::now_v7().to_string(),
            timestamp: now,
            description: "Document created".to_string(),
            source: "user".to_string(),
            parent_id: None,
        };
        let current_history_id = marker.id.clone();
        Self {
            id: DocumentId::new(),
            name: name.to_string(),
            version: default_version(),
            created_at: now,
            updated_at: now,
            nodes: Vec::new(),
            assumptions: Vec::new(),
            history: vec![marker],
            current_history_id,
            audit_trail: Vec::new(),
            metadata: DocumentMetadata::default(),
        }
    }

    // ------------------------------------------------------------------
    // Node access
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&WorksheetNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut WorksheetNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// All given nodes in document order.
    pub fn givens(&self) -> impl Iterator<Item = &WorksheetNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.body, NodeBody::Given { .. }))
    }

    /// The given node holding `symbol`, if any.
    pub fn find_given(&self, symbol: &str) -> Option<&WorksheetNode> {
        self.nodes.iter().find(|n| n.given_symbol() == Some(symbol))
    }

    /// The most recent result node for `symbol`.
    pub fn latest_result(&self, symbol: &str) -> Option<&WorksheetNode> {
        self.nodes
            .iter()
            .rev()
            .find(|n| matches!(&n.body, NodeBody::Result { symbol: s, .. } if s == symbol))
    }

    /// Ids of all nodes currently flagged stale, in document order.
    pub fn stale_node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_stale)
            .map(|n| n.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Assumptions
    // ------------------------------------------------------------------

    pub fn assumption(&self, id: AssumptionId) -> Option<&Assumption> {
        self.assumptions.iter().find(|a| a.id == id)
    }

    pub fn assumption_mut(&mut self, id: AssumptionId) -> Option<&mut Assumption> {
        self.assumptions.iter_mut().find(|a| a.id == id)
    }

    /// Active assumption ids scoped to `node`, in ledger order.
    pub fn active_assumptions_for(&self, node: &WorksheetNode) -> Vec<AssumptionId> {
        self.assumptions
            .iter()
            .filter(|a| a.active && node.assumptions.contains(&a.id))
            .map(|a| a.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    /// Append an entry to the audit trail. The trail is a log: entries
    /// are never edited or removed through any document API.
    pub fn append_audit(&mut self, entry: AuditEntry) {
        self.audit_trail.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, VerificationStatus};
    use crate::value::ValueWithUnit;

    fn doc_with_given(symbol: &str) -> (WorksheetDocument, NodeId) {
        let mut clock = MonotonicClock::new();
        let mut doc = WorksheetDocument::new("test", &mut clock);
        let node = WorksheetNode {
            id: NodeId::new(),
            provenance: Provenance::user(clock.tick()),
            verification: VerificationStatus::Unverified,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            assumptions: Vec::new(),
            position: None,
            is_stale: false,
            body: NodeBody::Given {
                symbol: symbol.to_string(),
                value: ValueWithUnit::bare(1.0),
                latex: None,
                description: None,
                slider_range: None,
            },
        };
        let id = node.id;
        doc.nodes.push(node);
        (doc, id)
    }

    #[test]
    fn new_document_has_creation_marker() {
        let mut clock = MonotonicClock::new();
        let doc = WorksheetDocument::new("beam check", &mut clock);
        assert_eq!(doc.name, "beam check");
        assert_eq!(doc.history.len(), 1);
        assert_eq!(doc.current_history_id, doc.history[0].id);
        assert!(doc.nodes.is_empty());
        assert!(doc.audit_trail.is_empty());
    }

    #[test]
    fn find_given_by_symbol() {
        let (doc, id) = doc_with_given("F");
        assert_eq!(doc.find_given("F").map(|n| n.id), Some(id));
        assert!(doc.find_given("m").is_none());
    }

    #[test]
    fn node_lookup_by_id() {
        let (doc, id) = doc_with_given("F");
        assert!(doc.node(id).is_some());
        assert!(doc.node(NodeId::new()).is_none());
        assert_eq!(doc.node_index(id), Some(0));
    }

    #[test]
    fn kind_of_given() {
        let (doc, id) = doc_with_given("F");
        assert_eq!(doc.node(id).unwrap().kind(), NodeKind::Given);
    }
}
