use serde::{Deserialize, Serialize};

use calcgraph_core::{
    MonotonicClock, NodeBody, NodeId, NodePosition, Provenance, TemplateId, VerificationStatus,
    WorksheetDocument, WorksheetNode,
};

/// Provenance source recorded on every hydrated node.
pub const TEMPLATE_SOURCE: &str = "template";

/// Partial node descriptor inside a template: the variant payload and an
/// optional canvas position. Identity, provenance, verification and edge
/// lists are assigned at hydration, so a template cannot carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateNode {
    #[serde(flatten)]
    pub body: NodeBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<TemplateNode>,
}

/// Expand a template into a fresh document.
///
/// Nodes are hydrated in the template's declared order so position-based
/// layout carries over: fresh id, library provenance stamped now,
/// unverified, no edges or assumptions.
pub fn hydrate(template: &Template, clock: &mut MonotonicClock) -> WorksheetDocument {
    let mut document = WorksheetDocument::new(&template.name, clock);
    document.metadata.from_template = Some(template.name.clone());
    for partial in &template.nodes {
        document.nodes.push(WorksheetNode {
            id: NodeId::new(),
            provenance: Provenance::library(TEMPLATE_SOURCE, clock.tick()),
            verification: VerificationStatus::Unverified,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            assumptions: Vec::new(),
            position: partial.position,
            is_stale: false,
            body: partial.body.clone(),
        });
    }
    document
}
