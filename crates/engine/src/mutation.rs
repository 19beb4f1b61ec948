use std::collections::{HashSet, VecDeque};

use tracing::debug;

use calcgraph_core::{
    Assumption, AssumptionId, NodeBody, NodeId, NodeKind, NodePosition, Provenance, UnitExpr,
    VerificationStatus, WorksheetNode,
};

use crate::factory::{self, resolve_symbol_collision};
use crate::Session;

/// Position delta applied to duplicated nodes.
const DUPLICATE_OFFSET: (f64, f64) = (40.0, 40.0);
/// Vertical spacing when appending without an explicit position.
const STACK_SPACING: f64 = 120.0;

/// Pure inspection of what deleting a node would do. The caller decides
/// whether to proceed and then calls `commit_deletion`.
#[derive(Debug, Clone)]
pub struct DeletionPlan {
    pub node_id: NodeId,
    pub display_name: String,
    /// Computed nodes that would be flagged stale by the removal.
    pub cascading_stale: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct DeletionOutcome {
    pub removed: NodeId,
    pub stale_marked: Vec<NodeId>,
}

impl Session {
    /// Build a default node of `kind`, resolve symbol collisions for
    /// givens, append it and select it. Returns `None` only if the undo
    /// snapshot could not be taken.
    pub fn add_node(&mut self, kind: NodeKind, position: Option<NodePosition>) -> Option<NodeId> {
        if !self.snapshot() {
            return None;
        }
        let mut node = factory::new_node(kind, &mut self.clock);
        node.position = Some(position.unwrap_or_else(|| self.next_position()));
        if let Some(symbol) = node.given_symbol().map(str::to_string) {
            let resolution = resolve_symbol_collision(&self.document, &symbol, Some(node.id));
            self.apply_renames(&resolution.renames);
            if let NodeBody::Given { symbol, .. } = &mut node.body {
                *symbol = resolution.resolved;
            }
        }
        let id = node.id;
        debug!(node = %id, kind = kind.as_str(), "added node");
        self.document.nodes.push(node);
        self.selected = Some(id);
        self.touch();
        Some(id)
    }

    /// Insert a fully formed node at `index` (or append). Symbol
    /// collisions are not re-checked on this path; the caller owns them.
    pub fn insert_node(&mut self, node: WorksheetNode, index: Option<usize>) {
        if !self.snapshot() {
            return;
        }
        let len = self.document.nodes.len();
        let index = index.unwrap_or(len).min(len);
        debug!(node = %node.id, index, "inserted node");
        self.document.nodes.insert(index, node);
        self.touch();
    }

    /// Edit a node in place. Absent id is a no-op returning `false`. If
    /// the edit changed a given's symbol, collision resolution runs in
    /// the same mutation (the edited node excluded from the scan).
    pub fn update_node(&mut self, id: NodeId, edit: impl FnOnce(&mut WorksheetNode)) -> bool {
        if !self.document.contains_node(id) {
            return false;
        }
        if !self.snapshot() {
            return false;
        }
        let Some(node) = self.document.node_mut(id) else {
            return false;
        };
        let old_symbol = node.given_symbol().map(str::to_string);
        edit(node);
        node.id = id; // identity is not editable
        let new_symbol = node.given_symbol().map(str::to_string);

        if let Some(symbol) = new_symbol
            && old_symbol.as_deref() != Some(symbol.as_str())
        {
            let resolution = resolve_symbol_collision(&self.document, &symbol, Some(id));
            self.apply_renames(&resolution.renames);
            if let Some(node) = self.document.node_mut(id)
                && let NodeBody::Given { symbol, .. } = &mut node.body
            {
                *symbol = resolution.resolved;
            }
        }
        self.touch();
        true
    }

    /// What deleting `id` would cascade to. Pure; mutates nothing.
    pub fn plan_deletion(&self, id: NodeId) -> Option<DeletionPlan> {
        let node = self.document.node(id)?;
        let cascading_stale = self
            .document
            .nodes
            .iter()
            .filter(|n| n.id != id && n.provenance.from_nodes().contains(&id))
            .map(|n| n.id)
            .collect();
        Some(DeletionPlan {
            node_id: id,
            display_name: node.display_name(),
            cascading_stale,
        })
    }

    /// Remove a node. Every computed node derived from it is flagged
    /// stale (not deleted) so the loss of an upstream input stays
    /// visible until re-verification. Assumption scopes are pruned.
    pub fn commit_deletion(&mut self, id: NodeId) -> Option<DeletionOutcome> {
        let index = self.document.node_index(id)?;
        if !self.snapshot() {
            return None;
        }
        self.document.nodes.remove(index);

        let mut stale_marked = Vec::new();
        for node in &mut self.document.nodes {
            if node.provenance.from_nodes().contains(&id) {
                node.is_stale = true;
                stale_marked.push(node.id);
            }
        }
        for assumption in &mut self.document.assumptions {
            assumption.scope.retain(|n| *n != id);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        debug!(node = %id, stale = stale_marked.len(), "deleted node");
        self.touch();
        Some(DeletionOutcome {
            removed: id,
            stale_marked,
        })
    }

    /// Deep-copy a node: fresh id, offset position, provenance reset to
    /// user-now, verification reset, symbol collisions resolved. The copy
    /// lands right after the original and is selected.
    pub fn duplicate_node(&mut self, id: NodeId) -> Option<NodeId> {
        let index = self.document.node_index(id)?;
        if !self.snapshot() {
            return None;
        }
        let mut copy = self.document.nodes[index].clone();
        copy.id = NodeId::new();
        copy.provenance = Provenance::user(self.clock.tick());
        copy.verification = VerificationStatus::Unverified;
        copy.position = copy
            .position
            .map(|p| p.offset(DUPLICATE_OFFSET.0, DUPLICATE_OFFSET.1));
        if let Some(symbol) = copy.given_symbol().map(str::to_string) {
            let resolution = resolve_symbol_collision(&self.document, &symbol, Some(copy.id));
            self.apply_renames(&resolution.renames);
            if let NodeBody::Given { symbol, .. } = &mut copy.body {
                *symbol = resolution.resolved;
            }
        }
        let new_id = copy.id;
        debug!(source = %id, copy = %new_id, "duplicated node");
        self.document.nodes.insert(index + 1, copy);
        self.selected = Some(new_id);
        self.touch();
        Some(new_id)
    }

    /// Select a node, or clear the selection. An id not present in the
    /// document clears the selection rather than erroring.
    pub fn select_node(&mut self, id: Option<NodeId>) {
        self.selected = id.filter(|id| self.document.contains_node(*id));
    }

    pub fn update_node_position(&mut self, id: NodeId, position: NodePosition) {
        if !self.document.contains_node(id) {
            return;
        }
        if !self.snapshot() {
            return;
        }
        if let Some(node) = self.document.node_mut(id) {
            node.position = Some(position);
        }
        self.touch();
    }

    /// Set an input's value by symbol, creating the given when missing.
    /// An existing given is reset to unverified and its transitive
    /// dependents are flagged stale.
    pub fn set_given(&mut self, symbol: &str, value: f64, unit: Option<&str>) -> Option<NodeId> {
        if let Some(existing) = self.document.find_given(symbol).map(|n| n.id) {
            if !self.snapshot() {
                return None;
            }
            if let Some(node) = self.document.node_mut(existing) {
                if let NodeBody::Given { value: v, .. } = &mut node.body {
                    v.value = value;
                    if let Some(unit) = unit {
                        v.unit = Some(UnitExpr::new(unit));
                    }
                }
                node.verification = VerificationStatus::Unverified;
            }
            self.mark_dependents_stale(existing);
            self.touch();
            return Some(existing);
        }

        if !self.snapshot() {
            return None;
        }
        let mut node = factory::new_node(NodeKind::Given, &mut self.clock);
        node.position = Some(self.next_position());
        if let NodeBody::Given { symbol: s, value: v, .. } = &mut node.body {
            *s = symbol.to_string();
            v.value = value;
            v.unit = unit.map(UnitExpr::new);
        }
        let resolution = resolve_symbol_collision(&self.document, symbol, Some(node.id));
        self.apply_renames(&resolution.renames);
        if let NodeBody::Given { symbol: s, .. } = &mut node.body {
            *s = resolution.resolved;
        }
        let id = node.id;
        debug!(node = %id, symbol, "created given");
        self.document.nodes.push(node);
        self.touch();
        Some(id)
    }

    /// Flag every transitive dependent of `id` stale, breadth-first over
    /// the recorded dependency edges. The starting node itself is not
    /// flagged.
    pub fn mark_dependents_stale(&mut self, id: NodeId) {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let mut found = Vec::new();
            for node in &mut self.document.nodes {
                if node.dependencies.contains(&current) {
                    node.is_stale = true;
                    found.push(node.id);
                }
            }
            queue.extend(found);
        }
    }

    // ------------------------------------------------------------------
    // Assumption ledger
    // ------------------------------------------------------------------

    /// Add an assumption scoped to `scope` (unknown node ids are
    /// dropped). Scope membership is mirrored into each node's
    /// `assumptions` list.
    pub fn add_assumption(
        &mut self,
        statement: &str,
        formal_expression: Option<&str>,
        scope: Vec<NodeId>,
    ) -> Option<AssumptionId> {
        if !self.snapshot() {
            return None;
        }
        let scope: Vec<NodeId> = scope
            .into_iter()
            .filter(|id| self.document.contains_node(*id))
            .collect();
        let assumption = Assumption {
            id: AssumptionId::new(),
            statement: statement.to_string(),
            formal_expression: formal_expression.map(str::to_string),
            latex: None,
            scope: scope.clone(),
            justification: None,
            provenance: Provenance::user(self.clock.tick()),
            active: true,
        };
        let id = assumption.id;
        for node_id in &scope {
            if let Some(node) = self.document.node_mut(*node_id)
                && !node.assumptions.contains(&id)
            {
                node.assumptions.push(id);
            }
        }
        self.document.assumptions.push(assumption);
        self.touch();
        Some(id)
    }

    /// Remove an assumption and strip it from every node's list.
    pub fn remove_assumption(&mut self, id: AssumptionId) -> bool {
        let Some(index) = self.document.assumptions.iter().position(|a| a.id == id) else {
            return false;
        };
        if !self.snapshot() {
            return false;
        }
        self.document.assumptions.remove(index);
        for node in &mut self.document.nodes {
            node.assumptions.retain(|a| *a != id);
        }
        self.touch();
        true
    }

    pub fn set_assumption_active(&mut self, id: AssumptionId, active: bool) -> bool {
        if self.document.assumption(id).is_none() {
            return false;
        }
        if !self.snapshot() {
            return false;
        }
        if let Some(assumption) = self.document.assumption_mut(id) {
            assumption.active = active;
        }
        self.touch();
        true
    }

    /// Scope an assumption onto a node, keeping both sides consistent.
    pub fn add_to_scope(&mut self, assumption_id: AssumptionId, node_id: NodeId) -> bool {
        if self.document.assumption(assumption_id).is_none()
            || !self.document.contains_node(node_id)
        {
            return false;
        }
        if !self.snapshot() {
            return false;
        }
        if let Some(assumption) = self.document.assumption_mut(assumption_id)
            && !assumption.scope.contains(&node_id)
        {
            assumption.scope.push(node_id);
        }
        if let Some(node) = self.document.node_mut(node_id)
            && !node.assumptions.contains(&assumption_id)
        {
            node.assumptions.push(assumption_id);
        }
        self.touch();
        true
    }

    /// Unscope an assumption from a node, keeping both sides consistent.
    pub fn remove_from_scope(&mut self, assumption_id: AssumptionId, node_id: NodeId) -> bool {
        if self.document.assumption(assumption_id).is_none() {
            return false;
        }
        if !self.snapshot() {
            return false;
        }
        if let Some(assumption) = self.document.assumption_mut(assumption_id) {
            assumption.scope.retain(|n| *n != node_id);
        }
        if let Some(node) = self.document.node_mut(node_id) {
            node.assumptions.retain(|a| *a != assumption_id);
        }
        self.touch();
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_position(&self) -> NodePosition {
        match self.document.nodes.last().and_then(|n| n.position) {
            Some(p) => NodePosition::at(p.x, p.y + STACK_SPACING),
            None => NodePosition::at(80.0, 80.0),
        }
    }

    fn apply_renames(&mut self, renames: &[(NodeId, String)]) {
        for (id, new_symbol) in renames {
            if let Some(node) = self.document.node_mut(*id)
                && let NodeBody::Given { symbol, .. } = &mut node.body
            {
                *symbol = new_symbol.clone();
            }
        }
    }
}
