use calcgraph_core::{
    MonotonicClock, NodeBody, NodeId, NodeKind, Provenance, ValueWithUnit, VerificationStatus,
    WorksheetNode,
};
use calcgraph_engine::Session;

use crate::stub::StubCompute;

/// A session plus a stub collaborator, with shortcuts for building the
/// worksheet shapes the integration suites keep needing.
pub struct TestBench {
    pub session: Session,
    pub compute: StubCompute,
    clock: MonotonicClock,
}

impl TestBench {
    pub fn new() -> Self {
        Self::with_compute(StubCompute::passing())
    }

    pub fn with_compute(compute: StubCompute) -> Self {
        Self {
            session: Session::new("Test worksheet"),
            compute,
            clock: MonotonicClock::new(),
        }
    }

    /// Create or update a given through the session.
    pub fn add_given(&mut self, symbol: &str, value: f64, unit: Option<&str>) -> NodeId {
        self.session
            .set_given(symbol, value, unit)
            .expect("set_given")
    }

    /// Add an equation node and rewrite its sides.
    pub fn add_equation(&mut self, lhs: &str, rhs: &str) -> NodeId {
        let id = self
            .session
            .add_node(NodeKind::Equation, None)
            .expect("add_node");
        self.session.update_node(id, |node| {
            if let NodeBody::Equation {
                latex,
                lhs: l,
                rhs: r,
                ..
            } = &mut node.body
            {
                *latex = format!("{lhs} = {rhs}");
                *l = lhs.to_string();
                *r = rhs.to_string();
            }
        });
        id
    }

    /// Insert a computed-provenance result node derived from
    /// `from_nodes`, with matching dependency edges so staleness
    /// propagation sees it.
    pub fn add_computed_result(
        &mut self,
        symbol: &str,
        value: f64,
        from_nodes: Vec<NodeId>,
    ) -> NodeId {
        let node = WorksheetNode {
            id: NodeId::new(),
            provenance: Provenance::computed(from_nodes.clone(), self.clock.tick()),
            verification: VerificationStatus::Unverified,
            dependencies: from_nodes,
            dependents: Vec::new(),
            assumptions: Vec::new(),
            position: None,
            is_stale: false,
            body: NodeBody::Result {
                symbol: symbol.to_string(),
                value: ValueWithUnit::bare(value),
                latex: None,
                symbolic_form: None,
                solve_goal_id: None,
                residual: None,
            },
        };
        let id = node.id;
        self.session.insert_node(node, None);
        id
    }

    /// Insert a raw given node, bypassing collision resolution — the
    /// import/merge path the duplicate-symbol lint exists for.
    pub fn insert_raw_given(&mut self, symbol: &str, value: f64) -> NodeId {
        let node = WorksheetNode {
            id: NodeId::new(),
            provenance: Provenance::user(self.clock.tick()),
            verification: VerificationStatus::Unverified,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            assumptions: Vec::new(),
            position: None,
            is_stale: false,
            body: NodeBody::Given {
                symbol: symbol.to_string(),
                value: ValueWithUnit::bare(value),
                latex: None,
                description: None,
                slider_range: None,
            },
        };
        let id = node.id;
        self.session.insert_node(node, None);
        id
    }

    /// The current symbol of a given node.
    pub fn symbol_of(&self, id: NodeId) -> String {
        self.session
            .document()
            .node(id)
            .and_then(|n| n.given_symbol())
            .expect("given symbol")
            .to_string()
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}
