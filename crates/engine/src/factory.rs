use std::collections::BTreeMap;

use calcgraph_core::{
    MonotonicClock, NodeBody, NodeId, NodeKind, PlotOptions, PlotRange, Provenance, SolveMethod,
    ValueWithUnit, VerificationStatus, WorksheetDocument, WorksheetNode,
};

/// Default symbol handed to a fresh given node; collisions with existing
/// inputs are resolved by the caller.
const DEFAULT_GIVEN_SYMBOL: &str = "x";

/// Variant-appropriate default content for a freshly added node.
pub fn default_body(kind: NodeKind) -> NodeBody {
    match kind {
        NodeKind::Text => NodeBody::Text {
            content: String::new(),
            format: Some("markdown".to_string()),
        },
        NodeKind::Given => NodeBody::Given {
            symbol: DEFAULT_GIVEN_SYMBOL.to_string(),
            value: ValueWithUnit::bare(0.0),
            latex: None,
            description: None,
            slider_range: None,
        },
        NodeKind::Equation => NodeBody::Equation {
            latex: "y = x".to_string(),
            lhs: "y".to_string(),
            rhs: "x".to_string(),
            symbolic: None,
            is_definition: None,
        },
        NodeKind::Constraint => NodeBody::Constraint {
            latex: "x > 0".to_string(),
            expression: "x > 0".to_string(),
            description: None,
            applies_to: Vec::new(),
        },
        NodeKind::SolveGoal => NodeBody::SolveGoal {
            target_symbol: "y".to_string(),
            method: SolveMethod::Auto,
            initial_guess: None,
        },
        NodeKind::Result => NodeBody::Result {
            symbol: "y".to_string(),
            value: ValueWithUnit::bare(0.0),
            latex: None,
            symbolic_form: None,
            solve_goal_id: None,
            residual: None,
        },
        NodeKind::Plot => NodeBody::Plot {
            expressions: Vec::new(),
            x_range: PlotRange {
                min: -10.0,
                max: 10.0,
                variable: "x".to_string(),
            },
            options: PlotOptions::default(),
        },
        NodeKind::Annotation => NodeBody::Annotation {
            content: String::new(),
            title: None,
            collapsed: None,
        },
    }
}

/// Build a fresh node of `kind`: new identity, user provenance stamped
/// now, unverified, no edges. Construction never fails.
pub fn new_node(kind: NodeKind, clock: &mut MonotonicClock) -> WorksheetNode {
    WorksheetNode {
        id: NodeId::new(),
        provenance: Provenance::user(clock.tick()),
        verification: VerificationStatus::Unverified,
        dependencies: Vec::new(),
        dependents: Vec::new(),
        assumptions: Vec::new(),
        position: None,
        is_stale: false,
        body: default_body(kind),
    }
}

/// What has to change for `incoming` to land without violating symbol
/// uniqueness: the resolved symbol for the incoming node, plus renames of
/// other nodes the caller must apply in the same mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResolution {
    pub resolved: String,
    pub renames: Vec<(NodeId, String)>,
}

/// Split a symbol into its base and trailing `_<integer>` suffix.
fn split_suffix(symbol: &str) -> (&str, Option<u32>) {
    if let Some((base, suffix)) = symbol.rsplit_once('_')
        && !base.is_empty()
        && let Ok(n) = suffix.parse::<u32>()
    {
        return (base, Some(n));
    }
    (symbol, None)
}

/// Resolve a symbol collision among given nodes.
///
/// Nodes whose base matches the incoming symbol's base are scanned
/// (skipping `exclude`, the node being edited). A holder of the bare base
/// is demoted to `<base>_1` so the bare form stays unambiguous; the
/// incoming symbol becomes `<base>_<max existing suffix + 1>`, starting
/// at 2 when only the bare form existed. No matches leaves the incoming
/// symbol unchanged.
pub fn resolve_symbol_collision(
    document: &WorksheetDocument,
    incoming: &str,
    exclude: Option<NodeId>,
) -> SymbolResolution {
    let (base, _) = split_suffix(incoming);

    let mut max_suffix = 0u32;
    let mut renames = Vec::new();
    let mut matched = false;
    for node in document.givens() {
        if Some(node.id) == exclude {
            continue;
        }
        let Some(symbol) = node.given_symbol() else {
            continue;
        };
        let (node_base, suffix) = split_suffix(symbol);
        if node_base != base {
            continue;
        }
        matched = true;
        match suffix {
            None => {
                renames.push((node.id, format!("{base}_1")));
                max_suffix = max_suffix.max(1);
            }
            Some(n) => max_suffix = max_suffix.max(n),
        }
    }

    if !matched {
        return SymbolResolution {
            resolved: incoming.to_string(),
            renames,
        };
    }

    SymbolResolution {
        resolved: format!("{base}_{}", max_suffix.max(1) + 1),
        renames,
    }
}

/// Symbols currently shared by two or more given nodes. A lint for
/// invariant violations introduced through raw insertion (import/merge),
/// not an enforcement pass.
pub fn find_duplicate_symbols(document: &WorksheetDocument) -> Vec<(String, Vec<NodeId>)> {
    let mut by_symbol: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
    for node in document.givens() {
        if let Some(symbol) = node.given_symbol() {
            by_symbol
                .entry(symbol.to_string())
                .or_default()
                .push(node.id);
        }
    }
    by_symbol.into_iter().filter(|(_, ids)| ids.len() > 1).collect()
}
