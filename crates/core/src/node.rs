use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::ids::{AssumptionId, NodeId};
use crate::value::{
    NodePosition, PlotExpression, PlotOptions, PlotRange, SliderRange, SolveMethod, UnitExpr,
    ValueWithUnit,
};

/// Where a node's content came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Provenance {
    /// Authored by a human.
    User { timestamp: Timestamp },
    /// Derived by the compute collaborator from `from_nodes`.
    Computed {
        from_nodes: Vec<NodeId>,
        timestamp: Timestamp,
    },
    /// Instantiated from a reusable definition (library entry or template).
    Library { source: String, timestamp: Timestamp },
}

impl Provenance {
    pub fn user(timestamp: Timestamp) -> Self {
        Self::User { timestamp }
    }

    pub fn computed(from_nodes: Vec<NodeId>, timestamp: Timestamp) -> Self {
        Self::Computed {
            from_nodes,
            timestamp,
        }
    }

    pub fn library(source: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::Library {
            source: source.into(),
            timestamp,
        }
    }

    /// Source ids for computed provenance, empty otherwise.
    pub fn from_nodes(&self) -> &[NodeId] {
        match self {
            Self::Computed { from_nodes, .. } => from_nodes,
            Self::User { .. } | Self::Library { .. } => &[],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Computed { .. } => "computed",
            Self::Library { .. } => "library",
        }
    }
}

/// Outcome of the most recent verification pass over a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationStatus {
    Unverified,
    Verified {
        timestamp: Timestamp,
        engine_version: String,
    },
    Failed {
        reason: String,
        timestamp: Timestamp,
    },
}

impl VerificationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn is_unverified(&self) -> bool {
        matches!(self, Self::Unverified)
    }
}

/// Closed set of node variant tags. Every variant a document can hold is
/// named here, so "unknown node type" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Text,
    Given,
    Equation,
    Constraint,
    SolveGoal,
    Result,
    Plot,
    Annotation,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Text,
        NodeKind::Given,
        NodeKind::Equation,
        NodeKind::Constraint,
        NodeKind::SolveGoal,
        NodeKind::Result,
        NodeKind::Plot,
        NodeKind::Annotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Given => "given",
            Self::Equation => "equation",
            Self::Constraint => "constraint",
            Self::SolveGoal => "solve_goal",
            Self::Result => "result",
            Self::Plot => "plot",
            Self::Annotation => "annotation",
        }
    }
}

/// Variant payload of a worksheet node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeBody {
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Given {
        symbol: String,
        value: ValueWithUnit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latex: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(
            default,
            alias = "sliderRange",
            skip_serializing_if = "Option::is_none"
        )]
        slider_range: Option<SliderRange>,
    },
    Equation {
        latex: String,
        lhs: String,
        rhs: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbolic: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_definition: Option<bool>,
    },
    Constraint {
        latex: String,
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        applies_to: Vec<NodeId>,
    },
    SolveGoal {
        target_symbol: String,
        method: SolveMethod,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_guess: Option<f64>,
    },
    Result {
        symbol: String,
        value: ValueWithUnit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latex: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbolic_form: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        solve_goal_id: Option<NodeId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        residual: Option<f64>,
    },
    Plot {
        expressions: Vec<PlotExpression>,
        x_range: PlotRange,
        #[serde(default)]
        options: PlotOptions,
    },
    Annotation {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collapsed: Option<bool>,
    },
}

impl NodeBody {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Text { .. } => NodeKind::Text,
            Self::Given { .. } => NodeKind::Given,
            Self::Equation { .. } => NodeKind::Equation,
            Self::Constraint { .. } => NodeKind::Constraint,
            Self::SolveGoal { .. } => NodeKind::SolveGoal,
            Self::Result { .. } => NodeKind::Result,
            Self::Plot { .. } => NodeKind::Plot,
            Self::Annotation { .. } => NodeKind::Annotation,
        }
    }
}

/// One entry of a worksheet document.
///
/// The envelope fields are shared by all variants; the payload lives in
/// `body`. Serialized flat, with the variant tag inlined as `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetNode {
    pub id: NodeId,
    pub provenance: Provenance,
    pub verification: VerificationStatus,
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    #[serde(default)]
    pub dependents: Vec<NodeId>,
    #[serde(default)]
    pub assumptions: Vec<AssumptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
    #[serde(default, alias = "isStale")]
    pub is_stale: bool,
    #[serde(flatten)]
    pub body: NodeBody,
}

impl WorksheetNode {
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// The input symbol, for given nodes only.
    pub fn given_symbol(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Given { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// The value carried by given and result nodes.
    pub fn value(&self) -> Option<&ValueWithUnit> {
        match &self.body {
            NodeBody::Given { value, .. } | NodeBody::Result { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Short human-readable label used in logs and deletion plans.
    pub fn display_name(&self) -> String {
        match &self.body {
            NodeBody::Text { content, .. } => {
                let line = content.lines().next().unwrap_or("");
                if line.is_empty() {
                    "text".to_string()
                } else {
                    line.chars().take(40).collect()
                }
            }
            NodeBody::Given { symbol, .. } => format!("given {symbol}"),
            NodeBody::Equation { lhs, rhs, .. } => format!("{lhs} = {rhs}"),
            NodeBody::Constraint { expression, .. } => expression.clone(),
            NodeBody::SolveGoal { target_symbol, .. } => format!("solve for {target_symbol}"),
            NodeBody::Result { symbol, .. } => format!("result {symbol}"),
            NodeBody::Plot { expressions, .. } => match expressions.first() {
                Some(e) => format!("plot {}", e.expr),
                None => "plot".to_string(),
            },
            NodeBody::Annotation { title, .. } => match title {
                Some(t) => t.clone(),
                None => "annotation".to_string(),
            },
        }
    }

    /// Build a unit-check expression for this node, if it carries one.
    /// Equations check `lhs - rhs`; givens with a unit check `value * unit`.
    pub fn unit_check_expression(&self) -> Option<String> {
        match &self.body {
            NodeBody::Equation { lhs, rhs, .. } => Some(format!("({lhs}) - ({rhs})")),
            NodeBody::Given { value, .. } => value
                .unit
                .as_ref()
                .map(|UnitExpr { expression, .. }| format!("{} * {}", value.value, expression)),
            _ => None,
        }
    }
}
