// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space traversal that flattens a node graph into tag definitions.
//!
//! Starting from each configured root, the browser reads a fixed attribute
//! set per node, emits every Variable it meets and descends through forward
//! references in a fixed order:
//!
//! ```text
//! root (level 0)
//!  ├── HasComponent  ──▶ child (level 1) ──▶ ...
//!  ├── Organizes     ──▶ child (level 1) ──▶ ...
//!  └── HasProperty   ──▶ child (level 1) ──▶ ...
//! ```
//!
//! The walk stops at [`MAX_BROWSE_DEPTH`]. Reference cycles are otherwise
//! followed unless [`BrowseOptions::dedupe_visited`] is set.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tagpoll_opcua::browse::NodeTreeBrowser;
//!
//! let browser = NodeTreeBrowser::default();
//! let tags = browser.browse(session.as_ref(), &config.root_node_ids, &cancel).await?;
//! for tag in &tags {
//!     println!("{} -> {}", tag.path, tag.data_type);
//! }
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::transport::{cancellable, DataValue, OpcUaValue, ReadValueId, UaSession};
use crate::error::{BrowseError, OpcUaError, OpcUaResult};
use crate::status;
use crate::types::{AttributeId, NodeClass, NodeId, ACCESS_LEVEL_CURRENT_WRITE};

/// Deepest level visited below a root. The root itself is level 0.
pub const MAX_BROWSE_DEPTH: usize = 10;

/// Attributes read per node, in response order.
const NODE_ATTRIBUTES: [AttributeId; 5] = [
    AttributeId::NodeClass,
    AttributeId::BrowseName,
    AttributeId::Description,
    AttributeId::AccessLevel,
    AttributeId::DataType,
];

/// Forward reference types followed to find children, in visiting order.
const CHILD_REFERENCES: [(NodeId, &str); 3] = [
    (NodeId::HAS_COMPONENT, "HasComponent"),
    (NodeId::ORGANIZES, "Organizes"),
    (NodeId::HAS_PROPERTY, "HasProperty"),
];

// =============================================================================
// TagDefinition
// =============================================================================

/// A readable data point discovered by browsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDefinition {
    /// Node to read.
    pub node_id: NodeId,

    /// Node class, always [`NodeClass::Variable`] for emitted tags.
    pub node_class: NodeClass,

    /// Local browse name.
    pub browse_name: String,

    /// Dot-joined browse names below the configured root.
    pub path: String,

    /// Semantic data type, see [`data_type_name`].
    pub data_type: String,

    /// Whether the CurrentWrite access bit is set.
    pub writable: bool,

    /// Description text, empty when the server has none.
    #[serde(default)]
    pub description: String,

    /// Engineering unit.
    #[serde(default)]
    pub unit: String,

    /// Scale factor.
    #[serde(default)]
    pub scale: String,

    /// Lower range bound.
    #[serde(default)]
    pub min: String,

    /// Upper range bound.
    #[serde(default)]
    pub max: String,
}

impl TagDefinition {
    /// Column names matching [`records`](Self::records).
    pub const RECORD_HEADER: [&'static str; 9] = [
        "BrowseName",
        "DataType",
        "NodeID",
        "Unit",
        "Scale",
        "Min",
        "Max",
        "Writable",
        "Description",
    ];

    /// Returns the tag as a flat record row.
    pub fn records(&self) -> [String; 9] {
        [
            self.browse_name.clone(),
            self.data_type.clone(),
            self.node_id.to_string(),
            self.unit.clone(),
            self.scale.clone(),
            self.min.clone(),
            self.max.clone(),
            self.writable.to_string(),
            self.description.clone(),
        ]
    }
}

/// Maps a DataType node id to its semantic type name.
///
/// Unknown identifiers fall back to the node id text.
pub fn data_type_name(data_type: &NodeId) -> String {
    let name = match data_type.standard_numeric() {
        Some(13 | 294) => "time.Time",
        Some(1) => "bool",
        Some(2) => "int8",
        Some(3) => "byte",
        Some(4) => "int16",
        Some(5) => "uint16",
        Some(6) => "int32",
        Some(7) => "uint32",
        Some(8) => "int64",
        Some(9) => "uint64",
        Some(10) => "float32",
        Some(11) => "float64",
        Some(12) => "string",
        _ => return data_type.to_string(),
    };
    name.to_string()
}

/// Joins a parent path and a browse name.
fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

// =============================================================================
// BrowseOptions
// =============================================================================

/// Browser behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseOptions {
    /// Skip nodes already visited during the same call.
    ///
    /// Off by default, so nodes reachable through several references are
    /// emitted once per route.
    #[serde(default)]
    pub dedupe_visited: bool,
}

impl BrowseOptions {
    /// Enables or disables visited-node deduplication.
    pub fn with_dedupe_visited(mut self, enabled: bool) -> Self {
        self.dedupe_visited = enabled;
        self
    }
}

// =============================================================================
// NodeTreeBrowser
// =============================================================================

/// Depth-first browser over a live session.
#[derive(Debug, Clone, Default)]
pub struct NodeTreeBrowser {
    options: BrowseOptions,
}

/// Per-node attribute snapshot.
#[derive(Debug)]
struct NodeAttributes {
    node_class: NodeClass,
    browse_name: String,
    description: Option<String>,
    access_level: Option<u8>,
    data_type: Option<NodeId>,
}

/// Mutable state of one browse call.
struct Walk<'s> {
    session: &'s dyn UaSession,
    cancel: &'s CancellationToken,
    dedupe: bool,
    visited: HashSet<NodeId>,
    tags: Vec<TagDefinition>,
    nodes_visited: usize,
}

type VisitFuture<'w> = Pin<Box<dyn Future<Output = OpcUaResult<()>> + Send + 'w>>;

impl NodeTreeBrowser {
    /// Creates a browser with the given options.
    pub fn new(options: BrowseOptions) -> Self {
        Self { options }
    }

    /// Returns the browser options.
    pub fn options(&self) -> BrowseOptions {
        self.options
    }

    /// Browses every root and returns the concatenated tag list.
    ///
    /// Roots are walked in order. Any node-level failure fails the whole
    /// call and no partial list is returned.
    pub async fn browse(
        &self,
        session: &dyn UaSession,
        roots: &[NodeId],
        cancel: &CancellationToken,
    ) -> OpcUaResult<Vec<TagDefinition>> {
        let mut walk = Walk {
            session,
            cancel,
            dedupe: self.options.dedupe_visited,
            visited: HashSet::new(),
            tags: Vec::new(),
            nodes_visited: 0,
        };

        for root in roots {
            tracing::debug!(node_id = %root, "Browsing root");
            visit(&mut walk, root.clone(), String::new(), 0).await?;
        }

        tracing::info!(
            roots = roots.len(),
            nodes = walk.nodes_visited,
            tags = walk.tags.len(),
            "Browse complete"
        );

        Ok(walk.tags)
    }
}

fn visit<'w>(
    walk: &'w mut Walk<'_>,
    node_id: NodeId,
    parent_path: String,
    level: usize,
) -> VisitFuture<'w> {
    Box::pin(async move {
        tracing::debug!(node_id = %node_id, path = %parent_path, level, "Visiting node");

        if level > MAX_BROWSE_DEPTH {
            return Ok(());
        }
        if walk.dedupe && !walk.visited.insert(node_id.clone()) {
            tracing::trace!(node_id = %node_id, "Already visited");
            return Ok(());
        }
        walk.nodes_visited += 1;

        let attributes = read_attributes(walk.session, &node_id, walk.cancel).await?;
        let path = join_path(&parent_path, &attributes.browse_name);

        if attributes.node_class == NodeClass::Variable {
            walk.tags.push(TagDefinition {
                node_id: node_id.clone(),
                node_class: attributes.node_class,
                browse_name: attributes.browse_name.clone(),
                path: path.clone(),
                data_type: attributes
                    .data_type
                    .as_ref()
                    .map(data_type_name)
                    .unwrap_or_default(),
                writable: attributes
                    .access_level
                    .is_some_and(|bits| bits & ACCESS_LEVEL_CURRENT_WRITE != 0),
                description: attributes.description.unwrap_or_default(),
                unit: String::new(),
                scale: String::new(),
                min: String::new(),
                max: String::new(),
            });
        }

        // Descendant paths start below the configured root.
        let child_parent = if level == 0 { String::new() } else { path };

        for (reference_type, reference_name) in CHILD_REFERENCES {
            let children = cancellable(
                walk.cancel,
                "browse",
                walk.session.browse(&node_id, &reference_type),
            )
            .await
            .map_err(|e| references_error(&node_id, reference_name, e))?;

            tracing::trace!(
                node_id = %node_id,
                reference = reference_name,
                count = children.len(),
                "References"
            );

            for child in children {
                visit(walk, child.node_id, child_parent.clone(), level + 1).await?;
            }
        }

        Ok(())
    })
}

fn references_error(node_id: &NodeId, reference_name: &str, error: OpcUaError) -> OpcUaError {
    if error.is_cancelled() {
        return error;
    }
    let status_code = error.status_code();
    OpcUaError::browse(BrowseError::references_failed(
        node_id.to_string(),
        reference_name,
        error.to_string(),
        status_code,
    ))
}

async fn read_attributes(
    session: &dyn UaSession,
    node_id: &NodeId,
    cancel: &CancellationToken,
) -> OpcUaResult<NodeAttributes> {
    let items: Vec<ReadValueId> = NODE_ATTRIBUTES
        .iter()
        .map(|attribute| ReadValueId::new(node_id.clone(), *attribute))
        .collect();

    let values = cancellable(cancel, "browse", session.read(&items, Duration::ZERO)).await?;
    let [node_class, browse_name, description, access_level, data_type]: [DataValue; 5] =
        values.try_into().map_err(|values: Vec<DataValue>| {
            OpcUaError::browse(BrowseError::UnexpectedResultCount {
                node_id: node_id.to_string(),
                expected: NODE_ATTRIBUTES.len(),
                actual: values.len(),
            })
        })?;

    let node_class = required(node_id, AttributeId::NodeClass, node_class)?
        .as_u32()
        .and_then(NodeClass::from_value)
        .ok_or_else(|| missing(node_id, AttributeId::NodeClass))?;

    let browse_name = required(node_id, AttributeId::BrowseName, browse_name)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| missing(node_id, AttributeId::BrowseName))?;

    let description = optional(node_id, AttributeId::Description, description)?
        .map(|value| value.as_text().unwrap_or_default().to_string());

    let access_level = optional(node_id, AttributeId::AccessLevel, access_level)?
        .and_then(|value| value.as_u32())
        .and_then(|bits| u8::try_from(bits).ok());

    let data_type = match optional(node_id, AttributeId::DataType, data_type)? {
        Some(OpcUaValue::NodeId(id)) => Some(id),
        _ => None,
    };

    Ok(NodeAttributes {
        node_class,
        browse_name,
        description,
        access_level,
        data_type,
    })
}

/// Unwraps a mandatory attribute. Any non-good status fails.
fn required(
    node_id: &NodeId,
    attribute: AttributeId,
    value: DataValue,
) -> OpcUaResult<OpcUaValue> {
    if !status::is_good(value.status_code) {
        return Err(OpcUaError::browse(BrowseError::attribute_status(
            node_id.to_string(),
            attribute.name(),
            value.status_code,
        )));
    }
    value.value.ok_or_else(|| missing(node_id, attribute))
}

/// Unwraps an optional attribute. "Not applicable" yields `None`.
fn optional(
    node_id: &NodeId,
    attribute: AttributeId,
    value: DataValue,
) -> OpcUaResult<Option<OpcUaValue>> {
    match value.status_code {
        code if status::is_good(code) => Ok(value.value),
        status::BAD_ATTRIBUTE_ID_INVALID => Ok(None),
        code => Err(OpcUaError::browse(BrowseError::attribute_status(
            node_id.to_string(),
            attribute.name(),
            code,
        ))),
    }
}

fn missing(node_id: &NodeId, attribute: AttributeId) -> OpcUaError {
    OpcUaError::browse(BrowseError::missing_attribute(
        node_id.to_string(),
        attribute.name(),
    ))
}

// =============================================================================
// Tests
// =============================================================================
