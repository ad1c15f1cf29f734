//! Logging and debugging facilities for Strata.
//!
//! This module provides:
//! - Target names for filtering the `tracing` output of each subsystem
//! - Debug visualization for section/provider trees
//! - A performance span guard for profiling batch processing
//!
//! # Tracing Integration
//!
//! Strata uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("strata::reducer=debug,strata::mapping=trace")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! Anything that can describe itself as a [`DebugNode`] hierarchy can be
//! rendered with [`TreeDebug`]:
//!
//! ```
//! use strata_core::logging::{DebugNode, TreeDebug, TreeFormatOptions};
//!
//! let tree = DebugNode::new("ComposedSectionProvider", "root")
//!     .with_count(2)
//!     .with_child(DebugNode::new("ArraySection", "fruit").with_count(3))
//!     .with_child(DebugNode::new("ArraySection", "vegetables").with_count(0));
//!
//! let output = TreeDebug::with_options(TreeFormatOptions::minimal()).format(&tree);
//! assert!(output.contains("fruit"));
//! ```

use std::fmt::Write as FmtWrite;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "strata_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "strata_core::signal";
    /// Leaf section mutations.
    pub const SECTION: &str = "strata::section";
    /// Composed and segmented provider mutations.
    pub const PROVIDER: &str = "strata::provider";
    /// Flat section translation.
    pub const FLAT: &str = "strata::flat";
    /// Global coordinate mapping and offset cache.
    pub const MAPPING: &str = "strata::mapping";
    /// Change reducer.
    pub const REDUCER: &str = "strata::reducer";
    /// Change recorder (reducer wired to mapping signals).
    pub const RECORDER: &str = "strata::recorder";
    /// Timing spans from [`PerfSpan`](super::PerfSpan).
    pub const PERF: &str = "strata::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node IDs.
    pub show_ids: bool,
    /// Whether to show node kinds (type names).
    pub show_kinds: bool,
    /// Whether to show section/element counts.
    pub show_counts: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_kinds: true,
            show_counts: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_kinds: false,
            show_counts: false,
            ..Default::default()
        }
    }

    /// Sets the tree style.
    pub fn with_style(mut self, style: TreeStyle) -> Self {
        self.style = style;
        self
    }

    /// Limits traversal depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

/// A snapshot of one node of a hierarchy, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugNode {
    /// The node's kind, typically its type name.
    pub kind: &'static str,
    /// Human-readable label.
    pub label: String,
    /// Stable identifier, if the node has one.
    pub id: Option<u64>,
    /// Section count for providers, element count for sections.
    pub count: Option<usize>,
    /// Child nodes in order.
    pub children: Vec<DebugNode>,
}

impl DebugNode {
    /// Creates a leaf node.
    pub fn new(kind: &'static str, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            id: None,
            count: None,
            children: Vec::new(),
        }
    }

    /// Sets the node's identifier.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the node's count.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Appends a child node.
    pub fn with_child(mut self, child: DebugNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Debug utility for visualizing section/provider trees.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format a tree rooted at `root`.
    pub fn format(&self, root: &DebugNode) -> String {
        let mut output = String::new();
        self.format_subtree_into(root, 0, true, &mut output);
        output
    }

    fn format_subtree_into(&self, node: &DebugNode, depth: usize, is_last: bool, output: &mut String) {
        if let Some(max) = self.options.max_depth {
            if depth > max {
                return;
            }
        }

        output.push_str(&self.build_prefix(depth, is_last));

        if node.label.is_empty() {
            output.push_str("(unnamed)");
        } else {
            output.push_str(&node.label);
        }

        if self.options.show_ids {
            if let Some(id) = node.id {
                write!(output, " [#{id}]").expect("write to String");
            }
        }

        if self.options.show_kinds {
            write!(output, " ({})", node.kind).expect("write to String");
        }

        if self.options.show_counts {
            if let Some(count) = node.count {
                write!(output, " <{count}>").expect("write to String");
            }
        }

        output.push('\n');

        let child_count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            self.format_subtree_into(child, depth + 1, i + 1 == child_count, output);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            for _ in 0..self.options.indent_size {
                prefix.push(' ');
            }
        }

        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to measure how long batch finalization and cache rebuilds take.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::trace_span!(target: "strata::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}
