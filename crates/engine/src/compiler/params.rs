// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Values available to placeholders while compiling a graph.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use weft_core::{Graph, Node, NodeKind, TriggerContext, TriggerKind};

/// Prior execution outputs keyed by `node` or `node:handle`
pub type Outputs = HashMap<String, Value>;

/// Parameter, webhook and prior-output values, keyed by `node` or `node:socket`.
#[derive(Debug, Default)]
pub struct ParamMap<'a> {
    params: HashMap<&'a str, Value>,
    webhooks: HashSet<&'a str>,
    trigger: Option<&'a TriggerContext>,
    outputs: Option<&'a Outputs>,
    /// Parameter node label → value, bound in every script
    labels: Vec<(String, Value)>,
}

impl<'a> ParamMap<'a> {
    pub fn build(graph: &'a Graph, trigger: Option<&'a TriggerContext>, outputs: Option<&'a Outputs>) -> Self {
        let mut map = ParamMap { trigger, outputs, ..Default::default() };
        for node in &graph.nodes {
            match &node.kind {
                NodeKind::Parameter(p) => {
                    let value = p.resolved_value();
                    map.labels.push((node.label.clone(), value.clone()));
                    map.params.insert(node.id.as_str(), value);
                }
                NodeKind::Trigger(t) if t.kind == TriggerKind::Webhook => {
                    map.webhooks.insert(node.id.as_str());
                }
                _ => {}
            }
        }
        map
    }

    /// Value flowing out of `source` through `handle`: parameter node,
    /// then webhook socket, then prior execution output.
    pub fn source_value(&self, source: &str, handle: Option<&str>) -> Option<Value> {
        if let Some(v) = self.params.get(source) {
            return Some(v.clone());
        }
        if self.webhooks.contains(source) {
            if let Some(v) = self.trigger.and_then(|t| t.socket_value(handle.unwrap_or("body"))) {
                return Some(v);
            }
        }
        let outputs = self.outputs?;
        handle
            .and_then(|h| outputs.get(&format!("{source}:{h}")))
            .or_else(|| outputs.get(source))
            .cloned()
    }

    /// Resolve each input socket of `node` to a `(name, value)` binding.
    ///
    /// Unconnected sockets fall back to a direct output recorded for the
    /// node itself under `node:socket`. Parameter labels are appended for
    /// names no socket claimed.
    pub fn bindings(&self, graph: &Graph, node: &Node) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = Vec::new();
        for socket in node.kind.inputs() {
            let resolved = graph
                .data_sources(&node.id, &socket.id)
                .find_map(|e| self.source_value(&e.source, e.source_tag()))
                .or_else(|| {
                    self.outputs.and_then(|o| o.get(&format!("{}:{}", node.id, socket.id)).cloned())
                });
            if let Some(value) = resolved {
                out.push((socket.name().to_string(), value));
            }
        }
        for (label, value) in &self.labels {
            if !out.iter().any(|(name, _)| name == label) {
                out.push((label.clone(), value.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
