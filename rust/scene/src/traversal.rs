// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal methods for navigating the scene hierarchy.
//!
//! Walks return plain key lists so callers can mutate the graph afterwards
//! without holding borrows across the walk.

use crate::arena::SceneGraph;
use crate::keys::NodeKey;
use crate::node::Node;

impl SceneGraph {
    /// Pre-order list of `key` and everything below it.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            // Reverse so children come out in insertion order
            stack.extend(self.children(k).iter().rev().copied());
        }
        out
    }

    /// Mesh nodes at or below `key`, in pre-order.
    pub fn mesh_descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        self.descendants(key)
            .into_iter()
            .filter(|&k| self.node(k).is_some_and(Node::is_mesh))
            .collect()
    }

    /// Parent chain of `key`, nearest first, excluding `key` itself.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut cursor = self.parent(key);
        while let Some(k) = cursor {
            out.push(k);
            cursor = self.parent(k);
        }
        out
    }

    /// Nearest node, starting at `key` itself and walking up, that satisfies `pred`.
    pub fn find_ancestor<F>(&self, key: NodeKey, mut pred: F) -> Option<NodeKey>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let node = self.node(k)?;
            if pred(node) {
                return Some(k);
            }
            cursor = node.parent;
        }
        None
    }

    /// First node at or below `scope` (pre-order) named `name`.
    pub fn find_by_name(&self, scope: NodeKey, name: &str) -> Option<NodeKey> {
        self.descendants(scope)
            .into_iter()
            .find(|&k| self.node(k).is_some_and(|n| n.name == name))
    }

    /// True when the node and every ancestor are visible.
    pub fn is_visible_in_hierarchy(&self, key: NodeKey) -> bool {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            match self.node(k) {
                Some(n) if n.visible => cursor = n.parent,
                _ => return false,
            }
        }
        true
    }
}
