// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for scene graph operations.

use crate::keys::NodeKey;

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during scene graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced node was not found in the arena.
    #[error("scene node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// Re-parenting would make a node its own ancestor.
    #[error("cannot attach {node:?} under its own descendant {parent:?}")]
    CycleDetected { node: NodeKey, parent: NodeKey },

    /// The root node cannot be moved or removed.
    #[error("operation not allowed on the scene root")]
    RootImmutable,

    #[error(transparent)]
    Geometry(#[from] dentchart_geometry::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
