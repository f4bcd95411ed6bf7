// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The four fixed chart rows.

use std::fmt;

use dentchart_scene::{ArchSide, NodeKey, Result as SceneResult, SceneGraph};
use serde::{Deserialize, Serialize};

/// Row identity, in top-to-bottom display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowId {
    VestibularUpper,
    OcclusalUpper,
    OcclusalLower,
    VestibularLower,
}

impl RowId {
    pub const ALL: [RowId; 4] = [
        RowId::VestibularUpper,
        RowId::OcclusalUpper,
        RowId::OcclusalLower,
        RowId::VestibularLower,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            RowId::VestibularUpper => "row-vest-up",
            RowId::OcclusalUpper => "row-oclu-up",
            RowId::OcclusalLower => "row-oclu-low",
            RowId::VestibularLower => "row-vest-low",
        }
    }

    /// Resolves row names from layout files: `row-vest-up`,
    /// `chart-row-oclu-low`, `vestibular_superior` ...
    pub fn from_name(name: &str) -> Option<Self> {
        let n = name.to_lowercase();
        let vestibular = n.contains("vest");
        let occlusal = n.contains("oclu") || n.contains("occl");
        let upper = n.contains("up") || n.contains("sup");
        let lower = n.contains("low") || n.contains("inf");
        match (vestibular, occlusal, upper, lower) {
            (true, false, true, false) => Some(RowId::VestibularUpper),
            (true, false, false, true) => Some(RowId::VestibularLower),
            (false, true, true, false) => Some(RowId::OcclusalUpper),
            (false, true, false, true) => Some(RowId::OcclusalLower),
            _ => None,
        }
    }

    pub fn is_occlusal(self) -> bool {
        matches!(self, RowId::OcclusalUpper | RowId::OcclusalLower)
    }

    pub fn arch(self) -> ArchSide {
        match self {
            RowId::VestibularUpper | RowId::OcclusalUpper => ArchSide::Upper,
            RowId::OcclusalLower | RowId::VestibularLower => ArchSide::Lower,
        }
    }

    pub fn vestibular(arch: ArchSide) -> Self {
        match arch {
            ArchSide::Upper => RowId::VestibularUpper,
            ArchSide::Lower => RowId::VestibularLower,
        }
    }

    pub fn occlusal(arch: ArchSide) -> Self {
        match arch {
            ArchSide::Upper => RowId::OcclusalUpper,
            ArchSide::Lower => RowId::OcclusalLower,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row group keys, indexed by [`RowId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRows([NodeKey; 4]);

impl ChartRows {
    /// Adds the four row groups under the graph root, in display order.
    pub fn create(graph: &mut SceneGraph) -> SceneResult<Self> {
        let root = graph.root();
        let mut keys = [NodeKey::default(); 4];
        for row in RowId::ALL {
            keys[row.index()] = graph.add_group(root, row.name())?;
        }
        Ok(Self(keys))
    }

    #[inline]
    pub fn get(&self, row: RowId) -> NodeKey {
        self.0[row.index()]
    }

    pub fn keys(&self) -> [NodeKey; 4] {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, NodeKey)> + '_ {
        RowId::ALL.iter().map(move |&r| (r, self.get(r)))
    }

    /// Row owning `key`, if it is one of the four.
    pub fn row_of(&self, key: NodeKey) -> Option<RowId> {
        RowId::ALL.into_iter().find(|&r| self.get(r) == key)
    }
}
