// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh loading seam.
//!
//! The chart never reads files itself; it asks a [`MeshLoader`] for the raw
//! buffers of a fragment. [`ObjLoader`] serves OBJ files from a directory,
//! [`MemoryLoader`] serves fixtures from memory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::classify::{fragment_base, obj_file_name};
use crate::error::{Error, Result};
use crate::obj::parse_obj;

/// Buffers of one mesh as delivered by a loader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMesh {
    pub name: String,
    pub positions: Vec<f32>,
    pub indices: Option<Vec<u32>>,
    pub colors: Option<Vec<f32>>,
}

impl RawMesh {
    /// Closed box spanning `min..max`, 8 vertices and 12 triangles.
    pub fn cuboid(name: impl Into<String>, min: [f32; 3], max: [f32; 3]) -> Self {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        #[rustfmt::skip]
        let positions = vec![
            x0, y0, z0,  x1, y0, z0,  x1, y1, z0,  x0, y1, z0,
            x0, y0, z1,  x1, y0, z1,  x1, y1, z1,  x0, y1, z1,
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1,  0, 3, 2,
            4, 5, 6,  4, 6, 7,
            0, 1, 5,  0, 5, 4,
            3, 6, 2,  3, 7, 6,
            0, 4, 7,  0, 7, 3,
            1, 2, 6,  1, 6, 5,
        ];
        Self {
            name: name.into(),
            positions,
            indices: Some(indices),
            colors: None,
        }
    }
}

/// Everything a fragment file contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFragment {
    pub meshes: Vec<RawMesh>,
}

impl RawFragment {
    pub fn single(mesh: RawMesh) -> Self {
        Self { meshes: vec![mesh] }
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.positions.is_empty())
    }
}

/// Async source of fragment geometry.
pub trait MeshLoader: Send + Sync {
    /// Load the fragment named `fragment` (base name or file name).
    fn load<'a>(&'a self, fragment: &'a str) -> BoxFuture<'a, Result<RawFragment>>;
}

/// Reads `<root>/<fragment>.obj`.
#[derive(Debug, Clone)]
pub struct ObjLoader {
    root: PathBuf,
    max_file_size: Option<u64>,
}

impl ObjLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: None,
        }
    }

    /// Refuse files larger than `bytes`.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, fragment: &str) -> Result<RawFragment> {
        let path = self.root.join(obj_file_name(fragment));
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::fragment(fragment, format!("{}: {}", path.display(), e)))?;
        if let Some(limit) = self.max_file_size {
            if meta.len() > limit {
                return Err(Error::fragment(
                    fragment,
                    format!("{} bytes exceeds limit of {}", meta.len(), limit),
                ));
            }
        }
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::fragment(fragment, format!("{}: {}", path.display(), e)))?;
        parse_obj(fragment_base(fragment), &text)
    }
}

impl MeshLoader for ObjLoader {
    fn load<'a>(&'a self, fragment: &'a str) -> BoxFuture<'a, Result<RawFragment>> {
        self.read(fragment).boxed()
    }
}

/// In-memory loader used by tests and demos.
///
/// Counts every load call and yields once before answering, so concurrent
/// requests for the same fragment genuinely overlap.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    fragments: FxHashMap<String, RawFragment>,
    failing: FxHashSet<String>,
    loads: AtomicUsize,
    per_fragment: Mutex<FxHashMap<String, usize>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(mut self, name: &str, fragment: RawFragment) -> Self {
        self.insert(name, fragment);
        self
    }

    /// Shorthand for a fragment made of one box.
    pub fn with_cuboid(self, name: &str, min: [f32; 3], max: [f32; 3]) -> Self {
        let mesh = RawMesh::cuboid(fragment_base(name), min, max);
        self.with_fragment(name, RawFragment::single(mesh))
    }

    /// Make every load of `name` fail.
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(fragment_base(name).to_string());
        self
    }

    pub fn insert(&mut self, name: &str, fragment: RawFragment) {
        self.fragments.insert(fragment_base(name).to_string(), fragment);
    }

    /// Total load calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Load calls for one fragment.
    pub fn loads_of(&self, name: &str) -> usize {
        let counts = self.per_fragment.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(fragment_base(name)).copied().unwrap_or(0)
    }
}

impl MeshLoader for MemoryLoader {
    fn load<'a>(&'a self, fragment: &'a str) -> BoxFuture<'a, Result<RawFragment>> {
        async move {
            let base = fragment_base(fragment);
            self.loads.fetch_add(1, Ordering::SeqCst);
            {
                let mut counts = self.per_fragment.lock().unwrap_or_else(PoisonError::into_inner);
                *counts.entry(base.to_string()).or_default() += 1;
            }
            tokio::task::yield_now().await;

            if self.failing.contains(base) {
                return Err(Error::fragment(fragment, "unavailable"));
            }
            self.fragments
                .get(base)
                .cloned()
                .ok_or_else(|| Error::fragment(fragment, "not found"))
        }
        .boxed()
    }
}
