// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load-once prototype cache.
//!
//! Every fragment is loaded at most once per store. Concurrent requests for
//! a fragment still in flight await the same shared future. Successful loads
//! stay for the life of the store; failed loads are forgotten so a later
//! request retries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use rustc_hash::FxHashMap;
use tracing::debug;

use dentchart_geometry::{MeshGeometry, Rgb, Trs};
use dentchart_scene::{Material, MeshRef, Node, NodeKey, NodeTags, Result as SceneResult, SceneGraph};

use crate::classify::fragment_base;
use crate::error::{Error, Result};
use crate::loader::{MeshLoader, RawFragment};

/// One mesh of a prototype.
#[derive(Debug, Clone)]
pub struct PrototypeMesh {
    pub name: String,
    pub mesh: MeshRef,
}

/// Normalized geometry of one fragment, shared by all its instances.
#[derive(Debug)]
pub struct Prototype {
    pub fragment: String,
    pub meshes: Vec<PrototypeMesh>,
}

impl Prototype {
    /// Normalizes raw buffers: every mesh gets a color channel (base grey
    /// when the file has none) and the shared `material`.
    pub fn from_raw(fragment: &str, raw: RawFragment, material: &Arc<Material>) -> Result<Self> {
        let mut meshes = Vec::with_capacity(raw.meshes.len());
        for m in raw.meshes {
            let geometry = MeshGeometry::new(m.positions, m.indices, m.colors)?;
            if geometry.is_empty() {
                continue;
            }
            geometry.ensure_colors(Rgb::BASE_GREY);
            meshes.push(PrototypeMesh {
                name: m.name,
                mesh: MeshRef::new(Arc::new(geometry), Arc::clone(material)),
            });
        }
        if meshes.is_empty() {
            return Err(Error::fragment(fragment, "no geometry"));
        }
        Ok(Self {
            fragment: fragment.to_string(),
            meshes,
        })
    }

    /// Places a new instance under `parent`.
    ///
    /// A single-mesh prototype becomes one mesh node; otherwise a group named
    /// after the fragment wraps one node per mesh. The returned node carries
    /// `transform` and the part label, all mesh nodes carry `tags`.
    pub fn instantiate_into(
        &self,
        graph: &mut SceneGraph,
        parent: NodeKey,
        transform: Trs,
        tags: NodeTags,
    ) -> SceneResult<NodeKey> {
        let mut mesh_tags = tags.clone();
        mesh_tags.source_base = Some(self.fragment.clone());
        let part_tags = tags.with_part(self.fragment.clone());

        if let [only] = self.meshes.as_slice() {
            let node = Node::mesh(self.fragment.clone(), only.mesh.clone())
                .with_tags(NodeTags {
                    source_base: Some(self.fragment.clone()),
                    ..part_tags
                })
                .with_transform(transform);
            return graph.insert(parent, node);
        }

        let group = graph.insert(
            parent,
            Node::group(self.fragment.clone())
                .with_tags(part_tags)
                .with_transform(transform),
        )?;
        for m in &self.meshes {
            let node = Node::mesh(m.name.clone(), m.mesh.clone()).with_tags(mesh_tags.clone());
            graph.insert(group, node)?;
        }
        Ok(group)
    }
}

/// Cloneable failure carried through the shared in-flight future.
#[derive(Debug, Clone)]
struct LoadFailure(String);

type PendingLoad = Shared<BoxFuture<'static, std::result::Result<Arc<Prototype>, LoadFailure>>>;

/// Fragment id -> prototype cache with in-flight deduplication.
pub struct PrototypeStore {
    loader: Arc<dyn MeshLoader>,
    material: Arc<Material>,
    ready: Mutex<FxHashMap<String, Arc<Prototype>>>,
    pending: Mutex<FxHashMap<String, PendingLoad>>,
}

impl std::fmt::Debug for PrototypeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrototypeStore")
            .field("ready", &self.len())
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PrototypeStore {
    pub fn new(loader: Arc<dyn MeshLoader>) -> Self {
        Self {
            loader,
            material: Arc::new(Material::default()),
            ready: Mutex::new(FxHashMap::default()),
            pending: Mutex::new(FxHashMap::default()),
        }
    }

    /// The material every prototype mesh references.
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Number of cached prototypes.
    pub fn len(&self) -> usize {
        lock(&self.ready).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, fragment: &str) -> bool {
        lock(&self.ready).contains_key(fragment_base(fragment))
    }

    fn start_load(&self, id: &str) -> PendingLoad {
        let loader = Arc::clone(&self.loader);
        let material = Arc::clone(&self.material);
        let id = id.to_string();
        async move {
            let raw = loader.load(&id).await.map_err(|e| LoadFailure(reason(e)))?;
            Prototype::from_raw(&id, raw, &material)
                .map(Arc::new)
                .map_err(|e| LoadFailure(reason(e)))
        }
        .boxed()
        .shared()
    }

    /// Returns the prototype for `fragment`, loading it on first use.
    pub async fn get(&self, fragment: &str) -> Result<Arc<Prototype>> {
        let id = fragment_base(fragment).to_string();
        let load = {
            let mut pending = lock(&self.pending);
            if let Some(hit) = lock(&self.ready).get(&id) {
                debug!(fragment = %id, "prototype cache hit");
                return Ok(Arc::clone(hit));
            }
            match pending.get(&id) {
                Some(inflight) => {
                    debug!(fragment = %id, "joining in-flight load");
                    inflight.clone()
                }
                None => {
                    debug!(fragment = %id, "prototype cache miss");
                    let load = self.start_load(&id);
                    pending.insert(id.clone(), load.clone());
                    load
                }
            }
        };

        let outcome = load.clone().await;

        let mut pending = lock(&self.pending);
        // a retry may already have replaced the entry with a newer load
        if pending.get(&id).is_some_and(|p| p.ptr_eq(&load)) {
            pending.remove(&id);
        }
        match outcome {
            Ok(proto) => {
                lock(&self.ready)
                    .entry(id)
                    .or_insert_with(|| Arc::clone(&proto));
                Ok(proto)
            }
            Err(LoadFailure(why)) => Err(Error::fragment(id, why)),
        }
    }

    /// Loads many fragments concurrently; results come back in input order.
    pub async fn preload<'a, I>(&self, fragments: I) -> Vec<(String, Result<Arc<Prototype>>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fragments: Vec<&str> = fragments.into_iter().collect();
        let results = join_all(fragments.iter().map(|f| self.get(f))).await;
        fragments
            .into_iter()
            .map(|f| fragment_base(f).to_string())
            .zip(results)
            .collect()
    }
}

/// Inner reason of a load error, without the fragment prefix.
fn reason(e: Error) -> String {
    match e {
        Error::FragmentLoadFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MemoryLoader, RawMesh};
    use dentchart_scene::ComponentType;

    fn two_mesh_fragment() -> RawFragment {
        RawFragment {
            meshes: vec![
                RawMesh::cuboid("a", [0.0; 3], [1.0; 3]),
                RawMesh::cuboid("b", [2.0; 3], [3.0; 3]),
            ],
        }
    }

    #[tokio::test]
    async fn test_second_get_hits_cache() {
        let loader = Arc::new(MemoryLoader::new().with_cuboid("D11C_V", [0.0; 3], [1.0; 3]));
        let store = PrototypeStore::new(loader.clone());

        let a = store.get("D11C_V.obj").await.unwrap();
        let b = store.get("D11C_V").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.load_count(), 1);
        assert!(store.contains("D11C_V"));
    }

    #[tokio::test]
    async fn test_colors_synthesized_and_material_shared() {
        let loader = Arc::new(
            MemoryLoader::new()
                .with_cuboid("one", [0.0; 3], [1.0; 3])
                .with_cuboid("two", [0.0; 3], [1.0; 3]),
        );
        let store = PrototypeStore::new(loader);
        let one = store.get("one").await.unwrap();
        let two = store.get("two").await.unwrap();

        let geo = &one.meshes[0].mesh.geometry;
        assert!(geo.has_colors());
        assert_eq!(geo.vertex_color(0), Some(Rgb::BASE_GREY));
        assert!(Arc::ptr_eq(&one.meshes[0].mesh.material, &two.meshes[0].mesh.material));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let loader = Arc::new(MemoryLoader::new().with_failure("gone"));
        let store = PrototypeStore::new(loader.clone());

        assert!(matches!(store.get("gone").await, Err(Error::FragmentLoadFailed { .. })));
        assert!(store.get("gone").await.is_err());
        assert_eq!(loader.loads_of("gone"), 2);
        assert!(store.is_empty());
    }

    /// Fails its first load; every load waits for a permit on `gate`.
    struct GatedLoader {
        gate: tokio::sync::Semaphore,
        loads: std::sync::atomic::AtomicUsize,
    }

    impl GatedLoader {
        fn new() -> Self {
            Self {
                gate: tokio::sync::Semaphore::new(0),
                loads: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl MeshLoader for GatedLoader {
        fn load<'a>(&'a self, fragment: &'a str) -> BoxFuture<'a, Result<RawFragment>> {
            async move {
                let call = self.loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
                if call == 0 {
                    return Err(Error::fragment(fragment, "unavailable"));
                }
                Ok(RawFragment::single(RawMesh::cuboid(fragment, [0.0; 3], [1.0; 3])))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_stale_waiter_keeps_retry_in_flight() {
        use futures::poll;
        use std::pin::pin;
        use std::sync::atomic::Ordering;

        let loader = Arc::new(GatedLoader::new());
        let store = PrototypeStore::new(loader.clone());

        // a starts the first load and is left waiting
        let mut a = pin!(store.get("D11C_V"));
        assert!(poll!(a.as_mut()).is_pending());

        // b joins and sees the failure first
        loader.gate.add_permits(1);
        let mut b = pin!(store.get("D11C_V"));
        assert!(matches!(poll!(b.as_mut()), std::task::Poll::Ready(Err(_))));

        // c retries while a has not yet observed the failure
        let mut c = pin!(store.get("D11C_V"));
        assert!(poll!(c.as_mut()).is_pending());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

        assert!(matches!(poll!(a.as_mut()), std::task::Poll::Ready(Err(_))));

        // d must join the retry instead of starting a third load
        let mut d = pin!(store.get("D11C_V"));
        assert!(poll!(d.as_mut()).is_pending());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

        loader.gate.add_permits(2);
        let (c, d) = futures::join!(c, d);
        assert!(Arc::ptr_eq(&c.unwrap(), &d.unwrap()));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_instantiate_single_and_multi_mesh() {
        let material = Arc::new(Material::default());
        let single = Prototype::from_raw(
            "D11C_V",
            RawFragment::single(RawMesh::cuboid("m", [0.0; 3], [1.0; 3])),
            &material,
        )
        .unwrap();
        let multi = Prototype::from_raw("IMP11", two_mesh_fragment(), &material).unwrap();

        let mut g = SceneGraph::new("chart");
        let root = g.root();
        let tooth = dentchart_scene::ToothId::new(11).unwrap();
        let tags = NodeTags::for_tooth(tooth).with_component(ComponentType::Tooth);

        let a = single
            .instantiate_into(&mut g, root, Trs::from_translation(1.0, 0.0, 0.0), tags.clone())
            .unwrap();
        let node = g.node(a).unwrap();
        assert!(node.is_mesh());
        assert_eq!(node.tags.part_label.as_deref(), Some("D11C_V"));
        assert_eq!(node.tags.source_base.as_deref(), Some("D11C_V"));

        let b = multi.instantiate_into(&mut g, root, Trs::identity(), tags).unwrap();
        assert!(g.node(b).unwrap().is_group());
        assert_eq!(g.children(b).len(), 2);
        let child = g.node(g.children(b)[0]).unwrap();
        assert_eq!(child.tags.part_label, None);
        assert_eq!(child.tags.source_base.as_deref(), Some("IMP11"));
        assert_eq!(child.tags.component_type, Some(ComponentType::Tooth));

        // instances share the prototype buffers
        let again = single.instantiate_into(&mut g, root, Trs::identity(), NodeTags::default()).unwrap();
        let (x, y) = (g.node(a).unwrap(), g.node(again).unwrap());
        assert!(x.mesh_ref().unwrap().shares_with(y.mesh_ref().unwrap()));
    }
}
