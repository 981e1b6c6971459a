//! Skel Cache Tests
//!
//! Tests for:
//! - Exactly-once construction under concurrent readers
//! - Binding discovery: inheritance, empty bindings, pruning, instancing,
//!   sharing
//! - Skeleton binding grouping

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use glam::{DMat4, DVec3, Quat, Vec3};

use myth_skel::cache::SkelCache;
use myth_skel::scene::{
    Interpolation, Path, PrimKind, PrimvarInfo, SceneGraph, SceneRef, Stage, TimeCode, Token, Value,
    tokens,
};

const THREADS: usize = 16;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Forwards to a [`Stage`], counting skeleton definition loads.
struct CountingScene {
    stage: Stage,
    bind_reads: AtomicUsize,
}

impl CountingScene {
    fn new(stage: Stage) -> Arc<Self> {
        Arc::new(Self {
            stage,
            bind_reads: AtomicUsize::new(0),
        })
    }

    fn definition_loads(&self) -> usize {
        self.bind_reads.load(Ordering::SeqCst)
    }
}

impl SceneGraph for CountingScene {
    fn prim_kind(&self, path: Path) -> Option<PrimKind> {
        self.stage.prim_kind(path)
    }

    fn is_active(&self, path: Path) -> bool {
        self.stage.is_active(path)
    }

    fn children(&self, path: Path) -> Vec<Path> {
        self.stage.children(path)
    }

    fn instance_prototype(&self, path: Path) -> Option<Path> {
        self.stage.instance_prototype(path)
    }

    fn relationship_targets(&self, path: Path, name: Token) -> Option<Vec<Path>> {
        self.stage.relationship_targets(path, name)
    }

    fn attribute(&self, path: Path, name: Token, time: TimeCode) -> Option<Value> {
        if name.as_str() == tokens::BIND_TRANSFORMS {
            self.bind_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.stage.attribute(path, name, time)
    }

    fn has_attribute(&self, path: Path, name: Token) -> bool {
        self.stage.has_attribute(path, name)
    }

    fn time_samples(&self, path: Path, name: Token) -> Vec<f64> {
        self.stage.time_samples(path, name)
    }

    fn primvar_info(&self, path: Path, name: Token) -> Option<PrimvarInfo> {
        self.stage.primvar_info(path, name)
    }
}

fn define_skeleton(stage: &mut Stage, path: &str) -> Path {
    let arm = DMat4::from_translation(DVec3::Y);
    stage.define_skeleton(path, &["A", "A/B"], vec![DMat4::IDENTITY, arm], vec![DMat4::IDENTITY, arm])
}

fn define_mesh(stage: &mut Stage, path: &str) -> Path {
    let mesh = stage.define_prim(path, PrimKind::Gprim);
    stage.set_joint_influences(mesh, vec![1], vec![1.0], 1, Interpolation::Constant);
    mesh
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn racing_readers_build_definition_once() {
    init_logger();
    let mut stage = Stage::new();
    let skel = define_skeleton(&mut stage, "/Skel");
    let scene = CountingScene::new(stage);
    let cache = SkelCache::new(scene.clone());
    let barrier = Barrier::new(THREADS);

    let definitions: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.read_scope().find_or_create_skel_definition(skel)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread").expect("definition"))
            .collect()
    });

    assert_eq!(scene.definition_loads(), 1);
    assert!(definitions.iter().all(|d| Arc::ptr_eq(d, &definitions[0])));
}

#[test]
fn racing_skel_queries_share_one_instance() {
    let mut stage = Stage::new();
    let skel = define_skeleton(&mut stage, "/Skel");
    let scene = CountingScene::new(stage);
    let cache = SkelCache::new(scene.clone());
    let barrier = Barrier::new(THREADS);

    let queries: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get_skel_query(skel)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread").expect("query"))
            .collect()
    });

    assert_eq!(scene.definition_loads(), 1);
    assert!(queries.iter().all(|q| Arc::ptr_eq(q, &queries[0])));
}

#[test]
fn populate_and_readers_interleave() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    let mesh = define_mesh(&mut stage, "/Root/Mesh");
    let cache = SkelCache::new(Arc::new(stage));

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let _ = cache.get_skinning_query(mesh);
                    let _ = cache.get_skel_query(skel);
                }
            });
        }
        for _ in 0..10 {
            cache.populate(root).expect("populate");
        }
    });

    assert!(cache.get_skinning_query(mesh).is_some());
}

// ============================================================================
// Population
// ============================================================================

#[test]
fn populate_resolves_inherited_bindings() {
    init_logger();
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    let anim = stage.define_animation("/Root/Anim", &["A/B"], vec![Vec3::ZERO], vec![Quat::IDENTITY], vec![Vec3::ONE]);
    stage.bind_skeleton(root, skel);
    stage.bind_animation(root, anim);
    let mesh = define_mesh(&mut stage, "/Root/Group/Mesh");
    let scene: SceneRef = Arc::new(stage);

    let cache = SkelCache::new(scene);
    cache.populate(root).expect("populate");

    let skinning = cache.get_skinning_query(mesh).expect("skinning");
    assert_eq!(skinning.skel_binding(), Some(skel));
    assert!(skinning.is_rigidly_deformed());

    let inherited = cache.get_inherited_skel_query(mesh).expect("inherited");
    assert_eq!(inherited.prim(), skel);
    assert_eq!(inherited.anim_query().map(|a| a.prim()), Some(anim));

    // The root binding is cached, the skeleton prim gets its own query.
    let bound = cache.get_skel_query(root).expect("bound");
    assert!(Arc::ptr_eq(&bound, &inherited));
    assert!(cache.get_skel_query(skel).is_some());
}

#[test]
fn inactive_prims_are_pruned() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    let hidden = define_mesh(&mut stage, "/Root/Hidden/Mesh");
    let visible = define_mesh(&mut stage, "/Root/Mesh");
    stage.set_active(Path::new("/Root/Hidden"), false);

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");
    assert!(cache.get_skinning_query(hidden).is_none());
    assert!(cache.get_skinning_query(visible).is_some());
}

#[test]
fn skinned_prims_stop_descent() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    define_mesh(&mut stage, "/Root/Mesh");
    let nested = define_mesh(&mut stage, "/Root/Mesh/Nested");

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");
    assert!(cache.get_skinning_query(nested).is_none());
}

#[test]
fn identical_inherited_bindings_share_a_query() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    let group = stage.define_prim("/Root/Group", PrimKind::Xform);
    stage.set_joint_influences(group, vec![0], vec![1.0], 1, Interpolation::Constant);
    let a = stage.define_prim("/Root/Group/A", PrimKind::Gprim);
    let b = stage.define_prim("/Root/Group/B", PrimKind::Gprim);

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");
    let qa = cache.get_skinning_query(a).expect("a");
    let qb = cache.get_skinning_query(b).expect("b");
    assert!(Arc::ptr_eq(&qa, &qb));
}

#[test]
fn shared_prototypes_are_visited_once() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    stage.define_prim("/Prototype", PrimKind::Xform);
    let proto_mesh = define_mesh(&mut stage, "/Prototype/Mesh");
    for name in ["/Root/InstA", "/Root/InstB"] {
        let instance = stage.define_prim(name, PrimKind::Xform);
        stage.set_instance_prototype(instance, Path::new("/Prototype"));
    }

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");
    assert!(cache.get_skinning_query(proto_mesh).is_some());
}

#[test]
fn prototype_bindings_resolve_through_first_instance() {
    let mut stage = Stage::new();
    let root_a = stage.define_prim("/RootA", PrimKind::SkelRoot);
    let skel_a = define_skeleton(&mut stage, "/RootA/Skel");
    stage.bind_skeleton(root_a, skel_a);
    let root_b = stage.define_prim("/RootB", PrimKind::SkelRoot);
    let skel_b = define_skeleton(&mut stage, "/RootB/Skel");
    stage.bind_skeleton(root_b, skel_b);

    stage.define_prim("/Prototype", PrimKind::Xform);
    let proto_mesh = define_mesh(&mut stage, "/Prototype/Mesh");
    for name in ["/RootA/Inst", "/RootB/Inst"] {
        let instance = stage.define_prim(name, PrimKind::Xform);
        stage.set_instance_prototype(instance, Path::new("/Prototype"));
    }

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root_a).expect("populate A");
    cache.populate(root_b).expect("populate B");

    // One query per prototype prim, bound through the instance populated first.
    let shared = cache.get_skinning_query(proto_mesh).expect("prototype query");
    assert_eq!(shared.skel_binding(), Some(skel_a));

    for root in [root_a, root_b] {
        let bindings = cache.compute_skel_bindings(root);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].skeleton, skel_a);
        assert!(Arc::ptr_eq(&bindings[0].skinning_queries[0], &shared));
    }
    assert!(cache.compute_skel_binding(root_b, skel_b).is_none());
}

#[test]
fn empty_skeleton_binding_stops_inheritance() {
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let skel = define_skeleton(&mut stage, "/Root/Skel");
    stage.bind_skeleton(root, skel);
    let unbound = stage.define_prim("/Root/Unbound", PrimKind::Xform);
    stage.set_relationship(unbound, tokens::SKEL_SKELETON, Vec::new());
    let hidden = define_mesh(&mut stage, "/Root/Unbound/Mesh");
    let bound = define_mesh(&mut stage, "/Root/Mesh");

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");

    let hidden_query = cache.get_skinning_query(hidden).expect("skinning query");
    assert_eq!(hidden_query.skel_binding(), None);
    assert!(cache.get_inherited_skel_query(hidden).is_none());

    assert_eq!(cache.get_skinning_query(bound).and_then(|q| q.skel_binding()), Some(skel));
    assert!(cache.get_inherited_skel_query(bound).is_some());

    let bindings = cache.compute_skel_bindings(root);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].skinning_queries.len(), 1);
}

#[test]
fn populate_fails_on_missing_root() {
    let cache = SkelCache::new(Arc::new(Stage::new()));
    assert!(cache.populate(Path::new("/Nowhere")).is_err());
}

// ============================================================================
// Skeleton bindings
// ============================================================================

#[test]
fn bindings_group_by_skeleton_in_traversal_order() {
    init_logger();
    let mut stage = Stage::new();
    let root = stage.define_prim("/Root", PrimKind::SkelRoot);
    let first = define_skeleton(&mut stage, "/Root/SkelA");
    let second = define_skeleton(&mut stage, "/Root/SkelB");

    let group_a = stage.define_prim("/Root/GroupA", PrimKind::Xform);
    stage.bind_skeleton(group_a, first);
    define_mesh(&mut stage, "/Root/GroupA/M0");
    define_mesh(&mut stage, "/Root/GroupA/M1");

    let group_b = stage.define_prim("/Root/GroupB", PrimKind::Xform);
    stage.bind_skeleton(group_b, second);
    define_mesh(&mut stage, "/Root/GroupB/M2");

    // Influences without a skeleton binding are not part of any binding.
    define_mesh(&mut stage, "/Root/Loose");

    let cache = SkelCache::new(Arc::new(stage));
    cache.populate(root).expect("populate");

    let bindings = cache.compute_skel_bindings(root);
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].skeleton, first);
    assert_eq!(bindings[0].skinning_queries.len(), 2);
    assert_eq!(bindings[1].skeleton, second);
    assert_eq!(bindings[1].skinning_queries.len(), 1);

    let only_second = cache.compute_skel_binding(root, second).expect("binding");
    assert_eq!(only_second.skinning_queries.len(), 1);
    assert!(cache.compute_skel_binding(Path::new("/Root/GroupA"), second).is_none());
}
