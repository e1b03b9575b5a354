//! The mutable search-state tree: one node per compute placement / tile
//! level, shared across sibling search states via an arena of dense indices
//! (spec §4.4a, design note in §9: "arena + dense indices... copy-on-write").

use crate::dag::NodeId;
use std::rc::Rc;

/// Dense index of a [`LoopNestNode`] within its [`LoopNestArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopNestId(pub usize);

/// How a node was placed relative to its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inlined,
    ComputeRoot,
    /// Computed at a specific ancestor loop level of some consumer stage.
    ComputeAt {
        stage: crate::dag::StageId,
        loop_level: usize,
    },
}

/// One node of the search tree: the placement decision for a pipeline Node
/// plus a tile-size vector for its own loop dimensions, and child indices —
/// the other nodes nested inside this one's loop nest because they were
/// placed `ComputeAt` one of this node's loop levels.
#[derive(Debug, Clone)]
pub struct LoopNestNode {
    pub node: NodeId,
    pub placement: Option<Placement>,
    pub tile_sizes: Vec<u32>,
    /// Whether the tiling decision has been made, separate from
    /// `tile_sizes.is_empty()` since an inlined or 0-dim node's tiling
    /// decision is legitimately an empty vector.
    pub tiling_decided: bool,
    pub children: Vec<LoopNestId>,
}

impl LoopNestNode {
    pub fn root(node: NodeId) -> Self {
        LoopNestNode {
            node,
            placement: None,
            tile_sizes: Vec::new(),
            tiling_decided: false,
            children: Vec::new(),
        }
    }

    pub fn is_decided(&self) -> bool {
        self.placement.is_some()
    }
}

/// Candidate tile sizes per dimension offered by the default decision model
/// (spec §4.4a): `{1, 2, 4, 8}`, or `{1}` only when `no_subtiling` is set.
pub fn tile_candidates(no_subtiling: bool) -> &'static [u32] {
    if no_subtiling {
        &[1]
    } else {
        &[1, 2, 4, 8]
    }
}

/// Backing store of [`LoopNestNode`]s for one pipeline's search.
///
/// An arena is a persistent, singly-linked chain of generations: the base
/// generation (built by [`LoopNest::empty`]) owns every node outright; every
/// later generation owns only the handful of nodes a single decision
/// touched (`overlay`) plus an `Rc` pointer at the generation it was derived
/// from. Looking a node up walks the chain until a generation's overlay (or
/// the base) has it. This is what makes `derive_child` copy only the nodes a
/// decision actually changes, not the whole arena.
#[derive(Debug, Default)]
pub struct LoopNestArena {
    base: Vec<LoopNestNode>,
    parent: Option<Rc<LoopNestArena>>,
    overlay: Vec<(LoopNestId, LoopNestNode)>,
    len: usize,
}

impl LoopNestArena {
    fn base(nodes: Vec<LoopNestNode>) -> Self {
        let len = nodes.len();
        LoopNestArena { base: nodes, parent: None, overlay: Vec::new(), len }
    }

    fn overlay_on(parent: &Rc<LoopNestArena>, overlay: Vec<(LoopNestId, LoopNestNode)>) -> Self {
        LoopNestArena {
            base: Vec::new(),
            parent: Some(Rc::clone(parent)),
            overlay,
            len: parent.len,
        }
    }

    pub fn get(&self, id: LoopNestId) -> &LoopNestNode {
        let mut current = self;
        loop {
            if let Some((_, node)) = current.overlay.iter().rev().find(|(i, _)| *i == id) {
                return node;
            }
            match &current.parent {
                Some(parent) => current = parent,
                None => return &current.base[id.0],
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// An immutable snapshot: an arena generation plus the root id of this
/// schedule's tree. Cloning a `LoopNest` is cheap (an `Rc` bump); deriving a
/// child snapshot via [`LoopNest::derive_child`] pushes one new generation
/// that overlays only the decided node (and, for a compute-at decision, the
/// consumer node it nests under) — every sibling and ancestor snapshot keeps
/// pointing at the unmodified generations underneath, so unrelated subtrees
/// are shared, not copied.
#[derive(Debug, Clone)]
pub struct LoopNest {
    arena: Rc<LoopNestArena>,
    root: LoopNestId,
}

impl LoopNest {
    /// A fresh empty root: one undecided [`LoopNestNode`] per pipeline Node,
    /// with `root` pointing at the first (per spec: "One State with an empty
    /// root LoopNest").
    pub fn empty(num_nodes: usize) -> Self {
        let nodes: Vec<LoopNestNode> = (0..num_nodes).map(|idx| LoopNestNode::root(NodeId(idx))).collect();
        LoopNest {
            arena: Rc::new(LoopNestArena::base(nodes)),
            root: LoopNestId(0),
        }
    }

    pub fn arena(&self) -> &LoopNestArena {
        &self.arena
    }

    pub fn root(&self) -> LoopNestId {
        self.root
    }

    /// Record a decision for `target`'s `LoopNestNode`, with no change to any
    /// other node's children. Used for inlining, compute-root, and tiling
    /// decisions, none of which nest `target` under another node's loop.
    pub fn derive_child(&self, target: LoopNestId, decide: impl FnOnce(&mut LoopNestNode)) -> LoopNest {
        self.derive_child_nested_in(target, None, decide)
    }

    /// Same as [`derive_child`](Self::derive_child), but when `nested_in` is
    /// given, also records `target` as a child of `nested_in`'s
    /// `LoopNestNode` — the case where a compute-at decision places `target`
    /// inside one of `nested_in`'s loop levels. `root` is preserved.
    pub fn derive_child_nested_in(
        &self,
        target: LoopNestId,
        nested_in: Option<LoopNestId>,
        decide: impl FnOnce(&mut LoopNestNode),
    ) -> LoopNest {
        let mut decided = self.arena.get(target).clone();
        decide(&mut decided);
        let mut overlay = vec![(target, decided)];

        if let Some(parent_id) = nested_in {
            let mut owner = self.arena.get(parent_id).clone();
            if !owner.children.contains(&target) {
                owner.children.push(target);
            }
            overlay.push((parent_id, owner));
        }

        LoopNest {
            arena: Rc::new(LoopNestArena::overlay_on(&self.arena, overlay)),
            root: self.root,
        }
    }
}
