// Shared/Weak property tests (consolidated).
//
// Property 1: group liveness matches outstanding owners.
//  - Model: per-group vectors of external Shared and Weak handles.
//  - Invariant: destructor count is 0 while ≥1 owner exists and
//    exactly 1 forever after; strong_count/weak_count/expired() agree
//    with the model vectors; the block is reclaimed exactly when both
//    vectors are empty.
//  - Operations: clone-owner, drop-owner, downgrade, clone-observer,
//    drop-observer, upgrade.
//
// Property 2: DAG liveness with values holding owners.
//  - Model: adjacency list (i -> children j) and external owner roots
//    per node.
//  - Invariant: alive nodes == transitive closure reachable from nodes
//    with external owners; a node's observer expires exactly when it
//    leaves the closure.
//  - Operations: clone/drop external owners, add-edge (i -> j, j > i,
//    acyclic by construction), remove-edge, drop-all-external.
use proptest::prelude::*;
use shared_rc::{AllocError, BlockAlloc, Global, Shared, Weak};
use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;

// Value whose drop is observable.
struct Probe {
    hits: Rc<Cell<usize>>,
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.hits.set(self.hits.get() + 1);
    }
}

#[derive(Default)]
struct AllocStats {
    allocs: Cell<usize>,
    deallocs: Cell<usize>,
}

#[derive(Clone)]
struct TrackingAlloc {
    stats: Rc<AllocStats>,
}

impl BlockAlloc for TrackingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.stats.allocs.set(self.stats.allocs.get() + 1);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.stats.deallocs.set(self.stats.deallocs.get() + 1);
        Global.deallocate(ptr, layout)
    }
}

// Property 1: liveness equals outstanding owners.
proptest! {
    #[test]
    fn prop_group_liveness(
        groups in 1usize..=4,
        ops in proptest::collection::vec((0u8..=5u8, 0usize..64usize, 0usize..64usize), 1..200)
    ) {
        let mut owners: Vec<Vec<Shared<Probe>>> = Vec::new();
        let mut observers: Vec<Vec<Weak<Probe>>> = Vec::new();
        let mut hits: Vec<Rc<Cell<usize>>> = Vec::new();
        let mut stats: Vec<Rc<AllocStats>> = Vec::new();

        for _ in 0..groups {
            let h = Rc::new(Cell::new(0));
            let st = Rc::new(AllocStats::default());
            let s = Shared::try_new_in(
                Probe { hits: h.clone() },
                TrackingAlloc { stats: st.clone() },
            )
            .expect("allocation");
            owners.push(vec![s]);
            observers.push(Vec::new());
            hits.push(h);
            stats.push(st);
        }

        for (op, raw_g, raw_i) in ops {
            let g = raw_g % groups;
            match op {
                // Clone one existing owner.
                0 => {
                    if !owners[g].is_empty() {
                        let i = raw_i % owners[g].len();
                        let cloned = owners[g][i].clone();
                        owners[g].push(cloned);
                    }
                }
                // Drop one owner.
                1 => {
                    if !owners[g].is_empty() {
                        let i = raw_i % owners[g].len();
                        drop(owners[g].swap_remove(i));
                    }
                }
                // Downgrade from an existing owner.
                2 => {
                    if !owners[g].is_empty() {
                        let i = raw_i % owners[g].len();
                        let w = Shared::downgrade(&owners[g][i]);
                        observers[g].push(w);
                    }
                }
                // Clone one observer.
                3 => {
                    if !observers[g].is_empty() {
                        let i = raw_i % observers[g].len();
                        let cloned = observers[g][i].clone();
                        observers[g].push(cloned);
                    }
                }
                // Drop one observer.
                4 => {
                    if !observers[g].is_empty() {
                        let i = raw_i % observers[g].len();
                        drop(observers[g].swap_remove(i));
                    }
                }
                // Upgrade: succeeds iff the group still has owners.
                5 => {
                    if !observers[g].is_empty() {
                        let i = raw_i % observers[g].len();
                        let alive = !owners[g].is_empty();
                        match observers[g][i].upgrade() {
                            Some(s) => {
                                prop_assert!(alive, "upgrade succeeded on an expired group");
                                owners[g].push(s);
                            }
                            None => prop_assert!(!alive, "upgrade failed with live owners"),
                        }
                    }
                }
                _ => unreachable!(),
            }

            // Invariants after each step.
            let alive = !owners[g].is_empty();
            prop_assert_eq!(hits[g].get(), usize::from(!alive));
            if let Some(s) = owners[g].first() {
                prop_assert_eq!(Shared::strong_count(s), owners[g].len());
                prop_assert_eq!(Shared::weak_count(s), observers[g].len());
            }
            for w in &observers[g] {
                prop_assert_eq!(w.expired(), !alive);
                prop_assert_eq!(w.strong_count(), owners[g].len());
            }
            let reclaimed = !alive && observers[g].is_empty();
            prop_assert_eq!(stats[g].deallocs.get(), usize::from(reclaimed));
        }

        // Teardown: every group destroys once and reclaims once.
        owners.clear();
        observers.clear();
        for g in 0..groups {
            prop_assert_eq!(hits[g].get(), 1);
            prop_assert_eq!(stats[g].allocs.get(), 1);
            prop_assert_eq!(stats[g].deallocs.get(), 1);
        }
    }
}

// ---- Property 2: DAG liveness ----

struct Node {
    children: RefCell<Vec<Shared<Node>>>, // DAG edges: i -> j
    hits: Rc<Cell<usize>>,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.hits.set(self.hits.get() + 1);
    }
}

// Reachability over the model adjacency from externally-owned roots.
// Edges stored by dead nodes were physically dropped with them, and
// the closure never reaches them either.
fn reachable(n: usize, roots: &[bool], adj: &[Vec<usize>]) -> Vec<bool> {
    let mut seen = vec![false; n];
    let mut stack: Vec<usize> = (0..n).filter(|&i| roots[i]).collect();
    for &i in &stack {
        seen[i] = true;
    }
    while let Some(i) = stack.pop() {
        for &j in &adj[i] {
            if !seen[j] {
                seen[j] = true;
                stack.push(j);
            }
        }
    }
    seen
}

proptest! {
    #[test]
    fn prop_dag_liveness(
        n in 1usize..=6,
        ops in proptest::collection::vec((0u8..=4u8, 0usize..64usize, 0usize..64usize), 1..160)
    ) {
        let mut external: Vec<Vec<Shared<Node>>> = Vec::new();
        let mut probes: Vec<Weak<Node>> = Vec::new();
        let mut hits: Vec<Rc<Cell<usize>>> = Vec::new();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];

        for _ in 0..n {
            let h = Rc::new(Cell::new(0));
            let s = Shared::new(Node {
                children: RefCell::new(Vec::new()),
                hits: h.clone(),
            });
            probes.push(Shared::downgrade(&s));
            external.push(vec![s]);
            hits.push(h);
        }

        for (op, raw_i, raw_j) in ops {
            let i = raw_i % n;
            match op {
                // Clone one external owner of i.
                0 => {
                    if !external[i].is_empty() {
                        let k = raw_j % external[i].len();
                        let cloned = external[i][k].clone();
                        external[i].push(cloned);
                    }
                }
                // Drop one external owner of i.
                1 => {
                    if !external[i].is_empty() {
                        let k = raw_j % external[i].len();
                        drop(external[i].swap_remove(k));
                    }
                }
                // Drop all external owners of i.
                2 => {
                    external[i].clear();
                }
                // Add edge i -> j (j > i keeps the graph acyclic); both
                // endpoints must still be alive.
                3 => {
                    if i + 1 < n {
                        let j = i + 1 + raw_j % (n - i - 1);
                        if let (Some(si), Some(sj)) =
                            (probes[i].upgrade(), probes[j].upgrade())
                        {
                            si.children.borrow_mut().push(sj);
                            adj[i].push(j);
                        }
                    }
                }
                // Remove the most recent edge out of i, if i is alive.
                4 => {
                    if let Some(si) = probes[i].upgrade() {
                        if !adj[i].is_empty() {
                            si.children.borrow_mut().pop();
                            adj[i].pop();
                        }
                    }
                }
                _ => unreachable!(),
            }

            // Invariant: liveness equals reachability from external roots.
            let roots: Vec<bool> = external.iter().map(|v| !v.is_empty()).collect();
            let alive = reachable(n, &roots, &adj);
            for k in 0..n {
                prop_assert_eq!(
                    probes[k].expired(),
                    !alive[k],
                    "node {} liveness diverged from the model",
                    k
                );
                prop_assert_eq!(hits[k].get(), usize::from(!alive[k]));
            }
        }

        // Teardown: the graph is acyclic, so dropping the externals
        // unwinds every node exactly once.
        external.clear();
        for k in 0..n {
            prop_assert!(probes[k].expired());
            prop_assert_eq!(hits[k].get(), 1);
        }
    }
}
