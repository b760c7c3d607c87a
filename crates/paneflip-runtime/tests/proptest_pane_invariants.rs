//! Property-based invariant tests for the pane set and manager.
//!
//! These tests verify structural invariants that must hold for any sequence
//! of pane operations:
//!
//! 1. Names in the set are pairwise distinct.
//! 2. Create followed by remove restores count and order of the others.
//! 3. A duplicate create fails and leaves the set unchanged.
//! 4. Removing an unknown name fails and leaves the set unchanged.
//! 5. The set always agrees with a plain `Vec` model.

use std::collections::HashSet;

use paneflip_backend::{HeadlessBackend, HeadlessConfig};
use paneflip_canvas::{Canvas, Color};
use paneflip_runtime::{Pane, PaneError, PaneManager, PaneSet};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

#[derive(Debug, Clone)]
enum Op {
    Insert(String),
    Remove(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        name_strategy().prop_map(Op::Insert),
        name_strategy().prop_map(Op::Remove),
    ]
}

fn names(set: &PaneSet) -> Vec<String> {
    set.names().map(str::to_owned).collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 5. Model agreement and uniqueness
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_matches_vec_model(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let mut set = PaneSet::new();
        let mut model: Vec<String> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(name) => {
                    let res = set.insert(Pane::new(name.clone(), Canvas::bgra(1, 1)));
                    if model.contains(&name) {
                        prop_assert_eq!(res, Err(PaneError::Duplicate));
                    } else {
                        prop_assert!(res.is_ok());
                        model.push(name);
                    }
                }
                Op::Remove(name) => {
                    let res = set.remove(&name);
                    match model.iter().position(|n| *n == name) {
                        Some(i) => {
                            prop_assert_eq!(res.map(|p| p.name().to_owned()).ok(), Some(name));
                            model.remove(i);
                        }
                        None => prop_assert_eq!(res.err(), Some(PaneError::NotFound)),
                    }
                }
            }

            let current = names(&set);
            prop_assert_eq!(&current, &model);
            let unique: HashSet<&String> = current.iter().collect();
            prop_assert_eq!(unique.len(), current.len());
            for (i, n) in model.iter().enumerate() {
                prop_assert_eq!(set.nth(i).map(Pane::name), Some(n.as_str()));
                prop_assert!(set.get(n).is_some());
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-4. Manager-level create/remove laws
// ═════════════════════════════════════════════════════════════════════════

fn manager() -> PaneManager<HeadlessBackend> {
    let backend = HeadlessBackend::open(HeadlessConfig {
        width: 2,
        height: 2,
        dump_dir: None,
    })
    .unwrap();
    PaneManager::start(backend, Color::BLACK, std::time::Duration::from_secs(3600)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn create_then_remove_restores_order(
        existing in proptest::collection::hash_set("[f-z]{1,3}", 0..6),
        fresh in "[a-e]{1,3}",
    ) {
        let mgr = manager();
        for n in &existing {
            mgr.create(n, Color::WHITE).unwrap();
        }
        let before = mgr.pane_names();

        mgr.create(&fresh, Color::WHITE).unwrap();
        prop_assert_eq!(mgr.len(), before.len() + 1);
        mgr.remove(&fresh).unwrap();

        prop_assert_eq!(mgr.pane_names(), before);
        mgr.shutdown().unwrap();
    }

    #[test]
    fn duplicate_and_missing_leave_set_unchanged(
        existing in proptest::collection::hash_set("[f-z]{1,3}", 1..6),
        missing in "[a-e]{1,3}",
    ) {
        let mgr = manager();
        for n in &existing {
            mgr.create(n, Color::WHITE).unwrap();
        }
        let before = mgr.pane_names();

        for n in &existing {
            prop_assert_eq!(mgr.create(n, Color::BLACK), Err(PaneError::Duplicate));
        }
        prop_assert_eq!(mgr.remove(&missing), Err(PaneError::NotFound));
        prop_assert_eq!(mgr.pane_names(), before);
        mgr.shutdown().unwrap();
    }
}
