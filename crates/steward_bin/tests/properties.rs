//! Property tests for exactly-once disposal.
//!
//! Random sequences of registrations, removals, adoptions and teardowns are
//! applied to a bin. Every task handed out carries its own counter, so after
//! a final double destroy each counter must read exactly one, regardless of
//! which path disposed it or how many bins it moved through.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use steward_bin::{Bin, Task};

#[derive(Debug, Clone)]
enum Op {
    Add { tag: Option<u8> },
    AddNamed { name: u8, tag: Option<u8> },
    RemoveId(u8),
    RemoveName(u8),
    RemoveTagged(u8),
    /// Fill a donor bin, optionally remove its first task, then adopt it.
    ExtendFrom { tags: Vec<Option<u8>>, remove_first: bool },
    /// Move everything the bin owns into a fresh sibling.
    ExtendInto,
    Destroy,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::option::of(0..3u8).prop_map(|tag| Op::Add { tag }),
        3 => (0..4u8, proptest::option::of(0..3u8)).prop_map(|(name, tag)| Op::AddNamed { name, tag }),
        2 => (0..16u8).prop_map(Op::RemoveId),
        2 => (0..4u8).prop_map(Op::RemoveName),
        2 => (0..3u8).prop_map(Op::RemoveTagged),
        2 => (prop::collection::vec(proptest::option::of(0..3u8), 0..4), any::<bool>())
            .prop_map(|(tags, remove_first)| Op::ExtendFrom { tags, remove_first }),
        1 => Just(Op::ExtendInto),
        1 => Just(Op::Destroy),
    ]
}

fn counted(counters: &mut Vec<Arc<AtomicUsize>>) -> Task {
    let counter = Arc::new(AtomicUsize::new(0));
    counters.push(Arc::clone(&counter));
    Task::callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every task is disposed exactly once, and a second destroy changes nothing.
    #[test]
    fn prop_every_task_disposed_exactly_once(ops in prop::collection::vec(arb_op(), 0..40)) {
        let bin = Bin::new();
        let mut siblings: Vec<Bin> = Vec::new();
        let mut counters = Vec::new();

        for op in ops {
            match op {
                Op::Add { tag } => {
                    let task = counted(&mut counters);
                    let _ = match tag {
                        Some(tag) => bin.add_tagged(task, format!("tag{tag}")),
                        None => bin.add(task),
                    };
                }
                Op::AddNamed { name, tag } => {
                    let task = counted(&mut counters);
                    let name = format!("name{name}");
                    let _ = match tag {
                        Some(tag) => bin.add_named_tagged(name, task, format!("tag{tag}")),
                        None => bin.add_named(name, task),
                    };
                }
                Op::RemoveId(id) => {
                    bin.remove(u64::from(id));
                }
                Op::RemoveName(name) => {
                    bin.remove(format!("name{name}"));
                }
                Op::RemoveTagged(tag) => {
                    bin.remove_tagged(&format!("tag{tag}"));
                }
                Op::ExtendFrom { tags, remove_first } => {
                    let donor = Bin::new();
                    for tag in tags {
                        let task = counted(&mut counters);
                        let _ = match tag {
                            Some(tag) => donor.add_tagged(task, format!("tag{tag}")),
                            None => donor.add(task),
                        };
                    }
                    if remove_first {
                        donor.remove(0u64);
                    }
                    bin.extend(&donor);
                    prop_assert!(donor.is_destroyed());
                    prop_assert_eq!(donor.task_count(), 0);
                }
                Op::ExtendInto => {
                    let sibling = Bin::new();
                    sibling.extend(&bin);
                    siblings.push(sibling);
                }
                Op::Destroy => bin.destroy(),
            }

            for counter in &counters {
                prop_assert!(counter.load(Ordering::SeqCst) <= 1);
            }
        }

        bin.destroy();
        for sibling in &siblings {
            sibling.destroy();
        }
        let after_first: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
        bin.destroy();
        for sibling in &siblings {
            sibling.destroy();
        }
        let after_second: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();

        prop_assert_eq!(&after_first, &after_second);
        prop_assert!(after_first.iter().all(|count| *count == 1));
        prop_assert_eq!(bin.task_count(), 0);
        prop_assert!(bin.tags().is_empty());
    }

    /// Nested bins are torn down exactly once, whichever side destroys first.
    #[test]
    fn prop_nested_bins_disposed_once(
        depth in 1..5usize,
        destroy_child_first in any::<bool>(),
    ) {
        let counter = Arc::new(AtomicUsize::new(0));
        let root = Bin::new();
        let mut chain = vec![root.clone()];
        for _ in 0..depth {
            let child = chain.last().expect("chain is never empty").child().expect("parent alive");
            chain.push(child);
        }
        let c = Arc::clone(&counter);
        chain
            .last()
            .expect("chain is never empty")
            .add(Task::callback(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("leaf alive");

        if destroy_child_first {
            chain.last().expect("chain is never empty").destroy();
        }
        root.destroy();
        for bin in &chain {
            bin.destroy();
            prop_assert!(bin.is_destroyed());
        }

        prop_assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
