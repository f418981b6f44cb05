/// Property tests for B-tree insert invariants.
///
/// Runs randomized insert workloads and verifies structural invariants:
/// - Sorted scan order, with every inserted key reachable
/// - Each routing key equals the max key of its child subtree
/// - Parent pointers match the actual tree shape
/// - Equal depth for all leaf paths
/// - Only the root may be an empty leaf
use pagedb::btree::node::*;
use pagedb::storage::page::PageNum;
use pagedb::{PageDbError, Row, Table, TableConfig};
use std::collections::BTreeSet;
use tempfile::TempDir;

/// Simple deterministic PRNG (xorshift64) for reproducible tests without
/// requiring the rand crate in test scope.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
    fn next_range(&mut self, max: u64) -> u64 {
        self.next() % max
    }
}

fn row(id: u32) -> Row {
    Row::new(id, format!("u{}", id), format!("{}@example.com", id)).unwrap()
}

// ── Invariant checkers ──

/// Recursively verify the subtree at `page_num`. Returns (leaf depth, max key).
fn verify_subtree(
    table: &mut Table,
    page_num: PageNum,
    expected_parent: Option<PageNum>,
    lower_bound: Option<u32>,
    depth: usize,
) -> (usize, Option<u32>) {
    assert!(depth <= 64, "tree depth exceeds 64, possible corruption");
    let page = table.page(page_num).unwrap().clone();

    match expected_parent {
        Some(p) => {
            assert_eq!(parent(&page), p, "parent pointer of page {}", page_num);
            assert!(!is_root(&page), "non-root page {} flagged as root", page_num);
        }
        None => assert!(is_root(&page), "root page {} not flagged", page_num),
    }

    match node_type(&page).expect("page should have valid node type") {
        NodeType::Leaf => {
            let keys: Vec<u32> = (0..leaf_num_cells(&page)).map(|i| leaf_key(&page, i)).collect();
            if expected_parent.is_some() {
                assert!(!keys.is_empty(), "empty non-root leaf {}", page_num);
            }
            for w in keys.windows(2) {
                assert!(w[0] < w[1], "leaf keys not sorted at page {}", page_num);
            }
            if let (Some(lo), Some(&first)) = (lower_bound, keys.first()) {
                assert!(first > lo, "leaf {} starts at {} below bound {}", page_num, first, lo);
            }
            (depth, keys.last().copied())
        }
        NodeType::Internal => {
            let keys = internal_keys(&page);
            let children = internal_children(&page).unwrap();
            assert!(!keys.is_empty(), "internal node {} has no keys", page_num);
            for w in keys.windows(2) {
                assert!(w[0] < w[1], "internal keys not sorted at page {}", page_num);
            }

            let mut leaf_depth = None;
            let mut max = None;
            for (i, &child) in children.iter().enumerate() {
                let lo = if i == 0 { lower_bound } else { Some(keys[i - 1]) };
                let (d, child_max) = verify_subtree(table, child, Some(page_num), lo, depth + 1);
                if let Some(&key) = keys.get(i) {
                    assert_eq!(child_max, Some(key), "routing key {} of page {}", i, page_num);
                }
                assert_eq!(*leaf_depth.get_or_insert(d), d, "unequal leaf depths at page {}", page_num);
                max = child_max;
            }
            (leaf_depth.unwrap_or(depth), max)
        }
    }
}

fn assert_tree_invariants(table: &mut Table, expected: &BTreeSet<u32>) {
    let root = table.root_page_num();
    verify_subtree(table, root, None, None, 0);

    let scanned: Vec<u32> = table.rows().unwrap().iter().map(|r| r.id).collect();
    let wanted: Vec<u32> = expected.iter().copied().collect();
    assert_eq!(scanned, wanted);

    for &k in expected {
        assert_eq!(table.get(k).unwrap(), Some(row(k)), "key {} not reachable", k);
    }
}

// ── Property tests ──

/// Random inserts with the full internal fan-out.
#[test]
fn test_property_random_inserts_default_fanout() {
    let dir = TempDir::new().unwrap();
    let config = TableConfig::new(dir.path().join("p.db")).with_max_pages(100);
    let mut table = Table::open(config).unwrap();
    let mut rng = Rng::new(12345);
    let mut expected = BTreeSet::new();

    for _ in 0..300 {
        let k = rng.next_range(10000) as u32 + 1;
        match table.insert(&row(k)) {
            Ok(()) => assert!(expected.insert(k)),
            Err(PageDbError::DuplicateKey(d)) => {
                assert_eq!(d, k);
                assert!(expected.contains(&k));
            }
            Err(e) => panic!("unexpected error inserting {}: {}", k, e),
        }
    }

    assert_tree_invariants(&mut table, &expected);
}

/// Small fan-out forces repeated internal splits and a deep tree.
#[test]
fn test_property_random_inserts_deep_tree() {
    for seed in [1u64, 42, 67890] {
        let dir = TempDir::new().unwrap();
        let config = TableConfig::new(dir.path().join("p.db"))
            .with_max_pages(500)
            .with_internal_max_keys(3);
        let mut table = Table::open(config).unwrap();
        let mut rng = Rng::new(seed);
        let mut expected = BTreeSet::new();

        for _ in 0..500 {
            let k = rng.next_range(5000) as u32 + 1;
            if table.insert(&row(k)).is_ok() {
                expected.insert(k);
            }
        }

        assert_tree_invariants(&mut table, &expected);
    }
}

/// Inserts past the page ceiling are rejected and leave a valid tree.
#[test]
fn test_property_capacity_limit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("p.db");
    let config = TableConfig::new(&path)
        .with_max_pages(12)
        .with_internal_max_keys(2);
    let mut expected = BTreeSet::new();

    {
        let mut table = Table::open(config.clone()).unwrap();
        let mut rng = Rng::new(777);
        let mut rejected = 0;
        for _ in 0..400 {
            let k = rng.next_range(1000) as u32 + 1;
            match table.insert(&row(k)) {
                Ok(()) => {
                    expected.insert(k);
                }
                Err(PageDbError::DuplicateKey(_)) => {}
                Err(PageDbError::CapacityExceeded { max_pages }) => {
                    assert_eq!(max_pages, 12);
                    rejected += 1;
                }
                Err(e) => panic!("unexpected error inserting {}: {}", k, e),
            }
            assert!(table.num_pages() <= 12);
        }
        assert!(rejected > 0);
        assert_tree_invariants(&mut table, &expected);
        table.close().unwrap();
    }

    let mut table = Table::open(config).unwrap();
    assert_tree_invariants(&mut table, &expected);
}
