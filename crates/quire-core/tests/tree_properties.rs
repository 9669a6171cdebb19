//! Property tests for the tree materializer against randomly shaped forests.

use proptest::prelude::*;
use proptest::sample::Index;
use quire_core::db;
use quire_core::error::BlockError;
use quire_core::ids::SequentialIds;
use quire_core::model::{BlockId, BlockPatch, BlockType, NewBlock};
use quire_core::repository::BlockRepository;
use quire_core::tree::{BlockNode, TraversalStrategy, TreeMaterializer, TreeOptions};
use rusqlite::{Connection, params};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Node `i > 0` hangs under node `parent.index(i)`; `deleted` soft-deletes it.
#[derive(Debug, Clone)]
struct Shape {
    nodes: Vec<(Index, bool)>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec((any::<Index>(), prop::bool::weighted(0.2)), 0..40)
        .prop_map(|nodes| Shape { nodes })
}

struct Built {
    conn: Connection,
    ids: Vec<BlockId>,
    /// Expected depth of every live block reachable from the root.
    expected_depth: HashMap<BlockId, u32>,
    root: BlockId,
}

fn build(shape: &Shape) -> Built {
    let conn = db::open_in_memory().expect("open store");
    let repo = BlockRepository::new(&conn).with_ids(Arc::new(SequentialIds::default()));

    let root = repo
        .create("ana", NewBlock::new(BlockType::Page, "ws"))
        .expect("root")
        .block
        .id;
    let mut ids = vec![root];
    let mut parents = vec![None];
    for (i, (parent, _)) in shape.nodes.iter().enumerate() {
        let parent_idx = parent.index(i + 1);
        let id = repo
            .create(
                "ana",
                NewBlock::new(BlockType::Text, "ws")
                    .with_parent(ids[parent_idx])
                    .with_content(json!({"n": i})),
            )
            .expect("child")
            .block
            .id;
        ids.push(id);
        parents.push(Some(parent_idx));
    }

    let mut deleted = vec![false];
    for (i, (_, delete)) in shape.nodes.iter().enumerate() {
        if *delete {
            repo.soft_delete("ana", ids[i + 1]).expect("delete");
        }
        deleted.push(*delete);
    }

    let mut depth_of: Vec<Option<u32>> = vec![Some(0)];
    for i in 1..ids.len() {
        let depth = parents[i]
            .and_then(|p| depth_of[p])
            .filter(|_| !deleted[i])
            .map(|d| d + 1);
        depth_of.push(depth);
    }
    let expected_depth = ids
        .iter()
        .zip(&depth_of)
        .filter_map(|(id, depth)| depth.map(|d| (*id, d)))
        .collect();

    Built {
        conn,
        ids,
        expected_depth,
        root,
    }
}

fn materialize(
    conn: &Connection,
    root: BlockId,
    strategy: TraversalStrategy,
    max_depth: u32,
) -> Result<BlockNode, BlockError> {
    TreeMaterializer::new(conn)
        .with_options(TreeOptions {
            max_depth,
            strategy,
        })
        .materialize(root)
}

fn check_edges(node: &BlockNode) {
    for child in &node.children {
        assert_eq!(child.block.parent_id, Some(node.block.id));
        assert_eq!(child.depth, node.depth + 1);
        assert!(!child.block.is_deleted);
        check_edges(child);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_tree_covers_exactly_the_live_reachable_blocks(shape in arb_shape()) {
        let built = build(&shape);
        let tree = materialize(&built.conn, built.root, TraversalStrategy::BreadthFirst, 256)
            .expect("materialize");

        prop_assert_eq!(tree.node_count(), built.expected_depth.len());
        check_edges(&tree);

        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            prop_assert_eq!(built.expected_depth.get(&node.block.id), Some(&node.depth));
            stack.extend(node.children.iter());
        }
    }

    #[test]
    fn prop_strategies_produce_identical_trees(shape in arb_shape()) {
        let built = build(&shape);
        let bfs = materialize(&built.conn, built.root, TraversalStrategy::BreadthFirst, 256)
            .expect("breadth first");
        let cte = materialize(&built.conn, built.root, TraversalStrategy::RecursiveQuery, 256)
            .expect("recursive query");
        prop_assert_eq!(bfs, cte);
    }

    #[test]
    fn prop_depth_cap_is_exact(shape in arb_shape(), slack in 0u32..3) {
        let built = build(&shape);
        let deepest = built.expected_depth.values().copied().max().unwrap_or(0);

        for strategy in [TraversalStrategy::BreadthFirst, TraversalStrategy::RecursiveQuery] {
            let fits = materialize(&built.conn, built.root, strategy, deepest + slack);
            prop_assert!(fits.is_ok());
            if deepest > 0 {
                let capped = materialize(&built.conn, built.root, strategy, deepest - 1);
                let exceeded = matches!(capped, Err(BlockError::DepthLimitExceeded { .. }));
                prop_assert!(exceeded);
            }
        }
    }

    #[test]
    fn prop_siblings_keep_creation_order(shape in arb_shape()) {
        let built = build(&shape);
        let tree = materialize(&built.conn, built.root, TraversalStrategy::RecursiveQuery, 256)
            .expect("materialize");

        let position: HashMap<_, _> = built.ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            let order: Vec<_> = node.children.iter().map(|c| position[&c.block.id]).collect();
            let mut sorted = order.clone();
            sorted.sort_unstable();
            prop_assert_eq!(order, sorted);
            stack.extend(node.children.iter());
        }
    }
}

#[test]
fn three_level_scenario_nests_as_expected() {
    let conn = db::open_in_memory().expect("open store");
    let repo = BlockRepository::new(&conn);
    let r = repo
        .create(
            "ana",
            NewBlock::new(BlockType::Page, "ws").with_content(json!({"title": "Home"})),
        )
        .expect("R")
        .block
        .id;
    let c1 = repo
        .create("ana", NewBlock::new(BlockType::Text, "ws").with_parent(r))
        .expect("C1")
        .block
        .id;
    let c2 = repo
        .create("ana", NewBlock::new(BlockType::Text, "ws").with_parent(c1))
        .expect("C2")
        .block
        .id;

    let tree = TreeMaterializer::new(&conn).materialize(r).expect("tree");
    assert_eq!(tree.block.id, r);
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].block.id, c1);
    assert_eq!(tree.children[0].children.len(), 1);
    assert_eq!(tree.children[0].children[0].block.id, c2);
    assert!(tree.children[0].children[0].children.is_empty());

    let rendered = serde_json::to_value(&tree).expect("serialize");
    assert_eq!(rendered["id"], json!(r.to_string()));
    assert_eq!(rendered["type"], json!("page"));
    assert_eq!(rendered["children"][0]["children"][0]["id"], json!(c2.to_string()));
}

#[test]
fn out_of_band_cycle_surfaces_as_depth_limit() {
    let conn = db::open_in_memory().expect("open store");
    let repo = BlockRepository::new(&conn);
    let a = repo
        .create("ana", NewBlock::new(BlockType::Page, "ws"))
        .expect("a")
        .block
        .id;
    let b = repo
        .create("ana", NewBlock::new(BlockType::Text, "ws").with_parent(a))
        .expect("b")
        .block
        .id;

    let err = repo
        .update("ana", a, BlockPatch::default().parent(Some(b)))
        .expect_err("repository refuses cycles");
    assert!(matches!(err, BlockError::InvalidInput(_)));

    conn.execute(
        "UPDATE blocks SET parent_id = ?1 WHERE id = ?2",
        params![b.to_string(), a.to_string()],
    )
    .expect("write cycle directly");

    for strategy in [TraversalStrategy::BreadthFirst, TraversalStrategy::RecursiveQuery] {
        let result = materialize(&conn, a, strategy, 32);
        assert!(matches!(
            result,
            Err(BlockError::DepthLimitExceeded { limit: 32, .. })
        ));
    }
}
