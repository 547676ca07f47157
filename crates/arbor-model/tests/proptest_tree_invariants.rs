//! Property-based invariant tests for the flattened addressing scheme.
//!
//! 1. A node's size equals `2 + sum(children)` unless it is a leaf or text.
//! 2. `descendants` visits nodes in strictly increasing position order.
//! 3. Every visited range lies inside the root's content.
//! 4. JSON round-trips preserve structure and sizes.

use arbor_model::Node;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(Node::text),
        (0u32..50).prop_map(|n| Node::new("atom").with_attr("id", format!("a{n}"))),
    ]
}

fn tree() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(4, 48, 5, |inner| {
        proptest::collection::vec(inner, 1..5)
            .prop_map(|children| Node::new("block").with_children(children))
    })
}

fn doc() -> impl Strategy<Value = Node> {
    proptest::collection::vec(tree(), 0..6).prop_map(|children| {
        if children.is_empty() {
            Node::new("doc")
        } else {
            Node::new("doc").with_children(children)
        }
    })
}

fn expected_size(node: &Node) -> usize {
    if let Some(text) = node.text_content() {
        text.chars().count()
    } else if node.children().is_empty() {
        1
    } else {
        2 + node.children().iter().map(|c| expected_size(c)).sum::<usize>()
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Invariants
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cached_size_matches_structure(doc in doc()) {
        prop_assert_eq!(doc.node_size(), expected_size(&doc));
    }

    #[test]
    fn descendants_positions_increase(doc in doc()) {
        let mut last: Option<usize> = None;
        let mut ok = true;
        doc.descendants(|_, pos| {
            if let Some(prev) = last
                && pos <= prev
            {
                ok = false;
            }
            last = Some(pos);
        });
        prop_assert!(ok, "positions must strictly increase");
    }

    #[test]
    fn ranges_stay_inside_root_content(doc in doc()) {
        let limit = doc.content_size();
        let mut violations = Vec::new();
        doc.descendants(|node, pos| {
            if pos + node.node_size() > limit {
                violations.push((pos, node.node_size()));
            }
        });
        prop_assert!(violations.is_empty(), "out of bounds: {:?}", violations);
    }

    #[test]
    fn json_round_trip(doc in doc()) {
        let back = Node::from_json(doc.to_json()).unwrap();
        prop_assert_eq!(back.node_size(), doc.node_size());
        prop_assert_eq!(back, doc);
    }
}
