use toposhift::{Node, ReliabilityLevel, SeedNodeSelector, SelectionError};

fn node(domain: usize) -> Node {
    Node::new(
        format!("n{domain}"),
        format!("10.0.0.{domain}"),
        format!("fd:/dc{domain}"),
        format!("ud{domain}"),
        "primary",
    )
}

fn names(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn disabled_seed_is_replaced_by_the_joining_node() {
    let existing = vec![node(1).as_seed(), node(2).as_seed(), node(3).as_seed()];
    let candidates = vec![node(1), node(3), node(4), node(5), node(6)];
    let delta = SeedNodeSelector::new()
        .prefer_nodes(["n6"])
        .try_update(ReliabilityLevel::Bronze, &existing, &candidates, 5, 5)
        .unwrap();
    assert_eq!(names(&delta.added), vec!["n6"]);
    assert_eq!(names(&delta.removed), vec!["n2"]);
    assert_eq!(delta.target_seed_count, 3);
    assert_eq!(
        delta.resulting_seeds(&existing).into_iter().collect::<Vec<_>>(),
        vec!["n1", "n3", "n6"]
    );
}

#[test]
fn without_preference_ties_break_by_name() {
    let existing = vec![node(1).as_seed(), node(2).as_seed(), node(3).as_seed()];
    let candidates = vec![node(1), node(3), node(4), node(5), node(6)];
    let delta = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Bronze, &existing, &candidates, 5, 5)
        .unwrap();
    assert_eq!(names(&delta.added), vec!["n4"]);
}

#[test]
fn disabled_candidates_are_ignored() {
    let candidates = vec![node(1), node(2).disabled(), node(3), node(4)];
    let delta = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Bronze, &[], &candidates, 4, 4)
        .unwrap();
    assert_eq!(names(&delta.added), vec!["n1", "n3", "n4"]);
}

#[test]
fn single_domain_topology_bypasses_spread() {
    let candidates: Vec<Node> = (1..=5)
        .map(|idx| {
            Node::new(
                format!("n{idx}"),
                "127.0.0.1",
                "fd:/0",
                "0",
                "primary",
            )
        })
        .collect();
    let delta = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Silver, &[], &candidates, 1, 1)
        .unwrap();
    assert_eq!(delta.added.len(), 5);

    let small = &candidates[..2];
    let delta = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Bronze, &[], small, 1, 1)
        .unwrap();
    assert_eq!(delta.target_seed_count, 2);
}

#[test]
fn growing_reliability_fills_new_domains_first() {
    let existing = vec![node(1).as_seed(), node(2).as_seed(), node(3).as_seed()];
    let mut candidates: Vec<Node> = (1..=7).map(node).collect();
    candidates.push(Node::new("n1b", "10.0.1.1", "fd:/dc1", "ud1", "primary"));
    let delta = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Silver, &existing, &candidates, 7, 7)
        .unwrap();
    assert_eq!(names(&delta.added), vec!["n4", "n5"]);
    assert!(delta.removed.is_empty());
}

#[test]
fn zero_domain_counts_are_rejected() {
    let err = SeedNodeSelector::new()
        .try_update(ReliabilityLevel::Bronze, &[], &[node(1)], 0, 1)
        .unwrap_err();
    assert_eq!(
        err,
        SelectionError::InvalidDomainCounts {
            fault_domains: 0,
            upgrade_domains: 1
        }
    );
}
