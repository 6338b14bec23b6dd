// tests/graph_hierarchy.rs

use std::sync::{Arc, Mutex};

use missiongraph::errors::{PlanError, Result};
use missiongraph::graph::{MergeFn, Relation, RelationObserver, RelationSpace, VertexCapability};
use missiongraph::plan::{EventRelation, TaskRelation};

/// Small three-level family used to exercise the hierarchy on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Link {
    Order,
    Cause,
    Push,
    Pull,
}

impl Relation for Link {
    type Vertex = u32;
    type Info = u8;

    fn all() -> &'static [Self] {
        &[Link::Order, Link::Cause, Link::Push, Link::Pull]
    }

    fn name(self) -> &'static str {
        match self {
            Link::Order => "order",
            Link::Cause => "cause",
            Link::Push => "push",
            Link::Pull => "pull",
        }
    }

    fn superset(self) -> Option<Self> {
        match self {
            Link::Order => None,
            Link::Cause => Some(Link::Order),
            Link::Push | Link::Pull => Some(Link::Cause),
        }
    }

    fn is_dag(self) -> bool {
        self == Link::Order
    }

    fn merge_fn(self) -> MergeFn<u32, u8> {
        keep_max
    }
}

fn keep_max(_parent: &u32, _child: &u32, old: &u8, new: &u8) -> Result<u8> {
    Ok((*old).max(*new))
}

#[derive(Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
    refuse: Option<u32>,
    refuse_level: Option<Link>,
}

impl RelationObserver<Link> for Recorder {
    fn adding(&mut self, relation: Link, parent: u32, child: u32, _info: Option<&u8>) -> Result<()> {
        if self.refuse == Some(child) || self.refuse_level == Some(relation) {
            return Err(PlanError::Argument(format!("{child} refused")));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("adding {} {parent}->{child}", relation.name()));
        Ok(())
    }

    fn added(&mut self, relation: Link, parent: u32, child: u32, info: Option<&u8>) {
        let info = info.map_or_else(|| "-".to_string(), u8::to_string);
        self.log
            .lock()
            .unwrap()
            .push(format!("added {} {parent}->{child} {info}", relation.name()));
    }

    fn removed(&mut self, relation: Link, parent: u32, child: u32) {
        self.log
            .lock()
            .unwrap()
            .push(format!("removed {} {parent}->{child}", relation.name()));
    }
}

#[test]
fn edges_added_to_a_subset_reach_every_ancestor() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, None).unwrap();

    assert!(space.graph(Link::Push).has_edge(1, 2));
    assert!(space.graph(Link::Cause).has_edge(1, 2));
    assert!(space.graph(Link::Order).has_edge(1, 2));
    assert!(!space.graph(Link::Pull).has_edge(1, 2));
    space.verify_consistency().unwrap();
}

#[test]
fn edges_added_to_a_superset_stay_out_of_subsets() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Order, 1, 2, None).unwrap();
    assert!(!space.graph(Link::Cause).has_edge(1, 2));
    assert!(!space.graph(Link::Push).has_edge(1, 2));
}

#[test]
fn removal_cascades_down_and_up() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, None).unwrap();

    assert!(space.remove_relation(Link::Cause, 1, 2));
    for &kind in Link::all() {
        assert!(!space.graph(kind).has_edge(1, 2), "{kind:?} still holds the edge");
    }
    space.verify_consistency().unwrap();
}

#[test]
fn removal_keeps_ancestor_edges_another_subset_needs() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, None).unwrap();
    space.add_relation(Link::Pull, 1, 2, None).unwrap();

    assert!(space.remove_relation(Link::Push, 1, 2));
    assert!(!space.graph(Link::Push).has_edge(1, 2));
    assert!(space.graph(Link::Pull).has_edge(1, 2));
    assert!(space.graph(Link::Cause).has_edge(1, 2));
    assert!(space.graph(Link::Order).has_edge(1, 2));
    space.verify_consistency().unwrap();

    assert!(space.remove_relation(Link::Pull, 1, 2));
    assert!(!space.graph(Link::Order).has_edge(1, 2));
}

#[test]
fn cycles_are_refused_before_anything_is_committed() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, None).unwrap();
    space.add_relation(Link::Pull, 2, 3, None).unwrap();

    let err = space.add_relation(Link::Push, 3, 1, None).unwrap_err();
    assert!(matches!(err, PlanError::CycleFound(_)));
    for &kind in Link::all() {
        assert!(!space.graph(kind).has_edge(3, 1));
    }

    // Re-adding an existing edge is not a cycle.
    space.add_relation(Link::Push, 1, 2, None).unwrap();
    assert!(space.reachable(Link::Order, 1, 3));
}

#[test]
fn the_closure_forgets_removed_paths() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Order, 1, 2, None).unwrap();
    space.add_relation(Link::Order, 2, 3, None).unwrap();
    assert!(space.reachable(Link::Order, 1, 3));

    space.remove_relation(Link::Order, 2, 3);
    assert!(!space.reachable(Link::Order, 1, 3));
    // 3 -> 1 no longer closes a cycle.
    space.add_relation(Link::Order, 3, 1, None).unwrap();
}

#[test]
fn payloads_are_merged_per_level() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, Some(3)).unwrap();
    space.add_relation(Link::Push, 1, 2, Some(7)).unwrap();
    assert_eq!(space.graph(Link::Push).edge_info(1, 2).unwrap(), Some(&7));
    assert_eq!(space.graph(Link::Order).edge_info(1, 2).unwrap(), Some(&7));
}

#[test]
fn observers_see_every_level_and_can_refuse() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut space = RelationSpace::<Link>::new();
    space.add_observer(Box::new(Recorder {
        log: Arc::clone(&log),
        refuse: Some(9),
        ..Recorder::default()
    }));

    space.add_relation(Link::Cause, 1, 2, None).unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "adding cause 1->2",
            "added cause 1->2 -",
            "adding order 1->2",
            "added order 1->2 -",
        ]
    );

    log.lock().unwrap().clear();
    assert!(space.add_relation(Link::Push, 1, 9, None).is_err());
    assert!(!space.graph(Link::Order).has_edge(1, 9));
    assert!(log.lock().unwrap().iter().all(|l| !l.starts_with("added")));

    log.lock().unwrap().clear();
    space.remove_relation(Link::Order, 1, 2);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["removed cause 1->2", "removed order 1->2"]
    );
}

#[test]
fn added_hooks_see_the_payload_stored_at_each_level() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Order, 1, 2, Some(9)).unwrap();
    space.add_observer(Box::new(Recorder {
        log: Arc::clone(&log),
        ..Recorder::default()
    }));

    space.add_relation(Link::Cause, 1, 2, Some(4)).unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "adding cause 1->2",
            "added cause 1->2 4",
            "adding order 1->2",
            "added order 1->2 9",
        ]
    );
}

#[test]
fn refusal_at_an_outer_level_reverts_inner_ones() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Cause, 1, 3, Some(5)).unwrap();
    space.add_observer(Box::new(Recorder {
        log: Arc::clone(&log),
        refuse_level: Some(Link::Order),
        ..Recorder::default()
    }));

    let err = space.add_relation(Link::Push, 1, 2, Some(1)).unwrap_err();
    assert!(matches!(err, PlanError::Argument(_)));
    for level in Link::all() {
        assert!(!space.graph(*level).has_edge(1, 2), "{}", level.name());
    }
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "adding push 1->2",
            "added push 1->2 1",
            "adding cause 1->2",
            "added cause 1->2 1",
            "removed cause 1->2",
            "removed push 1->2",
        ]
    );

    log.lock().unwrap().clear();
    assert!(space.add_relation(Link::Push, 1, 3, Some(8)).is_err());
    assert_eq!(space.graph(Link::Cause).edge_info(1, 3).unwrap(), Some(&5));
    assert!(!space.graph(Link::Push).has_edge(1, 3));
    space.verify_consistency().unwrap();
}

#[test]
fn declare_subset_rules() {
    let mut space = RelationSpace::<TaskRelation>::new();
    space
        .declare_subset(TaskRelation::Dependency, TaskRelation::PlannedBy)
        .unwrap();
    assert_eq!(space.superset_of(TaskRelation::PlannedBy), Some(TaskRelation::Dependency));

    // Would close a loop in the hierarchy.
    assert!(space
        .declare_subset(TaskRelation::PlannedBy, TaskRelation::Dependency)
        .is_err());

    space
        .add_relation(TaskRelation::ExecutionAgent, missiongraph::TaskId(1), missiongraph::TaskId(2), None)
        .unwrap();
    assert!(space
        .declare_subset(TaskRelation::Dependency, TaskRelation::ExecutionAgent)
        .is_err(), "non-empty graphs cannot be re-parented");
}

#[test]
fn replace_vertex_moves_edges_in_every_graph() {
    let mut space = RelationSpace::<Link>::new();
    space.add_relation(Link::Push, 1, 2, None).unwrap();
    space.add_relation(Link::Order, 2, 3, None).unwrap();

    space.replace_vertex(2, 20).unwrap();
    assert!(space.graph(Link::Push).has_edge(1, 20));
    assert!(space.graph(Link::Order).has_edge(1, 20));
    assert!(space.graph(Link::Order).has_edge(20, 3));
    assert!(space.graphs_of(2).is_empty());
    assert!(space.reachable(Link::Order, 1, 3));
    space.verify_consistency().unwrap();
}

#[test]
fn event_relations_nest_signals_and_forwardings() {
    use missiongraph::plan::EventId;

    let mut space = RelationSpace::<EventRelation>::new();
    space
        .add_relation(EventRelation::Signal, EventId(1), EventId(2), None)
        .unwrap();
    assert_eq!(
        space.graphs_of(EventId(1)),
        vec![EventRelation::Precedence, EventRelation::CausalLink, EventRelation::Signal]
    );
    assert_eq!(
        VertexCapability::children_of(&space, EventRelation::Precedence, EventId(1)),
        vec![EventId(2)]
    );
}
