//! Provenance graph behaviour: first-level admission, tag branches,
//! re-parenting, Dockerfile bases, removal scoping, and orphan retry.

use containertree_core::error::ErrorCode;
use containertree_core::{Node, PathOptions, ProvenanceError, ProvenanceGraph};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn names<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<&'a str> {
    nodes.into_iter().map(Node::name).collect()
}

/// debian -> miniconda3 -> {containertree, singularity-cli}
fn conda_family() -> ProvenanceGraph {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("continuumio/miniconda3", "library/debian", None), Ok(true));
    assert_eq!(
        tree.update("singularityhub/containertree", "continuumio/miniconda3", None),
        Ok(true)
    );
    assert_eq!(
        tree.update("singularityhub/singularity-cli", "continuumio/miniconda3", None),
        Ok(true)
    );
    tree
}

// ---------------------------------------------------------------------------
// Creation and first-level admission
// ---------------------------------------------------------------------------

#[test]
fn root_is_scratch() {
    let tree = ProvenanceGraph::new();
    assert_eq!(tree.root().name(), "scratch");
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 1);
}

#[test]
fn non_library_base_is_orphaned_by_default() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("vanessa/salad", "vanessa/sregistry", None), Ok(false));
    assert!(!tree.root().has_children());
    assert!(tree.find("vanessa/salad").is_none());
    assert_eq!(tree.pending().len(), 1);
}

#[test]
fn scratch_image_places_base_under_root() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("scratch", "library/ubuntu", None), Ok(true));
    let children: Vec<&Node> = tree.root().children().collect();
    assert_eq!(children.len(), 1);
    assert!(children[0].is_multi());
    assert_eq!(children[0].label(), "library/ubuntu");
}

#[test]
fn from_scratch_base_places_image_under_root() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("vanessa/busybox", "scratch", Some("c1")), Ok(true));
    let busybox = tree.find("vanessa/busybox").expect("busybox");
    assert!(busybox.has_tag("c1"));
    assert_eq!(tree.index_path("vanessa/busybox").as_deref(), Some("scratch|vanessa/busybox"));

    // A second observation only counts.
    assert_eq!(tree.update("vanessa/busybox", "scratch", None), Ok(true));
    assert_eq!(tree.get_count("vanessa/busybox"), 2);
    assert_eq!(tree.root().children().count(), 1);
}

#[test]
fn disabled_filter_admits_any_namespace() {
    let mut tree = ProvenanceGraph::with_first_level("");
    assert_eq!(tree.update("vanessa/salad", "vanessa/sregistry", None), Ok(true));

    let sregistry = tree.root().children().next().expect("first child");
    assert_eq!(sregistry.name(), "vanessa/sregistry");
    assert!(sregistry.has_branch("latest"));
    let salad = &sregistry.branch("latest").expect("latest")[0];
    assert_eq!(salad.name(), "vanessa/salad");
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[test]
fn children_are_filed_under_base_tag() {
    let tree = conda_family();
    let debian = tree.root().children().next().expect("debian");
    assert_eq!(debian.name(), "library/debian");
    let conda = &debian.branch("latest").expect("latest")[0];
    assert_eq!(conda.branch("latest").map(<[Node]>::len), Some(2));
    assert!(!debian.is_leaf());
    assert!(!conda.is_leaf());
    assert!(tree.find("singularityhub/containertree").expect("leaf").is_leaf());
}

#[test]
fn trace_is_root_first() {
    let tree = conda_family();
    let trace = tree.trace("continuumio/miniconda3").expect("trace");
    assert_eq!(names(trace), ["scratch", "library/debian", "continuumio/miniconda3"]);
    assert!(tree.trace("blark/blark").is_none());
}

#[test]
fn own_tag_creates_branch_and_children_follow_base_tag() {
    let mut tree = conda_family();
    assert_eq!(tree.update("continuumio/miniconda3:1.0", "library/debian", None), Ok(true));
    let conda = tree.find("continuumio/miniconda3").expect("conda");
    assert!(conda.has_branch("1.0"));
    // Created once, reached twice as a base, observed once more as an image.
    assert_eq!(conda.counter(), 4);

    assert_eq!(tree.update("childof/miniconda3", "continuumio/miniconda3:1.0", None), Ok(true));
    let conda = tree.find("continuumio/miniconda3").expect("conda");
    let branch = conda.branch("1.0").expect("1.0");
    assert_eq!(branch.len(), 1);
    assert_eq!(branch[0].name(), "childof/miniconda3");
    assert_eq!(
        tree.index_path("childof/miniconda3").as_deref(),
        Some("scratch|library/debian|latest|continuumio/miniconda3|1.0|childof/miniconda3")
    );
}

#[test]
fn container_tag_lands_on_image_only() {
    let mut tree = ProvenanceGraph::new();
    tree.update("continuumio/miniconda3", "library/debian", Some("sha256:abc"))
        .expect("update");
    assert!(tree.find("continuumio/miniconda3").expect("conda").has_tag("sha256:abc"));
    assert!(!tree.find("library/debian").expect("debian").has_tag("sha256:abc"));
}

#[test]
fn find_accepts_full_references() {
    let tree = conda_family();
    assert_eq!(
        tree.find("continuumio/miniconda3:latest").map(Node::label),
        Some("continuumio/miniconda3")
    );
    assert_eq!(tree.find("debian").map(Node::label), Some("library/debian"));
    assert_eq!(tree.find("scratch").map(Node::label), Some("scratch"));
}

// ---------------------------------------------------------------------------
// Dockerfiles and rejected pairs
// ---------------------------------------------------------------------------

#[test]
fn dockerfile_is_only_valid_as_base() {
    let mut tree = ProvenanceGraph::new();
    let dockerfile = fixture("Dockerfile");

    let err = tree.update(&dockerfile, "library/ubuntu", None).expect_err("image");
    assert!(matches!(err, ProvenanceError::DockerfileImage(_)));
    assert_eq!(err.code(), ErrorCode::InvalidPairing);
    assert!(tree.is_empty());

    assert_eq!(tree.update("vanessa/sneeze", &dockerfile, None), Ok(true));
    let golang = tree.find("library/golang").expect("golang");
    assert_eq!(golang.branch_tags(), ["1.11.3-stretch"]);
}

#[test]
fn multi_stage_dockerfile_is_rejected() {
    let mut tree = ProvenanceGraph::new();
    let err = tree
        .update("vanessa/app", &fixture("multistage.Dockerfile"), None)
        .expect_err("multi-stage");
    assert!(matches!(err, ProvenanceError::MultiStage { ref stage, .. } if stage == "builder"));
    assert!(tree.is_empty());
}

#[test]
fn missing_dockerfile_is_reported() {
    let mut tree = ProvenanceGraph::new();
    let err = tree
        .update("vanessa/app", &fixture("nope/Dockerfile"), None)
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::InputUnavailable);
}

#[test]
fn templated_and_malformed_references_are_rejected() {
    let mut tree = ProvenanceGraph::with_first_level("");
    for (image, base) in [
        ("vanessa/app", "${BASE_IMAGE}"),
        ("vanessa/app", "library/python:{{ version }}"),
        ("Vanessa/App", "library/debian"),
        ("", "library/debian"),
    ] {
        let err = tree.update(image, base, None).expect_err("rejected");
        assert_eq!(err.code(), ErrorCode::UnparseableReference, "{image} <- {base}");
    }
    assert!(tree.is_empty());
    assert!(tree.pending().is_empty());
}

#[test]
fn self_reference_is_rejected() {
    let mut tree = ProvenanceGraph::new();
    let err = tree
        .update("library/python:3", "library/python:3-slim", None)
        .expect_err("self");
    assert!(matches!(err, ProvenanceError::SelfReference(_)));
}

#[test]
fn cycles_are_rejected_without_mutation() {
    let mut tree = conda_family();
    let before = tree.get_paths();

    let err = tree
        .update("library/debian", "singularityhub/containertree", None)
        .expect_err("cycle");
    assert!(matches!(err, ProvenanceError::Cycle { .. }));
    assert_eq!(err.code(), ErrorCode::CycleDetected);
    assert_eq!(tree.get_paths(), before);
}

// ---------------------------------------------------------------------------
// Re-parenting
// ---------------------------------------------------------------------------

#[test]
fn reparenting_moves_image_and_leaves_empty_branch() {
    let mut tree = ProvenanceGraph::new();
    let dockerfile = fixture("Dockerfile");
    tree.update("vanessa/sneeze", &dockerfile, None).expect("golang");
    tree.update("vanessa/sneeze", "library/ubuntu", None).expect("ubuntu");

    let golang = tree.find("library/golang").expect("golang");
    assert_eq!(golang.branch("1.11.3-stretch").map(<[Node]>::len), Some(0));

    let ubuntu = tree.find("library/ubuntu").expect("ubuntu");
    let under_ubuntu = ubuntu.branch("latest").expect("latest");
    assert_eq!(under_ubuntu[0].label(), "vanessa/sneeze");

    assert_eq!(
        tree.index_path("vanessa/sneeze").as_deref(),
        Some("scratch|library/ubuntu|latest|vanessa/sneeze")
    );
    assert_eq!(tree.get_count("vanessa/sneeze"), 2);
    assert_eq!(tree.nodes().filter(|n| n.label() == "vanessa/sneeze").count(), 1);
}

#[test]
fn reparenting_carries_descendants_and_reindexes_them() {
    let mut tree = conda_family();
    tree.update("continuumio/miniconda3", "library/ubuntu:18.04", None)
        .expect("move");

    let trace = tree.trace("singularityhub/singularity-cli").expect("trace");
    assert_eq!(
        names(trace),
        [
            "scratch",
            "library/ubuntu",
            "continuumio/miniconda3",
            "singularityhub/singularity-cli"
        ]
    );
    assert_eq!(
        tree.index_path("singularityhub/containertree").as_deref(),
        Some("scratch|library/ubuntu|18.04|continuumio/miniconda3|latest|singularityhub/containertree")
    );
    let debian = tree.find("library/debian").expect("debian");
    assert_eq!(debian.branch("latest").map(<[Node]>::len), Some(0));
}

// ---------------------------------------------------------------------------
// Orphans
// ---------------------------------------------------------------------------

#[test]
fn orphans_attach_once_their_base_arrives() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("vanessa/salad", "vanessa/sregistry", Some("c1")), Ok(false));
    assert_eq!(tree.update("vanessa/salad", "vanessa/sregistry", Some("c1")), Ok(false));
    assert_eq!(tree.pending().len(), 1);
    assert_eq!(tree.retry_orphans(), 0);
    assert_eq!(tree.pending().len(), 1);

    assert_eq!(tree.update("vanessa/sregistry", "library/python", None), Ok(true));
    assert_eq!(tree.retry_orphans(), 1);
    assert!(tree.pending().is_empty());

    let trace = tree.trace("vanessa/salad").expect("attached");
    assert_eq!(names(trace), ["scratch", "library/python", "vanessa/sregistry", "vanessa/salad"]);
    assert!(tree.find("vanessa/salad").expect("salad").has_tag("c1"));
}

#[test]
fn direct_success_clears_pending_entry() {
    let mut tree = ProvenanceGraph::new();
    tree.update("vanessa/salad", "vanessa/sregistry", None).expect("orphan");
    tree.update("vanessa/sregistry", "library/python", None).expect("base");
    assert_eq!(tree.update("vanessa/salad", "vanessa/sregistry", None), Ok(true));
    assert!(tree.pending().is_empty());
    assert_eq!(tree.retry_orphans(), 0);
    assert_eq!(tree.get_count("vanessa/salad"), 1);
}

#[test]
fn newer_parent_supersedes_pending_orphan() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("vanessa/app", "vanessa/base", None), Ok(false));
    assert_eq!(tree.update("vanessa/app", "library/debian", None), Ok(true));
    assert!(tree.pending().is_empty());

    assert_eq!(tree.update("vanessa/base", "library/ubuntu", None), Ok(true));
    assert_eq!(tree.retry_orphans(), 0);
    assert_eq!(
        tree.index_path("vanessa/app").as_deref(),
        Some("scratch|library/debian|latest|vanessa/app")
    );
}

#[test]
fn scratch_parent_supersedes_pending_orphan() {
    let mut tree = ProvenanceGraph::new();
    assert_eq!(tree.update("vanessa/app", "vanessa/base", None), Ok(false));
    assert_eq!(tree.update("vanessa/app", "scratch", None), Ok(true));
    assert!(tree.pending().is_empty());
    assert_eq!(tree.index_path("vanessa/app").as_deref(), Some("scratch|vanessa/app"));
}

// ---------------------------------------------------------------------------
// Queries and removal
// ---------------------------------------------------------------------------

fn query_tree() -> ProvenanceGraph {
    let mut tree = ProvenanceGraph::new();
    tree.update("continuumio/miniconda3", "library/debian", None).expect("a");
    tree.update("singularityhub/containertree", "continuumio/miniconda3", None)
        .expect("b");
    tree.update("singularityhub/singularity-cli", "continuumio/miniconda3:1.0", None)
        .expect("c");
    tree
}

#[test]
fn iteration_and_search() {
    let tree = query_tree();
    let conda = tree.find("continuumio/miniconda3").expect("conda");
    assert!(conda.has_branch("latest"));
    assert!(conda.has_branch("1.0"));

    assert_eq!((&tree).into_iter().count(), 4);
    assert_eq!(tree.get_nodes().len(), 4);
    assert_eq!(tree.len(), 5);

    assert_eq!(tree.search("hub", None).expect("search").len(), 2);
    assert_eq!(tree.search("hub", Some(1)).expect("search").len(), 1);
    assert_eq!(tree.search("^library/", None).expect("search").len(), 1);
    let err = tree.search("(", None).expect_err("bad pattern");
    assert_eq!(err.code(), ErrorCode::InvalidPattern);
}

#[test]
fn tag_scoped_remove_then_full_remove() {
    let mut tree = query_tree();

    let node = tree
        .remove("continuumio/miniconda3", Some("1.0"))
        .expect("branch removed");
    assert_eq!(node.name(), "continuumio/miniconda3");

    let conda = tree.find("continuumio/miniconda3").expect("still present");
    assert!(!conda.has_branch("1.0"));
    assert!(conda.has_branch("latest"));
    assert!(tree.find("singularityhub/singularity-cli").is_none());
    assert!(tree.find("singularityhub/containertree").is_some());

    let node = tree.remove("continuumio/miniconda3", None).expect("removed");
    assert_eq!(node.name(), "continuumio/miniconda3");
    assert!(tree.find("continuumio/miniconda3").is_none());
    assert!(tree.find("singularityhub/containertree").is_none());
    assert_eq!(tree.len(), 2);
}

#[test]
fn removing_last_branch_removes_node() {
    let mut tree = ProvenanceGraph::new();
    tree.update("vanessa/sneeze", "library/ubuntu", None).expect("update");
    let removed = tree.remove("vanessa/sneeze", Some("latest")).expect("removed");
    assert_eq!(removed.label(), "vanessa/sneeze");
    assert!(tree.find("vanessa/sneeze").is_none());
    assert!(tree.remove("vanessa/sneeze", Some("latest")).is_none());
}

#[test]
fn removing_root_is_a_no_op() {
    let mut tree = query_tree();
    let root = tree.remove("scratch", None).expect("root copy");
    assert_eq!(root.label(), "scratch");
    assert_eq!(tree.len(), 5);
    assert!(tree.remove("blark/blark", None).is_none());
}

#[test]
fn paths_cover_every_node() {
    let tree = query_tree();
    let paths = tree.get_paths();
    assert_eq!(paths.len(), 5);
    assert!(paths.contains(&"/scratch/library/debian/.latest/continuumio/miniconda3".to_string()));

    let prefixed = tree.paths(&PathOptions::default().with_tag_prefix("TAG_"));
    assert!(prefixed.contains(&"/scratch/library/debian/TAG_latest/continuumio/miniconda3".to_string()));

    let leaves = tree.paths(&PathOptions::default().leaves_only(true));
    assert!(!leaves.contains(&"/scratch".to_string()));
    assert!(leaves.iter().all(|p| paths.contains(p)));
    assert_eq!(leaves.len(), 2);
}

#[test]
fn similarity_over_container_tags() {
    let mut tree = ProvenanceGraph::new();
    tree.update("continuumio/miniconda3", "library/debian", Some("a")).expect("a");
    tree.update("continuumio/miniconda3", "library/debian", Some("b")).expect("b");
    tree.update("vanessa/app", "continuumio/miniconda3", Some("a")).expect("c");

    let sim = tree.similarity_score(&["a", "b"]);
    assert_eq!(sim.same, 1);
    assert_eq!(sim.total, 2);
    assert!((sim.score - 0.5).abs() < f64::EPSILON);
}

#[test]
fn export_tree_carries_branches() {
    let tree = query_tree();
    let export = tree.export_tree();
    assert_eq!(export.key, "scratch");
    assert_eq!(export.node_count(), 5);
    let conda = &export.children[0].children[0];
    assert_eq!(conda.name, "miniconda3");
    let branches: Vec<Option<&str>> = conda.children.iter().map(|c| c.branch.as_deref()).collect();
    assert_eq!(branches, [Some("1.0"), Some("latest")]);
}
