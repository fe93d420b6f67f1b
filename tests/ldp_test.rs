//! Integration tests for the LDP interaction model
//!
//! Drives the resource tree through transport-neutral requests and checks
//! the triples the resource manager ends up holding.

use ldp_coap::ldp::{LdpRequest, LdpResponse, ResourceTree};
use ldp_coap::manager::ResourceManager;
use ldp_coap::rdf::{RdfPredicate, Triple, TriplePattern};
use ldp_coap::vocab::{ldp, media, rdf, RequestCode, ResponseCode};
use std::sync::Arc;

const BASE: &str = "coap://localhost";
const HAS_PART: &str = "http://example.org/hasPart";
const TOPIC: &str = "http://example.org/primaryTopic";

async fn new_tree() -> Arc<ResourceTree> {
    let mng = Arc::new(ResourceManager::new(BASE));
    Arc::new(
        ResourceTree::new(mng, vec![media::TEXT_PLAIN, media::OCTET_STREAM])
            .await
            .unwrap(),
    )
}

fn post(container: &str, title: &str, rt: Option<&str>, body: &str) -> LdpRequest {
    let mut req = LdpRequest::new(RequestCode::Post, container)
        .with_query("title", title)
        .with_content_format(media::TEXT_TURTLE)
        .with_payload(body.to_string());
    if let Some(rt) = rt {
        req = req.with_query("rt", rt);
    }
    req
}

async fn with_predicate(tree: &ResourceTree, predicate: &str) -> Vec<Triple> {
    let store = tree.manager().read().await.unwrap();
    let pattern = TriplePattern::new(None, Some(RdfPredicate::new(predicate).unwrap()), None);
    store.query(&pattern)
}

fn object_strings(triples: &[Triple]) -> Vec<String> {
    let mut objects: Vec<String> = triples
        .iter()
        .filter_map(|t| t.object.as_named_node().map(|n| n.as_str().to_string()))
        .collect();
    objects.sort();
    objects
}

fn text(res: &LdpResponse) -> String {
    String::from_utf8(res.payload.to_vec()).unwrap()
}

fn put(path: &str, body: &str) -> LdpRequest {
    LdpRequest::new(RequestCode::Put, path)
        .with_content_format(media::TEXT_TURTLE)
        .with_payload(body.to_string())
}

fn live_paths(tree: &ResourceTree) -> Vec<String> {
    let mut pending = tree.root().children();
    let mut paths = Vec::new();
    while let Some(node) = pending.pop() {
        paths.push(node.uri().strip_prefix(BASE).unwrap().to_string());
        pending.extend(node.children());
    }
    paths.sort();
    paths
}

/// Every `ldp:contains` object is a live node and every live node is
/// contained exactly once.
async fn assert_tree_matches_store(tree: &ResourceTree) {
    let contains = with_predicate(tree, ldp::CONTAINS).await;
    let mut contained: Vec<String> = contains
        .iter()
        .map(|t| {
            let uri = t.object.as_named_node().unwrap().as_str();
            uri.strip_prefix(BASE).unwrap().to_string()
        })
        .collect();
    for path in &contained {
        assert!(!tree.manager().is_deleted(path), "{} contained after delete", path);
        assert!(tree.lookup(path).is_some(), "{} contained but not in the tree", path);
    }
    contained.sort();
    assert_eq!(contained, live_paths(tree));
}

#[tokio::test]
async fn test_second_creation_of_live_name_is_forbidden() {
    let tree = new_tree().await;

    let first = tree.handle(post("", "lamp", None, "")).await;
    assert_eq!(first.code, ResponseCode::Created);
    assert_eq!(first.location.as_deref(), Some("coap://localhost/lamp"));

    let second = tree.handle(post("", "lamp", None, "")).await;
    assert_eq!(second.code, ResponseCode::Forbidden);

    // PUT to a live path replaces instead of creating
    let put = LdpRequest::new(RequestCode::Put, "/lamp")
        .with_content_format(media::TEXT_TURTLE)
        .with_payload("<> <http://example.org/p> 1 .");
    assert_eq!(tree.handle(put).await.code, ResponseCode::Changed);
}

#[tokio::test]
async fn test_tombstone_asymmetry() {
    let tree = new_tree().await;
    tree.handle(post("", "lamp", None, "")).await;

    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/lamp")).await;
    assert_eq!(res.code, ResponseCode::Deleted);
    assert!(tree.manager().is_deleted("/lamp"));

    // POST quietly renames
    let res = tree.handle(post("", "lamp", None, "")).await;
    assert_eq!(res.code, ResponseCode::Created);
    let location = res.location.unwrap();
    assert_ne!(location, "coap://localhost/lamp");
    assert!(location.starts_with("coap://localhost/"));

    // PUT-to-create refuses to resurrect
    let put = LdpRequest::new(RequestCode::Put, "/lamp")
        .with_content_format(media::TEXT_TURTLE)
        .with_payload("");
    assert_eq!(tree.handle(put).await.code, ResponseCode::Conflict);
    assert!(tree.lookup("/lamp").is_none());
}

#[tokio::test]
async fn test_containment_invariant() {
    let tree = new_tree().await;
    tree.handle(post("", "c", Some("ldp:BasicContainer"), "")).await;
    tree.handle(post("/c", "x", None, "")).await;
    tree.handle(post("/c", "y", Some("ldp:BasicContainer"), "")).await;
    tree.handle(post("/c/y", "z", None, "")).await;

    let contains = with_predicate(&tree, ldp::CONTAINS).await;
    for path in ["/c", "/c/x", "/c/y", "/c/y/z"] {
        let uri = format!("{}{}", BASE, path);
        let parents: Vec<_> = contains
            .iter()
            .filter(|t| t.object.as_named_node().map(|n| n.as_str()) == Some(uri.as_str()))
            .collect();
        assert_eq!(parents.len(), 1, "{} should be contained exactly once", path);
    }

    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/c/y")).await;
    assert_eq!(res.code, ResponseCode::Deleted);

    let store = tree.manager().read().await.unwrap();
    for path in ["/c/y", "/c/y/z"] {
        let uri = format!("{}{}", BASE, path);
        assert!(
            store.iter().all(|t| !t.mentions(&uri)),
            "{} still referenced after delete",
            path
        );
    }
    drop(store);
    assert!(tree.manager().is_deleted("/c/y/z"));
    assert!(tree.lookup("/c/x").is_some());
}

#[tokio::test]
async fn test_direct_container_membership() {
    let tree = new_tree().await;
    let config = format!(
        "<> <{}> <{}/things> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        BASE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART
    );
    let res = tree
        .handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    assert_eq!(res.code, ResponseCode::Created);
    assert_eq!(res.location_query.as_deref(), Some("rt=ldp:DirectContainer"));

    tree.handle(post("/dc", "a", None, "")).await;
    tree.handle(post("/dc", "b", None, "")).await;

    let members = with_predicate(&tree, HAS_PART).await;
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .all(|t| t.subject.to_string() == format!("<{}/things>", BASE)));
    assert_eq!(
        object_strings(&members),
        vec![format!("{}/dc/a", BASE), format!("{}/dc/b", BASE)]
    );

    // Deleting a member retracts its membership triple
    tree.handle(LdpRequest::new(RequestCode::Delete, "/dc/a")).await;
    let members = with_predicate(&tree, HAS_PART).await;
    assert_eq!(object_strings(&members), vec![format!("{}/dc/b", BASE)]);
}

#[tokio::test]
async fn test_direct_container_is_member_of_only() {
    let tree = new_tree().await;
    let config = format!(
        "<> <{}> <http://example.org/partOf> .",
        ldp::IS_MEMBER_OF_RELATION
    );
    tree.handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    tree.handle(post("/dc", "a", None, "")).await;

    let triples = with_predicate(&tree, "http://example.org/partOf").await;
    assert_eq!(triples.len(), 1);
    assert_eq!(triples[0].subject.to_string(), format!("<{}/dc/a>", BASE));
    assert_eq!(
        object_strings(&triples),
        vec![format!("{}/dc/resource", BASE)]
    );
}

#[tokio::test]
async fn test_direct_container_self_reference_falls_back_to_local_resource() {
    let tree = new_tree().await;
    let config = format!(
        "<> <{}> <{}> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        BASE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART
    );
    tree.handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    assert!(tree.lookup("/dc/resource").is_some());

    let declared = with_predicate(&tree, ldp::MEMBERSHIP_RESOURCE).await;
    assert_eq!(object_strings(&declared), vec![format!("{}/dc/resource", BASE)]);
}

#[tokio::test]
async fn test_indirect_container_derives_member() {
    let tree = new_tree().await;
    let config = format!(
        "<> <{}> <{}/things> ; <{}> <{}> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        BASE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART,
        ldp::INSERTED_CONTENT_RELATION,
        TOPIC
    );
    let res = tree
        .handle(post("", "ic", Some("ldp:IndirectContainer"), &config))
        .await;
    assert_eq!(res.code, ResponseCode::Created);

    let res = tree
        .handle(post(
            "/ic",
            "lamp",
            None,
            &format!("<> <{}> <http://example.org/lamp#it> .", TOPIC),
        ))
        .await;
    assert_eq!(res.code, ResponseCode::Created);

    // Without the relation the child itself becomes the member
    tree.handle(post("/ic", "plain", None, "")).await;

    let members = with_predicate(&tree, HAS_PART).await;
    assert_eq!(
        object_strings(&members),
        vec![
            format!("{}/ic/plain", BASE),
            "http://example.org/lamp#it".to_string()
        ]
    );

    tree.handle(LdpRequest::new(RequestCode::Delete, "/ic/lamp")).await;
    let members = with_predicate(&tree, HAS_PART).await;
    assert_eq!(object_strings(&members), vec![format!("{}/ic/plain", BASE)]);
}

#[tokio::test]
async fn test_indirect_container_requires_configuration() {
    let tree = new_tree().await;
    let config = format!("<> <{}> <{}> .", ldp::HAS_MEMBER_RELATION, HAS_PART);
    let res = tree
        .handle(post("", "ic", Some("ldp:IndirectContainer"), &config))
        .await;
    assert_eq!(res.code, ResponseCode::BadRequest);
    assert!(tree.lookup("/ic").is_none());
    assert!(with_predicate(&tree, ldp::HAS_MEMBER_RELATION).await.is_empty());
}

#[tokio::test]
async fn test_interaction_model_round_trip() {
    let tree = new_tree().await;
    let direct = format!("<> <{}> <{}> .", ldp::HAS_MEMBER_RELATION, HAS_PART);
    let indirect = format!(
        "<> <{}> <{}> ; <{}> <{}> .",
        ldp::HAS_MEMBER_RELATION,
        HAS_PART,
        ldp::INSERTED_CONTENT_RELATION,
        TOPIC
    );
    let cases = [
        ("r", "ldp:Resource", String::new(), ldp::RDF_SOURCE),
        ("bc", "ldp:BasicContainer", String::new(), ldp::BASIC_CONTAINER),
        ("dc", "ldp:DirectContainer", direct, ldp::DIRECT_CONTAINER),
        ("ic", "ldp:IndirectContainer", indirect, ldp::INDIRECT_CONTAINER),
    ];

    for (title, rt, body, type_iri) in cases {
        let created = tree.handle(post("", title, Some(rt), &body)).await;
        assert_eq!(created.code, ResponseCode::Created, "creating {}", rt);

        let res = tree
            .handle(LdpRequest::new(RequestCode::Get, &format!("/{}", title)))
            .await;
        assert_eq!(res.code, ResponseCode::Content);
        assert_eq!(res.location_query, created.location_query);
        assert!(text(&res).contains(type_iri), "{} missing from GET", type_iri);
    }
}

#[tokio::test]
async fn test_non_rdf_source_and_meta() {
    let tree = new_tree().await;
    let req = LdpRequest::new(RequestCode::Post, "")
        .with_query("title", "blob")
        .with_content_format(media::OCTET_STREAM)
        .with_payload(vec![0u8, 1, 2, 3]);
    let res = tree.handle(req).await;
    assert_eq!(res.code, ResponseCode::Created);
    assert_eq!(
        res.location_query.as_deref(),
        Some("rt=ldp:Resource&describedby=coap://localhost/blob/meta")
    );

    let res = tree.handle(LdpRequest::new(RequestCode::Get, "/blob")).await;
    assert_eq!(res.content_format, Some(media::OCTET_STREAM));
    assert_eq!(res.payload.as_ref(), &[0, 1, 2, 3]);

    let meta = tree.handle(LdpRequest::new(RequestCode::Get, "/blob/meta")).await;
    assert_eq!(meta.code, ResponseCode::Content);

    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/blob/meta")).await;
    assert_eq!(res.code, ResponseCode::MethodNotAllowed);

    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/blob")).await;
    assert_eq!(res.code, ResponseCode::Deleted);
    assert!(tree.manager().is_deleted("/blob/meta"));
}

#[tokio::test]
async fn test_json_ld_creation() {
    let tree = new_tree().await;
    let body = r#"{
        "@context": {"dcterms": "http://purl.org/dc/terms/"},
        "@id": "",
        "dcterms:title": "Lamp"
    }"#;
    let req = LdpRequest::new(RequestCode::Post, "")
        .with_query("title", "lamp")
        .with_content_format(media::LD_JSON)
        .with_payload(body);
    assert_eq!(tree.handle(req).await.code, ResponseCode::Created);

    let titles = with_predicate(&tree, "http://purl.org/dc/terms/title").await;
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].subject.to_string(), "<coap://localhost/lamp>");

    let res = tree
        .handle(LdpRequest::new(RequestCode::Get, "/lamp").with_accept(media::LD_JSON))
        .await;
    let json: serde_json::Value = serde_json::from_slice(&res.payload).unwrap();
    assert!(json.to_string().contains("Lamp"));
}

#[tokio::test]
async fn test_malformed_body_creates_nothing() {
    let tree = new_tree().await;
    let res = tree.handle(post("", "bad", None, "<> <http://e/p> ")).await;
    assert_eq!(res.code, ResponseCode::BadRequest);
    assert!(tree.lookup("/bad").is_none());
    assert!(with_predicate(&tree, ldp::CONTAINS).await.is_empty());
}

#[tokio::test]
async fn test_prefer_containment_and_membership() {
    let tree = new_tree().await;
    let config = format!("<> <{}> <{}> .", ldp::HAS_MEMBER_RELATION, HAS_PART);
    tree.handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    tree.handle(post("/dc", "a", None, "")).await;

    let get = |incl: Option<&str>, omit: Option<&str>| {
        let mut req = LdpRequest::new(RequestCode::Get, "/dc");
        if let Some(incl) = incl {
            req = req.with_query("ldp-incl", incl);
        }
        if let Some(omit) = omit {
            req = req.with_query("ldp-omit", omit);
        }
        req
    };

    let full = text(&tree.handle(get(None, None)).await);
    assert!(full.contains(ldp::CONTAINS));
    assert!(full.contains(HAS_PART));

    let minimal = text(&tree.handle(get(Some("ldp:PreferMinimalContainer"), None)).await);
    assert!(!minimal.contains("/dc/a>"));

    let no_containment = text(&tree.handle(get(None, Some("ldp:PreferContainment"))).await);
    assert!(!no_containment.contains(ldp::CONTAINS));
    assert!(no_containment.contains("/dc/a>"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_with_same_title() {
    let tree = new_tree().await;
    let attempts = 32;

    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let tree = Arc::clone(&tree);
            tokio::spawn(async move {
                let body = format!("<> <http://example.org/attempt> {} .", i);
                tree.handle(post("", "same", None, &body)).await.code
            })
        })
        .collect();

    let codes: Vec<ResponseCode> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let created = codes.iter().filter(|c| **c == ResponseCode::Created).count();
    let forbidden = codes.iter().filter(|c| **c == ResponseCode::Forbidden).count();
    assert_eq!(created, 1);
    assert_eq!(forbidden, attempts - 1);

    let contains = with_predicate(&tree, ldp::CONTAINS).await;
    assert_eq!(contains.len(), 1);
    let attempts_stored = with_predicate(&tree, "http://example.org/attempt").await;
    assert_eq!(attempts_stored.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_anonymous_creation_gets_distinct_names() {
    let tree = new_tree().await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let tree = Arc::clone(&tree);
            tokio::spawn(async move {
                let req = LdpRequest::new(RequestCode::Post, "")
                    .with_content_format(media::TEXT_TURTLE)
                    .with_payload("");
                tree.handle(req).await
            })
        })
        .collect();

    let mut locations: Vec<String> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().location.unwrap())
        .collect();
    locations.sort();
    locations.dedup();
    assert_eq!(locations.len(), 16);
    assert_eq!(tree.root().children().len(), 16);
}

#[tokio::test]
async fn test_client_cannot_forge_containment_or_type() {
    let tree = new_tree().await;
    tree.handle(post("", "gone", None, "")).await;
    tree.handle(LdpRequest::new(RequestCode::Delete, "/gone")).await;

    let body = format!(
        "<{base}> <{contains}> <{base}/gone>, <{base}/ghost> .\n\
         <> a <{basic}> ; <http://example.org/p> \"v\" .",
        base = BASE,
        contains = ldp::CONTAINS,
        basic = ldp::BASIC_CONTAINER
    );
    let res = tree.handle(post("", "a", None, &body)).await;
    assert_eq!(res.code, ResponseCode::Created);
    assert_eq!(res.location_query.as_deref(), Some("rt=ldp:Resource"));

    assert_eq!(
        object_strings(&with_predicate(&tree, ldp::CONTAINS).await),
        vec![format!("{}/a", BASE)]
    );
    let own_types: Vec<String> = with_predicate(&tree, rdf::TYPE)
        .await
        .into_iter()
        .filter(|t| t.subject.to_string() == format!("<{}/a>", BASE))
        .filter_map(|t| t.object.as_named_node().map(|n| n.as_str().to_string()))
        .collect();
    assert!(!own_types.contains(&ldp::BASIC_CONTAINER.to_string()));
    assert_eq!(with_predicate(&tree, "http://example.org/p").await.len(), 1);

    let res = tree
        .handle(put(
            "/a",
            &format!("<> <http://example.org/p> \"w\" .\n<{0}> <{1}> <{0}/ghost> .", BASE, ldp::CONTAINS),
        ))
        .await;
    assert_eq!(res.code, ResponseCode::Changed);
    assert_eq!(
        object_strings(&with_predicate(&tree, ldp::CONTAINS).await),
        vec![format!("{}/a", BASE)]
    );
    assert_tree_matches_store(&tree).await;
}

#[tokio::test]
async fn test_membership_resource_in_use_cannot_be_deleted() {
    let tree = new_tree().await;
    tree.handle(post("", "things", None, "")).await;
    let config = format!(
        "<> <{}> <{}/things> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        BASE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART
    );
    let res = tree
        .handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    assert_eq!(res.code, ResponseCode::Created);

    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/things")).await;
    assert_eq!(res.code, ResponseCode::Conflict);
    assert!(tree.lookup("/things").is_some());
    assert!(!tree.manager().is_deleted("/things"));

    assert_eq!(tree.handle(post("/dc", "a", None, "")).await.code, ResponseCode::Created);
    let members = with_predicate(&tree, HAS_PART).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].subject.to_string(), format!("<{}/things>", BASE));

    // Once the container is gone the resource is free again
    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/dc")).await;
    assert_eq!(res.code, ResponseCode::Deleted);
    let res = tree.handle(LdpRequest::new(RequestCode::Delete, "/things")).await;
    assert_eq!(res.code, ResponseCode::Deleted);
    assert_tree_matches_store(&tree).await;
}

#[tokio::test]
async fn test_deleted_membership_resource_is_refused() {
    let tree = new_tree().await;
    tree.handle(post("", "things", None, "")).await;
    tree.handle(LdpRequest::new(RequestCode::Delete, "/things")).await;

    let config = format!(
        "<> <{}> <{}/things> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        BASE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART
    );
    let res = tree
        .handle(post("", "dc", Some("ldp:DirectContainer"), &config))
        .await;
    assert_eq!(res.code, ResponseCode::Conflict);
    assert!(tree.lookup("/dc").is_none());
    assert!(with_predicate(&tree, HAS_PART).await.is_empty());
}

#[tokio::test]
async fn test_indirect_member_follows_description_updates() {
    let tree = new_tree().await;
    let config = format!(
        "<> <{}> <http://example.org/shelf> ; <{}> <{}> ; <{}> <{}> .",
        ldp::MEMBERSHIP_RESOURCE,
        ldp::HAS_MEMBER_RELATION,
        HAS_PART,
        ldp::INSERTED_CONTENT_RELATION,
        TOPIC
    );
    tree.handle(post("", "ic", Some("ldp:IndirectContainer"), &config))
        .await;
    let topic = |object: &str| format!("<> <{}> <http://example.org/{}> .", TOPIC, object);

    tree.handle(post("/ic", "a", None, &topic("X"))).await;
    assert_eq!(
        object_strings(&with_predicate(&tree, HAS_PART).await),
        vec!["http://example.org/X".to_string()]
    );

    let res = tree.handle(put("/ic/a", &topic("Y"))).await;
    assert_eq!(res.code, ResponseCode::Changed);
    assert_eq!(
        object_strings(&with_predicate(&tree, HAS_PART).await),
        vec!["http://example.org/Y".to_string()]
    );

    let patch = format!(
        "D <> <{0}> <http://example.org/Y> .\nA <> <{0}> <http://example.org/Z> .",
        TOPIC
    );
    let req = LdpRequest::new(RequestCode::Patch, "/ic/a")
        .with_content_format(media::RDF_PATCH)
        .with_payload(patch);
    assert_eq!(tree.handle(req).await.code, ResponseCode::Changed);
    assert_eq!(
        object_strings(&with_predicate(&tree, HAS_PART).await),
        vec!["http://example.org/Z".to_string()]
    );

    // Dropping the relation makes the child its own member
    assert_eq!(tree.handle(put("/ic/a", "")).await.code, ResponseCode::Changed);
    assert_eq!(
        object_strings(&with_predicate(&tree, HAS_PART).await),
        vec![format!("{}/ic/a", BASE)]
    );

    tree.handle(LdpRequest::new(RequestCode::Delete, "/ic/a")).await;
    assert!(with_predicate(&tree, HAS_PART).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_races_creation_of_same_name() {
    let tree = new_tree().await;
    tree.handle(post("", "c", Some("ldp:BasicContainer"), "")).await;

    for round in 0..16 {
        let title = format!("t{}", round);
        let path = format!("/c/{}", title);
        assert_eq!(tree.handle(post("/c", &title, None, "")).await.code, ResponseCode::Created);

        let deleting = {
            let tree = Arc::clone(&tree);
            let path = path.clone();
            tokio::spawn(async move { tree.handle(LdpRequest::new(RequestCode::Delete, &path)).await })
        };
        let creating = {
            let tree = Arc::clone(&tree);
            let title = title.clone();
            tokio::spawn(async move { tree.handle(post("/c", &title, None, "")).await })
        };
        let deleted = deleting.await.unwrap();
        let created = creating.await.unwrap();

        assert_eq!(deleted.code, ResponseCode::Deleted);
        assert!(tree.manager().is_deleted(&path));
        match created.code {
            // The name was still live
            ResponseCode::Forbidden => {}
            // The tombstone was already there, so the name moved
            ResponseCode::Created => {
                let location = created.location.unwrap();
                assert_ne!(location, format!("{}{}", BASE, path));
                assert!(location.starts_with(&format!("{}/c/", BASE)));
            }
            other => panic!("unexpected creation outcome {}", other),
        }
        assert_tree_matches_store(&tree).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_races_creation_inside_container() {
    let tree = new_tree().await;

    for round in 0..16 {
        let name = format!("c{}", round);
        let path = format!("/{}", name);
        let res = tree.handle(post("", &name, Some("ldp:BasicContainer"), "")).await;
        assert_eq!(res.code, ResponseCode::Created);

        let deleting = {
            let tree = Arc::clone(&tree);
            let path = path.clone();
            tokio::spawn(async move { tree.handle(LdpRequest::new(RequestCode::Delete, &path)).await })
        };
        let creating = {
            let tree = Arc::clone(&tree);
            let path = path.clone();
            tokio::spawn(async move { tree.handle(post(&path, "x", None, "")).await })
        };
        assert_eq!(deleting.await.unwrap().code, ResponseCode::Deleted);
        let created = creating.await.unwrap();
        assert!(
            matches!(created.code, ResponseCode::Created | ResponseCode::NotFound),
            "unexpected creation outcome {}",
            created.code
        );

        assert!(tree.lookup(&path).is_none());
        assert!(tree.manager().is_deleted(&path));
        if created.code == ResponseCode::Created {
            assert!(tree.manager().is_deleted(&format!("{}/x", path)));
        }
        let store = tree.manager().read().await.unwrap();
        let uri = format!("{}{}", BASE, path);
        assert!(store.iter().all(|t| !t.mentions(&uri)));
        drop(store);
        assert_tree_matches_store(&tree).await;
    }
}
