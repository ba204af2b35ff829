//! Directory store integration tests
//!
//! CRUD, failure taxonomy, cache-aside coherence and namespace teardown for
//! identities and policies.

use bastion_iam::core::storage::{Collection, DocumentStore};
use bastion_iam::{
    Directory, ErrorCode, IdentityPatch, MemoryBackend, MemoryCache, NewIdentity, NewPolicy,
    Policy, PolicyPatch, PolicyRef,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const NS: &str = "acme";

fn directory_with_ttl(ttl: Duration) -> (Directory, Arc<MemoryBackend>, Arc<MemoryCache>) {
    let backend = Arc::new(MemoryBackend::new());
    backend.create_namespace(NS);
    let cache = Arc::new(MemoryCache::new(1024));
    let directory = Directory::new(backend.clone(), backend.clone(), cache.clone(), ttl);
    (directory, backend, cache)
}

fn directory() -> (Directory, Arc<MemoryBackend>, Arc<MemoryCache>) {
    directory_with_ttl(Duration::from_secs(30))
}

fn new_policy(name: &str, resources: &[&str], actions: &[&str]) -> NewPolicy {
    NewPolicy {
        name: name.to_string(),
        resources: resources.iter().map(|s| s.to_string()).collect(),
        actions: actions.iter().map(|s| s.to_string()).collect(),
    }
}

fn new_identity(name: &str, login: Option<&str>, policies: &[&Policy]) -> NewIdentity {
    NewIdentity {
        name: name.to_string(),
        login: login.map(str::to_string),
        active: true,
        policies: policies.iter().map(|p| p.reference()).collect(),
    }
}

#[tokio::test]
async fn test_identity_crud() {
    let (dir, _, _) = directory();
    let identities = dir.identities();

    let created = identities
        .create(NS, new_identity("alice", Some("alice@acme"), &[]))
        .await
        .unwrap();
    let id = created.uuid.to_string();

    assert_eq!(identities.get(NS, &id, false).await.unwrap(), created);
    assert_eq!(identities.get(NS, &id, true).await.unwrap(), created);
    assert_eq!(
        identities.get_by_login(NS, "alice@acme", true).await.unwrap().uuid,
        created.uuid
    );

    let renamed = identities
        .update(
            NS,
            &id,
            IdentityPatch {
                name: Some("Alice A.".into()),
                login: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Alice A.");
    assert_eq!(renamed.login.as_deref(), Some("alice@acme"));

    identities.delete(NS, &id).await.unwrap();
    identities.delete(NS, &id).await.unwrap();
    assert_eq!(
        identities.get(NS, &id, true).await.unwrap_err().code(),
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn test_policy_crud() {
    let (dir, _, _) = directory();
    let policies = dir.policies();

    let created = policies
        .create(NS, new_policy("readers", &["docs*"], &["read"]))
        .await
        .unwrap();
    let id = created.uuid.to_string();
    assert_eq!(policies.get(NS, &id, true).await.unwrap(), created);

    let updated = policies
        .update(
            NS,
            &id,
            PolicyPatch {
                actions: Some(vec!["read".into(), "list".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.namespace, NS);
    assert_eq!(updated.resources, created.resources);
    assert_eq!(updated.actions, vec!["read".to_string(), "list".to_string()]);

    // The cached copy was invalidated by the update
    assert_eq!(policies.get(NS, &id, true).await.unwrap(), updated);

    policies.delete(NS, &id).await.unwrap();
    policies.delete(NS, &id).await.unwrap();
    assert_eq!(
        policies.get(NS, &id, true).await.unwrap_err().code(),
        ErrorCode::NotFound
    );
    assert_eq!(
        policies
            .update(NS, &id, PolicyPatch::default())
            .await
            .unwrap_err()
            .code(),
        ErrorCode::NotFound
    );
}

#[tokio::test]
async fn test_malformed_identifiers_are_invalid_argument() {
    let (dir, backend, _) = directory();

    let err = dir.identities().get(NS, "not-a-uuid", true).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = dir.policies().delete(NS, "").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = dir
        .identities()
        .create("spaces are bad", new_identity("x", None, &[]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let err = dir
        .policies()
        .create(NS, new_policy("empty", &[], &["read"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    // Nothing was written
    assert_eq!(backend.count(NS, Collection::Policies), 0);
    assert_eq!(backend.count(NS, Collection::Identities), 0);
}

#[tokio::test]
async fn test_missing_dependencies_are_failed_precondition() {
    let (dir, _, _) = directory();

    let err = dir
        .policies()
        .create("ghost", new_policy("p", &["*"], &["*"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);

    let dangling = NewIdentity {
        policies: vec![PolicyRef::new(NS, Uuid::new_v4())],
        ..new_identity("alice", None, &[])
    };
    let err = dir.identities().create(NS, dangling).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);

    let alice = dir
        .identities()
        .create(NS, new_identity("alice", None, &[]))
        .await
        .unwrap();
    let err = dir
        .identities()
        .add_policy(NS, &alice.uuid.to_string(), PolicyRef::new(NS, Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);

    // A missing identity is the subject, not a dependency
    let policy = dir
        .policies()
        .create(NS, new_policy("p", &["*"], &["*"]))
        .await
        .unwrap();
    let err = dir
        .identities()
        .add_policy(NS, &Uuid::new_v4().to_string(), policy.reference())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_duplicate_login_is_already_exists() {
    let (dir, _, _) = directory();
    let identities = dir.identities();

    identities
        .create(NS, new_identity("alice", Some("shared"), &[]))
        .await
        .unwrap();
    let err = identities
        .create(NS, new_identity("bob", Some("shared"), &[]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    let bob = identities
        .create(NS, new_identity("bob", Some("bob"), &[]))
        .await
        .unwrap();
    let err = identities
        .update(
            NS,
            &bob.uuid.to_string(),
            IdentityPatch {
                name: None,
                login: Some("shared".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    // The same login in another namespace is fine
    dir.identities()
        .create("", new_identity("alice", Some("shared"), &[]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_policy_attachment_is_idempotent_and_visible_through_cache() {
    let (dir, _, _) = directory();
    let policy = dir
        .policies()
        .create(NS, new_policy("p", &["*"], &["read"]))
        .await
        .unwrap();
    let alice = dir
        .identities()
        .create(NS, new_identity("alice", Some("alice"), &[]))
        .await
        .unwrap();
    let id = alice.uuid.to_string();
    let identities = dir.identities();

    // Warm both cache keys
    assert!(identities.get(NS, &id, true).await.unwrap().policies.is_empty());
    assert!(identities
        .get_by_login(NS, "alice", true)
        .await
        .unwrap()
        .policies
        .is_empty());

    identities.add_policy(NS, &id, policy.reference()).await.unwrap();
    identities.add_policy(NS, &id, policy.reference()).await.unwrap();

    let cached = identities.get(NS, &id, true).await.unwrap();
    assert_eq!(cached.policies.len(), 1);
    assert!(cached.policies.contains(&policy.reference()));
    assert_eq!(
        identities.get_by_login(NS, "alice", true).await.unwrap().policies.len(),
        1
    );

    identities.remove_policy(NS, &id, policy.reference()).await.unwrap();
    identities.remove_policy(NS, &id, policy.reference()).await.unwrap();
    assert!(identities.get(NS, &id, true).await.unwrap().policies.is_empty());
}

#[tokio::test]
async fn test_login_change_invalidates_old_login_key() {
    let (dir, _, _) = directory();
    let identities = dir.identities();
    let alice = identities
        .create(NS, new_identity("alice", Some("old"), &[]))
        .await
        .unwrap();

    identities.get_by_login(NS, "old", true).await.unwrap();

    identities
        .update(
            NS,
            &alice.uuid.to_string(),
            IdentityPatch {
                name: None,
                login: Some("new".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        identities.get_by_login(NS, "old", true).await.unwrap_err().code(),
        ErrorCode::NotFound
    );
    assert_eq!(
        identities.get_by_login(NS, "new", true).await.unwrap().uuid,
        alice.uuid
    );
}

#[tokio::test]
async fn test_cache_self_heals_after_ttl() {
    let (dir, backend, _) = directory_with_ttl(Duration::from_millis(50));
    let policy = dir
        .policies()
        .create(NS, new_policy("p", &["a*"], &["read"]))
        .await
        .unwrap();
    let id = policy.uuid.to_string();

    dir.policies().get(NS, &id, true).await.unwrap();

    // Out-of-band write that bypasses invalidation
    let mut changed = policy.clone();
    changed.name = "changed".into();
    backend
        .replace(
            NS,
            Collection::Policies,
            policy.uuid,
            serde_json::to_value(&changed).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(dir.policies().get(NS, &id, true).await.unwrap().name, "p");
    assert_eq!(dir.policies().get(NS, &id, false).await.unwrap().name, "changed");

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(dir.policies().get(NS, &id, true).await.unwrap().name, "changed");
}

#[tokio::test]
async fn test_namespace_teardown() {
    let (dir, backend, cache) = directory();
    let policy = dir
        .policies()
        .create(NS, new_policy("p", &["*"], &["*"]))
        .await
        .unwrap();
    let alice = dir
        .identities()
        .create(NS, new_identity("alice", None, &[&policy]))
        .await
        .unwrap();

    assert!(dir.namespace_exists(NS).await.unwrap());
    dir.drop_namespace(NS).await.unwrap();
    assert!(!dir.namespace_exists(NS).await.unwrap());
    assert!(!backend.namespaces().contains(&NS.to_string()));

    cache.clear();
    assert_eq!(
        dir.identities()
            .get(NS, &alice.uuid.to_string(), true)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::NotFound
    );
    assert_eq!(
        dir.policies()
            .get(NS, &policy.uuid.to_string(), false)
            .await
            .unwrap_err()
            .code(),
        ErrorCode::NotFound
    );
    assert!(dir.identities().list(NS, 0, 0).await.unwrap().is_empty());

    // Writes into the dropped namespace need it to exist
    let err = dir
        .identities()
        .create(NS, new_identity("bob", None, &[]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);

    // The global namespace cannot be dropped
    dir.drop_namespace("").await.unwrap();
    assert!(dir.namespace_exists("").await.unwrap());
}

#[tokio::test]
async fn test_flatten_skips_deleted_policies() {
    let (dir, _, _) = directory();
    let keep = dir
        .policies()
        .create(NS, new_policy("keep", &["a*"], &["read"]))
        .await
        .unwrap();
    let gone = dir
        .policies()
        .create("", new_policy("gone", &["b*"], &["write"]))
        .await
        .unwrap();
    let alice = dir
        .identities()
        .create(NS, new_identity("alice", None, &[&keep, &gone]))
        .await
        .unwrap();

    assert_eq!(dir.flatten_policies(&alice).await.unwrap().len(), 2);

    dir.policies().delete("", &gone.uuid.to_string()).await.unwrap();
    assert_eq!(dir.flatten_policies(&alice).await.unwrap(), vec![keep.to_scope()]);
}

#[tokio::test]
async fn test_listing_pagination() {
    let (dir, _, _) = directory();
    let mut created = Vec::new();
    for i in 0..5 {
        created.push(
            dir.policies()
                .create(NS, new_policy(&format!("p{}", i), &["*"], &["*"]))
                .await
                .unwrap()
                .uuid,
        );
    }

    let all: Vec<_> = dir
        .policies()
        .list(NS, 0, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.uuid)
        .collect();
    assert_eq!(all, created);

    let page: Vec<_> = dir
        .policies()
        .list(NS, 1, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.uuid)
        .collect();
    assert_eq!(page, created[1..3].to_vec());

    assert!(dir.policies().list(NS, 10, 0).await.unwrap().is_empty());
    assert!(dir.policies().list("", 0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deactivation_is_visible_through_cache() {
    let (dir, _, _) = directory();
    let alice = dir
        .identities()
        .create(NS, new_identity("alice", None, &[]))
        .await
        .unwrap();
    let id = alice.uuid.to_string();

    assert!(dir.identities().get(NS, &id, true).await.unwrap().active);
    dir.identities().set_active(NS, &id, false).await.unwrap();
    assert!(!dir.identities().get(NS, &id, true).await.unwrap().active);
}
