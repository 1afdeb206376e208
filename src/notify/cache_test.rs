use super::*;

#[test]
fn test_apply_ignores_older_tokens() {
    let cache = LeaderCache::new();
    assert!(cache.apply(&LeadershipEvent::acquired("c1", "n2", 2, 10)));
    // late delivery of the previous leader's event
    assert!(!cache.apply(&LeadershipEvent::acquired("c1", "n1", 1, 5)));

    let known = cache.get("c1").unwrap();
    assert_eq!(known.holder_id.as_deref(), Some("n2"));
    assert_eq!(known.fencing_token, 2);
}

#[test]
fn test_vacancy_supersedes_same_token_acquisition() {
    let cache = LeaderCache::new();
    cache.apply(&LeadershipEvent::acquired("c1", "n1", 4, 10));
    assert!(cache.apply(&LeadershipEvent::vacant("c1", 4, 20)));
    assert_eq!(cache.get("c1").unwrap().holder_id, None);

    // the acquisition arriving after its own vacancy does not resurrect it
    assert!(!cache.apply(&LeadershipEvent::acquired("c1", "n1", 4, 10)));
    assert_eq!(cache.get("c1").unwrap().holder_id, None);

    assert!(cache.apply(&LeadershipEvent::acquired("c1", "n3", 5, 30)));
    assert_eq!(cache.get("c1").unwrap().holder_id.as_deref(), Some("n3"));
}

#[test]
fn test_clusters_are_independent() {
    let cache = LeaderCache::new();
    cache.apply(&LeadershipEvent::acquired("a", "n1", 9, 1));
    cache.apply(&LeadershipEvent::acquired("b", "n2", 1, 1));
    assert_eq!(cache.get("a").unwrap().fencing_token, 9);
    assert_eq!(cache.get("b").unwrap().fencing_token, 1);
    assert!(cache.get("c").is_none());
}

#[test]
fn test_record_lease_from_store_read() {
    let cache = LeaderCache::new();
    let lease = crate::Lease {
        cluster_id: "c1".to_string(),
        holder_id: "n7".to_string(),
        fencing_token: 3,
        expires_at_ms: 0,
    };
    assert!(cache.record_lease(&lease));
    assert_eq!(cache.get("c1").unwrap().holder_id.as_deref(), Some("n7"));
}
