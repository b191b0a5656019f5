use crate::cache::Cache;
use crate::directory::{Directory, Entry, MemDirectory, SearchScope};
use crate::kv::{Kv, KvOp, MemKv};
use std::time::Duration;

// ── Cache ───────────────────────────────────────────────────────────

#[test]
fn cache_hit_miss_and_negative_results() {
    let cache: Cache<Option<String>> = Cache::new("t", 0, Duration::from_secs(60), true);

    assert!(cache.get("a").is_none());
    cache.set("a", Some("value".to_string()));
    assert_eq!(cache.get("a"), Some(Some("value".to_string())));

    // A cached negative result is a hit carrying None.
    cache.set("absent", None);
    assert_eq!(cache.get("absent"), Some(None));

    let (hits, misses, _) = cache.stats();
    assert_eq!(hits, 2);
    assert_eq!(misses, 1);
}

#[test]
fn cache_set_replaces_and_del_removes() {
    let cache: Cache<u32> = Cache::new("t", 0, Duration::from_secs(60), true);
    cache.set("k", 1);
    cache.set("k", 2);
    assert_eq!(cache.get("k"), Some(2));
    cache.del("k");
    assert!(cache.get("k").is_none());
}

#[test]
fn cache_lru_evicts_least_recently_used() {
    let cache: Cache<u32> = Cache::new("t", 2, Duration::from_secs(60), true);
    cache.set("a", 1);
    cache.set("b", 2);
    // Touch "a" so "b" is the LRU entry.
    assert_eq!(cache.get("a"), Some(1));
    cache.set("c", 3);

    assert_eq!(cache.get("a"), Some(1));
    assert!(cache.get("b").is_none());
    assert_eq!(cache.get("c"), Some(3));
    let (_, _, evictions) = cache.stats();
    assert_eq!(evictions, 1);
}

#[test]
fn cache_ttl_expires_entries() {
    let cache: Cache<u32> = Cache::new("t", 0, Duration::from_millis(20), true);
    cache.set("k", 1);
    assert_eq!(cache.get("k"), Some(1));
    std::thread::sleep(Duration::from_millis(40));
    assert!(cache.get("k").is_none());
}

#[test]
fn cache_disabled_is_a_pass_through() {
    let cache: Cache<u32> = Cache::new("t", 0, Duration::from_secs(60), false);
    cache.set("k", 1);
    assert!(cache.get("k").is_none());
    assert!(cache.is_empty());
}

#[test]
fn cache_reset_empties() {
    let cache: Cache<u32> = Cache::new("t", 0, Duration::from_secs(60), true);
    cache.set("a", 1);
    cache.set("b", 2);
    cache.reset();
    assert!(cache.is_empty());
}

// ── MemKv ───────────────────────────────────────────────────────────

#[tokio::test]
async fn kv_hash_ops() {
    let kv = MemKv::new();
    assert_eq!(kv.hget("h", "f").await.unwrap(), None);
    kv.hset("h", "f", "v").await.unwrap();
    assert_eq!(kv.hget("h", "f").await.unwrap(), Some("v".to_string()));

    let all = kv.hgetall("h").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get("f").map(String::as_str), Some("v"));
}

#[tokio::test]
async fn kv_hincrby_is_monotonic() {
    let kv = MemKv::new();
    assert_eq!(kv.hincrby("ids", "u1", 1).await.unwrap(), 1);
    assert_eq!(kv.hincrby("ids", "u1", 1).await.unwrap(), 2);
    assert_eq!(kv.hincrby("ids", "u2", 1).await.unwrap(), 1);
}

#[tokio::test]
async fn kv_set_ops() {
    let kv = MemKv::new();
    kv.sadd("s", "a").await.unwrap();
    kv.sadd("s", "b").await.unwrap();
    kv.sadd("s", "a").await.unwrap();
    let mut members = kv.smembers("s").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
    kv.srem("s", "a").await.unwrap();
    assert_eq!(kv.smembers("s").await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn kv_zrange_orders_by_score() {
    let kv = MemKv::new();
    kv.zadd("z", 300, "late").await.unwrap();
    kv.zadd("z", 100, "early").await.unwrap();
    kv.zadd("z", 200, "mid").await.unwrap();

    let head = kv.zrange_withscores("z", 0, 0).await.unwrap();
    assert_eq!(head, vec![("early".to_string(), 100)]);

    let all = kv.zrange_withscores("z", 0, -1).await.unwrap();
    assert_eq!(
        all,
        vec![
            ("early".to_string(), 100),
            ("mid".to_string(), 200),
            ("late".to_string(), 300),
        ]
    );

    assert!(kv.zrange_withscores("empty", 0, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn kv_tx_applies_all_ops() {
    let kv = MemKv::new();
    kv.tx(vec![
        KvOp::Sadd {
            key: "maintenances:u".into(),
            member: "1".into(),
        },
        KvOp::Zadd {
            key: "maintenancesByEnd".into(),
            score: 4_600_000,
            member: "maintenance:u:1".into(),
        },
        KvOp::HsetAll {
            key: "maintenance:u:1".into(),
            fields: vec![("id".into(), "1".into()), ("end".into(), "4600000".into())],
        },
    ])
    .await
    .unwrap();

    assert_eq!(kv.smembers("maintenances:u").await.unwrap(), vec!["1"]);
    assert_eq!(
        kv.zrange_withscores("maintenancesByEnd", 0, 0).await.unwrap(),
        vec![("maintenance:u:1".to_string(), 4_600_000)]
    );
    assert_eq!(
        kv.hget("maintenance:u:1", "id").await.unwrap(),
        Some("1".to_string())
    );

    kv.tx(vec![
        KvOp::Srem {
            key: "maintenances:u".into(),
            member: "1".into(),
        },
        KvOp::Zrem {
            key: "maintenancesByEnd".into(),
            member: "maintenance:u:1".into(),
        },
        KvOp::Del {
            key: "maintenance:u:1".into(),
        },
    ])
    .await
    .unwrap();

    assert!(kv.smembers("maintenances:u").await.unwrap().is_empty());
    assert!(kv
        .zrange_withscores("maintenancesByEnd", 0, -1)
        .await
        .unwrap()
        .is_empty());
    assert!(kv.hgetall("maintenance:u:1").await.unwrap().is_empty());
}

#[tokio::test]
async fn kv_keys_glob() {
    let kv = MemKv::new();
    kv.hset("maintenance:a:1", "id", "1").await.unwrap();
    kv.hset("maintenance:b:2", "id", "2").await.unwrap();
    kv.hset("other", "id", "3").await.unwrap();

    let mut keys = kv.keys("maintenance:*").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["maintenance:a:1", "maintenance:b:2"]);
    assert_eq!(kv.keys("other").await.unwrap(), vec!["other"]);
}

// ── MemDirectory ────────────────────────────────────────────────────

fn user_entry(uuid: &str, login: &str) -> Entry {
    Entry::new(format!("uuid={uuid},ou=users,o=smartdc"))
        .with_attr("objectclass", vec!["sdcperson".into()])
        .with_attr("uuid", vec![uuid.into()])
        .with_attr("login", vec![login.into()])
}

fn probe_entry(probe: &str, user: &str, agent: &str) -> Entry {
    Entry::new(format!("amonprobe={probe},uuid={user},ou=users,o=smartdc"))
        .with_attr("objectclass", vec!["amonprobe".into()])
        .with_attr("uuid", vec![probe.into()])
        .with_attr("agent", vec![agent.into()])
}

#[tokio::test]
async fn dir_put_get_del() {
    let dir = MemDirectory::new();
    let entry = user_entry("u1", "alice");
    dir.put(&entry).await.unwrap();

    let fetched = dir.get(&entry.dn).await.unwrap().unwrap();
    assert_eq!(fetched.first("login"), Some("alice"));

    dir.del(&entry.dn).await.unwrap();
    assert!(dir.get(&entry.dn).await.unwrap().is_none());
}

#[tokio::test]
async fn dir_search_scopes() {
    let dir = MemDirectory::new();
    dir.put(&user_entry("u1", "alice")).await.unwrap();
    dir.put(&probe_entry("p1", "u1", "a1")).await.unwrap();
    dir.put(&probe_entry("p2", "u1", "a2")).await.unwrap();

    // One level below the user: probes only.
    let one = dir
        .search(
            "uuid=u1,ou=users,o=smartdc",
            SearchScope::One,
            "(objectclass=amonprobe)",
        )
        .await
        .unwrap();
    assert_eq!(one.len(), 2);

    // Subtree from the root sees everything.
    let sub = dir
        .search("o=smartdc", SearchScope::Sub, "(objectclass=*)")
        .await
        .unwrap();
    assert_eq!(sub.len(), 3);

    // Base scope returns only the entry itself.
    let base = dir
        .search(
            "uuid=u1,ou=users,o=smartdc",
            SearchScope::Base,
            "(objectclass=*)",
        )
        .await
        .unwrap();
    assert_eq!(base.len(), 1);
    assert_eq!(base[0].first("login"), Some("alice"));
}

#[tokio::test]
async fn dir_search_and_filter() {
    let dir = MemDirectory::new();
    dir.put(&probe_entry("p1", "u1", "agent-a")).await.unwrap();
    dir.put(&probe_entry("p2", "u1", "agent-b")).await.unwrap();

    let hits = dir
        .search(
            "o=smartdc",
            SearchScope::Sub,
            "(&(objectclass=amonprobe)(agent=agent-a))",
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].first("uuid"), Some("p1"));
}

#[tokio::test]
async fn dir_rejects_unsupported_filters() {
    let dir = MemDirectory::new();
    assert!(dir
        .search("o=smartdc", SearchScope::Sub, "(|(a=1)(b=2))")
        .await
        .is_err());
    assert!(dir.search("o=smartdc", SearchScope::Sub, "garbage").await.is_err());
}
