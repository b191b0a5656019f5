use super::*;
use amon_storage::MemKv;
use std::sync::Mutex;

fn engine() -> Arc<MaintenanceEngine> {
    Arc::new(MaintenanceEngine::new(Arc::new(MemKv::new())))
}

fn engine_with_kv() -> (Arc<MaintenanceEngine>, Arc<MemKv>) {
    let kv = Arc::new(MemKv::new());
    (Arc::new(MaintenanceEngine::new(kv.clone())), kv)
}

fn all_input(start: i64, end: i64) -> MaintenanceInput {
    MaintenanceInput {
        start: Some(TimeSpec::Millis(start)),
        end: Some(TimeSpec::Millis(end)),
        all: Some(true),
        ..Default::default()
    }
}

fn future_ms(offset_ms: i64) -> i64 {
    Utc::now().timestamp_millis() + offset_ms
}

fn event(user: Uuid, time: i64, probe: Uuid, machine: Option<Uuid>) -> Event {
    serde_json::from_value(serde_json::json!({
        "user": user,
        "time": time,
        "probeUuid": probe,
        "machine": machine,
        "status": "error",
    }))
    .unwrap()
}

struct RecordingHandler {
    ended: Mutex<Vec<(Uuid, u64)>>,
}

impl MaintenanceEndHandler for RecordingHandler {
    fn maintenance_ended(&self, user: Uuid, id: u64) {
        self.ended.lock().unwrap().push((user, id));
    }
}

#[tokio::test]
async fn create_assigns_strictly_increasing_ids() {
    let engine = engine();
    let user = Uuid::new_v4();

    for expect in 1..=3u64 {
        let maint = engine
            .create(user, all_input(future_ms(1000), future_ms(3_600_000)))
            .await
            .unwrap();
        assert_eq!(maint.id, expect);
    }

    // Ids survive deletion: no reuse.
    engine.delete(user, 3).await.unwrap();
    let maint = engine
        .create(user, all_input(future_ms(1000), future_ms(3_600_000)))
        .await
        .unwrap();
    assert_eq!(maint.id, 4);

    // Another user has an independent counter.
    let other = Uuid::new_v4();
    let maint = engine
        .create(other, all_input(future_ms(1000), future_ms(3_600_000)))
        .await
        .unwrap();
    assert_eq!(maint.id, 1);
}

#[tokio::test]
async fn create_writes_set_index_and_hash_atomically() {
    let (engine, kv) = engine_with_kv();
    let user = Uuid::new_v4();
    let end = future_ms(3_600_000);

    let maint = engine.create(user, all_input(future_ms(1000), end)).await.unwrap();

    let members = kv.smembers(&set_key(user)).await.unwrap();
    assert_eq!(members, vec!["1"]);

    let index = kv.zrange_withscores(KEY_BY_END, 0, -1).await.unwrap();
    assert_eq!(index, vec![(window_key(user, 1), end)]);

    let fields = kv.hgetall(&window_key(user, 1)).await.unwrap();
    assert_eq!(fields.get("id").map(String::as_str), Some("1"));
    assert_eq!(fields.get("all").map(String::as_str), Some("true"));
    assert_eq!(maint.end, end);

    // Delete makes all three vanish together.
    engine.delete(user, 1).await.unwrap();
    assert!(kv.smembers(&set_key(user)).await.unwrap().is_empty());
    assert!(kv.zrange_withscores(KEY_BY_END, 0, -1).await.unwrap().is_empty());
    assert!(kv.hgetall(&window_key(user, 1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_validates_times_and_scope() {
    let engine = engine();
    let user = Uuid::new_v4();

    // end is required
    let err = engine
        .create(
            user,
            MaintenanceInput {
                all: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MissingParameter");

    // start must precede end
    let err = engine
        .create(user, all_input(future_ms(5000), future_ms(1000)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");

    // a scope is required
    let err = engine
        .create(
            user,
            MaintenanceInput {
                end: Some(TimeSpec::Word("1h".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MissingParameter");

    // two scopes are too many
    let err = engine
        .create(
            user,
            MaintenanceInput {
                end: Some(TimeSpec::Word("1h".into())),
                all: Some(true),
                machines: Some(vec![Uuid::new_v4()]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");

    // empty scope list
    let err = engine
        .create(
            user,
            MaintenanceInput {
                end: Some(TimeSpec::Word("1h".into())),
                probes: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");
}

#[tokio::test]
async fn relative_end_resolves_from_now() {
    let engine = engine();
    let user = Uuid::new_v4();

    let before = Utc::now().timestamp_millis();
    let maint = engine
        .create(
            user,
            MaintenanceInput {
                end: Some(TimeSpec::Word("1h".into())),
                all: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let after = Utc::now().timestamp_millis();

    // start defaulted to "now"; end is one hour out.
    assert!(maint.start >= before && maint.start <= after);
    assert_eq!(maint.end - maint.start, 3_600_000);
}

#[tokio::test]
async fn get_distinguishes_gone_from_never_issued() {
    let engine = engine();
    let user = Uuid::new_v4();

    engine
        .create(user, all_input(future_ms(1000), future_ms(3_600_000)))
        .await
        .unwrap();

    assert!(engine.get(user, 1).await.is_ok());

    // Never issued: 404.
    let err = engine.get(user, 7).await.unwrap_err();
    assert_eq!(err.code(), "ResourceNotFound");

    // Issued then deleted: 410.
    engine.delete(user, 1).await.unwrap();
    let err = engine.get(user, 1).await.unwrap_err();
    assert_eq!(err.code(), "Gone");
}

#[tokio::test]
async fn list_orders_by_id_and_drops_bogus_records() {
    let (engine, kv) = engine_with_kv();
    let user = Uuid::new_v4();

    engine
        .create(user, all_input(future_ms(1000), future_ms(3_600_000)))
        .await
        .unwrap();
    engine
        .create(user, all_input(future_ms(1000), future_ms(7_200_000)))
        .await
        .unwrap();

    // Sneak a bogus record in: set member with a broken hash.
    kv.sadd(&set_key(user), "99").await.unwrap();
    kv.hset(&window_key(user, 99), "id", "not-a-number")
        .await
        .unwrap();

    let windows = engine.list(user).await.unwrap();
    assert_eq!(windows.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn event_matching_per_scope() {
    let engine = engine();
    let user = Uuid::new_v4();
    let probe = Uuid::new_v4();
    let group = Uuid::new_v4();
    let machine = Uuid::new_v4();

    let start = future_ms(-1000);
    let end = future_ms(3_600_000);
    let t = future_ms(1000);

    // all=true suppresses everything in range.
    engine.create(user, all_input(start, end)).await.unwrap();
    let hit = engine
        .event_in_maintenance(&event(user, t, probe, Some(machine)), None)
        .await
        .unwrap();
    assert_eq!(hit.unwrap().id, 1);

    // Out of range: strict bounds.
    assert!(engine
        .event_in_maintenance(&event(user, start, probe, None), None)
        .await
        .unwrap()
        .is_none());
    assert!(engine
        .event_in_maintenance(&event(user, end, probe, None), None)
        .await
        .unwrap()
        .is_none());

    // Scoped windows for a second user.
    let scoped_user = Uuid::new_v4();
    engine
        .create(
            scoped_user,
            MaintenanceInput {
                start: Some(TimeSpec::Millis(start)),
                end: Some(TimeSpec::Millis(end)),
                probes: Some(vec![probe]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(engine
        .event_in_maintenance(&event(scoped_user, t, probe, None), None)
        .await
        .unwrap()
        .is_some());
    assert!(engine
        .event_in_maintenance(&event(scoped_user, t, Uuid::new_v4(), None), None)
        .await
        .unwrap()
        .is_none());

    // Group and machine scopes.
    engine
        .create(
            scoped_user,
            MaintenanceInput {
                start: Some(TimeSpec::Millis(start)),
                end: Some(TimeSpec::Millis(end)),
                probe_groups: Some(vec![group]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(engine
        .event_in_maintenance(&event(scoped_user, t, Uuid::new_v4(), None), Some(group))
        .await
        .unwrap()
        .is_some());

    engine
        .create(
            scoped_user,
            MaintenanceInput {
                start: Some(TimeSpec::Millis(start)),
                end: Some(TimeSpec::Millis(end)),
                machines: Some(vec![machine]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(engine
        .event_in_maintenance(
            &event(scoped_user, t, Uuid::new_v4(), Some(machine)),
            None
        )
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn delete_fires_end_handler() {
    let engine = engine();
    let user = Uuid::new_v4();
    let handler = Arc::new(RecordingHandler {
        ended: Mutex::new(Vec::new()),
    });
    engine.set_end_handler(handler.clone());

    engine
        .create(user, all_input(future_ms(1000), future_ms(3_600_000)))
        .await
        .unwrap();
    engine.delete(user, 1).await.unwrap();

    assert_eq!(*handler.ended.lock().unwrap(), vec![(user, 1)]);
}

#[tokio::test]
async fn reaper_deletes_expired_windows() {
    let (engine, kv) = engine_with_kv();
    let user = Uuid::new_v4();

    // Already past its end: the reaper should fire after the minimum gap.
    let now = Utc::now().timestamp_millis();
    engine
        .create(user, all_input(now - 5000, now - 1000))
        .await
        .unwrap();

    // create() validated start < end, both in the past, and poked the
    // reaper; give it time to fire.
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if kv.hgetall(&window_key(user, 1)).await.unwrap().is_empty() {
            break;
        }
    }

    assert!(kv.hgetall(&window_key(user, 1)).await.unwrap().is_empty());
    assert!(kv
        .zrange_withscores(KEY_BY_END, 0, -1)
        .await
        .unwrap()
        .is_empty());
    let err = engine.get(user, 1).await.unwrap_err();
    assert_eq!(err.code(), "Gone");
}

#[tokio::test]
async fn scope_roundtrip_through_fields() {
    let user = Uuid::new_v4();
    let probes = vec![Uuid::new_v4(), Uuid::new_v4()];
    let maint = Maintenance {
        user,
        id: 3,
        start: 1_000_000,
        end: 4_600_000,
        notes: Some("rack move".into()),
        scope: MaintScope::Probes(probes.clone()),
    };

    let fields: HashMap<String, String> = maint.to_fields().into_iter().collect();
    let parsed = Maintenance::from_fields(&fields).unwrap();
    assert_eq!(parsed.id, 3);
    assert_eq!(parsed.scope, MaintScope::Probes(probes));
    assert_eq!(parsed.notes.as_deref(), Some("rack move"));

    let json = parsed.to_json();
    assert_eq!(json["id"], 3);
    assert_eq!(json["start"], 1_000_000);
    assert!(json["probes"].is_array());
    assert!(json.get("all").is_none());
}
