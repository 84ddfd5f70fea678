//! Integration tests for `SqliteStore`, mostly against an in-memory database.

use std::time::Duration;

use chrono::NaiveDateTime;
use narrativelog_core::{
  message::{Message, MessageEdit, NewMessage},
  query::{MessageQuery, OrderBy, OrderField},
  store::MessageStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn draft(text: &str) -> NewMessage {
  NewMessage::new("summit", text, 0, "observer", "nightlog", true)
}

fn tagged(text: &str, tags: &[&str]) -> NewMessage {
  NewMessage {
    tags: tags.iter().map(|t| t.to_string()).collect(),
    ..draft(text)
  }
}

fn texts(messages: &[Message]) -> Vec<&str> {
  messages.iter().map(|m| m.message_text.as_str()).collect()
}

async fn find(s: &SqliteStore, query: MessageQuery) -> Vec<Message> {
  s.find(&query).await.unwrap()
}

/// Texts of every match, ordered by text.
async fn matching(s: &SqliteStore, query: MessageQuery) -> Vec<String> {
  let query = MessageQuery {
    order_by: vec![OrderBy::asc(OrderField::MessageText)],
    ..query
  };
  find(s, query).await.into_iter().map(|m| m.message_text).collect()
}

fn at(s: &str) -> NaiveDateTime {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
}

// ─── Insert / get ────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get() {
  let s = store().await;

  let input = NewMessage {
    tags: vec!["weather".into()],
    urls: vec!["https://example.org/night/1".into()],
    time_lost: 1.5,
    cscs: vec!["ATDome".into()],
    category: Some("ops".into()),
    ..draft("Dome closed for wind")
  };
  let added = s.insert(input).await.unwrap();
  assert!(added.is_valid());
  assert_eq!(added.parent_id, None);

  let fetched = s.get(added.id).await.unwrap();
  assert_eq!(fetched, added);
}

#[tokio::test]
async fn insert_returns_what_the_store_keeps() {
  let s = store().await;
  let added = s
    .insert(NewMessage {
      date_begin: Some(at("2024-05-06T07:08:09.1234567")),
      ..draft("sub-microsecond")
    })
    .await
    .unwrap();

  assert_eq!(added.date_begin, Some(at("2024-05-06T07:08:09.123456")));
  assert_eq!(s.get(added.id).await.unwrap(), added);
}

#[tokio::test]
async fn get_missing_is_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();
  let err = s.get(id).await.unwrap_err();
  assert!(matches!(err, crate::Error::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn ids_are_unique_and_dates_non_decreasing() {
  let s = store().await;
  let a = s.insert(draft("a")).await.unwrap();
  let b = s.insert(draft("b")).await.unwrap();
  assert_ne!(a.id, b.id);
  assert!(a.date_added <= b.date_added);
}

// ─── Invalidate ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalidate_sets_date_once() {
  let s = store().await;
  let added = s.insert(draft("oops")).await.unwrap();

  let invalidated = s.invalidate(added.id).await.unwrap();
  assert!(!invalidated.is_valid());
  let at = invalidated.date_invalidated.unwrap();
  assert!(at >= added.date_added);

  let err = s.invalidate(added.id).await.unwrap_err();
  assert!(matches!(err, crate::Error::AlreadyInvalidated(_)));

  let fetched = s.get(added.id).await.unwrap();
  assert_eq!(fetched.date_invalidated, Some(at));
}

#[tokio::test]
async fn invalidate_missing_is_not_found() {
  let s = store().await;
  let err = s.invalidate(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, crate::Error::NotFound(_)));
}

// ─── Edit ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn edit_replaces_message() {
  let s = store().await;
  let original = s
    .insert(tagged("Seeing poor", &["weather"]))
    .await
    .unwrap();

  let edited = s
    .edit(original.id, MessageEdit {
      message_text: Some("Seeing 2.1 arcsec".into()),
      level: Some(10),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(edited.old.id, original.id);
  assert!(!edited.old.is_valid());
  assert!(edited.new.is_valid());
  assert_eq!(edited.new.parent_id, Some(original.id));
  assert_eq!(edited.new.message_text, "Seeing 2.1 arcsec");
  assert_eq!(edited.new.level, 10);
  assert_eq!(edited.new.tags, original.tags);
  assert_eq!(edited.new.user_id, original.user_id);
  assert_eq!(edited.new.date_added, edited.old.date_invalidated.unwrap());

  assert_eq!(s.get(original.id).await.unwrap(), edited.old);
  assert_eq!(s.get(edited.new.id).await.unwrap(), edited.new);
}

#[tokio::test]
async fn edit_of_invalidated_message_errors() {
  let s = store().await;
  let added = s.insert(draft("gone")).await.unwrap();
  s.invalidate(added.id).await.unwrap();

  let err = s
    .edit(added.id, MessageEdit::default())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::AlreadyInvalidated(_)));

  // Nothing was inserted.
  assert_eq!(find(&s, MessageQuery::default()).await.len(), 1);
}

#[tokio::test]
async fn edit_of_missing_message_errors() {
  let s = store().await;
  let err = s
    .edit(Uuid::new_v4(), MessageEdit::default())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::NotFound(_)));
  assert!(find(&s, MessageQuery::default()).await.is_empty());
}

#[tokio::test]
async fn concurrent_edits_have_one_winner() {
  let s = store().await;
  let added = s.insert(draft("racy")).await.unwrap();

  let first = MessageEdit {
    message_text: Some("first".into()),
    ..Default::default()
  };
  let second = MessageEdit {
    message_text: Some("second".into()),
    ..Default::default()
  };
  let (a, b) = tokio::join!(s.edit(added.id, first), s.edit(added.id, second));

  assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
  let loser = a.err().or(b.err()).unwrap();
  assert!(matches!(loser, crate::Error::AlreadyInvalidated(_)));

  let children = find(&s, MessageQuery {
    has_parent_id: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(children.len(), 1);
}

#[tokio::test]
async fn edit_chain_links_each_version() {
  let s = store().await;
  let v1 = s.insert(draft("v1")).await.unwrap();
  let v2 = s
    .edit(v1.id, MessageEdit {
      message_text: Some("v2".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .new;
  let v3 = s
    .edit(v2.id, MessageEdit {
      message_text: Some("v3".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .new;

  assert_eq!(v3.parent_id, Some(v2.id));
  let valid = find(&s, MessageQuery {
    is_valid: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&valid), ["v3"]);
}

// ─── Find ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_without_filters_returns_all_by_id() {
  let s = store().await;
  for text in ["a", "b", "c"] {
    s.insert(draft(text)).await.unwrap();
  }
  let invalid = s.insert(draft("d")).await.unwrap();
  s.invalidate(invalid.id).await.unwrap();

  let all = find(&s, MessageQuery::default()).await;
  assert_eq!(all.len(), 4);
  let ids: Vec<_> = all.iter().map(|m| m.id.hyphenated().to_string()).collect();
  let mut sorted = ids.clone();
  sorted.sort();
  assert_eq!(ids, sorted);
}

#[tokio::test]
async fn find_by_tag_overlap_and_exclusion() {
  let s = store().await;
  s.insert(tagged("wind", &["weather", "dome"])).await.unwrap();
  s.insert(tagged("clouds", &["weather"])).await.unwrap();
  s.insert(tagged("fault", &["hardware"])).await.unwrap();

  let mut weather = texts(
    &find(&s, MessageQuery {
      tags: vec!["weather".into()],
      ..Default::default()
    })
    .await,
  )
  .into_iter()
  .map(str::to_owned)
  .collect::<Vec<_>>();
  weather.sort();
  assert_eq!(weather, ["clouds", "wind"]);

  let not_dome = find(&s, MessageQuery {
    tags: vec!["weather".into(), "hardware".into()],
    exclude_tags: vec!["dome".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(not_dome.len(), 2);
  assert!(not_dome.iter().all(|m| !m.tags.contains(&"dome".to_string())));
}

#[tokio::test]
async fn find_by_systems_and_cscs() {
  let s = store().await;
  s.insert(NewMessage {
    systems: vec!["AuxTel".into()],
    cscs: vec!["ATDome".into(), "ATMCS".into()],
    ..draft("aux")
  })
  .await
  .unwrap();
  s.insert(NewMessage {
    systems: vec!["Simonyi".into()],
    cscs: vec!["MTDome".into()],
    ..draft("main")
  })
  .await
  .unwrap();

  let aux = find(&s, MessageQuery {
    cscs: vec!["ATMCS".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&aux), ["aux"]);

  let not_aux = find(&s, MessageQuery {
    exclude_systems: vec!["AuxTel".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&not_aux), ["main"]);
}

#[tokio::test]
async fn find_text_is_case_insensitive() {
  let s = store().await;
  s.insert(draft("Dome CLOSED due to humidity")).await.unwrap();
  s.insert(draft("Ärger mit der Kuppel")).await.unwrap();
  s.insert(draft("all good")).await.unwrap();

  let closed = find(&s, MessageQuery {
    message_text: Some("dome closed".into()),
    ..Default::default()
  })
  .await;
  assert_eq!(closed.len(), 1);

  let umlaut = find(&s, MessageQuery {
    message_text: Some("ärger".into()),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&umlaut), ["Ärger mit der Kuppel"]);
}

#[tokio::test]
async fn find_level_range_is_inclusive() {
  let s = store().await;
  for level in [0, 10, 20, 30] {
    s.insert(NewMessage {
      level,
      ..draft(&format!("level {level}"))
    })
    .await
    .unwrap();
  }

  let mid = find(&s, MessageQuery {
    min_level: Some(10),
    max_level: Some(20),
    order_by: vec![OrderBy::asc(OrderField::Level)],
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&mid), ["level 10", "level 20"]);
}

#[tokio::test]
async fn find_date_added_single_instant() {
  let s = store().await;
  let target = s.insert(draft("target")).await.unwrap();

  let hits = find(&s, MessageQuery {
    min_date_added: Some(target.date_added),
    max_date_added: Some(target.date_added),
    ..Default::default()
  })
  .await;
  assert!(hits.iter().any(|m| m.id == target.id));
  assert!(hits.iter().all(|m| m.date_added == target.date_added));
}

#[tokio::test]
async fn find_by_validity() {
  let s = store().await;
  s.insert(draft("kept")).await.unwrap();
  let dropped = s.insert(draft("dropped")).await.unwrap();
  s.invalidate(dropped.id).await.unwrap();

  let valid = find(&s, MessageQuery {
    is_valid: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&valid), ["kept"]);

  let invalid = find(&s, MessageQuery {
    is_valid: Some(false),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&invalid), ["dropped"]);

  let either = find(&s, MessageQuery::default()).await;
  assert_eq!(either.len(), 2);
}

#[tokio::test]
async fn find_by_presence_of_date_begin() {
  let s = store().await;
  let begin = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
    .unwrap()
    .and_hms_opt(22, 0, 0)
    .unwrap();
  s.insert(NewMessage {
    date_begin: Some(begin),
    ..draft("timed")
  })
  .await
  .unwrap();
  s.insert(draft("untimed")).await.unwrap();

  let timed = find(&s, MessageQuery {
    has_date_begin: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&timed), ["timed"]);

  let untimed = find(&s, MessageQuery {
    has_date_begin: Some(false),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&untimed), ["untimed"]);

  let in_range = find(&s, MessageQuery {
    min_date_begin: Some(begin),
    max_date_begin: Some(begin),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&in_range), ["timed"]);
}

#[tokio::test]
async fn find_by_user_and_human() {
  let s = store().await;
  s.insert(NewMessage::new("summit", "by alice", 0, "alice", "ui", true))
    .await
    .unwrap();
  s.insert(NewMessage::new("summit", "by bob", 0, "bob", "ui", true))
    .await
    .unwrap();
  s.insert(NewMessage::new("summit", "by script", 0, "bob", "script", false))
    .await
    .unwrap();

  let alice = find(&s, MessageQuery {
    user_ids: vec!["alice".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&alice), ["by alice"]);

  let bob_human = find(&s, MessageQuery {
    user_ids: vec!["bob".into()],
    is_human: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(texts(&bob_human), ["by bob"]);
}

#[tokio::test]
async fn find_orders_descending_with_id_tiebreak() {
  let s = store().await;
  for (text, level) in [("x", 10), ("y", 10), ("z", 20)] {
    s.insert(NewMessage {
      level,
      ..draft(text)
    })
    .await
    .unwrap();
  }

  let query = MessageQuery {
    order_by: vec![OrderBy::desc(OrderField::Level)],
    ..Default::default()
  };
  let first = find(&s, query.clone()).await;
  assert_eq!(first[0].message_text, "z");
  assert!(first[1].id < first[2].id);

  let again = find(&s, query).await;
  assert_eq!(first, again);
}

#[tokio::test]
async fn find_offset_and_limit() {
  let s = store().await;
  for text in ["a", "b", "c", "d", "e"] {
    s.insert(draft(text)).await.unwrap();
  }
  let all = find(&s, MessageQuery::default()).await;

  let page = find(&s, MessageQuery {
    offset: 1,
    limit: Some(2),
    ..Default::default()
  })
  .await;
  assert_eq!(page, all[1..3]);

  let past_end = find(&s, MessageQuery {
    offset: 10,
    ..Default::default()
  })
  .await;
  assert!(past_end.is_empty());

  let zero = find(&s, MessageQuery {
    limit: Some(0),
    ..Default::default()
  })
  .await;
  assert!(zero.is_empty());
}

#[tokio::test]
async fn find_paging_bounds_beyond_i64() {
  let s = store().await;
  for text in ["a", "b"] {
    s.insert(draft(text)).await.unwrap();
  }

  let skipped = find(&s, MessageQuery {
    offset: usize::MAX,
    ..Default::default()
  })
  .await;
  assert!(skipped.is_empty());

  let unbounded = matching(&s, MessageQuery {
    limit: Some(usize::MAX),
    ..Default::default()
  })
  .await;
  assert_eq!(unbounded, ["a", "b"]);
}

#[tokio::test]
async fn find_by_date_end() {
  let s = store().await;
  s.insert(NewMessage {
    date_end: Some(at("2024-03-01T01:00:00")),
    ..draft("early")
  })
  .await
  .unwrap();
  s.insert(NewMessage {
    date_end: Some(at("2024-03-02T01:00:00")),
    ..draft("late")
  })
  .await
  .unwrap();
  s.insert(draft("open")).await.unwrap();

  let ended = matching(&s, MessageQuery {
    has_date_end: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(ended, ["early", "late"]);

  let open = matching(&s, MessageQuery {
    has_date_end: Some(false),
    ..Default::default()
  })
  .await;
  assert_eq!(open, ["open"]);

  let from_late = matching(&s, MessageQuery {
    min_date_end: Some(at("2024-03-02T01:00:00")),
    ..Default::default()
  })
  .await;
  assert_eq!(from_late, ["late"]);

  let until_early = matching(&s, MessageQuery {
    max_date_end: Some(at("2024-03-01T01:00:00")),
    ..Default::default()
  })
  .await;
  assert_eq!(until_early, ["early"]);
}

#[tokio::test]
async fn find_by_user_agent_subsystem_and_site() {
  let s = store().await;
  s.insert(NewMessage {
    subsystems: vec!["Dome".into()],
    ..NewMessage::new("summit", "from ui", 0, "alice", "ui", true)
  })
  .await
  .unwrap();
  s.insert(NewMessage {
    subsystems: vec!["Mount".into(), "Dome".into()],
    ..NewMessage::new("base", "from script", 0, "bot", "script", false)
  })
  .await
  .unwrap();
  s.insert(NewMessage::new("base", "bare", 0, "alice", "ui", true))
    .await
    .unwrap();

  let scripted = matching(&s, MessageQuery {
    user_agents: vec!["script".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(scripted, ["from script"]);

  let mount = matching(&s, MessageQuery {
    subsystems: vec!["Mount".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(mount, ["from script"]);

  let not_dome = matching(&s, MessageQuery {
    exclude_subsystems: vec!["Dome".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(not_dome, ["bare"]);

  let base = matching(&s, MessageQuery {
    site_ids: vec!["base".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(base, ["bare", "from script"]);

  let both = matching(&s, MessageQuery {
    site_ids: vec!["summit".into(), "base".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(both, ["bare", "from script", "from ui"]);
}

#[tokio::test]
async fn find_by_url_overlap() {
  let s = store().await;
  s.insert(NewMessage {
    urls: vec!["https://example.org/1".into(), "https://example.org/2".into()],
    ..draft("two links")
  })
  .await
  .unwrap();
  s.insert(NewMessage {
    urls: vec!["https://example.org/3".into()],
    ..draft("one link")
  })
  .await
  .unwrap();
  s.insert(draft("no links")).await.unwrap();

  let either = matching(&s, MessageQuery {
    urls: vec!["https://example.org/2".into(), "https://example.org/3".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(either, ["one link", "two links"]);

  let first = matching(&s, MessageQuery {
    urls: vec!["https://example.org/1".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(first, ["two links"]);
}

#[tokio::test]
async fn find_excluding_cscs_keeps_untagged() {
  let s = store().await;
  s.insert(NewMessage {
    cscs: vec!["ATDome".into()],
    ..draft("aux dome")
  })
  .await
  .unwrap();
  s.insert(NewMessage {
    cscs: vec!["MTDome".into()],
    ..draft("main dome")
  })
  .await
  .unwrap();
  s.insert(draft("no csc")).await.unwrap();

  let kept = matching(&s, MessageQuery {
    exclude_cscs: vec!["ATDome".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(kept, ["main dome", "no csc"]);
}

#[tokio::test]
async fn find_time_lost_range_is_inclusive() {
  let s = store().await;
  for (text, time_lost) in [("none", 0.0), ("some", 1.5), ("lots", 3.0)] {
    s.insert(NewMessage {
      time_lost,
      ..draft(text)
    })
    .await
    .unwrap();
  }

  let at_least = matching(&s, MessageQuery {
    min_time_lost: Some(1.5),
    ..Default::default()
  })
  .await;
  assert_eq!(at_least, ["lots", "some"]);

  let at_most = matching(&s, MessageQuery {
    max_time_lost: Some(1.5),
    ..Default::default()
  })
  .await;
  assert_eq!(at_most, ["none", "some"]);

  let exactly = matching(&s, MessageQuery {
    min_time_lost: Some(1.5),
    max_time_lost: Some(1.5),
    ..Default::default()
  })
  .await;
  assert_eq!(exactly, ["some"]);
}

#[tokio::test]
async fn find_by_date_invalidated() {
  let s = store().await;
  let first = s.insert(draft("first")).await.unwrap();
  let second = s.insert(draft("second")).await.unwrap();
  s.insert(draft("current")).await.unwrap();

  let first_at = s.invalidate(first.id).await.unwrap().date_invalidated;
  tokio::time::sleep(Duration::from_millis(2)).await;
  let second_at = s.invalidate(second.id).await.unwrap().date_invalidated;
  assert!(first_at < second_at);

  let invalidated = matching(&s, MessageQuery {
    has_date_invalidated: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(invalidated, ["first", "second"]);

  let never = matching(&s, MessageQuery {
    has_date_invalidated: Some(false),
    ..Default::default()
  })
  .await;
  assert_eq!(never, ["current"]);

  let from_second = matching(&s, MessageQuery {
    min_date_invalidated: second_at,
    ..Default::default()
  })
  .await;
  assert_eq!(from_second, ["second"]);

  let until_first = matching(&s, MessageQuery {
    max_date_invalidated: first_at,
    ..Default::default()
  })
  .await;
  assert_eq!(until_first, ["first"]);
}

#[tokio::test]
async fn find_roots_without_parent() {
  let s = store().await;
  let original = s.insert(draft("original")).await.unwrap();
  s.edit(original.id, MessageEdit {
    message_text: Some("revised".into()),
    ..Default::default()
  })
  .await
  .unwrap();
  s.insert(draft("standalone")).await.unwrap();

  let roots = matching(&s, MessageQuery {
    has_parent_id: Some(false),
    ..Default::default()
  })
  .await;
  assert_eq!(roots, ["original", "standalone"]);

  let children = matching(&s, MessageQuery {
    has_parent_id: Some(true),
    ..Default::default()
  })
  .await;
  assert_eq!(children, ["revised"]);
}

#[tokio::test]
async fn find_by_components() {
  let s = store().await;
  let mount = s
    .insert(NewMessage {
      components: vec!["MTMount".into()],
      primary_software_components: vec!["MTMount CSC".into()],
      primary_hardware_components: vec!["TMA".into()],
      components_json: Some(serde_json::json!({ "MTMount": { "axes": ["az", "el"] } })),
      ..draft("mount")
    })
    .await
    .unwrap();
  s.insert(NewMessage {
    components: vec!["MTDome".into(), "MTMount".into()],
    primary_hardware_components: vec!["Dome shutter".into()],
    ..draft("dome")
  })
  .await
  .unwrap();
  s.insert(draft("plain")).await.unwrap();

  assert_eq!(s.get(mount.id).await.unwrap(), mount);
  assert_eq!(mount.components_json.as_ref().unwrap()["MTMount"]["axes"][1], "el");

  let with_mount = matching(&s, MessageQuery {
    components: vec!["MTMount".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(with_mount, ["dome", "mount"]);

  let without_dome = matching(&s, MessageQuery {
    exclude_components: vec!["MTDome".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(without_dome, ["mount", "plain"]);

  let software = matching(&s, MessageQuery {
    primary_software_components: vec!["MTMount CSC".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(software, ["mount"]);

  let not_shutter = matching(&s, MessageQuery {
    exclude_primary_hardware_components: vec!["Dome shutter".into()],
    exclude_primary_software_components: vec!["MTMount CSC".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(not_shutter, ["plain"]);

  let hardware = matching(&s, MessageQuery {
    primary_hardware_components: vec!["TMA".into(), "Dome shutter".into()],
    ..Default::default()
  })
  .await;
  assert_eq!(hardware, ["dome", "mount"]);
}

#[tokio::test]
async fn edit_carries_components_forward() {
  let s = store().await;
  let original = s
    .insert(NewMessage {
      components: vec!["MTM1M3".into()],
      components_json: Some(serde_json::json!({ "MTM1M3": {} })),
      ..draft("mirror")
    })
    .await
    .unwrap();

  let edited = s
    .edit(original.id, MessageEdit {
      primary_hardware_components: Some(vec!["M1M3 cell".into()]),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(edited.new.components, original.components);
  assert_eq!(edited.new.components_json, original.components_json);
  assert_eq!(edited.new.primary_hardware_components, ["M1M3 cell"]);
  assert_eq!(s.get(edited.new.id).await.unwrap(), edited.new);
}

// ─── Connections ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reads_are_not_queued_behind_a_write() {
  let path = std::env::temp_dir().join(format!("narrativelog-{}.db", Uuid::new_v4()));
  let s = SqliteStore::open_with_readers(&path, 2).await.unwrap();
  s.insert(draft("committed")).await.unwrap();

  let writer = {
    let s = s.clone();
    tokio::spawn(async move { s.hold_write_lock(Duration::from_millis(800)).await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;

  let seen = matching(&s, MessageQuery::default()).await;
  assert_eq!(seen, ["committed"]);
  assert!(!writer.is_finished());

  writer.await.unwrap().unwrap();
  s.close().await.unwrap();
  for suffix in ["", "-wal", "-shm"] {
    let mut file = path.clone().into_os_string();
    file.push(suffix);
    std::fs::remove_file(file).ok();
  }
}

// ─── Schema guards ───────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_rejects_mutation_of_content() {
  let s = store().await;
  s.insert(draft("fixed")).await.unwrap();

  assert!(
    s.execute_raw("UPDATE message SET message_text = 'changed'")
      .await
      .is_err()
  );
  assert!(s.execute_raw("DELETE FROM message").await.is_err());
}

#[tokio::test]
async fn schema_rejects_second_invalidation() {
  let s = store().await;
  let added = s.insert(draft("once")).await.unwrap();
  s.invalidate(added.id).await.unwrap();

  assert!(
    s.execute_raw("UPDATE message SET date_invalidated = '2099-01-01T00:00:00.000000'")
      .await
      .is_err()
  );
  assert!(
    s.execute_raw("UPDATE message SET date_invalidated = NULL")
      .await
      .is_err()
  );
}
