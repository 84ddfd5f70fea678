//! Message types: the fundamental unit of the narrative log.
//!
//! A message is an immutable record. The only field that ever changes after
//! insertion is `date_invalidated`, and it changes exactly once: from `None`
//! to the moment the message was deleted or superseded by an edit.
//!
//! All timestamps are timezone-naive and interpreted as UTC.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, ser::SerializeStruct as _};
use uuid::Uuid;

/// Maximum length of a site id.
pub const SITE_ID_LEN: usize = 16;

// ─── Message ─────────────────────────────────────────────────────────────────

/// A stored narrative log message.
///
/// `is_valid` is never stored; it is computed from `date_invalidated` by
/// [`Message::is_valid`] and included when the message is serialised.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
  pub id:                          Uuid,
  pub site_id:                     String,
  pub message_text:                String,
  pub level:                       i32,
  pub tags:                        Vec<String>,
  pub urls:                        Vec<String>,
  /// Estimate of lost time, in seconds.
  pub time_lost:                   f64,
  pub date_begin:                  Option<NaiveDateTime>,
  pub date_end:                    Option<NaiveDateTime>,
  pub user_id:                     String,
  pub user_agent:                  String,
  pub is_human:                    bool,
  /// Server-assigned; never changes after creation.
  pub date_added:                  NaiveDateTime,
  pub date_invalidated:            Option<NaiveDateTime>,
  /// The message this one is an edited version of.
  pub parent_id:                   Option<Uuid>,
  pub systems:                     Vec<String>,
  pub subsystems:                  Vec<String>,
  pub cscs:                        Vec<String>,
  pub components:                  Vec<String>,
  pub primary_software_components: Vec<String>,
  pub primary_hardware_components: Vec<String>,
  /// Free-form JSON object describing the systems / subsystems / components
  /// hierarchy the message applies to. Stored and returned as given.
  pub components_json:             Option<serde_json::Value>,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
}

impl Message {
  pub fn is_valid(&self) -> bool { self.date_invalidated.is_none() }

  pub fn state(&self) -> MessageState {
    match self.date_invalidated {
      None => MessageState::Valid,
      Some(at) => MessageState::Invalidated { at },
    }
  }
}

impl Serialize for Message {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("Message", 25)?;
    s.serialize_field("id", &self.id)?;
    s.serialize_field("site_id", &self.site_id)?;
    s.serialize_field("message_text", &self.message_text)?;
    s.serialize_field("level", &self.level)?;
    s.serialize_field("tags", &self.tags)?;
    s.serialize_field("urls", &self.urls)?;
    s.serialize_field("time_lost", &self.time_lost)?;
    s.serialize_field("date_begin", &self.date_begin)?;
    s.serialize_field("date_end", &self.date_end)?;
    s.serialize_field("user_id", &self.user_id)?;
    s.serialize_field("user_agent", &self.user_agent)?;
    s.serialize_field("is_human", &self.is_human)?;
    s.serialize_field("is_valid", &self.is_valid())?;
    s.serialize_field("date_added", &self.date_added)?;
    s.serialize_field("date_invalidated", &self.date_invalidated)?;
    s.serialize_field("parent_id", &self.parent_id)?;
    s.serialize_field("systems", &self.systems)?;
    s.serialize_field("subsystems", &self.subsystems)?;
    s.serialize_field("cscs", &self.cscs)?;
    s.serialize_field("components", &self.components)?;
    s.serialize_field("primary_software_components", &self.primary_software_components)?;
    s.serialize_field("primary_hardware_components", &self.primary_hardware_components)?;
    s.serialize_field("components_json", &self.components_json)?;
    s.serialize_field("category", &self.category)?;
    s.serialize_field("time_lost_type", &self.time_lost_type)?;
    s.end()
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// The lifecycle state of a message. `Invalidated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MessageState {
  Valid,
  Invalidated { at: NaiveDateTime },
}

/// Result of an edit: the superseded message (now invalidated) and its
/// replacement, whose `parent_id` is `old.id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditedMessage {
  pub old: Message,
  pub new: Message,
}

// ─── NewMessage ──────────────────────────────────────────────────────────────

/// A validated creation payload. Produced by
/// [`NewMessageRequest::validate`](crate::validation::NewMessageRequest::validate).
/// `id`, `date_added` and `parent_id` are always set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
  pub site_id:                     String,
  pub message_text:                String,
  pub level:                       i32,
  pub tags:                        Vec<String>,
  pub urls:                        Vec<String>,
  pub time_lost:                   f64,
  pub date_begin:                  Option<NaiveDateTime>,
  pub date_end:                    Option<NaiveDateTime>,
  pub user_id:                     String,
  pub user_agent:                  String,
  pub is_human:                    bool,
  pub systems:                     Vec<String>,
  pub subsystems:                  Vec<String>,
  pub cscs:                        Vec<String>,
  pub components:                  Vec<String>,
  pub primary_software_components: Vec<String>,
  pub primary_hardware_components: Vec<String>,
  pub components_json:             Option<serde_json::Value>,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
}

impl NewMessage {
  /// Convenience constructor with all optional fields empty.
  pub fn new(
    site_id: impl Into<String>,
    message_text: impl Into<String>,
    level: i32,
    user_id: impl Into<String>,
    user_agent: impl Into<String>,
    is_human: bool,
  ) -> Self {
    Self {
      site_id: site_id.into(),
      message_text: message_text.into(),
      level,
      tags: Vec::new(),
      urls: Vec::new(),
      time_lost: 0.0,
      date_begin: None,
      date_end: None,
      user_id: user_id.into(),
      user_agent: user_agent.into(),
      is_human,
      systems: Vec::new(),
      subsystems: Vec::new(),
      cscs: Vec::new(),
      components: Vec::new(),
      primary_software_components: Vec::new(),
      primary_hardware_components: Vec::new(),
      components_json: None,
      category: None,
      time_lost_type: None,
    }
  }

  /// Stamp the server-assigned fields onto the draft.
  pub fn into_message(
    self,
    id: Uuid,
    date_added: NaiveDateTime,
    parent_id: Option<Uuid>,
  ) -> Message {
    Message {
      id,
      site_id: self.site_id,
      message_text: self.message_text,
      level: self.level,
      tags: self.tags,
      urls: self.urls,
      time_lost: self.time_lost,
      date_begin: self.date_begin,
      date_end: self.date_end,
      user_id: self.user_id,
      user_agent: self.user_agent,
      is_human: self.is_human,
      date_added,
      date_invalidated: None,
      parent_id,
      systems: self.systems,
      subsystems: self.subsystems,
      cscs: self.cscs,
      components: self.components,
      primary_software_components: self.primary_software_components,
      primary_hardware_components: self.primary_hardware_components,
      components_json: self.components_json,
      category: self.category,
      time_lost_type: self.time_lost_type,
    }
  }
}

// ─── MessageEdit ─────────────────────────────────────────────────────────────

/// A validated edit payload: every `Some` field replaces the parent's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEdit {
  /// Site that performs the edit; the replacement is always stamped with it.
  pub site_id:                     Option<String>,
  pub message_text:                Option<String>,
  pub level:                       Option<i32>,
  pub tags:                        Option<Vec<String>>,
  pub urls:                        Option<Vec<String>>,
  pub time_lost:                   Option<f64>,
  pub date_begin:                  Option<NaiveDateTime>,
  pub date_end:                    Option<NaiveDateTime>,
  pub user_id:                     Option<String>,
  pub user_agent:                  Option<String>,
  pub is_human:                    Option<bool>,
  pub systems:                     Option<Vec<String>>,
  pub subsystems:                  Option<Vec<String>>,
  pub cscs:                        Option<Vec<String>>,
  pub components:                  Option<Vec<String>>,
  pub primary_software_components: Option<Vec<String>>,
  pub primary_hardware_components: Option<Vec<String>>,
  pub components_json:             Option<serde_json::Value>,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
}

impl MessageEdit {
  /// Build the replacement draft: the parent's fields overridden by this edit.
  pub fn merge_onto(self, parent: &Message) -> NewMessage {
    NewMessage {
      site_id:        self.site_id.unwrap_or_else(|| parent.site_id.clone()),
      message_text:   self.message_text.unwrap_or_else(|| parent.message_text.clone()),
      level:          self.level.unwrap_or(parent.level),
      tags:           self.tags.unwrap_or_else(|| parent.tags.clone()),
      urls:           self.urls.unwrap_or_else(|| parent.urls.clone()),
      time_lost:      self.time_lost.unwrap_or(parent.time_lost),
      date_begin:     self.date_begin.or(parent.date_begin),
      date_end:       self.date_end.or(parent.date_end),
      user_id:        self.user_id.unwrap_or_else(|| parent.user_id.clone()),
      user_agent:     self.user_agent.unwrap_or_else(|| parent.user_agent.clone()),
      is_human:       self.is_human.unwrap_or(parent.is_human),
      systems:        self.systems.unwrap_or_else(|| parent.systems.clone()),
      subsystems:     self.subsystems.unwrap_or_else(|| parent.subsystems.clone()),
      cscs:           self.cscs.unwrap_or_else(|| parent.cscs.clone()),
      components:     self.components.unwrap_or_else(|| parent.components.clone()),
      primary_software_components: self
        .primary_software_components
        .unwrap_or_else(|| parent.primary_software_components.clone()),
      primary_hardware_components: self
        .primary_hardware_components
        .unwrap_or_else(|| parent.primary_hardware_components.clone()),
      components_json: self.components_json.or_else(|| parent.components_json.clone()),
      category:       self.category.or_else(|| parent.category.clone()),
      time_lost_type: self.time_lost_type.or_else(|| parent.time_lost_type.clone()),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
      .unwrap()
      .and_hms_opt(h, 0, 0)
      .unwrap()
  }

  fn sample() -> Message {
    let mut draft = NewMessage::new("summit", "dome closed", 20, "alice", "logui", true);
    draft.tags = vec!["weather".into()];
    draft.date_begin = Some(at(1));
    draft.category = Some("ops".into());
    draft.components = vec!["MTMount".into()];
    draft.components_json = Some(serde_json::json!({ "systems": ["Simonyi"] }));
    draft.into_message(Uuid::new_v4(), at(2), None)
  }

  #[test]
  fn validity_is_derived_from_date_invalidated() {
    let mut m = sample();
    assert!(m.is_valid());
    assert_eq!(m.state(), MessageState::Valid);

    m.date_invalidated = Some(at(3));
    assert!(!m.is_valid());
    assert_eq!(m.state(), MessageState::Invalidated { at: at(3) });
  }

  #[test]
  fn serialised_message_carries_is_valid() {
    let mut m = sample();
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["is_valid"], true);
    assert_eq!(json["date_added"], "2024-03-01T02:00:00");

    m.date_invalidated = Some(at(4));
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["is_valid"], false);

    let back: Message = serde_json::from_value(json).unwrap();
    assert_eq!(back, m);
  }

  #[test]
  fn empty_edit_copies_every_field() {
    let parent = sample();
    let draft = MessageEdit::default().merge_onto(&parent);
    let copy = draft.into_message(parent.id, parent.date_added, None);
    assert_eq!(copy, parent);
  }

  #[test]
  fn edit_overrides_only_supplied_fields() {
    let parent = sample();
    let edit = MessageEdit {
      site_id: Some("base".into()),
      message_text: Some("dome open".into()),
      level: Some(30),
      ..Default::default()
    };
    let draft = edit.merge_onto(&parent);
    assert_eq!(draft.site_id, "base");
    assert_eq!(draft.message_text, "dome open");
    assert_eq!(draft.level, 30);
    assert_eq!(draft.tags, parent.tags);
    assert_eq!(draft.date_begin, parent.date_begin);
    assert_eq!(draft.category, parent.category);
    assert_eq!(draft.user_id, parent.user_id);
    assert_eq!(draft.components, parent.components);
    assert_eq!(draft.components_json, parent.components_json);
  }

  #[test]
  fn edit_replaces_component_fields() {
    let parent = sample();
    let edit = MessageEdit {
      primary_hardware_components: Some(vec!["M1M3".into()]),
      components_json: Some(serde_json::json!({ "components": ["MTDome"] })),
      ..Default::default()
    };
    let draft = edit.merge_onto(&parent);
    assert_eq!(draft.primary_hardware_components, ["M1M3"]);
    assert_eq!(draft.components_json.unwrap()["components"][0], "MTDome");
    assert_eq!(draft.components, parent.components);
  }
}
