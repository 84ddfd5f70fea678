//! Encoding and decoding helpers between [`Message`] and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width naive strings with microsecond
//! precision, so lexical order in SQL equals chronological order. Array
//! fields are stored as compact JSON. UUIDs are hyphenated lowercase strings.

use chrono::{NaiveDateTime, SubsecRound as _, Utc};
use narrativelog_core::message::Message;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn encode_dt(dt: NaiveDateTime) -> String { dt.format(DT_FORMAT).to_string() }

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// The store clock: current UTC time at the precision the store keeps.
pub fn now() -> NaiveDateTime { Utc::now().naive_utc().trunc_subsecs(6) }

// ─── Arrays ──────────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> { Ok(serde_json::to_string(items)?) }

pub fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Opaque JSON ─────────────────────────────────────────────────────────────

fn encode_json(value: Option<&serde_json::Value>) -> Result<Option<String>> {
  Ok(value.map(serde_json::to_string).transpose()?)
}

fn decode_json(s: Option<&str>) -> Result<Option<serde_json::Value>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row type ────────────────────────────────────────────────────────────────

/// Column values of one `message` row, in
/// [`MESSAGE_COLUMNS`](crate::schema::MESSAGE_COLUMNS) order.
#[derive(Debug, Clone)]
pub struct RawMessage {
  pub id:                          String,
  pub site_id:                     String,
  pub message_text:                String,
  pub level:                       i32,
  pub tags:                        String,
  pub urls:                        String,
  pub time_lost:                   f64,
  pub date_begin:                  Option<String>,
  pub date_end:                    Option<String>,
  pub user_id:                     String,
  pub user_agent:                  String,
  pub is_human:                    bool,
  pub date_added:                  String,
  pub date_invalidated:            Option<String>,
  pub parent_id:                   Option<String>,
  pub systems:                     String,
  pub subsystems:                  String,
  pub cscs:                        String,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
  pub components:                  String,
  pub primary_software_components: String,
  pub primary_hardware_components: String,
  pub components_json:             Option<String>,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                          row.get(0)?,
      site_id:                     row.get(1)?,
      message_text:                row.get(2)?,
      level:                       row.get(3)?,
      tags:                        row.get(4)?,
      urls:                        row.get(5)?,
      time_lost:                   row.get(6)?,
      date_begin:                  row.get(7)?,
      date_end:                    row.get(8)?,
      user_id:                     row.get(9)?,
      user_agent:                  row.get(10)?,
      is_human:                    row.get(11)?,
      date_added:                  row.get(12)?,
      date_invalidated:            row.get(13)?,
      parent_id:                   row.get(14)?,
      systems:                     row.get(15)?,
      subsystems:                  row.get(16)?,
      cscs:                        row.get(17)?,
      category:                    row.get(18)?,
      time_lost_type:              row.get(19)?,
      components:                  row.get(20)?,
      primary_software_components: row.get(21)?,
      primary_hardware_components: row.get(22)?,
      components_json:             row.get(23)?,
    })
  }

  pub fn from_message(m: &Message) -> Result<Self> {
    Ok(Self {
      id:                          encode_uuid(m.id),
      site_id:                     m.site_id.clone(),
      message_text:                m.message_text.clone(),
      level:                       m.level,
      tags:                        encode_list(&m.tags)?,
      urls:                        encode_list(&m.urls)?,
      time_lost:                   m.time_lost,
      date_begin:                  m.date_begin.map(encode_dt),
      date_end:                    m.date_end.map(encode_dt),
      user_id:                     m.user_id.clone(),
      user_agent:                  m.user_agent.clone(),
      is_human:                    m.is_human,
      date_added:                  encode_dt(m.date_added),
      date_invalidated:            m.date_invalidated.map(encode_dt),
      parent_id:                   m.parent_id.map(encode_uuid),
      systems:                     encode_list(&m.systems)?,
      subsystems:                  encode_list(&m.subsystems)?,
      cscs:                        encode_list(&m.cscs)?,
      category:                    m.category.clone(),
      time_lost_type:              m.time_lost_type.clone(),
      components:                  encode_list(&m.components)?,
      primary_software_components: encode_list(&m.primary_software_components)?,
      primary_hardware_components: encode_list(&m.primary_hardware_components)?,
      components_json:             encode_json(m.components_json.as_ref())?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:                          decode_uuid(&self.id)?,
      site_id:                     self.site_id,
      message_text:                self.message_text,
      level:                       self.level,
      tags:                        decode_list(&self.tags)?,
      urls:                        decode_list(&self.urls)?,
      time_lost:                   self.time_lost,
      date_begin:                  self.date_begin.as_deref().map(decode_dt).transpose()?,
      date_end:                    self.date_end.as_deref().map(decode_dt).transpose()?,
      user_id:                     self.user_id,
      user_agent:                  self.user_agent,
      is_human:                    self.is_human,
      date_added:                  decode_dt(&self.date_added)?,
      date_invalidated:            self.date_invalidated.as_deref().map(decode_dt).transpose()?,
      parent_id:                   self.parent_id.as_deref().map(decode_uuid).transpose()?,
      systems:                     decode_list(&self.systems)?,
      subsystems:                  decode_list(&self.subsystems)?,
      cscs:                        decode_list(&self.cscs)?,
      category:                    self.category,
      time_lost_type:              self.time_lost_type,
      components:                  decode_list(&self.components)?,
      primary_software_components: decode_list(&self.primary_software_components)?,
      primary_hardware_components: decode_list(&self.primary_hardware_components)?,
      components_json:             decode_json(self.components_json.as_deref())?,
    })
  }

  /// Append this row to the `message` table.
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO message (
         id, site_id, message_text, level, tags, urls, time_lost,
         date_begin, date_end, user_id, user_agent, is_human,
         date_added, date_invalidated, parent_id,
         systems, subsystems, cscs, category, time_lost_type,
         components, primary_software_components, primary_hardware_components,
         components_json
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                 ?21, ?22, ?23, ?24)",
      rusqlite::params![
        self.id,
        self.site_id,
        self.message_text,
        self.level,
        self.tags,
        self.urls,
        self.time_lost,
        self.date_begin,
        self.date_end,
        self.user_id,
        self.user_agent,
        self.is_human,
        self.date_added,
        self.date_invalidated,
        self.parent_id,
        self.systems,
        self.subsystems,
        self.cscs,
        self.category,
        self.time_lost_type,
        self.components,
        self.primary_software_components,
        self.primary_hardware_components,
        self.components_json,
      ],
    )?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width() {
    let whole = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
    let fraction = whole + chrono::Duration::microseconds(7);
    assert_eq!(encode_dt(whole), "2024-01-02T03:04:05.000000");
    assert_eq!(encode_dt(fraction), "2024-01-02T03:04:05.000007");
    assert!(encode_dt(whole) < encode_dt(fraction));
    assert_eq!(decode_dt(&encode_dt(fraction)).unwrap(), fraction);
  }

  #[test]
  fn clock_has_store_precision() {
    let t = now();
    assert_eq!(decode_dt(&encode_dt(t)).unwrap(), t);
  }

  #[test]
  fn absent_components_json_stays_null() {
    assert_eq!(encode_json(None).unwrap(), None);
    assert_eq!(decode_json(None).unwrap(), None);
    let nested = serde_json::json!({ "MTMount": { "axes": ["az", "el"] } });
    let stored = encode_json(Some(&nested)).unwrap().unwrap();
    assert_eq!(decode_json(Some(&stored)).unwrap(), Some(nested));
  }
}
