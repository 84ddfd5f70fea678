//! Field-level validation of creation and edit payloads.
//!
//! Raw request types carry dates as strings so that a time-zone suffix can be
//! detected and reported instead of being silently converted. Validation is
//! pure and exhaustive: every violation found is reported in one
//! [`ValidationError`].

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound as _};
use serde::{Deserialize, Serialize};

use crate::message::{MessageEdit, NewMessage, SITE_ID_LEN};

/// Inclusive bounds of the `level` field.
pub const MIN_LEVEL: i32 = 0;
pub const MAX_LEVEL: i32 = 1000;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  pub field:   String,
  pub message: String,
}

/// All the violations found in a payload. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
  pub violations: Vec<Violation>,
}

impl ValidationError {
  pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      violations: vec![Violation { field: field.into(), message: message.into() }],
    }
  }

  /// Whether any violation concerns `field`.
  pub fn mentions(&self, field: &str) -> bool {
    self.violations.iter().any(|v| v.field == field)
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid request: ")?;
    for (i, v) in self.violations.iter().enumerate() {
      if i > 0 {
        write!(f, "; ")?;
      }
      write!(f, "{}: {}", v.field, v.message)?;
    }
    Ok(())
  }
}

impl std::error::Error for ValidationError {}

/// Accumulates violations while a payload is checked.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<Violation>);

impl Violations {
  pub(crate) fn push(&mut self, field: &str, message: impl Into<String>) {
    self.0.push(Violation { field: field.to_owned(), message: message.into() });
  }

  /// `Ok(value)` if nothing was recorded.
  pub(crate) fn finish<T>(self, value: T) -> Result<T, ValidationError> {
    if self.0.is_empty() {
      Ok(value)
    } else {
      Err(ValidationError { violations: self.0 })
    }
  }

  /// Record a missing required field and return a placeholder.
  fn required<T: Default>(&mut self, field: &str, value: Option<T>) -> T {
    value.unwrap_or_else(|| {
      self.push(field, "is required");
      T::default()
    })
  }

  /// Like [`Self::required`], additionally rejecting blank text.
  fn required_text(&mut self, field: &str, value: Option<String>) -> String {
    if let Some(text) = &value {
      self.non_empty(field, text);
    }
    self.required(field, value)
  }

  fn non_empty(&mut self, field: &str, value: &str) {
    if value.trim().is_empty() {
      self.push(field, "must not be empty");
    }
  }

  pub(crate) fn date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDateTime> {
    let raw = value?;
    match parse_naive_datetime(raw) {
      Ok(dt) => Some(dt),
      Err(DateError::HasTimeZone) => {
        self.push(field, "must not have a time zone suffix");
        None
      }
      Err(DateError::Malformed) => {
        self.push(field, "is not a valid ISO 8601 date-time");
        None
      }
    }
  }

  fn level(&mut self, field: &str, level: i32) {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
      self.push(field, format!("must be between {MIN_LEVEL} and {MAX_LEVEL}"));
    }
  }

  pub(crate) fn tags(&mut self, field: &str, tags: Vec<String>) -> Vec<String> {
    match normalize_tags(&tags) {
      Ok(normalized) => normalized,
      Err(bad) => {
        self.push(field, format!("invalid tags: {bad:?}. {TAG_DESCRIPTION}"));
        tags
      }
    }
  }

  fn names(&mut self, field: &str, names: &[String]) {
    if names.iter().any(|n| n.trim().is_empty()) {
      self.push(field, "entries must not be empty");
    }
  }

  fn urls(&mut self, field: &str, urls: &[String]) {
    let bad: Vec<&str> = urls
      .iter()
      .map(String::as_str)
      .filter(|u| u.is_empty() || u.chars().any(char::is_whitespace))
      .collect();
    if !bad.is_empty() {
      self.push(field, format!("invalid urls: {bad:?}"));
    }
  }

  fn components_json(&mut self, field: &str, value: Option<&serde_json::Value>) {
    if value.is_some_and(|v| !v.is_object()) {
      self.push(field, "must be a JSON object");
    }
  }

  fn time_lost(&mut self, field: &str, seconds: f64) {
    if !seconds.is_finite() || seconds < 0.0 {
      self.push(field, "must be a non-negative number of seconds");
    }
  }

  fn site_id(&mut self, field: &str, site_id: &str) {
    if site_id.is_empty() {
      self.push(field, "must not be empty");
    } else if site_id.chars().count() > SITE_ID_LEN {
      self.push(field, format!("must be at most {SITE_ID_LEN} characters"));
    }
  }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateError {
  HasTimeZone,
  Malformed,
}

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M",
];

/// Parse an ISO 8601 date-time that carries no time zone (not even `Z`).
///
/// The result is truncated to microseconds, the precision messages are
/// stored with, so a parsed value compares equal to its stored form.
pub fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime, DateError> {
  let s = s.trim();
  if let Some(dt) = NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
  {
    return Ok(dt.trunc_subsecs(6));
  }
  if has_time_zone(s) || unescaped_offset(s).is_some_and(|s| has_time_zone(&s)) {
    Err(DateError::HasTimeZone)
  } else {
    Err(DateError::Malformed)
  }
}

fn has_time_zone(s: &str) -> bool {
  DateTime::parse_from_rfc3339(s).is_ok()
    || DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z").is_ok()
    || DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%z").is_ok()
}

/// An unescaped `+` in a query string decodes to a space, turning
/// `…T07:08:09+02:00` into `…T07:08:09 02:00`. Restore it.
fn unescaped_offset(s: &str) -> Option<String> {
  let (head, tail) = s.rsplit_once(' ')?;
  let offset_like = !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit() || c == ':');
  (offset_like && head.contains(':')).then(|| format!("{head}+{tail}"))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// Human-readable tag rule, suitable for error messages and docs.
pub const TAG_DESCRIPTION: &str = "Each tag must be at least two characters \
  long, must start with a letter, and must contain only ASCII letters, \
  digits, and _ (underscore). Tags are transformed to lowercase.";

pub fn is_valid_tag(tag: &str) -> bool {
  let mut chars = tag.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphabetic() => {}
    _ => return false,
  }
  tag.len() >= 2 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check every tag and, if all are valid, lowercase them in order.
/// Otherwise return the offending tags, sorted.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, Vec<String>> {
  let mut bad: Vec<String> = tags.iter().filter(|t| !is_valid_tag(t)).cloned().collect();
  if bad.is_empty() {
    Ok(tags.iter().map(|t| t.to_ascii_lowercase()).collect())
  } else {
    bad.sort();
    Err(bad)
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Raw JSON body for creating a message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessageRequest {
  pub message_text:                Option<String>,
  pub level:                       Option<i32>,
  #[serde(default)]
  pub tags:                        Vec<String>,
  #[serde(default)]
  pub urls:                        Vec<String>,
  #[serde(default)]
  pub systems:                     Vec<String>,
  #[serde(default)]
  pub subsystems:                  Vec<String>,
  #[serde(default)]
  pub cscs:                        Vec<String>,
  #[serde(default)]
  pub components:                  Vec<String>,
  #[serde(default)]
  pub primary_software_components: Vec<String>,
  #[serde(default)]
  pub primary_hardware_components: Vec<String>,
  /// Must be a JSON object when present.
  pub components_json:             Option<serde_json::Value>,
  /// Seconds; defaults to 0.
  pub time_lost:                   Option<f64>,
  /// ISO 8601 with no time zone suffix.
  pub date_begin:                  Option<String>,
  /// ISO 8601 with no time zone suffix.
  pub date_end:                    Option<String>,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
  pub user_id:                     Option<String>,
  pub user_agent:                  Option<String>,
  pub is_human:                    Option<bool>,
}

impl NewMessageRequest {
  /// Check the payload and produce a [`NewMessage`] stamped with `site_id`.
  pub fn validate(self, site_id: &str) -> Result<NewMessage, ValidationError> {
    let mut v = Violations::default();

    v.site_id("site_id", site_id);
    let message_text = v.required_text("message_text", self.message_text);
    if let Some(level) = self.level {
      v.level("level", level);
    }
    let level = v.required("level", self.level);
    let user_id = v.required_text("user_id", self.user_id);
    let user_agent = v.required_text("user_agent", self.user_agent);
    let is_human = v.required("is_human", self.is_human);

    let tags = v.tags("tags", self.tags);
    v.urls("urls", &self.urls);
    v.names("systems", &self.systems);
    v.names("subsystems", &self.subsystems);
    v.names("cscs", &self.cscs);
    v.names("components", &self.components);
    v.names("primary_software_components", &self.primary_software_components);
    v.names("primary_hardware_components", &self.primary_hardware_components);
    v.components_json("components_json", self.components_json.as_ref());
    let time_lost = self.time_lost.unwrap_or(0.0);
    v.time_lost("time_lost", time_lost);
    let date_begin = v.date("date_begin", self.date_begin.as_deref());
    let date_end = v.date("date_end", self.date_end.as_deref());

    v.finish(NewMessage {
      site_id: site_id.to_owned(),
      message_text,
      level,
      tags,
      urls: self.urls,
      time_lost,
      date_begin,
      date_end,
      user_id,
      user_agent,
      is_human,
      systems: self.systems,
      subsystems: self.subsystems,
      cscs: self.cscs,
      components: self.components,
      primary_software_components: self.primary_software_components,
      primary_hardware_components: self.primary_hardware_components,
      components_json: self.components_json,
      category: self.category,
      time_lost_type: self.time_lost_type,
    })
  }
}

// ─── Edit ────────────────────────────────────────────────────────────────────

/// Raw JSON body for editing a message; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
  pub message_text:                Option<String>,
  pub level:                       Option<i32>,
  pub tags:                        Option<Vec<String>>,
  pub urls:                        Option<Vec<String>>,
  pub systems:                     Option<Vec<String>>,
  pub subsystems:                  Option<Vec<String>>,
  pub cscs:                        Option<Vec<String>>,
  pub components:                  Option<Vec<String>>,
  pub primary_software_components: Option<Vec<String>>,
  pub primary_hardware_components: Option<Vec<String>>,
  pub components_json:             Option<serde_json::Value>,
  pub time_lost:                   Option<f64>,
  pub date_begin:                  Option<String>,
  pub date_end:                    Option<String>,
  pub category:                    Option<String>,
  pub time_lost_type:              Option<String>,
  pub user_id:                     Option<String>,
  pub user_agent:                  Option<String>,
  pub is_human:                    Option<bool>,
}

impl EditMessageRequest {
  /// Check the supplied fields and produce a [`MessageEdit`] performed by
  /// `site_id`.
  pub fn validate(self, site_id: &str) -> Result<MessageEdit, ValidationError> {
    let mut v = Violations::default();

    v.site_id("site_id", site_id);
    for (field, value) in [
      ("message_text", &self.message_text),
      ("user_id", &self.user_id),
      ("user_agent", &self.user_agent),
    ] {
      if let Some(value) = value {
        v.non_empty(field, value);
      }
    }
    if let Some(level) = self.level {
      v.level("level", level);
    }
    let tags = self.tags.map(|tags| v.tags("tags", tags));
    if let Some(urls) = &self.urls {
      v.urls("urls", urls);
    }
    for (field, names) in [
      ("systems", &self.systems),
      ("subsystems", &self.subsystems),
      ("cscs", &self.cscs),
      ("components", &self.components),
      ("primary_software_components", &self.primary_software_components),
      ("primary_hardware_components", &self.primary_hardware_components),
    ] {
      if let Some(names) = names {
        v.names(field, names);
      }
    }
    v.components_json("components_json", self.components_json.as_ref());
    if let Some(seconds) = self.time_lost {
      v.time_lost("time_lost", seconds);
    }
    let date_begin = v.date("date_begin", self.date_begin.as_deref());
    let date_end = v.date("date_end", self.date_end.as_deref());

    v.finish(MessageEdit {
      site_id: Some(site_id.to_owned()),
      message_text: self.message_text,
      level: self.level,
      tags,
      urls: self.urls,
      time_lost: self.time_lost,
      date_begin,
      date_end,
      user_id: self.user_id,
      user_agent: self.user_agent,
      is_human: self.is_human,
      systems: self.systems,
      subsystems: self.subsystems,
      cscs: self.cscs,
      components: self.components,
      primary_software_components: self.primary_software_components,
      primary_hardware_components: self.primary_hardware_components,
      components_json: self.components_json,
      category: self.category,
      time_lost_type: self.time_lost_type,
    })
  }
}
