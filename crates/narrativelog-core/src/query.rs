//! Query types for [`MessageStore::find`](crate::store::MessageStore::find).
//!
//! [`FindMessagesParams`] is the raw, string-typed form received from a
//! caller; [`FindMessagesParams::validate`] turns it into a [`MessageQuery`]
//! or reports every problem at once. A [`MessageQuery`] is always
//! executable: its field names and ordering keys are a closed set.
//!
//! Range bounds (`min_*` / `max_*`) are inclusive on both ends.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

use crate::validation::{ValidationError, Violations};

// ─── Ordering ────────────────────────────────────────────────────────────────

/// A message field that results may be ordered by.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum OrderField {
  Id,
  SiteId,
  MessageText,
  Level,
  Tags,
  Urls,
  TimeLost,
  DateBegin,
  DateEnd,
  UserId,
  UserAgent,
  IsHuman,
  IsValid,
  DateAdded,
  DateInvalidated,
  ParentId,
  Systems,
  Subsystems,
  Cscs,
  Components,
  PrimarySoftwareComponents,
  PrimaryHardwareComponents,
  Category,
  TimeLostType,
}

impl OrderField {
  pub fn name(self) -> &'static str { self.into() }

  /// Every accepted `order_by` value, ascending and descending.
  pub fn accepted_values() -> Vec<String> {
    OrderField::iter()
      .flat_map(|f| [f.name().to_owned(), format!("-{}", f.name())])
      .collect()
  }
}

/// One ordering key. Written `field` for ascending or `-field` for
/// descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
  pub field:      OrderField,
  pub descending: bool,
}

impl OrderBy {
  pub fn asc(field: OrderField) -> Self { Self { field, descending: false } }

  pub fn desc(field: OrderField) -> Self { Self { field, descending: true } }
}

impl FromStr for OrderBy {
  type Err = strum::ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.strip_prefix('-') {
      Some(name) => Ok(Self::desc(name.parse()?)),
      None => Ok(Self::asc(s.parse()?)),
    }
  }
}

impl fmt::Display for OrderBy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.descending {
      write!(f, "-")?;
    }
    f.write_str(self.field.name())
  }
}

// ─── MessageQuery ────────────────────────────────────────────────────────────

/// A validated set of filters. Every field left at its default imposes no
/// restriction; supplied filters are combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageQuery {
  /// Case-insensitive substring of `message_text`.
  pub message_text:                        Option<String>,
  pub site_ids:                            Vec<String>,
  pub user_ids:                            Vec<String>,
  pub user_agents:                         Vec<String>,
  pub min_level:                           Option<i32>,
  pub max_level:                           Option<i32>,
  /// Array overlap: at least one element in common.
  pub tags:                                Vec<String>,
  pub systems:                             Vec<String>,
  pub subsystems:                          Vec<String>,
  pub cscs:                                Vec<String>,
  pub components:                          Vec<String>,
  pub primary_software_components:         Vec<String>,
  pub primary_hardware_components:         Vec<String>,
  pub urls:                                Vec<String>,
  /// Array disjointness: no element in common.
  pub exclude_tags:                        Vec<String>,
  pub exclude_systems:                     Vec<String>,
  pub exclude_subsystems:                  Vec<String>,
  pub exclude_cscs:                        Vec<String>,
  pub exclude_components:                  Vec<String>,
  pub exclude_primary_software_components: Vec<String>,
  pub exclude_primary_hardware_components: Vec<String>,
  pub min_time_lost:                       Option<f64>,
  pub max_time_lost:                       Option<f64>,
  pub has_date_begin:                      Option<bool>,
  pub min_date_begin:                      Option<NaiveDateTime>,
  pub max_date_begin:                      Option<NaiveDateTime>,
  pub has_date_end:                        Option<bool>,
  pub min_date_end:                        Option<NaiveDateTime>,
  pub max_date_end:                        Option<NaiveDateTime>,
  pub is_human:                            Option<bool>,
  pub is_valid:                            Option<bool>,
  pub min_date_added:                      Option<NaiveDateTime>,
  pub max_date_added:                      Option<NaiveDateTime>,
  pub has_date_invalidated:                Option<bool>,
  pub min_date_invalidated:                Option<NaiveDateTime>,
  pub max_date_invalidated:                Option<NaiveDateTime>,
  pub has_parent_id:                       Option<bool>,
  /// Requested ordering; see [`MessageQuery::ordering`].
  pub order_by:                            Vec<OrderBy>,
  pub offset:                              usize,
  /// `None` means unbounded.
  pub limit:                               Option<usize>,
}

impl MessageQuery {
  /// The effective ordering: `order_by` followed by `id` ascending unless
  /// `id` is already a key, so that the order is total and repeatable.
  pub fn ordering(&self) -> Vec<OrderBy> {
    let mut keys = self.order_by.clone();
    if !keys.iter().any(|k| k.field == OrderField::Id) {
      keys.push(OrderBy::asc(OrderField::Id));
    }
    keys
  }
}

// ─── Raw parameters ──────────────────────────────────────────────────────────

/// Either / true / false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
  #[default]
  Either,
  True,
  False,
}

impl TriState {
  pub fn as_option(self) -> Option<bool> {
    match self {
      Self::Either => None,
      Self::True => Some(true),
      Self::False => Some(false),
    }
  }
}

/// Raw find parameters as received in a query string. List-valued filters
/// are comma-separated; dates are ISO 8601 with no time zone suffix.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindMessagesParams {
  pub message_text:                        Option<String>,
  pub site_ids:                            Option<String>,
  pub user_ids:                            Option<String>,
  pub user_agents:                         Option<String>,
  pub min_level:                           Option<i32>,
  pub max_level:                           Option<i32>,
  pub tags:                                Option<String>,
  pub exclude_tags:                        Option<String>,
  pub systems:                             Option<String>,
  pub exclude_systems:                     Option<String>,
  pub subsystems:                          Option<String>,
  pub exclude_subsystems:                  Option<String>,
  pub cscs:                                Option<String>,
  pub exclude_cscs:                        Option<String>,
  pub components:                          Option<String>,
  pub exclude_components:                  Option<String>,
  pub primary_software_components:         Option<String>,
  pub exclude_primary_software_components: Option<String>,
  pub primary_hardware_components:         Option<String>,
  pub exclude_primary_hardware_components: Option<String>,
  pub urls:                                Option<String>,
  pub min_time_lost:                       Option<f64>,
  pub max_time_lost:                       Option<f64>,
  pub has_date_begin:                      Option<TriState>,
  pub min_date_begin:                      Option<String>,
  pub max_date_begin:                      Option<String>,
  pub has_date_end:                        Option<TriState>,
  pub min_date_end:                        Option<String>,
  pub max_date_end:                        Option<String>,
  pub is_human:                            Option<TriState>,
  pub is_valid:                            Option<TriState>,
  pub min_date_added:                      Option<String>,
  pub max_date_added:                      Option<String>,
  pub has_date_invalidated:                Option<TriState>,
  pub min_date_invalidated:                Option<String>,
  pub max_date_invalidated:                Option<String>,
  pub has_parent_id:                       Option<TriState>,
  /// Comma-separated field names, each optionally prefixed with `-`.
  pub order_by:                            Option<String>,
  pub offset:                              Option<usize>,
  pub limit:                               Option<usize>,
}

fn split_list(value: Option<String>) -> Vec<String> {
  value
    .map(|s| {
      s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
    })
    .unwrap_or_default()
}

fn tri(value: Option<TriState>) -> Option<bool> { value.and_then(TriState::as_option) }

impl FindMessagesParams {
  pub fn validate(self) -> Result<MessageQuery, ValidationError> {
    let mut v = Violations::default();

    let mut order_by = Vec::new();
    let mut unknown = Vec::new();
    for key in split_list(self.order_by) {
      match key.parse::<OrderBy>() {
        Ok(o) => order_by.push(o),
        Err(_) => unknown.push(key),
      }
    }
    if !unknown.is_empty() {
      unknown.sort();
      v.push(
        "order_by",
        format!(
          "invalid fields: {unknown:?}; allowed values are {:?}",
          OrderField::accepted_values()
        ),
      );
    }

    let tags = v.tags("tags", split_list(self.tags));
    let exclude_tags = v.tags("exclude_tags", split_list(self.exclude_tags));

    let query = MessageQuery {
      message_text: self.message_text.filter(|t| !t.is_empty()),
      site_ids: split_list(self.site_ids),
      user_ids: split_list(self.user_ids),
      user_agents: split_list(self.user_agents),
      min_level: self.min_level,
      max_level: self.max_level,
      tags,
      systems: split_list(self.systems),
      subsystems: split_list(self.subsystems),
      cscs: split_list(self.cscs),
      components: split_list(self.components),
      primary_software_components: split_list(self.primary_software_components),
      primary_hardware_components: split_list(self.primary_hardware_components),
      urls: split_list(self.urls),
      exclude_tags,
      exclude_systems: split_list(self.exclude_systems),
      exclude_subsystems: split_list(self.exclude_subsystems),
      exclude_cscs: split_list(self.exclude_cscs),
      exclude_components: split_list(self.exclude_components),
      exclude_primary_software_components: split_list(
        self.exclude_primary_software_components,
      ),
      exclude_primary_hardware_components: split_list(
        self.exclude_primary_hardware_components,
      ),
      min_time_lost: self.min_time_lost,
      max_time_lost: self.max_time_lost,
      has_date_begin: tri(self.has_date_begin),
      min_date_begin: v.date("min_date_begin", self.min_date_begin.as_deref()),
      max_date_begin: v.date("max_date_begin", self.max_date_begin.as_deref()),
      has_date_end: tri(self.has_date_end),
      min_date_end: v.date("min_date_end", self.min_date_end.as_deref()),
      max_date_end: v.date("max_date_end", self.max_date_end.as_deref()),
      is_human: tri(self.is_human),
      is_valid: tri(self.is_valid),
      min_date_added: v.date("min_date_added", self.min_date_added.as_deref()),
      max_date_added: v.date("max_date_added", self.max_date_added.as_deref()),
      has_date_invalidated: tri(self.has_date_invalidated),
      min_date_invalidated: v
        .date("min_date_invalidated", self.min_date_invalidated.as_deref()),
      max_date_invalidated: v
        .date("max_date_invalidated", self.max_date_invalidated.as_deref()),
      has_parent_id: tri(self.has_parent_id),
      order_by,
      offset: self.offset.unwrap_or(0),
      limit: self.limit,
    };

    v.finish(query)
  }
}
