//! Compilation of a [`MessageQuery`] into one parameterised SQL statement.
//!
//! Every filter contributes at most one condition to a conjunction; user
//! values are always bound as parameters, never interpolated. Column names
//! come from closed enumerations only.

use narrativelog_core::query::{MessageQuery, OrderBy, OrderField};
use rusqlite::types::Value;

use crate::{encode::encode_dt, schema::MESSAGE_COLUMNS};

/// Name of the scalar SQL function registered on every connection that
/// lowercases text with full Unicode case mapping (SQLite's `lower()` only
/// handles ASCII).
pub const UNICODE_LOWER: &str = "unicode_lower";

/// A ready-to-run statement and its positional parameters.
#[derive(Debug)]
pub struct CompiledQuery {
  pub sql:    String,
  pub params: Vec<Value>,
}

#[derive(Default)]
struct Conditions {
  clauses: Vec<String>,
  params:  Vec<Value>,
}

impl Conditions {
  fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
    self.clauses.push(clause.into());
    self.params.extend(params);
  }

  fn min<T: Into<Value>>(&mut self, column: &str, bound: Option<T>) {
    if let Some(b) = bound {
      self.push(format!("m.{column} >= ?"), [b.into()]);
    }
  }

  fn max<T: Into<Value>>(&mut self, column: &str, bound: Option<T>) {
    if let Some(b) = bound {
      self.push(format!("m.{column} <= ?"), [b.into()]);
    }
  }

  fn is_null(&mut self, column: &str, expect_present: Option<bool>) {
    match expect_present {
      Some(true) => self.push(format!("m.{column} IS NOT NULL"), []),
      Some(false) => self.push(format!("m.{column} IS NULL"), []),
      None => {}
    }
  }

  fn one_of(&mut self, column: &str, values: &[String]) {
    if values.is_empty() {
      return;
    }
    self.push(
      format!("m.{column} IN ({})", placeholders(values.len())),
      values.iter().cloned().map(Value::Text),
    );
  }

  /// At least one element of the JSON array in `column` is in `values`
  /// (or, when `negate`, none is).
  fn overlap(&mut self, column: &str, values: &[String], negate: bool) {
    if values.is_empty() {
      return;
    }
    let not = if negate { "NOT " } else { "" };
    self.push(
      format!(
        "{not}EXISTS (SELECT 1 FROM json_each(m.{column}) AS e WHERE e.value IN ({}))",
        placeholders(values.len())
      ),
      values.iter().cloned().map(Value::Text),
    );
  }
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn saturating_i64(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn dt(value: Option<chrono::NaiveDateTime>) -> Option<String> { value.map(encode_dt) }

/// SQL expression that a field is ordered by.
fn order_expr(field: OrderField) -> &'static str {
  match field {
    OrderField::Id => "m.id",
    OrderField::SiteId => "m.site_id",
    OrderField::MessageText => "m.message_text",
    OrderField::Level => "m.level",
    OrderField::Tags => "m.tags",
    OrderField::Urls => "m.urls",
    OrderField::TimeLost => "m.time_lost",
    OrderField::DateBegin => "m.date_begin",
    OrderField::DateEnd => "m.date_end",
    OrderField::UserId => "m.user_id",
    OrderField::UserAgent => "m.user_agent",
    OrderField::IsHuman => "m.is_human",
    OrderField::IsValid => "(m.date_invalidated IS NULL)",
    OrderField::DateAdded => "m.date_added",
    OrderField::DateInvalidated => "m.date_invalidated",
    OrderField::ParentId => "m.parent_id",
    OrderField::Systems => "m.systems",
    OrderField::Subsystems => "m.subsystems",
    OrderField::Cscs => "m.cscs",
    OrderField::Components => "m.components",
    OrderField::PrimarySoftwareComponents => "m.primary_software_components",
    OrderField::PrimaryHardwareComponents => "m.primary_hardware_components",
    OrderField::Category => "m.category",
    OrderField::TimeLostType => "m.time_lost_type",
  }
}

fn order_clause(keys: &[OrderBy]) -> String {
  keys
    .iter()
    .map(|k| format!("{} {}", order_expr(k.field), if k.descending { "DESC" } else { "ASC" }))
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn compile(query: &MessageQuery) -> CompiledQuery {
  let mut c = Conditions::default();

  if let Some(text) = &query.message_text {
    c.push(
      format!("instr({UNICODE_LOWER}(m.message_text), ?) > 0"),
      [Value::Text(text.to_lowercase())],
    );
  }

  c.one_of("site_id", &query.site_ids);
  c.one_of("user_id", &query.user_ids);
  c.one_of("user_agent", &query.user_agents);

  c.min("level", query.min_level);
  c.max("level", query.max_level);

  c.overlap("tags", &query.tags, false);
  c.overlap("systems", &query.systems, false);
  c.overlap("subsystems", &query.subsystems, false);
  c.overlap("cscs", &query.cscs, false);
  c.overlap("components", &query.components, false);
  c.overlap("primary_software_components", &query.primary_software_components, false);
  c.overlap("primary_hardware_components", &query.primary_hardware_components, false);
  c.overlap("urls", &query.urls, false);
  c.overlap("tags", &query.exclude_tags, true);
  c.overlap("systems", &query.exclude_systems, true);
  c.overlap("subsystems", &query.exclude_subsystems, true);
  c.overlap("cscs", &query.exclude_cscs, true);
  c.overlap("components", &query.exclude_components, true);
  c.overlap(
    "primary_software_components",
    &query.exclude_primary_software_components,
    true,
  );
  c.overlap(
    "primary_hardware_components",
    &query.exclude_primary_hardware_components,
    true,
  );

  c.min("time_lost", query.min_time_lost);
  c.max("time_lost", query.max_time_lost);

  c.is_null("date_begin", query.has_date_begin);
  c.min("date_begin", dt(query.min_date_begin));
  c.max("date_begin", dt(query.max_date_begin));

  c.is_null("date_end", query.has_date_end);
  c.min("date_end", dt(query.min_date_end));
  c.max("date_end", dt(query.max_date_end));

  if let Some(human) = query.is_human {
    c.push("m.is_human = ?", [Value::Integer(i64::from(human))]);
  }
  // Validity is derived, never stored.
  c.is_null("date_invalidated", query.is_valid.map(|valid| !valid));

  c.min("date_added", dt(query.min_date_added));
  c.max("date_added", dt(query.max_date_added));

  c.is_null("date_invalidated", query.has_date_invalidated);
  c.min("date_invalidated", dt(query.min_date_invalidated));
  c.max("date_invalidated", dt(query.max_date_invalidated));

  c.is_null("parent_id", query.has_parent_id);

  let where_clause = if c.clauses.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", c.clauses.join(" AND "))
  };

  let sql = format!(
    "SELECT {MESSAGE_COLUMNS}
     FROM message m
     {where_clause}
     ORDER BY {}
     LIMIT ? OFFSET ?",
    order_clause(&query.ordering())
  );

  // SQLite reads a negative LIMIT as "no limit"; bounds past i64 saturate.
  let mut params = c.params;
  params.push(Value::Integer(query.limit.map_or(-1, saturating_i64)));
  params.push(Value::Integer(saturating_i64(query.offset)));

  CompiledQuery { sql, params }
}
