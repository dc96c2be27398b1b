use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One piece of content: cached metadata only. The raw body is never part of
/// the index; the repository hydrates it from `file_path` on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// 26-character ULID, lexicographically sortable by creation time.
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// URL-safe, unique per type.
    pub slug: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Manual sort key.
    #[serde(default)]
    pub order: i64,
    /// Open map of custom front-matter fields.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Taxonomy memberships: taxonomy name → term slugs.
    #[serde(default)]
    pub terms: BTreeMap<String, Vec<String>>,
    /// Source file path relative to the site root.
    pub file_path: String,
}

pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_DRAFT: &str = "draft";

impl Item {
    pub fn is_published(&self) -> bool {
        self.status == STATUS_PUBLISHED
    }

    /// Term slugs for one taxonomy (empty slice when the item has none).
    pub fn terms_for(&self, taxonomy: &str) -> &[String] {
        self.terms.get(taxonomy).map_or(&[], Vec::as_slice)
    }

    /// A custom front-matter field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_featured(&self) -> bool {
        matches!(self.field("featured"), Some(Value::Bool(true)))
    }

    /// The `type:slug` key used in taxonomy term membership lists.
    pub fn member_key(&self) -> String {
        format!("{}:{}", self.type_name, self.slug)
    }

    /// The value this item sorts by for a given field.
    ///
    /// Items lacking the field sort as the field's zero/empty value rather
    /// than being dropped.
    pub fn sort_value(&self, order_by: &str) -> SortValue {
        match order_by {
            "date" => SortValue::Number(date_timestamp(self.date) as f64),
            "updated" => {
                SortValue::Number(date_timestamp(self.updated) as f64)
            }
            "title" => SortValue::Text(self.title.to_lowercase()),
            "order" | "menu_order" => SortValue::Number(self.order as f64),
            field => match self.field(field) {
                Some(Value::Number(n)) => {
                    SortValue::Number(n.as_f64().unwrap_or(0.0))
                }
                Some(Value::String(s)) => SortValue::Text(s.clone()),
                Some(Value::Bool(b)) => {
                    SortValue::Number(if *b { 1.0 } else { 0.0 })
                }
                _ => SortValue::Text(String::new()),
            },
        }
    }
}

fn date_timestamp(date: Option<NaiveDate>) -> i64 {
    date.map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp())
        .unwrap_or(0)
}

/// A comparable sort key extracted from an item.
///
/// Numbers order before text so that mixed-type custom fields still sort
/// deterministically.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Text(String),
}

impl Eq for SortValue {}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An item together with its lazily loaded raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub item: Item,
    pub body: String,
}

#[cfg(test)]
pub(crate) fn test_item(type_name: &str, slug: &str, title: &str) -> Item {
    Item {
        id: crate::ulid::from_seed(&format!("{type_name}:{slug}")),
        type_name: type_name.to_string(),
        slug: slug.to_string(),
        title: title.to_string(),
        status: STATUS_PUBLISHED.to_string(),
        date: None,
        updated: None,
        excerpt: None,
        order: 0,
        fields: BTreeMap::new(),
        terms: BTreeMap::new(),
        file_path: format!("content/{type_name}s/{slug}.md"),
    }
}
