use std::{cmp::Ordering, str::FromStr};

use serde_json::Value;

use crate::{
    config::SearchWeights,
    error::Error,
    item::Item,
};

/// Maximum page size; larger requests are clamped, not rejected.
pub const MAX_PER_PAGE: usize = 100;
const DEFAULT_PER_PAGE: usize = 10;

/// Comparison operator for a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
}

impl FromStr for FieldOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "=" | "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "like" => Self::Like,
            other => {
                return Err(Error::Config(format!(
                    "unknown field operator `{other}`"
                )));
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    field: String,
    /// `None` is an unrecognized operator from a dynamic source; it matches
    /// nothing rather than erroring.
    op: Option<FieldOp>,
    value: Value,
}

/// Which statuses a query admits. Published-only is the default so the
/// public site can never leak drafts by accident.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum StatusFilter {
    #[default]
    Published,
    Exactly(String),
    Any,
}

/// A content query, built fluently and executed against a backend.
///
/// ```
/// use loam::query::{Direction, Query};
///
/// let q = Query::new("post")
///     .with_term("tag", "rust")
///     .order_by("date", Direction::Desc)
///     .per_page(5)
///     .page(2);
/// assert_eq!(q.type_name(), Some("post"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `None` queries the union of every content type.
    type_name: Option<String>,
    status: StatusFilter,
    filters: Vec<Filter>,
    terms: Vec<(String, String)>,
    search: Option<String>,
    order_field: String,
    direction: Direction,
    page: usize,
    per_page: usize,
}

impl Query {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::across_types()
        }
    }

    /// A query over every content type at once.
    pub fn across_types() -> Self {
        Self {
            type_name: None,
            status: StatusFilter::default(),
            filters: Vec::new(),
            terms: Vec::new(),
            search: None,
            order_field: "date".to_string(),
            direction: Direction::Desc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Whether this query carries a search needle.
    pub fn is_search(&self) -> bool {
        self.search.is_some()
    }

    /// Admit only items with exactly this status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = StatusFilter::Exactly(status.into());
        self
    }

    /// Admit items regardless of status, drafts included.
    pub fn any_status(mut self) -> Self {
        self.status = StatusFilter::Any;
        self
    }

    /// Filter on a built-in or custom field.
    pub fn where_field(
        mut self,
        field: impl Into<String>,
        op: FieldOp,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: Some(op),
            value: value.into(),
        });
        self
    }

    /// Like [`Query::where_field`] but with a textual operator, for callers
    /// assembling queries from untrusted input. An operator that does not
    /// parse produces a filter that matches nothing.
    pub fn where_field_str(
        mut self,
        field: impl Into<String>,
        op: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: op.parse().ok(),
            value: value.into(),
        });
        self
    }

    /// Require membership in a taxonomy term.
    pub fn with_term(
        mut self,
        taxonomy: impl Into<String>,
        term: impl Into<String>,
    ) -> Self {
        self.terms.push((taxonomy.into(), term.into()));
        self
    }

    /// Relevance search over title and excerpt. A non-empty needle makes the
    /// result ordering score-descending regardless of `order_by`.
    pub fn search(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.search = if needle.trim().is_empty() {
            None
        } else {
            Some(needle)
        };
        self
    }

    pub fn order_by(
        mut self,
        field: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.order_field = field.into();
        self.direction = direction;
        self
    }

    /// 1-based page number; values below 1 clamp to 1.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Page size, clamped to `1..=100`.
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Execute against the full candidate item set.
    ///
    /// Filtering, scoring, ordering and pagination all happen here so every
    /// backend returns identical results for the same item set.
    pub fn execute(
        &self,
        items: impl IntoIterator<Item = Item>,
        weights: &SearchWeights,
    ) -> QueryResults {
        let mut hits: Vec<Hit> = items
            .into_iter()
            .filter(|item| self.admits(item))
            .map(|item| Hit { item, score: 0 })
            .collect();

        if let Some(needle) = &self.search {
            for hit in &mut hits {
                hit.score = score(&hit.item, needle, weights);
            }
            hits.retain(|hit| hit.score > 0);
            hits.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then_with(|| title_key(&a.item).cmp(&title_key(&b.item)))
                    .then_with(|| a.item.slug.cmp(&b.item.slug))
            });
        } else {
            hits.sort_by(|a, b| {
                let ord = a
                    .item
                    .sort_value(&self.order_field)
                    .cmp(&b.item.sort_value(&self.order_field));
                let ord = match self.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                ord.then_with(|| title_key(&a.item).cmp(&title_key(&b.item)))
                    .then_with(|| a.item.slug.cmp(&b.item.slug))
            });
        }

        let total = hits.len();
        let offset =
            self.page.saturating_sub(1).saturating_mul(self.per_page);
        let page_hits = if offset >= total {
            Vec::new()
        } else {
            hits.into_iter().skip(offset).take(self.per_page).collect()
        };

        QueryResults {
            hits: page_hits,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    fn admits(&self, item: &Item) -> bool {
        if let Some(type_name) = &self.type_name {
            if &item.type_name != type_name {
                return false;
            }
        }
        match &self.status {
            StatusFilter::Published => {
                if !item.is_published() {
                    return false;
                }
            }
            StatusFilter::Exactly(status) => {
                if &item.status != status {
                    return false;
                }
            }
            StatusFilter::Any => {}
        }
        for (taxonomy, term) in &self.terms {
            let wanted = crate::parser::slugify(term);
            if !item.terms_for(taxonomy).iter().any(|t| t == &wanted) {
                return false;
            }
        }
        self.filters.iter().all(|filter| {
            let Some(op) = filter.op else {
                return false;
            };
            matches_filter(
                field_value(item, &filter.field).as_ref(),
                op,
                &filter.value,
            )
        })
    }
}

/// One matched item; `score` is zero unless the query searched.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub item: Item,
    pub score: i64,
}

/// A page of results plus the pagination envelope.
///
/// `total` counts all matches, not just this page, so
/// `sum over pages of hits.len() == total` always holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResults {
    pub hits: Vec<Hit>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl QueryResults {
    pub fn total_pages(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1 && self.total > 0
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.hits.iter().map(|hit| &hit.item)
    }

    /// The full pagination envelope as one value, for serializing into API
    /// or CLI responses.
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages(),
            has_more: self.has_more(),
            has_previous: self.has_previous(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_more: bool,
    pub has_previous: bool,
}

/// A filterable value for an item field, built-ins first, then the open
/// custom-field map. Dates compare as their ISO string form.
fn field_value(item: &Item, field: &str) -> Option<Value> {
    match field {
        "id" => Some(Value::String(item.id.clone())),
        "slug" => Some(Value::String(item.slug.clone())),
        "title" => Some(Value::String(item.title.clone())),
        "status" => Some(Value::String(item.status.clone())),
        "date" => item.date.map(|d| Value::String(d.to_string())),
        "updated" => item.updated.map(|d| Value::String(d.to_string())),
        "excerpt" => item.excerpt.clone().map(Value::String),
        "order" => Some(Value::from(item.order)),
        other => item.field(other).cloned(),
    }
}

/// Apply one filter. Missing fields and type-mismatched comparisons satisfy
/// only `!=` (and `not_in`); everything else fails closed.
fn matches_filter(actual: Option<&Value>, op: FieldOp, expected: &Value) -> bool {
    match op {
        FieldOp::Eq => compare(actual, expected) == Some(Ordering::Equal),
        FieldOp::Ne => compare(actual, expected) != Some(Ordering::Equal),
        FieldOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FieldOp::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FieldOp::Lt => compare(actual, expected) == Some(Ordering::Less),
        FieldOp::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FieldOp::In => match expected {
            Value::Array(candidates) => candidates
                .iter()
                .any(|c| compare(actual, c) == Some(Ordering::Equal)),
            _ => false,
        },
        FieldOp::NotIn => match expected {
            Value::Array(candidates) => !candidates
                .iter()
                .any(|c| compare(actual, c) == Some(Ordering::Equal)),
            _ => false,
        },
        FieldOp::Like => match (actual, expected) {
            (Some(Value::String(haystack)), Value::String(needle)) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        },
    }
}

/// Same-type comparison: numbers as f64, strings lexically, bools as bools.
/// Mixed or missing types are incomparable (`None`).
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn title_key(item: &Item) -> String {
    item.title.to_lowercase()
}

/// Relevance score for one item. Zero means "not a match".
fn score(item: &Item, needle: &str, weights: &SearchWeights) -> i64 {
    let phrase = needle.trim().to_lowercase();
    if phrase.is_empty() {
        return 0;
    }
    let tokens: Vec<&str> =
        phrase.split_whitespace().filter(|t| !t.is_empty()).collect();

    let title = item.title.to_lowercase();
    let excerpt = item
        .excerpt
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut score = 0;

    if title.contains(&phrase) {
        score += weights.title_phrase;
    }
    if tokens.len() >= 2 && tokens.iter().all(|t| title.contains(t)) {
        score += weights.title_all_tokens;
    }
    let title_hits =
        tokens.iter().filter(|t| title.contains(*t)).count() as i64;
    score += (title_hits * weights.title_token).min(weights.title_token_cap);

    if !excerpt.is_empty() {
        if excerpt.contains(&phrase) {
            score += weights.excerpt_phrase;
        }
        let excerpt_hits =
            tokens.iter().filter(|t| excerpt.contains(*t)).count() as i64;
        score += (excerpt_hits * weights.excerpt_token)
            .min(weights.excerpt_token_cap);
    }

    if item.is_featured() {
        score += weights.featured;
    }

    score
}
