//! Request normalization.
//!
//! Client requests arrive either as a JSON payload or as flattened
//! query-string keys (`columns[0][search][value]=...`). The query string is
//! unflattened into the same nested JSON shape, so one lenient reader handles
//! both. Malformed fragments fall back to defaults and never fail the request.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::PageLimits;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Exact match on `asc` or `desc`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }
}

/// A search value and its regex flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerm {
    pub value: String,
    pub regex: bool,
}

impl SearchTerm {
    pub fn new(value: impl Into<String>, regex: bool) -> Self {
        Self {
            value: value.into(),
            regex,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whitespace-separated words of the value.
    pub fn tokens(&self) -> Vec<&str> {
        tokenize(&self.value)
    }
}

/// Per-column request settings, aligned with the table's declared columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRequest {
    /// Declared name of the column.
    pub name: String,
    pub searchable: bool,
    pub orderable: bool,
    /// The column's own filter.
    pub search: SearchTerm,
    /// Filters of further request entries bound to the same column.
    pub extra_filters: Vec<SearchTerm>,
}

impl ColumnRequest {
    fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            searchable: true,
            orderable: true,
            search: SearchTerm::default(),
            extra_filters: Vec::new(),
        }
    }

    /// Every filter on this column; all of them must hold.
    pub fn filters(&self) -> impl Iterator<Item = &SearchTerm> {
        std::iter::once(&self.search).chain(&self.extra_filters)
    }

    fn excluded(name: &str) -> Self {
        Self {
            searchable: false,
            orderable: false,
            ..Self::defaults(name)
        }
    }
}

/// One requested sort key, resolved to a declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEntry {
    /// Position in the declared column list.
    pub column: usize,
    /// Declared name of that column.
    pub name: String,
    pub direction: Direction,
}

/// How request columns map onto declared columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Request column `i` is declared column `i`.
    Positional,
    /// Request columns name their declared column in `data` (or `name`).
    /// Entries naming unknown columns are ignored, and declared columns the
    /// request does not mention take no part in search or ordering.
    ByData,
}

/// A normalized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Echoed back unmodified.
    pub draw: i64,
    pub offset: u64,
    pub limit: u64,
    /// Global search box.
    pub search: SearchTerm,
    /// One entry per declared column.
    pub columns: Vec<ColumnRequest>,
    /// Sort keys, highest precedence first.
    pub order: Vec<OrderEntry>,
}

impl SearchRequest {
    /// Request with no search, no ordering and the default page.
    pub fn new<S: AsRef<str>>(names: &[S], limits: &PageLimits) -> Self {
        Self {
            draw: 0,
            offset: 0,
            limit: limits.default_length,
            search: SearchTerm::default(),
            columns: names
                .iter()
                .map(|name| ColumnRequest::defaults(name.as_ref()))
                .collect(),
            order: Vec::new(),
        }
    }

    /// Normalize a JSON payload against the declared column names.
    pub fn from_json<S: AsRef<str>>(
        payload: &Value,
        names: &[S],
        binding: Binding,
        limits: &PageLimits,
    ) -> Self {
        let names: Vec<&str> = names.iter().map(|name| name.as_ref()).collect();
        let raw_columns = payload.get("columns");
        let requested = entries(raw_columns);

        let (columns, positions) = match binding {
            Binding::Positional => bind_positional(&names, raw_columns),
            Binding::ByData if requested.is_empty() => bind_positional(&names, None),
            Binding::ByData => bind_by_data(&names, &requested),
        };

        let order = parse_order(payload.get("order"), &positions, &names);

        let request = Self {
            draw: payload.get("draw").and_then(as_i64).unwrap_or(0),
            offset: parse_offset(payload.get("start")),
            limit: parse_limit(payload.get("length"), limits),
            search: parse_search(payload.get("search")),
            columns,
            order,
        };

        debug!(
            draw = request.draw,
            offset = request.offset,
            limit = request.limit,
            search = %request.search.value,
            order_keys = request.order.len(),
            "normalized table request"
        );

        request
    }

    /// Normalize a flattened query string against the declared column names.
    pub fn from_query_string<S: AsRef<str>>(
        query: &str,
        names: &[S],
        binding: Binding,
        limits: &PageLimits,
    ) -> Self {
        Self::from_json(&unflatten(query), names, binding, limits)
    }
}

/// Split a search value into words on runs of whitespace.
pub fn tokenize(value: &str) -> Vec<&str> {
    value.split_whitespace().collect()
}

/// Decode `a[b][0]=x` style keys into nested JSON objects.
///
/// Every leaf is a string; list positions become object keys (`"0"`), which
/// the normalizer reads the same way as array indices. When a key is given
/// twice the first value wins.
pub fn unflatten(query: &str) -> Value {
    let mut root = Map::new();

    for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        let path = key_path(&key);
        if path.is_empty() {
            continue;
        }
        insert_path(&mut root, &path, value.into_owned());
    }

    Value::Object(root)
}

fn key_path(key: &str) -> Vec<String> {
    let (head, mut rest) = match key.find('[') {
        Some(at) => (&key[..at], &key[at..]),
        None => (key, ""),
    };
    if head.is_empty() {
        return Vec::new();
    }

    let mut path = vec![head.to_string()];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else {
            break;
        };
        path.push(stripped[..end].to_string());
        rest = &stripped[end + 1..];
    }
    path
}

fn insert_path(map: &mut Map<String, Value>, path: &[String], value: String) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    // `a[]=x` appends.
    let key = if first.is_empty() {
        map.len().to_string()
    } else {
        first.clone()
    };

    if rest.is_empty() {
        map.entry(key).or_insert(Value::String(value));
        return;
    }

    let child = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child) = child {
        insert_path(child, rest, value);
    }
}

fn bind_positional(names: &[&str], raw: Option<&Value>) -> (Vec<ColumnRequest>, Vec<Option<usize>>) {
    let columns = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut column = ColumnRequest::defaults(name);
            if let Some(entry) = raw.and_then(|raw| index(raw, i)) {
                apply_flags(&mut column, entry);
            }
            column
        })
        .collect();

    (columns, (0..names.len()).map(Some).collect())
}

fn bind_by_data(names: &[&str], requested: &[&Value]) -> (Vec<ColumnRequest>, Vec<Option<usize>>) {
    let mut columns: Vec<ColumnRequest> =
        names.iter().map(|name| ColumnRequest::excluded(name)).collect();
    let mut bound = vec![false; names.len()];

    let positions = requested
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let data = entry
                .get("data")
                .and_then(as_string)
                .filter(|data| !data.is_empty())
                .or_else(|| entry.get("name").and_then(as_string))
                .unwrap_or_default();

            let Some(declared) = names.iter().position(|name| *name == data) else {
                debug!(position, data = %data, "request column names no known column; ignoring");
                return None;
            };

            let column = &mut columns[declared];
            if bound[declared] {
                let search = parse_search(entry.get("search"));
                if !search.is_empty() {
                    column.extra_filters.push(search);
                }
            } else {
                column.searchable = true;
                column.orderable = true;
                apply_flags(column, entry);
                bound[declared] = true;
            }
            Some(declared)
        })
        .collect();

    (columns, positions)
}

fn apply_flags(column: &mut ColumnRequest, entry: &Value) {
    column.searchable = flag(entry.get("searchable"), true);
    column.orderable = flag(entry.get("orderable"), true);
    column.search = parse_search(entry.get("search"));
}

fn parse_search(raw: Option<&Value>) -> SearchTerm {
    let Some(raw) = raw else {
        return SearchTerm::default();
    };
    SearchTerm {
        value: raw.get("value").and_then(as_string).unwrap_or_default(),
        regex: flag(raw.get("regex"), false),
    }
}

/// Read `order[k]` entries until `order[k][column]` is missing.
///
/// `positions` maps request column positions to declared columns; entries
/// pointing outside it, at an unbound position, or with an unknown direction
/// are dropped and scanning continues.
fn parse_order(raw: Option<&Value>, positions: &[Option<usize>], names: &[&str]) -> Vec<OrderEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut order = Vec::new();
    for k in 0.. {
        let Some(entry) = index(raw, k) else {
            break;
        };
        let Some(column) = entry.get("column") else {
            break;
        };

        let declared = as_i64(column)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| positions.get(i).copied().flatten());
        let Some(declared) = declared else {
            debug!(entry = k, column = %column, "order entry references no column; dropping");
            continue;
        };

        let direction = match entry.get("dir") {
            None | Some(Value::Null) => Some(Direction::Asc),
            Some(dir) => as_string(dir).as_deref().and_then(Direction::parse),
        };
        let Some(direction) = direction else {
            debug!(entry = k, "order entry has an unknown direction; dropping");
            continue;
        };

        order.push(OrderEntry {
            column: declared,
            name: names[declared].to_string(),
            direction,
        });
    }
    order
}

fn parse_offset(raw: Option<&Value>) -> u64 {
    raw.and_then(as_i64)
        .and_then(|start| u64::try_from(start).ok())
        .unwrap_or(0)
}

fn parse_limit(raw: Option<&Value>, limits: &PageLimits) -> u64 {
    let length = raw
        .and_then(as_i64)
        .and_then(|length| u64::try_from(length).ok())
        .filter(|length| *length > 0)
        .unwrap_or(limits.default_length);

    if length > limits.max_length {
        warn!(
            requested = length,
            max = limits.max_length,
            "page length above maximum; capping"
        );
        limits.max_length
    } else {
        length
    }
}

/// Element `i` of an array, or key `"i"` of an object.
fn index(raw: &Value, i: usize) -> Option<&Value> {
    match raw {
        Value::Array(items) => items.get(i),
        Value::Object(map) => map.get(&i.to_string()),
        _ => None,
    }
}

/// Sequential entries of an array or index-keyed object.
fn entries(raw: Option<&Value>) -> Vec<&Value> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    (0..).map_while(|i| index(raw, i)).collect()
}

fn flag(raw: Option<&Value>, default: bool) -> bool {
    match raw {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

fn as_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
