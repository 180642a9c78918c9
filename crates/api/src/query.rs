//! Filtering, searching and sorting of loaded records
//!
//! Predicates are built once per request into an [`Expr`] tree against a
//! class, then evaluated per record. Property paths may walk reference
//! navigations (`AssignedTo.LastName`); collection navigations along a path
//! match when any element matches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::FixedOffset;
use serde_json::Value;
use tracing::debug;

use coalesce_core::{CoalesceError, CoalesceResult, SearchMethod, SortDirection};
use coalesce_model::{ClassViewModel, OrderByTerm, PropertyViewModel, ReflectionRepository, SearchInfo};

use crate::context::CrudContext;
use crate::db::Record;
use crate::values::{compare_values, day_bounds, parse_date, parse_value, utc};

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    StartsWith,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Equals,
    StartsWith,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(bool),
    IsNull(Vec<String>),
    Compare {
        path: Vec<String>,
        op: FilterOp,
        value: Value,
    },
    /// Case-insensitive text match
    Text {
        path: Vec<String>,
        mode: TextMatch,
        term: String,
    },
    /// `from <= value < to`
    Range {
        path: Vec<String>,
        from: Value,
        to: Value,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn and(exprs: Vec<Expr>) -> Expr {
        match exprs.len() {
            0 => Expr::Const(true),
            1 => exprs.into_iter().next().unwrap_or(Expr::Const(true)),
            _ => Expr::And(exprs),
        }
    }

    pub fn or(exprs: Vec<Expr>) -> Expr {
        match exprs.len() {
            0 => Expr::Const(false),
            1 => exprs.into_iter().next().unwrap_or(Expr::Const(false)),
            _ => Expr::Or(exprs),
        }
    }

    /// Property paths the expression reads
    pub fn paths(&self) -> Vec<&[String]> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a [String]>) {
        match self {
            Expr::Const(_) => {}
            Expr::IsNull(path)
            | Expr::Compare { path, .. }
            | Expr::Text { path, .. }
            | Expr::Range { path, .. } => out.push(path.as_slice()),
            Expr::And(all) | Expr::Or(all) => all.iter().for_each(|e| e.collect_paths(out)),
            Expr::Not(inner) => inner.collect_paths(out),
        }
    }

    pub fn eval(&self, record: &Record) -> bool {
        match self {
            Expr::Const(b) => *b,
            Expr::IsNull(path) => leaves(record, path).iter().all(|v| v.is_null()),
            Expr::Compare { path, op, value } => leaves(record, path)
                .iter()
                .any(|leaf| compare(leaf, *op, value)),
            Expr::Text { path, mode, term } => {
                let term = term.to_lowercase();
                leaves(record, path).iter().any(|leaf| {
                    let Some(text) = leaf.as_str() else {
                        return false;
                    };
                    let text = text.to_lowercase();
                    match mode {
                        TextMatch::Equals => text == term,
                        TextMatch::StartsWith => text.starts_with(&term),
                        TextMatch::Contains => text.contains(&term),
                    }
                })
            }
            Expr::Range { path, from, to } => leaves(record, path).iter().any(|leaf| {
                !leaf.is_null()
                    && compare_values(leaf, from).is_some_and(Ordering::is_ge)
                    && compare_values(leaf, to).is_some_and(Ordering::is_lt)
            }),
            Expr::And(all) => all.iter().all(|e| e.eval(record)),
            Expr::Or(any) => any.iter().any(|e| e.eval(record)),
            Expr::Not(inner) => !inner.eval(record),
        }
    }
}

fn compare(leaf: &Value, op: FilterOp, value: &Value) -> bool {
    if leaf.is_null() {
        return match op {
            FilterOp::Equal => value.is_null(),
            FilterOp::NotEqual => !value.is_null(),
            _ => false,
        };
    }
    let ordering = compare_values(leaf, value);
    match op {
        FilterOp::Equal => ordering == Some(Ordering::Equal),
        FilterOp::NotEqual => ordering != Some(Ordering::Equal),
        FilterOp::GreaterThan => ordering == Some(Ordering::Greater),
        FilterOp::GreaterThanOrEqual => ordering.is_some_and(Ordering::is_ge),
        FilterOp::LessThan => ordering == Some(Ordering::Less),
        FilterOp::LessThanOrEqual => ordering.is_some_and(Ordering::is_le),
        FilterOp::StartsWith | FilterOp::Contains => false,
    }
}

/// Values at the end of `path`, fanning out over arrays
fn leaves<'a>(record: &'a Record, path: &[String]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    let Some((first, rest)) = path.split_first() else {
        return out;
    };
    collect(record.get(first), rest, &mut out);
    out
}

fn collect<'a>(value: Option<&'a Value>, rest: &[String], out: &mut Vec<&'a Value>) {
    let Some(value) = value else {
        return;
    };
    match (value, rest.split_first()) {
        (Value::Array(items), Some(_)) => {
            for item in items {
                collect(Some(item), rest, out);
            }
        }
        (Value::Object(map), Some((next, tail))) => collect(map.get(next), tail, out),
        (_, Some(_)) => {}
        (_, None) => out.push(value),
    }
}

// ============================================================================
// Predicate building
// ============================================================================

/// Builds predicates against one class
pub struct PredicateBuilder<'a> {
    repo: &'a ReflectionRepository,
    class: &'a ClassViewModel,
    time_zone: FixedOffset,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(repo: &'a ReflectionRepository, class: &'a ClassViewModel) -> Self {
        Self {
            repo,
            class,
            time_zone: utc(),
        }
    }

    /// Date-only values filter whole days in this zone
    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Resolve a dotted path to declared names and the final property
    pub fn resolve_path(&self, path: &str) -> CoalesceResult<(Vec<String>, PropertyViewModel)> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        let mut names = Vec::new();
        let prop = self.resolve_in(self.class, &segments, &mut names)?;
        Ok((names, prop))
    }

    fn resolve_in(
        &self,
        class: &ClassViewModel,
        segments: &[&str],
        names: &mut Vec<String>,
    ) -> CoalesceResult<PropertyViewModel> {
        let not_found = |member: &str| CoalesceError::MemberNotFound {
            type_name: class.name.clone(),
            member: member.to_string(),
        };
        let Some((first, rest)) = segments.split_first() else {
            return Err(not_found(""));
        };
        let prop = class
            .property(first)
            .filter(|p| p.is_client_property())
            .ok_or_else(|| not_found(first))?;
        names.push(prop.name.clone());
        if rest.is_empty() {
            return Ok(prop.clone());
        }
        let next = prop
            .pure_type()
            .class_view_model(self.repo)
            .filter(|_| prop.is_navigation() || prop.type_vm.is_poco())
            .ok_or_else(|| not_found(rest[0]))?;
        self.resolve_in(&next, rest, names)
    }

    /// A single comparison of `property_path` against a raw value
    ///
    /// Unparseable values yield a predicate that matches nothing.
    pub fn build(&self, property_path: &str, op: FilterOp, raw: &str) -> CoalesceResult<Expr> {
        let (path, prop) = self.resolve_path(property_path)?;
        let raw = raw.trim();
        let ty = prop.type_vm.nullable_stripped();

        if raw.eq_ignore_ascii_case("null") {
            return Ok(match op {
                FilterOp::NotEqual => Expr::Not(Box::new(Expr::IsNull(path))),
                _ => Expr::IsNull(path),
            });
        }

        if ty.is_string() {
            let mode = match op {
                FilterOp::StartsWith => Some(TextMatch::StartsWith),
                FilterOp::Contains => Some(TextMatch::Contains),
                FilterOp::Equal => Some(TextMatch::Equals),
                _ => None,
            };
            return Ok(match mode {
                Some(mode) => Expr::Text {
                    path,
                    mode,
                    term: raw.to_string(),
                },
                None => Expr::Compare {
                    path,
                    op,
                    value: Value::String(raw.to_string()),
                },
            });
        }

        if ty.is_date() && !ty.is_date_only() {
            if let Some((from, to)) = parse_date(raw).and_then(|d| day_bounds(d, &self.time_zone)) {
                let (from, to) = (Value::String(from), Value::String(to));
                return Ok(match op {
                    FilterOp::Equal => Expr::Range { path, from, to },
                    FilterOp::NotEqual => Expr::Not(Box::new(Expr::Range { path, from, to })),
                    FilterOp::GreaterThan | FilterOp::GreaterThanOrEqual => Expr::Compare {
                        path,
                        op: if op == FilterOp::GreaterThan {
                            FilterOp::GreaterThanOrEqual
                        } else {
                            op
                        },
                        value: if op == FilterOp::GreaterThan { to } else { from },
                    },
                    FilterOp::LessThan | FilterOp::LessThanOrEqual => Expr::Compare {
                        path,
                        op: FilterOp::LessThan,
                        value: if op == FilterOp::LessThan { from } else { to },
                    },
                    FilterOp::StartsWith | FilterOp::Contains => Expr::Const(false),
                });
            }
        }

        Ok(match parse_value(&ty, raw) {
            Some(value) => match op {
                FilterOp::StartsWith | FilterOp::Contains => Expr::Compare {
                    path,
                    op: FilterOp::Equal,
                    value,
                },
                _ => Expr::Compare { path, op, value },
            },
            None => {
                debug!(property = %prop.name, value = raw, "Ignoring unparseable filter value");
                Expr::Const(false)
            }
        })
    }

    /// `filter.X` values: comma lists match any entry, a trailing `*` on a
    /// string means starts-with
    pub fn filter_value(&self, property_path: &str, raw: &str) -> CoalesceResult<Expr> {
        let (_, prop) = self.resolve_path(property_path)?;
        if prop.type_vm.nullable_stripped().is_string() {
            return match raw.strip_suffix('*') {
                Some(prefix) => self.build(property_path, FilterOp::StartsWith, prefix),
                None => self.build(property_path, FilterOp::Equal, raw),
            };
        }
        let alternatives = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| self.build(property_path, FilterOp::Equal, v))
            .collect::<CoalesceResult<Vec<_>>>()?;
        Ok(Expr::or(alternatives))
    }

    // ====================================================================
    // Search
    // ====================================================================

    /// The free-text search predicate
    ///
    /// Properties searched with split-on-spaces must each match one of the
    /// terms (all terms required); other properties match the whole string.
    /// `field:term` targets one property.
    pub fn search(&self, search: &str) -> Expr {
        let search = search.trim();
        if search.is_empty() {
            return Expr::Const(true);
        }

        if let Some((field, term)) = search.split_once(':') {
            let field = field.trim();
            if !field.is_empty() && !field.contains(' ') {
                if let Ok((path, prop)) = self.resolve_path(field) {
                    let info = prop.search.clone().unwrap_or(SearchInfo {
                        method: SearchMethod::BeginsWith,
                        is_split_on_spaces: false,
                    });
                    return self
                        .search_clause(path, &prop, &info, term.trim())
                        .unwrap_or(Expr::Const(false));
                }
            }
        }

        let mut targets = Vec::new();
        self.search_targets(self.class, &mut Vec::new(), &mut targets, 0);

        let (split, whole): (Vec<_>, Vec<_>) =
            targets.into_iter().partition(|t| t.info.is_split_on_spaces);

        let mut alternatives = Vec::new();
        if !split.is_empty() {
            let per_term = search
                .split_whitespace()
                .map(|term| {
                    Expr::or(
                        split
                            .iter()
                            .filter_map(|t| {
                                self.search_clause(t.path.clone(), &t.prop, &t.info, term)
                            })
                            .collect(),
                    )
                })
                .collect();
            alternatives.push(Expr::and(per_term));
        }
        alternatives.extend(
            whole
                .iter()
                .filter_map(|t| self.search_clause(t.path.clone(), &t.prop, &t.info, search)),
        );
        Expr::or(alternatives)
    }

    fn search_targets(
        &self,
        class: &ClassViewModel,
        prefix: &mut Vec<String>,
        out: &mut Vec<SearchTarget>,
        depth: usize,
    ) {
        for prop in class.search_properties() {
            let info = prop.search.clone().unwrap_or(SearchInfo {
                method: SearchMethod::Equals,
                is_split_on_spaces: false,
            });
            if prop.is_reference_navigation() {
                let target = prop.pure_type().class_view_model(self.repo);
                if let Some(target) = target.filter(|_| depth < 2) {
                    prefix.push(prop.name.clone());
                    self.search_targets(&target, prefix, out, depth + 1);
                    prefix.pop();
                }
                continue;
            }
            if prop.is_collection_navigation() {
                continue;
            }
            let mut path = prefix.clone();
            path.push(prop.name.clone());
            out.push(SearchTarget {
                path,
                prop: prop.clone(),
                info,
            });
        }
    }

    fn search_clause(
        &self,
        path: Vec<String>,
        prop: &PropertyViewModel,
        info: &SearchInfo,
        term: &str,
    ) -> Option<Expr> {
        let ty = prop.type_vm.nullable_stripped();
        if term.is_empty() {
            return None;
        }
        if ty.is_string() {
            let mode = match info.method {
                SearchMethod::BeginsWith => TextMatch::StartsWith,
                SearchMethod::Contains => TextMatch::Contains,
                SearchMethod::Equals | SearchMethod::EqualsNatural => TextMatch::Equals,
            };
            return Some(Expr::Text {
                path,
                mode,
                term: term.to_string(),
            });
        }
        if ty.is_enum() {
            let lowered = term.to_lowercase();
            let matches: Vec<Expr> = ty
                .enum_members()
                .into_iter()
                .filter(|m| m.name.to_lowercase().starts_with(&lowered))
                .map(|m| Expr::Compare {
                    path: path.clone(),
                    op: FilterOp::Equal,
                    value: Value::from(m.value),
                })
                .collect();
            return (!matches.is_empty()).then(|| Expr::or(matches));
        }
        if ty.is_date() && !ty.is_date_only() {
            let (from, to) = parse_date(term).and_then(|d| day_bounds(d, &self.time_zone))?;
            return Some(Expr::Range {
                path,
                from: Value::String(from),
                to: Value::String(to),
            });
        }
        parse_value(&ty, term).map(|value| Expr::Compare {
            path,
            op: FilterOp::Equal,
            value,
        })
    }
}

struct SearchTarget {
    path: Vec<String>,
    prop: PropertyViewModel,
    info: SearchInfo,
}

/// Single comparison against a class, with dates in UTC
pub fn build_predicate(
    repo: &ReflectionRepository,
    class: &ClassViewModel,
    property_path: &str,
    op: FilterOp,
    raw: &str,
) -> CoalesceResult<Expr> {
    PredicateBuilder::new(repo, class).build(property_path, op, raw)
}

/// Combined `filter.X` predicate for a request
///
/// Unknown properties and properties the user may not read or filter on are
/// ignored.
pub fn filters_predicate(
    ctx: &CrudContext,
    builder: &PredicateBuilder<'_>,
    filters: &BTreeMap<String, String>,
) -> Expr {
    let mut all = Vec::new();
    for (field, raw) in filters {
        let allowed = builder.resolve_path(field).is_ok_and(|(_, prop)| {
            prop.security.is_readable(ctx.user()) && ctx.restrictions().can_filter(ctx, &prop)
        });
        if !allowed {
            debug!(field = %field, "Ignoring filter on unknown or unreadable property");
            continue;
        }
        match builder.filter_value(field, raw) {
            Ok(expr) => all.push(expr),
            Err(e) => debug!(field = %field, error = %e, "Ignoring filter"),
        }
    }
    Expr::and(all)
}

// ============================================================================
// Sorting
// ============================================================================

/// Resolve `orderBy`/`orderByDescending`, falling back to the class default
///
/// `none` disables ordering; an unknown field falls back to the default.
pub fn order_terms(
    builder: &PredicateBuilder<'_>,
    default_order: &[OrderByTerm],
    order_by: Option<&str>,
    order_by_descending: Option<&str>,
) -> Vec<OrderByTerm> {
    let requested = order_by
        .map(|f| (f, SortDirection::Ascending))
        .or_else(|| order_by_descending.map(|f| (f, SortDirection::Descending)));
    match requested {
        Some((field, _)) if field.eq_ignore_ascii_case("none") => Vec::new(),
        Some((field, direction)) => match builder.resolve_path(field) {
            Ok((path, _)) => vec![OrderByTerm::new(path.join("."), direction)],
            Err(_) => {
                debug!(field, "Ignoring unknown sort field");
                default_order.to_vec()
            }
        },
        None => default_order.to_vec(),
    }
}

/// Stable sort, nulls first
pub fn sort_records(records: &mut [Record], terms: &[OrderByTerm]) {
    if terms.is_empty() {
        return;
    }
    let paths: Vec<(Vec<String>, SortDirection)> = terms
        .iter()
        .map(|t| (t.segments().map(str::to_string).collect(), t.direction))
        .collect();
    records.sort_by(|a, b| {
        for (path, direction) in &paths {
            let left = leaves(a, path).first().copied().unwrap_or(&Value::Null);
            let right = leaves(b, path).first().copied().unwrap_or(&Value::Null);
            let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
            let ordering = if direction.is_descending() {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    // ── filters ──

    #[test]
    fn test_unknown_property_is_member_not_found() {
        for fixture in testing::both() {
            let class = fixture.repo.require_class("Person").unwrap();
            let err = build_predicate(&fixture.repo, &class, "Nope", FilterOp::Equal, "1")
                .unwrap_err();
            assert!(matches!(err, CoalesceError::MemberNotFound { ref member, .. } if member == "Nope"));
        }
    }

    #[test]
    fn test_navigation_path_predicate() {
        for fixture in testing::both() {
            let class = fixture.repo.require_class("Case").unwrap();
            let expr =
                build_predicate(&fixture.repo, &class, "assignedTo.lastName", FilterOp::Equal, "SMITH")
                    .unwrap();
            let matching = record(json!({"AssignedTo": {"LastName": "Smith"}}));
            let other = record(json!({"AssignedTo": {"LastName": "Jones"}}));
            let unassigned = record(json!({"AssignedTo": null}));
            assert!(expr.eval(&matching));
            assert!(!expr.eval(&other));
            assert!(!expr.eval(&unassigned));
        }
    }

    #[test]
    fn test_filter_value_lists_and_wildcards() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Case").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);

        let status = builder.filter_value("status", "Open, 99, bogus").unwrap();
        assert!(status.eval(&record(json!({"Status": 0}))));
        assert!(status.eval(&record(json!({"Status": 99}))));
        assert!(!status.eval(&record(json!({"Status": 2}))));

        let title = builder.filter_value("title", "Bro*").unwrap();
        assert!(title.eval(&record(json!({"Title": "broken printer"}))));
        assert!(!title.eval(&record(json!({"Title": "A broken printer"}))));

        let nothing = builder.filter_value("status", "bogus").unwrap();
        assert!(!nothing.eval(&record(json!({"Status": 0}))));
    }

    #[test]
    fn test_null_filter() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Case").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        let expr = builder.filter_value("AssignedToId", "null").unwrap();
        assert!(expr.eval(&record(json!({"AssignedToId": null}))));
        assert!(!expr.eval(&record(json!({"AssignedToId": 3}))));
    }

    #[test]
    fn test_date_only_value_filters_whole_day() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Case").unwrap();
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class).with_time_zone(zone);
        let expr = builder.build("OpenedAt", FilterOp::Equal, "2024-05-01").unwrap();
        assert!(expr.eval(&record(json!({"OpenedAt": "2024-04-30T22:30:00Z"}))));
        assert!(expr.eval(&record(json!({"OpenedAt": "2024-05-01T23:59:00+02:00"}))));
        assert!(!expr.eval(&record(json!({"OpenedAt": "2024-05-01T22:00:00Z"}))));
    }

    #[test]
    fn test_comparison_operators() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("ComplexModel").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        let row = record(json!({"NullableInt": 10}));
        assert!(builder.build("NullableInt", FilterOp::GreaterThan, "5").unwrap().eval(&row));
        assert!(!builder.build("NullableInt", FilterOp::LessThan, "5").unwrap().eval(&row));
        assert!(builder.build("NullableInt", FilterOp::LessThanOrEqual, "10").unwrap().eval(&row));
        assert!(builder.build("NullableInt", FilterOp::NotEqual, "null").unwrap().eval(&row));
    }

    // ── search ──

    #[test]
    fn test_search_contains_on_company() {
        for fixture in testing::both() {
            let class = fixture.repo.require_class("Company").unwrap();
            let builder = PredicateBuilder::new(&fixture.repo, &class);
            let expr = builder.search("acme");
            assert!(expr.eval(&record(json!({"Name": "The ACME Corp", "LogoUrl": null}))));
            assert!(expr.eval(&record(json!({"Name": "Other", "LogoUrl": "https://acme.example"}))));
            assert!(!expr.eval(&record(json!({"Name": "Other", "LogoUrl": null, "City": "Acme"}))));
        }
    }

    #[test]
    fn test_search_falls_back_to_primary_key() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Product").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        assert!(builder.search("7").eval(&record(json!({"ProductId": 7}))));
        assert!(!builder.search("7").eval(&record(json!({"ProductId": 8}))));
        assert!(!builder.search("abc").eval(&record(json!({"ProductId": 8}))));
    }

    #[test]
    fn test_field_targeted_search() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Company").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        let expr = builder.search("city:spo");
        assert!(expr.eval(&record(json!({"Name": "X", "City": "Spokane"}))));
        assert!(!expr.eval(&record(json!({"Name": "Spo", "City": "Seattle"}))));
    }

    #[test]
    fn test_empty_search_matches_everything() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Company").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        assert_eq!(builder.search("  "), Expr::Const(true));
    }

    // ── sorting ──

    #[test]
    fn test_sort_by_default_order() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Person").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        let terms = order_terms(&builder, &class.default_order, None, None);
        let mut rows = vec![
            record(json!({"FirstName": "Zed", "LastName": "Adams"})),
            record(json!({"FirstName": "Amy", "LastName": "Baker"})),
            record(json!({"FirstName": "Bob", "LastName": "Adams"})),
        ];
        sort_records(&mut rows, &terms);
        let names: Vec<&str> = rows.iter().map(|r| r["FirstName"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Bob", "Zed", "Amy"]);
    }

    #[test]
    fn test_order_by_overrides_and_none_disables() {
        let fixture = &testing::both()[0];
        let class = fixture.repo.require_class("Person").unwrap();
        let builder = PredicateBuilder::new(&fixture.repo, &class);
        assert_eq!(
            order_terms(&builder, &class.default_order, None, Some("firstName")),
            vec![OrderByTerm::new("FirstName", SortDirection::Descending)]
        );
        assert!(order_terms(&builder, &class.default_order, Some("none"), None).is_empty());
        assert_eq!(
            order_terms(&builder, &class.default_order, Some("bogus"), None),
            class.default_order
        );
    }

    #[test]
    fn test_sort_nulls_first_through_navigation() {
        let mut rows = vec![
            record(json!({"Id": 1, "AssignedTo": {"LastName": "B"}})),
            record(json!({"Id": 2, "AssignedTo": null})),
            record(json!({"Id": 3, "AssignedTo": {"LastName": "A"}})),
        ];
        sort_records(&mut rows, &[OrderByTerm::new("AssignedTo.LastName", SortDirection::Ascending)]);
        let ids: Vec<i64> = rows.iter().map(|r| r["Id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
