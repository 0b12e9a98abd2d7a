//! Queries over entities.
//!
//! A [`Query`] has two faces: an in-memory predicate used against the local
//! cache, and a serialized query string sent with remote requests.

use crate::{Entity, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filter, sort, skip and limit over a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Map<String, Value>,
    sort: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    skip: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from a filter document such as
    /// `{"author": "Herbert", "pages": {"$gt": 300}}`.
    pub fn from_filter(filter: Value) -> Result<Self> {
        match filter {
            Value::Object(filter) => Ok(Self {
                filter,
                ..Self::default()
            }),
            other => Err(Error::new(
                crate::ErrorKind::InvalidQuerySyntax,
                format!("query filter must be an object, got {other}"),
            )),
        }
    }

    /// Require `field` to equal `value`.
    pub fn equal_to(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filter.insert(field.into(), value);
        self
    }

    /// Add an operator condition (`$gt`, `$in`, ...) on `field`.
    pub fn condition(mut self, field: impl Into<String>, op: &str, value: Value) -> Self {
        let entry = self
            .filter
            .entry(field.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if !is_operator_doc(entry) {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ops) = entry {
            ops.insert(op.to_string(), value);
        }
        self
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortDirection::Asc));
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortDirection::Desc));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn filter(&self) -> &Map<String, Value> {
        &self.filter
    }

    /// The same filter without sort, skip or limit.
    pub fn filter_only(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            ..Self::default()
        }
    }

    pub fn has_sort(&self) -> bool {
        !self.sort.is_empty()
    }

    /// In-memory predicate.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.filter
            .iter()
            .all(|(field, cond)| matches_condition(entity.field(field), cond))
    }

    /// Filter, sort, skip and limit a sequence of entities.
    ///
    /// Without a sort the input order is kept.
    pub fn apply(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let mut matched: Vec<Entity> = entities.into_iter().filter(|e| self.matches(e)).collect();

        if self.has_sort() {
            matched.sort_by(|a, b| {
                for (field, direction) in &self.sort {
                    let ord = compare_values(a.field(field), b.field(field));
                    let ord = match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let iter = matched.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    /// Serialize for a remote request: `query=..&sort=..&limit=..&skip=..`.
    pub fn to_query_string(&self) -> Result<String> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if !self.filter.is_empty() {
            params.push(("query", serde_json::to_string(&self.filter)?));
        }
        if !self.sort.is_empty() {
            let sort: Map<String, Value> = self
                .sort
                .iter()
                .map(|(field, dir)| {
                    let dir = match dir {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };
                    (field.clone(), Value::from(dir))
                })
                .collect();
            params.push(("sort", serde_json::to_string(&sort)?));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if self.skip > 0 {
            params.push(("skip", self.skip.to_string()));
        }
        serde_urlencoded::to_string(&params)
            .map_err(|e| Error::new(crate::ErrorKind::InvalidQuerySyntax, e.to_string()))
    }
}

fn is_operator_doc(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|ops| !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')))
}

fn matches_condition(actual: Option<&Value>, cond: &Value) -> bool {
    if !is_operator_doc(cond) {
        return actual == Some(cond);
    }
    let Some(ops) = cond.as_object() else {
        return false;
    };
    ops.iter().all(|(op, expected)| match op.as_str() {
        "$eq" => actual == Some(expected),
        "$ne" => actual != Some(expected),
        "$gt" => compare_same_type(actual, expected).is_some_and(Ordering::is_gt),
        "$gte" => compare_same_type(actual, expected).is_some_and(Ordering::is_ge),
        "$lt" => compare_same_type(actual, expected).is_some_and(Ordering::is_lt),
        "$lte" => compare_same_type(actual, expected).is_some_and(Ordering::is_le),
        "$in" => expected
            .as_array()
            .is_some_and(|values| actual.is_some_and(|a| values.contains(a))),
        "$nin" => expected
            .as_array()
            .is_some_and(|values| actual.map_or(true, |a| !values.contains(a))),
        "$exists" => expected.as_bool() == Some(actual.is_some()),
        _ => false,
    })
}

/// Range comparison; values of different types never match.
fn compare_same_type(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (a @ Value::Bool(_), b @ Value::Bool(_))
        | (a @ Value::Number(_), b @ Value::Number(_))
        | (a @ Value::String(_), b @ Value::String(_)) => Some(compare_values(Some(a), Some(b))),
        _ => None,
    }
}

/// Total order used for sorting: missing < null < bool < number < string < other.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn books() -> Vec<Entity> {
        vec![
            json!({"_id": "1", "title": "Dune", "pages": 412, "author": {"name": "Herbert"}}),
            json!({"_id": "2", "title": "Emma", "pages": 320}),
            json!({"_id": "3", "title": "Ulysses", "pages": 730, "author": {"name": "Joyce"}}),
        ]
        .into_iter()
        .map(|v| Entity::from_value(v).unwrap())
        .collect()
    }

    fn ids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().filter_map(Entity::id).collect()
    }

    #[test]
    fn empty_query_keeps_order() {
        let result = Query::new().apply(books());
        assert_eq!(ids(&result), vec!["1", "2", "3"]);
    }

    #[test]
    fn equality_and_nested_fields() {
        let q = Query::new().equal_to("author.name", json!("Joyce"));
        assert_eq!(ids(&q.apply(books())), vec!["3"]);
    }

    #[test]
    fn operators() {
        let q = Query::new().condition("pages", "$gt", json!(400));
        assert_eq!(ids(&q.apply(books())), vec!["1", "3"]);

        let q = Query::new()
            .condition("pages", "$gte", json!(320))
            .condition("pages", "$lt", json!(500));
        assert_eq!(ids(&q.apply(books())), vec!["1", "2"]);

        let q = Query::new().condition("title", "$in", json!(["Emma", "Dune"]));
        assert_eq!(ids(&q.apply(books())), vec!["1", "2"]);

        let q = Query::new().condition("author", "$exists", json!(false));
        assert_eq!(ids(&q.apply(books())), vec!["2"]);

        let q = Query::new().condition("title", "$nin", json!(["Emma"]));
        assert_eq!(ids(&q.apply(books())), vec!["1", "3"]);
    }

    #[test]
    fn range_operators_ignore_other_types() {
        let mut entities = books();
        entities.push(Entity::from_value(json!({"_id": "4", "pages": "abc"})).unwrap());
        entities.push(Entity::from_value(json!({"_id": "5", "pages": null})).unwrap());

        let q = Query::new().condition("pages", "$gt", json!(5));
        assert_eq!(ids(&q.apply(entities.clone())), vec!["1", "2", "3"]);

        let q = Query::new().condition("pages", "$lte", json!("zzz"));
        assert_eq!(ids(&q.apply(entities)), vec!["4"]);
    }

    #[test]
    fn sort_skip_limit() {
        let q = Query::new().descending("pages").skip(1).limit(1);
        assert_eq!(ids(&q.apply(books())), vec!["1"]);

        let q = Query::new().ascending("title");
        assert_eq!(ids(&q.apply(books())), vec!["1", "2", "3"]);
    }

    #[test]
    fn from_filter_requires_object() {
        assert!(Query::from_filter(json!([1])).is_err());
        let q = Query::from_filter(json!({"title": "Emma"})).unwrap();
        assert_eq!(ids(&q.apply(books())), vec!["2"]);
    }

    #[test]
    fn query_string() {
        assert_eq!(Query::new().to_query_string().unwrap(), "");

        let q = Query::new()
            .equal_to("title", json!("Dune"))
            .descending("pages")
            .limit(10)
            .skip(5);
        assert_eq!(
            q.to_query_string().unwrap(),
            "query=%7B%22title%22%3A%22Dune%22%7D&sort=%7B%22pages%22%3A-1%7D&limit=10&skip=5"
        );
    }
}
