//! In-memory remote collection service for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_engine::{
    DataStore, Entity, Error, MemoryBackend, Method, Query, Request, Response, Result, Transport,
};

/// A fake backend speaking the collection protocol.
///
/// Ids are assigned as `srv-<n>`. Every write stamps `_kmd.lmt`.
#[derive(Default)]
pub struct FakeRemote {
    collections: Mutex<BTreeMap<String, Vec<Value>>>,
    next_id: AtomicUsize,
    offline: AtomicBool,
    failures: Mutex<HashMap<String, (u16, Value)>>,
    delay: Mutex<Option<Duration>>,
    log: Mutex<Vec<(Method, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every request fails with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Requests addressing `entity_id` reply with the given status and body.
    pub fn fail_entity(&self, entity_id: &str, status: u16, body: Value) {
        self.failures
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), (status, body));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Seed an entity directly on the server.
    pub fn insert(&self, collection: &str, entity: Value) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(entity);
    }

    pub fn entities(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn entity(&self, collection: &str, id: &str) -> Option<Value> {
        self.entities(collection)
            .into_iter()
            .find(|e| e["_id"] == json!(id))
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn count_requests(&self, method: Method) -> usize {
        self.requests().iter().filter(|(m, _)| *m == method).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn stamp(&self, mut value: Value) -> Value {
        let now = chrono::Utc::now().to_rfc3339();
        if let Value::Object(map) = &mut value {
            let kmd = map
                .entry("_kmd".to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(kmd) = kmd {
                kmd.remove("local");
                kmd.entry("ect".to_string())
                    .or_insert_with(|| Value::String(now.clone()));
                kmd.insert("lmt".to_string(), Value::String(now));
            }
        }
        value
    }

    fn handle(&self, request: &Request) -> Response {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        let collection = segments[0].to_string();
        let decoded = segments
            .get(1)
            .map(|segment| urlencoding::decode(segment).unwrap().into_owned());
        let target = decoded.as_deref();

        if let Some(id) = target {
            if let Some((status, body)) = self.failures.lock().unwrap().get(id) {
                return Response::new(*status, Some(body.clone()));
            }
        }
        if let Some(Value::Object(body)) = &request.body {
            if let Some(Value::String(id)) = body.get("_id") {
                if let Some((status, body)) = self.failures.lock().unwrap().get(id) {
                    return Response::new(*status, Some(body.clone()));
                }
            }
        }

        let mut collections = self.collections.lock().unwrap();
        let items = collections.entry(collection.clone()).or_default();
        let position = |items: &Vec<Value>, id: &str| items.iter().position(|e| e["_id"] == json!(id));

        match (request.method, target) {
            (Method::Get, None) => {
                let matching = filter(items, request.query.as_deref());
                Response::new(200, Some(Value::Array(matching)))
            }
            (Method::Get, Some("_count")) => {
                let count = filter(items, request.query.as_deref()).len();
                Response::new(200, Some(json!({ "count": count })))
            }
            (Method::Get, Some(id)) => match position(items, id) {
                Some(i) => Response::new(200, Some(items[i].clone())),
                None => not_found(id),
            },
            (Method::Post, None) => {
                let mut body = request.body.clone().unwrap_or_else(|| json!({}));
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                body["_id"] = json!(format!("srv-{n}"));
                let saved = self.stamp(body);
                items.push(saved.clone());
                Response::new(201, Some(saved))
            }
            (Method::Put, Some(id)) => match position(items, id) {
                Some(i) => {
                    let saved = self.stamp(request.body.clone().unwrap_or_else(|| json!({})));
                    items[i] = saved.clone();
                    Response::new(200, Some(saved))
                }
                None => not_found(id),
            },
            (Method::Delete, Some(id)) => match position(items, id) {
                Some(i) => {
                    items.remove(i);
                    Response::new(200, Some(json!({ "count": 1 })))
                }
                None => not_found(id),
            },
            _ => Response::new(
                400,
                Some(json!({ "name": "FeatureUnavailable", "description": "unsupported route" })),
            ),
        }
    }
}

fn not_found(id: &str) -> Response {
    Response::new(
        404,
        Some(json!({
            "name": "EntityNotFound",
            "description": format!("entity '{id}' not found"),
        })),
    )
}

fn filter(items: &[Value], query: Option<&str>) -> Vec<Value> {
    let params: HashMap<String, String> = query
        .map(|q| serde_urlencoded::from_str(q).unwrap())
        .unwrap_or_default();
    let query = match params.get("query") {
        Some(raw) => Query::from_filter(serde_json::from_str(raw).unwrap()).unwrap(),
        None => Query::new(),
    };
    items
        .iter()
        .filter(|v| query.matches(&Entity::from_value((*v).clone()).unwrap()))
        .cloned()
        .collect()
}

#[async_trait]
impl Transport for FakeRemote {
    async fn send(&self, request: Request) -> Result<Response> {
        self.log
            .lock()
            .unwrap()
            .push((request.method, request.path.clone()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = if self.offline.load(Ordering::SeqCst) {
            Err(Error::network("connection refused"))
        } else {
            Ok(self.handle(&request))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Route engine logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A data store over a fresh fake remote and an in-memory backend.
pub fn setup() -> (Arc<FakeRemote>, DataStore) {
    init_tracing();
    let remote = FakeRemote::new();
    let datastore = DataStore::new(remote.clone(), Arc::new(MemoryBackend::new()));
    (remote, datastore)
}

pub fn entity(value: Value) -> Entity {
    Entity::from_value(value).unwrap()
}
