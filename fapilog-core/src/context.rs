use std::cell::RefCell;
use std::future::Future;

use serde_json::Value;

use crate::event::{
    Event, KEY_CLIENT_IP, KEY_LATENCY_MS, KEY_METHOD, KEY_PATH, KEY_REQ_BYTES, KEY_RES_BYTES,
    KEY_SPAN_ID, KEY_STATUS_CODE, KEY_TRACE_ID, KEY_USER_AGENT,
};

pub const KEY_USER_ID: &str = "user_id";
pub const KEY_USER_ROLES: &str = "user_roles";
pub const KEY_AUTH_SCHEME: &str = "auth_scheme";

/// Per-request key/value carrier (§4.1, §3 "Context record"). Every field is
/// optional; absence means "not set," not "set to empty."
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextRecord {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub client_ip: Option<String>,
    pub latency_ms: Option<f64>,
    pub status_code: Option<u16>,
    pub req_bytes: Option<u64>,
    pub res_bytes: Option<u64>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub user_roles: Option<Vec<String>>,
    pub auth_scheme: Option<String>,
}

impl ContextRecord {
    /// Overwrite only the fields that are `Some` in `other`, leaving the rest
    /// of `self` untouched. This is `bind_context`'s "sets or overwrites a
    /// subset" semantics.
    pub fn merge(&mut self, other: ContextRecord) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(trace_id);
        take!(span_id);
        take!(method);
        take!(path);
        take!(client_ip);
        take!(latency_ms);
        take!(status_code);
        take!(req_bytes);
        take!(res_bytes);
        take!(user_agent);
        take!(user_id);
        take!(user_roles);
        take!(auth_scheme);
    }

    /// Render as the immutable mapping `get_context()` returns: absent keys
    /// are simply omitted.
    pub fn to_event(&self) -> Event {
        let mut event = Event::new();
        macro_rules! put {
            ($key:expr, $field:expr, $into:expr) => {
                if let Some(v) = &$field {
                    event.insert($key.to_string(), $into(v));
                }
            };
        }
        put!(KEY_TRACE_ID, self.trace_id, |v: &String| Value::from(
            v.clone()
        ));
        put!(KEY_SPAN_ID, self.span_id, |v: &String| Value::from(v.clone()));
        put!(KEY_METHOD, self.method, |v: &String| Value::from(v.clone()));
        put!(KEY_PATH, self.path, |v: &String| Value::from(v.clone()));
        put!(KEY_CLIENT_IP, self.client_ip, |v: &String| Value::from(
            v.clone()
        ));
        put!(KEY_LATENCY_MS, self.latency_ms, |v: &f64| Value::from(*v));
        put!(KEY_STATUS_CODE, self.status_code, |v: &u16| Value::from(*v));
        put!(KEY_REQ_BYTES, self.req_bytes, |v: &u64| Value::from(*v));
        put!(KEY_RES_BYTES, self.res_bytes, |v: &u64| Value::from(*v));
        put!(KEY_USER_AGENT, self.user_agent, |v: &String| Value::from(
            v.clone()
        ));
        put!(KEY_USER_ID, self.user_id, |v: &String| Value::from(v.clone()));
        put!(KEY_USER_ROLES, self.user_roles, |v: &Vec<String>| {
            Value::from(v.clone())
        });
        put!(KEY_AUTH_SCHEME, self.auth_scheme, |v: &String| Value::from(
            v.clone()
        ));
        event
    }
}

tokio::task_local! {
    static CONTEXT: RefCell<ContextRecord>;
}

/// A restorable handle produced by `context_copy()`. Spawning work with this
/// handle causes reads inside that work to observe the snapshot taken at
/// capture time, independent of whatever the spawning task does afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot(pub ContextRecord);

impl ContextSnapshot {
    /// Run `fut` with the context-local storage seeded from this snapshot,
    /// the capture-and-restore idiom §4.1 and §9 call for around task
    /// spawning.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CONTEXT.scope(RefCell::new(self.0), fut).await
    }
}

/// Returns the current context as an immutable mapping of the reserved keys.
/// Outside any bound scope, this is an empty mapping (all keys unset).
pub fn get_context() -> Event {
    CONTEXT
        .try_with(|cell| cell.borrow().to_event())
        .unwrap_or_default()
}

/// Sets or overwrites a subset of the current context's entries. A no-op
/// outside any bound scope (there is nothing to bind into).
pub fn bind_context(entries: ContextRecord) {
    let _ = CONTEXT.try_with(|cell| cell.borrow_mut().merge(entries));
}

/// Resets all entries in the current scope to "unset."
pub fn clear_context() {
    let _ = CONTEXT.try_with(|cell| *cell.borrow_mut() = ContextRecord::default());
}

/// Captures a restorable snapshot of the current context. Outside any bound
/// scope this captures an empty record.
pub fn context_copy() -> ContextSnapshot {
    CONTEXT
        .try_with(|cell| ContextSnapshot(cell.borrow().clone()))
        .unwrap_or_default()
}

/// Runs `fut` inside a freshly bound, empty context scope. Used by the
/// correlation middleware to establish the per-request scope (§4.8) and by
/// tests that need an isolated context.
pub async fn with_fresh_context<F: Future>(fut: F) -> F::Output {
    CONTEXT.scope(RefCell::new(ContextRecord::default()), fut).await
}
