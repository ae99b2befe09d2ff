// In-memory upstream for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use linkup_api::{AuthTicket, Connection, Credentials, Error, LoginGrant, RequestContext};
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::upstream::LinkUpApi;

pub(crate) fn credentials() -> Credentials {
    Credentials::new("follower@example.com", SecretString::from("pw".to_string()))
}

pub(crate) fn connection(patient_id: &str, first: &str, last: &str) -> Connection {
    serde_json::from_value(json!({
        "patientId": patient_id,
        "firstName": first,
        "lastName": last,
        "targetLow": 70,
        "sensor": { "sn": "0ABC" }
    }))
    .unwrap()
}

pub(crate) fn graph_doc(values: &[i64]) -> Value {
    let points: Vec<Value> = values.iter().map(|v| json!({ "Value": v })).collect();
    json!({ "status": 0, "data": { "connection": { "id": "c" }, "graphData": points } })
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum LoginBehavior {
    Token(&'static str),
    Rejected(i64),
    HeaderMissing,
}

#[derive(Debug, Clone)]
pub(crate) enum GraphBehavior {
    Doc(Value),
    Unauthorized,
    ServerError,
}

pub(crate) struct FakeApi {
    login: Mutex<LoginBehavior>,
    connections: Mutex<Option<Vec<Connection>>>,
    graph: Mutex<GraphBehavior>,
    login_delay: Mutex<Option<Duration>>,
    graph_delay: Mutex<Option<Duration>>,
    logins: AtomicUsize,
    graph_calls: AtomicUsize,
    graph_done: AtomicUsize,
    seen_tokens: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            login: Mutex::new(LoginBehavior::Token("tok-1")),
            connections: Mutex::new(Some(Vec::new())),
            graph: Mutex::new(GraphBehavior::Doc(graph_doc(&[1, 2]))),
            login_delay: Mutex::new(None),
            graph_delay: Mutex::new(None),
            logins: AtomicUsize::new(0),
            graph_calls: AtomicUsize::new(0),
            graph_done: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_login(&self, behavior: LoginBehavior) {
        *self.login.lock().unwrap() = behavior;
    }

    /// `None` makes the connections call fail.
    pub(crate) fn set_connections(&self, connections: Option<Vec<Connection>>) {
        *self.connections.lock().unwrap() = connections;
    }

    pub(crate) fn set_graph(&self, behavior: GraphBehavior) {
        *self.graph.lock().unwrap() = behavior;
    }

    /// Make every later login take `delay` before answering.
    pub(crate) fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = Some(delay);
    }

    /// Make every later graph request take `delay` before answering.
    pub(crate) fn set_graph_delay(&self, delay: Duration) {
        *self.graph_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn graph_count(&self) -> usize {
        self.graph_calls.load(Ordering::SeqCst)
    }

    /// Graph requests that have answered.
    pub(crate) fn graph_done_count(&self) -> usize {
        self.graph_done.load(Ordering::SeqCst)
    }

    pub(crate) fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkUpApi for FakeApi {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginGrant, Error> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        let delay = *self.login_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let behavior = *self.login.lock().unwrap();
        match behavior {
            LoginBehavior::Token(token) => Ok(LoginGrant {
                ticket: AuthTicket {
                    token: token.to_owned(),
                    expires: 0,
                    duration: 0,
                },
                user_id: Some("user-1".into()),
            }),
            LoginBehavior::Rejected(status) => Err(Error::LoginRejected {
                status,
                message: Some("notAuthenticated".into()),
                body: format!(r#"{{"status":{status}}}"#),
            }),
            LoginBehavior::HeaderMissing => Err(Error::RequiredHeaderMissing {
                body: r#"{"message":"RequiredHeaderMissing"}"#.into(),
            }),
        }
    }

    async fn connections(&self, ctx: &RequestContext) -> Result<Vec<Connection>, Error> {
        self.seen_tokens.lock().unwrap().push(ctx.token().to_owned());
        self.connections
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Http {
                status: 500,
                body: "boom".into(),
            })
    }

    async fn graph(&self, ctx: &RequestContext, _patient_id: &str) -> Result<Value, Error> {
        self.graph_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(ctx.token().to_owned());
        let behavior = self.graph.lock().unwrap().clone();
        let delay = *self.graph_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.graph_done.fetch_add(1, Ordering::SeqCst);
        match behavior {
            GraphBehavior::Doc(doc) => Ok(doc),
            GraphBehavior::Unauthorized => Err(Error::Unauthorized {
                body: r#"{"message":"expired"}"#.into(),
            }),
            GraphBehavior::ServerError => Err(Error::Http {
                status: 503,
                body: "maintenance".into(),
            }),
        }
    }

    fn graph_location(&self, patient_id: &str) -> String {
        format!("fake://llu/connections/{patient_id}/graph")
    }
}
