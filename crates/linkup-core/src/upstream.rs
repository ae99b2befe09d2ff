// ── Upstream seam ──
//
// The session, registry and poller only need three calls from the API.
// Expressing them as a trait keeps the timer logic testable against an
// in-memory fake while production wires in `LinkUpClient`.

use async_trait::async_trait;
use linkup_api::{Connection, Credentials, Error, LinkUpClient, LoginGrant, RequestContext};
use serde_json::Value;

#[async_trait]
pub trait LinkUpApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, Error>;

    async fn connections(&self, ctx: &RequestContext) -> Result<Vec<Connection>, Error>;

    async fn graph(&self, ctx: &RequestContext, patient_id: &str) -> Result<Value, Error>;

    /// Where the graph for `patient_id` is fetched from, for log lines.
    fn graph_location(&self, patient_id: &str) -> String;
}

#[async_trait]
impl LinkUpApi for LinkUpClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, Error> {
        LinkUpClient::login(self, credentials).await
    }

    async fn connections(&self, ctx: &RequestContext) -> Result<Vec<Connection>, Error> {
        LinkUpClient::connections(self, ctx).await
    }

    async fn graph(&self, ctx: &RequestContext, patient_id: &str) -> Result<Value, Error> {
        LinkUpClient::graph(self, ctx, patient_id).await
    }

    fn graph_location(&self, patient_id: &str) -> String {
        self.graph_url(patient_id)
            .map_or_else(|_| format!("llu/connections/{patient_id}/graph"), String::from)
    }
}
