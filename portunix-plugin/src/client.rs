//! Low-level gRPC client for the plugin datastore schema (spec.md §4.3,
//! §6.4), built directly on `tonic::client::Grpc` with the JSON codec
//! from [`crate::codec`] rather than generated stubs — see
//! [`crate::codec`]'s module doc for why.

use crate::codec::JsonCodec;
use crate::error::PluginError;
use crate::wire::*;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::Request;

const SERVICE: &str = "portunix.plugin.Datastore";

/// Thin wrapper issuing the exact method set spec.md §4.3 enumerates:
/// `Initialize/Store/Retrieve/Query/Delete/List/Health/GetStats/Shutdown`.
#[derive(Clone)]
pub struct DatastorePluginClient {
    grpc: Grpc<Channel>,
    token: Option<String>,
}

impl DatastorePluginClient {
    pub fn new(channel: Channel, token: Option<String>) -> Self {
        Self {
            grpc: Grpc::new(channel),
            token,
        }
    }

    fn path(method: &str) -> PathAndQuery {
        format!("/{SERVICE}/{method}")
            .parse()
            .expect("static method path is always valid")
    }

    async fn call<Req, Resp>(&mut self, method: &str, request: Req) -> Result<Resp, PluginError>
    where
        Req: serde::Serialize + Send + Sync + 'static,
        Resp: serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        self.grpc
            .ready()
            .await
            .map_err(|e| PluginError::Transport {
                op: method.to_string(),
                cause: e.to_string(),
            })?;

        let mut req = Request::new(request);
        if let Some(token) = &self.token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                req.metadata_mut().insert("authorization", value);
            }
        }

        let response = self
            .grpc
            .unary(req, Self::path(method), JsonCodec::default())
            .await
            .map_err(|status| PluginError::Transport {
                op: method.to_string(),
                cause: status.message().to_string(),
            })?;
        Ok(response.into_inner())
    }

    pub async fn initialize(&mut self, req: InitializeRequest) -> Result<InitializeResponse, PluginError> {
        self.call("Initialize", req).await
    }

    pub async fn store(&mut self, req: StoreRequest) -> Result<StoreResponse, PluginError> {
        self.call("Store", req).await
    }

    pub async fn retrieve(&mut self, req: RetrieveRequest) -> Result<RetrieveResponse, PluginError> {
        self.call("Retrieve", req).await
    }

    pub async fn query(&mut self, req: QueryRequest) -> Result<QueryResponse, PluginError> {
        self.call("Query", req).await
    }

    pub async fn delete(&mut self, req: DeleteRequest) -> Result<DeleteResponse, PluginError> {
        self.call("Delete", req).await
    }

    pub async fn list(&mut self, req: ListRequest) -> Result<ListResponse, PluginError> {
        self.call("List", req).await
    }

    pub async fn health(&mut self, req: HealthRequest) -> Result<HealthResponse, PluginError> {
        self.call("Health", req).await
    }

    pub async fn get_stats(&mut self, req: GetStatsRequest) -> Result<GetStatsResponse, PluginError> {
        self.call("GetStats", req).await
    }

    pub async fn shutdown(&mut self, req: ShutdownRequest) -> Result<ShutdownResponse, PluginError> {
        self.call("Shutdown", req).await
    }
}
