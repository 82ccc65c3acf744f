//! HTTP client for the inventory service
//!
//! Thin REST wrapper: `nodes/{name}`, `clients/{name}`,
//! `environments/{name}`, and topology records under `data/{bag}/{name}`.
//! 404 and 409 responses are mapped into the local error taxonomy; every
//! other non-success status propagates as an API error.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::topology::Topology;

use super::{InventoryError, InventoryService, NodeRecord};

/// Default name of the bag topology records are stored under.
pub const DEFAULT_BAG: &str = "topologies";

pub struct HttpInventory {
    base_url: String,
    bag: String,
    token: Option<String>,
    client: Client,
}

impl HttpInventory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bag: DEFAULT_BAG.to_string(),
            token: None,
            client: Client::new(),
        }
    }

    /// Store topology records under a different bag name.
    pub fn with_bag(mut self, bag: impl Into<String>) -> Self {
        self.bag = bag.into();
        self
    }

    /// Authenticate requests with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, InventoryError> {
        self.authed(req)
            .send()
            .map_err(|e| InventoryError::Transport(e.to_string()))
    }

    /// GET that treats 404 as `None`.
    fn get_optional(&self, path: &str) -> Result<Option<Response>, InventoryError> {
        let resp = self.send(self.client.get(self.url(path)))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_status(resp)?))
    }

    /// DELETE that treats 404 as already gone.
    fn delete_optional(&self, path: &str) -> Result<(), InventoryError> {
        let resp = self.send(self.client.delete(self.url(path)))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp)?;
        Ok(())
    }

    fn put_json(&self, path: &str, body: &Value) -> Result<(), InventoryError> {
        let resp = self.send(self.client.put(self.url(path)).json(body))?;
        check_status(resp)?;
        Ok(())
    }

    fn topology_document(topo: &Topology) -> Result<Value, InventoryError> {
        topo.to_document()
            .map_err(|e| InventoryError::Serialization(e.to_string()))
    }
}

fn check_status(resp: Response) -> Result<Response, InventoryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(InventoryError::Api {
        status: status.as_u16(),
        message: resp.text().unwrap_or_default(),
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, InventoryError> {
    resp.json()
        .map_err(|e| InventoryError::Serialization(e.to_string()))
}

impl InventoryService for HttpInventory {
    fn node_exists(&self, name: &str) -> Result<bool, InventoryError> {
        Ok(self.get_optional(&format!("nodes/{}", name))?.is_some())
    }

    fn fetch_node(&self, name: &str) -> Result<Option<NodeRecord>, InventoryError> {
        match self.get_optional(&format!("nodes/{}", name))? {
            Some(resp) => Ok(Some(parse_json(resp)?)),
            None => Ok(None),
        }
    }

    fn save_node(&self, node: &NodeRecord) -> Result<(), InventoryError> {
        let body = serde_json::to_value(node)
            .map_err(|e| InventoryError::Serialization(e.to_string()))?;
        self.put_json(&format!("nodes/{}", node.name), &body)
    }

    fn delete_node(&self, name: &str) -> Result<(), InventoryError> {
        self.delete_optional(&format!("nodes/{}", name))
    }

    fn delete_identity(&self, name: &str) -> Result<(), InventoryError> {
        self.delete_optional(&format!("clients/{}", name))
    }

    fn environment_exists(&self, name: &str) -> Result<bool, InventoryError> {
        Ok(self
            .get_optional(&format!("environments/{}", name))?
            .is_some())
    }

    fn create_environment(&self, name: &str) -> Result<(), InventoryError> {
        self.put_json(&format!("environments/{}", name), &json!({"name": name}))
    }

    fn fetch_topology(&self, name: &str) -> Result<Option<Topology>, InventoryError> {
        match self.get_optional(&format!("data/{}/{}", self.bag, name))? {
            Some(resp) => {
                let doc: Value = parse_json(resp)?;
                Topology::from_document(doc)
                    .map(Some)
                    .map_err(|e| InventoryError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    fn create_topology(&self, topo: &Topology) -> Result<(), InventoryError> {
        let body = Self::topology_document(topo)?;
        let resp = self.send(
            self.client
                .post(self.url(&format!("data/{}", self.bag)))
                .json(&body),
        )?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(InventoryError::Conflict(topo.id.clone()));
        }
        check_status(resp)?;
        Ok(())
    }

    fn update_topology(&self, topo: &Topology) -> Result<(), InventoryError> {
        let body = Self::topology_document(topo)?;
        self.put_json(&format!("data/{}/{}", self.bag, topo.id), &body)
    }

    fn delete_topology(&self, name: &str) -> Result<(), InventoryError> {
        self.delete_optional(&format!("data/{}/{}", self.bag, name))
    }

    fn list_topologies(&self) -> Result<Vec<String>, InventoryError> {
        match self.get_optional(&format!("data/{}", self.bag))? {
            Some(resp) => {
                // the service returns a map of item name -> url
                let index: serde_json::Map<String, Value> = parse_json(resp)?;
                Ok(index.keys().cloned().collect())
            }
            None => Ok(Vec::new()),
        }
    }
}
