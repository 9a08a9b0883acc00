//! Clients for talking to another node's responder.

use core::time::Duration;

use async_trait::async_trait;
use metashare_primitives::identifier::StorageId;
use metashare_folderstore::archive::MAX_ARCHIVE_SIZE;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::config::NodeDescriptor;
use crate::error::SyncError;
use crate::protocol::{
    decode_inventory, InventoryEntry, NODE_VERSION_HEADER, PROTOCOL_HEADER, PROTOCOL_PARAM,
};
use crate::responder::Responder;

/// Upper bound on a response body read from a peer.
pub const MAX_RESPONSE_SIZE: u64 = MAX_ARCHIVE_SIZE;

#[derive(Clone, Debug)]
pub struct PeerInventory {
    pub protocol_version: String,
    pub node_version: Option<String>,
    pub entries: Vec<InventoryEntry>,
}

#[async_trait]
pub trait Peer: Send + Sync {
    async fn inventory(&self, protocol_versions: &[String]) -> Result<PeerInventory, SyncError>;

    /// The transfer archive of one object.
    async fn object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError>;
}

/// Produces a client for a configured node.
pub trait PeerConnector: Send + Sync {
    fn connect(&self, name: &str, node: &NodeDescriptor) -> Result<Box<dyn Peer>, SyncError>;
}

#[derive(Clone, Debug)]
pub struct HttpPeer {
    client: Client,
    node: NodeDescriptor,
}

impl HttpPeer {
    pub fn new(mut node: NodeDescriptor, timeout: Duration) -> Result<Self, SyncError> {
        // Relative joins would otherwise drop the last path segment.
        if !node.url.path().ends_with('/') {
            let path = format!("{}/", node.url.path());
            node.url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metashare-node/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, node })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, SyncError> {
        let url = self
            .node
            .url
            .join(path)
            .map_err(|err| SyncError::InvalidResponse(format!("bad peer url: {err}")))?;

        let mut request = self.client.get(url).query(query);

        if let Some(username) = &self.node.username {
            request = request.basic_auth(username, self.node.password.as_ref());
        }

        let response = request.send().await?;

        debug!(url = %response.url(), status = %response.status(), "Peer responded");

        Ok(response)
    }
}

#[async_trait]
impl Peer for HttpPeer {
    async fn inventory(&self, protocol_versions: &[String]) -> Result<PeerInventory, SyncError> {
        let query: Vec<_> = protocol_versions
            .iter()
            .map(|version| (PROTOCOL_PARAM, version.as_str()))
            .collect();

        let response = self.get("sync/", &query).await?;

        match response.status() {
            StatusCode::NOT_IMPLEMENTED => {
                return Err(SyncError::ProtocolNotSupported(protocol_versions.to_vec()))
            }
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => return Err(SyncError::Forbidden),
            status if !status.is_success() => {
                return Err(SyncError::InvalidResponse(format!("unexpected status {status}")))
            }
            _ => {}
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        let protocol_version = header(PROTOCOL_HEADER).ok_or_else(|| {
            SyncError::InvalidResponse("missing negotiated protocol version".to_owned())
        })?;
        let node_version = header(NODE_VERSION_HEADER);

        let entries = decode_inventory(&read_body(response).await?)?;

        Ok(PeerInventory {
            protocol_version,
            node_version,
            entries,
        })
    }

    async fn object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError> {
        let response = self.get(&format!("sync/{id}/metadata/"), &[]).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SyncError::UnknownObject(*id)),
            StatusCode::FORBIDDEN => Err(SyncError::NotAvailable(*id)),
            StatusCode::UNAUTHORIZED => Err(SyncError::Forbidden),
            status if !status.is_success() => Err(SyncError::InvalidResponse(format!(
                "unexpected status {status}"
            ))),
            _ => read_body(response).await,
        }
    }
}

/// Reads a response body, refusing anything beyond [`MAX_RESPONSE_SIZE`].
async fn read_body(mut response: Response) -> Result<Vec<u8>, SyncError> {
    let too_large = || {
        SyncError::InvalidResponse(format!("response exceeds {MAX_RESPONSE_SIZE} bytes"))
    };

    if response
        .content_length()
        .is_some_and(|len| len > MAX_RESPONSE_SIZE)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let len = u64::try_from(body.len() + chunk.len()).unwrap_or(u64::MAX);

        if len > MAX_RESPONSE_SIZE {
            return Err(too_large());
        }

        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Connects to configured nodes over HTTP.
#[derive(Clone, Copy, Debug)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PeerConnector for HttpConnector {
    fn connect(&self, _name: &str, node: &NodeDescriptor) -> Result<Box<dyn Peer>, SyncError> {
        Ok(Box::new(HttpPeer::new(node.clone(), self.timeout)?))
    }
}

/// A responder in the same process, addressed without a network hop.
#[derive(Clone, Debug)]
pub struct LocalPeer {
    responder: Responder,
}

impl LocalPeer {
    #[must_use]
    pub const fn new(responder: Responder) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl Peer for LocalPeer {
    async fn inventory(&self, protocol_versions: &[String]) -> Result<PeerInventory, SyncError> {
        let response = self.responder.inventory(protocol_versions)?;

        Ok(PeerInventory {
            protocol_version: response.protocol_version,
            node_version: Some(metashare_primitives::common::NODE_VERSION.to_owned()),
            entries: decode_inventory(&response.archive)?,
        })
    }

    async fn object(&self, id: &StorageId) -> Result<Vec<u8>, SyncError> {
        self.responder.export_object(id)
    }
}
