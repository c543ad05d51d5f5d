//! Proxy manager
//!
//! Registry of live proxy transports, one per endpoint. Transports are built
//! from the endpoint record alone, so the registry is never persisted.

use crate::error::ProxyError;
use crate::proxy::transport::{BodyLimits, ProxyTransport};
use crate::proxy::upstream::{HttpUpstream, SocketUpstream, Upstream};
use crate::store::{Endpoint, EndpointId, ResourceControlStore, SettingsStore};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Engine port used when a `tcp://` URL carries none
pub const DEFAULT_ENGINE_PORT: u16 = 2375;

/// Owns the endpoint id to transport map
pub struct ProxyManager {
    proxies: DashMap<EndpointId, Arc<ProxyTransport>>,
    resource_controls: Arc<dyn ResourceControlStore>,
    settings: Arc<dyn SettingsStore>,
    connect_timeout: Duration,
    limits: BodyLimits,
}

impl ProxyManager {
    pub fn new(
        resource_controls: Arc<dyn ResourceControlStore>,
        settings: Arc<dyn SettingsStore>,
        connect_timeout: Duration,
        limits: BodyLimits,
    ) -> Self {
        Self {
            proxies: DashMap::new(),
            resource_controls,
            settings,
            connect_timeout,
            limits,
        }
    }

    /// Registered transport of an endpoint, if any; never builds one
    pub fn get_proxy(&self, id: EndpointId) -> Option<Arc<ProxyTransport>> {
        self.proxies.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Build a transport for `endpoint` and register it, replacing any previous one
    ///
    /// Used when the endpoint record changed. Requests already holding the
    /// previous transport finish on it. On error nothing is registered.
    pub async fn create_and_register_proxy(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<ProxyTransport>, ProxyError> {
        let transport = self.build_transport(endpoint).await?;

        if self
            .proxies
            .insert(endpoint.id, Arc::clone(&transport))
            .is_some()
        {
            info!(endpoint_id = %endpoint.id, "Replaced endpoint proxy");
        } else {
            info!(endpoint_id = %endpoint.id, kind = ?transport.upstream_kind(), "Registered endpoint proxy");
        }

        Ok(transport)
    }

    /// Registered transport of `endpoint`, building one if none is registered
    ///
    /// A transport registered while this one was being built wins, since it
    /// may come from a newer endpoint record.
    pub async fn get_or_create_proxy(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Arc<ProxyTransport>, ProxyError> {
        if let Some(proxy) = self.get_proxy(endpoint.id) {
            return Ok(proxy);
        }

        let transport = self.build_transport(endpoint).await?;

        match self.proxies.entry(endpoint.id) {
            Entry::Occupied(existing) => {
                debug!(endpoint_id = %endpoint.id, "Proxy registered concurrently, discarding ours");
                Ok(Arc::clone(existing.get()))
            }
            Entry::Vacant(slot) => {
                info!(endpoint_id = %endpoint.id, kind = ?transport.upstream_kind(), "Registered endpoint proxy");
                slot.insert(Arc::clone(&transport));
                Ok(transport)
            }
        }
    }

    /// Drop the transport of an endpoint; missing ids are ignored
    pub fn delete_proxy(&self, id: EndpointId) {
        if self.proxies.remove(&id).is_some() {
            debug!(endpoint_id = %id, "Removed endpoint proxy");
        }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    async fn build_transport(&self, endpoint: &Endpoint) -> Result<Arc<ProxyTransport>, ProxyError> {
        let upstream = self.build_upstream(endpoint).await?;
        Ok(Arc::new(ProxyTransport::new(
            upstream,
            Arc::clone(&self.resource_controls),
            Arc::clone(&self.settings),
            self.limits,
        )))
    }

    async fn build_upstream(&self, endpoint: &Endpoint) -> Result<Arc<dyn Upstream>, ProxyError> {
        let url = Url::parse(&endpoint.url).map_err(|e| ProxyError::InvalidUrl {
            url: endpoint.url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "unix" => {
                if url.path().is_empty() || url.path() == "/" {
                    return Err(ProxyError::InvalidUrl {
                        url: endpoint.url.clone(),
                        reason: "missing socket path".into(),
                    });
                }
                Ok(Arc::new(SocketUpstream::new(url.path())))
            }
            "tcp" | "http" | "https" => {
                let host = url.host_str().ok_or_else(|| ProxyError::InvalidUrl {
                    url: endpoint.url.clone(),
                    reason: "missing host".into(),
                })?;
                let port = url.port().unwrap_or(DEFAULT_ENGINE_PORT);
                let upstream =
                    HttpUpstream::new(host, port, &endpoint.tls_config, self.connect_timeout)
                        .await?;
                Ok(Arc::new(upstream))
            }
            other => Err(ProxyError::UnsupportedScheme(other.to_string())),
        }
    }
}
