//! memcached-backed cache client.

use async_trait::async_trait;
use nscache_core::ports::CacheClient;
use nscache_core::{Error, Result, StoreOptions};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::compression::{decode_value, encode_value};
use crate::config::MemcacheConfig;
use crate::health::{HealthCheck, NodeHealth};
use crate::metrics::MemcacheMetrics;
use crate::protocol::{self, Command, DeltaVerb, Item, Reply, StoreVerb, validate_key};

/// A single buffered connection to a server.
pub struct Connection<S> {
    stream: BufStream<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }

    /// Send a command and read its reply.
    pub async fn execute(&mut self, command: &Command<'_>) -> Result<Reply> {
        self.send(&command.encode()).await
    }

    /// Send an already encoded command and read its reply.
    pub async fn send(&mut self, request: &[u8]) -> Result<Reply> {
        self.stream
            .write_all(request)
            .await
            .map_err(protocol::network_error)?;
        self.stream.flush().await.map_err(protocol::network_error)?;
        protocol::read_reply(&mut self.stream).await
    }
}

struct Node {
    address: String,
    conn: Mutex<Option<Connection<TcpStream>>>,
}

/// Client for one or more memcached servers.
///
/// Each key lives on exactly one server, chosen by hashing the key. Every
/// server gets one lazily opened connection; a connection that fails is
/// dropped and reopened by the next command sent to that server.
#[derive(Clone)]
pub struct MemcacheClient {
    nodes: Arc<Vec<Node>>,
    config: MemcacheConfig,
    metrics: Arc<MemcacheMetrics>,
}

impl MemcacheClient {
    /// Create a client without contacting any server.
    pub fn new(config: MemcacheConfig) -> Result<Self> {
        config.validate()?;
        info!("Configured memcached client for {}", config.servers.join(","));

        let nodes = config
            .servers
            .iter()
            .map(|address| Node {
                address: address.clone(),
                conn: Mutex::new(None),
            })
            .collect();

        Ok(Self {
            nodes: Arc::new(nodes),
            config,
            metrics: MemcacheMetrics::new(),
        })
    }

    /// Create a client and make sure at least one server answers.
    pub async fn connect(config: MemcacheConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let health = client.health_check().await;
        if !health.status.is_operational() {
            let reason = health
                .nodes
                .iter()
                .filter_map(|n| n.error.as_deref())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Network(format!("No memcached server reachable: {}", reason)));
        }
        info!("Connected to memcached");
        Ok(client)
    }

    /// Get the configuration.
    pub fn config(&self) -> &MemcacheConfig {
        &self.config
    }

    /// Get metrics.
    pub fn metrics(&self) -> &Arc<MemcacheMetrics> {
        &self.metrics
    }

    /// Address of the server responsible for `key`.
    pub fn server_for(&self, key: &str) -> &str {
        &self.node_for(key).address
    }

    /// Ping every server.
    pub async fn health_check(&self) -> HealthCheck {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter() {
            let health = match self.call(node, &Command::Version).await {
                Ok(Reply::Version(version)) => NodeHealth {
                    address: node.address.clone(),
                    version: Some(version),
                    error: None,
                },
                Ok(other) => NodeHealth {
                    address: node.address.clone(),
                    version: None,
                    error: Some(unexpected(other).to_string()),
                },
                Err(e) => NodeHealth {
                    address: node.address.clone(),
                    version: None,
                    error: Some(e.to_string()),
                },
            };
            nodes.push(health);
        }
        HealthCheck::from_nodes(nodes, &self.metrics)
    }

    /// Invalidate every item on every server.
    pub async fn flush_all(&self) -> Result<()> {
        for node in self.nodes.iter() {
            match self.call(node, &Command::FlushAll).await? {
                Reply::Ok => {}
                other => return Err(unexpected(other)),
            }
        }
        Ok(())
    }

    fn node_for(&self, key: &str) -> &Node {
        let digest = Sha256::digest(key.as_bytes());
        let hash = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        &self.nodes[hash as usize % self.nodes.len()]
    }

    async fn open(&self, node: &Node) -> Result<Connection<TcpStream>> {
        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(&node.address),
        )
        .await
        .map_err(|_| Error::Timeout(self.config.connect_timeout))?
        .map_err(|e| Error::Network(format!("Failed to connect to {}: {}", node.address, e)))?;
        stream.set_nodelay(true).map_err(protocol::network_error)?;

        self.metrics.record_connect();
        debug!(server = %node.address, "Opened memcached connection");
        Ok(Connection::new(stream))
    }

    async fn call(&self, node: &Node, command: &Command<'_>) -> Result<Reply> {
        let mut slot = node.conn.lock().await;
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.open(node).await.inspect_err(|_| self.metrics.record_error())?,
        };

        let request = command.encode();
        let result = match timeout(self.config.io_timeout, conn.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.io_timeout)),
        };

        match result {
            Ok(reply) => {
                self.metrics.record_write(request.len() as u64);
                *slot = Some(conn);
                Ok(reply)
            }
            Err(e) => {
                // The stream position is unknown after a failure, so it is not reused.
                self.metrics.record_error();
                self.metrics.record_disconnect();
                warn!(server = %node.address, error = %e, "Dropping memcached connection");
                Err(e)
            }
        }
    }

    async fn call_for_key(&self, key: &str, command: &Command<'_>) -> Result<Reply> {
        validate_key(key)?;
        self.call(self.node_for(key), command).await
    }

    async fn store(
        &self,
        verb: StoreVerb,
        key: &str,
        value: &str,
        options: &StoreOptions,
    ) -> Result<bool> {
        let threshold = options
            .compress_threshold
            .or(self.config.default_compress_threshold);
        let (data, flags) = encode_value(value.as_bytes(), threshold)?;

        let command = Command::Store {
            verb,
            key,
            flags,
            exptime: protocol::exptime(options.ttl_secs()),
            data: &data,
        };
        let stored = stored_from_reply(self.call_for_key(key, &command).await?)?;
        if stored {
            self.metrics.record_store();
        }
        Ok(stored)
    }

    async fn delta(&self, verb: DeltaVerb, key: &str, amount: u64) -> Result<Option<u64>> {
        let command = Command::Delta { verb, key, amount };
        counter_from_reply(key, self.call_for_key(key, &command).await?)
    }
}

#[async_trait]
impl CacheClient for MemcacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self.call_for_key(key, &Command::Get { key }).await?;
        match item_from_reply(key, reply)? {
            Some(item) => {
                self.metrics.record_hit(item.data.len() as u64);
                let data = decode_value(item.data, item.flags)?;
                String::from_utf8(data)
                    .map(Some)
                    .map_err(|_| Error::Protocol(format!("value for {} is not UTF-8", key)))
            }
            None => {
                self.metrics.record_miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        self.store(StoreVerb::Set, key, value, options).await
    }

    async fn add(&self, key: &str, value: &str, options: &StoreOptions) -> Result<bool> {
        self.store(StoreVerb::Add, key, value, options).await
    }

    async fn incr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.delta(DeltaVerb::Incr, key, amount).await
    }

    async fn decr(&self, key: &str, amount: u64) -> Result<Option<u64>> {
        self.delta(DeltaVerb::Decr, key, amount).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self.call_for_key(key, &Command::Delete { key }).await? {
            Reply::Deleted => Ok(true),
            Reply::NotFound => Ok(false),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> Error {
    match reply {
        Reply::ServerError(msg) => Error::Server(msg),
        Reply::ClientError(msg) => Error::Protocol(msg),
        other => Error::Protocol(format!("unexpected reply: {:?}", other)),
    }
}

fn item_from_reply(key: &str, reply: Reply) -> Result<Option<Item>> {
    match reply {
        Reply::Values(items) => Ok(items.into_iter().find(|item| item.key == key)),
        other => Err(unexpected(other)),
    }
}

fn stored_from_reply(reply: Reply) -> Result<bool> {
    match reply {
        Reply::Stored => Ok(true),
        Reply::NotStored | Reply::Exists => Ok(false),
        other => Err(unexpected(other)),
    }
}

fn counter_from_reply(key: &str, reply: Reply) -> Result<Option<u64>> {
    match reply {
        Reply::Number(value) => Ok(Some(value)),
        Reply::NotFound => Ok(None),
        Reply::ClientError(_) => Err(Error::NonNumericValue(key.to_string())),
        other => Err(unexpected(other)),
    }
}
