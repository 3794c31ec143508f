use crate::PassThruProducer;
use anyhow::{Context, Result};
use bytes::Bytes;
use nimbusio::{rest_api, Client, Identity, Request};
use nimbusio_download::BufferingSink;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Feed in-memory data to a producer in pieces no larger than this
const FEED_CHUNK_SIZE: usize = 1024 * 1024;

/// The server's response to archiving a key (or one part of a conjoined archive)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveResult {
    pub version_identifier: String,
}

/// The server's response to starting a conjoined archive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConjoinedResult {
    pub conjoined_identifier: String,
}

/// Archive a key, streaming its data from the given producer.  The caller feeds the producer
/// concurrently; this resolves once the server has acknowledged the complete upload.
pub async fn archive(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    producer: Arc<PassThruProducer>,
) -> Result<ArchiveResult> {
    let hostname = client.collection_hostname(collection_name);
    archive_impl(
        client,
        identity,
        &hostname,
        rest_api::archive_path(key),
        producer,
    )
    .await
    .with_context(|| format!("archiving {}", key))
}

/// Archive a key from an in-memory buffer.
pub async fn archive_from_buf(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    data: &[u8],
) -> Result<ArchiveResult> {
    let producer = producer_from_buf(key, data);
    archive(client, identity, collection_name, key, producer).await
}

/// Archive one part of a conjoined archive begun with [`start_conjoined`].  Parts are
/// numbered from 1.
pub async fn archive_conjoined_part(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    conjoined_identifier: &str,
    part: u32,
    producer: Arc<PassThruProducer>,
) -> Result<ArchiveResult> {
    let hostname = client.collection_hostname(collection_name);
    archive_impl(
        client,
        identity,
        &hostname,
        rest_api::conjoined_part_archive_path(key, conjoined_identifier, part),
        producer,
    )
    .await
    .with_context(|| format!("archiving {} part {}", key, part))
}

/// Begin a conjoined archive of `key`, returning its conjoined identifier.
pub async fn start_conjoined(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
) -> Result<ConjoinedResult> {
    let hostname = client.collection_hostname(collection_name);
    post_for_json(client, identity, &hostname, rest_api::start_conjoined_path(key))
        .await
        .with_context(|| format!("starting conjoined archive of {}", key))
}

/// Complete a conjoined archive, returning the server's response.
pub async fn finish_conjoined(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    conjoined_identifier: &str,
) -> Result<Value> {
    let hostname = client.collection_hostname(collection_name);
    post_for_json(
        client,
        identity,
        &hostname,
        rest_api::finish_conjoined_path(key, conjoined_identifier),
    )
    .await
    .with_context(|| format!("finishing conjoined archive of {}", key))
}

fn producer_from_buf(name: &str, data: &[u8]) -> Arc<PassThruProducer> {
    let producer = Arc::new(PassThruProducer::new(name, data.len() as u64));
    // everything is buffered until the request starts
    for chunk in data.chunks(FEED_CHUNK_SIZE) {
        producer.feed(Bytes::copy_from_slice(chunk));
    }
    producer
}

/// POST a body to the given host and path, decoding the JSON archive result
pub(crate) async fn archive_impl(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    path: String,
    producer: Arc<PassThruProducer>,
) -> Result<ArchiveResult> {
    let sink = Arc::new(BufferingSink::new());
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("POST", path)
                .body(producer)
                .consumer(sink.clone()),
        )
        .await?;
    sink.json()
}

/// POST with an empty body to the given host and path, decoding the JSON response
pub(crate) async fn post_for_json<T: DeserializeOwned>(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    path: String,
) -> Result<T> {
    let sink = Arc::new(BufferingSink::new());
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("POST", path).consumer(sink.clone()),
        )
        .await?;
    sink.json()
}
