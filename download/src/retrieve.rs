use crate::{BufferingSink, StreamingSink};
use anyhow::{anyhow, Context, Result};
use nimbusio::{rest_api, Client, Identity, Request, ResponseHeaders};
use std::sync::Arc;

/// Retrieve a key's data into a [`Vec<u8>`].  If the object is unexpectedly large, this may
/// exhaust system memory and panic.
pub async fn retrieve_to_vec(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
) -> Result<Vec<u8>> {
    let hostname = client.collection_hostname(collection_name);
    retrieve_to_vec_impl(client, identity, &hostname, key)
        .await
        .with_context(|| format!("retrieving {}", key))
}

/// Retrieve `size` bytes of a key's data starting at `offset`, or everything from `offset` on
/// if `size` is None.  The server must answer with 206 Partial Content.
pub async fn retrieve_slice(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    offset: u64,
    size: Option<u64>,
) -> Result<Vec<u8>> {
    let hostname = client.collection_hostname(collection_name);
    retrieve_slice_impl(client, identity, &hostname, key, offset, size)
        .await
        .with_context(|| format!("retrieving {} from offset {}", key, offset))
}

/// Retrieve a key's data into a [`StreamingSink`].  The sink's byte count and digest describe
/// the data once this returns successfully.
pub async fn retrieve_stream(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
    sink: Arc<StreamingSink>,
) -> Result<()> {
    let hostname = client.collection_hostname(collection_name);
    retrieve_stream_impl(client, identity, &hostname, key, sink)
        .await
        .with_context(|| format!("streaming {}", key))
}

/// Get the headers for a key without its data.
pub async fn head(
    client: &Client,
    identity: &Identity,
    collection_name: &str,
    key: &str,
) -> Result<ResponseHeaders> {
    let hostname = client.collection_hostname(collection_name);
    head_impl(client, identity, &hostname, key)
        .await
        .with_context(|| format!("HEAD {}", key))
}

pub(crate) async fn retrieve_to_vec_impl(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    key: &str,
) -> Result<Vec<u8>> {
    let sink = Arc::new(BufferingSink::new());
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("GET", rest_api::retrieve_path(key)).consumer(sink.clone()),
        )
        .await?;
    Ok(sink.take().to_vec())
}

pub(crate) async fn retrieve_slice_impl(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    key: &str,
    offset: u64,
    size: Option<u64>,
) -> Result<Vec<u8>> {
    let (name, value) = rest_api::range_header(offset, size);
    let sink = Arc::new(BufferingSink::new());
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("GET", rest_api::retrieve_path(key))
                .header(name, value)
                .consumer(sink.clone())
                .acceptable_status(vec![206]),
        )
        .await?;
    Ok(sink.take().to_vec())
}

pub(crate) async fn retrieve_stream_impl(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    key: &str,
    sink: Arc<StreamingSink>,
) -> Result<()> {
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("GET", rest_api::retrieve_path(key)).consumer(sink),
        )
        .await?;
    Ok(())
}

pub(crate) async fn head_impl(
    client: &Client,
    identity: &Identity,
    hostname: &str,
    key: &str,
) -> Result<ResponseHeaders> {
    client
        .start_request(
            Some(identity),
            hostname,
            Request::new("HEAD", rest_api::head_path(key)),
        )
        .await?
        .headers()
        .ok_or_else(|| anyhow!("HEAD request returned no headers"))
}
