/*! A non-blocking, streaming HTTP client for the nimbus.io object-storage service.

# Usage

Create a [`Client`] with [`ClientBuilder`], either configured directly or from the environment
with [`ClientBuilder::from_env`].  Requests are signed with an [`Identity`], which can likewise
be read from the environment or from an identity file.

```
# use nimbusio::{ClientBuilder, Identity, Request, rest_api};
# async fn f(identity: &Identity) -> anyhow::Result<()> {
let client = ClientBuilder::new().build()?;
let headers = client
    .start_collection_request(
        Some(identity),
        "my-collection",
        Request::new("HEAD", rest_api::head_path("some/key")),
    )
    .await?
    .headers();
# Ok(())
# }
```

# Streaming

Request and response bodies are streamed through a pair of interfaces, [`Producer`] and
[`Consumer`], so that neither needs to be held in memory.  A request body comes from a
[`BodyProducer`], which declares its length up front and may be fed incrementally while the
request is in flight.  A response body is delivered to a [`Consumer`] through a
[`ResponseRelay`], which propagates the consumer's backpressure to the connection: while the
consumer has the relay paused, nothing more is read from the network.

The `nimbusio-upload` and `nimbusio-download` crates provide producers and consumers for
common cases.

# Errors

Every request resolves exactly once.  Transport failures are returned as
[`reqwest::Error`], while status-validation failures and stream failures are returned as
[`RequestError`]; both arrive wrapped in [`anyhow::Error`].  There is no retry.
*/

pub mod auth;
mod body;
mod client;
mod completion;
mod error;
mod flow;
mod headers;
mod identity;
mod relay;
pub mod rest_api;
mod util;

#[cfg(test)]
mod test_helpers;

pub use client::{Client, ClientBuilder, Outcome, Request};
pub use completion::Completion;
pub use error::{err_status_code, RequestError};
pub use flow::{BodyProducer, Consumer, Producer};
pub use headers::ResponseHeaders;
pub use identity::Identity;
pub use relay::{RelayState, ResponseRelay};

// reexports
pub use bytes;
