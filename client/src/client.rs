use crate::auth::{current_timestamp, request_headers};
use crate::body::BodyPipe;
use crate::error::RequestError;
use crate::flow::{BodyProducer, Consumer, Producer};
use crate::headers::ResponseHeaders;
use crate::identity::Identity;
use crate::relay::ResponseRelay;
use anyhow::{anyhow, Context, Error, Result};
use log::{debug, error};
use reqwest::header::CONTENT_LENGTH;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SERVICE_DOMAIN: &str = "nimbus.io";
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(360);
const DEFAULT_AGENT_NAME: &str = "Rust Client for Nimbus.io";

/// ClientBuilder implements the builder pattern for building a Client, allowing optional
/// configuration of the scheme, service domain, and timeouts.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    service_ssl: bool,
    service_domain: String,
    connection_timeout: Duration,
    stream_idle_timeout: Option<Duration>,
    agent_name: String,
    resolve: Vec<(String, SocketAddr)>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new ClientBuilder with the default configuration: HTTPS, the `nimbus.io`
    /// service domain, a 360-second connection timeout, and no stream-idle timeout.
    pub fn new() -> Self {
        Self {
            service_ssl: true,
            service_domain: DEFAULT_SERVICE_DOMAIN.to_owned(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            stream_idle_timeout: None,
            agent_name: DEFAULT_AGENT_NAME.to_owned(),
            resolve: vec![],
        }
    }

    /// Create a new ClientBuilder configured from environment variables:
    ///
    /// * `NIMBUS_IO_SERVICE_SSL` (optional; `0` selects plain HTTP)
    /// * `NIMBUSIO_CONNECTION_TIMEOUT` (optional; seconds)
    /// * `NIMBUS_IO_SERVICE_DOMAIN` (optional)
    /// * `NIMBUSIO_STREAM_IDLE_TIMEOUT` (optional; seconds)
    ///
    /// Timeouts must be positive.
    pub fn from_env() -> Result<Self, Error> {
        let mut builder = Self::new();

        if let Some(ssl) = optional_var("NIMBUS_IO_SERVICE_SSL")? {
            builder.service_ssl = ssl.trim() != "0";
        }
        if let Some(timeout) = optional_seconds("NIMBUSIO_CONNECTION_TIMEOUT")? {
            builder.connection_timeout = timeout;
        }
        if let Some(domain) = optional_var("NIMBUS_IO_SERVICE_DOMAIN")? {
            builder.service_domain = domain;
        }
        builder.stream_idle_timeout = optional_seconds("NIMBUSIO_STREAM_IDLE_TIMEOUT")?;

        Ok(builder)
    }

    /// Use HTTPS (true, the default) or plain HTTP (false)
    pub fn service_ssl(mut self, service_ssl: bool) -> Self {
        self.service_ssl = service_ssl;
        self
    }

    /// Set the domain to which collection names are prefixed to form a hostname
    pub fn service_domain<S: Into<String>>(mut self, service_domain: S) -> Self {
        self.service_domain = service_domain.into();
        self
    }

    /// Set the timeout for establishing a connection.  The default is 360 seconds.  No other
    /// timeout applies to a request, so a stalled upload or download can wait indefinitely
    /// unless a stream-idle timeout is also set.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Fail a response body that delivers no data for this long.  The default is None, and a
    /// zero timeout is the same as None.
    pub fn stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Connect to `addr` for requests to `hostname`, rather than looking it up in DNS.  The
    /// port still comes from the hostname, so a service domain carrying a port (such as
    /// `nimbus.test:8080`) reaches a server on that port.
    pub fn resolve<S: Into<String>>(mut self, hostname: S, addr: SocketAddr) -> Self {
        self.resolve.push((hostname.into(), addr));
        self
    }

    /// Set the value of the `agent` header sent with every request
    pub fn agent_name<S: Into<String>>(mut self, agent_name: S) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    /// Build the resulting client, consuming the builder
    pub fn build(self) -> Result<Client> {
        Client::new(self)
    }
}

fn optional_var(name: &str) -> Result<Option<String>, Error> {
    match env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(anyhow!(
            "Cannot read environment variable '{}': {}",
            name,
            err
        )),
    }
}

fn optional_seconds(name: &str) -> Result<Option<Duration>, Error> {
    match optional_var(name)? {
        None => Ok(None),
        Some(value) => {
            let secs: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", name))?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(anyhow!("{} must be a positive number of seconds", name));
            }
            Ok(Some(Duration::from_secs_f64(secs)))
        }
    }
}

struct RequestBody {
    producer: Arc<dyn BodyProducer>,
    flow: Arc<dyn Producer>,
}

/// A request to be issued by [`Client::start_request`].
///
/// The path is sent verbatim, and is expected to come from the functions in
/// [`rest_api`](crate::rest_api).
pub struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    consumer: Option<Arc<dyn Consumer>>,
    acceptable_status: Vec<u16>,
}

impl Request {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: vec![],
            body: None,
            consumer: None,
            acceptable_status: vec![200],
        }
    }

    /// Add a header, sent after the standard headers and in the order added
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Stream the request body from this producer.  The request's `Content-Length` is the
    /// producer's declared length.
    pub fn body<P: BodyProducer + 'static>(mut self, producer: Arc<P>) -> Self {
        self.body = Some(RequestBody {
            producer: producer.clone(),
            flow: producer,
        });
        self
    }

    /// Deliver the response body to this consumer.  Without a consumer, the request
    /// completes with the response headers and the body is not read.
    pub fn consumer(mut self, consumer: Arc<dyn Consumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Set the status codes that count as success.  The default is 200 alone.
    pub fn acceptable_status(mut self, status: impl IntoIterator<Item = u16>) -> Self {
        self.acceptable_status = status.into_iter().collect();
        self
    }
}

/// The result of a successful request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The request had no consumer; these are the response headers.
    Headers(ResponseHeaders),

    /// The response body was delivered, completely, to the request's consumer.
    Streamed,
}

impl Outcome {
    /// The response headers, if the request had no consumer
    pub fn headers(self) -> Option<ResponseHeaders> {
        match self {
            Outcome::Headers(headers) => Some(headers),
            Outcome::Streamed => None,
        }
    }
}

/// Client is the entry point into all the functionality in this package.  It holds the
/// service configuration and the underlying HTTP client, which is shared by every request.
/// Credentials are not part of the client: each request is signed with the identity passed
/// to it, if any.
pub struct Client {
    /// `https` or `http`
    scheme: &'static str,

    /// The domain to which collection names are prefixed
    service_domain: String,

    stream_idle_timeout: Option<Duration>,

    agent_name: String,

    /// Reqwest client
    client: reqwest::Client,
}

impl Client {
    /// Create a new client (public interface is via
    /// [`ClientBuilder::build`](crate::ClientBuilder::build))
    fn new(b: ClientBuilder) -> Result<Client> {
        // the connection timeout bounds only connection establishment; a streaming request
        // has no overall deadline
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(b.connection_timeout);
        for (hostname, addr) in &b.resolve {
            builder = builder.resolve(hostname, *addr);
        }
        let client = builder.build()?;

        Ok(Client {
            scheme: if b.service_ssl { "https" } else { "http" },
            service_domain: b.service_domain,
            stream_idle_timeout: b.stream_idle_timeout,
            agent_name: b.agent_name,
            client,
        })
    }

    /// The scheme used for every request
    pub fn scheme(&self) -> &str {
        self.scheme
    }

    /// The hostname serving the given collection
    pub fn collection_hostname(&self, collection_name: &str) -> String {
        format!("{}.{}", collection_name, self.service_domain)
    }

    /// Start a request to a collection, addressed by name.  This is otherwise identical to
    /// [`start_request`](Client::start_request).
    pub async fn start_collection_request(
        &self,
        identity: Option<&Identity>,
        collection_name: &str,
        request: Request,
    ) -> Result<Outcome> {
        let hostname = self.collection_hostname(collection_name);
        self.start_request(identity, &hostname, request).await
    }

    /// Make a request to a nimbus.io server.
    ///
    /// The request is signed with `identity`, if given; otherwise it is anonymous.  If the
    /// request has a body, it is streamed from the body producer as the producer is fed.
    ///
    /// Once the response headers arrive, the status is checked against the request's
    /// acceptable set, and an unacceptable status fails the request without reading the body.
    /// If the request has a consumer, the response body is relayed to it, and this resolves
    /// when the body is complete or has failed.  Otherwise this resolves with the response
    /// headers.
    ///
    /// There is no retry: any failure is returned to the caller.
    pub async fn start_request(
        &self,
        identity: Option<&Identity>,
        hostname: &str,
        request: Request,
    ) -> Result<Outcome> {
        let Request {
            method,
            path,
            headers,
            body,
            consumer,
            acceptable_status,
        } = request;

        let uri = format!("{}://{}{}", self.scheme, hostname, path);
        let meth = reqwest::Method::from_str(&method)
            .with_context(|| format!("invalid HTTP method {:?}", method))?;

        let mut req = self.client.request(meth, &uri);
        for (name, value) in
            request_headers(identity, &self.agent_name, &method, &path, current_timestamp())
                .into_iter()
                .chain(headers)
        {
            req = req.header(name, value);
        }

        // the producer is registered with the body pipe only weakly, so `body` must outlive
        // the request
        req = match &body {
            Some(body) => {
                let (pipe, stream) = BodyPipe::new();
                pipe.register_producer(body.flow.clone());
                body.producer.start_producing(pipe);
                req.header(CONTENT_LENGTH, body.producer.length())
                    .body(reqwest::Body::wrap_stream(stream))
            }
            // pass content-length: 0 if there is no body.  This is implicit for GET requests,
            // but not for methods that typically have a body.
            None => req.header(CONTENT_LENGTH, 0),
        };

        debug!("requesting {} {}", method, uri);
        let response = match req.send().await {
            Ok(response) => response,
            Err(err) => {
                error!("request {} {} failed: {}", method, uri, err);
                return Err(err.into());
            }
        };

        let status = response.status();
        if !acceptable_status.contains(&status.as_u16()) {
            let err = RequestError::Status {
                code: status.as_u16(),
                phrase: status.canonical_reason().unwrap_or_default().to_owned(),
                expected: acceptable_status,
            };
            error!("{} {}: {}", method, uri, err);
            // dropping the unread response closes the connection
            drop(response);
            return Err(err.into());
        }

        let consumer = match consumer {
            Some(consumer) => consumer,
            None => return Ok(Outcome::Headers(ResponseHeaders::from(response.headers()))),
        };

        let (relay, completion) = ResponseRelay::new(self.stream_idle_timeout);
        relay.add_consumer(consumer.clone());
        consumer.register_producer(relay.clone());
        relay.deliver_body(response.bytes_stream()).await;

        completion.await.map_err(|_| RequestError::Abandoned)??;
        drop(body);
        Ok(Outcome::Streamed)
    }
}
