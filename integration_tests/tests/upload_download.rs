use anyhow::Result;
use bytes::Bytes;
use httptest::{matchers::*, responders::*, Expectation, Server};
use nimbusio::{
    err_status_code, rest_api, Client, ClientBuilder, Consumer, Identity, Outcome, Producer,
    Request, RequestError,
};
use nimbusio_download::{BufferingSink, StreamingSink};
use nimbusio_upload::{ArchiveResult, PassThruProducer};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_client() -> Client {
    ClientBuilder::new().service_ssl(false).build().unwrap()
}

fn test_identity() -> Identity {
    Identity::new("motoboto", 5, "sekrit")
}

/// A consumer that records whether it was ever used
#[derive(Default)]
struct Untouched {
    touched: AtomicBool,
}

impl Consumer for Untouched {
    fn register_producer(&self, _producer: Arc<dyn Producer>) {
        self.touched.store(true, Ordering::SeqCst);
    }
    fn unregister_producer(&self) {
        self.touched.store(true, Ordering::SeqCst);
    }
    fn write(&self, _data: Bytes) {
        self.touched.store(true, Ordering::SeqCst);
    }
}

/// Archive data fed in pieces while the request is in flight, then stream it back and compare
/// digests.
#[tokio::test]
async fn round_trip() -> Result<()> {
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/data/aaa%2Fround-trip"),
            request::headers(contains(key("authorization"))),
            request::body(eq(data.clone())),
        ])
        .respond_with(json_encoded(json!({"version_identifier": "v-round-trip"}))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/data/aaa%2Fround-trip"))
            .respond_with(status_code(200).body(data.clone())),
    );
    let client = test_client();
    let identity = test_identity();
    let hostname = server.addr().to_string();

    let producer = Arc::new(PassThruProducer::new("aaa/round-trip", data.len() as u64));
    let feeder = {
        let producer = producer.clone();
        let data = data.clone();
        tokio::spawn(async move {
            for chunk in data.chunks(65536) {
                tokio::time::sleep(Duration::from_millis(5)).await;
                producer.feed(Bytes::copy_from_slice(chunk));
            }
        })
    };
    let response = Arc::new(BufferingSink::new());
    client
        .start_request(
            Some(&identity),
            &hostname,
            Request::new("POST", rest_api::archive_path("aaa/round-trip"))
                .body(producer.clone())
                .consumer(response.clone()),
        )
        .await?;
    feeder.await?;
    let result: ArchiveResult = response.json()?;
    assert_eq!(result.version_identifier, "v-round-trip");
    assert!(producer.is_finished());

    let sink = Arc::new(StreamingSink::discarding());
    client
        .start_request(
            Some(&identity),
            &hostname,
            Request::new("GET", rest_api::retrieve_path("aaa/round-trip")).consumer(sink.clone()),
        )
        .await?;
    assert_eq!(sink.bytes_read(), data.len() as u64);
    assert_eq!(sink.digest(), producer.digest());
    assert_eq!(sink.digest(), hex::encode(Sha256::digest(&data)));
    Ok(())
}

/// A ranged GET is answered with exactly the requested bytes.
#[tokio::test]
async fn range_request() -> Result<()> {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/data/k"),
            request::headers(contains(("range", "bytes=5-9"))),
        ])
        .respond_with(status_code(206).body("56789")),
    );
    let sink = Arc::new(BufferingSink::new());
    let (name, value) = rest_api::range_header(5, Some(5));
    test_client()
        .start_request(
            Some(&test_identity()),
            &server.addr().to_string(),
            Request::new("GET", rest_api::retrieve_path("k"))
                .header(name, value)
                .consumer(sink.clone())
                .acceptable_status(vec![206]),
        )
        .await?;
    assert_eq!(&sink.take()[..], b"56789");
    Ok(())
}

/// A request without a consumer yields the response headers.
#[tokio::test]
async fn headers_only() -> Result<()> {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("HEAD", "/data/k")).respond_with(
            status_code(200)
                .insert_header("Content-Length", 1234)
                .insert_header("Last-Modified", "Mon, 18 Oct 2026 00:00:00 GMT"),
        ),
    );
    let outcome = test_client()
        .start_request(
            Some(&test_identity()),
            &server.addr().to_string(),
            Request::new("HEAD", rest_api::head_path("k")),
        )
        .await?;
    let headers = match outcome {
        Outcome::Headers(headers) => headers,
        Outcome::Streamed => panic!("expected headers"),
    };
    assert_eq!(headers.content_length(), Some(1234));
    assert_eq!(
        headers.first("last-modified"),
        Some("Mon, 18 Oct 2026 00:00:00 GMT")
    );
    Ok(())
}

/// A status outside the acceptable set fails the request without touching the consumer.
#[tokio::test]
async fn not_found() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/data/missing"))
            .respond_with(status_code(404).body("no such key")),
    );
    let consumer = Arc::new(Untouched::default());
    let err = test_client()
        .start_request(
            Some(&test_identity()),
            &server.addr().to_string(),
            Request::new("GET", rest_api::retrieve_path("missing")).consumer(consumer.clone()),
        )
        .await
        .unwrap_err();
    assert_eq!(err_status_code(&err), Some(404));
    assert!(!consumer.touched.load(Ordering::SeqCst));
}

/// A refused connection is reported as a transport error.
#[tokio::test]
async fn connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = test_client()
        .start_request(
            None,
            &addr.to_string(),
            Request::new("GET", rest_api::retrieve_path("k")),
        )
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<reqwest::Error>().is_some());
    assert_eq!(err_status_code(&err), None);
}

/// A paced consumer that is never resumed halts the download; marking it done then fails the
/// request.
#[tokio::test]
async fn paced_consumer_halts_progress() -> Result<()> {
    let total = 4 * 1024 * 1024;
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/data/big"))
            .respond_with(status_code(200).body(vec![b'x'; total])),
    );
    let sink = Arc::new(StreamingSink::paced(|_| {}));
    let request = {
        let (client, identity, hostname) =
            (test_client(), test_identity(), server.addr().to_string());
        let sink = sink.clone();
        tokio::spawn(async move {
            client
                .start_request(
                    Some(&identity),
                    &hostname,
                    Request::new("GET", rest_api::retrieve_path("big")).consumer(sink),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    let first = sink.bytes_read();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(first > 0);
    assert_eq!(sink.bytes_read(), first);
    assert!(first < total as u64);

    sink.done();
    let err = request.await?.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RequestError>(),
        Some(RequestError::Stopped)
    ));
    Ok(())
}
