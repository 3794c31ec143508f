//! Utilities for testing retrievals
use httptest::{matchers::*, responders::*, Expectation};
use nimbusio::{Client, ClientBuilder, Identity};

pub(crate) const DATA: &[u8] = b"hello, world; this is nimbus.io";

pub(crate) fn test_client() -> Client {
    ClientBuilder::new().service_ssl(false).build().unwrap()
}

pub(crate) fn test_identity() -> Identity {
    Identity::new("motoboto", 1, "sekrit")
}

/// A fake nimbus.io server holding a single key, `key`, with contents [`DATA`].  It answers
/// GET (with or without the range `bytes=7-11`) and HEAD for that key, and 404 for `nope`.
pub(crate) struct FakeDataServer {
    server: httptest::Server,
}

impl FakeDataServer {
    pub(crate) fn new() -> Self {
        let server = httptest::Server::run();
        let slice = "bytes=7-11";
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/data/key"),
                request::headers(contains(("range", slice))),
            ])
            .times(..)
            .respond_with(status_code(206).body(&DATA[7..12])),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/data/key"),
                request::headers(not(contains(("range", slice)))),
            ])
            .times(..)
            .respond_with(status_code(200).body(DATA)),
        );
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/data/key"))
                .times(..)
                .respond_with(
                    status_code(200)
                        .insert_header("Content-Length", DATA.len())
                        .body(DATA),
                ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/data/nope"))
                .times(..)
                .respond_with(status_code(404)),
        );
        Self { server }
    }

    /// The `host:port` of the fake server
    pub(crate) fn hostname(&self) -> String {
        self.server.addr().to_string()
    }
}
