use crate::batch::{Batch, Counts};
use crate::state::{TestContext, TestState};
use anyhow::Result;
use log::debug;
use nimbusio::{rest_api, Request};
use nimbusio_download::BufferingSink;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A listing of keys or versions, as returned by the server
#[derive(Debug, Deserialize)]
struct Listing {
    key_data: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    key: String,
    #[serde(default)]
    version_identifier: Option<String>,
}

async fn list(ctx: &TestContext, path: String) -> Result<Listing> {
    let sink = Arc::new(BufferingSink::new());
    ctx.client
        .start_collection_request(
            Some(&ctx.identity),
            &ctx.collection_name,
            Request::new("GET", path).consumer(sink.clone()),
        )
        .await?;
    sink.json()
}

/// List keys with the empty prefix and with each configured prefix, comparing the listing with
/// the keys archived so far.
pub async fn run_list_keys(ctx: &Arc<TestContext>, state: &TestState) -> Counts {
    let batch: Batch<()> = Batch::new("list keys");
    for prefix in ctx.list_prefixes() {
        debug!("listing keys for prefix {:?}", prefix);
        let ticket = batch.ticket(format!("prefix {:?}", prefix));
        let expected = state.keys_with_prefix(&prefix);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match list(&ctx, rest_api::list_keys_path(&prefix)).await {
                Ok(listing) => {
                    let actual: BTreeSet<String> =
                        listing.key_data.into_iter().map(|e| e.key).collect();
                    if actual == expected {
                        ticket.success(());
                    } else {
                        ticket.error(format!("{:?} != {:?}", actual, expected));
                    }
                }
                Err(err) => ticket.failure(err),
            }
        });
    }
    batch.finish().await.counts
}

/// List versions with the empty prefix and with each configured prefix, comparing the
/// versions of single-part keys with those recorded when they were archived.
pub async fn run_list_versions(ctx: &Arc<TestContext>, state: &TestState) -> Counts {
    let batch: Batch<()> = Batch::new("list versions");
    for prefix in ctx.list_prefixes() {
        debug!("listing versions for prefix {:?}", prefix);
        let ticket = batch.ticket(format!("prefix {:?}", prefix));
        let expected = state.versions_with_prefix(&prefix);
        let single_part_keys: BTreeSet<String> = state.key_data.keys().cloned().collect();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match list(&ctx, rest_api::list_versions_path(&prefix)).await {
                Ok(listing) => {
                    // conjoined keys are listed too, but their versions are not tracked
                    let actual: BTreeSet<Option<String>> = listing
                        .key_data
                        .into_iter()
                        .filter(|e| single_part_keys.contains(&e.key))
                        .map(|e| e.version_identifier)
                        .collect();
                    let expected: BTreeSet<Option<String>> =
                        expected.into_iter().map(Some).collect();
                    if actual == expected {
                        ticket.success(());
                    } else {
                        ticket.error(format!("{:?} != {:?}", actual, expected));
                    }
                }
                Err(err) => ticket.failure(err),
            }
        });
    }
    batch.finish().await.counts
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{key_data, test_context, CONJOINED_KEY, KEY};
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::{json, Value};

    fn state() -> TestState {
        let mut state = TestState::default();
        state.key_data.insert(KEY.to_owned(), key_data());
        state.conjoined_keys.insert(CONJOINED_KEY.to_owned());
        state
    }

    /// Answer listings for each of the run's prefixes with `listing`
    fn server(versions: bool, listing: Value) -> Server {
        let server = Server::run();
        for prefix in ["r1/", "r1/x"] {
            let prefix_query = request::query(url_decoded(contains(("prefix", prefix))));
            let expectation = if versions {
                Expectation::matching(all_of![
                    request::method_path("GET", "/data/"),
                    prefix_query,
                    request::query(url_decoded(contains(("versions", "true")))),
                ])
            } else {
                Expectation::matching(all_of![
                    request::method_path("GET", "/data/"),
                    prefix_query,
                    request::query(url_decoded(not(contains(key("versions"))))),
                ])
            };
            server.expect(expectation.respond_with(json_encoded(listing.clone())));
        }
        server
    }

    #[tokio::test]
    async fn keys_listed_within_run() {
        let server = server(
            false,
            json!({"key_data": [{"key": KEY}, {"key": CONJOINED_KEY}]}),
        );
        let counts = run_list_keys(&test_context(&server), &state()).await;
        assert!(counts.is_clean(), "{}", counts);
    }

    #[tokio::test]
    async fn unexpected_key_is_error() {
        let server = server(
            false,
            json!({"key_data": [
                {"key": KEY},
                {"key": CONJOINED_KEY},
                {"key": "r1/x/stray"},
            ]}),
        );
        let counts = run_list_keys(&test_context(&server), &state()).await;
        assert_eq!(counts.errors, 2);
    }

    #[tokio::test]
    async fn conjoined_versions_ignored() {
        let server = server(
            true,
            json!({"key_data": [
                {"key": KEY, "version_identifier": "v1"},
                {"key": CONJOINED_KEY, "version_identifier": "c1"},
            ]}),
        );
        let counts = run_list_versions(&test_context(&server), &state()).await;
        assert!(counts.is_clean(), "{}", counts);
    }

    #[tokio::test]
    async fn wrong_version_is_error() {
        let server = server(
            true,
            json!({"key_data": [
                {"key": KEY, "version_identifier": "v9"},
                {"key": CONJOINED_KEY, "version_identifier": "c1"},
            ]}),
        );
        let counts = run_list_versions(&test_context(&server), &state()).await;
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.failures, 0);
    }

    #[test]
    fn decode_listing() {
        let listing: Listing = serde_json::from_str(
            r#"{"key_data": [
                {"key": "aaa/k", "version_identifier": "v1", "timestamp": 1},
                {"key": "bbb/k"}
            ], "truncated": false}"#,
        )
        .unwrap();
        assert_eq!(listing.key_data.len(), 2);
        assert_eq!(listing.key_data[0].key, "aaa/k");
        assert_eq!(listing.key_data[0].version_identifier.as_deref(), Some("v1"));
        assert_eq!(listing.key_data[1].version_identifier, None);
    }
}
