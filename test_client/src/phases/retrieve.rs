use crate::batch::{Batch, Counts};
use crate::data::random_slice;
use crate::state::{SliceData, TestContext, TestState};
use log::debug;
use nimbusio_download::retrieve_to_vec;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Retrieve every single-part key in full, checking its length and digest.  Each key that
/// checks out also gets a random slice chosen for the retrieve-slice phase.
pub async fn run(ctx: &Arc<TestContext>, state: &mut TestState) -> Counts {
    let batch = Batch::new("retrieve");
    for (key, expected) in &state.key_data {
        debug!("retrieving {:?}", key);
        let ticket = batch.ticket(key.clone());
        let (ctx, key, expected) = (ctx.clone(), key.clone(), expected.clone());
        tokio::spawn(async move {
            let data = match retrieve_to_vec(&ctx.client, &ctx.identity, &ctx.collection_name, &key)
                .await
            {
                Ok(data) => data,
                Err(err) => return ticket.failure(err),
            };
            if data.len() as u64 != expected.length {
                return ticket.error(format!(
                    "size mismatch {} != {}",
                    data.len(),
                    expected.length
                ));
            }
            if hex::encode(Sha256::digest(&data)) != expected.digest {
                return ticket.error("sha256 mismatch");
            }
            let slice = random_slice(expected.length).map(|(offset, size)| {
                let bytes = &data[offset as usize..(offset + size) as usize];
                SliceData {
                    offset,
                    size,
                    digest: hex::encode(Sha256::digest(bytes)),
                }
            });
            ticket.success((key, slice));
        });
    }

    let result = batch.finish().await;
    state.slices.extend(
        result
            .results
            .into_iter()
            .filter_map(|(key, slice)| slice.map(|s| (key, s))),
    );
    result.counts
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{key_data, test_context, DATA, KEY, KEY_PATH};
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn state() -> TestState {
        let mut state = TestState::default();
        state.key_data.insert(KEY.to_owned(), key_data());
        state
    }

    #[tokio::test]
    async fn slice_chosen_from_data() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", KEY_PATH))
                .respond_with(status_code(200).body(DATA)),
        );
        let mut state = state();

        let counts = run(&test_context(&server), &mut state).await;

        assert!(counts.is_clean(), "{}", counts);
        let slice = &state.slices[KEY];
        let (start, end) = (slice.offset as usize, (slice.offset + slice.size) as usize);
        assert!(slice.size > 0 && end <= DATA.len());
        assert_eq!(slice.digest, hex::encode(Sha256::digest(&DATA[start..end])));
    }

    #[tokio::test]
    async fn wrong_data_is_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", KEY_PATH))
                .respond_with(status_code(200).body("9876543210")),
        );
        let mut state = state();

        let counts = run(&test_context(&server), &mut state).await;

        assert_eq!(counts.errors, 1);
        assert!(state.slices.is_empty());
    }

    #[tokio::test]
    async fn short_data_is_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", KEY_PATH))
                .respond_with(status_code(200).body(&DATA[..4])),
        );
        let mut state = state();

        let counts = run(&test_context(&server), &mut state).await;

        assert_eq!(counts.errors, 1);
        assert!(state.slices.is_empty());
    }
}
