use crate::batch::{Batch, Counts};
use crate::data::{feed, random_length};
use crate::state::{KeyData, TestContext, TestState};
use anyhow::{bail, Result};
use log::debug;
use nimbusio_upload::{archive, PassThruProducer};
use std::sync::Arc;

/// Archive `number_of_single_part_keys` keys of random sizes, each fed slowly while its
/// request is in flight.
pub async fn run(ctx: &Arc<TestContext>, state: &mut TestState) -> Counts {
    let args = &ctx.args;
    let batch = Batch::new("single-part archive");
    for i in 0..args.number_of_single_part_keys {
        let key = ctx.random_key("single_part_key", i);
        let length = random_length(
            args.min_single_part_file_size,
            args.max_single_part_file_size,
        );
        debug!("starting archive for {:?} ({} bytes)", key, length);

        let ticket = batch.ticket(key.clone());
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match archive_key(&ctx, &key, length).await {
                Ok(data) => ticket.success((key, data)),
                Err(err) => ticket.failure(err),
            }
        });
    }

    let result = batch.finish().await;
    state.key_data.extend(result.results);
    result.counts
}

async fn archive_key(ctx: &TestContext, key: &str, length: u64) -> Result<KeyData> {
    let producer = Arc::new(PassThruProducer::new(key, length));
    let feeder = tokio::spawn(feed(producer.clone(), ctx.args.feed_delays()));
    let res = archive(
        &ctx.client,
        &ctx.identity,
        &ctx.collection_name,
        key,
        producer.clone(),
    )
    .await;
    feeder.abort();
    key_data(&producer, length, res?.version_identifier)
}

/// What to record for a key once the server has acknowledged it.  The server must not answer
/// before the whole body is sent.
fn key_data(
    producer: &PassThruProducer,
    length: u64,
    version_identifier: String,
) -> Result<KeyData> {
    if !producer.is_finished() {
        bail!(
            "server answered with {} bytes still unsent",
            producer.bytes_remaining_to_write()
        );
    }
    Ok(KeyData {
        length,
        digest: producer.digest(),
        version_identifier,
    })
}
