use crate::batch::{Batch, Counts};
use crate::data::{feed, part_sizes, random_length};
use crate::state::{TestContext, TestState};
use anyhow::Result;
use log::{debug, info};
use nimbusio_upload::{
    archive_conjoined_part, finish_conjoined, start_conjoined, PassThruProducer,
};
use std::sync::Arc;
use std::time::Duration;

/// Archive `number_of_conjoined_keys` keys as conjoined archives: start each, upload its parts
/// in order, then finish it.
pub async fn run(ctx: &Arc<TestContext>, state: &mut TestState) -> Counts {
    let args = &ctx.args;
    let batch = Batch::new("conjoined archive");
    for i in 0..args.number_of_conjoined_keys {
        let key = ctx.random_key("conjoined_key", i);
        let length = random_length(args.min_conjoined_file_size, args.max_conjoined_file_size);
        debug!("starting conjoined archive for {:?} ({} bytes)", key, length);

        let ticket = batch.ticket(key.clone());
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match archive_conjoined(&ctx, &key, length).await {
                Ok(()) => ticket.success(key),
                Err(err) => ticket.failure(err),
            }
        });
    }

    let result = batch.finish().await;
    state.conjoined_keys.extend(result.results);
    result.counts
}

async fn archive_conjoined(ctx: &TestContext, key: &str, length: u64) -> Result<()> {
    let (client, identity, collection_name) = (&ctx.client, &ctx.identity, &ctx.collection_name);
    let conjoined_identifier = start_conjoined(client, identity, collection_name, key)
        .await?
        .conjoined_identifier;
    info!("start conjoined {}: identifier = {}", key, conjoined_identifier);

    for (i, size) in part_sizes(length, ctx.args.max_conjoined_part_size)
        .into_iter()
        .enumerate()
    {
        let part = i as u32 + 1;
        let producer = Arc::new(PassThruProducer::new(
            format!("{} part {}", key, part),
            size,
        ));
        // parts are fed as fast as the connection will take them
        let feeder = tokio::spawn(feed(producer.clone(), (Duration::ZERO, Duration::ZERO)));
        let res = archive_conjoined_part(
            client,
            identity,
            collection_name,
            key,
            &conjoined_identifier,
            part,
            producer,
        )
        .await;
        feeder.abort();
        debug!("{} part {} archived as {}", key, part, res?.version_identifier);
    }

    let finished = finish_conjoined(client, identity, collection_name, key, &conjoined_identifier)
        .await?;
    info!("finish conjoined {}: {}", key, finished);
    Ok(())
}
