use crate::batch::{Batch, Counts};
use crate::state::{TestContext, TestState};
use log::debug;
use nimbusio_download::{retrieve_stream, StreamingSink};
use std::sync::Arc;
use std::time::Duration;

/// How long a paced sink waits before accepting the next chunk
const RESUME_INTERVAL: Duration = Duration::from_millis(10);

/// Retrieve every single-part key through a slow consumer: a paced [`StreamingSink`] that
/// pauses after each chunk and is resumed by a timer.  The byte count and digest must match.
pub async fn run(ctx: &Arc<TestContext>, state: &TestState) -> Counts {
    let batch: Batch<()> = Batch::new("retrieve stream");
    for (key, expected) in &state.key_data {
        debug!("streaming {:?}", key);
        let ticket = batch.ticket(key.clone());
        let (ctx, key, expected) = (ctx.clone(), key.clone(), expected.clone());
        tokio::spawn(async move {
            let sink = Arc::new(StreamingSink::paced(|_| {}));
            let resumer = {
                let sink = sink.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(RESUME_INTERVAL).await;
                        sink.resume();
                    }
                })
            };
            let res = retrieve_stream(
                &ctx.client,
                &ctx.identity,
                &ctx.collection_name,
                &key,
                sink.clone(),
            )
            .await;
            resumer.abort();
            sink.done();

            if let Err(err) = res {
                ticket.failure(err);
            } else if sink.bytes_read() != expected.length {
                ticket.error(format!(
                    "size mismatch {} != {}",
                    sink.bytes_read(),
                    expected.length
                ));
            } else if sink.digest() != expected.digest {
                ticket.error("sha256 mismatch");
            } else {
                ticket.success(());
            }
        });
    }
    batch.finish().await.counts
}
