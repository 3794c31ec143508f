use crate::batch::{Batch, Counts};
use crate::state::{TestContext, TestState};
use log::debug;
use nimbusio_download::head;
use std::sync::Arc;

/// HEAD every single-part key, checking its Content-Length.
pub async fn run(ctx: &Arc<TestContext>, state: &TestState) -> Counts {
    let batch: Batch<()> = Batch::new("HEAD");
    for (key, data) in &state.key_data {
        debug!("starting HEAD for {:?}", key);
        let ticket = batch.ticket(key.clone());
        let (ctx, key, length) = (ctx.clone(), key.clone(), data.length);
        tokio::spawn(async move {
            match head(&ctx.client, &ctx.identity, &ctx.collection_name, &key).await {
                Ok(headers) => match headers.content_length() {
                    Some(l) if l == length => ticket.success(()),
                    other => ticket.error(format!(
                        "Content-Length {:?} != {}",
                        other, length
                    )),
                },
                Err(err) => ticket.failure(err),
            }
        });
    }
    batch.finish().await.counts
}
