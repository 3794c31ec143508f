use crate::batch::{Batch, Counts};
use crate::state::{TestContext, TestState};
use log::debug;
use nimbusio_download::retrieve_slice;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Retrieve the slice chosen for each key, checking its size and digest.
pub async fn run(ctx: &Arc<TestContext>, state: &TestState) -> Counts {
    let batch: Batch<()> = Batch::new("retrieve slice");
    for (key, slice) in &state.slices {
        debug!("retrieving {:?} ({}, {})", key, slice.offset, slice.size);
        let ticket = batch.ticket(format!("{} ({}, {})", key, slice.offset, slice.size));
        let (ctx, key, slice) = (ctx.clone(), key.clone(), slice.clone());
        tokio::spawn(async move {
            let res = retrieve_slice(
                &ctx.client,
                &ctx.identity,
                &ctx.collection_name,
                &key,
                slice.offset,
                Some(slice.size),
            )
            .await;
            match res {
                Ok(data) if data.len() as u64 != slice.size => {
                    ticket.error(format!("size mismatch {} != {}", data.len(), slice.size))
                }
                Ok(data) if hex::encode(Sha256::digest(&data)) != slice.digest => {
                    ticket.error("sha256 mismatch")
                }
                Ok(_) => ticket.success(()),
                Err(err) => ticket.failure(err),
            }
        });
    }
    batch.finish().await.counts
}
