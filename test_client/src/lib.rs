/*! An end-to-end test battery for the nimbus.io client.

A run archives a set of keys into an existing collection, some as single-part archives fed
slowly while the request is in flight and some as conjoined archives, then reads them back:
HEAD, list keys, list versions, full retrieval, slice retrieval, and streaming retrieval
through a slow consumer.  Each phase runs its operations concurrently and waits for all of them
before the next phase begins.

Every mismatch (an error) and every request that did not complete (a failure) is counted, and
the run is successful only if there are none.
*/
pub mod batch;
pub mod commandline;
pub mod data;
pub mod phases;
pub mod state;

#[cfg(test)]
mod test_helpers;

use batch::Tally;
use log::info;
use phases::*;
use state::{TestContext, TestState};
use std::sync::Arc;

/// Run every phase in order, returning the tally of errors and failures.
pub async fn run(ctx: Arc<TestContext>) -> Tally {
    let mut state = TestState::default();
    let mut tally = Tally::default();
    info!(
        "starting user_name = {} collection = {} run_id = {}",
        ctx.identity.user_name, ctx.collection_name, ctx.run_id
    );

    tally.add("single-part archive", single_part::run(&ctx, &mut state).await);
    info!(
        "all archives complete. {} keys for further testing",
        state.key_data.len()
    );
    tally.add("conjoined archive", conjoined::run(&ctx, &mut state).await);
    tally.add("HEAD", head::run(&ctx, &state).await);
    tally.add("list keys", list::run_list_keys(&ctx, &state).await);
    tally.add("list versions", list::run_list_versions(&ctx, &state).await);
    tally.add("retrieve", retrieve::run(&ctx, &mut state).await);
    tally.add("retrieve slice", retrieve_slice::run(&ctx, &state).await);
    tally.add("retrieve stream", retrieve_stream::run(&ctx, &state).await);

    tally
}
