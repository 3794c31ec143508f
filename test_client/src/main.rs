use clap::Parser;
use log::{error, info};
use nimbusio_test_client::commandline::Args;
use nimbusio_test_client::run;
use nimbusio_test_client::state::TestContext;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let ctx = match TestContext::setup(args) {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            error!("setup failed: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let tally = run(ctx).await;
    tally.report();
    if tally.is_clean() {
        info!("test run successful");
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
