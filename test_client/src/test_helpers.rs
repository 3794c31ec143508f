//! A test context pointed at a fake nimbus.io server
use crate::commandline::Args;
use crate::state::{KeyData, TestContext};
use clap::Parser;
use httptest::Server;
use nimbusio::{ClientBuilder, Identity};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Contents of the single-part key in [`KEY`]
pub(crate) const DATA: &[u8] = b"0123456789";

/// The one single-part key a test context archives, and its request path
pub(crate) const KEY: &str = "r1/x/single_part_key_00001";
pub(crate) const KEY_PATH: &str = "/data/r1%2Fx%2Fsingle_part_key_00001";

/// The one conjoined key a test context archives, and its request paths
pub(crate) const CONJOINED_KEY: &str = "r1/x/conjoined_key_00001";
pub(crate) const CONJOINED_DATA_PATH: &str = "/data/r1%2Fx%2Fconjoined_key_00001";
pub(crate) const CONJOINED_PATH: &str = "/conjoined/r1%2Fx%2Fconjoined_key_00001";

/// A context for collection `coll` on `server`, with run id `r1` and the single prefix `x`.
/// It archives one 10-byte single-part key, and one 10-byte conjoined key in parts of 6 and
/// 4 bytes, without feed delays.
pub(crate) fn test_context(server: &Server) -> Arc<TestContext> {
    let args = Args::try_parse_from([
        "nimbusio-test-client",
        "--run-id",
        "r1",
        "--prefix",
        "x",
        "--number-of-single-part-keys",
        "1",
        "--number-of-conjoined-keys",
        "1",
        "--min-single-part-file-size",
        "10",
        "--max-single-part-file-size",
        "10",
        "--min-conjoined-file-size",
        "10",
        "--max-conjoined-file-size",
        "10",
        "--max-conjoined-part-size",
        "6",
        "--min-feed-delay",
        "0",
        "--max-feed-delay",
        "0",
    ])
    .unwrap();
    let addr = server.addr();
    let client = ClientBuilder::new()
        .service_ssl(false)
        .service_domain(format!("nimbus.test:{}", addr.port()))
        .resolve("coll.nimbus.test", addr)
        .build()
        .unwrap();
    let identity = Identity::new("motoboto", 1, "sekrit");
    Arc::new(TestContext::new(args, client, identity, "coll".to_owned()).unwrap())
}

/// What the state should record for [`KEY`] archived with [`DATA`]
pub(crate) fn key_data() -> KeyData {
    KeyData {
        length: DATA.len() as u64,
        digest: hex::encode(Sha256::digest(DATA)),
        version_identifier: "v1".to_owned(),
    }
}
