use crate::commandline::Args;
use anyhow::{anyhow, Context, Result};
use nimbusio::{Client, ClientBuilder, Identity};
use rand::{distr::Alphanumeric, seq::IndexedRandom, Rng};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Everything a test operation needs to make requests.  This is shared, read-only, by all of
/// the concurrent operations in a phase.
pub struct TestContext {
    pub args: Args,
    pub client: Client,
    pub identity: Identity,
    pub collection_name: String,

    /// Every key this run archives begins with the run id and the separator, so listings
    /// can be confined to this run.
    pub run_id: String,
}

impl TestContext {
    /// Validate the arguments and load the identity.  Nothing here touches the network.
    pub fn setup(args: Args) -> Result<Self> {
        args.validate()?;
        let identity_file = args
            .identity_file
            .clone()
            .ok_or_else(|| anyhow!("you must specify a nimbus.io identity file"))?;
        let identity = Identity::from_file(&identity_file).with_context(|| {
            format!(
                "unable to load nimbus.io identity from {}",
                identity_file.display()
            )
        })?;
        let collection_name = args
            .collection_name
            .clone()
            .ok_or_else(|| anyhow!("you must specify a collection name"))?;
        let client = ClientBuilder::from_env()?.build()?;
        Self::new(args, client, identity, collection_name)
    }

    /// Build a context from its parts, generating a run id if the arguments do not give one.
    pub fn new(
        args: Args,
        client: Client,
        identity: Identity,
        collection_name: String,
    ) -> Result<Self> {
        args.validate()?;
        let run_id = args.run_id.clone().unwrap_or_else(generate_run_id);
        Ok(Self {
            args,
            client,
            identity,
            collection_name,
            run_id,
        })
    }

    /// A key name in this run under a randomly chosen prefix, such as
    /// `run-1792281600-k3x9qa/bbb/single_part_key_00002`
    pub fn random_key(&self, kind: &str, index: usize) -> String {
        let prefix = self
            .args
            .prefixes
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or("");
        format!(
            "{}{}{}_{:05}",
            self.list_prefix(prefix),
            self.args.separator,
            kind,
            index + 1
        )
    }

    /// The listing prefix selecting this run's keys under `prefix`; the empty prefix selects
    /// all of them
    pub fn list_prefix(&self, prefix: &str) -> String {
        format!("{}{}{}", self.run_id, self.args.separator, prefix)
    }

    /// The prefixes to list: the whole run, then each configured prefix within it
    pub fn list_prefixes(&self) -> Vec<String> {
        std::iter::once("")
            .chain(self.args.prefixes.iter().map(String::as_str))
            .map(|p| self.list_prefix(p))
            .collect()
    }
}

/// A run id unlikely to be repeated: the time, and some random characters
fn generate_run_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("run-{}-{}", secs, suffix)
}

/// What an archived single-part key should contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyData {
    pub length: u64,
    pub digest: String,
    pub version_identifier: String,
}

/// A byte range of a key, and the digest of the data it should contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceData {
    pub offset: u64,
    pub size: u64,
    pub digest: String,
}

/// What the test run has learned so far, carried from one phase to the next.
#[derive(Debug, Default)]
pub struct TestState {
    pub key_data: BTreeMap<String, KeyData>,
    pub conjoined_keys: BTreeSet<String>,
    pub slices: BTreeMap<String, SliceData>,
}

impl TestState {
    /// Every archived key, single-part or conjoined, beginning with `prefix`
    pub fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.key_data
            .keys()
            .chain(self.conjoined_keys.iter())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// The version identifiers of the single-part keys beginning with `prefix`
    pub fn versions_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.key_data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(_, d)| d.version_identifier.clone())
            .collect()
    }
}
