//! Random test data, fed to producers at a configurable pace.
use bytes::Bytes;
use nimbusio_upload::PassThruProducer;
use rand::{distr::Alphanumeric, Rng};
use std::cmp;
use std::sync::Arc;
use std::time::Duration;

/// The largest chunk fed to a producer at once
pub const FEED_CHUNK_SIZE: u64 = 1024 * 1024;

/// `size` bytes of printable random data
pub fn random_chunk(size: usize) -> Bytes {
    let rng = rand::rng();
    rng.sample_iter(&Alphanumeric)
        .take(size)
        .collect::<Vec<u8>>()
        .into()
}

pub fn random_length(min: u64, max: u64) -> u64 {
    rand::rng().random_range(min..=max)
}

pub fn random_delay((min, max): (Duration, Duration)) -> Duration {
    rand::rng().random_range(min..=max)
}

/// Feed random data to the producer until it has all `length` bytes, sleeping for a random
/// delay in the given range before each chunk.
pub async fn feed(producer: Arc<PassThruProducer>, delays: (Duration, Duration)) {
    loop {
        let remaining = producer.bytes_remaining_to_write();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(random_delay(delays)).await;
        let size = cmp::min(remaining, FEED_CHUNK_SIZE) as usize;
        producer.feed(random_chunk(size));
    }
}

/// Split `length` into part sizes of at most `max_part_size`
pub fn part_sizes(length: u64, max_part_size: u64) -> Vec<u64> {
    let mut sizes = vec![];
    let mut remaining = length;
    while remaining > 0 {
        let size = cmp::min(remaining, max_part_size);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}

/// Choose a non-empty slice of `length` bytes, as `(offset, size)`
pub fn random_slice(length: u64) -> Option<(u64, u64)> {
    if length == 0 {
        return None;
    }
    let mut rng = rand::rng();
    let offset = rng.random_range(0..length);
    let size = rng.random_range(1..=length - offset);
    Some((offset, size))
}
