/*! Support for retrieving data from nimbus.io.

This crate provides the two response consumers most callers need, and a set of functions that
use them to retrieve a key's data.

* [`BufferingSink`] accumulates an entire response body in memory, and can decode it as JSON;
* [`StreamingSink`] hands each chunk to a caller-supplied handler as it arrives, keeping only a
  byte count and digest, and supports pausing delivery (including a paced mode that pauses
  after every chunk).

## Convenience Functions

* [`retrieve_to_vec`] -- retrieve a key's data to a dynamically allocated buffer;
* [`retrieve_slice`] -- retrieve a byte range of a key's data;
* [`retrieve_stream`] -- retrieve a key's data into a [`StreamingSink`]; and
* [`head`] -- retrieve only a key's headers.

 */
mod buffering;
mod retrieve;
mod streaming;

#[cfg(test)]
mod test_helpers;

pub use buffering::BufferingSink;
pub use retrieve::{head, retrieve_slice, retrieve_stream, retrieve_to_vec};
pub use streaming::StreamingSink;
