//! The phases of a test run.  Each phase starts one operation per key (or prefix)
//! concurrently, waits for all of them, records what it learned in the [`TestState`], and
//! returns its error and failure counts.
//!
//! [`TestState`]: crate::state::TestState
pub mod conjoined;
pub mod head;
pub mod list;
pub mod retrieve;
pub mod retrieve_slice;
pub mod retrieve_stream;
pub mod single_part;
