//! Filesystem primitives for spool.
//!
//! - [`ThrottledCopier`] copies regular files chunk by chunk, optionally
//!   paced to a [`Bandwidth`] ceiling, and refuses same-file and named-pipe
//!   copies.
//! - [`path`] resolves caller-supplied names to normalized absolute paths.
//! - [`Clock`] abstracts waiting so throttle and retry timing can be tested
//!   on a [`ManualClock`].

pub mod bandwidth;
pub mod clock;
pub mod copy;
pub mod path;

mod error;

pub use bandwidth::Bandwidth;
pub use clock::{Clock, ManualClock, SystemClock};
pub use copy::{DEFAULT_CHUNK_LEN, ThrottledCopier, copy, copy_file, copy_mode, same_file};
pub use error::{Error, Result};
pub use path::{absolutize, resolve_checked};
