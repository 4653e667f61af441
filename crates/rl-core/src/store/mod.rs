//! Identity storage
//!
//! [`IdentityStore`] is the typed facade the controllers use; the
//! [`KeyValueBackend`](crate::traits::KeyValueBackend) underneath decides
//! where the bytes live.

mod file;
mod identity;
mod memory;

pub use file::FileBackend;
pub use identity::IdentityStore;
pub use memory::MemoryBackend;
