//! Collaborator implementations shipped with the library.
//!
//! Planning-system integrations implement the traits in [`crate::engine::ports`]
//! themselves; [`memory::MemoryCase`] is a self-contained voxel case used for
//! rehearsing plans from the command line and in tests.

pub mod memory;
