//! Utility functions for the engine module.
//!
//! Region bookkeeping shared by the junction builder, the feathering resolver and the
//! frame transform: every region the engine writes is claimed in the frame namespace and
//! in the structure-algebra engine together, and released the same way.

pub mod regions;
