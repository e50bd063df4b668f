//! # Engine Module
//!
//! This module implements the planning engine: the components that lay out isocenters,
//! slice junctions into graduated shells, feather the dose across them, order the
//! optimizations, and combine the doses of both frames.
//!
//! ## Architecture
//!
//! - **Layout** ([`layout`]) - Isocenter count, spacing and positions per frame
//! - **Junctions** ([`junction`]) - Graduated shells around each field overlap
//! - **Feathering** ([`feathering`]) - Disjoint dose bands per shell, with a bounded fallback
//! - **Frame transforms** ([`transform`]) - Rigid mappings of points, boxes and regions
//! - **Sequencing** ([`sequencer`]) - Ranked, chained optimization jobs across both frames
//! - **Aggregation** ([`aggregate`]) - Grid reconciliation and the fraction-weighted sum
//! - **Collaborators** ([`ports`]) - Structure algebra, registration and dose engine traits
//! - **Configuration** ([`config`]) - Typed parameters with validation and builders
//! - **Error Handling** ([`error`]) - Fatal errors and recoverable warnings
//!
//! Every operation takes its frame explicitly; nothing in this module keeps a notion of a
//! "current" frame. Region writes go through the frame namespace's get-or-create, so each
//! stage can be rerun without leaving duplicates behind.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod feathering;
pub mod junction;
pub mod layout;
pub mod ports;
pub mod progress;
pub mod retry;
pub mod sequencer;
pub mod transform;
pub(crate) mod utils;
