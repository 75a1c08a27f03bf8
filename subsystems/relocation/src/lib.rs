//! # keel Relocation Core
//!
//! Portable relocation engine for position-independent kernel images on
//! microcontroller-class targets. This crate runs exactly once per boot, as
//! the very first code after the image is placed in memory: it resolves the
//! final RAM placement of the image's sections, copies and zero-fills the
//! data sections, rewrites the global offset table, and patches a table of
//! raw pointer slots so every reference resolves to its relocated location.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Image        │──▶│ Section      │──▶│ Capacity     │──▶│ Copy / Zero  │
//! │ Metadata     │   │ Layout       │   │ Check        │   │ Data         │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │
//!                    ┌──────────────┐   ┌──────────────┐   ┌──────▼───────┐
//!                    │ Handoff      │◀──│ Pointer      │◀──│ GOT          │
//!                    │ (to crt0)    │   │ Patcher      │   │ Rewriter     │
//!                    └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Everything here is pure address arithmetic plus raw-memory reads and
//! writes: no heap, no globals, no architecture knowledge. The two pieces
//! that need target primitives (the fatal reporter and the final control
//! transfer) live in `keel-crt0`, which maps this crate's `Ok`/`Err` result
//! onto them. That split keeps the whole engine testable on a development
//! host against synthetic images in ordinary buffers.

#![cfg_attr(not(test), no_std)]

pub mod copy;
pub mod engine;
pub mod error;
pub mod image;
pub mod layout;
pub mod translate;

pub use engine::{relocate, Handoff, Relocator, Stage};
pub use error::{RelocError, RelocResult};
pub use image::{BootInterface, ImageMetadata, PatchEntry, SymbolTable};
pub use layout::{Region, SectionLayout};

/// Pointer-sized unit of the image format: offset-table slots, patch-table
/// entries, and all metadata fields are one word each.
pub type Word = usize;

/// Size of a [`Word`] in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<Word>();

/// Granularity the persistent-storage bookkeeping value is rounded up to
/// after the metadata region is consumed.
pub const ROM_RETENTION_ALIGN: usize = 32;
