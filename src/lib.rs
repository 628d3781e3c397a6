//! # rmalloc - An Implicit-List Memory Allocator Library
//!
//! This crate provides a general-purpose **dynamic memory allocator** built
//! on an implicit free list with boundary tags, next-fit placement, and
//! eager coalescing, managing a single monotonically growable byte arena.
//!
//! ## Overview
//!
//! ```text
//!   Implicit Free List Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                          HEAP ARENA                              │
//!   │                                                                  │
//!   │  ┌────┬──────────┬──────┬──────────────┬──────┬──────────┬────┐  │
//!   │  │pad │ prologue │ A1   │   free       │ A2   │   free   │epi │  │
//!   │  └────┴──────────┴──────┴──────────────┴──────┴──────────┴────┘  │
//!   │                  ▲                      ▲                        │
//!   │                  │                      │                        │
//!   │        every block carries its     walking the heap is just      │
//!   │        size in a header and a      "add the size, repeat"        │
//!   │        footer word                                               │
//!   └──────────────────────────────────────────────────────────────────┘
//!
//!   Freed blocks are recycled: a roving next-fit search finds them, and
//!   adjacent free blocks are merged the moment they appear.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rmalloc
//!   ├── align      - Power-of-two rounding macro (align!)
//!   ├── block      - Boundary-tag codec and size constants
//!   ├── mem        - Arena provider (mmap-backed, offset-addressed)
//!   └── implicit   - ImplicitAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rmalloc::ImplicitAllocator;
//!
//! let mut heap = ImplicitAllocator::new().expect("failed to reserve the arena");
//!
//! // Offsets play the role of pointers; None plays the role of null.
//! let p = heap.allocate(24);
//! let bp = p.expect("out of memory");
//!
//! heap.payload_mut(bp)[..5].copy_from_slice(b"hello");
//! assert_eq!(&heap.payload(bp)[..5], b"hello");
//!
//! // Growing keeps the payload prefix intact.
//! let p = heap.reallocate(p, 100);
//! assert_eq!(&heap.payload(p.unwrap())[..5], b"hello");
//!
//! heap.deallocate(p);
//! ```
//!
//! ## How It Works
//!
//! The arena is an anonymous private mapping reserved once and grown by
//! moving a break offset, one way only. Every block in it is a multiple of
//! 8 bytes, at least 16 bytes long, and framed by a pair of identical tag
//! words:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────┬───────────────────────────────┬───────────────┐
//!   │  header word  │           payload             │  footer word  │
//!   │  size | alloc │        (size - 8 bytes)       │  size | alloc │
//!   └───────────────┴───────────────────────────────┴───────────────┘
//!                   ▲
//!                   └── Offset handed to the caller (8-byte aligned)
//! ```
//!
//! A permanently allocated prologue block below the first real block and a
//! zero-size allocated epilogue header above the last one remove every
//! boundary check from coalescing: each real block always has a readable
//! neighbor tag on both sides.
//!
//! ## Features
//!
//! - **Block recycling**: freed space is found again by a next-fit search
//! - **Eager coalescing**: no two adjacent free blocks ever survive a call
//! - **In-place realloc**: shrinks always, grows when the neighbor is free
//! - **Heap checker**: a linear walker that reports structural damage
//!
//! ## Limitations
//!
//! - **Single-threaded**: no synchronization; wrap it in a mutex to share
//! - **One-way growth**: the arena never returns memory to the OS mid-life
//! - **Doubleword alignment only**: no support for larger alignments
//! - **Unix-only**: the arena is backed by `mmap` (via `libc`)
//!
//! ## Safety
//!
//! The public surface is safe: blocks are offsets, not pointers, and every
//! arena access is bounds-checked against the break. Passing an offset that
//! was never returned by the allocator (or was already freed) corrupts the
//! heap bookkeeping, but stays inside the arena mapping.

pub mod align;
mod block;
mod implicit;
pub mod mem;

pub use block::{DSIZE, MIN_BLOCK_SIZE, OVERHEAD, WSIZE};
pub use implicit::{CHUNKSIZE, ImplicitAllocator, InitError};
pub use mem::{Arena, ArenaError, MAX_HEAP};
