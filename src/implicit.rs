//! # Implicit-List Allocator
//!
//! A dynamic memory allocator over an implicit free list with boundary-tag
//! coalescing and a next-fit placement policy.
//!
//! ## Heap Layout
//!
//! The heap is one contiguous run of blocks. There are no free-list links:
//! the "list" is implicit in the block sizes, and a walk from the bottom of
//! the heap reaches every block by repeatedly skipping over the current
//! block's size.
//!
//! ```text
//!   low                                                             high
//!   +-------+----------+----------+--~ ~--------------+-------------+
//!   |  pad  | prologue | prologue |   user blocks,    |  epilogue   |
//!   | word  |  header  |  footer  |   free blocks     |   header    |
//!   |   0   |  (8|a)   |  (8|a)   |   interleaved     |   (0|a)     |
//!   +-------+----------+----------+--~ ~--------------+-------------+
//!           |   permanently       |                   | permanently |
//!           |   allocated         |                   | allocated   |
//! ```
//!
//! The prologue (a payload-less 8-byte block) and the zero-size epilogue
//! header are sentinels: every real block therefore has a readable,
//! allocated neighbor on each side, and coalescing never needs a boundary
//! check.
//!
//! ## Block Layout
//!
//! ```text
//!                 bp (payload offset, what callers hold)
//!                 |
//!   +-------------+--------------------------------+-------------+
//!   | header word |         payload                | footer word |
//!   | size|alloc  |         size - 8 bytes         | size|alloc  |
//!   +-------------+--------------------------------+-------------+
//!   ^                                              ^
//!   bp - 4                                         bp + size - 8
//! ```
//!
//! Sizes are multiples of 8 and payload offsets are 8-byte aligned. The
//! footer duplicates the header so the previous block's size can be read
//! at `bp - 8` without knowing where that block starts.
//!
//! ## Placement: Next Fit
//!
//! Searches resume from a roving cursor (the "rover") instead of the
//! bottom of the heap:
//!
//! ```text
//!                        rover
//!                          |
//!   +----+-----+------+----v-----+--------+-----+----------+
//!   | pr | a   | FREE | a        | FREE   | a   | FREE     |
//!   +----+-----+--^---+----------+---^----+-----+----^-----+
//!                |                   |               |
//!                |    searched 2nd <-+-> searched 1st,
//!                +-- searched last       then wraps at the
//!                    (after wrap)        epilogue
//! ```
//!
//! A run of small allocations sweeps the rover forward past the exhausted
//! low end of the heap, which keeps the average search short at the price
//! of somewhat worse fragmentation than first fit. The rover is real state:
//! coalescing can swallow the block it references, so every merge repairs
//! it back to the surviving block.
//!
//! ## Coalescing
//!
//! Freeing is eager: a block is merged with its free physical neighbors
//! before `deallocate` returns, so two adjacent free blocks never survive a
//! public call. The footer of the left neighbor and the header of the right
//! neighbor are both one word away, making the four merge cases O(1).

use std::process;

use crate::{
  align,
  block::{DSIZE, MIN_BLOCK_SIZE, OVERHEAD, Tag, WSIZE},
  mem::{Arena, MAX_HEAP},
};

/// Initial heap extension and minimum growth unit, in bytes.
pub const CHUNKSIZE: usize = 1 << 12;

/// Errors surfaced while bootstrapping an allocator.
#[derive(Debug, PartialEq, Eq)]
pub enum InitError {
  /// The backing region could not be mapped.
  MapFailed,
  /// The reservation cannot hold the sentinels plus the first chunk.
  OutOfMemory,
}

/// A heap allocator over an implicit block list with boundary tags.
///
/// Block addresses are byte offsets into the allocator's [`Arena`];
/// `Option<usize>` stands in for nullable pointers. Payload bytes are
/// reached through [`ImplicitAllocator::payload`] and
/// [`ImplicitAllocator::payload_mut`].
///
/// All entry points take `&mut self`; there is no interior locking. Wrap
/// the allocator in a mutex if it must be shared.
pub struct ImplicitAllocator {
  arena: Arena,
  /// Payload offset of the prologue block; heap walks start here.
  heap_listp: usize,
  /// Next-fit cursor. Always references a live block's payload.
  rover: usize,
}

impl ImplicitAllocator {
  /// Creates an allocator over the default arena reservation
  /// ([`MAX_HEAP`]).
  pub fn new() -> Result<Self, InitError> {
    Self::with_max_heap(MAX_HEAP)
  }

  /// Creates an allocator whose arena can grow to at most `max_bytes`.
  ///
  /// The reservation must fit the sentinels plus one [`CHUNKSIZE`]
  /// extension, i.e. 4112 bytes with the default constants.
  pub fn with_max_heap(max_bytes: usize) -> Result<Self, InitError> {
    let arena = Arena::new(max_bytes).map_err(|_| InitError::MapFailed)?;
    let mut heap = Self {
      arena,
      heap_listp: 0,
      rover: 0,
    };

    // Sentinel layout: pad word, prologue header and footer, epilogue
    // header. The pad keeps payloads doubleword aligned.
    let start = heap.arena.sbrk(4 * WSIZE).ok_or(InitError::OutOfMemory)?;
    heap.arena.write_u32(start, 0);
    heap.arena.write_u32(start + WSIZE, Tag::new(DSIZE as u32, true).pack());
    heap.arena.write_u32(start + 2 * WSIZE, Tag::new(DSIZE as u32, true).pack());
    heap.arena.write_u32(start + 3 * WSIZE, Tag::new(0, true).pack());

    heap.heap_listp = start + 2 * WSIZE;
    heap.rover = heap.heap_listp;

    heap.extend_heap(CHUNKSIZE / WSIZE).ok_or(InitError::OutOfMemory)?;
    Ok(heap)
  }

  /// Allocates a block with at least `size` payload bytes and returns its
  /// payload offset.
  ///
  /// Returns `None` for a zero-sized request and when the arena is
  /// exhausted. The offset is always doubleword aligned.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<usize> {
    if size == 0 {
      return None;
    }

    let asize = Self::adjust_size(size);

    if let Some(bp) = self.find_fit(asize) {
      self.place(bp, asize);
      return Some(bp);
    }

    // No fit anywhere: grow the arena by at least one chunk.
    let bp = self.extend_heap(asize.max(CHUNKSIZE) / WSIZE)?;
    self.place(bp, asize);
    Some(bp)
  }

  /// Returns a block to the heap and merges it with any free neighbor.
  ///
  /// `None` is accepted and ignored, like `free(NULL)`. A live payload
  /// offset previously returned by [`ImplicitAllocator::allocate`] or
  /// [`ImplicitAllocator::reallocate`] must not be passed twice.
  pub fn deallocate(
    &mut self,
    ptr: Option<usize>,
  ) {
    let Some(bp) = ptr else {
      return;
    };

    let size = self.block_size(bp);
    self.set_block(bp, size, false);
    self.coalesce(bp);
  }

  /// Resizes a live block, preserving the payload prefix common to the old
  /// and new sizes.
  ///
  /// `reallocate(None, size)` behaves like [`ImplicitAllocator::allocate`],
  /// and `reallocate(ptr, 0)` behaves like
  /// [`ImplicitAllocator::deallocate`] and returns `None`. Shrinking and
  /// growing into a free right neighbor keep the block in place; otherwise
  /// the payload moves to a fresh block.
  ///
  /// If the fallback allocation fails the process is terminated with an
  /// error on stderr: at that point the request can neither be satisfied
  /// nor rolled back into a consistent heap.
  pub fn reallocate(
    &mut self,
    ptr: Option<usize>,
    size: usize,
  ) -> Option<usize> {
    let Some(bp) = ptr else {
      return self.allocate(size);
    };
    if size == 0 {
      self.deallocate(ptr);
      return None;
    }

    let copy_size = self.block_size(bp);
    let asize = Self::adjust_size(size);

    if asize == copy_size {
      return Some(bp);
    }

    if asize < copy_size {
      // Shrink in place. place() splits the tail off as a new free block
      // when it is big enough to stand alone.
      self.place(bp, asize);
      return Some(bp);
    }

    // Grow in place when the right neighbor is free and the combined span
    // is big enough.
    let next = self.next_block(bp);
    if !self.block_alloc(next) && copy_size + self.block_size(next) >= asize {
      let combined = copy_size + self.block_size(next);
      self.set_block(bp, combined, false);

      // The absorbed neighbor may hold the rover; repair it the same way
      // coalesce() does.
      if self.rover > bp && self.rover < self.next_block(bp) {
        self.rover = bp;
      }

      self.place(bp, asize);
      return Some(bp);
    }

    // Last resort: move the payload to a fresh block.
    let Some(new_bp) = self.allocate(size) else {
      eprintln!("rmalloc: allocation failed inside reallocate");
      process::exit(1);
    };
    let copy_len = size.min(copy_size - OVERHEAD);
    self.arena.copy(bp, new_bp, copy_len);
    self.deallocate(Some(bp));
    Some(new_bp)
  }

  /// Borrows the payload bytes of a live block.
  pub fn payload(
    &self,
    bp: usize,
  ) -> &[u8] {
    let len = self.block_size(bp) - OVERHEAD;
    self.arena.bytes(bp, len)
  }

  /// Mutably borrows the payload bytes of a live block.
  pub fn payload_mut(
    &mut self,
    bp: usize,
  ) -> &mut [u8] {
    let len = self.block_size(bp) - OVERHEAD;
    self.arena.bytes_mut(bp, len)
  }

  /// Current heap extent in bytes, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.arena.size()
  }

  /// Walks the whole heap and reports structural damage to stderr.
  ///
  /// Checks payload alignment and header/footer agreement for every block
  /// and validates both sentinels. With `verbose` set, also dumps each
  /// block. Diagnostic only: nothing is mutated and nothing panics.
  pub fn check_heap(
    &self,
    verbose: bool,
  ) {
    if verbose {
      eprintln!(
        "heap [{:#x}, {:#x}], {} bytes, first block at {:#x}:",
        self.arena.lo(),
        self.arena.hi(),
        self.arena.size(),
        self.heap_listp,
      );
    }

    if self.block_size(self.heap_listp) != DSIZE || !self.block_alloc(self.heap_listp) {
      eprintln!("error: bad prologue header");
    }

    let mut bp = self.heap_listp;
    while self.block_size(bp) > 0 {
      if verbose {
        self.print_block(bp);
      }
      self.check_block(bp);
      bp = self.next_block(bp);
    }

    if verbose {
      self.print_block(bp);
    }
    if self.block_size(bp) != 0 || !self.block_alloc(bp) {
      eprintln!("error: bad epilogue header");
    }
  }

  /// Request size to block size: the payload rounded up to the doubleword
  /// granularity, plus two tag words, never below the minimum block.
  fn adjust_size(size: usize) -> usize {
    if size <= DSIZE {
      MIN_BLOCK_SIZE
    } else {
      align!(size + OVERHEAD, DSIZE)
    }
  }

  /// Grows the heap by at least `words` words and returns the payload
  /// offset of the (coalesced) free block covering the new space, or
  /// `None` when the arena refuses.
  ///
  /// The new block's header overwrites the old epilogue header and a fresh
  /// epilogue header is written above the new footer, so the sentinel
  /// structure survives every extension.
  fn extend_heap(
    &mut self,
    words: usize,
  ) -> Option<usize> {
    // An even word count keeps every block doubleword sized.
    let size = align!(words, 2) * WSIZE;

    let bp = self.arena.sbrk(size)?;
    self.set_block(bp, size, false);

    let epilogue = self.next_block(bp);
    self.arena.write_u32(self.header(epilogue), Tag::new(0, true).pack());

    Some(self.coalesce(bp))
  }

  /// Next-fit search: resume from the rover, wrap past the epilogue to the
  /// bottom of the list, and give up after one full cycle. The rover moves
  /// only when a fit is found.
  fn find_fit(
    &mut self,
    asize: usize,
  ) -> Option<usize> {
    // From the rover up to the epilogue...
    let start = self.rover;
    let mut bp = start;
    while self.block_size(bp) > 0 {
      if !self.block_alloc(bp) && self.block_size(bp) >= asize {
        self.rover = bp;
        return Some(bp);
      }
      bp = self.next_block(bp);
    }

    // ...then from the first block back up to the rover.
    bp = self.heap_listp;
    while bp < start {
      if !self.block_alloc(bp) && self.block_size(bp) >= asize {
        self.rover = bp;
        return Some(bp);
      }
      bp = self.next_block(bp);
    }

    None
  }

  /// Marks the free block at `bp` allocated for an adjusted request of
  /// `asize` bytes, splitting the tail off as a new free block when the
  /// remainder can stand on its own.
  fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) {
    let csize = self.block_size(bp);

    if csize - asize >= MIN_BLOCK_SIZE {
      self.set_block(bp, asize, true);

      let rest = self.next_block(bp);
      self.set_block(rest, csize - asize, false);
      // The tail usually borders an allocated block, but the reallocate
      // paths can drop it next to a free one.
      self.coalesce(rest);
    } else {
      self.set_block(bp, csize, true);
    }
  }

  /// Boundary-tag coalescing: merges the free block at `bp` with its free
  /// physical neighbors and returns the payload offset of the survivor.
  ///
  /// The sentinels make the neighbor reads unconditional: the prologue
  /// sits below the first real block and the epilogue above the last, and
  /// both are permanently allocated.
  fn coalesce(
    &mut self,
    bp: usize,
  ) -> usize {
    let prev_alloc = Tag::unpack(self.arena.read_u32(bp - DSIZE)).alloc;
    let next_alloc = self.block_alloc(self.next_block(bp));
    let mut size = self.block_size(bp);

    let bp = if prev_alloc && next_alloc {
      return bp;
    } else if prev_alloc && !next_alloc {
      size += self.block_size(self.next_block(bp));
      self.set_block(bp, size, false);
      bp
    } else if !prev_alloc && next_alloc {
      let prev = self.prev_block(bp);
      size += self.block_size(prev);
      self.set_block(prev, size, false);
      prev
    } else {
      let prev = self.prev_block(bp);
      size += self.block_size(prev) + self.block_size(self.next_block(bp));
      self.set_block(prev, size, false);
      prev
    };

    // A merge can swallow the block the rover referenced; point it at the
    // survivor.
    if self.rover > bp && self.rover < self.next_block(bp) {
      self.rover = bp;
    }
    bp
  }

  // Boundary-tag navigation. All of these read tags out of the arena; a
  // payload offset is valid input whenever its block's header is intact.

  fn header(
    &self,
    bp: usize,
  ) -> usize {
    bp - WSIZE
  }

  fn footer(
    &self,
    bp: usize,
  ) -> usize {
    bp + self.block_size(bp) - DSIZE
  }

  fn block_size(
    &self,
    bp: usize,
  ) -> usize {
    Tag::unpack(self.arena.read_u32(self.header(bp))).size as usize
  }

  fn block_alloc(
    &self,
    bp: usize,
  ) -> bool {
    Tag::unpack(self.arena.read_u32(self.header(bp))).alloc
  }

  /// Payload offset of the physically next block.
  fn next_block(
    &self,
    bp: usize,
  ) -> usize {
    bp + self.block_size(bp)
  }

  /// Payload offset of the physically previous block. Reads the footer
  /// directly below `bp`'s header; the prologue guarantees every real
  /// block has one.
  fn prev_block(
    &self,
    bp: usize,
  ) -> usize {
    bp - Tag::unpack(self.arena.read_u32(bp - DSIZE)).size as usize
  }

  /// Writes matching header and footer tags for the block at `bp`.
  fn set_block(
    &mut self,
    bp: usize,
    size: usize,
    alloc: bool,
  ) {
    let word = Tag::new(size as u32, alloc).pack();
    self.arena.write_u32(bp - WSIZE, word);
    self.arena.write_u32(bp + size - DSIZE, word);
  }

  fn print_block(
    &self,
    bp: usize,
  ) {
    let header = Tag::unpack(self.arena.read_u32(self.header(bp)));
    if header.size == 0 {
      eprintln!("{bp:#010x}: EOL");
      return;
    }

    let footer = Tag::unpack(self.arena.read_u32(self.footer(bp)));
    eprintln!(
      "{:#010x}: header [{}:{}] footer [{}:{}]",
      bp,
      header.size,
      if header.alloc { 'a' } else { 'f' },
      footer.size,
      if footer.alloc { 'a' } else { 'f' },
    );
  }

  fn check_block(
    &self,
    bp: usize,
  ) {
    if bp % DSIZE != 0 {
      eprintln!("error: payload at {bp:#x} is not doubleword aligned");
    }
    if self.arena.read_u32(self.header(bp)) != self.arena.read_u32(self.footer(bp)) {
      eprintln!("error: header does not match footer at {bp:#x}");
    }
  }
}
