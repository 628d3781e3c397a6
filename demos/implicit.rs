use std::io::Read;

use rmalloc::{CHUNKSIZE, ImplicitAllocator};

/// Waits until the user presses ENTER.
/// Useful when you want to follow the block dumps step by step, or inspect
/// the process with tools like `pmap` while the heap sits still.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints a one-line summary on stdout and the full block dump on stderr.
fn dump(
  heap: &ImplicitAllocator,
  label: &str,
) {
  println!("[{label}] heap extent = {} bytes", heap.heap_size());
  heap.check_heap(true);
}

fn main() {
  // An implicit-list heap: every block carries a header and a footer tag,
  // and the walk below derives adjacency from the sizes alone.
  let mut heap = ImplicitAllocator::new().expect("failed to reserve the arena");

  dump(&heap, "start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) A tiny allocation splits the initial 4 KiB chunk: a 32-byte
  //    allocated block up front, the rest stays free.
  // --------------------------------------------------------------------
  let first = heap.allocate(24);
  println!("\n[1] allocate(24) -> {first:#x?}");
  heap.payload_mut(first.unwrap()).fill(0xAB);
  dump(&heap, "1");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Two more allocations sweep the next-fit rover forward; each one is
  //    carved off the front of the remaining free block.
  // --------------------------------------------------------------------
  let second = heap.allocate(100);
  let third = heap.allocate(200);
  println!("\n[2] allocate(100) -> {second:#x?}, allocate(200) -> {third:#x?}");
  dump(&heap, "2");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Freeing the middle block leaves a hole. Both neighbors are
  //    allocated, so nothing coalesces yet.
  // --------------------------------------------------------------------
  heap.deallocate(second);
  println!("\n[3] deallocate the middle block (a hole appears)");
  dump(&heap, "3");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Freeing the first block cannot merge left - the prologue sentinel
  //    is permanently allocated - but it merges right into the hole.
  // --------------------------------------------------------------------
  heap.deallocate(first);
  println!("\n[4] deallocate the first block (coalesces with the hole)");
  dump(&heap, "4");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Grow the surviving allocation in place: its right neighbor is
  //    free, so the block absorbs it and no payload moves.
  // --------------------------------------------------------------------
  let third = heap.reallocate(third, 400);
  println!("\n[5] reallocate(.., 400) stayed at {third:#x?}");
  dump(&heap, "5");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) A request no free block can hold extends the arena; the new space
  //    arrives as one free block and is carved immediately.
  // --------------------------------------------------------------------
  let before = heap.heap_size();
  let big = heap.allocate(2 * CHUNKSIZE);
  println!(
    "\n[6] allocate({}) -> {big:#x?}, heap extent {} -> {} bytes",
    2 * CHUNKSIZE,
    before,
    heap.heap_size()
  );
  dump(&heap, "6");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 7) End of demo. Dropping the allocator returns the whole mapping to
  //    the OS in one piece.
  // --------------------------------------------------------------------
  println!("\n[7] End of example. The arena is unmapped when the allocator drops.");
}
