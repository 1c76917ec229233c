//! Pool lifecycle and concurrency tests.

use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::pool::{size_class, BufferPool, SharedPool};
use crate::config::PoolConfig;

#[test]
fn size_classes_round_up_to_powers_of_two() {
    assert_eq!(size_class(0), 0);
    assert_eq!(size_class(1), 0);
    assert_eq!(size_class(2), 1);
    assert_eq!(size_class(3), 2);
    assert_eq!(size_class(4), 2);
    assert_eq!(size_class(5), 3);
    assert_eq!(size_class(1024), 10);
    assert_eq!(size_class(1025), 11);
}

#[test]
fn handle_lifecycle_acquire_recycle_reacquire() {
    let mut pool = BufferPool::default();

    let mut buffer = pool.acquire(100);
    let handle = buffer.handle();
    assert!(pool.is_valid(handle));
    assert_eq!(buffer.capacity(), 128);
    assert_eq!(buffer.len_bytes(), 100);
    assert_eq!(buffer.len_bits(), 800);

    // Leave a recognizable pattern, then give the buffer back.
    buffer.bit_buffer().put_u64(0xDEAD_BEEF_CAFE_F00D).unwrap();
    pool.recycle(buffer);
    assert!(!pool.is_valid(handle));
    assert_eq!(pool.idle_buffers(), 1);

    // The next acquire of the same class reuses the backing bytes under a
    // new generation; copied old handles stay invalid.
    let mut again = pool.acquire(100);
    assert_eq!(pool.idle_buffers(), 0);
    assert_ne!(again.handle(), handle);
    assert_ne!(again.handle().generation(), handle.generation());
    assert!(pool.is_valid(again.handle()));
    assert!(!pool.is_valid(handle));
    assert_eq!(again.bit_buffer().get_u64().unwrap(), 0xDEAD_BEEF_CAFE_F00D);
    pool.recycle(again);
}

#[test]
fn smaller_request_is_served_from_a_larger_idle_class() {
    let mut pool = BufferPool::default();
    let big = pool.acquire(1000);
    assert_eq!(big.capacity(), 1024);
    pool.recycle(big);

    let small = pool.acquire(10);
    assert_eq!(small.capacity(), 1024);
    assert_eq!(small.len_bytes(), 10);
    assert_eq!(pool.idle_buffers(), 0);
    pool.recycle(small);
}

#[test]
fn oversized_allocations_are_exact_and_never_pooled() {
    let mut pool = BufferPool::new(PoolConfig { max_size_class: 8 });
    let huge = pool.acquire(1000);
    assert_eq!(huge.capacity(), 1000);
    let handle = huge.handle();
    assert!(pool.is_valid(handle));

    pool.recycle(huge);
    assert!(!pool.is_valid(handle));
    assert_eq!(pool.idle_buffers(), 0);

    let again = pool.acquire(1000);
    assert_ne!(again.handle(), handle);
    pool.recycle(again);
}

#[test]
fn dropping_without_recycle_leaves_the_slot_checked_out() {
    let mut pool = BufferPool::default();
    let buffer = pool.acquire(32);
    let handle = buffer.handle();
    drop(buffer);
    // The handle still names the live generation, but nothing is idle.
    assert!(pool.is_valid(handle));
    assert_eq!(pool.idle_buffers(), 0);
    assert_eq!(pool.slot_count(), 1);
}

#[test]
fn clone_using_pool_copies_an_unaligned_window() {
    let mut pool = BufferPool::default();
    let mut storage = [0u8; 32];
    let mut src = super::bit::BitBuffer::with_offset(&mut storage, 3).unwrap();
    src.put_var_u64(123_456).unwrap();
    src.put_str("cloned").unwrap();
    let end = src.position();
    let src_view = src.from_start_to_position();

    let mut clone = pool.clone_using_pool(&src_view).unwrap();
    assert_eq!(clone.len_bits(), end);
    let mut view = clone.bit_buffer();
    assert!(view.buffer_equals(&src_view));
    assert_eq!(view.get_var_u64(), 123_456);
    assert_eq!(view.get_string().unwrap(), "cloned");
    pool.recycle(clone);
}

#[test]
fn generations_are_tracked_per_slot() {
    let mut pool = BufferPool::default();
    let a = pool.acquire(64);
    let b = pool.acquire(64);
    let (ha, hb) = (a.handle(), b.handle());
    assert_ne!(ha, hb);

    pool.recycle(a);
    assert!(!pool.is_valid(ha));
    assert!(pool.is_valid(hb));
    pool.recycle(b);
    assert!(!pool.is_valid(hb));
}

#[test]
fn shared_pool_stress_never_cross_contaminates() {
    const THREADS: u64 = 8;
    const ITERATIONS: usize = 500;

    let _ = env_logger::builder().is_test(true).try_init();

    let pool = SharedPool::default();
    let mut workers = Vec::new();
    for t in 0..THREADS {
        let pool = pool.clone();
        workers.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(t);
            for _ in 0..ITERATIONS {
                let len = rng.random_range(1..=4096usize);
                let seed: u64 = rng.random();
                let mut buffer = pool.acquire(len);
                assert!(buffer.capacity() >= len);
                assert!(pool.is_valid(buffer.handle()));

                // Fill with a pattern derived from a private PRNG, then
                // verify it survives untouched by the other threads.
                let mut fill = StdRng::seed_from_u64(seed);
                {
                    let mut view = buffer.bit_buffer();
                    for _ in 0..len {
                        view.put_u8(fill.random()).unwrap();
                    }
                }
                let mut check = StdRng::seed_from_u64(seed);
                {
                    let mut view = buffer.bit_buffer();
                    for i in 0..len {
                        assert_eq!(view.get_u8().unwrap(), check.random::<u8>(), "byte {i}");
                    }
                }
                pool.recycle(buffer);
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn thread_local_pools_are_independent() {
    // One pool per worker, no sharing: each thread churns its own pool and
    // observes reuse locally.
    let mut workers = Vec::new();
    for t in 0..4u64 {
        workers.push(thread::spawn(move || {
            let mut pool = BufferPool::default();
            let mut rng = StdRng::seed_from_u64(t);
            for _ in 0..200 {
                let len = rng.random_range(1..=1024usize);
                let buffer = pool.acquire(len);
                let handle = buffer.handle();
                pool.recycle(buffer);
                assert!(!pool.is_valid(handle));
            }
            // Everything churned through a handful of reused slots.
            assert!(pool.slot_count() <= 11);
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }
}
