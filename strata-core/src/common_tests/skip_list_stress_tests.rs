use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::config::{MAX_HEIGHT, MIN_PROBABILITY, SkipListConfig};
use crate::data_structures::SkipList;
use crate::error::SkipListError;
use crate::guard::Reclaim;

fn num_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(4, 16)
}

/// Many threads insert the same value - exactly one should succeed
pub fn test_concurrent_insert_same_value<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let num_threads = 64;

    let success_count = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let list = Arc::clone(&list);
            let success = Arc::clone(&success_count);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if list.insert(42) {
                    success.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(success_count.load(Ordering::Relaxed), 1);
    assert_eq!(list.len(), 1);
    assert!(list.contains(&42));
}

/// Many threads remove the same value - exactly one should succeed
pub fn test_concurrent_remove_same_value<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let num_threads = 100;

    for i in 0..100 {
        list.insert(i);
    }

    let success_count = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let list = Arc::clone(&list);
            let success = Arc::clone(&success_count);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if list.remove(&42) {
                    success.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        success_count.load(Ordering::Relaxed),
        1,
        "Exactly one thread should successfully remove the value"
    );
    assert!(!list.contains(&42), "Value should be gone");
    assert_eq!(list.len(), 99);
}

/// Each thread inserts, observes and removes its own keys
pub fn test_linearizability<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let num_threads = num_threads();
    let num_ops = 5000;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..num_ops {
                    let key = (t * num_ops + i) as i32;

                    assert!(list.insert(key), "Failed to insert unique key {}", key);
                    assert!(list.contains(&key), "Key {} not found after insert", key);
                    assert!(list.remove(&key), "Failed to remove existing key {}", key);
                    assert!(!list.contains(&key), "Key {} found after remove", key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(list.is_empty());
    assert!(list.to_sorted_vec().is_empty());
}

/// Stable keys stay visible while other keys churn around them
pub fn test_readers_during_writes<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let stop = Arc::new(AtomicBool::new(false));

    // Stable keys are multiples of 10; writers only touch the rest.
    for i in (0..1000).step_by(10) {
        list.insert(i);
    }

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let list = Arc::clone(&list);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut rounds = 0;
                while !stop.load(Ordering::Relaxed) || rounds == 0 {
                    for i in 0..1000 {
                        if i % 10 != 0 && i % 4 == t {
                            list.insert(i);
                        }
                    }
                    for i in 0..1000 {
                        if i % 10 != 0 && i % 4 == t {
                            list.remove(&i);
                        }
                    }
                    rounds += 1;
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for _ in 0..50 {
                    for i in (0..1000).step_by(10) {
                        assert!(list.contains(&i), "Stable key {} vanished", i);
                        let next = list.lower_bound(&(i - 9));
                        assert!(next.is_some_and(|v| v > i - 10 && v <= i), "lower_bound({}) = {:?}", i - 9, next);
                        assert_eq!(list.get(&i).map(|v| *v), Some(i));
                    }
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(list.to_sorted_vec(), (0..1000).step_by(10).collect::<Vec<_>>());
    assert_eq!(list.len(), 100);
}

/// Random operations on a shared key range; the final structure must agree
/// with its own count and stay sorted
pub fn test_mixed_operations<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let num_threads = num_threads();
    let ops_per_thread = 20_000;
    let key_range = 512;

    let inserted = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let list = Arc::clone(&list);
            let inserted = Arc::clone(&inserted);
            let removed = Arc::clone(&removed);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::new();
                barrier.wait();
                for _ in 0..ops_per_thread {
                    let key = rng.i32(0..key_range);
                    match rng.u8(0..3) {
                        0 => {
                            if list.insert(key) {
                                inserted.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        1 => {
                            if list.remove(&key) {
                                removed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        _ => {
                            list.contains(&key);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let values = list.to_sorted_vec();
    assert!(values.windows(2).all(|w| w[0] < w[1]), "values not strictly ascending");
    assert_eq!(values.len(), list.len());
    assert_eq!(
        list.len(),
        inserted.load(Ordering::Relaxed) - removed.load(Ordering::Relaxed)
    );
    for key in 0..key_range {
        assert_eq!(list.contains(&key), values.binary_search(&key).is_ok());
    }
}

/// Producer data published before an insert is visible to whoever sees it
pub fn test_memory_ordering<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let data = Arc::new(AtomicUsize::new(0));
    let flag = Arc::new(AtomicBool::new(false));

    let producer = {
        let list = Arc::clone(&list);
        let data = Arc::clone(&data);
        let flag = Arc::clone(&flag);
        thread::spawn(move || {
            data.store(42, Ordering::Release);
            list.insert(100);
            flag.store(true, Ordering::Release);
        })
    };

    let consumer = thread::spawn(move || {
        while !flag.load(Ordering::Acquire) {
            thread::yield_now();
        }
        assert!(list.contains(&100));
        assert_eq!(data.load(Ordering::Acquire), 42);
    });

    producer.join().unwrap();
    consumer.join().unwrap();
}

/// Bounded inserts either link, find a duplicate or report contention
pub fn test_try_insert_under_contention<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config.with_retry_limit(2)));
    let num_threads = num_threads();
    let barrier = Arc::new(Barrier::new(num_threads));
    let linked = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            let linked = Arc::clone(&linked);
            thread::spawn(move || {
                barrier.wait();
                for key in 0..2000 {
                    match list.try_insert(key) {
                        Ok(true) => {
                            linked.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {}
                        Err(SkipListError::Contention { attempts }) => assert_eq!(attempts, 2),
                        Err(err) => panic!("unexpected error: {}", err),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.len(), linked.load(Ordering::Relaxed));
    assert_eq!(list.to_sorted_vec().len(), list.len());
}

/// Probability, mode and max height change while inserts and removes run
pub fn test_params_modified_concurrently<G: Reclaim<i32> + 'static>(config: SkipListConfig) {
    let list = Arc::new(SkipList::<i32, G>::with_config(config));
    let num_workers = num_threads();
    let ops_per_worker = 10_000;
    let key_range = 256;

    let inserted = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(num_workers + 3));

    let workers: Vec<_> = (0..num_workers)
        .map(|_| {
            let list = Arc::clone(&list);
            let inserted = Arc::clone(&inserted);
            let removed = Arc::clone(&removed);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::new();
                barrier.wait();
                for _ in 0..ops_per_worker {
                    let key = rng.i32(0..key_range);
                    if rng.bool() {
                        if list.insert(key) {
                            inserted.fetch_add(1, Ordering::Relaxed);
                        }
                    } else if list.remove(&key) {
                        removed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    let setters: Vec<_> = (0..3)
        .map(|setter| {
            let list = Arc::clone(&list);
            let stop = Arc::clone(&stop);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::new();
                barrier.wait();
                while !stop.load(Ordering::Relaxed) {
                    match setter {
                        0 => list.set_probability(rng.f64()),
                        1 => list.set_fast_mode(rng.bool()),
                        _ => list.set_max_height(rng.usize(1..=30)),
                    }
                    thread::yield_now();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for setter in setters {
        setter.join().unwrap();
    }

    let values = list.to_sorted_vec();
    assert!(values.windows(2).all(|w| w[0] < w[1]), "values not strictly ascending");
    assert_eq!(values.len(), list.len());
    assert_eq!(
        list.len(),
        inserted.load(Ordering::Relaxed) - removed.load(Ordering::Relaxed)
    );
    assert!(list.height() <= MAX_HEIGHT);
    for key in 0..key_range {
        assert_eq!(list.contains(&key), values.binary_search(&key).is_ok());
    }

    // Settings stay within their clamped ranges.
    assert!((1..=MAX_HEIGHT).contains(&list.max_height()));
    assert!((MIN_PROBABILITY..=1.0).contains(&list.probability()));
}
