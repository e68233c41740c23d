use clam_prov::clock::{current_millis, current_thread_id, os_thread_id};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[test]
fn test_millis_track_wall_clock() {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    let ours = current_millis();
    assert!(ours >= wall, "Clock should not run behind SystemTime");
    assert!(ours - wall < 1_000, "Clock should be within a second of SystemTime");
}

#[test]
fn test_millis_advance() {
    let first = current_millis();
    thread::sleep(Duration::from_millis(5));
    let second = current_millis();
    assert!(second > first, "Time should advance across a sleep");
}

#[test]
fn test_thread_id_is_stable_per_thread() {
    let first = current_thread_id();
    for _ in 0..1000 {
        assert_eq!(current_thread_id(), first);
    }
    assert_eq!(os_thread_id(), first, "Cached id should match the kernel's");
}

#[test]
fn test_thread_ids_differ_across_threads() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let id = current_thread_id();
                // Keep every thread alive until all have sampled their id.
                thread::sleep(Duration::from_millis(20));
                id
            })
        })
        .collect();

    let mut ids: HashSet<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.insert(current_thread_id());
    assert_eq!(ids.len(), 5, "Each live thread should have its own id");
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn test_main_thread_id_is_not_process_id_on_worker() {
    let pid = std::process::id() as i32;
    let worker = thread::spawn(current_thread_id).join().unwrap();
    assert_ne!(worker, pid, "Worker threads get their own kernel id");
}
