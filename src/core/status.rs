use std::sync::atomic::{AtomicBool, Ordering};

/// Global readiness flag set once routes and handlers are loaded.
///
/// Surfaced by the `system/health` route so the presentation tier can tell a
/// starting host from a serving one.
static HOST_READY: AtomicBool = AtomicBool::new(false);

/// Mark the bridge as ready to serve calls.
pub fn mark_ready(routes: usize, queries: usize) {
    HOST_READY.store(true, Ordering::SeqCst);
    log::info!(
        "Loaded {} routes and {} queries, bridge is ready",
        routes,
        queries
    );
}

pub fn is_ready() -> bool {
    HOST_READY.load(Ordering::SeqCst)
}

/// Reset readiness status (useful for testing)
pub fn reset() {
    HOST_READY.store(false, Ordering::SeqCst);
    log::debug!("Readiness status reset");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The flag is process-wide and tests run in parallel.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_initial_state_not_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset();
        assert!(!is_ready());
    }

    #[test]
    fn test_mark_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset();
        mark_ready(7, 6);
        assert!(is_ready());
        mark_ready(7, 6);
        assert!(is_ready());
    }
}
