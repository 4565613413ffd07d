//! Startup progress indicator
//!
//! A small spinner on stdout while the supervisor waits for the
//! application to start answering on its port. Runs as an independent
//! task and only observes shared flags.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Render startup progress until the server is ready, shutdown is
/// requested, or the startup timeout passes.
pub async fn show_startup_progress(
    server_ready: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
    max_wait: Duration,
) {
    let start = Instant::now();
    let mut ticker = interval(FRAME_INTERVAL);
    let mut frame = 0usize;

    loop {
        ticker.tick().await;

        if server_ready.load(Ordering::SeqCst)
            || shutdown_requested.load(Ordering::SeqCst)
            || start.elapsed() > max_wait
        {
            break;
        }

        let spinner = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
        print!(
            "\r{} starting application... ({}s)",
            spinner,
            start.elapsed().as_secs()
        );
        let _ = std::io::stdout().flush();
        frame += 1;
    }

    if server_ready.load(Ordering::SeqCst) {
        println!("\rapplication ready ({}s)          ", start.elapsed().as_secs());
    } else {
        // Leave the failure reporting to the supervisor log.
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_stops_when_ready() {
        let ready = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(show_startup_progress(
            ready.clone(),
            shutdown.clone(),
            Duration::from_secs(10),
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        ready.store(true, Ordering::SeqCst);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("progress task should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_progress_stops_on_timeout() {
        let ready = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        tokio::time::timeout(
            Duration::from_secs(2),
            show_startup_progress(ready, shutdown, Duration::from_millis(200)),
        )
        .await
        .expect("progress task should respect the deadline");
    }
}
