//! Kills a forked test process that runs past its timeout
//!
//! The watchdog sleeps on a channel with a deadline. Waking up by message
//! (or a dropped sender) means the process finished in time; waking up by
//! deadline means it is killed and the kill is remembered.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct Watchdog {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    killed: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn start(child: Arc<Mutex<Child>>, timeout: Duration) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let killed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&killed);

        let handle = thread::Builder::new()
            .name("test-watchdog".to_string())
            .spawn(move || {
                if !matches!(stopped.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                    return;
                }
                let Ok(mut child) = child.lock() else {
                    return;
                };
                if matches!(child.try_wait(), Ok(None)) && child.kill().is_ok() {
                    tracing::debug!(pid = child.id(), ?timeout, "killed test process after timeout");
                    flag.store(true, Ordering::SeqCst);
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
            killed,
        })
    }

    /// Stop watching; true when the watchdog killed the process.
    pub fn stop(mut self) -> bool {
        self.shutdown();
        self.killed.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    pub status: ExitStatus,
    /// The watchdog killed the process
    pub killed: bool,
}

/// Wait for `child`, killing it once `timeout` has passed
pub fn wait_with_timeout(child: Child, timeout: Option<Duration>) -> io::Result<WaitOutcome> {
    let Some(timeout) = timeout else {
        let mut child = child;
        return Ok(WaitOutcome {
            status: child.wait()?,
            killed: false,
        });
    };

    let child = Arc::new(Mutex::new(child));
    let watchdog = Watchdog::start(Arc::clone(&child), timeout)?;
    let status = loop {
        let polled = child
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "test process lock poisoned"))?
            .try_wait()?;
        if let Some(status) = polled {
            break status;
        }
        thread::sleep(POLL_INTERVAL);
    };
    Ok(WaitOutcome {
        status,
        killed: watchdog.stop(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_fast_process_is_not_killed() {
        let child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let outcome = wait_with_timeout(child, Some(Duration::from_secs(10))).unwrap();
        assert!(!outcome.killed);
        assert_eq!(outcome.status.code(), Some(3));
    }

    #[test]
    fn test_slow_process_is_killed() {
        let started = Instant::now();
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let outcome = wait_with_timeout(child, Some(Duration::from_millis(200))).unwrap();
        assert!(outcome.killed);
        assert!(!outcome.status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_without_timeout() {
        let child = Command::new("true").spawn().unwrap();
        let outcome = wait_with_timeout(child, None).unwrap();
        assert!(outcome.status.success());
        assert!(!outcome.killed);
    }
}
