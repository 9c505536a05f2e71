use internetz_core::Cancellation;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// What to do on receipt of the nth shutdown signal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Disposition {
    /// Begin a graceful shutdown.
    Cancel,
    /// Give up waiting for the probes to stop.
    Exit,
}

const fn disposition(received: usize) -> Disposition {
    if received <= 1 {
        Disposition::Cancel
    } else {
        Disposition::Exit
    }
}

/// `SIGINT` and `SIGTERM`, blocked on every thread and awaited by one.
#[cfg(unix)]
pub struct Signals {
    set: nix::sys::signal::SigSet,
}

#[cfg(unix)]
impl Signals {
    /// Block the shutdown signals on the calling thread.
    ///
    /// Must be called before any other thread is spawned, which then inherit the mask.
    pub fn block() -> anyhow::Result<Self> {
        use nix::sys::signal::{SigSet, Signal};
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.add(Signal::SIGTERM);
        set.thread_block()?;
        Ok(Self { set })
    }

    /// Wait for signals on a dedicated thread.
    ///
    /// The first cancels, the second exits the process with status 1.
    pub fn spawn_handler(self, cancellation: Cancellation) -> anyhow::Result<JoinHandle<()>> {
        Ok(thread::Builder::new()
            .name(String::from("signals"))
            .spawn(move || {
                let mut received = 0;
                loop {
                    let signal = match self.set.wait() {
                        Ok(signal) => signal,
                        Err(err) => {
                            warn!(error = %err, "failed to wait for signal");
                            return;
                        }
                    };
                    received += 1;
                    match disposition(received) {
                        Disposition::Cancel => {
                            info!(%signal, "shutting down");
                            cancellation.cancel();
                        }
                        Disposition::Exit => {
                            warn!(%signal, "second signal received, exiting");
                            std::process::exit(1);
                        }
                    }
                }
            })?)
    }
}

#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn block() -> anyhow::Result<Self> {
        Ok(Self)
    }

    pub fn spawn_handler(self, _cancellation: Cancellation) -> anyhow::Result<JoinHandle<()>> {
        warn!("signal handling is not supported on this platform");
        Ok(thread::spawn(|| {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, Disposition::Cancel; "first")]
    #[test_case(2, Disposition::Exit; "second")]
    #[test_case(3, Disposition::Exit; "third")]
    fn test_disposition(received: usize, expected: Disposition) {
        assert_eq!(expected, disposition(received));
    }
}
