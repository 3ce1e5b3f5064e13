//! Termination signal subscription.
//!
//! OS notifications never run shutdown work themselves. Each one is turned
//! into a [`TerminationKind`] and queued; [`supervise`] drains the queue and
//! runs the shutdown sequence once.
//!
//! Windows ends the process as soon as a close, logoff or shutdown console
//! handler returns. Those three events are held on the OS callback thread
//! until the queue's [`ShutdownHold`] is released.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use worldgrid_cluster::CoordinationService;

use crate::error::{LifecycleError, LifecycleResult};
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownReport};
use crate::world::WorldServices;

/// Why the process was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    /// Ctrl+C / SIGINT.
    Interrupt,
    /// Ctrl+Break / SIGQUIT.
    Break,
    /// Console window closed / SIGHUP.
    Close,
    /// User logoff.
    Logoff,
    /// System shutdown / SIGTERM.
    Shutdown,
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Break => "break",
            Self::Close => "close",
            Self::Logoff => "logoff",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Sending half of the termination queue.
#[derive(Debug, Clone)]
pub struct TerminationRequester {
    tx: mpsc::UnboundedSender<TerminationKind>,
}

impl TerminationRequester {
    pub fn request(&self, kind: TerminationKind) -> bool {
        self.tx.send(kind).is_ok()
    }
}

/// Latch an OS callback waits on until shutdown work is finished.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHold {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHold {
    pub fn release(&self) {
        let (released, cv) = &*self.state;
        *released.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cv.notify_all();
    }

    pub fn is_released(&self) -> bool {
        *self.state.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block the calling thread until [`release`](Self::release).
    pub fn wait(&self) {
        let (released, cv) = &*self.state;
        let guard = released.lock().unwrap_or_else(|e| e.into_inner());
        let _released = cv
            .wait_while(guard, |released| !*released)
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// Queue of pending termination requests.
#[derive(Debug)]
pub struct TerminationRequests {
    tx: mpsc::UnboundedSender<TerminationKind>,
    rx: mpsc::UnboundedReceiver<TerminationKind>,
    hold: ShutdownHold,
}

impl TerminationRequests {
    /// An empty queue with no OS subscription behind it.
    pub fn channel() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            hold: ShutdownHold::default(),
        }
    }

    /// Released by the owner once the shutdown sequence has finished.
    pub fn hold(&self) -> ShutdownHold {
        self.hold.clone()
    }

    pub fn requester(&self) -> TerminationRequester {
        TerminationRequester {
            tx: self.tx.clone(),
        }
    }

    /// Next request. Never returns `None` while `self` is alive.
    pub async fn recv(&mut self) -> Option<TerminationKind> {
        self.rx.recv().await
    }
}

/// Subscribes to the platform's termination notifications.
pub struct TerminationSignalHandler;

impl TerminationSignalHandler {
    /// Subscribe to every termination notification the platform offers.
    ///
    /// On Unix: SIGINT, SIGQUIT, SIGHUP, SIGTERM. On Windows: Ctrl+C,
    /// Ctrl+Break, console close, logoff, system shutdown.
    pub fn install() -> LifecycleResult<TerminationRequests> {
        let requests = TerminationRequests::channel();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            for (kind, signal_kind) in [
                (TerminationKind::Interrupt, SignalKind::interrupt()),
                (TerminationKind::Break, SignalKind::quit()),
                (TerminationKind::Close, SignalKind::hangup()),
                (TerminationKind::Shutdown, SignalKind::terminate()),
            ] {
                let mut stream = signal(signal_kind).map_err(LifecycleError::SignalSetup)?;
                let requester = requests.requester();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        debug!(%kind, "termination signal received");
                        if !requester.request(kind) {
                            break;
                        }
                    }
                });
            }
        }

        #[cfg(windows)]
        {
            use tokio::signal::windows;

            macro_rules! forward {
                ($stream:expr, $kind:expr) => {{
                    let mut stream = $stream.map_err(LifecycleError::SignalSetup)?;
                    let requester = requests.requester();
                    let kind = $kind;
                    tokio::spawn(async move {
                        while stream.recv().await.is_some() {
                            debug!(%kind, "console control event received");
                            if !requester.request(kind) {
                                break;
                            }
                        }
                    });
                }};
            }

            forward!(windows::ctrl_c(), TerminationKind::Interrupt);
            forward!(windows::ctrl_break(), TerminationKind::Break);

            // Registered after tokio's handler so it is consulted first.
            console::install(requests.requester(), requests.hold())
                .map_err(LifecycleError::SignalSetup)?;
        }

        info!("termination signal handlers installed");
        Ok(requests)
    }
}

#[cfg(windows)]
mod console {
    use std::sync::Mutex;

    use tracing::debug;
    use windows_sys::Win32::Foundation::{BOOL, FALSE, TRUE};
    use windows_sys::Win32::System::Console::{
        CTRL_CLOSE_EVENT, CTRL_LOGOFF_EVENT, CTRL_SHUTDOWN_EVENT, SetConsoleCtrlHandler,
    };

    use super::{ShutdownHold, TerminationKind, TerminationRequester};

    static TARGET: Mutex<Option<(TerminationRequester, ShutdownHold)>> = Mutex::new(None);

    pub(super) fn install(
        requester: TerminationRequester,
        hold: ShutdownHold,
    ) -> std::io::Result<()> {
        let mut target = TARGET.lock().unwrap_or_else(|e| e.into_inner());
        if target.replace((requester, hold)).is_some() {
            return Ok(());
        }
        // SAFETY: `handler` is a plain function valid for the life of the process.
        if unsafe { SetConsoleCtrlHandler(Some(handler), TRUE) } == FALSE {
            *target = None;
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    unsafe extern "system" fn handler(ctrl_type: u32) -> BOOL {
        let kind = match ctrl_type {
            CTRL_CLOSE_EVENT => TerminationKind::Close,
            CTRL_LOGOFF_EVENT => TerminationKind::Logoff,
            CTRL_SHUTDOWN_EVENT => TerminationKind::Shutdown,
            _ => return FALSE,
        };
        let target = TARGET.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let Some((requester, hold)) = target else {
            return FALSE;
        };
        debug!(%kind, "console control event received, holding until shutdown completes");
        if requester.request(kind) {
            hold.wait();
        }
        TRUE
    }
}

/// Wait for the first termination request and run the shutdown sequence.
///
/// Requests arriving while the sequence runs are logged and dropped.
pub async fn supervise<W: WorldServices, C: CoordinationService>(
    mut requests: TerminationRequests,
    coordinator: &ShutdownCoordinator<W, C>,
) -> Option<ShutdownReport> {
    let kind = requests.recv().await?;
    info!(%kind, "termination requested");

    let run = coordinator.run(kind);
    tokio::pin!(run);
    loop {
        tokio::select! {
            outcome = &mut run => {
                return match outcome {
                    ShutdownOutcome::Completed(report) => Some(report),
                    ShutdownOutcome::AlreadyInProgress => None,
                };
            }
            Some(again) = requests.recv() => {
                warn!(kind = %again, "shutdown already in progress, ignoring request");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_are_queued_in_order() {
        let mut requests = TerminationRequests::channel();
        let requester = requests.requester();
        assert!(requester.request(TerminationKind::Close));
        assert!(requester.request(TerminationKind::Interrupt));

        assert_eq!(requests.recv().await, Some(TerminationKind::Close));
        assert_eq!(requests.recv().await, Some(TerminationKind::Interrupt));
    }

    #[tokio::test]
    async fn requester_fails_once_queue_is_gone() {
        let requests = TerminationRequests::channel();
        let requester = requests.requester();
        drop(requests);
        assert!(!requester.request(TerminationKind::Shutdown));
    }

    #[test]
    fn hold_blocks_until_released() {
        let requests = TerminationRequests::channel();
        let hold = requests.hold();
        let waiter = {
            let hold = hold.clone();
            std::thread::spawn(move || hold.wait())
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        assert!(!hold.is_released());

        requests.hold().release();
        waiter.join().unwrap();
        assert!(hold.is_released());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_succeeds_inside_runtime() {
        assert!(TerminationSignalHandler::install().is_ok());
    }
}
