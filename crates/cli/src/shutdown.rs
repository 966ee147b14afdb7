// Process shutdown condition: resolves exactly once on the first
// SIGINT/SIGTERM, memoized for the process lifetime.

use std::sync::OnceLock;

use tokio::sync::watch;
use tracing::info;

static SHUTDOWN: OnceLock<watch::Sender<bool>> = OnceLock::new();
static LISTENER: OnceLock<()> = OnceLock::new();

fn channel() -> &'static watch::Sender<bool> {
    SHUTDOWN.get_or_init(|| watch::channel(false).0)
}

/// Resolve the shutdown condition. Later calls have no additional effect.
pub fn request_shutdown() {
    channel().send_replace(true);
}

/// Wait until the process receives SIGINT or SIGTERM.
///
/// The condition is memoized: it resolves once for the process lifetime, and
/// every await after that returns immediately. Repeated signals do not trigger
/// a second teardown.
pub async fn wait_for_shutdown() {
    install_signal_listener();

    let mut rx = channel().subscribe();
    if *rx.borrow() {
        return;
    }
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
}

fn install_signal_listener() {
    LISTENER.get_or_init(|| {
        tokio::spawn(async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let (Ok(mut sigterm), Ok(mut sigint)) =
                    (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
                else {
                    return;
                };
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!(target = "restock", "received SIGTERM, shutting down");
                    }
                    _ = sigint.recv() => {
                        info!(target = "restock", "received SIGINT, shutting down");
                    }
                }
            }
            #[cfg(not(unix))]
            {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                info!(target = "restock", "received Ctrl+C, shutting down");
            }

            request_shutdown();
        });
    });
}
