//! Interrupt handling
//!
//! Ctrl-C cancels a shared token; the polling loop observes it between steps.

use anyhow::{Context, Result};
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawn a background thread that cancels `token` on Ctrl-C.
///
/// The thread exits on its own once the token is cancelled from elsewhere.
pub fn spawn_interrupt_listener(token: CancellationToken) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?;

    std::thread::Builder::new()
        .name("interrupt-listener".to_string())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => {
                            info!("Interrupt received, finishing current step");
                            token.cancel();
                        }
                        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                    },
                    _ = token.cancelled() => {}
                }
            });
        })
        .context("Failed to spawn interrupt listener thread")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_exits_on_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_interrupt_listener(token.clone()).unwrap();

        token.cancel();

        handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
