//! Operator interrupts (Ctrl+C) delivered to the supervisor as a stream.

use tokio::sync::mpsc;

/// Sending side, held by the signal listener (or by tests).
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl InterruptHandle {
    /// Deliver one interrupt. Returns `false` if nobody listens anymore.
    pub fn interrupt(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[derive(Debug)]
pub struct Interrupts {
    rx: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    pub fn channel() -> (InterruptHandle, Interrupts) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InterruptHandle { tx }, Interrupts { rx })
    }

    /// An already closed stream: `recv` returns `None` at once and no
    /// interrupt is ever delivered.
    pub fn none() -> Self {
        Self::channel().1
    }

    /// Listen for Ctrl+C for the lifetime of the runtime.
    ///
    /// Must be called from within a tokio runtime. Installing the listener
    /// replaces the default SIGINT behaviour, so the process is no longer
    /// terminated by Ctrl+C; the supervisor decides what an interrupt means.
    pub fn from_ctrl_c() -> Self {
        let (handle, interrupts) = Self::channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "interrupts.listen_failed");
                    break;
                }
                tracing::info!("interrupts.received");
                if !handle.interrupt() {
                    break;
                }
            }
        });
        interrupts
    }

    /// Wait for the next interrupt. `None` once no sender is left.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Discard interrupts that arrived while no run was active.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}
