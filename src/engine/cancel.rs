use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Run-wide cancellation. Every worker subscribes its own receiver.
#[derive(Clone)]
pub struct CancelSignal {
    sender: broadcast::Sender<()>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn cancel(&self) -> bool {
        self.sender.send(()).is_ok()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub fn cancel_requested(cancel_rx: &mut broadcast::Receiver<()>) -> bool {
    match cancel_rx.try_recv() {
        Ok(_) => true,
        Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Closed) => false,
        Err(TryRecvError::Empty) => false,
    }
}

/// Resolves once a cancel is broadcast. A dropped sender never resolves.
pub async fn cancelled(cancel_rx: &mut broadcast::Receiver<()>) {
    match cancel_rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}
