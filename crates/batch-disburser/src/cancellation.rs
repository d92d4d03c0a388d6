use tokio::sync::watch;

/// Run-level cancellation signal observed by the disburser
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    receiver: Option<watch::Receiver<bool>>,
}

/// Trigger side of a [`Cancellation`]
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl Cancellation {
    /// A signal that never fires
    pub fn never() -> Self {
        Self::default()
    }

    pub fn pair() -> (CancelHandle, Self) {
        let (sender, receiver) = watch::channel(false);

        (
            CancelHandle { sender },
            Self {
                receiver: Some(receiver),
            },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| *r.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise
    pub async fn cancelled(&self) {
        let Some(receiver) = &self.receiver else {
            return std::future::pending().await;
        };

        let mut receiver = receiver.clone();
        loop {
            let cancelled = *receiver.borrow_and_update();
            if cancelled {
                return;
            }

            // handle dropped without cancelling
            if receiver.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, cancellation) = Cancellation::pair();
        assert!(!cancellation.is_cancelled());

        let waiter = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move { cancellation.cancelled().await })
        };

        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_does_not_fire() {
        let cancellation = Cancellation::never();
        assert!(!cancellation.is_cancelled());

        let fired = tokio::time::timeout(Duration::from_millis(20), cancellation.cancelled()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_fire() {
        let (handle, cancellation) = Cancellation::pair();
        drop(handle);

        let fired = tokio::time::timeout(Duration::from_millis(20), cancellation.cancelled()).await;
        assert!(fired.is_err());
    }
}
