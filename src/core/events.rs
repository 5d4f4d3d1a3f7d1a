use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub delta: u64,
    pub cumulative: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Progress(ProgressEvent),
}

impl InstallEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InstallEvent::Progress(_) => "progress",
        }
    }
}

/// Where a session publishes what it observes. Emitting never blocks and
/// never fails the session.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: InstallEvent);
}

impl EventSink for broadcast::Sender<InstallEvent> {
    fn emit(&self, event: InstallEvent) {
        // no subscribers is fine
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let ev = InstallEvent::Progress(ProgressEvent { delta: 3, cumulative: 3, total: 9 });
        tx.emit(ev.clone());
        assert_eq!(rx.recv().await.unwrap(), ev);
        assert_eq!(ev.name(), "progress");
    }

    #[test]
    fn broadcast_sink_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<InstallEvent>(1);
        drop(rx);
        tx.emit(InstallEvent::Progress(ProgressEvent { delta: 0, cumulative: 0, total: 1 }));
    }
}
