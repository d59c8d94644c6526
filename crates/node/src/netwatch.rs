//! Network supervisor: probes reachability with a plain TCP connect and
//! raises [`NodeEvent::NetworkUp`] / [`NodeEvent::NetworkDown`] on
//! transitions only.
//!
//! The default target is the broker itself. Each probe opens and closes a
//! connection without sending CONNECT, which most brokers log as a client
//! protocol error. Point `mqtt.probe_addr` at the gateway or another TCP
//! service to keep the broker log clean.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;

use crate::events::NodeEvent;

/// Edge detector over successive probe results.
#[derive(Debug, Default)]
pub struct Reachability {
    up: bool,
}

impl Reachability {
    /// Feed one probe. `Some(addr)` is a successful probe with the local
    /// address it used.
    pub fn observe(&mut self, probe: Option<Option<SocketAddr>>) -> Option<NodeEvent> {
        match (self.up, probe) {
            (false, Some(local_addr)) => {
                self.up = true;
                Some(NodeEvent::NetworkUp { local_addr })
            }
            (true, None) => {
                self.up = false;
                Some(NodeEvent::NetworkDown)
            }
            _ => None,
        }
    }
}

/// Probe `addr` every `every`, giving each attempt `probe_timeout`.
/// Returns when the receiving side of `events` is dropped.
pub async fn run(
    addr: String,
    every: Duration,
    probe_timeout: Duration,
    events: mpsc::Sender<NodeEvent>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reach = Reachability::default();

    loop {
        ticker.tick().await;

        let probe = match timeout(probe_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => Some(stream.local_addr().ok()),
            Ok(Err(e)) => {
                debug!(%addr, "probe failed: {e}");
                None
            }
            Err(_) => {
                debug!(%addr, "probe timed out");
                None
            }
        };

        if let Some(ev) = reach.observe(probe) {
            if events.send(ev).await.is_err() {
                return;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn local() -> Option<SocketAddr> {
        Some(SocketAddr::from(([192, 168, 1, 23], 50000)))
    }

    #[test]
    fn first_success_raises_up() {
        let mut r = Reachability::default();
        assert_eq!(
            r.observe(Some(local())),
            Some(NodeEvent::NetworkUp { local_addr: local() })
        );
    }

    #[test]
    fn steady_states_are_silent() {
        let mut r = Reachability::default();
        assert_eq!(r.observe(None), None);
        r.observe(Some(None));
        assert_eq!(r.observe(Some(None)), None);
        assert_eq!(r.observe(Some(local())), None);
    }

    #[test]
    fn loss_then_recovery() {
        let mut r = Reachability::default();
        r.observe(Some(None));
        assert_eq!(r.observe(None), Some(NodeEvent::NetworkDown));
        assert_eq!(r.observe(None), None);
        assert!(matches!(
            r.observe(Some(None)),
            Some(NodeEvent::NetworkUp { .. })
        ));
    }

    #[tokio::test]
    async fn reports_up_for_listening_broker() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, mut rx) = mpsc::channel(4);

        let probe = tokio::spawn(run(
            addr,
            Duration::from_millis(10),
            Duration::from_millis(500),
            tx,
        ));

        let ev = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        match ev {
            NodeEvent::NetworkUp { local_addr } => {
                assert!(local_addr.unwrap().ip().is_loopback());
            }
            other => panic!("unexpected {other:?}"),
        }

        drop(rx);
        drop(listener);
        probe.abort();
    }
}
