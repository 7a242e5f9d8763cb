//! Matchmaker facade implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::MatchmakerConfig;
use crate::dispatch::{
    MatchDecider, MatchRegistry, MessageRouter, RelayAllDecider, ResultDispatcher, TokenMinter,
};
use crate::index::TicketIndex;
use crate::matcher::Matcher;
use crate::metrics;
use crate::ticket::{AddError, AddTicket, Presence, RemoveError, TicketStore};

use super::types::MatchmakerStatus;

/// Validity window of relayed-match rendezvous tokens.
const TOKEN_TTL: Duration = Duration::from_secs(30);

/// Share of the tick period a round may spend before committing partial
/// results and exiting.
const ROUND_DEADLINE_FACTOR: f64 = 0.8;

/// The matchmaker service.
///
/// Owns all state; `add`/`remove_*` may run concurrently with the ticker.
/// Exactly one matching round runs at a time.
pub struct Matchmaker {
    config: MatchmakerConfig,
    store: Arc<TicketStore>,
    matcher: Matcher,
    running: Arc<AtomicBool>,
    process_lock: Arc<Mutex<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Matchmaker {
    /// Create a matchmaker with the default decision capability (accept
    /// everything as relayed).
    pub fn new(
        config: MatchmakerConfig,
        router: Arc<dyn MessageRouter>,
        registry: Arc<dyn MatchRegistry>,
    ) -> Self {
        Self::with_decider(config, router, registry, Arc::new(RelayAllDecider))
    }

    /// Create a matchmaker with an injected match-decision capability.
    pub fn with_decider(
        config: MatchmakerConfig,
        router: Arc<dyn MessageRouter>,
        registry: Arc<dyn MatchRegistry>,
        decider: Arc<dyn MatchDecider>,
    ) -> Self {
        let index = Arc::new(TicketIndex::new());
        let store = Arc::new(TicketStore::new(config.max_tickets, Arc::clone(&index)));
        let dispatcher = Arc::new(ResultDispatcher::new(
            router,
            registry,
            TokenMinter::new(config.token_secret.clone(), TOKEN_TTL),
        ));
        let round_deadline =
            Duration::from_secs_f64(config.interval_sec as f64 * ROUND_DEADLINE_FACTOR);
        let matcher = Matcher::new(
            Arc::clone(&store),
            index,
            decider,
            dispatcher,
            config.max_intervals,
            config.max_candidates,
            config.rev_precision,
            round_deadline,
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            matcher,
            running: Arc::new(AtomicBool::new(false)),
            process_lock: Arc::new(Mutex::new(())),
            shutdown_tx,
        }
    }

    /// Submit a ticket. Returns the generated id and the echoed presences.
    pub async fn add(&self, request: AddTicket) -> Result<(String, Vec<Presence>), AddError> {
        let (ticket_id, presences) = self.store.add(request).await?;
        metrics::TICKETS_ADDED.inc();
        metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);
        debug!(%ticket_id, presences = presences.len(), "ticket added");
        Ok((ticket_id, presences))
    }

    /// Remove one ticket on behalf of a session.
    pub async fn remove_session(
        &self,
        session_id: &str,
        ticket_id: &str,
    ) -> Result<(), RemoveError> {
        self.store.remove_session(session_id, ticket_id).await?;
        metrics::TICKETS_REMOVED.with_label_values(&["session"]).inc();
        metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);
        Ok(())
    }

    /// Remove one ticket on behalf of a party.
    pub async fn remove_party(&self, party_id: &str, ticket_id: &str) -> Result<(), RemoveError> {
        self.store.remove_party(party_id, ticket_id).await?;
        metrics::TICKETS_REMOVED.with_label_values(&["party"]).inc();
        metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);
        Ok(())
    }

    /// Purge every ticket held by a session (session registry disconnect
    /// path). Returns the number removed.
    pub async fn remove_all_session(&self, session_id: &str) -> usize {
        let removed = self.store.remove_all_session(session_id).await;
        if removed > 0 {
            metrics::TICKETS_REMOVED
                .with_label_values(&["session"])
                .inc_by(removed as u64);
            metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);
        }
        removed
    }

    /// Purge every ticket held by a party. Returns the number removed.
    pub async fn remove_all_party(&self, party_id: &str) -> usize {
        let removed = self.store.remove_all_party(party_id).await;
        if removed > 0 {
            metrics::TICKETS_REMOVED
                .with_label_values(&["party"])
                .inc_by(removed as u64);
            metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);
        }
        removed
    }

    /// Run one matching round now. Normal operation is driven by the
    /// ticker; tests call this directly.
    pub async fn process(&self) {
        let _round = self.process_lock.lock().await;
        self.matcher.process().await;
    }

    /// Start the interval ticker. With `ticker_active = false` this is a
    /// no-op and only explicit [`Matchmaker::process`] calls drive
    /// matching.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Matchmaker already running");
            return;
        }
        if !self.config.ticker_active {
            info!("Matchmaker ticker disabled; process() drives matching");
            return;
        }

        info!(interval_sec = self.config.interval_sec, "Starting matchmaker ticker");

        let matcher = self.matcher.clone();
        let process_lock = Arc::clone(&self.process_lock);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.config.interval_sec);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Matchmaker ticker started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Matchmaker ticker received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let _round = process_lock.lock().await;
                        matcher.process().await;
                    }
                }
            }
            info!("Matchmaker ticker stopped");
        });
    }

    /// Stop the ticker and wait for the in-flight round to drain.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Matchmaker not running");
            return;
        }

        info!("Stopping matchmaker");
        let _ = self.shutdown_tx.send(());
        // Taking the round lock waits out any round still in flight.
        let _drain = self.process_lock.lock().await;
        info!("Matchmaker stopped");
    }

    /// Point-in-time status snapshot.
    pub async fn status(&self) -> MatchmakerStatus {
        let stats = self.store.stats().await;
        MatchmakerStatus {
            running: self.running.load(Ordering::Relaxed),
            ticket_count: stats.ticket_count,
            session_count: stats.session_count,
            party_count: stats.party_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockRegistry, MockRouter};

    fn matchmaker(config: MatchmakerConfig) -> (Matchmaker, Arc<MockRouter>) {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        let mm = Matchmaker::new(
            config,
            Arc::clone(&router) as Arc<dyn MessageRouter>,
            registry as Arc<dyn MatchRegistry>,
        );
        (mm, router)
    }

    fn test_config() -> MatchmakerConfig {
        MatchmakerConfig {
            ticker_active: false,
            ..MatchmakerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_add_process_match() {
        let (mm, router) = matchmaker(test_config());
        mm.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();
        mm.add(fixtures::ticket(2, "*", 2, 2)).await.unwrap();

        mm.process().await;

        assert_eq!(mm.status().await.ticket_count, 0);
        assert_eq!(router.delivered().await.len(), 2);
    }

    #[tokio::test]
    async fn test_add_errors_bubble_to_caller() {
        let (mm, _) = matchmaker(test_config());
        let result = mm.add(fixtures::ticket(1, "", 2, 2)).await;
        assert!(matches!(result, Err(AddError::InvalidQuery(_))));

        let result = mm.add(fixtures::ticket(1, "*", 3, 2)).await;
        assert!(matches!(result, Err(AddError::InvalidCount(_))));
    }

    #[tokio::test]
    async fn test_remove_paths() {
        let (mm, _) = matchmaker(test_config());
        let (ticket_id, _) = mm.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();

        assert!(matches!(
            mm.remove_session("session-2", &ticket_id).await,
            Err(RemoveError::NotFound(_))
        ));
        mm.remove_session("session-1", &ticket_id).await.unwrap();
        assert_eq!(mm.status().await.ticket_count, 0);

        mm.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();
        mm.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();
        assert_eq!(mm.remove_all_session("session-1").await, 2);
        assert_eq!(mm.remove_all_session("session-1").await, 0);
    }

    #[tokio::test]
    async fn test_remove_all_party() {
        let (mm, _) = matchmaker(test_config());
        mm.add(fixtures::party_ticket(&[1, 2], "party-1", "*", 2, 4))
            .await
            .unwrap();
        assert_eq!(mm.status().await.party_count, 1);
        assert_eq!(mm.remove_all_party("party-1").await, 1);
        assert_eq!(mm.status().await.ticket_count, 0);
    }

    #[tokio::test]
    async fn test_start_stop_with_disabled_ticker() {
        let (mm, _) = matchmaker(test_config());
        mm.start().await;
        assert!(mm.status().await.running);
        mm.stop().await;
        assert!(!mm.status().await.running);
        // Stopping again is a warning, not a panic.
        mm.stop().await;
    }

    #[tokio::test]
    async fn test_ticker_drives_matching() {
        let config = MatchmakerConfig {
            interval_sec: 1,
            ..MatchmakerConfig::default()
        };
        let (mm, router) = matchmaker(config);
        mm.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();
        mm.add(fixtures::ticket(2, "*", 2, 2)).await.unwrap();

        mm.start().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        mm.stop().await;

        assert_eq!(mm.status().await.ticket_count, 0);
        assert_eq!(router.delivered().await.len(), 2);
    }

    #[tokio::test]
    async fn test_multiple_instances_are_independent() {
        let (a, router_a) = matchmaker(test_config());
        let (b, router_b) = matchmaker(test_config());

        a.add(fixtures::ticket(1, "*", 2, 2)).await.unwrap();
        a.add(fixtures::ticket(2, "*", 2, 2)).await.unwrap();
        b.add(fixtures::ticket(3, "*", 2, 2)).await.unwrap();

        a.process().await;
        b.process().await;

        assert_eq!(router_a.delivered().await.len(), 2);
        assert!(router_b.delivered().await.is_empty());
        assert_eq!(b.status().await.ticket_count, 1);
    }
}
