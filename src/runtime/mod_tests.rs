// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the runnable group and leadership state machine

#[cfg(test)]
mod tests {
    use super::super::{LeaderEvent, LeaderState, Runnable, RunnableGroup};
    use crate::errors::RunError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    #[derive(Clone, Copy)]
    enum Behaviour {
        WaitForCancel,
        Fail,
        Finish,
    }

    struct TestRunnable {
        name: String,
        leader: bool,
        behaviour: Behaviour,
        started: Arc<AtomicBool>,
        cancelled: Arc<AtomicBool>,
    }

    impl TestRunnable {
        fn new(name: &str, leader: bool, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                leader,
                behaviour,
                started: Arc::new(AtomicBool::new(false)),
                cancelled: Arc::new(AtomicBool::new(false)),
            })
        }

        fn started(&self) -> bool {
            self.started.load(Ordering::SeqCst)
        }

        fn cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Runnable for TestRunnable {
        fn name(&self) -> &str {
            &self.name
        }

        fn need_leader_election(&self) -> bool {
            self.leader
        }

        async fn start(&self, shutdown: CancellationToken) -> Result<(), RunError> {
            self.started.store(true, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::WaitForCancel => {
                    shutdown.cancelled().await;
                    self.cancelled.store(true, Ordering::SeqCst);
                    Err(RunError::Cancelled)
                }
                Behaviour::Fail => Err(RunError::Config("boom".to_string())),
                Behaviour::Finish => Ok(()),
            }
        }
    }

    fn group(runnables: &[Arc<TestRunnable>]) -> RunnableGroup {
        let mut group = RunnableGroup::new("test-pod", Duration::from_secs(5));
        for r in runnables {
            group.add(r.clone());
        }
        group
    }

    /// Let spawned tasks make progress under paused time
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn test_leader_state_transitions() {
        use LeaderEvent::{Deposed, Elected, Shutdown};
        use LeaderState::{Leading, ShuttingDown, Standby};

        assert_eq!(Standby.transition(Elected), Leading);
        assert_eq!(Standby.transition(Deposed), Standby);
        assert_eq!(Standby.transition(Shutdown), ShuttingDown);
        assert_eq!(Leading.transition(Elected), Leading);
        assert_eq!(Leading.transition(Deposed), ShuttingDown);
        assert_eq!(Leading.transition(Shutdown), ShuttingDown);
        assert_eq!(ShuttingDown.transition(Elected), ShuttingDown);
    }

    /// A standby replica runs non-leader runnables but never leader-gated ones
    #[tokio::test(start_paused = true)]
    async fn test_standby_does_not_start_leader_runnables() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let free = TestRunnable::new("free", false, Behaviour::WaitForCancel);
        let (_tx, rx) = watch::channel(false);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone(), free.clone()]).run(shutdown.clone(), rx));
        settle().await;

        assert!(free.started());
        assert!(!gated.started());

        shutdown.cancel();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
        assert!(free.cancelled());
        assert!(!gated.started());
    }

    /// Leader-gated runnables start once leadership is acquired
    #[tokio::test(start_paused = true)]
    async fn test_leader_runnables_start_on_election() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let (tx, rx) = watch::channel(false);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone()]).run(shutdown.clone(), rx));
        settle().await;
        assert!(!gated.started());

        tx.send(true).unwrap();
        settle().await;
        assert!(gated.started());

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert!(gated.cancelled());
    }

    /// Already holding the lease at startup starts everything immediately
    #[tokio::test(start_paused = true)]
    async fn test_initial_leadership_starts_immediately() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let (_tx, rx) = watch::channel(true);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone()]).run(shutdown.clone(), rx));
        settle().await;
        assert!(gated.started());

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    /// Losing the lease cancels runnables and reports leadership loss
    #[tokio::test(start_paused = true)]
    async fn test_leadership_lost_cancels_runnables() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let (tx, rx) = watch::channel(true);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone()]).run(shutdown, rx));
        settle().await;
        assert!(gated.started());

        tx.send(false).unwrap();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(RunError::LeadershipLost)));
        assert!(gated.cancelled());
    }

    /// A closed election channel ends a standby replica instead of leaving it idle
    #[tokio::test(start_paused = true)]
    async fn test_election_ended_in_standby_stops_group() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let free = TestRunnable::new("free", false, Behaviour::WaitForCancel);
        let (tx, rx) = watch::channel(false);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone(), free.clone()]).run(shutdown, rx));
        settle().await;
        assert!(free.started());

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(3600), handle)
            .await
            .expect("group kept running after the election channel closed")
            .unwrap();

        assert!(matches!(result, Err(RunError::ElectionEnded)));
        assert!(!gated.started());
        assert!(free.cancelled());
    }

    /// A closed election channel also ends a leading replica
    #[tokio::test(start_paused = true)]
    async fn test_election_ended_while_leading_stops_group() {
        let gated = TestRunnable::new("gated", true, Behaviour::WaitForCancel);
        let (tx, rx) = watch::channel(true);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[gated.clone()]).run(shutdown, rx));
        settle().await;
        assert!(gated.started());

        drop(tx);
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(RunError::ElectionEnded)));
        assert!(gated.cancelled());
    }

    /// A runnable failing with a non-cancellation error stops the group
    #[tokio::test(start_paused = true)]
    async fn test_runnable_failure_stops_group() {
        let failing = TestRunnable::new("failing", false, Behaviour::Fail);
        let other = TestRunnable::new("other", false, Behaviour::WaitForCancel);
        let (_tx, rx) = watch::channel(false);

        let result = group(&[failing, other.clone()])
            .run(CancellationToken::new(), rx)
            .await;

        match result {
            Err(RunError::RunnableFailed { name, .. }) => assert_eq!(name, "failing"),
            unexpected => panic!("unexpected result: {unexpected:?}"),
        }
        assert!(other.cancelled());
    }

    /// A runnable that completes normally does not stop the others
    #[tokio::test(start_paused = true)]
    async fn test_finished_runnable_keeps_group_running() {
        let once = TestRunnable::new("once", true, Behaviour::Finish);
        let looping = TestRunnable::new("looping", true, Behaviour::WaitForCancel);
        let (_tx, rx) = watch::channel(true);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(group(&[once.clone(), looping.clone()]).run(shutdown.clone(), rx));
        settle().await;

        assert!(once.started());
        assert!(looping.started());
        assert!(!handle.is_finished());

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert!(looping.cancelled());
    }
}
