//! [`RenewSession`] [`Task`].

use std::{cmp, time::Duration};

use common::{operations::Perform, DateTime};
use tokio::{sync::watch, task::JoinHandle, time};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Session;
use crate::{
    domain::session,
    infra::{identity, Identity},
};

use super::Task;

/// Configuration for [`RenewSession`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Grace period before the first renewal attempt, avoiding a race with
    /// the initial page load.
    pub initial_delay: Duration,

    /// Interval until the next attempt once a renewal succeeds.
    pub interval: Duration,

    /// Lower bound of the delay until a server-scheduled retry.
    pub min_retry_delay: Duration,

    /// Delay until the next attempt after a failed one.
    pub failure_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(60 * 60),
            min_retry_delay: Duration::from_secs(10),
            failure_backoff: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Computes the delay until the next renewal attempt out of the provided
    /// `outcome` of the previous one.
    ///
    /// - A successful renewal re-arms at the regular [`Config::interval`].
    /// - A declined renewal follows the server-supplied
    ///   [`identity::RenewalOutcome::next_allowed_at`] hint, clamped from
    ///   below by [`Config::min_retry_delay`]; without the hint it falls
    ///   back to [`Config::failure_backoff`].
    /// - Any error re-arms at [`Config::failure_backoff`].
    #[must_use]
    pub fn delay_after(
        &self,
        outcome: Result<&identity::RenewalOutcome, &identity::Error>,
        now: DateTime,
    ) -> Duration {
        match outcome {
            Ok(o) if o.renewed => self.interval,
            Ok(o) => o.next_allowed_at.map_or(self.failure_backoff, |at| {
                cmp::max(
                    at.checked_duration_since(now).unwrap_or_default(),
                    self.min_retry_delay,
                )
            }),
            Err(_) => self.failure_backoff,
        }
    }
}

/// [`Task`] keeping a [`Session`] alive without user action.
///
/// Periodically asks the identity service to extend the [`Session`],
/// rescheduling itself out of the server-supplied timing hints or failure
/// backoff, for as long as its [`Handle`] is alive and the [`Session`] is
/// still renewable.
#[derive(Debug)]
pub struct RenewSession<I> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Identity`] client performing the renewals.
    identity: I,

    /// Current [`session::Token`], replaced on every rotation.
    token: watch::Sender<session::Token>,

    /// Deadline past which the [`Session`] cannot be renewed anymore, ending
    /// this [`Task`].
    renewable_until: session::RenewalDeadlineDateTime,
}

impl<I> RenewSession<I> {
    /// Creates a new [`RenewSession`] [`Task`] renewing the [`Session`] of
    /// the provided `token` until its `renewable_until` deadline.
    pub fn new(
        config: Config,
        identity: I,
        token: session::Token,
        renewable_until: session::RenewalDeadlineDateTime,
    ) -> Self {
        let (token, _) = watch::channel(token);
        Self {
            config,
            identity,
            token,
            renewable_until,
        }
    }

    /// Subscribes to rotations of the renewed [`session::Token`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<session::Token> {
        self.token.subscribe()
    }
}

impl<I> Task<Perform<()>> for RenewSession<I>
where
    I: Identity<
            Perform<identity::Renew>,
            Ok = identity::RenewalOutcome,
            Err = Traced<identity::Error>,
        > + Sync,
{
    type Ok = identity::RenewalOutcome;
    type Err = Traced<identity::Error>;

    /// Performs a single renewal attempt, publishing the rotated
    /// [`session::Token`] (if any) to subscribers.
    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let token = self.token.borrow().clone();

        let outcome = self
            .identity
            .execute(Perform(identity::Renew { token }))
            .await?;

        if let Some(rotated) = &outcome.token {
            _ = self.token.send_replace(rotated.clone());
        }

        Ok(outcome)
    }
}

impl<I> RenewSession<I>
where
    I: Identity<
            Perform<identity::Renew>,
            Ok = identity::RenewalOutcome,
            Err = Traced<identity::Error>,
        > + Send
        + Sync
        + 'static,
{
    /// Starts this [`Task`], arming its first attempt after
    /// [`Config::initial_delay`].
    ///
    /// At most one timer is pending at any instant: the next attempt is
    /// armed strictly after the outcome of the previous one is processed.
    /// Failures are logged and converted into a rescheduling delay, never
    /// propagated: the loop retries indefinitely until its [`Handle`] stops
    /// it, or the [`Session`]'s renewal deadline passes and makes it
    /// permanently unrenewable.
    #[must_use]
    pub fn start(self) -> Handle {
        Handle(tokio::spawn(async move {
            let mut delay = self.config.initial_delay;
            loop {
                time::sleep(delay).await;

                if DateTime::now().coerce() >= self.renewable_until {
                    log::debug!(
                        "`Session` is past its renewal deadline, stopping",
                    );
                    break;
                }

                let outcome = self.execute(Perform(())).await;
                match &outcome {
                    Ok(o) if o.renewed => {
                        log::debug!("`Session` renewed");
                    }
                    Ok(o) => {
                        log::debug!(
                            next_allowed_at = ?o.next_allowed_at,
                            "`Session` renewal declined by identity service",
                        );
                    }
                    Err(e) => {
                        // An `Unauthorized` here means the `Session` is
                        // likely invalid. Navigation is still gated per
                        // request, so no forced logout: keep retrying.
                        log::warn!("`Session` renewal failed: {e}");
                    }
                }

                // Never sleeps past the deadline, so the loop winds down
                // shortly after it.
                let now = DateTime::now();
                delay = cmp::min(
                    self.config.delay_after(
                        outcome.as_ref().map_err(AsRef::as_ref),
                        now,
                    ),
                    self.renewable_until
                        .checked_duration_since(now.coerce())
                        .unwrap_or_default(),
                );
            }
        }))
    }
}

/// Handle of a started [`RenewSession`] [`Task`].
///
/// Stops the [`Task`] when dropped.
#[derive(Debug)]
pub struct Handle(JoinHandle<()>);

impl Handle {
    /// Stops the owned [`RenewSession`] [`Task`], cancelling any pending
    /// attempt.
    ///
    /// Idempotent: repeated calls (or calls racing the [`Task`] itself) are
    /// no-ops.
    pub fn stop(&self) {
        self.0.abort();
    }

    /// Checks whether the owned [`RenewSession`] [`Task`] has already ended,
    /// either by being stopped or by reaching its renewal deadline.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod spec {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use common::{operations::Perform, DateTime, Handler};
    use tokio::time;
    use tracerr::Traced;

    use crate::{
        domain::session,
        infra::identity::{self, RenewalOutcome},
    };

    use super::{Config, RenewSession};

    fn config() -> Config {
        Config {
            initial_delay: Duration::from_millis(10),
            interval: Duration::from_secs(3600),
            min_retry_delay: Duration::from_millis(40),
            failure_backoff: Duration::from_millis(20),
        }
    }

    fn token(value: &str) -> session::Token {
        value.parse().unwrap()
    }

    fn deadline_in(duration: Duration) -> session::RenewalDeadlineDateTime {
        (DateTime::now() + duration).coerce()
    }

    fn far_deadline() -> session::RenewalDeadlineDateTime {
        deadline_in(Duration::from_secs(3600))
    }

    /// [`identity::Identity`] double scripting every [`identity::Renew`]
    /// outcome.
    #[derive(Clone, Debug)]
    struct ScriptedIdentity {
        attempts: Arc<AtomicUsize>,
        outcome: fn() -> Result<RenewalOutcome, Traced<identity::Error>>,
    }

    impl ScriptedIdentity {
        fn new(
            outcome: fn() -> Result<RenewalOutcome, Traced<identity::Error>>,
        ) -> Self {
            Self {
                attempts: Arc::new(AtomicUsize::new(0)),
                outcome,
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Handler<Perform<identity::Renew>> for ScriptedIdentity {
        type Ok = RenewalOutcome;
        type Err = Traced<identity::Error>;

        async fn execute(
            &self,
            _: Perform<identity::Renew>,
        ) -> Result<Self::Ok, Self::Err> {
            _ = self.attempts.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn declined() -> Result<RenewalOutcome, Traced<identity::Error>> {
        Ok(RenewalOutcome {
            renewed: false,
            next_allowed_at: None,
            token: None,
        })
    }

    fn rotated() -> Result<RenewalOutcome, Traced<identity::Error>> {
        Ok(RenewalOutcome {
            renewed: true,
            next_allowed_at: None,
            token: Some(token("rotated")),
        })
    }

    fn failed() -> Result<RenewalOutcome, Traced<identity::Error>> {
        Err(tracerr::new!(identity::Error::Unauthorized))
    }

    #[test]
    fn success_reschedules_at_regular_interval() {
        let config = config();
        let now = DateTime::now();

        assert_eq!(
            config.delay_after(rotated().as_ref().map_err(AsRef::as_ref), now),
            config.interval,
        );
    }

    #[test]
    fn declined_attempt_follows_server_hint() {
        let config = Config::default();
        let now = DateTime::now();
        let outcome = RenewalOutcome {
            renewed: false,
            next_allowed_at: Some(now + Duration::from_secs(50)),
            token: None,
        };

        let delay = config.delay_after(Ok(&outcome), now);

        assert!(delay >= Duration::from_secs(49));
        assert!(delay <= Duration::from_secs(51));
    }

    #[test]
    fn server_hint_is_clamped_from_below() {
        let config = Config::default();
        let now = DateTime::now();
        let outcome = RenewalOutcome {
            renewed: false,
            next_allowed_at: Some(now - Duration::from_secs(5)),
            token: None,
        };

        assert_eq!(
            config.delay_after(Ok(&outcome), now),
            config.min_retry_delay,
        );
    }

    #[test]
    fn declined_attempt_without_hint_backs_off() {
        let config = Config::default();
        let now = DateTime::now();

        assert_eq!(
            config
                .delay_after(declined().as_ref().map_err(AsRef::as_ref), now),
            config.failure_backoff,
        );
    }

    #[test]
    fn failure_backs_off_at_fixed_delay() {
        let config = Config::default();
        let now = DateTime::now();

        assert_eq!(
            config.delay_after(failed().as_ref().map_err(AsRef::as_ref), now),
            config.failure_backoff,
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loop_survives_failures_and_keeps_retrying() {
        let identity = ScriptedIdentity::new(failed);
        let handle = RenewSession::new(
            config(),
            identity.clone(),
            token("initial"),
            far_deadline(),
        )
        .start();

        time::sleep(Duration::from_millis(200)).await;

        assert!(identity.attempts() >= 2, "loop stopped after a failure");
        handle.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_is_idempotent_and_prevents_further_attempts() {
        let identity = ScriptedIdentity::new(declined);
        let handle = RenewSession::new(
            config(),
            identity.clone(),
            token("initial"),
            far_deadline(),
        )
        .start();

        time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        handle.stop();
        let after_stop = identity.attempts();

        time::sleep(Duration::from_millis(150)).await;

        assert!(after_stop >= 1);
        assert_eq!(identity.attempts(), after_stop);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publishes_rotated_tokens_to_subscribers() {
        let task = RenewSession::new(
            config(),
            ScriptedIdentity::new(rotated),
            token("initial"),
            far_deadline(),
        );
        let mut rotations = task.subscribe();
        let handle = task.start();

        time::timeout(Duration::from_secs(2), rotations.changed())
            .await
            .expect("no rotation published")
            .unwrap();

        assert_eq!(*rotations.borrow(), token("rotated"));
        handle.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn winds_down_once_renewal_deadline_passes() {
        let identity = ScriptedIdentity::new(declined);
        let handle = RenewSession::new(
            config(),
            identity.clone(),
            token("initial"),
            deadline_in(Duration::from_millis(50)),
        )
        .start();

        time::sleep(Duration::from_millis(300)).await;

        assert!(handle.is_finished(), "loop survived its renewal deadline");
        let settled = identity.attempts();

        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(identity.attempts(), settled);
    }
}
