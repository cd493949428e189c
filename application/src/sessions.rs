//! Registry of running session renewal schedulers.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, PoisonError},
};

use service::{
    domain::session,
    task::renew_session,
};
use tokio::sync::watch;

/// Registry of per-[`session::Subject`] renewal schedulers.
///
/// Owns their [`renew_session::Handle`]s: dropping an entry stops the
/// scheduler, so no attempt outlives the session it renews. Schedulers that
/// ended on their own (the session reached its renewal deadline) are swept
/// out on the next login, keeping the registry bounded by live subjects.
#[derive(Debug, Default)]
pub struct Sessions(Mutex<HashMap<session::Subject, Entry>>);

/// Single [`Sessions`] registry entry.
#[derive(Debug)]
struct Entry {
    /// [`renew_session::Handle`] of the running scheduler.
    handle: renew_session::Handle,

    /// Rotations of the renewed [`session::Token`].
    rotations: watch::Receiver<session::Token>,

    /// Every [`session::Token`] this entry's session has handed to its
    /// browser: the login token plus all rotations attached so far.
    ///
    /// A token outside this lineage belongs to a different session of the
    /// same subject (a login from another browser replaced this entry) and
    /// must never receive this entry's rotations.
    lineage: HashSet<session::Token>,
}

impl Sessions {
    /// Registers a started scheduler for the provided [`session::Subject`]
    /// and its login `token`.
    ///
    /// A scheduler already registered for the same [`session::Subject`] is
    /// stopped and replaced: a re-login restarts the renewal cycle from
    /// scratch.
    pub fn insert(
        &self,
        subject: session::Subject,
        token: session::Token,
        handle: renew_session::Handle,
        rotations: watch::Receiver<session::Token>,
    ) {
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.handle.is_finished());
        let replaced = entries.insert(
            subject,
            Entry {
                handle,
                rotations,
                lineage: HashSet::from([token]),
            },
        );
        drop(entries);

        if let Some(entry) = replaced {
            entry.handle.stop();
        }
    }

    /// Unregisters and stops the scheduler of the provided
    /// [`session::Subject`], if any is running.
    pub fn remove(&self, subject: &session::Subject) {
        if let Some(entry) = self.lock().remove(subject) {
            entry.handle.stop();
        }
    }

    /// Returns the rotated [`session::Token`] of the provided
    /// [`session::Subject`], if the scheduler has replaced the `current` one.
    ///
    /// A `current` token outside the registered session's lineage receives
    /// nothing: it belongs to a session this registry no longer renews.
    #[must_use]
    pub fn rotated_token(
        &self,
        subject: &session::Subject,
        current: &session::Token,
    ) -> Option<session::Token> {
        let mut entries = self.lock();
        let entry = entries.get_mut(subject)?;

        if !entry.lineage.contains(current) {
            return None;
        }

        let latest = entry.rotations.borrow().clone();
        if latest == *current {
            return None;
        }

        _ = entry.lineage.insert(latest.clone());
        Some(latest)
    }

    /// Returns the number of registered schedulers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Indicates whether no scheduler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the inner registry.
    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<session::Subject, Entry>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::Perform, DateTime, Handler};
    use service::{
        domain::session,
        infra::identity::{self, RenewalOutcome},
        task::renew_session::{Config, RenewSession},
    };
    use tokio::time;
    use tracerr::Traced;

    use super::Sessions;

    /// [`identity::Identity`] double declining every [`identity::Renew`].
    #[derive(Clone, Copy, Debug)]
    struct DecliningIdentity;

    impl Handler<Perform<identity::Renew>> for DecliningIdentity {
        type Ok = RenewalOutcome;
        type Err = Traced<identity::Error>;

        async fn execute(
            &self,
            _: Perform<identity::Renew>,
        ) -> Result<Self::Ok, Self::Err> {
            Ok(RenewalOutcome {
                renewed: false,
                next_allowed_at: None,
                token: None,
            })
        }
    }

    /// [`identity::Identity`] double rotating the token on every
    /// [`identity::Renew`].
    #[derive(Clone, Copy, Debug)]
    struct RotatingIdentity;

    impl Handler<Perform<identity::Renew>> for RotatingIdentity {
        type Ok = RenewalOutcome;
        type Err = Traced<identity::Error>;

        async fn execute(
            &self,
            _: Perform<identity::Renew>,
        ) -> Result<Self::Ok, Self::Err> {
            Ok(RenewalOutcome {
                renewed: true,
                next_allowed_at: None,
                token: Some(token("rotated")),
            })
        }
    }

    fn token(value: &str) -> session::Token {
        value.parse().unwrap()
    }

    fn subject(value: &str) -> session::Subject {
        value.parse().unwrap()
    }

    fn deadline_in(duration: Duration) -> session::RenewalDeadlineDateTime {
        (DateTime::now() + duration).coerce()
    }

    fn idle_config() -> Config {
        Config {
            initial_delay: Duration::from_secs(3600),
            ..Config::default()
        }
    }

    fn fast_config() -> Config {
        Config {
            initial_delay: Duration::from_millis(10),
            ..Config::default()
        }
    }

    fn insert_idle(sessions: &Sessions, subject_of: &str, token_of: &str) {
        let task = RenewSession::new(
            idle_config(),
            DecliningIdentity,
            token(token_of),
            deadline_in(Duration::from_secs(3600)),
        );
        let rotations = task.subscribe();
        sessions.insert(
            subject(subject_of),
            token(token_of),
            task.start(),
            rotations,
        );
    }

    /// Registers a scheduler rotating `token_of` into `"rotated"`, waiting
    /// for the rotation to be published.
    async fn insert_rotating(
        sessions: &Sessions,
        subject_of: &str,
        token_of: &str,
    ) {
        let task = RenewSession::new(
            fast_config(),
            RotatingIdentity,
            token(token_of),
            deadline_in(Duration::from_secs(3600)),
        );
        let mut rotations = task.subscribe();
        let published = task.subscribe();
        sessions.insert(
            subject(subject_of),
            token(token_of),
            task.start(),
            published,
        );

        time::timeout(Duration::from_secs(2), rotations.changed())
            .await
            .expect("no rotation published")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reports_no_rotation_while_token_is_current() {
        let sessions = Sessions::default();

        insert_idle(&sessions, "regular_user", "initial");

        assert!(sessions
            .rotated_token(&subject("regular_user"), &token("initial"))
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reports_rotation_once_token_differs() {
        let sessions = Sessions::default();

        insert_rotating(&sessions, "regular_user", "initial").await;

        let rotated = sessions
            .rotated_token(&subject("regular_user"), &token("initial"))
            .unwrap();
        assert_eq!(rotated, token("rotated"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn removal_forgets_the_subject() {
        let sessions = Sessions::default();

        insert_rotating(&sessions, "regular_user", "initial").await;
        sessions.remove(&subject("regular_user"));

        assert!(sessions
            .rotated_token(&subject("regular_user"), &token("initial"))
            .is_none());
        assert!(sessions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn never_rotates_tokens_of_a_replaced_session() {
        let sessions = Sessions::default();

        insert_idle(&sessions, "regular_user", "first");
        insert_rotating(&sessions, "regular_user", "second").await;

        assert!(
            sessions
                .rotated_token(&subject("regular_user"), &token("first"))
                .is_none(),
            "replaced session received the new session's token",
        );
        assert_eq!(
            sessions.rotated_token(&subject("regular_user"), &token("second")),
            Some(token("rotated")),
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweeps_ended_schedulers_on_login() {
        let sessions = Sessions::default();

        let task = RenewSession::new(
            fast_config(),
            DecliningIdentity,
            token("stale"),
            deadline_in(Duration::ZERO),
        );
        let rotations = task.subscribe();
        sessions.insert(
            subject("gone_user"),
            token("stale"),
            task.start(),
            rotations,
        );

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sessions.len(), 1);

        insert_idle(&sessions, "regular_user", "initial");

        assert_eq!(sessions.len(), 1, "ended scheduler was not swept");
    }
}
