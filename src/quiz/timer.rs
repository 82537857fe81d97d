//! Per-question countdowns.
//!
//! Each participant has at most one armed timer. Firing and cancelling both
//! go through removing the timer's entry, so for a given arm exactly one of
//! them happens.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::debug;
use tokio::sync::oneshot;

use super::{ParticipantId, QuestionToken};

/// Work run when a timer expires.
pub type Expiry = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Armed {
    id: u64,
    token: QuestionToken,
    cancel: oneshot::Sender<()>,
}

#[derive(Clone, Default)]
pub struct TimerScheduler {
    armed: Arc<DashMap<ParticipantId, Armed>>,
    next_id: Arc<AtomicU64>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown for `token`, replacing any timer the participant had.
    ///
    /// `on_expire` runs at most once, and never if the timer is cancelled or
    /// replaced before `duration` elapses. Must be called within a tokio runtime.
    pub fn arm<F>(&self, participant: ParticipantId, token: QuestionToken, duration: Duration, on_expire: F)
    where
        F: FnOnce() -> Expiry + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel, cancelled) = oneshot::channel();

        let previous = self.armed.insert(
            participant,
            Armed {
                id,
                token: token.clone(),
                cancel,
            },
        );
        if let Some(previous) = previous {
            debug!("Replacing timer for {} (token {})", participant, previous.token);
            let _ = previous.cancel.send(());
        }
        debug!("Armed {:?} timer for {} (token {})", duration, participant, token);

        let armed = self.armed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let still_ours = armed
                        .remove_if(&participant, |_, entry| entry.id == id)
                        .is_some();
                    if still_ours {
                        debug!("Timer expired for {} (token {})", participant, token);
                        on_expire().await;
                    }
                }
                // A dropped sender means the entry was removed, same as a cancel
                _ = cancelled => {}
            }
        });
    }

    /// Stop the participant's timer if it is still armed for `token`.
    pub fn cancel(&self, participant: ParticipantId, token: &QuestionToken) -> bool {
        let Some((_, entry)) = self
            .armed
            .remove_if(&participant, |_, entry| &entry.token == token)
        else {
            return false;
        };
        let _ = entry.cancel.send(());
        debug!("Cancelled timer for {} (token {})", participant, token);
        true
    }

    /// Stop whatever timer the participant has.
    pub fn cancel_all(&self, participant: ParticipantId) -> bool {
        match self.armed.remove(&participant) {
            Some((_, entry)) => {
                let _ = entry.cancel.send(());
                true
            }
            None => false,
        }
    }

    pub fn armed_token(&self, participant: ParticipantId) -> Option<QuestionToken> {
        self.armed.get(&participant).map(|entry| entry.token.clone())
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() -> Expiry + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = fired.clone();
        let on_expire = move || -> Expiry {
            Box::pin(async move {
                handle.fetch_add(1, Ordering::SeqCst);
            })
        };
        (fired, on_expire)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_duration() {
        let timers = TimerScheduler::new();
        let (fired, on_expire) = counter();
        timers.arm(ParticipantId(1), QuestionToken::new("a"), Duration::from_secs(60), on_expire);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timers.armed_count(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let timers = TimerScheduler::new();
        let (fired, on_expire) = counter();
        let token = QuestionToken::new("a");
        timers.arm(ParticipantId(1), token.clone(), Duration::from_secs(60), on_expire);

        assert!(!timers.cancel(ParticipantId(1), &QuestionToken::new("other")));
        assert!(timers.cancel(ParticipantId(1), &token));
        assert!(!timers.cancel(ParticipantId(1), &token));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn arming_again_replaces_previous_timer() {
        let timers = TimerScheduler::new();
        let (first, first_expire) = counter();
        let (second, second_expire) = counter();

        timers.arm(ParticipantId(1), QuestionToken::new("a"), Duration::from_secs(60), first_expire);
        timers.arm(ParticipantId(1), QuestionToken::new("b"), Duration::from_secs(60), second_expire);
        assert_eq!(timers.armed_token(ParticipantId(1)), Some(QuestionToken::new("b")));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn participants_have_independent_timers() {
        let timers = TimerScheduler::new();
        let (one, one_expire) = counter();
        let (two, two_expire) = counter();

        timers.arm(ParticipantId(1), QuestionToken::new("a"), Duration::from_secs(60), one_expire);
        timers.arm(ParticipantId(2), QuestionToken::new("a"), Duration::from_secs(120), two_expire);
        assert!(timers.cancel_all(ParticipantId(1)));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(one.load(Ordering::SeqCst), 0);
        assert_eq!(two.load(Ordering::SeqCst), 1);
    }
}
