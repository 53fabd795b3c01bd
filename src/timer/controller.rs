use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::{Cue, CuePlayer, END_BELLS, INTERVAL_BELLS, START_BELLS},
    error::SessionError,
    identity::IdentityProvider,
    models::{NewSession, SessionRecord},
    store::SessionStore,
};

use super::{
    state::{MAX_DURATION_MINUTES, MIN_DURATION_MINUTES},
    Review, Tick, TimerState, TimerStatus,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_secs: u64,
    pub review: Option<Review>,
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    Progress { remaining_secs: u64 },
    Interval { elapsed_secs: u64 },
    /// The countdown ran out.
    Completed { duration_minutes: u32 },
    /// The user stopped the countdown early.
    Stopped { duration_minutes: u32 },
    SessionSaved(SessionRecord),
    /// The store rejected the session; it is gone.
    SessionLost { duration_minutes: u32, distractions: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved(SessionRecord),
    Lost,
}

struct Inner {
    timer: TimerState,
    review: Option<Review>,
    /// The signed-in user's sessions, most recent first.
    sessions: Vec<SessionRecord>,
}

/// Drives one meditation session from start to a committed or discarded record.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    cues: CuePlayer,
    ticker: Arc<Mutex<Option<CancellationToken>>>,
    events: broadcast::Sender<TimerEvent>,
    tick_interval: Duration,
}

impl SessionController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        cues: CuePlayer,
        duration_minutes: u32,
    ) -> Self {
        let duration_minutes = duration_minutes.clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Mutex::new(Inner {
                timer: TimerState::new(duration_minutes),
                review: None,
                sessions: Vec::new(),
            })),
            identity,
            store,
            cues,
            ticker: Arc::new(Mutex::new(None)),
            events,
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let mut inner = self.inner.lock().await;
        inner.timer.sync_elapsed(Instant::now());
        snapshot_of(&inner)
    }

    pub async fn sessions(&self) -> Vec<SessionRecord> {
        self.inner.lock().await.sessions.clone()
    }

    pub async fn set_duration(&self, minutes: u32) -> Result<(), SessionError> {
        if !TimerState::is_valid_duration(minutes) {
            return Err(SessionError::InvalidDuration {
                got: minutes,
                min: MIN_DURATION_MINUTES,
                max: MAX_DURATION_MINUTES,
            });
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.timer.status != TimerStatus::Idle {
                return Err(SessionError::NotIdle);
            }
            inner.timer.set_duration(minutes);
        }

        debug!("Duration set to {minutes} minutes");
        self.emit_state_changed().await;
        Ok(())
    }

    pub async fn start(&self) -> Result<TimerSnapshot, SessionError> {
        let Some(user) = self.identity.current_user() else {
            warn!("Refusing to start a session without a signed-in user");
            return Err(SessionError::NotAuthenticated);
        };

        let duration_minutes = {
            let mut inner = self.inner.lock().await;
            if inner.timer.status != TimerStatus::Idle {
                return Err(SessionError::AlreadyActive(inner.timer.status));
            }
            inner.timer.begin(Utc::now(), Instant::now());
            inner.timer.duration_minutes
        };

        info!(
            "Session started for {} ({} minutes)",
            user.display_name, duration_minutes
        );

        self.cues.play_sequence(START_BELLS, Cue::Start);
        self.spawn_ticker().await;
        self.emit_state_changed().await;

        Ok(self.snapshot().await)
    }

    /// Manual stop. The review reports the elapsed time, not the target.
    pub async fn stop(&self) -> Result<Review, SessionError> {
        let review = {
            let mut inner = self.inner.lock().await;
            let minutes = inner
                .timer
                .stop(Instant::now())
                .ok_or(SessionError::NotRunning)?;
            let review = Review::new(minutes);
            inner.review = Some(review.clone());
            review
        };

        self.cancel_ticker().await;
        info!(
            "Session stopped early after {} minute(s)",
            review.duration_minutes()
        );

        self.cues.play_sequence(END_BELLS, Cue::End);
        self.emit(TimerEvent::Stopped {
            duration_minutes: review.duration_minutes(),
        });
        self.emit_state_changed().await;

        Ok(review)
    }

    /// Advance the countdown to `now` and act on what it reports.
    /// Called every second by the ticker task.
    pub async fn tick_at(&self, now: Instant) -> Option<Tick> {
        let tick = {
            let mut inner = self.inner.lock().await;
            let tick = inner.timer.tick(now)?;
            if let Tick::Completed { duration_minutes } = tick {
                inner.review = Some(Review::new(duration_minutes));
            }
            tick
        };

        match tick {
            Tick::Progress { remaining_secs } => {
                self.emit(TimerEvent::Progress { remaining_secs });
            }
            Tick::Interval {
                elapsed_secs,
                remaining_secs,
            } => {
                debug!("Interval bell at {elapsed_secs}s");
                self.cues.play_sequence(INTERVAL_BELLS, Cue::Interval);
                self.emit(TimerEvent::Interval { elapsed_secs });
                self.emit(TimerEvent::Progress { remaining_secs });
            }
            Tick::Completed { duration_minutes } => {
                info!("Session completed after {duration_minutes} minutes");
                self.cancel_ticker().await;
                self.cues.play_sequence(END_BELLS, Cue::End);
                self.emit(TimerEvent::Completed { duration_minutes });
                self.emit_state_changed().await;
            }
        }

        Some(tick)
    }

    pub async fn increment_distractions(&self) -> Result<u32, SessionError> {
        self.adjust_review(Review::increment).await
    }

    pub async fn decrement_distractions(&self) -> Result<u32, SessionError> {
        self.adjust_review(Review::decrement).await
    }

    async fn adjust_review(&self, adjust: fn(&mut Review) -> u32) -> Result<u32, SessionError> {
        let count = {
            let mut inner = self.inner.lock().await;
            let review = inner.review.as_mut().ok_or(SessionError::NoPendingReview)?;
            adjust(review)
        };
        self.emit_state_changed().await;
        Ok(count)
    }

    /// Persist the reviewed session. A store failure is logged and the session
    /// is dropped; the timer returns to idle either way.
    pub async fn commit(&self) -> Result<CommitOutcome, SessionError> {
        let (user, review) = {
            let mut inner = self.inner.lock().await;
            if inner.review.is_none() {
                return Err(SessionError::NoPendingReview);
            }
            let user = self
                .identity
                .current_user()
                .ok_or(SessionError::NotAuthenticated)?;
            let review = inner.review.take().ok_or(SessionError::NoPendingReview)?;
            (user, review)
        };

        let session = NewSession {
            user_id: user.id,
            duration_minutes: review.duration_minutes(),
            distractions: review.distractions(),
            completed_at: Utc::now(),
        };

        let outcome = match self.store.insert_session(session).await {
            Ok(record) => {
                info!(
                    "Saved session {} ({} min, {} distractions)",
                    record.id, record.duration_minutes, record.distractions
                );
                CommitOutcome::Saved(record)
            }
            Err(err) => {
                error!(
                    "Failed to save {}-minute session; it will not be recorded: {err:#}",
                    review.duration_minutes()
                );
                CommitOutcome::Lost
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if let CommitOutcome::Saved(record) = &outcome {
                inner.sessions.insert(0, record.clone());
            }
            inner.timer.reset();
        }

        match &outcome {
            CommitOutcome::Saved(record) => self.emit(TimerEvent::SessionSaved(record.clone())),
            CommitOutcome::Lost => self.emit(TimerEvent::SessionLost {
                duration_minutes: review.duration_minutes(),
                distractions: review.distractions(),
            }),
        }
        self.emit_state_changed().await;

        Ok(outcome)
    }

    pub async fn discard(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().await;
            let review = inner.review.take().ok_or(SessionError::NoPendingReview)?;
            inner.timer.reset();
            info!(
                "Discarded {}-minute session",
                review.duration_minutes()
            );
        }
        self.emit_state_changed().await;
        Ok(())
    }

    /// Reload the signed-in user's history from the store.
    pub async fn refresh_history(&self) -> Result<Vec<SessionRecord>> {
        let sessions = match self.identity.current_user() {
            Some(user) => self.store.list_sessions(&user.id).await?,
            None => Vec::new(),
        };
        self.inner.lock().await.sessions = sessions.clone();
        Ok(sessions)
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(token) = ticker_guard.take() {
            token.cancel();
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let controller = self.clone();
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        match controller.tick_at(Instant::now()).await {
                            Some(Tick::Completed { .. }) | None => break,
                            Some(_) => {}
                        }
                    }
                }
            }

            debug!("Ticker stopped");
        });

        *ticker_guard = Some(token);
    }

    async fn cancel_ticker(&self) {
        if let Some(token) = self.ticker.lock().await.take() {
            token.cancel();
        }
    }

    fn emit(&self, event: TimerEvent) {
        let _ = self.events.send(event);
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.snapshot().await;
        self.emit(TimerEvent::StateChanged(snapshot));
    }
}

fn snapshot_of(inner: &Inner) -> TimerSnapshot {
    TimerSnapshot {
        remaining_secs: inner.timer.remaining_secs(),
        state: inner.timer.clone(),
        review: inner.review.clone(),
    }
}
