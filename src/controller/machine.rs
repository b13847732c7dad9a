// src/controller/machine.rs

use std::mem;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
    config::QUESTION_SECONDS,
    controller::{
        api::AssessmentApi,
        countdown::{Countdown, Metronome, TickStamp, next_tick, sync_metronome},
        error::ControllerError,
    },
    models::{
        question::PublicQuestion,
        result::AssessmentResult,
        session::{AnswerSet, Session},
        user::UserProfile,
    },
};

/// A test in progress: one question on screen, one countdown armed.
#[derive(Debug)]
pub struct ActiveTest {
    session: Session,
    question_index: usize,
    answers: AnswerSet,
    countdown: Countdown,
}

impl ActiveTest {
    fn is_on_last_question(&self) -> bool {
        self.question_index + 1 >= self.session.questions.len()
    }
}

/// Answers handed to the service; kept until the service confirms a score.
#[derive(Debug)]
pub struct PendingSubmission {
    session: Session,
    answers: AnswerSet,
}

#[derive(Debug)]
pub struct CompletedTest {
    session_id: String,
    skill: String,
    result: AssessmentResult,
}

#[derive(Debug, Default)]
pub enum ControllerState {
    #[default]
    Idle,
    Active(ActiveTest),
    Submitting(PendingSubmission),
    Completed(CompletedTest),
}

impl ControllerState {
    fn name(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Active(_) => "active",
            ControllerState::Submitting(_) => "submitting",
            ControllerState::Completed(_) => "completed",
        }
    }
}

/// Read-only snapshot of where the controller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active {
        question_index: usize,
        time_remaining: u32,
    },
    Submitting,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next { question_index: usize },
    Finished(AssessmentResult),
}

#[derive(Debug)]
pub enum TickOutcome {
    /// No countdown matches the tick; nothing changed.
    Ignored,
    Counting { time_remaining: u32 },
    Advanced { question_index: usize },
    Completed(AssessmentResult),
    /// Timed out on the last question and the submission failed. The answers
    /// are kept; `submit` retries.
    SubmitFailed(ControllerError),
}

/// User input for [`SessionController::drive`].
#[derive(Debug, Clone)]
pub enum Command {
    Answer { question_id: i64, option: String },
    Next,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    Completed(AssessmentResult),
    Cancelled,
    /// The command channel closed while a submission was still pending.
    /// The controller keeps the answers; call `submit` or `cancel` directly.
    Detached,
}

/// Client-side state machine for one user's verification tests.
///
/// All transitions take `&mut self`, so a tick, an answer and a "Next" can
/// never interleave. Timeouts and "Next" share [`advance`](Self::advance), and
/// both paths end in [`submit`](Self::submit) on the last question.
pub struct SessionController<A> {
    api: A,
    user_id: Option<i64>,
    profile: Option<UserProfile>,
    state: ControllerState,
    question_seconds: u32,
    include_solutions: bool,
    generation: u64,
    last_error: Option<ControllerError>,
}

impl<A: AssessmentApi> SessionController<A> {
    /// `user_id` is `None` when nobody is signed in.
    pub fn new(api: A, user_id: Option<i64>) -> Self {
        Self {
            api,
            user_id,
            profile: None,
            state: ControllerState::Idle,
            question_seconds: QUESTION_SECONDS,
            include_solutions: false,
            generation: 0,
            last_error: None,
        }
    }

    pub fn with_question_seconds(mut self, seconds: u32) -> Self {
        self.question_seconds = seconds.max(1);
        self
    }

    /// Ask the service to attach solutions to the result.
    pub fn with_solutions(mut self, include: bool) -> Self {
        self.include_solutions = include;
        self
    }

    pub fn phase(&self) -> Phase {
        match &self.state {
            ControllerState::Idle => Phase::Idle,
            ControllerState::Active(a) => Phase::Active {
                question_index: a.question_index,
                time_remaining: a.countdown.remaining(),
            },
            ControllerState::Submitting(_) => Phase::Submitting,
            ControllerState::Completed(_) => Phase::Completed,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            ControllerState::Active(a) => Some(&a.session),
            ControllerState::Submitting(p) => Some(&p.session),
            _ => None,
        }
    }

    pub fn current_question(&self) -> Option<&PublicQuestion> {
        match &self.state {
            ControllerState::Active(a) => a.session.questions.get(a.question_index),
            _ => None,
        }
    }

    pub fn answers(&self) -> Option<&AnswerSet> {
        match &self.state {
            ControllerState::Active(a) => Some(&a.answers),
            ControllerState::Submitting(p) => Some(&p.answers),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AssessmentResult> {
        match &self.state {
            ControllerState::Completed(done) => Some(&done.result),
            _ => None,
        }
    }

    /// Last cached authoritative profile.
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Error from the last command or automatic submission run by `drive`.
    pub fn take_error(&mut self) -> Option<ControllerError> {
        self.last_error.take()
    }

    /// Stamp of the countdown currently armed, if any.
    pub fn current_stamp(&self) -> Option<TickStamp> {
        match &self.state {
            ControllerState::Active(a) => Some(a.countdown.stamp()),
            _ => None,
        }
    }

    /// Re-reads the profile from the service; verification state is never
    /// derived locally.
    pub async fn refresh_profile(&mut self) -> Result<&UserProfile, ControllerError> {
        let user_id = self.user_id.ok_or(ControllerError::Unauthenticated)?;
        let profile = self.api.get_user(user_id).await?;
        Ok(self.profile.insert(profile))
    }

    /// Starts a test for `skill`. A test already in progress is cancelled
    /// first, which stops its countdown. Eligibility is decided by the
    /// service, never by the cached profile.
    pub async fn start_test(&mut self, skill: &str) -> Result<Session, ControllerError> {
        if self.user_id.is_none() {
            return Err(ControllerError::Unauthenticated);
        }
        if matches!(
            self.state,
            ControllerState::Active(_) | ControllerState::Submitting(_)
        ) {
            tracing::info!("Replacing the test in progress");
        }
        self.cancel();

        let session = self.api.start(skill).await?;
        if session.questions.is_empty() {
            return Err(ControllerError::EmptySession);
        }

        self.generation += 1;
        let countdown = Countdown::arm(
            self.question_seconds,
            TickStamp {
                generation: self.generation,
                question_index: 0,
            },
        );

        tracing::info!(
            session_id = %session.session_id,
            skill = %session.skill,
            questions = session.questions.len(),
            "Verification test started"
        );

        self.state = ControllerState::Active(ActiveTest {
            session: session.clone(),
            question_index: 0,
            answers: AnswerSet::new(),
            countdown,
        });

        Ok(session)
    }

    /// Selects `option` for a question. Does not move on or touch the timer.
    pub fn record_answer(
        &mut self,
        question_id: i64,
        option: impl Into<String>,
    ) -> Result<(), ControllerError> {
        let phase = self.state.name();
        let ControllerState::Active(active) = &mut self.state else {
            return Err(ControllerError::InvalidState {
                operation: "record_answer",
                phase,
            });
        };

        let question = active
            .session
            .question(question_id)
            .ok_or(ControllerError::UnknownQuestion(question_id))?;

        let option = option.into();
        if !question.options.contains(&option) {
            return Err(ControllerError::InvalidOption(question_id));
        }

        active.answers.insert(question_id, option);
        Ok(())
    }

    /// One time unit elapsed for whatever countdown is armed now.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.current_stamp() {
            Some(stamp) => self.tick_stamped(stamp).await,
            None => TickOutcome::Ignored,
        }
    }

    /// One time unit elapsed for the countdown identified by `stamp`.
    /// Ticks for any other countdown are dropped.
    pub async fn tick_stamped(&mut self, stamp: TickStamp) -> TickOutcome {
        let expired = match &mut self.state {
            ControllerState::Active(active) if active.countdown.stamp() == stamp => {
                if !active.countdown.tick() {
                    return TickOutcome::Counting {
                        time_remaining: active.countdown.remaining(),
                    };
                }
                true
            }
            _ => false,
        };

        if !expired {
            tracing::debug!(?stamp, "Dropping tick for a countdown that is no longer armed");
            return TickOutcome::Ignored;
        }

        tracing::debug!(question_index = stamp.question_index, "Question timed out");
        match self.advance().await {
            Ok(Advance::Next { question_index }) => TickOutcome::Advanced { question_index },
            Ok(Advance::Finished(result)) => TickOutcome::Completed(result),
            Err(e) => TickOutcome::SubmitFailed(e),
        }
    }

    /// Moves to the next question, or submits after the last one.
    pub async fn advance(&mut self) -> Result<Advance, ControllerError> {
        let phase = self.state.name();
        let ControllerState::Active(active) = &mut self.state else {
            return Err(ControllerError::InvalidState {
                operation: "advance",
                phase,
            });
        };

        if !active.is_on_last_question() {
            let next = active.question_index + 1;
            active.question_index = next;
            active.countdown = Countdown::arm(
                self.question_seconds,
                TickStamp {
                    generation: self.generation,
                    question_index: next,
                },
            );
            return Ok(Advance::Next {
                question_index: next,
            });
        }

        self.submit().await.map(Advance::Finished)
    }

    /// Sends the answers. Valid on the last question, while a submission is
    /// pending, and after completion (where it returns the stored result).
    pub async fn submit(&mut self) -> Result<AssessmentResult, ControllerError> {
        match &self.state {
            ControllerState::Completed(done) => {
                tracing::debug!(session_id = %done.session_id, skill = %done.skill, "Already submitted");
                return Ok(done.result.clone());
            }
            ControllerState::Active(active) if !active.is_on_last_question() => {
                return Err(ControllerError::InvalidState {
                    operation: "submit",
                    phase: "answering a question before the last",
                });
            }
            ControllerState::Idle => {
                return Err(ControllerError::InvalidState {
                    operation: "submit",
                    phase: "idle",
                });
            }
            _ => {}
        }

        self.begin_submission();

        let ControllerState::Submitting(pending) = &self.state else {
            return Err(ControllerError::InvalidState {
                operation: "submit",
                phase: self.state.name(),
            });
        };
        let session_id = pending.session.session_id.clone();
        let skill = pending.session.skill.clone();

        match self
            .api
            .submit(&session_id, &pending.answers, self.include_solutions)
            .await
        {
            Ok(result) => {
                tracing::info!(
                    session_id = %session_id,
                    correct = result.correct,
                    total = result.total,
                    passed = result.passed,
                    "Verification test submitted"
                );
                self.state = ControllerState::Completed(CompletedTest {
                    session_id,
                    skill,
                    result: result.clone(),
                });
                if result.passed {
                    if let Err(e) = self.refresh_profile().await {
                        tracing::warn!("Could not refresh profile after a pass: {}", e);
                    }
                }
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Submission failed, answers kept: {}", e);
                Err(e)
            }
        }
    }

    /// Drops the test in progress without contacting the service.
    /// From `Completed` this just returns to `Idle`.
    pub fn cancel(&mut self) {
        match mem::take(&mut self.state) {
            ControllerState::Active(active) => {
                tracing::info!(session_id = %active.session.session_id, "Test cancelled");
            }
            ControllerState::Submitting(pending) => {
                tracing::info!(
                    session_id = %pending.session.session_id,
                    "Pending submission abandoned"
                );
            }
            ControllerState::Idle | ControllerState::Completed(_) => {}
        }
    }

    // Active -> Submitting. Destructuring drops the countdown.
    fn begin_submission(&mut self) {
        self.state = match mem::take(&mut self.state) {
            ControllerState::Active(ActiveTest {
                session, answers, ..
            }) => ControllerState::Submitting(PendingSubmission { session, answers }),
            other => other,
        };
    }

    /// Runs the active test on real time until it completes or is cancelled.
    ///
    /// Ticks arrive every `tick_period`, one unit of the per-question
    /// countdown each. The metronome is re-armed whenever the question
    /// changes and dropped as soon as no countdown is armed.
    pub async fn drive(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        tick_period: Duration,
    ) -> DriveOutcome {
        let mut metronome: Option<Metronome> = None;
        let mut commands_open = true;

        loop {
            match &self.state {
                ControllerState::Completed(done) => {
                    return DriveOutcome::Completed(done.result.clone());
                }
                ControllerState::Idle => return DriveOutcome::Cancelled,
                _ => {}
            }

            sync_metronome(&mut metronome, self.current_stamp(), tick_period);
            if metronome.is_none() && !commands_open {
                return DriveOutcome::Detached;
            }

            tokio::select! {
                stamp = next_tick(&mut metronome) => {
                    if let TickOutcome::SubmitFailed(e) = self.tick_stamped(stamp).await {
                        self.last_error = Some(e);
                    }
                }
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.apply(command).await,
                    None => commands_open = false,
                },
            }
        }
    }

    async fn apply(&mut self, command: Command) {
        let outcome = match command {
            Command::Answer {
                question_id,
                option,
            } => self.record_answer(question_id, option),
            Command::Next => self.advance().await.map(|_| ()),
            Command::Submit => self.submit().await.map(|_| ()),
            Command::Cancel => {
                self.cancel();
                Ok(())
            }
        };

        if let Err(e) = outcome {
            tracing::warn!("Command rejected: {}", e);
            self.last_error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::Config,
        controller::api::InProcessApi,
        models::{question::NewQuestion, user::NewUser},
        service::AssessmentService,
        store::{AssessmentStore, MemoryStore},
    };

    fn config() -> Config {
        Config {
            database_url: None,
            jwt_secret: "secret".to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            questions_per_session: 3,
            session_ttl_secs: 3600,
            bind_addr: ([127, 0, 0, 1], 0).into(),
            question_bank_path: None,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, InProcessApi, i64) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                username: "grace".to_string(),
                password_hash: "x".to_string(),
                role: "user".to_string(),
                skills: vec!["rust".to_string(), "sql".to_string()],
            })
            .await
            .unwrap();
        for i in 0..3 {
            store
                .add_question(NewQuestion {
                    skill: "rust".to_string(),
                    question: format!("Rust question {}", i),
                    options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                    answer: "A".to_string(),
                })
                .await
                .unwrap();
        }
        let service = Arc::new(AssessmentService::new(store.clone(), &config()));
        (store, InProcessApi::new(service, Some(user.id)), user.id)
    }

    /// Fails the first `failures` submissions with a network error.
    struct FlakyApi {
        inner: InProcessApi,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl AssessmentApi for FlakyApi {
        async fn start(&self, skill: &str) -> Result<Session, ControllerError> {
            self.inner.start(skill).await
        }

        async fn submit(
            &self,
            session_id: &str,
            answers: &AnswerSet,
            include_solutions: bool,
        ) -> Result<AssessmentResult, ControllerError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ControllerError::NetworkFailure("connection reset".to_string()));
            }
            self.inner.submit(session_id, answers, include_solutions).await
        }

        async fn get_user(&self, user_id: i64) -> Result<UserProfile, ControllerError> {
            self.inner.get_user(user_id).await
        }
    }

    fn question_ids(session: &Session) -> Vec<i64> {
        session.questions.iter().map(|q| q.id).collect()
    }

    #[tokio::test]
    async fn test_all_correct_passes_and_refreshes_profile() {
        let (store, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));

        let session = controller.start_test("rust").await.unwrap();
        let ids = question_ids(&session);
        assert_eq!(ids.len(), 3);

        for (i, id) in ids.iter().enumerate() {
            controller.record_answer(*id, "A").unwrap();
            let step = controller.advance().await.unwrap();
            if i < 2 {
                assert_eq!(step, Advance::Next { question_index: i + 1 });
            } else {
                let Advance::Finished(result) = step else {
                    panic!("expected the last advance to submit");
                };
                assert_eq!((result.correct, result.total), (3, 3));
                assert_eq!(result.score_percent, 100);
                assert!(result.passed);
            }
        }

        assert_eq!(controller.phase(), Phase::Completed);
        assert!(controller.profile().unwrap().is_verified("rust"));
        assert!(store.get_profile(user_id).await.unwrap().unwrap().is_verified("rust"));
    }

    #[tokio::test]
    async fn test_timeouts_leave_questions_unanswered() {
        let (store, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id)).with_question_seconds(2);

        let session = controller.start_test("rust").await.unwrap();
        controller.record_answer(session.questions[0].id, "A").unwrap();

        assert!(matches!(
            controller.tick().await,
            TickOutcome::Counting { time_remaining: 1 }
        ));
        assert!(matches!(
            controller.tick().await,
            TickOutcome::Advanced { question_index: 1 }
        ));
        assert_eq!(
            controller.phase(),
            Phase::Active {
                question_index: 1,
                time_remaining: 2
            }
        );

        controller.tick().await;
        controller.tick().await;
        controller.tick().await;
        let TickOutcome::Completed(result) = controller.tick().await else {
            panic!("expected the last timeout to submit");
        };

        assert_eq!((result.correct, result.total), (1, 3));
        assert_eq!(result.score_percent, 33);
        assert!(!result.passed);
        assert!(!store.get_profile(user_id).await.unwrap().unwrap().is_verified("rust"));
    }

    #[tokio::test]
    async fn test_no_answers_scores_zero() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id)).with_question_seconds(1);
        controller.start_test("rust").await.unwrap();

        let mut outcome = controller.tick().await;
        while !matches!(outcome, TickOutcome::Completed(_)) {
            outcome = controller.tick().await;
        }
        let TickOutcome::Completed(result) = outcome else {
            unreachable!()
        };
        assert_eq!(result.correct, 0);
        assert_eq!(result.total, 3);
        assert_eq!(result.score_percent, 0);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_stale_tick_is_ignored_after_next() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id)).with_question_seconds(5);
        controller.start_test("rust").await.unwrap();

        let first = controller.current_stamp().unwrap();
        controller.advance().await.unwrap();

        assert!(matches!(
            controller.tick_stamped(first).await,
            TickOutcome::Ignored
        ));
        assert_eq!(
            controller.phase(),
            Phase::Active {
                question_index: 1,
                time_remaining: 5
            }
        );
    }

    #[tokio::test]
    async fn test_resubmit_after_completion_returns_same_result() {
        let (store, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));
        let session = controller.start_test("rust").await.unwrap();
        for id in question_ids(&session) {
            controller.record_answer(id, "A").unwrap();
        }
        controller.advance().await.unwrap();
        controller.advance().await.unwrap();

        let first = controller.submit().await.unwrap();
        let second = controller.submit().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.verified_source(user_id, "rust").await.as_deref(),
            Some(session.session_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_verified_skill_cannot_be_restarted() {
        let (store, api, user_id) = setup().await;
        store.verify_skill(user_id, "rust", None).await.unwrap();

        let mut controller = SessionController::new(api, Some(user_id));
        let err = controller.start_test("rust").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidSkill(_)));

        controller.refresh_profile().await.unwrap();
        let err = controller.start_test("rust").await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidSkill(_)));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_start_ignores_a_stale_cached_profile() {
        let (store, api, user_id) = setup().await;
        store.verify_skill(user_id, "rust", None).await.unwrap();

        let mut controller = SessionController::new(api, Some(user_id));
        controller.refresh_profile().await.unwrap();
        assert!(controller.profile().unwrap().is_verified("rust"));

        // Unverified behind the controller's back; the cache still says verified.
        store.unverify_skill(user_id, "rust").await.unwrap();

        let session = controller.start_test("rust").await.unwrap();
        assert_eq!(session.skill, "rust");
        assert!(matches!(controller.phase(), Phase::Active { question_index: 0, .. }));
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_answers_for_retry() {
        let (_, inner, user_id) = setup().await;
        let api = FlakyApi {
            inner,
            failures: AtomicUsize::new(1),
        };
        let mut controller = SessionController::new(api, Some(user_id));
        let session = controller.start_test("rust").await.unwrap();
        for id in question_ids(&session) {
            controller.record_answer(id, "A").unwrap();
        }
        controller.advance().await.unwrap();
        controller.advance().await.unwrap();

        let err = controller.submit().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(controller.phase(), Phase::Submitting);
        assert_eq!(controller.answers().unwrap().len(), 3);

        let result = controller.submit().await.unwrap();
        assert!(result.passed);
        assert_eq!(controller.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn test_record_answer_validates_question_and_option() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));

        assert!(matches!(
            controller.record_answer(1, "A"),
            Err(ControllerError::InvalidState { .. })
        ));

        let session = controller.start_test("rust").await.unwrap();
        let id = session.questions[0].id;
        assert!(matches!(
            controller.record_answer(9999, "A"),
            Err(ControllerError::UnknownQuestion(9999))
        ));
        assert!(matches!(
            controller.record_answer(id, "Z"),
            Err(ControllerError::InvalidOption(_))
        ));

        controller.record_answer(id, "B").unwrap();
        controller.record_answer(id, "A").unwrap();
        assert_eq!(controller.answers().unwrap().get(&id).map(String::as_str), Some("A"));
    }

    #[tokio::test]
    async fn test_submit_before_last_question_is_rejected() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));
        controller.start_test("rust").await.unwrap();

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidState { operation: "submit", .. }));
        assert!(matches!(controller.phase(), Phase::Active { question_index: 0, .. }));
    }

    #[tokio::test]
    async fn test_cancel_and_restart_replace_the_test() {
        let (store, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));

        let first = controller.start_test("rust").await.unwrap();
        let stale = controller.current_stamp().unwrap();
        let second = controller.start_test("rust").await.unwrap();
        assert_ne!(first.session_id, second.session_id);
        assert!(matches!(controller.tick_stamped(stale).await, TickOutcome::Ignored));

        controller.cancel();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.current_stamp().is_none());
        assert!(matches!(controller.tick().await, TickOutcome::Ignored));
        assert!(!store.get_profile(user_id).await.unwrap().unwrap().is_verified("rust"));
    }

    #[tokio::test]
    async fn test_signed_out_controller_cannot_start() {
        let (_, api, _) = setup().await;
        let mut controller = SessionController::new(api, None);
        assert!(matches!(
            controller.start_test("rust").await,
            Err(ControllerError::Unauthenticated)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_submits_when_time_runs_out() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id)).with_question_seconds(2);
        let session = controller.start_test("rust").await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        tx.send(Command::Answer {
            question_id: session.questions[0].id,
            option: "A".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        let outcome = controller.drive(rx, Duration::from_secs(1)).await;
        let DriveOutcome::Completed(result) = outcome else {
            panic!("expected the timed-out test to complete");
        };
        assert_eq!((result.correct, result.total), (1, 3));
        assert!(controller.take_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_applies_commands_in_order() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));
        let session = controller.start_test("rust").await.unwrap();

        let (tx, rx) = mpsc::channel(16);
        for (i, id) in question_ids(&session).into_iter().enumerate() {
            tx.send(Command::Answer {
                question_id: id,
                option: "A".to_string(),
            })
            .await
            .unwrap();
            let step = if i < 2 { Command::Next } else { Command::Submit };
            tx.send(step).await.unwrap();
        }

        let outcome = controller.drive(rx, Duration::from_secs(1)).await;
        let DriveOutcome::Completed(result) = outcome else {
            panic!("expected the test to complete");
        };
        assert!(result.passed);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_cancel_stops_the_timer() {
        let (_, api, user_id) = setup().await;
        let mut controller = SessionController::new(api, Some(user_id));
        controller.start_test("rust").await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        tx.send(Command::Cancel).await.unwrap();

        assert_eq!(
            controller.drive(rx, Duration::from_secs(1)).await,
            DriveOutcome::Cancelled
        );
        assert_eq!(controller.phase(), Phase::Idle);
    }
}
