use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::{Arc, Weak};
use std::time::Duration;

use self::definition::{Answer, Question};
use self::settings::Settings;
use crate::error::{QuizError, QuizResult};
use crate::game::event::{EndReason, Event, EventKind, QuizSummary};
use crate::game::timer::Timer;
use crate::game::user::UserHandle;
use crate::observer::{Observer, ObserverHandle, Source, Subject};

pub mod definition;
pub mod settings;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    Running,
    Ended,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points_earned: u32,
    pub correct_answer: Answer,
    pub explanation: Option<String>,
    pub score: u32,
    pub finished: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub phase: Phase,
    pub answered: usize,
    pub total_questions: usize,
    pub score: u32,
    pub remaining: Duration,
}

struct Session {
    id: u64,
    phase: Phase,
    questions: Vec<Question>,
    cursor: usize,
    score: u32,
    user: Option<UserHandle>,
    timer: Option<Arc<Timer>>,
    timer_link: Option<ObserverHandle>,
    summary: Option<QuizSummary>,
}

impl Session {
    fn new() -> Self {
        Session {
            id: 0,
            phase: Phase::Idle,
            questions: Vec::new(),
            cursor: 0,
            score: 0,
            user: None,
            timer: None,
            timer_link: None,
            summary: None,
        }
    }
}

/// Everything needed to finish a running → ended transition once the session
/// lock has been released.
struct Ending {
    session_id: u64,
    reason: EndReason,
    timer: Option<Arc<Timer>>,
    user: Option<UserHandle>,
    final_score: u32,
    answered: usize,
    total_questions: usize,
}

/// Subscription of one session to its timer. Events from a timer that has
/// since been handed to a newer session are ignored.
struct TimerLink {
    manager: Weak<QuizManager>,
    session_id: u64,
}

impl Observer for TimerLink {
    fn receive(&self, _source: Source, event: &Event) -> Result<()> {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_timer_event(self.session_id, event);
        }
        Ok(())
    }
}

pub struct QuizManager {
    me: Weak<QuizManager>,
    settings: Settings,
    session: Mutex<Session>,
    publisher: Subject,
}

impl QuizManager {
    pub fn new(settings: Settings) -> Arc<QuizManager> {
        Arc::new_cyclic(|me| QuizManager {
            me: me.clone(),
            settings,
            session: Mutex::new(Session::new()),
            publisher: Subject::new(Source::Quiz),
        })
    }

    pub fn with_questions(settings: Settings, questions: Vec<Question>) -> QuizResult<Arc<QuizManager>> {
        let manager = QuizManager::new(settings);
        manager.load_questions(questions)?;
        Ok(manager)
    }

    pub fn attach(&self, observer: ObserverHandle) {
        self.publisher.attach(observer);
    }

    pub fn detach(&self, observer: &ObserverHandle) {
        self.publisher.detach(observer);
    }

    pub fn load_questions(&self, mut questions: Vec<Question>) -> QuizResult<()> {
        if questions.is_empty() {
            return Err(QuizError::configuration("Questions list cannot be empty"));
        }
        if self.settings.shuffle_questions {
            questions.shuffle(&mut rand::thread_rng());
        }

        let mut session = self.session.lock();
        if session.phase == Phase::Running {
            return Err(QuizError::invalid_state(
                "Cannot load questions while a quiz is running",
            ));
        }
        info!("Loaded {} questions", questions.len());
        session.questions = questions;
        session.cursor = 0;
        Ok(())
    }

    pub fn start_quiz(&self, user: UserHandle, duration: Option<Duration>) -> QuizResult<()> {
        let duration = duration.unwrap_or(self.settings.quiz_duration);
        if duration == Duration::default() {
            return Err(QuizError::configuration("Quiz duration must be positive"));
        }

        let (session_id, total_questions, previous_timer, previous_link) = {
            let mut session = self.session.lock();
            if session.phase == Phase::Running {
                warn!("Refusing to start a quiz while another one is running");
                return Err(QuizError::invalid_state(
                    "A quiz is already running, end it before starting another",
                ));
            }
            if session.questions.is_empty() {
                return Err(QuizError::configuration("No questions loaded"));
            }
            session.id += 1;
            session.phase = Phase::Running;
            session.cursor = 0;
            session.score = 0;
            session.summary = None;
            session.user = Some(user.clone());
            (
                session.id,
                session.questions.len(),
                session.timer.take(),
                session.timer_link.take(),
            )
        };

        user.write().start_new_quiz();

        // The previous session's timer is reused once it has been reset.
        let timer = match previous_timer {
            Some(timer) => {
                if let Some(link) = previous_link {
                    timer.detach(&link);
                }
                timer.reset(Some(duration)).map(|_| timer)
            }
            None => Timer::with_intervals(
                duration,
                self.settings.tick_interval,
                self.settings.stop_grace,
            )
            .map(Arc::new),
        };
        let timer = match timer {
            Ok(timer) => timer,
            Err(e) => {
                self.abandon_start(session_id);
                return Err(e);
            }
        };

        let link: ObserverHandle = Arc::new(TimerLink {
            manager: self.me.clone(),
            session_id,
        });
        timer.attach(link.clone());
        {
            let mut session = self.session.lock();
            session.timer = Some(timer.clone());
            session.timer_link = Some(link);
        }

        if let Err(e) = timer.start() {
            self.abandon_start(session_id);
            return Err(e);
        }

        info!(
            "Quiz started for {} with {} questions and {:?} on the clock",
            user.read().get_name(),
            total_questions,
            duration
        );
        Ok(())
    }

    fn abandon_start(&self, session_id: u64) {
        let mut session = self.session.lock();
        if session.id == session_id && session.phase == Phase::Running {
            session.phase = Phase::Idle;
            session.user = None;
        }
    }

    pub fn submit_answer(&self, answer: &Answer) -> QuizResult<AnswerOutcome> {
        let (outcome, answered, total, ending) = {
            let mut session = self.session.lock();
            if session.phase != Phase::Running {
                return Err(QuizError::invalid_state("No quiz is running"));
            }

            let time_is_up = session
                .timer
                .as_ref()
                .map(|timer| timer.is_time_up())
                .unwrap_or(false);
            if time_is_up {
                let ending = self.close(&mut session, EndReason::TimeExpired);
                drop(session);
                self.publish(EventKind::Expired);
                self.complete(ending);
                return Err(QuizError::TimeUp);
            }

            let index = session.cursor;
            let question = match session.questions.get(index) {
                Some(question) => question,
                None => return Err(QuizError::invalid_state("No current question")),
            };
            if !question.accepts(answer) {
                return Err(QuizError::AnswerShape {
                    expected: question.shape(),
                    given: answer.shape(),
                });
            }

            let correct = question.is_answer_correct(answer);
            let points_earned = if correct { question.points() } else { 0 };
            let correct_answer = question.correct_answer();
            let explanation = question.explanation().map(str::to_owned);

            session.score += points_earned;
            session.cursor += 1;
            if let Some(user) = &session.user {
                user.write().add_points(points_earned);
            }

            let total = session.questions.len();
            let finished = session.cursor >= total;
            let ending = if finished {
                Some(self.close(&mut session, EndReason::Completed))
            } else {
                None
            };
            let outcome = AnswerOutcome {
                correct,
                points_earned,
                correct_answer,
                explanation,
                score: session.score,
                finished,
            };
            (outcome, session.cursor, total, ending)
        };

        debug!(
            "Answer {}/{} was {}, score is {}",
            answered,
            total,
            if outcome.correct { "correct" } else { "incorrect" },
            outcome.score
        );
        self.publish(EventKind::ScoreChanged {
            score: outcome.score,
            delta: outcome.points_earned,
        });
        self.publish(EventKind::QuestionAdvanced {
            index: answered,
            total,
        });
        if let Some(ending) = ending {
            self.complete(ending);
        }
        Ok(outcome)
    }

    /// Ends the running quiz. Only the call that performs the transition gets
    /// a summary back, later calls are no-ops.
    pub fn end_quiz(&self) -> Option<QuizSummary> {
        let ending = {
            let mut session = self.session.lock();
            if session.phase != Phase::Running {
                debug!("Quiz already ended");
                return None;
            }
            self.close(&mut session, EndReason::Aborted)
        };
        Some(self.complete(ending))
    }

    pub fn pause(&self) -> QuizResult<()> {
        if !self.running_timer()?.pause() {
            return Err(QuizError::invalid_state("Quiz is already paused"));
        }
        Ok(())
    }

    pub fn resume(&self) -> QuizResult<()> {
        if !self.running_timer()?.resume() {
            return Err(QuizError::invalid_state("Quiz is not paused"));
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.session.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Running
    }

    pub fn current_question(&self) -> Option<Question> {
        let session = self.session.lock();
        match session.phase {
            Phase::Running => session.questions.get(session.cursor).cloned(),
            _ => None,
        }
    }

    pub fn progress(&self) -> Progress {
        let session = self.session.lock();
        let remaining = match session.phase {
            Phase::Running => session
                .timer
                .as_ref()
                .map(|timer| timer.remaining_time())
                .unwrap_or_default(),
            _ => Duration::default(),
        };
        Progress {
            phase: session.phase,
            answered: session.cursor,
            total_questions: session.questions.len(),
            score: session.score,
            remaining,
        }
    }

    #[cfg(test)]
    pub fn summary(&self) -> Option<QuizSummary> {
        self.session.lock().summary.clone()
    }

    #[cfg(test)]
    pub fn timer(&self) -> Option<Arc<Timer>> {
        self.session.lock().timer.clone()
    }

    fn running_timer(&self) -> QuizResult<Arc<Timer>> {
        let session = self.session.lock();
        if session.phase != Phase::Running {
            return Err(QuizError::invalid_state("No quiz is running"));
        }
        session
            .timer
            .clone()
            .ok_or_else(|| QuizError::invalid_state("Quiz has no timer"))
    }

    fn on_timer_event(&self, session_id: u64, event: &Event) {
        match &event.kind {
            EventKind::Tick { remaining, expired } => {
                let running = {
                    let session = self.session.lock();
                    session.id == session_id && session.phase == Phase::Running
                };
                if running {
                    self.publish(EventKind::Tick {
                        remaining: *remaining,
                        expired: *expired,
                    });
                }
            }
            EventKind::Expired => {
                let ending = {
                    let mut session = self.session.lock();
                    if session.id != session_id || session.phase != Phase::Running {
                        return;
                    }
                    self.close(&mut session, EndReason::TimeExpired)
                };
                info!("Time is up, ending quiz");
                self.publish(EventKind::Expired);
                self.complete(ending);
            }
            _ => (),
        }
    }

    /// The single running → ended transition. Callers must hold the session
    /// lock and must pass the result to `complete` once it is released.
    fn close(&self, session: &mut Session, reason: EndReason) -> Ending {
        session.phase = Phase::Ended;
        Ending {
            session_id: session.id,
            reason,
            timer: session.timer.clone(),
            user: session.user.clone(),
            final_score: session.score,
            answered: session.cursor,
            total_questions: session.questions.len(),
        }
    }

    fn complete(&self, ending: Ending) -> QuizSummary {
        let elapsed = match &ending.timer {
            Some(timer) => {
                timer.stop();
                timer.elapsed_time()
            }
            None => Duration::default(),
        };

        let user_name = match &ending.user {
            Some(user) => {
                let mut user = user.write();
                user.complete_quiz();
                user.get_name().to_owned()
            }
            None => "Unknown".to_owned(),
        };

        let summary = QuizSummary {
            user_name,
            final_score: ending.final_score,
            answered: ending.answered,
            total_questions: ending.total_questions,
            elapsed,
            reason: ending.reason,
        };
        {
            let mut session = self.session.lock();
            if session.id == ending.session_id {
                session.summary = Some(summary.clone());
            }
        }

        info!(
            "Quiz ended ({:?}) with {} points, {}/{} questions answered",
            summary.reason, summary.final_score, summary.answered, summary.total_questions
        );
        self.publish(EventKind::QuizCompleted(summary.clone()));
        summary
    }

    fn publish(&self, kind: EventKind) {
        self.publisher.notify(&Event::new(kind));
    }
}
