//! Match phase state machine
//!
//! Waiting → Countdown → Live → PostGoal → (kickoff) → Countdown → Live ...

/// Seconds between countdown announcements
pub const COUNTDOWN_STEP: f32 = 1.0;

/// First number announced by a countdown
pub const COUNTDOWN_FROM: u8 = 3;

/// Seconds play stays frozen for scoring after a goal
pub const POST_GOAL_TIME: f32 = 2.0;

/// Text announced when a countdown finishes
pub const KICKOFF_TEXT: &str = "Go!";

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchPhase {
    /// Waiting for the roster to fill
    Waiting,
    /// Counting down, simulation paused
    Countdown {
        /// Number currently on screen
        showing: u8,
        /// Seconds until the next announcement
        until_next: f32,
    },
    /// Play in progress
    Live,
    /// Goal scored, waiting to reset
    PostGoal { remaining: f32 },
}

/// Event that can move the match to another phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseTrigger {
    /// Every expected player has joined
    RosterFull,
    /// Time passed
    Elapsed(f32),
    /// The ball entered a goal mouth
    GoalScored,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEffect {
    /// Broadcast a short text to every player
    Announce(String),
    /// Reset bodies to the kickoff layout
    Kickoff,
}

impl MatchPhase {
    fn countdown() -> (Self, PhaseEffect) {
        (
            Self::Countdown {
                showing: COUNTDOWN_FROM,
                until_next: COUNTDOWN_STEP,
            },
            PhaseEffect::Announce(COUNTDOWN_FROM.to_string()),
        )
    }

    /// The single transition function of the lifecycle.
    ///
    /// Triggers that do not apply to the current phase leave it unchanged.
    pub fn next(self, trigger: PhaseTrigger, effects: &mut Vec<PhaseEffect>) -> Self {
        match (self, trigger) {
            (Self::Waiting, PhaseTrigger::RosterFull) => {
                let (phase, effect) = Self::countdown();
                effects.push(effect);
                phase
            }
            (
                Self::Countdown {
                    showing,
                    until_next,
                },
                PhaseTrigger::Elapsed(dt),
            ) => {
                let until_next = until_next - dt;
                if until_next > 0.0 {
                    return Self::Countdown {
                        showing,
                        until_next,
                    };
                }
                let showing = showing.saturating_sub(1);
                if showing == 0 {
                    effects.push(PhaseEffect::Announce(KICKOFF_TEXT.to_string()));
                    Self::Live
                } else {
                    effects.push(PhaseEffect::Announce(showing.to_string()));
                    Self::Countdown {
                        showing,
                        until_next: until_next + COUNTDOWN_STEP,
                    }
                }
            }
            (Self::Live, PhaseTrigger::GoalScored) => Self::PostGoal {
                remaining: POST_GOAL_TIME,
            },
            (Self::PostGoal { remaining }, PhaseTrigger::Elapsed(dt)) => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    return Self::PostGoal { remaining };
                }
                effects.push(PhaseEffect::Kickoff);
                let (phase, effect) = Self::countdown();
                effects.push(effect);
                phase
            }
            (phase, _) => phase,
        }
    }

    /// Whether bodies move and inputs apply
    pub fn is_simulating(&self) -> bool {
        matches!(self, Self::Live | Self::PostGoal { .. })
    }

    /// Whether a goal can be scored
    pub fn accepts_goals(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Countdown { .. } => "countdown",
            Self::Live => "live",
            Self::PostGoal { .. } => "post_goal",
        }
    }
}
