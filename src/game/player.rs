//! Player actors and the boost state machine

use super::physics::{BodyId, RigidBody};
use super::vector::{angle_lerp, Vec2};

/// Player tuning constants
pub mod tuning {
    pub const RADIUS: f32 = 25.0;
    pub const MASS: f32 = 70.0;
    pub const DRAG: f32 = 0.90;
    pub const HIT_FORCE: f32 = 1.15;
    /// Turn rate in radians per second
    pub const TURN_RATE: f32 = 5.0;
    /// Forward velocity impulse added per tick while driving
    pub const THRUST: f32 = 30.0;

    pub const BOOST_DURATION: f32 = 0.25;
    pub const BOOST_COOLDOWN: f32 = 1.0;
    pub const BOOST_HIT_FORCE: f32 = 1.4;
    pub const BOOST_TURN_RATE: f32 = 3.0;
    pub const BOOST_THRUST: f32 = 350.0;
}

/// Team a player defends for. Team 0 defends the left goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Left,
    Right,
}

impl Team {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Latest control sample received from a client
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    /// Boost / forward-thrust key held
    pub boost: bool,
    /// Continuous drive (mouse button) held
    pub drive: bool,
    /// Orientation the player wants to face
    pub target_angle: f32,
}

/// Boost state with its remaining timer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoostState {
    Ready,
    Active { remaining: f32 },
    Cooldown { remaining: f32 },
}

impl Default for BoostState {
    fn default() -> Self {
        Self::Ready
    }
}

impl BoostState {
    /// The single transition function of the boost machine.
    ///
    /// Timers run down first; a held boost input then fires only from `Ready`.
    pub fn advance(self, dt: f32, boost_held: bool) -> Self {
        let after_timer = match self {
            Self::Ready => Self::Ready,
            Self::Active { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    Self::Cooldown {
                        remaining: tuning::BOOST_COOLDOWN,
                    }
                } else {
                    Self::Active { remaining }
                }
            }
            Self::Cooldown { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    Self::Ready
                } else {
                    Self::Cooldown { remaining }
                }
            }
        };

        match after_timer {
            Self::Ready if boost_held => Self::Active {
                remaining: tuning::BOOST_DURATION,
            },
            other => other,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    fn pick(&self, boosted: f32, base: f32) -> f32 {
        if self.is_active() {
            boosted
        } else {
            base
        }
    }

    pub fn turn_rate(&self) -> f32 {
        self.pick(tuning::BOOST_TURN_RATE, tuning::TURN_RATE)
    }

    pub fn thrust(&self) -> f32 {
        self.pick(tuning::BOOST_THRUST, tuning::THRUST)
    }

    pub fn hit_force(&self) -> f32 {
        self.pick(tuning::BOOST_HIT_FORCE, tuning::HIT_FORCE)
    }
}

/// A connected player's simulated state
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerActor {
    pub team: Team,
    pub body: BodyId,
    /// Facing in radians, normalized to (-π, π]
    pub angle: f32,
    pub input: InputSample,
    pub boost: BoostState,
}

impl PlayerActor {
    pub fn new(team: Team, body: BodyId) -> Self {
        Self {
            team,
            body,
            angle: 0.0,
            input: InputSample::default(),
            boost: BoostState::Ready,
        }
    }

    /// Fresh rigid body for a player
    pub fn spawn_body(position: Vec2) -> RigidBody {
        RigidBody::new(
            position,
            tuning::RADIUS,
            tuning::MASS,
            tuning::DRAG,
            tuning::HIT_FORCE,
        )
    }

    /// Apply one tick of input: boost timers, turning and thrust
    pub fn update(&mut self, body: &mut RigidBody, dt: f32) {
        self.boost = self.boost.advance(dt, self.input.boost);
        body.force = self.boost.hit_force();

        self.angle = angle_lerp(
            self.angle,
            self.input.target_angle,
            self.boost.turn_rate() * dt,
        );

        if self.input.drive || self.boost.is_active() {
            body.velocity += Vec2::from_angle(self.angle) * self.boost.thrust();
        }
    }

    /// Back to the kickoff boost state
    pub fn reset_boost(&mut self, body: &mut RigidBody) {
        self.boost = BoostState::Ready;
        body.force = tuning::HIT_FORCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const DT: f32 = 0.016;

    #[test]
    fn boost_cycle() {
        let mut state = BoostState::Ready;
        assert_eq!(state.advance(DT, false), BoostState::Ready);

        state = state.advance(DT, true);
        assert!(state.is_active());

        // Held input does nothing while active
        let mut elapsed = 0.0;
        while state.is_active() {
            state = state.advance(DT, true);
            elapsed += DT;
            assert!(elapsed < tuning::BOOST_DURATION + DT);
        }
        assert!(matches!(state, BoostState::Cooldown { .. }));
        assert!(elapsed >= tuning::BOOST_DURATION - DT);

        // Cooldown ignores input until it expires
        let mut elapsed = 0.0;
        while matches!(state, BoostState::Cooldown { .. }) {
            state = state.advance(DT, false);
            elapsed += DT;
            assert!(elapsed < tuning::BOOST_COOLDOWN + DT);
        }
        assert_eq!(state, BoostState::Ready);
    }

    #[test]
    fn cooldown_never_jumps_to_active() {
        let state = BoostState::Cooldown { remaining: 0.5 };
        let next = state.advance(DT, true);
        assert!(matches!(next, BoostState::Cooldown { .. }));
    }

    #[test]
    fn active_never_returns_to_ready_directly() {
        let state = BoostState::Active { remaining: 0.01 };
        assert!(matches!(
            state.advance(1.0, true),
            BoostState::Cooldown { .. }
        ));
    }

    #[test]
    fn boost_raises_hit_force_then_reverts() {
        let mut player = PlayerActor::new(Team::Left, BodyId(1));
        let mut body = PlayerActor::spawn_body(Vec2::new(200.0, 350.0));

        player.input.boost = true;
        player.update(&mut body, DT);
        assert_eq!(body.force, tuning::BOOST_HIT_FORCE);

        player.input.boost = false;
        for _ in 0..20 {
            player.update(&mut body, DT);
        }
        assert!(matches!(player.boost, BoostState::Cooldown { .. }));
        assert_eq!(body.force, tuning::HIT_FORCE);
    }

    #[test]
    fn drive_thrusts_along_facing() {
        let mut player = PlayerActor::new(Team::Left, BodyId(1));
        let mut body = PlayerActor::spawn_body(Vec2::ZERO);
        player.input.drive = true;

        player.update(&mut body, DT);

        assert!((body.velocity.x - tuning::THRUST).abs() < 1e-4);
        assert!(body.velocity.y.abs() < 1e-4);
    }

    #[test]
    fn idle_player_does_not_move() {
        let mut player = PlayerActor::new(Team::Right, BodyId(2));
        let mut body = PlayerActor::spawn_body(Vec2::ZERO);
        player.update(&mut body, DT);
        assert!(body.velocity.is_zero());
    }

    #[test]
    fn turning_eases_towards_target() {
        let mut player = PlayerActor::new(Team::Left, BodyId(1));
        let mut body = PlayerActor::spawn_body(Vec2::ZERO);
        player.input.target_angle = PI / 2.0;

        player.update(&mut body, DT);

        let expected = (PI / 2.0) * tuning::TURN_RATE * DT;
        assert!((player.angle - expected).abs() < 1e-4);
    }

    #[test]
    fn team_index_round_trip() {
        assert_eq!(Team::from_index(0), Some(Team::Left));
        assert_eq!(Team::from_index(1), Some(Team::Right));
        assert_eq!(Team::from_index(2), None);
        assert_eq!(Team::Left.opponent(), Team::Right);
        assert_eq!(Team::Right.index(), 1);
    }
}
