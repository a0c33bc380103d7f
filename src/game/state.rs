//! Match state and the per-tick simulation
//!
//! Everything here is owned and mutated by the match task only.

use std::f32::consts::PI;

use tracing::{debug, info};

use crate::util::time::accept_tick_delta;
use crate::ws::protocol::{ClientCommand, ServerMsg};

use super::lifecycle::{MatchPhase, PhaseEffect, PhaseTrigger};
use super::physics::{circle_rect_penetration, BodyId, CollisionCooldowns, PhysicsSystem, RigidBody};
use super::player::{PlayerActor, Team};
use super::snapshot;
use super::vector::{Rect, Vec2};

/// Ball body is always the first body
pub const BALL: BodyId = BodyId(0);

/// Ball tuning constants
pub mod ball {
    pub const RADIUS: f32 = 15.0;
    pub const MASS: f32 = 10.0;
    pub const DRAG: f32 = 0.98;
    pub const FORCE: f32 = 1.0;
}

/// Static field geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    /// Walls and goal surrounds
    pub colliders: Vec<Rect>,
    /// Goal mouths used for scoring only. Index = team that defends it.
    pub goals: [Rect; 2],
}

impl Arena {
    pub const WIDTH: f32 = 1000.0;
    pub const HEIGHT: f32 = 700.0;
    pub const GOAL_DEPTH: f32 = 60.0;
    pub const GOAL_GAP: f32 = 200.0;
    pub const WALL_THICKNESS: f32 = 200.0;
    /// Goal mouths are this much shallower than the goal, so the ball is seen
    /// entering the net before it counts
    pub const GOAL_MOUTH_INSET: f32 = 25.0;
    /// Kickoff distance from each end of the field
    pub const KICKOFF_OFFSET: f32 = 200.0;
    /// Vertical distance between teammates at kickoff
    pub const KICKOFF_SPACING: f32 = 80.0;

    pub fn standard() -> Self {
        let (w, h) = (Self::WIDTH, Self::HEIGHT);
        let depth = Self::GOAL_DEPTH;
        let gap = Self::GOAL_GAP;
        let wall = Self::WALL_THICKNESS;
        let post_height = (h - gap) / 2.0;
        let mouth_depth = depth - Self::GOAL_MOUTH_INSET;

        Self {
            width: w,
            height: h,
            colliders: vec![
                // Goal surrounds
                Rect::new(0.0, 0.0, depth, post_height),
                Rect::new(0.0, post_height + gap, depth, post_height),
                Rect::new(w - depth, 0.0, depth, post_height),
                Rect::new(w - depth, post_height + gap, depth, post_height),
                // Field walls
                Rect::new(0.0, -wall, w, wall),
                Rect::new(0.0, h, w, wall),
                Rect::new(-wall, 0.0, wall, h),
                Rect::new(w, 0.0, wall, h),
            ],
            goals: [
                Rect::new(0.0, post_height, mouth_depth, gap),
                Rect::new(w - mouth_depth, post_height, mouth_depth, gap),
            ],
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Kickoff spot and facing for the `nth` (1-based) player of a team
    pub fn kickoff_spot(&self, team: Team, nth: usize, per_team: usize) -> (Vec2, f32) {
        let (x, angle) = match team {
            Team::Left => (Self::KICKOFF_OFFSET, 0.0),
            Team::Right => (self.width - Self::KICKOFF_OFFSET, PI),
        };
        let y = self.height / 2.0 + nth as f32 * Self::KICKOFF_SPACING
            - per_team as f32 * Self::KICKOFF_SPACING / 2.0;
        (Vec2::new(x, y), angle)
    }
}

/// Authoritative state of one match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub arena: Arena,
    /// Roster size fixed when the match was created
    pub total_players: usize,
    /// Index = player id for the match
    pub players: Vec<PlayerActor>,
    /// Ball first, then one body per player in roster order
    pub bodies: Vec<RigidBody>,
    pub cooldowns: CollisionCooldowns,
    /// Goals scored by team 0 and team 1
    pub score: [u32; 2],
    pub phase: MatchPhase,
    pub tick: u64,
}

impl MatchState {
    pub fn new(total_players: usize) -> Self {
        let arena = Arena::standard();
        let ball = RigidBody::new(
            arena.center(),
            ball::RADIUS,
            ball::MASS,
            ball::DRAG,
            ball::FORCE,
        );
        Self {
            arena,
            total_players,
            players: Vec::with_capacity(total_players),
            bodies: vec![ball],
            cooldowns: CollisionCooldowns::new(),
            score: [0, 0],
            phase: MatchPhase::Waiting,
            tick: 0,
        }
    }

    pub fn ball(&self) -> &RigidBody {
        &self.bodies[BALL.0]
    }

    pub fn ball_mut(&mut self) -> &mut RigidBody {
        &mut self.bodies[BALL.0]
    }

    pub fn body(&self, player: usize) -> &RigidBody {
        &self.bodies[self.players[player].body.0]
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.total_players
    }

    /// Add a player, lay the roster out and return its index.
    ///
    /// Starts the countdown once the roster is full.
    pub fn add_player(&mut self, team: Team, effects: &mut Vec<PhaseEffect>) -> usize {
        let body = BodyId(self.bodies.len());
        self.bodies.push(PlayerActor::spawn_body(self.arena.center()));
        self.players.push(PlayerActor::new(team, body));
        self.layout_players();

        if self.is_full() {
            self.phase = self.phase.next(PhaseTrigger::RosterFull, effects);
        }
        self.players.len() - 1
    }

    /// Place players at their kickoff spots, mirrored by team
    pub fn layout_players(&mut self) {
        let per_team = self.total_players / 2;
        let mut seen = [0usize; 2];
        for player in &mut self.players {
            seen[player.team.index()] += 1;
            let (position, angle) =
                self.arena
                    .kickoff_spot(player.team, seen[player.team.index()], per_team);
            let body = &mut self.bodies[player.body.0];
            body.position = position;
            body.velocity = Vec2::ZERO;
            player.angle = angle;
        }
    }

    /// Ball to the centre spot, players to kickoff, boosts ready
    pub fn reset_kickoff(&mut self) {
        let center = self.arena.center();
        let ball = self.ball_mut();
        ball.position = center;
        ball.velocity = Vec2::ZERO;

        self.layout_players();
        for player in &mut self.players {
            player.reset_boost(&mut self.bodies[player.body.0]);
        }
        self.cooldowns.clear();
    }

    /// Apply a client command to a player's input sample
    pub fn apply_command(&mut self, player: usize, command: ClientCommand) {
        let Some(actor) = self.players.get_mut(player) else {
            debug!(player, "Command for unknown player");
            return;
        };
        match command {
            ClientCommand::Boost(held) => actor.input.boost = held,
            ClientCommand::Drive(held) => actor.input.drive = held,
            ClientCommand::Aim(angle) => actor.input.target_angle = angle,
        }
    }

    /// Team whose goal the ball is in, if any
    pub fn goal_hit(&self) -> Option<Team> {
        let ball = self.ball();
        self.arena.goals.iter().enumerate().find_map(|(index, goal)| {
            let touching = !circle_rect_penetration(ball.position, ball.radius, goal).is_zero()
                || goal.contains(ball.position);
            if touching {
                Team::from_index(index as u8)
            } else {
                None
            }
        })
    }

    /// Advance the match by `dt` seconds.
    ///
    /// Returns the messages to broadcast to every player, in order. A `dt`
    /// outside the accepted range leaves the state untouched.
    pub fn advance(&mut self, dt: f32) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        if !accept_tick_delta(dt) {
            debug!(dt, "Rejected tick delta");
            return out;
        }

        if !self.phase.is_simulating() {
            let mut effects = Vec::new();
            self.phase = self.phase.next(PhaseTrigger::Elapsed(dt), &mut effects);
            self.apply_effects(effects, &mut out);
            return out;
        }

        self.tick += 1;

        // Post-goal timer
        if let MatchPhase::PostGoal { .. } = self.phase {
            let mut effects = Vec::new();
            self.phase = self.phase.next(PhaseTrigger::Elapsed(dt), &mut effects);
            if !self.phase.is_simulating() {
                self.apply_effects(effects, &mut out);
                return out;
            }
        }

        // Player input
        for player in &mut self.players {
            player.update(&mut self.bodies[player.body.0], dt);
        }

        // Goal check
        if self.phase.accepts_goals() {
            if let Some(defending) = self.goal_hit() {
                self.score_goal(defending.opponent(), &mut out);
            }
        }

        PhysicsSystem::step(
            &mut self.bodies,
            &self.arena.colliders,
            &mut self.cooldowns,
            dt,
        );

        out.push(snapshot::tick(self));
        out
    }

    fn score_goal(&mut self, scorer: Team, out: &mut Vec<ServerMsg>) {
        self.score[scorer.index()] += 1;
        let mut effects = Vec::new();
        self.phase = self.phase.next(PhaseTrigger::GoalScored, &mut effects);
        info!(
            scorer = scorer.index(),
            score = %self.score_line(),
            "Goal"
        );
        out.push(ServerMsg::text(self.score_line()));
        self.apply_effects(effects, out);
    }

    pub fn score_line(&self) -> String {
        format!("{}:{}", self.score[0], self.score[1])
    }

    fn apply_effects(&mut self, effects: Vec<PhaseEffect>, out: &mut Vec<ServerMsg>) {
        for effect in effects {
            match effect {
                PhaseEffect::Announce(text) => out.push(ServerMsg::text(text)),
                PhaseEffect::Kickoff => {
                    self.reset_kickoff();
                    out.push(snapshot::tick(self));
                }
            }
        }
    }

    /// Effects produced outside `advance` (joins) turned into messages
    pub fn effects_to_messages(&mut self, effects: Vec<PhaseEffect>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        self.apply_effects(effects, &mut out);
        out
    }
}
