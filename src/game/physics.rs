//! Rigid bodies and collision resolution

use serde::Serialize;

use super::vector::{reflection_angle, Rect, Vec2};

/// Number of fixed pairwise resolution passes per physics step
pub const SOLVER_ITERATIONS: usize = 3;

/// Physics steps during which a resolved pair gets no second velocity impulse
pub const PAIR_COOLDOWN_STEPS: u32 = 5;

/// Fallback separation axis for bodies sitting exactly on top of each other
const COINCIDENT_AXIS: Vec2 = Vec2::new(1.0, 0.0);

/// Stable identifier of a body within a match (index into the body list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BodyId(pub usize);

/// Point-mass circle simulated by the collision system
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub mass: f32,
    /// Velocity multiplier applied once per step, in (0, 1]
    pub drag: f32,
    /// Scales the impulse this body imparts on others
    pub force: f32,
}

impl RigidBody {
    pub fn new(position: Vec2, radius: f32, mass: f32, drag: f32, force: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            mass,
            drag,
            force,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }
}

/// Unordered body pair, stored with the lower id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyPair {
    low: BodyId,
    high: BodyId,
}

impl BodyPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CooldownEntry {
    pair: BodyPair,
    remaining: u32,
}

/// Pairs that recently exchanged an impulse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionCooldowns {
    entries: Vec<CooldownEntry>,
}

impl CollisionCooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pair: BodyPair) -> bool {
        self.entries.iter().any(|e| e.pair == pair)
    }

    /// Start a cooldown for `pair`. Returns false if one is already live.
    pub fn insert(&mut self, pair: BodyPair) -> bool {
        if self.contains(pair) {
            return false;
        }
        self.entries.push(CooldownEntry {
            pair,
            remaining: PAIR_COOLDOWN_STEPS,
        });
        true
    }

    /// Drop expired entries and count the rest down by one step
    pub fn compact(&mut self) {
        self.entries.retain_mut(|e| {
            if e.remaining == 0 {
                return false;
            }
            e.remaining -= 1;
            true
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Collision system for the circle bodies of a match
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance every body by `dt` seconds and resolve contacts.
    ///
    /// Drag is applied once per call regardless of `dt`.
    pub fn step(
        bodies: &mut [RigidBody],
        colliders: &[Rect],
        cooldowns: &mut CollisionCooldowns,
        dt: f32,
    ) {
        for body in bodies.iter_mut() {
            body.position += body.velocity * dt;
            body.velocity *= body.drag;
        }

        cooldowns.compact();

        for _ in 0..SOLVER_ITERATIONS {
            for i in 0..bodies.len() {
                for j in (i + 1)..bodies.len() {
                    let (head, tail) = bodies.split_at_mut(j);
                    Self::resolve_pair(
                        BodyId(i),
                        &mut head[i],
                        BodyId(j),
                        &mut tail[0],
                        cooldowns,
                    );
                }
            }
        }

        for body in bodies.iter_mut() {
            for rect in colliders {
                Self::bounce_off_rect(body, rect);
            }
        }
    }

    /// Separate two overlapping circles and, outside cooldown, hand off momentum.
    ///
    /// Positional correction is split evenly. The impulse is an arcade
    /// approximation: each body is pushed along the contact normal by the other
    /// body's speed, weighted by the other's mass share and force multiplier.
    /// Returns true if the circles overlapped.
    pub fn resolve_pair(
        id_a: BodyId,
        a: &mut RigidBody,
        id_b: BodyId,
        b: &mut RigidBody,
        cooldowns: &mut CollisionCooldowns,
    ) -> bool {
        // Heavier body is primary, lower id breaks ties
        let a_primary = a.mass > b.mass || (a.mass == b.mass && id_a <= id_b);
        let (first, second) = if a_primary { (a, b) } else { (b, a) };

        let dist = first.position.distance(second.position);
        let wanted = first.radius + second.radius;
        if dist >= wanted {
            return false;
        }

        // Points from second towards first
        let normal = (first.position - second.position)
            .normalized()
            .unwrap_or(COINCIDENT_AXIS);
        let overlap = wanted - dist;
        first.position += normal * (overlap * 0.5);
        second.position -= normal * (overlap * 0.5);

        if cooldowns.insert(BodyPair::new(id_a, id_b)) {
            let total = first.mass + second.mass;
            let first_share = first.mass / total;
            let second_share = second.mass / total;

            let to_first = normal * (second.speed() * second_share * second.force);
            let to_second = -normal * (first.speed() * first_share * first.force);

            first.velocity += to_first;
            second.velocity += to_second;
        }

        true
    }

    /// Push a body out of a rectangle and reflect its velocity at the same speed.
    /// Returns the positional correction that was applied.
    pub fn bounce_off_rect(body: &mut RigidBody, rect: &Rect) -> Vec2 {
        let correction = circle_rect_penetration(body.position, body.radius, rect);
        if correction.is_zero() {
            return correction;
        }

        body.position += correction;

        let speed = body.speed();
        let angle = reflection_angle(body.velocity.angle(), correction.angle());
        body.velocity = Vec2::from_angle(angle) * speed;

        correction
    }
}

/// Correction that pushes a circle off the corners and edges of a rectangle.
///
/// Corners are treated as point obstacles first; edge overlap is then measured
/// from the corner-corrected centre and the two corrections are summed. A zero
/// vector means no contact.
pub fn circle_rect_penetration(center: Vec2, radius: f32, rect: &Rect) -> Vec2 {
    let corner = corner_penetration(center, radius, rect);
    corner + edge_penetration(center + corner, radius, rect)
}

fn corner_penetration(center: Vec2, radius: f32, rect: &Rect) -> Vec2 {
    for corner in rect.corners() {
        if center.distance(corner) < radius {
            let toward = (corner - center).normalized().unwrap_or(COINCIDENT_AXIS);
            let rim = center + toward * radius;
            return corner - rim;
        }
    }
    Vec2::ZERO
}

fn edge_penetration(center: Vec2, radius: f32, rect: &Rect) -> Vec2 {
    if center.x >= rect.left() && center.x <= rect.right() {
        if (center.y - rect.top()).abs() < radius {
            return Vec2::new(0.0, rect.top() - radius - center.y);
        }
        if (center.y - rect.bottom()).abs() < radius {
            return Vec2::new(0.0, rect.bottom() + radius - center.y);
        }
    }

    if center.y >= rect.top() && center.y <= rect.bottom() {
        if (center.x - rect.left()).abs() < radius {
            return Vec2::new(rect.left() - radius - center.x, 0.0);
        }
        if (center.x - rect.right()).abs() < radius {
            return Vec2::new(rect.right() + radius - center.x, 0.0);
        }
    }

    Vec2::ZERO
}
