// Planar geometry: translations, rotations and poses
//
// Frame convention: x forward, y left, angles counter-clockwise positive.
// Angles cross the wire in degrees; internally a rotation is a unit (cos, sin) pair.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// Below this magnitude a vector has no meaningful direction
const DIRECTION_EPSILON: f64 = 1e-9;

/// A 2-D vector in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation {
    pub x: f64,
    pub y: f64,
}

impl Translation {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector of length `distance` pointing along `angle`
    pub fn from_polar(distance: f64, angle: Rotation) -> Self {
        Self::new(distance * angle.cos(), distance * angle.sin())
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: &Translation) -> f64 {
        (*other - *self).norm()
    }

    /// Rotate counter-clockwise about the origin
    pub fn rotate_by(&self, rotation: Rotation) -> Self {
        Self::new(
            self.x * rotation.cos() - self.y * rotation.sin(),
            self.x * rotation.sin() + self.y * rotation.cos(),
        )
    }

    /// Direction of this vector (identity for a zero vector)
    pub fn angle(&self) -> Rotation {
        Rotation::from_vector(self.x, self.y)
    }

    pub fn lerp(&self, end: &Translation, t: f64) -> Self {
        *self + (*end - *self) * t
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Translation {
    type Output = Translation;
    fn add(self, rhs: Translation) -> Translation {
        Translation::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Translation {
    fn add_assign(&mut self, rhs: Translation) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Translation {
    type Output = Translation;
    fn sub(self, rhs: Translation) -> Translation {
        Translation::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Translation {
    type Output = Translation;
    fn neg(self) -> Translation {
        Translation::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Translation {
    type Output = Translation;
    fn mul(self, rhs: f64) -> Translation {
        Translation::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Translation {
    type Output = Translation;
    fn div(self, rhs: f64) -> Translation {
        Translation::new(self.x / rhs, self.y / rhs)
    }
}

/// A planar heading stored as a unit (cos, sin) pair
///
/// Keeping the pair instead of a raw angle means there is no wrap ambiguity:
/// 359° and -1° are the same value. Serialized as degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Degrees", into = "Degrees")]
pub struct Rotation {
    cos: f64,
    sin: f64,
}

// Wire representation of a rotation
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct Degrees(f64);

impl From<Degrees> for Rotation {
    fn from(value: Degrees) -> Self {
        Rotation::from_degrees(value.0)
    }
}

impl From<Rotation> for Degrees {
    fn from(value: Rotation) -> Self {
        Degrees(value.degrees())
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    pub const IDENTITY: Rotation = Rotation { cos: 1.0, sin: 0.0 };

    pub fn from_radians(radians: f64) -> Self {
        Self {
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    /// Direction of the vector (x, y); identity when the vector has no length
    pub fn from_vector(x: f64, y: f64) -> Self {
        let magnitude = x.hypot(y);
        if magnitude > DIRECTION_EPSILON {
            Self {
                cos: x / magnitude,
                sin: y / magnitude,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Build directly from a (cos, sin) pair that is already normalized
    pub(crate) const fn from_unit(cos: f64, sin: f64) -> Self {
        Self { cos, sin }
    }

    /// Angle in (-π, π]
    pub fn radians(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    pub fn degrees(&self) -> f64 {
        self.radians().to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.cos
    }

    pub fn sin(&self) -> f64 {
        self.sin
    }

    /// Compose two rotations (angle addition)
    pub fn rotate_by(&self, other: Rotation) -> Self {
        Self {
            cos: self.cos * other.cos - self.sin * other.sin,
            sin: self.cos * other.sin + self.sin * other.cos,
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            cos: self.cos,
            sin: -self.sin,
        }
    }

    /// Signed shortest angle (radians, in [-π, π]) that takes `self` to `target`
    ///
    /// 359° → 1° is +2°, not -358°.
    pub fn shortest_distance(&self, target: Rotation) -> f64 {
        target.rotate_by(self.inverse()).radians()
    }

    /// Interpolate along the shorter arc
    pub fn interpolate(&self, end: Rotation, t: f64) -> Self {
        self.rotate_by(Rotation::from_radians(self.shortest_distance(end) * t))
    }

    pub fn is_finite(&self) -> bool {
        self.cos.is_finite() && self.sin.is_finite()
    }
}

impl Add for Rotation {
    type Output = Rotation;
    fn add(self, rhs: Rotation) -> Rotation {
        self.rotate_by(rhs)
    }
}

impl Sub for Rotation {
    type Output = Rotation;
    fn sub(self, rhs: Rotation) -> Rotation {
        self.rotate_by(rhs.inverse())
    }
}

impl Neg for Rotation {
    type Output = Rotation;
    fn neg(self) -> Rotation {
        self.inverse()
    }
}

/// Robot position and heading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub translation: Translation,
    pub rotation: Rotation,
}

impl Pose {
    pub const fn new(translation: Translation, rotation: Rotation) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Convenience constructor with the heading in degrees
    pub fn from_xy_degrees(x: f64, y: f64, heading_deg: f64) -> Self {
        Self::new(Translation::new(x, y), Rotation::from_degrees(heading_deg))
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Apply `relative` expressed in this pose's frame
    pub fn transform_by(&self, relative: Pose) -> Pose {
        Pose::new(
            self.translation + relative.translation.rotate_by(self.rotation),
            self.rotation + relative.rotation,
        )
    }

    /// Express this pose in the frame of `origin`
    pub fn relative_to(&self, origin: Pose) -> Pose {
        Pose::new(
            (self.translation - origin.translation).rotate_by(origin.rotation.inverse()),
            self.rotation - origin.rotation,
        )
    }

    pub fn interpolate(&self, end: &Pose, t: f64) -> Pose {
        Pose::new(
            self.translation.lerp(&end.translation, t),
            self.rotation.interpolate(end.rotation, t),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite()
    }
}
