// Alliance station handling: reuse one authored path from either side of the field

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geometry::{Pose, Rotation, Translation};

/// Which driver station the robot starts from
///
/// Paths are authored for Blue; Red runs them mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    Blue,
    Red,
}

impl Alliance {
    /// Resolve the match assignment once per routine
    ///
    /// An unknown assignment falls back to the authored (Blue) orientation.
    pub fn resolve(reported: Option<Alliance>) -> Alliance {
        match reported {
            Some(alliance) => {
                info!("Planning for {:?} alliance", alliance);
                alliance
            }
            None => {
                warn!("Alliance not reported, planning unmirrored (blue) paths");
                Alliance::Blue
            }
        }
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(self, Alliance::Red)
    }

    pub fn apply_pose(&self, pose: Pose) -> Pose {
        if self.is_mirrored() { mirror(pose) } else { pose }
    }

    pub fn apply_translation(&self, translation: Translation) -> Translation {
        if self.is_mirrored() {
            mirror_translation(translation)
        } else {
            translation
        }
    }

    /// Map a hold-heading target to this alliance
    ///
    /// Heading targets are relative to the gyro zero taken at routine start,
    /// so the mirrored target is simply the negated angle.
    pub fn apply_heading_target(&self, target: Rotation) -> Rotation {
        if self.is_mirrored() { target.inverse() } else { target }
    }
}

/// Reflect across the field's y axis: x' = -x, θ' = -(θ + 180°)
///
/// Applying it twice returns the original pose bit for bit.
pub fn mirror(pose: Pose) -> Pose {
    Pose::new(mirror_translation(pose.translation), mirror_rotation(pose.rotation))
}

pub fn mirror_translation(translation: Translation) -> Translation {
    Translation::new(-translation.x, translation.y)
}

/// -(θ + 180°) has cosine -cos θ and sine sin θ
pub fn mirror_rotation(rotation: Rotation) -> Rotation {
    Rotation::from_unit(-rotation.cos(), rotation.sin())
}
