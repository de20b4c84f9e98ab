// Actuation boundary: maps core wheel order onto hardware module slots
//
// The kinematics math is index-neutral (FL, FR, BL, BR). How those wheels are
// wired to the module controllers is a property of the robot, so it lives here
// as an explicit table instead of being reshuffled inline.

use tracing::debug;

use super::kinematics::{WHEEL_COUNT, WHEEL_NAMES, WheelState};
use crate::error::{Result, SwerveError};
use crate::messages::WheelSetpoints;

/// Dispatch table of the competition chassis: the front pair and back pair are swapped
pub const DEFAULT_DISPATCH_ORDER: [usize; WHEEL_COUNT] = [1, 0, 3, 2];

/// Hardware slot `i` is driven by core wheel `order[i]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleMapping {
    order: [usize; WHEEL_COUNT],
}

impl Default for ModuleMapping {
    fn default() -> Self {
        Self {
            order: DEFAULT_DISPATCH_ORDER,
        }
    }
}

impl ModuleMapping {
    /// Create a mapping; `order` must be a permutation of 0..4
    pub fn new(order: [usize; WHEEL_COUNT]) -> Result<Self> {
        let mut seen = [false; WHEEL_COUNT];
        for &index in &order {
            if index >= WHEEL_COUNT || seen[index] {
                return Err(SwerveError::Config(format!(
                    "dispatch order {:?} is not a permutation of 0..{}",
                    order, WHEEL_COUNT
                )));
            }
            seen[index] = true;
        }
        Ok(Self { order })
    }

    /// Identity mapping (hardware slots match core order)
    pub fn identity() -> Self {
        Self { order: [0, 1, 2, 3] }
    }

    pub fn order(&self) -> [usize; WHEEL_COUNT] {
        self.order
    }

    /// Reorder core-indexed values into hardware slots
    pub fn to_hardware<T: Copy>(&self, values: &[T; WHEEL_COUNT]) -> [T; WHEEL_COUNT] {
        std::array::from_fn(|slot| values[self.order[slot]])
    }

    /// Reorder hardware-slot values back into core order
    pub fn from_hardware<T: Copy>(&self, values: &[T; WHEEL_COUNT]) -> [T; WHEEL_COUNT] {
        let mut core = *values;
        for (slot, &wheel) in self.order.iter().enumerate() {
            core[wheel] = values[slot];
        }
        core
    }
}

/// Turns the commanded core wheel states into hardware set-points
#[derive(Debug, Clone)]
pub struct Actuation {
    mapping: ModuleMapping,
    optimize: bool,
}

impl Actuation {
    pub fn new(mapping: ModuleMapping, optimize: bool) -> Self {
        Self { mapping, optimize }
    }

    pub fn mapping(&self) -> &ModuleMapping {
        &self.mapping
    }

    /// Build set-points for the module controllers
    ///
    /// `measured` (core order) is used for the shortest-turn optimisation.
    pub fn setpoints(
        &self,
        commanded: &[WheelState; WHEEL_COUNT],
        measured: &[WheelState; WHEEL_COUNT],
    ) -> WheelSetpoints {
        let states: [WheelState; WHEEL_COUNT] = if self.optimize {
            std::array::from_fn(|i| commanded[i].optimize(measured[i].angle))
        } else {
            *commanded
        };

        for (name, state) in WHEEL_NAMES.iter().zip(states.iter()) {
            debug!(
                "Setpoint {}: speed={:.3}, angle={:.1}°",
                name,
                state.speed,
                state.angle.degrees()
            );
        }

        WheelSetpoints {
            wheels: self.mapping.to_hardware(&states),
        }
    }

    /// All modules stopped, holding their last measured angle
    pub fn stopped(&self, measured: &[WheelState; WHEEL_COUNT]) -> WheelSetpoints {
        let states = measured.map(|m| WheelState::new(0.0, m.angle));
        WheelSetpoints {
            wheels: self.mapping.to_hardware(&states),
        }
    }
}
