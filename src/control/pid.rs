// PID and trapezoid-profiled PID controllers running at a fixed period

/// Wrap `value` into [min, max)
pub fn input_modulus(value: f64, min: f64, max: f64) -> f64 {
    let modulus = max - min;
    let mut value = value;
    value -= ((value - min) / modulus).trunc() * modulus;
    value -= ((value - max) / modulus).trunc() * modulus;
    value
}

/// Classic PID on `setpoint - measurement`
///
/// With continuous input enabled the error is taken the short way round the
/// input range, so an angle loop never spins the long way.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    period: f64,
    continuous: Option<(f64, f64)>,
    previous_error: f64,
    total_error: f64,
    has_measurement: bool,
}

impl PidController {
    /// `period` is the loop period in seconds
    pub fn new(kp: f64, ki: f64, kd: f64, period: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            period,
            continuous: None,
            previous_error: 0.0,
            total_error: 0.0,
            has_measurement: false,
        }
    }

    pub fn enable_continuous_input(&mut self, min: f64, max: f64) {
        self.continuous = Some((min, max));
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Clear integral and derivative history
    pub fn reset(&mut self) {
        self.previous_error = 0.0;
        self.total_error = 0.0;
        self.has_measurement = false;
    }

    /// Error as the controller sees it (wrapped when continuous)
    pub fn error(&self, measurement: f64, setpoint: f64) -> f64 {
        match self.continuous {
            Some((min, max)) => {
                let bound = (max - min) / 2.0;
                input_modulus(setpoint - measurement, -bound, bound)
            }
            None => setpoint - measurement,
        }
    }

    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        let error = self.error(measurement, setpoint);
        let derivative = if self.has_measurement {
            (error - self.previous_error) / self.period
        } else {
            0.0
        };

        if self.ki != 0.0 {
            self.total_error += error * self.period;
        }
        self.previous_error = error;
        self.has_measurement = true;

        self.kp * error + self.ki * self.total_error + self.kd * derivative
    }
}

/// Position/velocity pair along a motion profile
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProfileState {
    pub position: f64,
    pub velocity: f64,
}

impl ProfileState {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }
}

/// Velocity and acceleration limits of a trapezoid profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileConstraints {
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

/// Time-optimal trapezoidal motion between two states
#[derive(Debug, Clone, Copy)]
pub struct TrapezoidProfile {
    constraints: ProfileConstraints,
}

impl TrapezoidProfile {
    pub fn new(constraints: ProfileConstraints) -> Self {
        Self { constraints }
    }

    /// Where the profile from `current` to `goal` will be after `t` seconds
    pub fn calculate(&self, t: f64, current: ProfileState, goal: ProfileState) -> ProfileState {
        let max_v = self.constraints.max_velocity;
        let max_a = self.constraints.max_acceleration;

        // Solve as if moving in the positive direction, flip back at the end
        let direction = if current.position > goal.position { -1.0 } else { 1.0 };
        let direct = |s: ProfileState| ProfileState::new(s.position * direction, s.velocity * direction);
        let mut current = direct(current);
        let goal = direct(goal);

        current.velocity = current.velocity.min(max_v);

        let cutoff_begin = current.velocity / max_a;
        let cutoff_dist_begin = cutoff_begin * cutoff_begin * max_a / 2.0;
        let cutoff_end = goal.velocity / max_a;
        let cutoff_dist_end = cutoff_end * cutoff_end * max_a / 2.0;

        let full_trapezoid_dist = cutoff_dist_begin + (goal.position - current.position) + cutoff_dist_end;
        let mut acceleration_time = max_v / max_a;
        let mut full_speed_dist = full_trapezoid_dist - acceleration_time * acceleration_time * max_a;

        // Triangle profile: never reaches full speed
        if full_speed_dist < 0.0 {
            acceleration_time = (full_trapezoid_dist / max_a).max(0.0).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel = acceleration_time - cutoff_begin;
        let end_full_speed = end_accel + full_speed_dist / max_v;
        let end_decel = end_full_speed + acceleration_time - cutoff_end;

        let mut result = current;
        if t < end_accel {
            result.velocity += t * max_a;
            result.position += (current.velocity + t * max_a / 2.0) * t;
        } else if t < end_full_speed {
            result.velocity = max_v;
            result.position +=
                (current.velocity + end_accel * max_a / 2.0) * end_accel + max_v * (t - end_accel);
        } else if t <= end_decel {
            let time_left = end_decel - t;
            result.velocity = goal.velocity + time_left * max_a;
            result.position = goal.position - (goal.velocity + time_left * max_a / 2.0) * time_left;
        } else {
            result = goal;
        }

        direct(result)
    }
}

/// PID that chases a trapezoid-profiled setpoint instead of jumping to the goal
#[derive(Debug, Clone)]
pub struct ProfiledPidController {
    pid: PidController,
    profile: TrapezoidProfile,
    setpoint: ProfileState,
    continuous: Option<(f64, f64)>,
}

impl ProfiledPidController {
    pub fn new(kp: f64, ki: f64, kd: f64, constraints: ProfileConstraints, period: f64) -> Self {
        Self {
            pid: PidController::new(kp, ki, kd, period),
            profile: TrapezoidProfile::new(constraints),
            setpoint: ProfileState::default(),
            continuous: None,
        }
    }

    pub fn enable_continuous_input(&mut self, min: f64, max: f64) {
        self.pid.enable_continuous_input(min, max);
        self.continuous = Some((min, max));
    }

    /// Current profile setpoint
    pub fn setpoint(&self) -> ProfileState {
        self.setpoint
    }

    /// Restart the profile from `measurement` at rest
    pub fn reset(&mut self, measurement: f64) {
        self.pid.reset();
        self.setpoint = ProfileState::new(measurement, 0.0);
    }

    /// Step the profile one period towards `goal` and return the PID output
    pub fn calculate(&mut self, measurement: f64, goal: f64) -> f64 {
        let mut goal = ProfileState::new(goal, 0.0);

        // Re-express goal and setpoint on the short arc from the measurement
        if let Some((min, max)) = self.continuous {
            let bound = (max - min) / 2.0;
            goal.position = measurement + input_modulus(goal.position - measurement, -bound, bound);
            self.setpoint.position =
                measurement + input_modulus(self.setpoint.position - measurement, -bound, bound);
        }

        self.setpoint = self.profile.calculate(self.pid.period(), self.setpoint, goal);
        self.pid.calculate(measurement, self.setpoint.position)
    }
}
