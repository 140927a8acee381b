//! Proportional controller.

/// `effort = gain * (setpoint - position)`, unbounded.
///
/// Pure: the output depends only on the setpoint, the gain and the argument.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Controller {
    setpoint: i32,
    gain: f32,
}

impl Controller {
    pub const fn new(setpoint: i32, gain: f32) -> Self {
        Self { setpoint, gain }
    }

    pub fn set_setpoint(&mut self, setpoint: i32) {
        self.setpoint = setpoint;
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Actuation effort for the measured `position`.
    #[inline]
    pub fn run(&self, position: i64) -> f32 {
        let error = i64::from(self.setpoint) - position;
        self.gain * error as f32
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(0, 0.0)
    }
}

/// Clamp `effort` to `[-limit, limit]`. NaN maps to zero.
#[inline]
pub fn saturate(effort: f32, limit: f32) -> f32 {
    if effort.is_nan() {
        return 0.0;
    }
    effort.clamp(-limit, limit)
}
