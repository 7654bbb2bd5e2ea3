use serde::Deserialize;

/// Environmental constants shared by every body in a simulation
#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    /// Gravitational acceleration magnitude (m/s^2), acting along -z
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Water density (kg/m^3)
    #[serde(default = "default_water_density")]
    pub water_density: f64,
}

fn default_gravity() -> f64 {
    9.80665
}

fn default_water_density() -> f64 {
    1025.
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            water_density: default_water_density(),
        }
    }
}

/// Fluid kinematics at a point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowKinematics {
    /// Fluid velocity (m/s)
    pub velocity: [f64; 3],
    /// Fluid acceleration (m/s^2)
    pub acceleration: [f64; 3],
}

/// Provider of ambient water velocity and acceleration.
///
/// Implementations are read-only during a step.
pub trait FlowField {
    fn kinematics(&self, t: f64, position: [f64; 3]) -> FlowKinematics;
}

/// Quiescent water
#[derive(Debug, Clone, Copy, Default)]
pub struct StillWater;

impl FlowField for StillWater {
    fn kinematics(&self, _t: f64, _position: [f64; 3]) -> FlowKinematics {
        FlowKinematics::default()
    }
}

/// Steady, depth-independent horizontal current
#[derive(Debug, Clone, Deserialize)]
pub struct UniformCurrent {
    /// Current speed (m/s)
    pub speed: f64,
    /// Heading relative to the x axis, positive towards +y (radians)
    pub heading: f64,
}

impl UniformCurrent {
    pub fn new(speed: f64, heading: f64) -> Self {
        Self { speed, heading }
    }
}

impl FlowField for UniformCurrent {
    fn kinematics(&self, _t: f64, position: [f64; 3]) -> FlowKinematics {
        // No current above the free surface
        if position[2] > 0. {
            return FlowKinematics::default();
        }
        let (s, c) = self.heading.sin_cos();
        FlowKinematics {
            velocity: [self.speed * c, self.speed * s, 0.],
            acceleration: [0.; 3],
        }
    }
}
