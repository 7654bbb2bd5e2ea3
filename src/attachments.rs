use faer::Mat;
use tracing::debug;

use crate::error::{AttachmentKind, BodyError};
use crate::kinematics::RodKinematics;
use crate::util::{all_finite, split6, sub};

/// Maximum number of connections attached to one body
pub const MAX_CONNECTIONS: usize = 30;

/// Maximum number of rods attached to one body
pub const MAX_RODS: usize = 30;

/// Net force and lumped mass reported by an attached connection at its own
/// (global) position
#[derive(Debug, Clone)]
pub struct PointLoad {
    /// Force (global) `[3]`
    pub force: [f64; 3],
    /// Translational mass matrix (global) `[3][3]`
    pub mass: Mat<f64>,
}

impl PointLoad {
    pub fn zero() -> Self {
        Self {
            force: [0.; 3],
            mass: Mat::zeros(3, 3),
        }
    }

    /// Pure force with no mass contribution
    pub fn force(force: [f64; 3]) -> Self {
        Self {
            force,
            mass: Mat::zeros(3, 3),
        }
    }
}

/// Net force/moment and mass matrix reported by an attached rod about its
/// end A (global frame)
#[derive(Debug, Clone)]
pub struct RodLoad {
    /// Force and moment about end A `[6]`
    pub force: [f64; 6],
    /// Mass matrix about end A `[6][6]`
    pub mass: Mat<f64>,
}

impl RodLoad {
    pub fn zero() -> Self {
        Self {
            force: [0.; 6],
            mass: Mat::zeros(6, 6),
        }
    }
}

/// Connection (point node) interface seen by a body
pub trait PointAttachment {
    /// Moves the connection to the given global position and velocity
    fn set_kinematics(&mut self, position: [f64; 3], velocity: [f64; 3]);

    /// Force and mass at the connection; only valid after the connection
    /// has evaluated its own dynamics for the current step
    fn net_force_and_mass(&self) -> PointLoad;
}

/// Rod interface seen by a body
pub trait RodAttachment {
    /// Moves the rod to the given end-A pose and velocity
    fn set_kinematics(&mut self, kinematics: RodKinematics);

    /// Force and mass about end A; only valid after the rod has evaluated
    /// its own dynamics for the current step
    fn net_force_and_mass(&self) -> RodLoad;
}

/// Connection registered on a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachedConnection {
    /// Index of the connection in the simulation's connection list
    pub index: usize,
    /// Offset from the body reference point (body frame)
    pub offset: [f64; 3],
}

/// Rod registered on a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachedRod {
    /// Index of the rod in the simulation's rod list
    pub index: usize,
    /// End A and end B coordinates (body frame)
    pub ends: [f64; 6],
}

/// Connections and rods rigidly attached to a body, in insertion order.
///
/// Attachments are permanent for the run. The collaborators themselves are
/// owned by the simulation and referenced by index.
#[derive(Debug, Clone)]
pub struct AttachmentRegistry {
    body: usize,
    connections: Vec<AttachedConnection>,
    rods: Vec<AttachedRod>,
}

impl AttachmentRegistry {
    pub fn new(body: usize) -> Self {
        Self {
            body,
            connections: vec![],
            rods: vec![],
        }
    }

    /// Registers a connection at body-frame `offset`.
    ///
    /// Fails without modifying the registry if [`MAX_CONNECTIONS`] are
    /// already attached.
    pub fn add_connection(&mut self, index: usize, offset: [f64; 3]) -> Result<(), BodyError> {
        if self.connections.len() >= MAX_CONNECTIONS {
            return Err(BodyError::CapacityExceeded {
                body: self.body,
                kind: AttachmentKind::Connection,
                capacity: MAX_CONNECTIONS,
            });
        }
        if !all_finite(&offset) {
            return Err(BodyError::invalid_property(
                self.body,
                format!("connection {index} offset is not finite"),
            ));
        }
        debug!(body = self.body, connection = index, ?offset, "attach connection");
        self.connections.push(AttachedConnection { index, offset });
        Ok(())
    }

    /// Registers a rod with body-frame end coordinates `[A; B]`.
    ///
    /// Fails without modifying the registry if [`MAX_RODS`] are already
    /// attached or the rod ends coincide.
    pub fn add_rod(&mut self, index: usize, ends: [f64; 6]) -> Result<(), BodyError> {
        if self.rods.len() >= MAX_RODS {
            return Err(BodyError::CapacityExceeded {
                body: self.body,
                kind: AttachmentKind::Rod,
                capacity: MAX_RODS,
            });
        }
        let (a, b) = split6(&ends);
        if !all_finite(&ends) || sub(&b, &a) == [0.; 3] {
            return Err(BodyError::invalid_property(
                self.body,
                format!("rod {index} end coordinates must be finite and distinct"),
            ));
        }
        debug!(body = self.body, rod = index, ?ends, "attach rod");
        self.rods.push(AttachedRod { index, ends });
        Ok(())
    }

    pub fn connections(&self) -> &[AttachedConnection] {
        &self.connections
    }

    pub fn rods(&self) -> &[AttachedRod] {
        &self.rods
    }

    pub fn len(&self) -> usize {
        self.connections.len() + self.rods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifies every registered index refers to an element in the
    /// caller-supplied collections
    pub(crate) fn check_available(&self, n_connections: usize, n_rods: usize) -> Result<(), BodyError> {
        if let Some(c) = self.connections.iter().find(|c| c.index >= n_connections) {
            return Err(BodyError::UnknownAttachment {
                body: self.body,
                kind: AttachmentKind::Connection,
                index: c.index,
                available: n_connections,
            });
        }
        if let Some(r) = self.rods.iter().find(|r| r.index >= n_rods) {
            return Err(BodyError::UnknownAttachment {
                body: self.body,
                kind: AttachmentKind::Rod,
                index: r.index,
                available: n_rods,
            });
        }
        Ok(())
    }
}
