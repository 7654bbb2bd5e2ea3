use std::f64::consts::TAU;
use std::path::Path;
use std::str::FromStr;

use faer::prelude::*;
use faer::{Mat, MatRef, Side};
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, error, trace, warn};

use crate::attachments::{
    AttachmentRegistry, PointAttachment, PointLoad, RodAttachment, RodLoad,
};
use crate::environment::{Environment, FlowField};
use crate::error::BodyError;
use crate::forces::ForceAssembler;
use crate::kinematics::RigidKinematics;
use crate::mass::MassAssembler;
use crate::output::{BodyOutput, OutputChannel, OutputQuantity};
use crate::util::{all_finite, angular_velocity_as_euler_rates, mat_all_finite};

/// Number of state values contributed by one body
pub const STATE_SIZE: usize = 12;

/// Smallest accepted ratio between the smallest and largest pivot of the
/// mass matrix factorisation
pub const MASS_CONDITION_TOL: f64 = 1e-12;

/// How a body's motion is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum BodyType {
    /// Motion prescribed by the caller (vessel)
    Coupled = -1,
    /// Integrated from the equations of motion
    Free = 0,
    /// Fixed in place (anchor)
    Fixed = 1,
}

impl BodyType {
    pub const VESSEL: BodyType = BodyType::Coupled;
    pub const ANCHOR: BodyType = BodyType::Fixed;

    pub fn name(self) -> &'static str {
        match self {
            BodyType::Coupled => "COUPLED",
            BodyType::Free => "FREE",
            BodyType::Fixed => "FIXED",
        }
    }
}

impl std::fmt::Display for BodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BodyType {
    type Err = BodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COUPLED" | "VESSEL" => Ok(BodyType::Coupled),
            "FREE" => Ok(BodyType::Free),
            "FIXED" | "ANCHOR" => Ok(BodyType::Fixed),
            _ => Err(BodyError::invalid_input(format!("unknown body type '{s}'"))),
        }
    }
}

impl TryFrom<String> for BodyType {
    type Error = BodyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Reference properties fixed at setup
#[derive(Debug, Clone, PartialEq)]
pub struct BodyProperties {
    /// Initial pose: position and roll/pitch/yaw (rad)
    pub r6: [f64; 6],
    /// Centre of gravity relative to the reference point (body frame)
    pub cg: [f64; 3],
    /// Mass (kg)
    pub mass: f64,
    /// Displaced volume (m^3)
    pub volume: f64,
    /// Principal moments of inertia about the centre of gravity (kg m^2)
    pub inertia: [f64; 3],
    /// Quadratic drag-area coefficients, translational then rotational
    pub cda: [f64; 6],
    /// Added-mass coefficients, translational then rotational
    pub ca: [f64; 6],
}

impl BodyProperties {
    /// Checks the properties describe a physical body
    pub fn validate(&self, id: usize) -> Result<(), BodyError> {
        let values = self
            .r6
            .iter()
            .chain(self.cg.iter())
            .chain([self.mass, self.volume].iter())
            .chain(self.inertia.iter())
            .chain(self.cda.iter())
            .chain(self.ca.iter())
            .copied()
            .collect_vec();
        if !all_finite(&values) {
            return Err(BodyError::invalid_property(id, "non-finite property value"));
        }
        if self.mass <= 0. {
            return Err(BodyError::invalid_property(
                id,
                format!("mass must be positive, got {}", self.mass),
            ));
        }
        if self.volume <= 0. {
            return Err(BodyError::invalid_property(
                id,
                format!("volume must be positive, got {}", self.volume),
            ));
        }
        if self.inertia.iter().any(|&i| i < 0.) {
            return Err(BodyError::invalid_property(id, "inertia must not be negative"));
        }
        if self.cda.iter().chain(self.ca.iter()).any(|&c| c < 0.) {
            return Err(BodyError::invalid_property(
                id,
                "drag and added-mass coefficients must not be negative",
            ));
        }
        Ok(())
    }
}

/// Position of a body within the step protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Created, attachments may be registered
    Setup,
    /// Pose and velocity installed for the current time
    PoseSet,
    /// Attachments moved to the current pose
    Propagated,
    /// Net force, mass matrix and acceleration computed
    Evaluated,
}

/// Prescribed motion over one coupling interval
#[derive(Debug, Clone, Copy)]
struct CouplingInterval {
    r_start: [f64; 6],
    rd_start: [f64; 6],
    r_end: [f64; 6],
    rd_end: [f64; 6],
    t0: f64,
    dt: f64,
}

impl CouplingInterval {
    fn hold(r: [f64; 6], rd: [f64; 6], t0: f64) -> Self {
        Self {
            r_start: r,
            rd_start: rd,
            r_end: r,
            rd_end: rd,
            t0,
            dt: 0.,
        }
    }

    /// Linear interpolation; exact at both ends of the interval
    fn interpolate(&self, t: f64) -> ([f64; 6], [f64; 6]) {
        let frac = if self.dt > 0. {
            ((t - self.t0) / self.dt).clamp(0., 1.)
        } else {
            1.
        };
        let lerp = |a: &[f64; 6], b: &[f64; 6]| {
            let mut out = [0.; 6];
            out.iter_mut()
                .zip(a.iter().zip(b.iter()))
                .for_each(|(o, (a, b))| *o = (1. - frac) * a + frac * b);
            out
        };
        (
            lerp(&self.r_start, &self.r_end),
            lerp(&self.rd_start, &self.rd_end),
        )
    }
}

/// Shifts the angles of `r_end` by whole turns so each lies within half a
/// turn of the matching angle in `r_start`. Angles already within half a
/// turn are returned unchanged.
fn unwrap_angles(r_start: &[f64; 6], r_end: &[f64; 6]) -> [f64; 6] {
    let mut out = *r_end;
    out[3..].iter_mut().zip(r_start[3..].iter()).for_each(|(end, start)| {
        let turns = ((*start - *end) / TAU).round();
        if turns != 0. {
            *end += turns * TAU;
        }
    });
    out
}

/// Six degree-of-freedom rigid body that connections and rods attach to
pub struct Body {
    id: usize,
    typ: BodyType,
    props: BodyProperties,
    attachments: AttachmentRegistry,
    mass: MassAssembler,
    forces: ForceAssembler,
    /// Water density the added mass was built with
    water_density: f64,

    /// Simulation time
    t: f64,
    /// Pose: position and roll/pitch/yaw
    r6: [f64; 6],
    /// Velocity: linear and angular (global)
    v6: [f64; 6],
    /// Acceleration: linear and angular (global)
    a6: [f64; 6],
    /// Transform built from `r6` and `v6`
    kinematics: RigidKinematics,
    /// Net force and moment about the reference point
    f6net: [f64; 6],
    /// Combined mass matrix about the reference point `[6][6]`
    m: Mat<f64>,

    coupling: CouplingInterval,
    phase: StepPhase,
    output: Option<BodyOutput>,
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("type", &self.typ)
            .field("t", &self.t)
            .field("r6", &self.r6)
            .field("v6", &self.v6)
            .field("phase", &self.phase)
            .finish()
    }
}

impl Body {
    /// Creates a body from validated reference properties
    pub fn setup(
        id: usize,
        typ: BodyType,
        props: BodyProperties,
        env: &Environment,
    ) -> Result<Self, BodyError> {
        props.validate(id)?;
        let mass = MassAssembler::new(&props, env.water_density);
        let forces = ForceAssembler::new(&props);
        let r6 = props.r6;
        debug!(body = id, kind = typ.name(), ?r6, mass = props.mass, "set up body");
        Ok(Self {
            id,
            typ,
            attachments: AttachmentRegistry::new(id),
            m: mass.m0().to_owned(),
            mass,
            forces,
            water_density: env.water_density,
            t: 0.,
            r6,
            v6: [0.; 6],
            a6: [0.; 6],
            kinematics: RigidKinematics::new(&r6, &[0.; 6]),
            f6net: [0.; 6],
            coupling: CouplingInterval::hold(r6, [0.; 6], 0.),
            phase: StepPhase::Setup,
            output: None,
            props,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn body_type(&self) -> BodyType {
        self.typ
    }

    pub fn properties(&self) -> &BodyProperties {
        &self.props
    }

    pub fn attachments(&self) -> &AttachmentRegistry {
        &self.attachments
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    /// Orientation matrix, body frame to global frame
    pub fn orientation(&self) -> MatRef<'_, f64> {
        self.kinematics.orientation.as_ref()
    }

    pub fn kinematics(&self) -> &RigidKinematics {
        &self.kinematics
    }

    /// Baseline mass matrix (body frame, no attachments)
    pub fn m0(&self) -> MatRef<'_, f64> {
        self.mass.m0()
    }

    //--------------------------------------------------------------------------
    // Load phase
    //--------------------------------------------------------------------------

    /// Attaches connection `index` at body-frame offset `coords`
    pub fn add_connection_to_body(
        &mut self,
        index: usize,
        coords: [f64; 3],
    ) -> Result<(), BodyError> {
        self.require_phase("add_connection_to_body", &[StepPhase::Setup])?;
        self.attachments.add_connection(index, coords)
    }

    /// Attaches rod `index` with body-frame end coordinates `[A; B]`
    pub fn add_rod_to_body(&mut self, index: usize, end_coords: [f64; 6]) -> Result<(), BodyError> {
        self.require_phase("add_rod_to_body", &[StepPhase::Setup])?;
        self.attachments.add_rod(index, end_coords)
    }

    /// Opens the per-body output file. The file is flushed and closed when
    /// the body is dropped.
    pub fn open_output(&mut self, path: impl AsRef<Path>) -> Result<(), BodyError> {
        self.output = Some(BodyOutput::create(path, self.id)?);
        Ok(())
    }

    //--------------------------------------------------------------------------
    // Initialisation
    //--------------------------------------------------------------------------

    /// Places a free body at its reference pose at rest, moves the
    /// attachments there and returns the initial state `[r6; v6]`
    pub fn initialize_body<C, R>(
        &mut self,
        connections: &mut [C],
        rods: &mut [R],
    ) -> Result<[f64; STATE_SIZE], BodyError>
    where
        C: PointAttachment,
        R: RodAttachment,
    {
        self.require_type("initialize_body", &[BodyType::Free])?;
        self.install_pose(self.props.r6, [0.; 6])?;
        self.set_dependent_states(connections, rods)?;
        debug!(body = self.id, r6 = ?self.r6, "initialised free body");

        let mut x = [0.; STATE_SIZE];
        x[..6].copy_from_slice(&self.r6);
        x[6..].copy_from_slice(&self.v6);
        Ok(x)
    }

    /// Sets the starting pose of a fixed or coupled body and moves the
    /// attachments there. Fixed bodies ignore `rd_in` and stay at rest.
    pub fn initialize_unfree_body<C, R>(
        &mut self,
        r_in: &[f64; 6],
        rd_in: &[f64; 6],
        time: f64,
        connections: &mut [C],
        rods: &mut [R],
    ) -> Result<(), BodyError>
    where
        C: PointAttachment,
        R: RodAttachment,
    {
        self.require_type(
            "initialize_unfree_body",
            &[BodyType::Fixed, BodyType::Coupled],
        )?;
        let rd = match self.typ {
            BodyType::Fixed => [0.; 6],
            _ => *rd_in,
        };
        self.check_finite("initial pose", r_in)?;
        self.check_finite("initial velocity", &rd)?;
        self.t = time;
        self.coupling = CouplingInterval::hold(*r_in, rd, time);
        self.install_pose(*r_in, rd)?;
        self.set_dependent_states(connections, rods)?;
        debug!(body = self.id, kind = self.typ.name(), r6 = ?self.r6, "initialised body");
        Ok(())
    }

    //--------------------------------------------------------------------------
    // Pose installation
    //--------------------------------------------------------------------------

    pub fn set_time(&mut self, time: f64) {
        self.t = time;
    }

    /// Installs the integrated state `[r6; v6]` of a free body
    pub fn set_state(&mut self, x: &[f64; STATE_SIZE], time: f64) -> Result<(), BodyError> {
        self.require_type("set_state", &[BodyType::Free])?;
        self.require_initialized("set_state")?;
        self.t = time;
        let mut r6 = [0.; 6];
        let mut v6 = [0.; 6];
        r6.copy_from_slice(&x[..6]);
        v6.copy_from_slice(&x[6..]);
        self.install_pose(r6, v6)
    }

    /// Starts a coupling interval for a coupled body: the previous end of
    /// the interval becomes its start and `(r_in, rd_in)` is the prescribed
    /// motion at `time + dt`.
    ///
    /// Prescribed angles are shifted by whole turns to stay within half a
    /// turn of the interval start, so yaw passing through +/-pi is
    /// interpolated along the short way round.
    pub fn initiate_step(
        &mut self,
        r_in: &[f64; 6],
        rd_in: &[f64; 6],
        time: f64,
        dt: f64,
    ) -> Result<(), BodyError> {
        self.require_type("initiate_step", &[BodyType::Coupled])?;
        self.require_initialized("initiate_step")?;
        self.check_finite("prescribed pose", r_in)?;
        self.check_finite("prescribed velocity", rd_in)?;
        if dt <= 0. {
            warn!(body = self.id, time, dt, "coupling interval has no length");
        }
        let r_start = self.coupling.r_end;
        self.coupling = CouplingInterval {
            r_start,
            rd_start: self.coupling.rd_end,
            r_end: unwrap_angles(&r_start, r_in),
            rd_end: *rd_in,
            t0: time,
            dt: dt.max(0.),
        };
        Ok(())
    }

    /// Moves a coupled body along the current coupling interval
    pub fn update_fairlead(&mut self, time: f64) -> Result<(), BodyError> {
        self.require_type("update_fairlead", &[BodyType::Coupled])?;
        self.require_initialized("update_fairlead")?;
        self.t = time;
        let (r6, v6) = self.coupling.interpolate(time);
        self.install_pose(r6, v6)
    }

    fn install_pose(&mut self, r6: [f64; 6], v6: [f64; 6]) -> Result<(), BodyError> {
        self.check_finite("pose", &r6)?;
        self.check_finite("velocity", &v6)?;
        self.r6 = r6;
        self.v6 = v6;
        self.kinematics = RigidKinematics::new(&r6, &v6);
        self.phase = StepPhase::PoseSet;
        Ok(())
    }

    //--------------------------------------------------------------------------
    // Evaluation
    //--------------------------------------------------------------------------

    /// Moves every attachment to its current global position and velocity.
    ///
    /// Must run after the pose is installed and before the attachments
    /// evaluate their own dynamics.
    pub fn set_dependent_states<C, R>(
        &mut self,
        connections: &mut [C],
        rods: &mut [R],
    ) -> Result<(), BodyError>
    where
        C: PointAttachment,
        R: RodAttachment,
    {
        self.require_initialized("set_dependent_states")?;
        self.attachments
            .check_available(connections.len(), rods.len())?;

        self.attachments.connections().iter().for_each(|c| {
            let p = self.kinematics.point(&c.offset);
            connections[c.index].set_kinematics(p.position, p.velocity);
        });
        self.attachments.rods().iter().for_each(|r| {
            rods[r.index].set_kinematics(self.kinematics.rod(&r.ends));
        });
        self.phase = StepPhase::Propagated;
        Ok(())
    }

    /// Assembles the net force and mass matrix and, for free bodies, solves
    /// `M a6 = F6net`.
    ///
    /// The attachments must have evaluated their own dynamics since the last
    /// call to [`Body::set_dependent_states`].
    ///
    /// `env` must carry the water density the body was set up with, since the
    /// added mass is fixed at setup.
    pub fn do_rhs<C, R>(
        &mut self,
        env: &Environment,
        flow: &dyn FlowField,
        connections: &[C],
        rods: &[R],
    ) -> Result<(), BodyError>
    where
        C: PointAttachment,
        R: RodAttachment,
    {
        self.require_phase("do_rhs", &[StepPhase::Propagated, StepPhase::Evaluated])?;
        if env.water_density != self.water_density {
            return Err(BodyError::invalid_property(
                self.id,
                format!(
                    "water density {} differs from {} used at setup",
                    env.water_density, self.water_density
                ),
            ));
        }
        self.attachments
            .check_available(connections.len(), rods.len())?;

        let point_loads: Vec<([f64; 3], PointLoad)> = self
            .attachments
            .connections()
            .iter()
            .map(|c| {
                (
                    self.kinematics.rotate(&c.offset),
                    connections[c.index].net_force_and_mass(),
                )
            })
            .collect();
        let rod_loads: Vec<([f64; 3], RodLoad)> = self
            .attachments
            .rods()
            .iter()
            .map(|r| {
                let end_a = [r.ends[0], r.ends[1], r.ends[2]];
                (
                    self.kinematics.rotate(&end_a),
                    rods[r.index].net_force_and_mass(),
                )
            })
            .collect();

        let position = [self.r6[0], self.r6[1], self.r6[2]];
        let flow_kin = flow.kinematics(self.t, position);

        self.f6net = self.forces.assemble(
            &self.props,
            env,
            &self.kinematics,
            &flow_kin,
            &point_loads,
            &rod_loads,
        );
        self.m = self
            .mass
            .assemble(self.orientation(), &point_loads, &rod_loads);

        self.check_finite("net force", &self.f6net)?;
        if !mat_all_finite(self.m.as_ref()) {
            return Err(self.non_finite("mass matrix"));
        }

        self.a6 = match self.typ {
            BodyType::Free => self.solve_acceleration()?,
            BodyType::Fixed | BodyType::Coupled => [0.; 6],
        };
        trace!(body = self.id, t = self.t, f6net = ?self.f6net, a6 = ?self.a6, "rhs");
        self.phase = StepPhase::Evaluated;
        Ok(())
    }

    fn solve_acceleration(&self) -> Result<[f64; 6], BodyError> {
        let singular = || {
            error!(body = self.id, t = self.t, "mass matrix is singular or ill-conditioned");
            BodyError::SingularMass {
                body: self.id,
                time: self.t,
            }
        };
        let llt = self.m.llt(Side::Lower).map_err(|_| singular())?;

        // The squared diagonal entries of L are the pivots of M
        let l = llt.L();
        let (min, max) = (0..6)
            .map(|i| l[(i, i)] * l[(i, i)])
            .minmax()
            .into_option()
            .ok_or_else(singular)?;
        if min < MASS_CONDITION_TOL * max {
            return Err(singular());
        }
        let f = Mat::from_fn(6, 1, |i, _| self.f6net[i]);
        let a = llt.solve(f.as_ref());
        let a6 = [a[(0, 0)], a[(1, 0)], a[(2, 0)], a[(3, 0)], a[(4, 0)], a[(5, 0)]];
        self.check_finite("acceleration", &a6)?;
        Ok(a6)
    }

    /// State derivative of a free body: linear velocity, roll/pitch/yaw
    /// rates, then linear and angular acceleration
    pub fn get_state_deriv(&self) -> Result<[f64; STATE_SIZE], BodyError> {
        self.require_type("get_state_deriv", &[BodyType::Free])?;
        self.require_phase("get_state_deriv", &[StepPhase::Evaluated])?;

        let angles = [self.r6[3], self.r6[4], self.r6[5]];
        let omega = [self.v6[3], self.v6[4], self.v6[5]];
        let rates = angular_velocity_as_euler_rates(&angles, &omega).ok_or_else(|| {
            error!(body = self.id, t = self.t, ?angles, "orientation at gimbal lock");
            BodyError::NonFinite {
                body: self.id,
                time: self.t,
                quantity: "orientation rate (pitch at +/-90 degrees)",
            }
        })?;

        let mut xd = [0.; STATE_SIZE];
        xd[..3].copy_from_slice(&self.v6[..3]);
        xd[3..6].copy_from_slice(&rates);
        xd[6..].copy_from_slice(&self.a6);
        Ok(xd)
    }

    /// Multiplies the drag-area coefficients by `scaler`
    pub fn scale_drag(&mut self, scaler: f64) {
        if scaler != 1. {
            warn!(body = self.id, scaler, "scaling body drag");
        }
        self.forces.scale_drag(scaler);
    }

    //--------------------------------------------------------------------------
    // Accessors
    //--------------------------------------------------------------------------

    /// Latest net force and moment about the reference point
    pub fn get_fnet(&self) -> [f64; 6] {
        self.f6net
    }

    /// Latest combined mass matrix
    pub fn get_m(&self) -> MatRef<'_, f64> {
        self.m.as_ref()
    }

    /// Current pose and velocity
    pub fn get_body_state(&self) -> ([f64; 6], [f64; 6]) {
        (self.r6, self.v6)
    }

    /// Latest acceleration
    pub fn get_acceleration(&self) -> [f64; 6] {
        self.a6
    }

    /// Value of one output channel
    pub fn get_body_output(&self, channel: &OutputChannel) -> f64 {
        match channel.quantity() {
            OutputQuantity::Position => self.r6[channel.index()],
            OutputQuantity::Velocity => self.v6[channel.index()],
            OutputQuantity::Force => self.f6net[channel.index()],
        }
    }

    /// Writes the current state to the output file, if one is open
    pub fn output(&mut self, time: f64) -> Result<(), BodyError> {
        if let Some(out) = self.output.as_mut() {
            out.write(time, &self.r6, &self.v6, &self.f6net)?;
        }
        Ok(())
    }

    //--------------------------------------------------------------------------
    // Checks
    //--------------------------------------------------------------------------

    fn require_type(&self, operation: &'static str, allowed: &[BodyType]) -> Result<(), BodyError> {
        if allowed.contains(&self.typ) {
            Ok(())
        } else {
            Err(BodyError::WrongBodyType {
                body: self.id,
                operation,
                found: self.typ.name(),
            })
        }
    }

    fn require_phase(&self, operation: &'static str, allowed: &[StepPhase]) -> Result<(), BodyError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(BodyError::OutOfPhase {
                body: self.id,
                operation,
                found: self.phase,
            })
        }
    }

    fn require_initialized(&self, operation: &'static str) -> Result<(), BodyError> {
        if self.phase == StepPhase::Setup {
            return Err(BodyError::OutOfPhase {
                body: self.id,
                operation,
                found: self.phase,
            });
        }
        Ok(())
    }

    fn non_finite(&self, quantity: &'static str) -> BodyError {
        error!(body = self.id, t = self.t, quantity, "non-finite value");
        BodyError::NonFinite {
            body: self.id,
            time: self.t,
            quantity,
        }
    }

    fn check_finite(&self, quantity: &'static str, values: &[f64]) -> Result<(), BodyError> {
        if all_finite(values) {
            Ok(())
        } else {
            Err(self.non_finite(quantity))
        }
    }
}
