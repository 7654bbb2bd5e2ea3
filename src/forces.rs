use crate::attachments::{PointLoad, RodLoad};
use crate::body::BodyProperties;
use crate::environment::{Environment, FlowKinematics};
use crate::kinematics::RigidKinematics;
use crate::util::{cross, join6, mat3_transpose_vec, split6, sub};

/// Moves a force acting at lever arm `r` to the reference point, `[f; r x f]`
#[inline]
pub fn translate_force_3to6(r: &[f64; 3], f: &[f64; 3]) -> [f64; 6] {
    join6(f, &cross(r, f))
}

/// Moves a force/moment pair acting at lever arm `r` to the reference
/// point, `[f; r x f + m]`
#[inline]
pub fn translate_force_6(r: &[f64; 3], f6: &[f64; 6]) -> [f64; 6] {
    let (f, m) = split6(f6);
    let rf = cross(r, &f);
    join6(&f, &[rf[0] + m[0], rf[1] + m[1], rf[2] + m[2]])
}

#[inline]
fn accumulate(total: &mut [f64; 6], f: &[f64; 6]) {
    total.iter_mut().zip(f.iter()).for_each(|(t, f)| *t += *f);
}

/// Sums every load acting on a body about its reference point.
#[derive(Debug, Clone)]
pub struct ForceAssembler {
    /// Drag-area coefficients after scaling `[6]`
    cda: [f64; 6],
}

impl ForceAssembler {
    pub fn new(props: &BodyProperties) -> Self {
        Self { cda: props.cda }
    }

    /// Multiplies the drag-area coefficients by `factor`
    pub fn scale_drag(&mut self, factor: f64) {
        self.cda.iter_mut().for_each(|c| *c *= factor);
    }

    pub fn cda(&self) -> &[f64; 6] {
        &self.cda
    }

    /// Net weight and buoyancy. Buoyancy acts at the reference point, weight
    /// at the centre of gravity.
    pub fn weight_and_buoyancy(
        &self,
        props: &BodyProperties,
        env: &Environment,
        kin: &RigidKinematics,
    ) -> [f64; 6] {
        let weight = [0., 0., -props.mass * env.gravity];
        let buoyancy = env.water_density * props.volume * env.gravity;
        let cg_arm = kin.rotate(&props.cg);
        let moment = cross(&cg_arm, &weight);
        [0., 0., weight[2] + buoyancy, moment[0], moment[1], moment[2]]
    }

    /// Quadratic drag from the flow velocity relative to the body, applied
    /// per body axis
    pub fn drag(
        &self,
        env: &Environment,
        kin: &RigidKinematics,
        flow: &FlowKinematics,
    ) -> [f64; 6] {
        let r = kin.orientation.as_ref();
        let v_rel = mat3_transpose_vec(r, &sub(&flow.velocity, &kin.velocity));
        let omega = mat3_transpose_vec(r, &kin.angular_velocity);
        let half_rho = 0.5 * env.water_density;

        let mut f_local = [0.; 3];
        let mut m_local = [0.; 3];
        (0..3).for_each(|i| {
            f_local[i] = half_rho * self.cda[i] * v_rel[i] * v_rel[i].abs();
            m_local[i] = -half_rho * self.cda[i + 3] * omega[i] * omega[i].abs();
        });
        join6(&kin.rotate(&f_local), &kin.rotate(&m_local))
    }

    /// Froude-Krylov and added-mass reaction to flow acceleration
    pub fn flow_acceleration(
        &self,
        props: &BodyProperties,
        env: &Environment,
        kin: &RigidKinematics,
        flow: &FlowKinematics,
    ) -> [f64; 6] {
        let ud = mat3_transpose_vec(kin.orientation.as_ref(), &flow.acceleration);
        let displaced_mass = env.water_density * props.volume;
        let mut f_local = [0.; 3];
        (0..3).for_each(|i| f_local[i] = displaced_mass * (1. + props.ca[i]) * ud[i]);
        join6(&kin.rotate(&f_local), &[0.; 3])
    }

    /// Net force and moment about the reference point.
    ///
    /// Connection and rod loads are paired with the global lever arm from the
    /// reference point to the connection or rod end A.
    pub fn assemble(
        &self,
        props: &BodyProperties,
        env: &Environment,
        kin: &RigidKinematics,
        flow: &FlowKinematics,
        connections: &[([f64; 3], PointLoad)],
        rods: &[([f64; 3], RodLoad)],
    ) -> [f64; 6] {
        let mut f6 = self.weight_and_buoyancy(props, env, kin);
        accumulate(&mut f6, &self.drag(env, kin, flow));
        accumulate(&mut f6, &self.flow_acceleration(props, env, kin, flow));

        connections
            .iter()
            .for_each(|(arm, load)| accumulate(&mut f6, &translate_force_3to6(arm, &load.force)));
        rods.iter()
            .for_each(|(arm, load)| accumulate(&mut f6, &translate_force_6(arm, &load.force)));
        f6
    }
}
