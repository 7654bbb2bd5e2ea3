use std::process;

use itertools::Itertools;
use moorbody::{
    attachments::{PointAttachment, PointLoad, RodAttachment, RodLoad},
    body::STATE_SIZE,
    util::{norm, scale, sub},
    Body, BodyError, BodyType, Environment, FlowField, Model, RodKinematics, Status,
    UniformCurrent,
};

/// Taut mooring leg modelled as a linear spring to a fixed anchor with its
/// mass lumped at the fairlead
struct Spring {
    anchor: [f64; 3],
    stiffness: f64,
    rest_length: f64,
    mass: f64,
    fairlead: [f64; 3],
}

impl PointAttachment for Spring {
    fn set_kinematics(&mut self, position: [f64; 3], _velocity: [f64; 3]) {
        self.fairlead = position;
    }

    fn net_force_and_mass(&self) -> PointLoad {
        let d = sub(&self.anchor, &self.fairlead);
        let length = norm(&d);
        let tension = (self.stiffness * (length - self.rest_length)).max(0.);
        let mut load = PointLoad::force(scale(&d, tension / length));
        (0..3).for_each(|i| load.mass[(i, i)] = self.mass);
        load
    }
}

/// Keel fin resisting motion of its root with linear damping
struct Keel {
    damping: f64,
    velocity: [f64; 3],
}

impl RodAttachment for Keel {
    fn set_kinematics(&mut self, kinematics: RodKinematics) {
        self.velocity = [kinematics.v6[0], kinematics.v6[1], kinematics.v6[2]];
    }

    fn net_force_and_mass(&self) -> RodLoad {
        let mut load = RodLoad::zero();
        (0..3).for_each(|i| load.force[i] = -self.damping * self.velocity[i]);
        load
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("failed: {err}");
        process::exit(Status::from(&err).code());
    }
    println!("success")
}

fn run() -> Result<(), BodyError> {
    //--------------------------------------------------------------------------
    // Model
    //--------------------------------------------------------------------------

    let mut model = Model::new();
    let buoy = model
        .add_body()
        .body_type(BodyType::Free)
        .position(0., 0., -8.)
        .orientation(0.05, -0.03, 0.)
        .cg(0., 0., -1.)
        .mass(3.0e3)
        .volume(4.)
        .inertia(2.0e3, 2.0e3, 1.5e3)
        .drag([3., 3., 4., 5.0e2, 5.0e2, 5.0e2])
        .added_mass([0.8, 0.8, 1.0, 0.1, 0.1, 0.1])
        .build();

    // Three legs at 120 degrees
    let radius = 1.5;
    let mut springs = (0..3)
        .map(|i| {
            let theta = i as f64 * 2. * std::f64::consts::PI / 3.;
            let (s, c) = theta.sin_cos();
            let fairlead = [radius * c, radius * s, -1.];
            model.attach_connection(buoy, i, fairlead);
            Spring {
                anchor: [40. * c, 40. * s, -60.],
                stiffness: 4.0e3,
                rest_length: 63.,
                mass: 150.,
                fairlead: [0.; 3],
            }
        })
        .collect_vec();

    model.attach_rod(buoy, 0, [0., 0., -2., 0., 0., -4.]);
    let mut keels = vec![Keel {
        damping: 2.0e3,
        velocity: [0.; 3],
    }];

    let mut bodies = model.create_bodies()?;
    let body = &mut bodies[buoy];
    let env = model.environment().clone();
    let current = UniformCurrent::new(0.4, 0.);

    //--------------------------------------------------------------------------
    // Time integration
    //--------------------------------------------------------------------------

    body.open_output("free_decay.out")?;

    let time_step = 0.01;
    let mut x = body.initialize_body(&mut springs, &mut keels)?;

    for i in 0..6000 {
        let t = (i as f64) * time_step;

        // Midpoint rule
        let k1 = rhs(body, &env, &current, &mut springs, &mut keels, &x, t)?;
        let x_mid = advance(&x, &k1, 0.5 * time_step);
        let k2 = rhs(
            body,
            &env,
            &current,
            &mut springs,
            &mut keels,
            &x_mid,
            t + 0.5 * time_step,
        )?;
        x = advance(&x, &k2, time_step);

        if i % 10 == 0 {
            body.output(t)?;
        }
    }

    let (r6, _) = body.get_body_state();
    println!("final position: {:.4} {:.4} {:.4}", r6[0], r6[1], r6[2]);
    Ok(())
}

fn rhs(
    body: &mut Body,
    env: &Environment,
    flow: &dyn FlowField,
    springs: &mut [Spring],
    keels: &mut [Keel],
    x: &[f64; STATE_SIZE],
    t: f64,
) -> Result<[f64; STATE_SIZE], BodyError> {
    body.set_state(x, t)?;
    body.set_dependent_states(springs, keels)?;
    body.do_rhs(env, flow, springs, keels)?;
    body.get_state_deriv()
}

fn advance(x: &[f64; STATE_SIZE], xd: &[f64; STATE_SIZE], dt: f64) -> [f64; STATE_SIZE] {
    let mut out = *x;
    out.iter_mut()
        .zip(xd.iter())
        .for_each(|(o, d)| *o += dt * d);
    out
}
