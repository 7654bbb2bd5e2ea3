use std::fs;

use approx::assert_relative_eq;
use std::f64::consts::{FRAC_PI_2, PI};

use moorbody::{
    output::OutputChannel, util::rotation_matrix, Body, BodyError, BodyProperties, BodyType,
    Environment, FlowField, FlowKinematics, PointAttachment, PointLoad, RodAttachment,
    RodKinematics, RodLoad, StepPhase, StillWater, UniformCurrent,
};

/// Connection that records its kinematics and reports a constant load
#[derive(Default)]
struct Node {
    position: [f64; 3],
    velocity: [f64; 3],
    force: [f64; 3],
}

impl PointAttachment for Node {
    fn set_kinematics(&mut self, position: [f64; 3], velocity: [f64; 3]) {
        self.position = position;
        self.velocity = velocity;
    }

    fn net_force_and_mass(&self) -> PointLoad {
        PointLoad::force(self.force)
    }
}

#[derive(Default)]
struct Rod {
    kinematics: Option<RodKinematics>,
}

impl RodAttachment for Rod {
    fn set_kinematics(&mut self, kinematics: RodKinematics) {
        self.kinematics = Some(kinematics);
    }

    fn net_force_and_mass(&self) -> RodLoad {
        RodLoad::zero()
    }
}

/// Water accelerating uniformly with no velocity at the instant sampled
struct AcceleratingFlow {
    acceleration: [f64; 3],
}

impl FlowField for AcceleratingFlow {
    fn kinematics(&self, _t: f64, _position: [f64; 3]) -> FlowKinematics {
        FlowKinematics {
            velocity: [0.; 3],
            acceleration: self.acceleration,
        }
    }
}

fn buoy() -> BodyProperties {
    BodyProperties {
        r6: [0., 0., -5., 0., 0., 0.],
        cg: [0.; 3],
        mass: 2050.,
        volume: 2.,
        inertia: [500., 500., 800.],
        cda: [1., 1., 2., 0.5, 0.5, 0.5],
        ca: [0.; 6],
    }
}

#[test]
fn test_fixed_body_never_moves() {
    let env = Environment::default();
    let r0 = [10., -20., -50., 0.1, 0.2, 0.3];
    let mut body = Body::setup(1, BodyType::Fixed, buoy(), &env).unwrap();
    body.add_connection_to_body(0, [1., 0., 0.]).unwrap();

    let mut nodes = vec![Node {
        force: [100., -50., 20.],
        ..Default::default()
    }];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_unfree_body(&r0, &[1., 1., 1., 0.1, 0.1, 0.1], 0., &mut nodes, &mut rods)
        .unwrap();
    let position = nodes[0].position;

    let current = UniformCurrent::new(1.5, 0.3);
    for i in 1..=200 {
        body.set_time(i as f64 * 0.01);
        body.set_dependent_states(&mut nodes, &mut rods).unwrap();
        body.do_rhs(&env, &current, &nodes, &rods).unwrap();

        let (r6, v6) = body.get_body_state();
        assert_eq!(r6, r0);
        assert_eq!(v6, [0.; 6]);
        assert_eq!(body.get_acceleration(), [0.; 6]);
        assert_eq!(nodes[0].position, position);
        assert_eq!(nodes[0].velocity, [0.; 3]);
    }

    // Integration entry points are rejected for fixed bodies
    assert!(matches!(
        body.set_state(&[0.; 12], 3.),
        Err(BodyError::WrongBodyType { .. })
    ));
    assert!(matches!(
        body.get_state_deriv(),
        Err(BodyError::WrongBodyType { .. })
    ));
    assert!(matches!(
        body.initiate_step(&r0, &[0.; 6], 3., 0.1),
        Err(BodyError::WrongBodyType { .. })
    ));
}

#[test]
fn test_coupled_body_interpolates_prescribed_motion() {
    let env = Environment::default();
    let mut body = Body::setup(2, BodyType::Coupled, buoy(), &env).unwrap();
    body.add_connection_to_body(0, [0., 0., 2.]).unwrap();
    let mut nodes = vec![Node::default()];
    let mut rods: Vec<Rod> = vec![];

    let r0 = [0.1, 0.2, -5., 0.01, -0.02, 0.3];
    let rd0 = [1., 0., 0., 0., 0., 0.1];
    body.initialize_unfree_body(&r0, &rd0, 0., &mut nodes, &mut rods)
        .unwrap();

    let r1 = [0.7, -0.3, -4.9, 0.03, 0.01, 0.35];
    let rd1 = [0.9, 0.1, 0.2, 0.01, 0., 0.12];
    body.initiate_step(&r1, &rd1, 0., 0.5).unwrap();

    body.update_fairlead(0.).unwrap();
    assert_eq!(body.get_body_state(), (r0, rd0));

    body.update_fairlead(0.5).unwrap();
    assert_eq!(body.get_body_state(), (r1, rd1));

    body.update_fairlead(0.125).unwrap();
    let (r6, v6) = body.get_body_state();
    for i in 0..6 {
        assert_relative_eq!(r6[i], 0.75 * r0[i] + 0.25 * r1[i], epsilon = 1e-14);
        assert_relative_eq!(v6[i], 0.75 * rd0[i] + 0.25 * rd1[i], epsilon = 1e-14);
    }

    // Outside the interval the prescribed motion is held at the ends
    body.update_fairlead(0.8).unwrap();
    assert_eq!(body.get_body_state(), (r1, rd1));

    // The next interval starts where the previous one ended
    let r2 = [1.2, -0.6, -4.8, 0.05, 0.02, 0.4];
    body.initiate_step(&r2, &[0.; 6], 0.5, 0.5).unwrap();
    body.update_fairlead(0.5).unwrap();
    assert_eq!(body.get_body_state(), (r1, rd1));
    body.update_fairlead(1.).unwrap();
    assert_eq!(body.get_body_state(), (r2, [0.; 6]));

    // The attachment follows the interpolated pose
    body.set_dependent_states(&mut nodes, &mut rods).unwrap();
    let p = body.kinematics().point_position(&[0., 0., 2.]);
    assert_eq!(nodes[0].position, p);

    // Net force is still reported, but the body is not integrated
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();
    assert_eq!(body.get_acceleration(), [0.; 6]);
    assert!(body.get_fnet()[2].abs() < 1e-9);
    assert!(matches!(
        body.get_state_deriv(),
        Err(BodyError::WrongBodyType { .. })
    ));
}

#[test]
fn test_neutral_body_in_still_water_stays_at_rest() {
    let env = Environment::default();
    let mut props = buoy();
    props.ca = [0.5, 0.5, 1., 0.1, 0.1, 0.1];
    let mut body = Body::setup(3, BodyType::Free, props, &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];

    let x = body.initialize_body(&mut nodes, &mut rods).unwrap();
    assert_eq!(x, [0., 0., -5., 0., 0., 0., 0., 0., 0., 0., 0., 0.]);

    body.set_state(&x, 0.).unwrap();
    body.set_dependent_states(&mut nodes, &mut rods).unwrap();
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();

    assert_eq!(body.get_acceleration(), [0.; 6]);
    assert_eq!(body.get_state_deriv().unwrap(), [0.; 12]);
}

#[test]
fn test_free_body_sinks_under_net_weight() {
    let env = Environment::default();
    let mut props = buoy();
    props.mass = 4100.;
    props.ca = [0., 0., 1., 0., 0., 0.];
    let mut body = Body::setup(4, BodyType::Free, props, &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];

    let x = body.initialize_body(&mut nodes, &mut rods).unwrap();
    body.set_state(&x, 0.).unwrap();
    body.set_dependent_states(&mut nodes, &mut rods).unwrap();
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();

    // (rho V - m) g / (m + rho V Ca)
    let expected = (2050. - 4100.) * env.gravity / (4100. + 2050.);
    let a6 = body.get_acceleration();
    assert_relative_eq!(a6[2], expected, epsilon = 1e-12);
    assert_relative_eq!(a6[0], 0., epsilon = 1e-12);
    assert_relative_eq!(a6[3], 0., epsilon = 1e-12);
}

#[test]
fn test_step_protocol_order_is_enforced() {
    let env = Environment::default();
    let mut body = Body::setup(5, BodyType::Free, buoy(), &env).unwrap();
    let mut nodes = vec![Node::default()];
    let mut rods: Vec<Rod> = vec![];
    body.add_connection_to_body(0, [0., 1., 0.]).unwrap();
    assert_eq!(body.phase(), StepPhase::Setup);

    assert!(matches!(
        body.set_state(&[0.; 12], 0.),
        Err(BodyError::OutOfPhase { .. })
    ));
    assert!(matches!(
        body.set_dependent_states(&mut nodes, &mut rods),
        Err(BodyError::OutOfPhase { .. })
    ));

    let x = body.initialize_body(&mut nodes, &mut rods).unwrap();
    assert_eq!(body.phase(), StepPhase::Propagated);

    body.set_state(&x, 0.1).unwrap();
    assert_eq!(body.phase(), StepPhase::PoseSet);
    assert!(matches!(
        body.do_rhs(&env, &StillWater, &nodes, &rods),
        Err(BodyError::OutOfPhase { found: StepPhase::PoseSet, .. })
    ));
    assert!(matches!(
        body.get_state_deriv(),
        Err(BodyError::OutOfPhase { .. })
    ));

    body.set_dependent_states(&mut nodes, &mut rods).unwrap();
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();
    assert_eq!(body.phase(), StepPhase::Evaluated);
    body.get_state_deriv().unwrap();

    // Attachments are fixed once the body is initialised
    assert!(matches!(
        body.add_connection_to_body(1, [0., 0., 1.]),
        Err(BodyError::OutOfPhase { .. })
    ));
    assert_eq!(body.attachments().connections().len(), 1);
}

#[test]
fn test_non_finite_state_is_reported() {
    let env = Environment::default();
    let mut body = Body::setup(6, BodyType::Free, buoy(), &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    let mut x = body.initialize_body(&mut nodes, &mut rods).unwrap();

    x[7] = f64::NAN;
    let err = body.set_state(&x, 2.5).unwrap_err();
    assert!(err.is_numerical());
    match err {
        BodyError::NonFinite { body, time, .. } => {
            assert_eq!(body, 6);
            assert_eq!(time, 2.5);
        }
        e => panic!("unexpected error {e}"),
    }

    // A non-finite connection force poisons the net force
    let mut body = Body::setup(7, BodyType::Free, buoy(), &env).unwrap();
    body.add_connection_to_body(0, [0., 0., 1.]).unwrap();
    let mut nodes = vec![Node {
        force: [f64::INFINITY, 0., 0.],
        ..Default::default()
    }];
    body.initialize_body(&mut nodes, &mut rods).unwrap();
    let err = body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap_err();
    assert!(matches!(err, BodyError::NonFinite { body: 7, .. }));
}

#[test]
fn test_gimbal_lock_is_reported() {
    let env = Environment::default();
    let mut props = buoy();
    props.r6 = [0., 0., -5., 0., std::f64::consts::FRAC_PI_2, 0.];
    let mut body = Body::setup(8, BodyType::Free, props, &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_body(&mut nodes, &mut rods).unwrap();
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();
    assert!(matches!(
        body.get_state_deriv(),
        Err(BodyError::NonFinite { body: 8, .. })
    ));
}

#[test]
fn test_singular_mass_matrix_is_reported() {
    let env = Environment::default();
    let mut props = buoy();
    props.inertia = [0.; 3];
    let mut body = Body::setup(9, BodyType::Free, props, &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_body(&mut nodes, &mut rods).unwrap();
    let err = body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap_err();
    assert!(err.is_numerical());
    assert!(matches!(err, BodyError::SingularMass { body: 9, .. }));
}

#[test]
fn test_invalid_properties_are_rejected() {
    let env = Environment::default();
    let cases: [(&str, fn(&mut BodyProperties)); 5] = [
        ("zero mass", |p| p.mass = 0.),
        ("negative volume", |p| p.volume = -1.),
        ("negative inertia", |p| p.inertia[1] = -3.),
        ("negative drag", |p| p.cda[4] = -0.1),
        ("nan position", |p| p.r6[0] = f64::NAN),
    ];
    for (name, modify) in cases {
        let mut props = buoy();
        modify(&mut props);
        let err = Body::setup(1, BodyType::Free, props, &env).unwrap_err();
        assert!(err.is_configuration(), "{name}: {err}");
    }
}

#[test]
fn test_output_file_and_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("body1.out");
    let env = Environment::default();
    let mut props = buoy();
    props.mass = 3000.;

    let mut body = Body::setup(1, BodyType::Free, props, &env).unwrap();
    body.open_output(&path).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    let x = body.initialize_body(&mut nodes, &mut rods).unwrap();
    body.set_state(&x, 0.).unwrap();
    body.set_dependent_states(&mut nodes, &mut rods).unwrap();
    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();
    body.output(0.).unwrap();
    body.output(0.1).unwrap();

    let (id, pz) = OutputChannel::parse("Body1PZ").unwrap();
    assert_eq!(id, 1);
    assert_eq!(body.get_body_output(&pz), -5.);

    let (r6, v6) = body.get_body_state();
    let f6 = body.get_fnet();
    let groups = [
        (["PX", "PY", "PZ", "RX", "RY", "RZ"], r6),
        (["VX", "VY", "VZ", "RVX", "RVY", "RVZ"], v6),
        (["FX", "FY", "FZ", "MX", "MY", "MZ"], f6),
    ];
    for (suffixes, values) in groups.iter() {
        for (i, suffix) in suffixes.iter().enumerate() {
            let (_, channel) = OutputChannel::parse(&format!("Body1{suffix}")).unwrap();
            assert_eq!(channel.index(), i, "{suffix}");
            assert_eq!(body.get_body_output(&channel), values[i], "{suffix}");
        }
    }
    let (_, fz) = OutputChannel::parse("Body1FZ").unwrap();
    assert_relative_eq!(
        body.get_body_output(&fz),
        (2050. - 3000.) * env.gravity,
        epsilon = 1e-9
    );

    drop(body);
    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].split('\t').count(), 19);
    assert_eq!(lines[2].split('\t').count(), 19);
}

#[test]
fn test_ill_conditioned_mass_matrix_is_reported() {
    let env = Environment::default();
    let mut props = buoy();
    props.inertia = [1e-30; 3];
    let mut body = Body::setup(10, BodyType::Free, props, &env).unwrap();
    body.add_connection_to_body(0, [1., 0., 0.]).unwrap();
    let mut nodes = vec![Node {
        force: [0., 0., 10.],
        ..Default::default()
    }];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_body(&mut nodes, &mut rods).unwrap();

    let err = body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap_err();
    assert!(err.is_numerical());
    assert!(matches!(err, BodyError::SingularMass { body: 10, .. }));
}

#[test]
fn test_flow_acceleration_force() {
    let env = Environment::default();
    let mut props = buoy();
    props.ca = [1., 0., 0.5, 0., 0., 0.];
    let mut body = Body::setup(11, BodyType::Free, props, &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_body(&mut nodes, &mut rods).unwrap();

    let flow = AcceleratingFlow {
        acceleration: [1., 0., -2.],
    };
    body.do_rhs(&env, &flow, &nodes, &rods).unwrap();

    // rho V (1 + Ca) du/dt per axis
    let rho_v = env.water_density * 2.;
    let f6 = body.get_fnet();
    assert_relative_eq!(f6[0], rho_v * 2., epsilon = 1e-9);
    assert_relative_eq!(f6[1], 0., epsilon = 1e-9);
    assert_relative_eq!(f6[2], rho_v * 1.5 * -2., epsilon = 1e-9);
    assert_relative_eq!(f6[4], 0., epsilon = 1e-9);

    // A neutrally buoyant body follows the flow along x, where
    // m + rho V Ca equals rho V (1 + Ca)
    let a6 = body.get_acceleration();
    assert_relative_eq!(a6[0], 1., epsilon = 1e-12);
    assert_relative_eq!(a6[2], rho_v * 1.5 * -2. / (2050. + rho_v * 0.5), epsilon = 1e-12);
}

#[test]
fn test_drag_from_current() {
    struct Case {
        yaw: f64,
        heading: f64,
        expected: [f64; 3],
    }
    let env = Environment::default();
    let q = 0.5 * env.water_density * 1.5 * 1.5;
    let cases = [
        // Current along body x
        Case {
            yaw: 0.,
            heading: 0.,
            expected: [q * 1., 0., 0.],
        },
        // Current along -y uses the y drag area
        Case {
            yaw: 0.,
            heading: -FRAC_PI_2,
            expected: [0., -q * 3., 0.],
        },
        // Body turned so global x is body -y
        Case {
            yaw: FRAC_PI_2,
            heading: 0.,
            expected: [q * 3., 0., 0.],
        },
    ];

    for case in cases.iter() {
        let mut props = buoy();
        props.r6[5] = case.yaw;
        props.cda = [1., 3., 2., 0.5, 0.5, 0.5];
        let r6 = props.r6;
        let mut body = Body::setup(12, BodyType::Fixed, props, &env).unwrap();
        let mut nodes: Vec<Node> = vec![];
        let mut rods: Vec<Rod> = vec![];
        body.initialize_unfree_body(&r6, &[0.; 6], 0., &mut nodes, &mut rods)
            .unwrap();

        let current = UniformCurrent::new(1.5, case.heading);
        body.do_rhs(&env, &current, &nodes, &rods).unwrap();
        let f6 = body.get_fnet();
        for i in 0..3 {
            assert_relative_eq!(f6[i], case.expected[i], epsilon = 1e-9);
            assert_relative_eq!(f6[i + 3], 0., epsilon = 1e-9);
        }

        // Scaling the drag areas scales the force
        body.scale_drag(2.);
        body.set_dependent_states(&mut nodes, &mut rods).unwrap();
        body.do_rhs(&env, &current, &nodes, &rods).unwrap();
        let f6 = body.get_fnet();
        for i in 0..3 {
            assert_relative_eq!(f6[i], 2. * case.expected[i], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_coupled_yaw_interpolates_through_pi() {
    let env = Environment::default();
    let mut body = Body::setup(13, BodyType::Coupled, buoy(), &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];

    let r0 = [0., 0., -5., 0., 0., 3.1];
    body.initialize_unfree_body(&r0, &[0.; 6], 0., &mut nodes, &mut rods)
        .unwrap();
    let r1 = [0., 0., -5., 0., 0., -3.1];
    body.initiate_step(&r1, &[0.; 6], 0., 1.).unwrap();

    body.update_fairlead(0.5).unwrap();
    let (r6, _) = body.get_body_state();
    assert_relative_eq!(r6[5], PI, epsilon = 1e-12);

    // The end pose is the prescribed orientation, one turn on
    body.update_fairlead(1.).unwrap();
    let (r6, _) = body.get_body_state();
    assert_relative_eq!(r6[5], -3.1 + 2. * PI, epsilon = 1e-12);
    let expected = rotation_matrix(&[0., 0., -3.1]);
    let actual = body.orientation();
    for i in 0..3 {
        for j in 0..3 {
            assert_relative_eq!(actual[(i, j)], expected[(i, j)], epsilon = 1e-12);
        }
    }

    // Angles within half a turn are passed through unchanged
    let r2 = [1., 0., -5., 0.1, -0.1, 3.];
    body.initiate_step(&r2, &[0.; 6], 1., 1.).unwrap();
    body.update_fairlead(2.).unwrap();
    assert_eq!(body.get_body_state().0, r2);
}

#[test]
fn test_water_density_must_match_setup() {
    let env = Environment::default();
    let mut body = Body::setup(14, BodyType::Free, buoy(), &env).unwrap();
    let mut nodes: Vec<Node> = vec![];
    let mut rods: Vec<Rod> = vec![];
    body.initialize_body(&mut nodes, &mut rods).unwrap();

    let fresh = Environment {
        water_density: 1000.,
        ..Environment::default()
    };
    let err = body.do_rhs(&fresh, &StillWater, &nodes, &rods).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(body.phase(), StepPhase::Propagated);

    body.do_rhs(&env, &StillWater, &nodes, &rods).unwrap();
}
