use faer::{Mat, MatRef};
use itertools::Itertools;

use crate::attachments::{PointLoad, RodLoad};
use crate::body::BodyProperties;
use crate::util::tilde;

#[inline]
fn mat_mul(a: MatRef<f64>, b: MatRef<f64>) -> Mat<f64> {
    a * b
}

/// Block-diagonal `[R 0; 0 R]` used to rotate 6x6 matrices
pub fn rotation_6x6(r: MatRef<f64>) -> Mat<f64> {
    let mut rr = Mat::<f64>::zeros(6, 6);
    rr.as_mut().submatrix_mut(0, 0, 3, 3).copy_from(r);
    rr.as_mut().submatrix_mut(3, 3, 3, 3).copy_from(r);
    rr
}

/// Rotates a 6x6 mass matrix from the body frame to the global frame,
/// `RR0 M RR0^T`
pub fn rotate_mass_6(r: MatRef<f64>, m: MatRef<f64>) -> Mat<f64> {
    let rr0 = rotation_6x6(r);
    let tmp = mat_mul(rr0.as_ref(), m);
    mat_mul(tmp.as_ref(), rr0.transpose())
}

/// Mass matrix about a reference point of a translational mass `m3` located
/// at `r` from that point.
///
/// `[M, -M r~; r~ M, -r~ M r~]`
pub fn translate_mass_3to6(r: &[f64; 3], m3: MatRef<f64>) -> Mat<f64> {
    let h = tilde(r);
    let mh = mat_mul(m3, h.as_ref());
    let hm = mat_mul(h.as_ref(), m3);
    let hmh = mat_mul(hm.as_ref(), h.as_ref());

    let mut m6 = Mat::<f64>::zeros(6, 6);
    for i in 0..3 {
        for j in 0..3 {
            m6[(i, j)] = m3[(i, j)];
            m6[(i, j + 3)] = -mh[(i, j)];
            m6[(i + 3, j)] = hm[(i, j)];
            m6[(i + 3, j + 3)] = -hmh[(i, j)];
        }
    }
    m6
}

/// Moves a 6x6 mass matrix about a point located at `r` from the reference
/// point so it is expressed about the reference point (parallel-axis rule).
///
/// With `M = [A B; B^T C]` and `H = r~` the result is
/// `[A, B - A H; B^T + H A, C + H B - B^T H - H A H]`.
pub fn translate_mass_6(r: &[f64; 3], m: MatRef<f64>) -> Mat<f64> {
    let h = tilde(r);
    let a = m.submatrix(0, 0, 3, 3);
    let b = m.submatrix(0, 3, 3, 3);
    let bt = m.submatrix(3, 0, 3, 3);
    let c = m.submatrix(3, 3, 3, 3);

    let ah = mat_mul(a, h.as_ref());
    let ha = mat_mul(h.as_ref(), a);
    let hb = mat_mul(h.as_ref(), b);
    let bth = mat_mul(bt, h.as_ref());
    let hah = mat_mul(ha.as_ref(), h.as_ref());

    let mut out = Mat::<f64>::zeros(6, 6);
    for i in 0..3 {
        for j in 0..3 {
            out[(i, j)] = a[(i, j)];
            out[(i, j + 3)] = b[(i, j)] - ah[(i, j)];
            out[(i + 3, j)] = bt[(i, j)] + ha[(i, j)];
            out[(i + 3, j + 3)] = c[(i, j)] + hb[(i, j)] - bth[(i, j)] - hah[(i, j)];
        }
    }
    out
}

/// Body mass and inertia about the centre of gravity moved to the reference
/// point, plus the body's own added mass. Expressed in the body frame.
pub fn baseline_mass_matrix(props: &BodyProperties, water_density: f64) -> Mat<f64> {
    let mut m_cg = Mat::<f64>::zeros(6, 6);
    (0..3).for_each(|i| {
        m_cg[(i, i)] = props.mass;
        m_cg[(i + 3, i + 3)] = props.inertia[i];
    });
    let mut m0 = translate_mass_6(&props.cg, m_cg.as_ref());

    // Added mass, diagonal about the reference point
    let displaced_mass = water_density * props.volume;
    (0..3).for_each(|i| {
        m0[(i, i)] += displaced_mass * props.ca[i];
        m0[(i + 3, i + 3)] += props.ca[i + 3] * displaced_mass / props.mass * props.inertia[i];
    });
    m0
}

/// Builds the combined mass matrix each step.
///
/// `M = RR0 M0 RR0^T + sum(connection and rod contributions)`, all about the
/// body reference point in the global frame.
#[derive(Debug, Clone)]
pub struct MassAssembler {
    /// Baseline mass matrix, body frame `[6][6]`
    m0: Mat<f64>,
}

impl MassAssembler {
    pub fn new(props: &BodyProperties, water_density: f64) -> Self {
        Self {
            m0: baseline_mass_matrix(props, water_density),
        }
    }

    /// Baseline mass matrix in the body frame
    pub fn m0(&self) -> MatRef<'_, f64> {
        self.m0.as_ref()
    }

    /// Combined mass matrix for the given orientation.
    ///
    /// Connection and rod loads are paired with the global lever arm from the
    /// body reference point to the connection or rod end A.
    pub fn assemble(
        &self,
        orientation: MatRef<f64>,
        connections: &[([f64; 3], PointLoad)],
        rods: &[([f64; 3], RodLoad)],
    ) -> Mat<f64> {
        let mut m = rotate_mass_6(orientation, self.m0.as_ref());

        let contributions = connections
            .iter()
            .map(|(arm, load)| translate_mass_3to6(arm, load.mass.as_ref()))
            .chain(
                rods.iter()
                    .map(|(arm, load)| translate_mass_6(arm, load.mass.as_ref())),
            )
            .collect_vec();

        contributions.iter().for_each(|mc| {
            for j in 0..6 {
                for i in 0..6 {
                    m[(i, j)] += mc[(i, j)];
                }
            }
        });
        m
    }
}
