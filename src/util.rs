use faer::{Mat, MatMut, MatRef};

/// Tolerance below which `cos(pitch)` is treated as gimbal lock
pub const GIMBAL_LOCK_TOL: f64 = 1e-8;

// Returns the cross product of two vectors
#[inline]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Populates `m` with the skew-symmetric matrix of `v` such that `m * x == v x x`.
///
/// # Panics
/// Panics if `m.nrows() < 3`.  
/// Panics if `m.ncols() < 3`.  
pub fn vec_tilde(v: &[f64; 3], mut m: MatMut<f64>) {
    // [0., -v[2], v[1]]
    // [v[2], 0., -v[0]]
    // [-v[1], v[0], 0.]
    m[(0, 0)] = 0.;
    m[(1, 0)] = v[2];
    m[(2, 0)] = -v[1];
    m[(0, 1)] = -v[2];
    m[(1, 1)] = 0.;
    m[(2, 1)] = v[0];
    m[(0, 2)] = v[1];
    m[(1, 2)] = -v[0];
    m[(2, 2)] = 0.;
}

/// Returns the skew-symmetric (tilde) matrix of `v`
pub fn tilde(v: &[f64; 3]) -> Mat<f64> {
    let mut m = Mat::<f64>::zeros(3, 3);
    vec_tilde(v, m.as_mut());
    m
}

/// Populates matrix with the rotation matrix of roll/pitch/yaw angles
/// applied as the intrinsic z-y-x sequence, `R = Rz(yaw) Ry(pitch) Rx(roll)`.
///
/// # Panics
/// Panics if `m.nrows() < 3`.  
/// Panics if `m.ncols() < 3`.  
#[inline]
pub fn euler_as_matrix(angles: &[f64; 3], mut m: MatMut<f64>) {
    let (s1, c1) = angles[0].sin_cos();
    let (s2, c2) = angles[1].sin_cos();
    let (s3, c3) = angles[2].sin_cos();

    m[(0, 0)] = c3 * c2;
    m[(0, 1)] = c3 * s2 * s1 - s3 * c1;
    m[(0, 2)] = c3 * s2 * c1 + s3 * s1;

    m[(1, 0)] = s3 * c2;
    m[(1, 1)] = s3 * s2 * s1 + c3 * c1;
    m[(1, 2)] = s3 * s2 * c1 - c3 * s1;

    m[(2, 0)] = -s2;
    m[(2, 1)] = c2 * s1;
    m[(2, 2)] = c2 * c1;
}

/// Returns the rotation matrix of roll/pitch/yaw angles
pub fn rotation_matrix(angles: &[f64; 3]) -> Mat<f64> {
    let mut m = Mat::<f64>::zeros(3, 3);
    euler_as_matrix(angles, m.as_mut());
    m
}

/// Global angular velocity produced by the given roll/pitch/yaw rates
pub fn euler_rates_as_angular_velocity(angles: &[f64; 3], rates: &[f64; 3]) -> [f64; 3] {
    let (s2, c2) = angles[1].sin_cos();
    let (s3, c3) = angles[2].sin_cos();
    [
        c3 * c2 * rates[0] - s3 * rates[1],
        s3 * c2 * rates[0] + c3 * rates[1],
        -s2 * rates[0] + rates[2],
    ]
}

/// Roll/pitch/yaw rates that produce the global angular velocity `omega`.
///
/// Returns `None` at gimbal lock (`|cos(pitch)|` below [`GIMBAL_LOCK_TOL`]).
pub fn angular_velocity_as_euler_rates(angles: &[f64; 3], omega: &[f64; 3]) -> Option<[f64; 3]> {
    let (s2, c2) = angles[1].sin_cos();
    if c2.abs() < GIMBAL_LOCK_TOL {
        return None;
    }
    let (s3, c3) = angles[2].sin_cos();
    let roll_rate = (c3 * omega[0] + s3 * omega[1]) / c2;
    Some([
        roll_rate,
        -s3 * omega[0] + c3 * omega[1],
        omega[2] + s2 * roll_rate,
    ])
}

/// Multiplies a 3x3 matrix by a vector
#[inline]
pub fn mat3_vec(m: MatRef<f64>, v: &[f64; 3]) -> [f64; 3] {
    [
        m[(0, 0)] * v[0] + m[(0, 1)] * v[1] + m[(0, 2)] * v[2],
        m[(1, 0)] * v[0] + m[(1, 1)] * v[1] + m[(1, 2)] * v[2],
        m[(2, 0)] * v[0] + m[(2, 1)] * v[1] + m[(2, 2)] * v[2],
    ]
}

/// Multiplies the transpose of a 3x3 matrix by a vector
#[inline]
pub fn mat3_transpose_vec(m: MatRef<f64>, v: &[f64; 3]) -> [f64; 3] {
    [
        m[(0, 0)] * v[0] + m[(1, 0)] * v[1] + m[(2, 0)] * v[2],
        m[(0, 1)] * v[0] + m[(1, 1)] * v[1] + m[(2, 1)] * v[2],
        m[(0, 2)] * v[0] + m[(1, 2)] * v[1] + m[(2, 2)] * v[2],
    ]
}

pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

pub fn mat_all_finite(m: MatRef<f64>) -> bool {
    (0..m.ncols()).all(|j| (0..m.nrows()).all(|i| m[(i, j)].is_finite()))
}

/// Splits a 6-vector into its translational and rotational parts
#[inline]
pub fn split6(v: &[f64; 6]) -> ([f64; 3], [f64; 3]) {
    ([v[0], v[1], v[2]], [v[3], v[4], v[5]])
}

#[inline]
pub fn join6(a: &[f64; 3], b: &[f64; 3]) -> [f64; 6] {
    [a[0], a[1], a[2], b[0], b[1], b[2]]
}
