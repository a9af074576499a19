// SPDX-License-Identifier: GPL-3.0-only

//! Camera geometry derived from raw projection matrices
//!
//! Each 3×4 projection matrix `P ~ K [R | t]` is decomposed with an RQ
//! factorisation of its left 3×3 block. All cameras are then re-expressed in
//! the reference camera's frame (reference at the origin, identity rotation),
//! which is the frame the matcher reports points in.

use crate::errors::ConfigurationError;
use nalgebra::{Matrix3, Matrix3x4, Vector3};
use tracing::debug;

/// 3x4 camera projection matrix `P = K [R | t]`.
pub type Mat34 = Matrix3x4<f64>;

/// Relative determinant below which the left 3×3 block is treated as singular
const SINGULAR_EPS: f64 = 1e-12;

/// Decomposition of a projection matrix into `K`, `R`, `t`
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Intrinsics (upper-triangular, positive diagonal, `K[2,2] == 1`)
    pub k: Matrix3<f64>,
    /// Rotation (orthonormal, det = +1)
    pub r: Matrix3<f64>,
    /// Translation in camera coordinates
    pub t: Vector3<f64>,
}

/// Per-camera working parameters
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection matrix as supplied
    pub p: Mat34,
    /// Projection matrix in the reference camera frame
    pub p_ref: Mat34,
    /// Intrinsics
    pub k: Matrix3<f64>,
    /// Inverse intrinsics
    pub k_inv: Matrix3<f64>,
    /// Rotation, reference frame to camera
    pub r: Matrix3<f64>,
    /// Translation, reference frame to camera
    pub t: Vector3<f64>,
    /// Camera center in the reference frame
    pub center: Vector3<f64>,
    /// Distance to the reference camera center
    pub baseline: f64,
    /// Depth bounds in effect for the current resolution
    pub depth_min: f32,
    pub depth_max: f32,
    /// Disparity bounds derived from the depth bounds (zero for cameras
    /// outside the view selection)
    pub disparity_min: f32,
    pub disparity_max: f32,
}

impl Camera {
    /// Unit viewing ray through pixel `(u, v)`, in the reference frame
    pub fn view_direction(&self, u: f64, v: f64) -> Vector3<f64> {
        let ray = self.r.transpose() * (self.k_inv * Vector3::new(u, v, 1.0));
        ray.normalize()
    }

    /// Matrix mapping homogeneous pixels to (unnormalised) reference-frame rays
    pub fn pixel_to_ray(&self) -> Matrix3<f64> {
        self.r.transpose() * self.k_inv
    }
}

/// Camera set owned by one stage instance
#[derive(Debug, Clone)]
pub struct CameraParameters {
    /// Index of the reference camera
    pub reference: usize,
    /// Focal length (pixels) of the reference camera
    pub f: f64,
    /// One entry per input camera
    pub cameras: Vec<Camera>,
    /// Camera indices usable as stereo partners of the reference camera
    pub view_selection_subset: Vec<usize>,
}

impl CameraParameters {
    /// Number of cameras
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Whether no cameras are configured
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// The reference camera
    pub fn reference_camera(&self) -> &Camera {
        &self.cameras[self.reference]
    }

    /// Number of selected partner views
    pub fn view_selection_count(&self) -> usize {
        self.view_selection_subset.len()
    }
}

/// Build a projection matrix from 12 row-major values
pub fn projection_from_row_major(
    camera: usize,
    values: &[f32],
) -> Result<Mat34, ConfigurationError> {
    if values.len() != 12 {
        return Err(ConfigurationError::ProjectionSize {
            camera,
            got: values.len(),
        });
    }
    let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    Ok(Mat34::from_row_slice(&values))
}

/// RQ decomposition of a 3x3 matrix.
///
/// Returns `(K, R)` with `K` upper-triangular with positive diagonal and `R`
/// orthonormal.
pub fn rq_decompose(m: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let j = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);

    let m1 = j * m.transpose() * j;
    let qr = m1.qr();

    let mut k = j * qr.r().transpose() * j;
    let mut r = j * qr.q().transpose() * j;

    let mut d = Matrix3::identity();
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            d[(i, i)] = -1.0;
        }
    }
    k *= d;
    r = d * r;

    (k, r)
}

/// Decompose a projection matrix into `K`, `R`, `t` with `P ~ K [R | t]`.
pub fn decompose_projection(camera: usize, p: &Mat34) -> Result<Decomposition, ConfigurationError> {
    let degenerate = |reason: &str| ConfigurationError::DegenerateProjection {
        camera,
        reason: reason.to_string(),
    };

    if p.iter().any(|v| !v.is_finite()) {
        return Err(degenerate("non-finite entries"));
    }

    let m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let scale = m.norm();
    if scale == 0.0 || m.determinant().abs() <= SINGULAR_EPS * scale.powi(3) {
        return Err(degenerate("singular left 3x3 block"));
    }

    let (mut k, mut r) = rq_decompose(&m);
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| degenerate("intrinsics matrix is not invertible"))?;
    let mut t = k_inv * p.column(3);

    // P is only defined up to sign; keep R a proper rotation.
    if r.determinant() < 0.0 {
        r = -r;
        t = -t;
    }

    let k22 = k[(2, 2)];
    if k22.abs() <= f64::EPSILON {
        return Err(degenerate("zero K[2,2]"));
    }
    k /= k22;

    Ok(Decomposition { k, r, t })
}

/// Derive per-camera parameters relative to `reference`.
///
/// Depth and disparity bounds and the view selection are left empty; they
/// depend on the frame resolution and are filled in when it is established.
pub fn derive_camera_parameters(
    raw: &[Mat34],
    reference: usize,
) -> Result<CameraParameters, ConfigurationError> {
    if raw.len() < crate::constants::view_selection::MIN_CAMERAS {
        return Err(ConfigurationError::TooFewCameras {
            min: crate::constants::view_selection::MIN_CAMERAS,
            got: raw.len(),
        });
    }
    if reference >= raw.len() {
        return Err(ConfigurationError::ReferenceOutOfRange {
            reference,
            cameras: raw.len(),
        });
    }

    let decompositions = raw
        .iter()
        .enumerate()
        .map(|(i, p)| decompose_projection(i, p))
        .collect::<Result<Vec<_>, _>>()?;

    let ref_r = decompositions[reference].r;
    let ref_t = decompositions[reference].t;

    let mut cameras = Vec::with_capacity(raw.len());
    for (i, (p, d)) in raw.iter().zip(&decompositions).enumerate() {
        // x_cam = R_i X + t_i and X = R_ref^T (X_ref - t_ref)
        let r = d.r * ref_r.transpose();
        let t = d.t - r * ref_t;
        let center = -(r.transpose() * t);

        let k_inv = d.k.try_inverse().ok_or_else(|| ConfigurationError::DegenerateProjection {
            camera: i,
            reason: "intrinsics matrix is not invertible".to_string(),
        })?;

        let mut p_ref = Mat34::zeros();
        p_ref.fixed_view_mut::<3, 3>(0, 0).copy_from(&(d.k * r));
        p_ref.set_column(3, &(d.k * t));

        cameras.push(Camera {
            p: *p,
            p_ref,
            k: d.k,
            k_inv,
            r,
            t,
            center,
            baseline: 0.0,
            depth_min: 0.0,
            depth_max: 0.0,
            disparity_min: 0.0,
            disparity_max: 0.0,
        });
    }

    let ref_center = cameras[reference].center;
    for camera in &mut cameras {
        camera.baseline = (camera.center - ref_center).norm();
    }

    let f = cameras[reference].k[(0, 0)];
    debug!(
        cameras = cameras.len(),
        reference,
        focal_length = f,
        "Derived camera geometry"
    );

    Ok(CameraParameters {
        reference,
        f,
        cameras,
        view_selection_subset: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn compose(k: &Matrix3<f64>, r: &Matrix3<f64>, t: &Vector3<f64>) -> Mat34 {
        let mut p = Mat34::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * r));
        p.set_column(3, &(k * t));
        p
    }

    fn intrinsics() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_rq_decompose_recovers_k_r() {
        let k = intrinsics();
        let r = *Rotation3::from_euler_angles(0.1, -0.2, 0.3).matrix();
        let (k_est, r_est) = rq_decompose(&(k * r));
        assert_relative_eq!(k_est, k, epsilon = 1e-8);
        assert_relative_eq!(r_est, r, epsilon = 1e-10);
    }

    #[test]
    fn test_decompose_is_scale_invariant() {
        let k = intrinsics();
        let r = *Rotation3::from_euler_angles(0.05, 0.4, -0.1).matrix();
        let t = Vector3::new(0.3, -0.1, 2.0);
        let p = compose(&k, &r, &t) * -3.5;

        let d = decompose_projection(0, &p).unwrap();
        assert_relative_eq!(d.k, k, epsilon = 1e-8);
        assert_relative_eq!(d.r, r, epsilon = 1e-10);
        assert_relative_eq!(d.t, t, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_projection_is_degenerate() {
        let p = Mat34::from_row_slice(&[
            1.0, 2.0, 3.0, 0.0, //
            2.0, 4.0, 6.0, 0.0, //
            0.0, 0.0, 1.0, 1.0,
        ]);
        assert!(matches!(
            decompose_projection(4, &p),
            Err(ConfigurationError::DegenerateProjection { camera: 4, .. })
        ));
    }

    #[test]
    fn test_reference_frame_and_baseline() {
        let k = intrinsics();
        let r0 = *Rotation3::from_euler_angles(0.0, 0.3, 0.0).matrix();
        let t0 = Vector3::new(0.0, 0.0, 5.0);
        // Second camera: same orientation, shifted 0.5 along the reference x axis
        let t1 = t0 - Vector3::new(0.5, 0.0, 0.0);

        let params =
            derive_camera_parameters(&[compose(&k, &r0, &t0), compose(&k, &r0, &t1)], 0).unwrap();

        let reference = params.reference_camera();
        assert_relative_eq!(reference.r, Matrix3::identity(), epsilon = 1e-10);
        assert_relative_eq!(reference.center.norm(), 0.0, epsilon = 1e-10);
        assert_relative_eq!(params.f, 800.0, epsilon = 1e-8);
        assert_relative_eq!(params.cameras[1].baseline, 0.5, epsilon = 1e-10);
        assert_relative_eq!(
            params.cameras[1].center,
            Vector3::new(0.5, 0.0, 0.0),
            epsilon = 1e-10
        );
        assert!(params.view_selection_subset.is_empty());
    }

    #[test]
    fn test_view_direction_through_principal_point() {
        let k = intrinsics();
        let p = compose(&k, &Matrix3::identity(), &Vector3::zeros());
        let params = derive_camera_parameters(&[p, p], 0).unwrap();
        let dir = params.cameras[0].view_direction(320.0, 240.0);
        assert_relative_eq!(dir, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_too_few_cameras() {
        let p = compose(&intrinsics(), &Matrix3::identity(), &Vector3::zeros());
        assert_eq!(
            derive_camera_parameters(&[p], 0).unwrap_err(),
            ConfigurationError::TooFewCameras { min: 2, got: 1 }
        );
    }

    #[test]
    fn test_projection_from_row_major_size() {
        assert!(projection_from_row_major(2, &[0.0; 11]).is_err());
        let p = projection_from_row_major(0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0])
            .unwrap();
        assert_eq!(p[(0, 3)], 4.0);
        assert_eq!(p[(2, 0)], 9.0);
    }
}
