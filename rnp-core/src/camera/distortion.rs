use super::CameraModelKind;

/// Lens distortion coefficients in the trainer's layout.
///
/// Radial terms `k1..k4` and tangential terms `p1, p2`. Coefficients a camera
/// model does not carry are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub p1: f64,
    pub p2: f64,
}

impl Distortion {
    /// No distortion
    pub fn none() -> Self {
        Self::default()
    }

    /// Pick the distortion terms out of a full parameter list.
    ///
    /// `params` must hold at least `model.num_params()` values.
    pub(super) fn from_params(model: CameraModelKind, params: &[f64]) -> Self {
        match model {
            CameraModelKind::SimplePinhole | CameraModelKind::Pinhole => Self::none(),
            CameraModelKind::SimpleRadial => Self {
                k1: params[3],
                ..Self::default()
            },
            CameraModelKind::Radial => Self {
                k1: params[3],
                k2: params[4],
                ..Self::default()
            },
            CameraModelKind::Opencv => Self {
                k1: params[4],
                k2: params[5],
                p1: params[6],
                p2: params[7],
                ..Self::default()
            },
            CameraModelKind::OpencvFisheye => Self {
                k1: params[4],
                k2: params[5],
                k3: params[6],
                k4: params[7],
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinhole_has_no_distortion() {
        let d = Distortion::from_params(CameraModelKind::Pinhole, &[500.0, 500.0, 320.0, 240.0]);
        assert_eq!(d, Distortion::none());
    }

    #[test]
    fn simple_radial_fills_k1() {
        let params = [1000.0, 400.0, 300.0, 0.01];
        let d = Distortion::from_params(CameraModelKind::SimpleRadial, &params);
        assert_eq!(d.k1, 0.01);
        assert_eq!(d.k2, 0.0);
        assert_eq!(d.p1, 0.0);
    }

    #[test]
    fn opencv_fills_radial_and_tangential() {
        let params = [1000.0, 1001.0, 400.0, 300.0, -0.1, 0.05, 0.001, -0.002];
        let d = Distortion::from_params(CameraModelKind::Opencv, &params);
        assert_eq!(d.k1, -0.1);
        assert_eq!(d.k2, 0.05);
        assert_eq!(d.k3, 0.0);
        assert_eq!(d.k4, 0.0);
        assert_eq!(d.p1, 0.001);
        assert_eq!(d.p2, -0.002);
    }

    #[test]
    fn fisheye_fills_four_radial() {
        let params = [600.0, 600.0, 320.0, 240.0, 0.01, 0.002, 0.0003, 0.00004];
        let d = Distortion::from_params(CameraModelKind::OpencvFisheye, &params);
        assert_eq!(d.k3, 0.0003);
        assert_eq!(d.k4, 0.00004);
        assert_eq!(d.p1, 0.0);
        assert_eq!(d.p2, 0.0);
    }
}
