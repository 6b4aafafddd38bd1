//! Gauss-Hermite 求积
//!
//! 节点与权重对应标准正态能力分布，权重归一化为和 1。

use crate::irt::FitError;

const MAX_NEWTON_ITERATIONS: usize = 100;
const ROOT_EPSILON: f64 = 1e-13;
/// π^(-1/4)
const PI_POW_NEG_QUARTER: f64 = 0.751_125_544_464_942_5;

/// 能力分布上的离散求积网格
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrature {
    /// θ 节点（升序）
    pub nodes: Vec<f64>,
    /// 对应权重，和为 1
    pub weights: Vec<f64>,
}

impl Quadrature {
    /// 构造 n 点 Gauss-Hermite 网格
    pub fn gauss_hermite(n: usize) -> Result<Self, FitError> {
        if n == 0 {
            return Err(FitError::Quadrature("at least one node is required".into()));
        }

        let mut x = vec![0.0f64; n];
        let mut w = vec![0.0f64; n];
        let m = n.div_ceil(2);
        let nf = n as f64;
        let mut z = 0.0f64;

        for i in 0..m {
            // 初始猜测取自 Hermite 多项式根的渐近分布
            z = match i {
                0 => (2.0 * nf + 1.0).sqrt() - 1.855_75 * (2.0 * nf + 1.0).powf(-0.166_67),
                1 => z - 1.14 * nf.powf(0.426) / z,
                2 => 1.86 * z - 0.86 * x[0],
                3 => 1.91 * z - 0.91 * x[1],
                _ => 2.0 * z - x[i - 2],
            };

            let mut derivative = 0.0;
            let mut converged = false;
            for _ in 0..MAX_NEWTON_ITERATIONS {
                let (p1, p2) = orthonormal_hermite(n, z);
                derivative = (2.0 * nf).sqrt() * p2;
                let z_prev = z;
                z = z_prev - p1 / derivative;
                if (z - z_prev).abs() <= ROOT_EPSILON {
                    converged = true;
                    break;
                }
            }
            if !converged || !z.is_finite() {
                return Err(FitError::Quadrature(format!(
                    "root {} of the {}-point Hermite rule did not converge",
                    i, n
                )));
            }

            x[i] = z;
            x[n - 1 - i] = -z;
            w[i] = 2.0 / (derivative * derivative);
            w[n - 1 - i] = w[i];
        }

        // 物理学家 Hermite 权函数 e^{-x²} → 标准正态：θ = √2·x
        let mut points: Vec<(f64, f64)> = x
            .into_iter()
            .zip(w)
            .map(|(xi, wi)| (xi * std::f64::consts::SQRT_2, wi))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = points.iter().map(|(_, wi)| wi).sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(FitError::Quadrature("weights do not sum to a positive value".into()));
        }

        Ok(Self {
            nodes: points.iter().map(|(t, _)| *t).collect(),
            weights: points.iter().map(|(_, wi)| wi / total).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 权重的自然对数
    pub fn log_weights(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.ln()).collect()
    }
}

/// 正交归一化 Hermite 多项式递推，返回 (H̃_n(z), H̃_{n-1}(z))
fn orthonormal_hermite(n: usize, z: f64) -> (f64, f64) {
    let mut p1 = PI_POW_NEG_QUARTER;
    let mut p2 = 0.0;
    for j in 1..=n {
        let jf = j as f64;
        let p3 = p2;
        p2 = p1;
        p1 = z * (2.0 / jf).sqrt() * p2 - ((jf - 1.0) / jf).sqrt() * p3;
    }
    (p1, p2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one_and_nodes_symmetric() {
        let q = Quadrature::gauss_hermite(21).unwrap();
        assert_eq!(q.len(), 21);

        let sum: f64 = q.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);

        for i in 0..q.len() {
            assert!((q.nodes[i] + q.nodes[q.len() - 1 - i]).abs() < 1e-9);
        }
        assert!(q.nodes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_moments_match_standard_normal() {
        let q = Quadrature::gauss_hermite(15).unwrap();

        let mean: f64 = q.nodes.iter().zip(&q.weights).map(|(t, w)| t * w).sum();
        let var: f64 = q.nodes.iter().zip(&q.weights).map(|(t, w)| t * t * w).sum();
        let kurt: f64 = q.nodes.iter().zip(&q.weights).map(|(t, w)| t.powi(4) * w).sum();

        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-8);
        assert!((kurt - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_odd_rule_has_center_node() {
        let q = Quadrature::gauss_hermite(5).unwrap();
        assert!(q.nodes[2].abs() < 1e-12);
    }

    #[test]
    fn test_zero_points_is_error() {
        assert!(Quadrature::gauss_hermite(0).is_err());
    }
}
