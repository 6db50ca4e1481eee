//! Nonlinear structural equations as per-variable MLPs.
//!
//! Variable `j` is reconstructed by its own network. All networks share one
//! input layer `d -> d·m1`, stored as the difference of two non-negative
//! weight blocks (`fc1_pos - fc1_neg`) so the L1 penalty stays smooth; the
//! remaining layers are locally connected (one independent `m_in -> m_out`
//! map per variable) with sigmoid activations in between.
//!
//! Parameter layout, flattened in this order:
//!
//! | block      | shape              | index of `(j, m, i)` / `(j, a, b)` |
//! |------------|--------------------|------------------------------------|
//! | `fc1_pos`  | `[d·m1, d]`        | `(j·m1 + m)·d + i`                 |
//! | `fc1_neg`  | `[d·m1, d]`        | same, offset                       |
//! | `b1_pos`   | `[d·m1]`           | `j·m1 + m`                         |
//! | `b1_neg`   | `[d·m1]`           | same, offset                       |
//! | `lc_l.w`   | `[d, m_in, m_out]` | `(j·m_in + a)·m_out + b`           |
//! | `lc_l.b`   | `[d, m_out]`       | `j·m_out + b`                      |

use dstruct_optim::Bounds;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Sem, SemFit};

#[derive(Debug, Clone)]
struct Layout {
    fc1_pos: usize,
    fc1_neg: usize,
    b1_pos: usize,
    b1_neg: usize,
    /// `(weight offset, bias offset)` per locally connected layer.
    lc: Vec<(usize, usize)>,
    len: usize,
}

impl Layout {
    fn new(dims: &[usize]) -> Self {
        let (d, m1) = (dims[0], dims[1]);
        let fc1 = d * m1 * d;
        let fc1_pos = 0;
        let fc1_neg = fc1_pos + fc1;
        let b1_pos = fc1_neg + fc1;
        let b1_neg = b1_pos + d * m1;
        let mut offset = b1_neg + d * m1;
        let mut lc = Vec::with_capacity(dims.len() - 2);
        for w in dims[1..].windows(2) {
            let (m_in, m_out) = (w[0], w[1]);
            let weight = offset;
            let bias = weight + d * m_in * m_out;
            offset = bias + d * m_out;
            lc.push((weight, bias));
        }
        Layout {
            fc1_pos,
            fc1_neg,
            b1_pos,
            b1_neg,
            lc,
            len: offset,
        }
    }
}

/// Per-variable MLP structural model, `dims = [d, m1, ..., 1]`.
#[derive(Debug, Clone)]
pub struct NotearsMlp {
    dims: Vec<usize>,
    layout: Layout,
    params: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl NotearsMlp {
    /// Build a model with uniformly initialised weights.
    ///
    /// The input layer draws from `±1/√d` and is then clamped into its bounds;
    /// each locally connected layer draws from `±1/√m_in`.
    ///
    /// # Panics
    ///
    /// Panics unless `dims` has at least three entries, all positive, ending in 1.
    /// [`crate::ModelConfig::validate`] checks the same conditions without panicking.
    pub fn new(dims: &[usize], seed: u64) -> Self {
        assert!(dims.len() >= 3, "need input, hidden and output widths");
        assert!(dims.iter().all(|&w| w > 0), "widths must be positive");
        assert_eq!(dims[dims.len() - 1], 1, "output width must be 1");

        let layout = Layout::new(dims);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = vec![0.0; layout.len];

        let d = dims[0];
        let bound = 1.0 / (d as f64).sqrt();
        for p in &mut params[layout.fc1_pos..layout.lc.first().map_or(layout.len, |l| l.0)] {
            *p = rng.gen_range(-bound..bound);
        }
        for (l, &(weight, bias)) in layout.lc.iter().enumerate() {
            let (m_in, m_out) = (dims[l + 1], dims[l + 2]);
            let bound = 1.0 / (m_in as f64).sqrt();
            for p in &mut params[weight..bias + d * m_out] {
                *p = rng.gen_range(-bound..bound);
            }
        }

        let model = NotearsMlp {
            dims: dims.to_vec(),
            layout,
            params,
        };
        let mut params = model.params.clone();
        model.bounds().project(&mut params);
        NotearsMlp { params, ..model }
    }

    /// Layer widths, input first.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Effective input-layer weight `fc1_pos - fc1_neg` for `(j, m, i)`.
    fn fc1_weight(&self, j: usize, m: usize, i: usize) -> f64 {
        let idx = (j * self.dims[1] + m) * self.dims[0] + i;
        self.params[self.layout.fc1_pos + idx] - self.params[self.layout.fc1_neg + idx]
    }

    /// Pre-activations of every layer, `[n, d, width]` row-major per layer.
    fn propagate(&self, x: &DMatrix<f64>) -> Vec<Vec<f64>> {
        let (n, d, m1) = (x.nrows(), self.dims[0], self.dims[1]);
        let p = &self.params;
        let lay = &self.layout;

        let mut layers = Vec::with_capacity(self.dims.len() - 1);
        let mut z = vec![0.0; n * d * m1];
        for s in 0..n {
            for j in 0..d {
                for m in 0..m1 {
                    let row = j * m1 + m;
                    let mut acc = p[lay.b1_pos + row] - p[lay.b1_neg + row];
                    for i in 0..d {
                        acc += self.fc1_weight(j, m, i) * x[(s, i)];
                    }
                    z[(s * d + j) * m1 + m] = acc;
                }
            }
        }
        layers.push(z);

        for (l, &(weight, bias)) in lay.lc.iter().enumerate() {
            let (m_in, m_out) = (self.dims[l + 1], self.dims[l + 2]);
            let next = {
                let prev = &layers[l];
                let mut next = vec![0.0; n * d * m_out];
                for s in 0..n {
                    for j in 0..d {
                        for b in 0..m_out {
                            let mut acc = p[bias + j * m_out + b];
                            for a in 0..m_in {
                                let h = sigmoid(prev[(s * d + j) * m_in + a]);
                                acc += h * p[weight + (j * m_in + a) * m_out + b];
                            }
                            next[(s * d + j) * m_out + b] = acc;
                        }
                    }
                }
                next
            };
            layers.push(next);
        }
        layers
    }

    /// Accumulate `∂/∂θ Σ upstream ∘ x̂` into `grad`.
    fn backward(
        &self,
        x: &DMatrix<f64>,
        layers: &[Vec<f64>],
        upstream: &DMatrix<f64>,
        grad: &mut [f64],
    ) {
        let (n, d, m1) = (x.nrows(), self.dims[0], self.dims[1]);
        let p = &self.params;
        let lay = &self.layout;

        // Output layer has width 1.
        let mut g: Vec<f64> = (0..n * d).map(|k| upstream[(k / d, k % d)]).collect();
        for (l, &(weight, bias)) in lay.lc.iter().enumerate().rev() {
            let (m_in, m_out) = (self.dims[l + 1], self.dims[l + 2]);
            let prev = &layers[l];
            let mut g_prev = vec![0.0; n * d * m_in];
            for s in 0..n {
                for j in 0..d {
                    let out = (s * d + j) * m_out;
                    for b in 0..m_out {
                        grad[bias + j * m_out + b] += g[out + b];
                    }
                    for a in 0..m_in {
                        let h = sigmoid(prev[(s * d + j) * m_in + a]);
                        let mut dh = 0.0;
                        for b in 0..m_out {
                            let w = weight + (j * m_in + a) * m_out + b;
                            grad[w] += h * g[out + b];
                            dh += p[w] * g[out + b];
                        }
                        g_prev[(s * d + j) * m_in + a] = dh * h * (1.0 - h);
                    }
                }
            }
            g = g_prev;
        }

        for s in 0..n {
            for j in 0..d {
                for m in 0..m1 {
                    let gz = g[(s * d + j) * m1 + m];
                    let row = j * m1 + m;
                    grad[lay.b1_pos + row] += gz;
                    grad[lay.b1_neg + row] -= gz;
                    for i in 0..d {
                        let gw = gz * x[(s, i)];
                        grad[lay.fc1_pos + row * d + i] += gw;
                        grad[lay.fc1_neg + row * d + i] -= gw;
                    }
                }
            }
        }
    }

    /// `Σ (fc1_pos - fc1_neg)² + Σ lc weights²`.
    fn l2_reg(&self) -> f64 {
        let (d, m1) = (self.dims[0], self.dims[1]);
        let mut reg = 0.0;
        for j in 0..d {
            for m in 0..m1 {
                for i in 0..d {
                    let w = self.fc1_weight(j, m, i);
                    reg += w * w;
                }
            }
        }
        for &(weight, bias) in &self.layout.lc {
            reg += self.params[weight..bias].iter().map(|w| w * w).sum::<f64>();
        }
        reg
    }

    /// Accumulate `∂/∂θ (scale · l2_reg)`.
    fn l2_backward(&self, scale: f64, grad: &mut [f64]) {
        let fc1_len = self.layout.fc1_neg - self.layout.fc1_pos;
        for k in 0..fc1_len {
            let w = self.params[self.layout.fc1_pos + k] - self.params[self.layout.fc1_neg + k];
            grad[self.layout.fc1_pos + k] += 2.0 * scale * w;
            grad[self.layout.fc1_neg + k] -= 2.0 * scale * w;
        }
        for &(weight, bias) in &self.layout.lc {
            for k in weight..bias {
                grad[k] += 2.0 * scale * self.params[k];
            }
        }
    }
}

impl Sem for NotearsMlp {
    fn dim(&self) -> usize {
        self.dims[0]
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    fn bounds(&self) -> Bounds<f64> {
        let (d, m1) = (self.dims[0], self.dims[1]);
        let mut bounds = Bounds::unbounded(self.layout.len);
        for j in 0..d {
            for m in 0..m1 {
                for i in 0..d {
                    let idx = (j * m1 + m) * d + i;
                    let upper = if i == j { 0.0 } else { f64::INFINITY };
                    bounds.set(self.layout.fc1_pos + idx, 0.0, upper);
                    bounds.set(self.layout.fc1_neg + idx, 0.0, upper);
                }
            }
        }
        bounds
    }

    fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let d = self.dims[0];
        let layers = self.propagate(x);
        let out = &layers[layers.len() - 1];
        DMatrix::from_fn(x.nrows(), d, |s, j| out[s * d + j])
    }

    fn fit(&self, x: &DMatrix<f64>, lambda2: f64) -> SemFit {
        let n = x.nrows() as f64;
        let d = self.dims[0];
        let layers = self.propagate(x);
        let out = &layers[layers.len() - 1];
        let reconstruction = DMatrix::from_fn(x.nrows(), d, |s, j| out[s * d + j]);

        let residual = &reconstruction - x;
        let squared_loss = 0.5 / n * residual.norm_squared();
        let upstream = residual / n;

        let mut grad = vec![0.0; self.layout.len];
        self.backward(x, &layers, &upstream, &mut grad);
        let l2_reg = self.l2_reg();
        if lambda2 > 0.0 {
            self.l2_backward(0.5 * lambda2, &mut grad);
        }

        SemFit {
            reconstruction,
            squared_loss,
            l2_reg,
            grad,
        }
    }

    fn fc1_l1_reg(&self) -> f64 {
        self.params[self.layout.fc1_pos..self.layout.b1_pos]
            .iter()
            .sum()
    }

    fn fc1_l1_backward(&self, scale: f64, grad: &mut [f64]) {
        for g in &mut grad[self.layout.fc1_pos..self.layout.b1_pos] {
            *g += scale;
        }
    }

    fn squared_adjacency(&self) -> DMatrix<f64> {
        let (d, m1) = (self.dims[0], self.dims[1]);
        DMatrix::from_fn(d, d, |i, j| {
            (0..m1)
                .map(|m| {
                    let w = self.fc1_weight(j, m, i);
                    w * w
                })
                .sum()
        })
    }

    fn squared_adjacency_backward(&self, upstream: &DMatrix<f64>, grad: &mut [f64]) {
        let (d, m1) = (self.dims[0], self.dims[1]);
        for i in 0..d {
            for j in 0..d {
                let u = upstream[(i, j)];
                if u == 0.0 {
                    continue;
                }
                for m in 0..m1 {
                    let idx = (j * m1 + m) * d + i;
                    let g = 2.0 * u * self.fc1_weight(j, m, i);
                    grad[self.layout.fc1_pos + idx] += g;
                    grad[self.layout.fc1_neg + idx] -= g;
                }
            }
        }
    }
}
