//! Fixed-width fully-connected feed-forward network.

use serde::{Deserialize, Serialize};

use crate::math::Matrix;

/// Bounded logistic nonlinearity `2 / (1 + e^-x) - 1`, with range `(-1, 1)`.
#[must_use]
pub fn activation(value: f64) -> f64 {
    2.0 / (1.0 + (-value).exp()) - 1.0
}

/// Ordered stack of square weight matrices; the input-nearest layer comes first.
///
/// Layers carry no bias. Every layer is followed by [`activation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    width: usize,
    layers: Vec<Matrix>,
}

impl Network {
    /// Assemble a network from already-shaped layers. Returns `None` if any layer is not
    /// `width × width`.
    #[must_use]
    pub fn from_layers(width: usize, layers: Vec<Matrix>) -> Option<Self> {
        layers
            .iter()
            .all(|layer| layer.rows() == width && layer.cols() == width)
            .then_some(Self { width, layers })
    }

    /// Rebuild a network from per-layer row-major weights, as shipped to workers.
    #[must_use]
    pub fn from_flat_layers(width: usize, flat: &[Vec<f64>]) -> Option<Self> {
        let layers = flat
            .iter()
            .map(|values| Matrix::from_row_major(width, width, values.clone()))
            .collect::<Option<Vec<_>>>()?;
        Self::from_layers(width, layers)
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn layers(&self) -> &[Matrix] {
        &self.layers
    }

    /// Row-major weights of each layer, in layer order.
    #[must_use]
    pub fn flat_layers(&self) -> Vec<Vec<f64>> {
        self.layers
            .iter()
            .map(|layer| layer.as_slice().to_vec())
            .collect()
    }

    /// Evaluate the network. Inputs shorter than `width` are zero-extended.
    #[must_use]
    pub fn evaluate(&self, input: &[f64]) -> Vec<f64> {
        let mut state: Vec<f64> = input.iter().copied().take(self.width).collect();
        state.resize(self.width, 0.0);
        for layer in &self.layers {
            state = layer.mul_vec(&state);
            for value in &mut state {
                *value = activation(*value);
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(width: usize) -> Matrix {
        let mut values = vec![0.0; width * width];
        for i in 0..width {
            values[i * width + i] = 1.0;
        }
        Matrix::from_row_major(width, width, values).expect("identity")
    }

    #[test]
    fn activation_is_bounded_and_odd() {
        assert_eq!(activation(0.0), 0.0);
        assert!(activation(50.0) <= 1.0 && activation(50.0) > 0.99);
        assert!(activation(-50.0) >= -1.0 && activation(-50.0) < -0.99);
        assert!((activation(1.3) + activation(-1.3)).abs() < 1e-12);
    }

    #[test]
    fn evaluation_applies_each_layer_then_activation() {
        let network = Network::from_layers(2, vec![identity(2), identity(2)]).expect("network");
        let output = network.evaluate(&[1.0, -0.5]);
        let expected: Vec<f64> = [1.0_f64, -0.5]
            .iter()
            .map(|v| activation(activation(*v)))
            .collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn zero_weights_produce_zero_output() {
        let network =
            Network::from_layers(3, vec![Matrix::zeros(3, 3); 4]).expect("network");
        assert_eq!(network.evaluate(&[0.3, 0.9, -1.0]), vec![0.0; 3]);
    }

    #[test]
    fn flat_layers_round_trip_through_worker_encoding() {
        let network = Network::from_layers(2, vec![identity(2)]).expect("network");
        let rebuilt = Network::from_flat_layers(2, &network.flat_layers()).expect("rebuilt");
        assert_eq!(rebuilt, network);
        assert!(Network::from_flat_layers(2, &[vec![1.0, 2.0, 3.0]]).is_none());
        assert!(Network::from_layers(2, vec![Matrix::zeros(2, 3)]).is_none());
    }
}
