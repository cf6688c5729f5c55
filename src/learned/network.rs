use rand::Rng;
use rand::rngs::StdRng;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Mean absolute percentage error, in percent. Targets are tagged widths and
/// therefore strictly positive.
pub fn mape(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(prediction, target)| ((target - prediction) / target).abs())
        .sum();
    100.0 * total / targets.len() as f64
}

#[derive(Debug, Clone)]
struct Dense {
    inputs: usize,
    outputs: usize,
    relu: bool,
    // row-major, one row per output
    weights: Vec<f64>,
    biases: Vec<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero biases.
    fn new(inputs: usize, outputs: usize, relu: bool, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Dense {
            inputs,
            outputs,
            relu,
            weights,
            biases: vec![0.0; outputs],
        }
    }

    fn row(&self, output: usize) -> &[f64] {
        &self.weights[output * self.inputs..(output + 1) * self.inputs]
    }

    fn activate(&self, values: &mut [f64]) {
        if self.relu {
            for value in values.iter_mut() {
                *value = value.max(0.0);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Gradients {
    weights: Vec<Vec<f64>>,
    biases: Vec<Vec<f64>>,
}

impl Gradients {
    fn zeros(layers: &[Dense]) -> Self {
        Gradients {
            weights: layers.iter().map(|l| vec![0.0; l.weights.len()]).collect(),
            biases: layers.iter().map(|l| vec![0.0; l.biases.len()]).collect(),
        }
    }

    fn scale(&mut self, factor: f64) {
        for values in self.weights.iter_mut().chain(self.biases.iter_mut()) {
            for value in values.iter_mut() {
                *value *= factor;
            }
        }
    }
}

/// Feed-forward regressor over one-hot input. The input is given as the
/// indices of its hot slots so the first layer never touches the zeros.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Dense>,
    first_moment: Gradients,
    second_moment: Gradients,
    step: i32,
}

impl Network {
    pub fn new(inputs: usize, hidden: &[usize], rng: &mut StdRng) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut previous = inputs;
        for &size in hidden {
            layers.push(Dense::new(previous, size, true, rng));
            previous = size;
        }
        layers.push(Dense::new(previous, 1, false, rng));

        let first_moment = Gradients::zeros(&layers);
        let second_moment = Gradients::zeros(&layers);
        Network {
            layers,
            first_moment,
            second_moment,
            step: 0,
        }
    }

    /// Activations of every layer, the last one holding the prediction.
    fn forward(&self, hot: &[usize]) -> Vec<Vec<f64>> {
        let mut activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            let mut values = layer.biases.clone();
            match activations.last() {
                None => {
                    for (output, value) in values.iter_mut().enumerate() {
                        let row = layer.row(output);
                        *value += hot.iter().map(|&slot| row[slot]).sum::<f64>();
                    }
                }
                Some(previous) => {
                    for (output, value) in values.iter_mut().enumerate() {
                        let row = layer.row(output);
                        *value += row.iter().zip(previous).map(|(w, a)| w * a).sum::<f64>();
                    }
                }
            }
            layer.activate(&mut values);
            debug_assert_eq!(values.len(), layer.outputs, "layer {index}");
            activations.push(values);
        }

        activations
    }

    pub fn predict(&self, hot: &[usize]) -> f64 {
        self.forward(hot)
            .last()
            .and_then(|output| output.first())
            .copied()
            .unwrap_or(0.0)
    }

    fn backward(&self, hot: &[usize], activations: &[Vec<f64>], output_grad: f64, grads: &mut Gradients) {
        let mut delta = vec![output_grad];

        for index in (0..self.layers.len()).rev() {
            let layer = &self.layers[index];
            for (output, d) in delta.iter().enumerate() {
                grads.biases[index][output] += d;
            }

            if index == 0 {
                for (output, d) in delta.iter().enumerate() {
                    for &slot in hot {
                        grads.weights[0][output * layer.inputs + slot] += d;
                    }
                }
                break;
            }

            let previous = &activations[index - 1];
            let mut next_delta = vec![0.0; layer.inputs];
            for (output, d) in delta.iter().enumerate() {
                let row = layer.row(output);
                let grad_row =
                    &mut grads.weights[index][output * layer.inputs..(output + 1) * layer.inputs];
                for input in 0..layer.inputs {
                    grad_row[input] += d * previous[input];
                    next_delta[input] += d * row[input];
                }
            }
            // the layer below is a ReLU layer
            for (value, activation) in next_delta.iter_mut().zip(previous) {
                if *activation <= 0.0 {
                    *value = 0.0;
                }
            }
            delta = next_delta;
        }
    }

    /// One Adam step on the MAPE of a batch. Returns the batch loss before
    /// the update.
    pub fn train_batch(&mut self, batch: &[(&[usize], f64)], learning_rate: f64) -> f64 {
        if batch.is_empty() {
            return 0.0;
        }

        let mut grads = Gradients::zeros(&self.layers);
        let mut predictions = Vec::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());

        for &(hot, target) in batch {
            let activations = self.forward(hot);
            let prediction = activations[activations.len() - 1][0];
            let output_grad = 100.0 * (prediction - target).signum() / target.abs();
            self.backward(hot, &activations, output_grad, &mut grads);
            predictions.push(prediction);
            targets.push(target);
        }
        grads.scale(1.0 / batch.len() as f64);
        self.apply(&grads, learning_rate);

        mape(&predictions, &targets)
    }

    fn apply(&mut self, grads: &Gradients, learning_rate: f64) {
        self.step += 1;
        let correction1 = 1.0 - BETA1.powi(self.step);
        let correction2 = 1.0 - BETA2.powi(self.step);

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let params = layer.weights.iter_mut().chain(layer.biases.iter_mut());
            let g = grads.weights[index].iter().chain(&grads.biases[index]);
            let m = self.first_moment.weights[index]
                .iter_mut()
                .chain(self.first_moment.biases[index].iter_mut());
            let v = self.second_moment.weights[index]
                .iter_mut()
                .chain(self.second_moment.biases[index].iter_mut());

            for (((param, g), m), v) in params.zip(g).zip(m).zip(v) {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                *param -= learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mape_in_percent() {
        assert!((mape(&[9.0, 4.0], &[10.0, 4.0]) - 5.0).abs() < 1e-9);
        assert_eq!(mape(&[], &[]), 0.0);
    }

    #[test]
    fn forward_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let network = Network::new(6, &[4, 3], &mut rng);
        let activations = network.forward(&[1, 4]);

        let sizes: Vec<usize> = activations.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 3, 1]);
        assert!(activations[0].iter().all(|a| *a >= 0.0));
    }

    #[test]
    fn learns_to_separate_two_categories() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut network = Network::new(4, &[16], &mut rng);
        let narrow: &[usize] = &[1, 3];
        let wide: &[usize] = &[2, 3];
        let batch = [(narrow, 4.0), (wide, 7.0), (narrow, 4.0), (wide, 7.0)];

        let initial = network.train_batch(&batch, 0.01);
        let mut last = initial;
        for _ in 0..1500 {
            last = network.train_batch(&batch, 0.01);
        }

        assert!(last < initial);
        assert!(last < 10.0, "loss stayed at {last}");
        assert!(network.predict(wide) > network.predict(narrow));
    }
}
