//! Feed-forward reorder classifier trained on rule labels.
//!
//! Built on candle: `linear` layers in a `VarMap`, AdamW without weight decay,
//! and binary cross-entropy on logits. Every tensor lives inside the call that
//! creates it.

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::optim::{AdamW, Optimizer, ParamsAdamW};
use candle_nn::{Linear, Module, VarBuilder, VarMap, linear, loss, ops};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use restock_inventory::features::FeatureVector;
use restock_inventory::{Item, policy};

use crate::config::TrainingConfig;
use crate::model::{ReorderModel, TrainingReport};
use crate::result::{ModelError, Verdict};

/// Logits are clamped before the loss so a saturated sigmoid never hits `log(0)`.
const LOGIT_LIMIT: f64 = 30.0;

type Row = [f64; FeatureVector::LEN];

/// Per-feature standardisation fitted on the training batch.
#[derive(Debug, Clone, PartialEq)]
struct Scaler {
    mean: Row,
    std: Row,
}

impl Scaler {
    fn fit(rows: &[Row]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; FeatureVector::LEN];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut std = [0.0; FeatureVector::LEN];
        for row in rows {
            for ((s, v), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }
        // Constant columns carry no signal; keep them centred at zero.
        for s in &mut std {
            *s = if *s > f64::EPSILON { s.sqrt() } else { 1.0 };
        }
        Self { mean, std }
    }

    fn transform(&self, row: &Row) -> Row {
        let mut out = [0.0; FeatureVector::LEN];
        for i in 0..FeatureVector::LEN {
            out[i] = (row[i] - self.mean[i]) / self.std[i];
        }
        out
    }
}

/// 3 -> h1 (ReLU) -> h2 (ReLU) -> 1 logit.
#[derive(Debug, Clone)]
struct ReorderNet {
    hidden1: Linear,
    hidden2: Linear,
    output: Linear,
}

impl ReorderNet {
    const LAYERS: [&'static str; 3] = ["hidden1", "hidden2", "output"];

    fn new(vb: VarBuilder, [h1, h2]: [usize; 2]) -> candle_core::Result<Self> {
        Ok(Self {
            hidden1: linear(FeatureVector::LEN, h1, vb.pp("hidden1"))?,
            hidden2: linear(h1, h2, vb.pp("hidden2"))?,
            output: linear(h2, 1, vb.pp("output"))?,
        })
    }
}

impl Module for ReorderNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.hidden1.forward(xs)?.relu()?;
        let xs = self.hidden2.forward(&xs)?.relu()?;
        self.output.forward(&xs)
    }
}

/// Overwrite the layers' initial weights from `rng` (He-uniform, zero bias) so
/// a seeded config trains reproducibly.
fn seed_weights(
    varmap: &mut VarMap,
    sizes: [usize; 4],
    rng: &mut StdRng,
    device: &Device,
) -> candle_core::Result<()> {
    for (idx, name) in ReorderNet::LAYERS.iter().enumerate() {
        let (inputs, outputs) = (sizes[idx], sizes[idx + 1]);
        let limit = (6.0 / inputs as f64).sqrt();
        let weights: Vec<f64> = (0..inputs * outputs)
            .map(|_| rng.random_range(-limit..limit))
            .collect();
        varmap.set_one(
            format!("{name}.weight"),
            Tensor::from_vec(weights, (outputs, inputs), device)?,
        )?;
        varmap.set_one(
            format!("{name}.bias"),
            Tensor::zeros(outputs, DType::F64, device)?,
        )?;
    }
    Ok(())
}

/// Fitted parameters. Only ever published as a whole.
#[derive(Debug, Clone)]
struct TrainedModel {
    net: ReorderNet,
    scaler: Scaler,
}

impl TrainedModel {
    fn probability(&self, vector: &FeatureVector) -> candle_core::Result<f64> {
        let scaled = self.scaler.transform(vector.as_array());
        let input = Tensor::from_slice(&scaled[..], (1, FeatureVector::LEN), &Device::Cpu)?;
        let logit = self.net.forward(&input)?;
        let probs = ops::sigmoid(&logit)?.flatten_all()?.to_vec1::<f64>()?;
        Ok(probs.first().copied().unwrap_or(f64::NAN))
    }
}

#[derive(Debug, Clone)]
enum ClassifierState {
    Untrained,
    Trained(TrainedModel),
}

/// Small binary classifier: 3 inputs, two ReLU hidden layers, sigmoid output.
///
/// State machine: `Untrained -> Trained`. Retraining replaces the parameters;
/// a failed run leaves whatever was there before.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    config: TrainingConfig,
    state: ClassifierState,
}

impl Default for MlpClassifier {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

/// Labelled, standardised training data.
struct Dataset {
    xs: Vec<Row>,
    labels: Vec<f64>,
}

impl Dataset {
    /// `(n, 3)` inputs and `(n, 1)` targets for the rows at `idx`.
    fn tensors(&self, idx: &[usize], device: &Device) -> candle_core::Result<(Tensor, Tensor)> {
        let flat: Vec<f64> = idx.iter().flat_map(|&i| self.xs[i]).collect();
        let targets: Vec<f64> = idx.iter().map(|&i| self.labels[i]).collect();
        Ok((
            Tensor::from_vec(flat, (idx.len(), FeatureVector::LEN), device)?,
            Tensor::from_vec(targets, (idx.len(), 1), device)?,
        ))
    }
}

struct Fitted {
    net: ReorderNet,
    epochs_run: usize,
    train_loss: f64,
    validation_loss: Option<f64>,
    validation_accuracy: Option<f64>,
}

fn batch_loss(net: &ReorderNet, xs: &Tensor, ys: &Tensor) -> candle_core::Result<Tensor> {
    let logits = net.forward(xs)?.clamp(-LOGIT_LIMIT, LOGIT_LIMIT)?;
    loss::binary_cross_entropy_with_logit(&logits, ys)
}

fn accuracy(net: &ReorderNet, xs: &Tensor, labels: &[f64]) -> candle_core::Result<f64> {
    let logits = net.forward(xs)?.flatten_all()?.to_vec1::<f64>()?;
    let hits = logits
        .iter()
        .zip(labels)
        .filter(|(logit, y)| (**logit > 0.0) == (**y > 0.5))
        .count();
    Ok(hits as f64 / labels.len() as f64)
}

/// Shuffled `(validation, training)` indices. At least one row always trains.
fn split_indices(n: usize, validation_split: f64, rng: &mut StdRng) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let held_out = ((n as f64) * validation_split).floor() as usize;
    let training = order.split_off(held_out.min(n.saturating_sub(1)));
    (order, training)
}

fn snapshot(vars: &[Var]) -> candle_core::Result<Vec<Tensor>> {
    vars.iter().map(|v| v.as_tensor().copy()).collect()
}

impl MlpClassifier {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            state: ClassifierState::Untrained,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Build a complete model without touching `self.state`.
    fn fit(&self, items: &[Item]) -> Result<(TrainedModel, TrainingReport), ModelError> {
        let cfg = &self.config;
        cfg.validate()
            .map_err(|e| ModelError::training(format!("invalid training config: {e}")))?;

        if items.is_empty() {
            return Err(ModelError::training("empty training batch"));
        }

        let mut rows = Vec::with_capacity(items.len());
        let mut labels = Vec::with_capacity(items.len());
        for item in items {
            item.validate()
                .map_err(|e| ModelError::training(format!("unusable training item: {e}")))?;
            let vector = FeatureVector::from_item(item);
            if !vector.is_finite() {
                return Err(ModelError::training(format!(
                    "item {} has non-finite features",
                    item.id
                )));
            }
            rows.push(*vector.as_array());
            labels.push(policy::label(item));
        }

        let positives = labels.iter().filter(|y| **y > 0.5).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(ModelError::training(format!(
                "all {} items share one rule label (reorder={}); nothing to separate",
                labels.len(),
                positives > 0
            )));
        }

        let scaler = Scaler::fit(&rows);
        let data = Dataset {
            xs: rows.iter().map(|r| scaler.transform(r)).collect(),
            labels,
        };

        let fitted = self
            .fit_network(&data)
            .map_err(|e| ModelError::training(e.to_string()))?;

        let report = TrainingReport {
            samples: data.xs.len(),
            positives,
            negatives,
            epochs_run: fitted.epochs_run,
            train_loss: fitted.train_loss,
            validation_loss: fitted.validation_loss,
            validation_accuracy: fitted.validation_accuracy,
        };

        Ok((
            TrainedModel {
                net: fitted.net,
                scaler,
            },
            report,
        ))
    }

    fn fit_network(&self, data: &Dataset) -> candle_core::Result<Fitted> {
        let cfg = &self.config;
        let device = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(cfg.seed.unwrap_or_else(rand::random));
        let (validation, mut training) =
            split_indices(data.xs.len(), cfg.validation_split, &mut rng);

        let [h1, h2] = cfg.hidden_layers;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F64, &device);
        let net = ReorderNet::new(vb, cfg.hidden_layers)?;
        seed_weights(&mut varmap, [FeatureVector::LEN, h1, h2, 1], &mut rng, &device)?;

        let vars = varmap.all_vars();
        let mut optimizer = AdamW::new(
            vars.clone(),
            ParamsAdamW {
                lr: cfg.learning_rate,
                weight_decay: 0.0,
                ..ParamsAdamW::default()
            },
        )?;

        let validation_set = if validation.is_empty() {
            None
        } else {
            Some(data.tensors(&validation, &device)?)
        };

        let mut best = snapshot(&vars)?;
        let mut best_loss = f64::INFINITY;
        let mut stale = 0usize;
        let mut epochs_run = 0usize;
        let mut train_loss = f64::NAN;

        for epoch in 0..cfg.epochs {
            training.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in training.chunks(cfg.batch_size) {
                let (xs, ys) = data.tensors(batch, &device)?;
                let loss = batch_loss(&net, &xs, &ys)?;
                optimizer.backward_step(&loss)?;
                epoch_loss += loss.to_scalar::<f64>()? * batch.len() as f64;
            }

            epochs_run = epoch + 1;
            train_loss = epoch_loss / training.len() as f64;
            if !train_loss.is_finite() {
                candle_core::bail!("loss diverged at epoch {epochs_run}");
            }

            let monitored = match &validation_set {
                Some((xs, ys)) => batch_loss(&net, xs, ys)?.to_scalar::<f64>()?,
                None => train_loss,
            };

            if monitored < best_loss {
                best_loss = monitored;
                best = snapshot(&vars)?;
                stale = 0;
            } else {
                stale += 1;
                if cfg.patience > 0 && stale >= cfg.patience {
                    debug!(epoch = epochs_run, best_loss, "early stop: validation loss plateaued");
                    break;
                }
            }
        }

        // Restore the best epoch; the layers share storage with `vars`.
        for (var, saved) in vars.iter().zip(&best) {
            var.set(saved)?;
        }

        let (validation_loss, validation_accuracy) = match &validation_set {
            Some((xs, _)) => {
                let held_labels: Vec<f64> = validation.iter().map(|&i| data.labels[i]).collect();
                (Some(best_loss), Some(accuracy(&net, xs, &held_labels)?))
            }
            None => (None, None),
        };

        Ok(Fitted {
            net,
            epochs_run,
            train_loss,
            validation_loss,
            validation_accuracy,
        })
    }
}

impl ReorderModel for MlpClassifier {
    fn train(&mut self, items: &[Item]) -> Result<TrainingReport, ModelError> {
        let (model, report) = self.fit(items)?;
        self.state = ClassifierState::Trained(model);
        Ok(report)
    }

    fn predict(&self, item: &Item) -> Result<Verdict, ModelError> {
        let ClassifierState::Trained(model) = &self.state else {
            return Err(ModelError::ModelNotTrained);
        };

        item.validate()
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;

        let vector = FeatureVector::from_item(item);
        if !vector.is_finite() {
            return Err(ModelError::prediction(format!(
                "item {} has non-finite features",
                item.id
            )));
        }

        let probability = model
            .probability(&vector)
            .map_err(|e| ModelError::prediction(format!("item {}: {e}", item.id)))?;
        if !probability.is_finite() {
            return Err(ModelError::prediction(format!(
                "item {}: model produced a non-finite score",
                item.id
            )));
        }

        Ok(Verdict::from_probability(probability))
    }

    fn is_trained(&self) -> bool {
        matches!(self.state, ClassifierState::Trained(_))
    }
}
