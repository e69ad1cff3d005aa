//! Training configuration.

use core::str::FromStr;

use tracing::warn;

use crate::result::ModelError;

/// Hyperparameters for [`crate::MlpClassifier`].
///
/// ```
/// use restock_ai::TrainingConfig;
///
/// let config = TrainingConfig::default()
///     .with_epochs(50)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Maximum passes over the training split.
    pub epochs: usize,

    /// Samples per gradient step.
    pub batch_size: usize,

    /// Adam step size.
    pub learning_rate: f64,

    /// Share of the shuffled batch held out for validation, in \[0, 1).
    pub validation_split: f64,

    /// Stop after this many epochs without a better validation loss. 0 = never.
    pub patience: usize,

    /// Widths of the two ReLU hidden layers.
    pub hidden_layers: [usize; 2],

    /// Random seed for reproducibility. `None` draws one per training run.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.01,
            validation_split: 0.2,
            patience: 25,
            hidden_layers: [16, 8],
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Defaults overridden by `RESTOCK_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            epochs: env_or("RESTOCK_EPOCHS", d.epochs),
            batch_size: env_or("RESTOCK_BATCH_SIZE", d.batch_size),
            learning_rate: env_or("RESTOCK_LEARNING_RATE", d.learning_rate),
            validation_split: env_or("RESTOCK_VALIDATION_SPLIT", d.validation_split),
            patience: env_or("RESTOCK_PATIENCE", d.patience),
            hidden_layers: d.hidden_layers,
            seed: std::env::var("RESTOCK_SEED")
                .ok()
                .and_then(|raw| parse_or_warn("RESTOCK_SEED", &raw)),
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_validation_split(mut self, validation_split: f64) -> Self {
        self.validation_split = validation_split;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_hidden_layers(mut self, first: usize, second: usize) -> Self {
        self.hidden_layers = [first, second];
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.epochs == 0 {
            return Err(ModelError::InvalidInput("epochs must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ModelError::InvalidInput("batch_size must be >= 1".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ModelError::InvalidInput(
                "learning_rate must be a finite positive number".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ModelError::InvalidInput(
                "validation_split must be in [0, 1)".to_string(),
            ));
        }
        if self.hidden_layers.contains(&0) {
            return Err(ModelError::InvalidInput(
                "hidden layer widths must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or_warn(key, &raw).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparsable training setting");
            None
        }
    }
}
