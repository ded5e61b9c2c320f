//! Local surrogate explanations for tabular features.
//!
//! Each feature is discretized into quartile bins learned from training data.
//! Around one instance, perturbed samples are drawn bin by bin from the training
//! distribution, scored by the classifier, weighted by their proximity to the
//! instance, and a weighted ridge regression over "same bin as the instance"
//! indicators estimates how much each feature's bin contributes to the score.

use std::fs;
use std::path::Path;

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::ridge::RidgeFit;
use super::{Explainer, ProbabilityFn};
use crate::error::{EditorError, Result};
use crate::features::{FeatureSchema, FeatureVector};

/// How the explained features are chosen before the final regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    /// Forward selection for up to 6 features, highest weights beyond that
    #[default]
    Auto,
    ForwardSelection,
    HighestWeights,
    /// Regress on every feature and report the top ones
    None,
}

/// Sampling and regression settings for [`LimeTabularExplainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Perturbed samples drawn per explanation, the instance included
    pub num_samples: usize,
    /// Width of the exponential proximity kernel; `0.75 * sqrt(n_features)` when unset
    pub kernel_width: Option<f64>,
    pub feature_selection: FeatureSelection,
    pub ridge_alpha: f64,
    /// Seed of the sampler; the same seed and instance give the same explanation
    pub seed: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            num_samples: 5000,
            kernel_width: None,
            feature_selection: FeatureSelection::Auto,
            ridge_alpha: 1.0,
            seed: 42,
        }
    }
}

/// Quartile bins of one feature over the training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub name: String,
    /// Ascending, de-duplicated quartile cut points. Bin `b` holds values in
    /// `(cut_points[b - 1], cut_points[b]]`, the first bin everything up to the
    /// first cut and the last bin everything above the last cut.
    pub cut_points: Vec<f32>,
    pub bin_frequencies: Vec<f32>,
    pub bin_means: Vec<f32>,
    pub bin_stds: Vec<f32>,
    pub bin_mins: Vec<f32>,
    pub bin_maxs: Vec<f32>,
}

impl FeatureStatistics {
    fn fit(name: &str, column: ArrayView1<'_, f32>) -> Self {
        let mut sorted: Vec<f32> = column.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut cut_points: Vec<f32> = [25.0, 50.0, 75.0]
            .iter()
            .map(|&q| percentile(&sorted, q))
            .collect();
        let lowest = sorted[0];
        let highest = sorted[sorted.len() - 1];
        cut_points.dedup();
        // A cut at the maximum would leave an empty top bin
        cut_points.retain(|&cut| cut < highest);

        let bins = cut_points.len() + 1;
        let mut members: Vec<Vec<f32>> = vec![Vec::new(); bins];
        for &value in &sorted {
            members[bin_index(&cut_points, value)].push(value);
        }

        let mut stats = Self {
            name: name.to_string(),
            cut_points: cut_points.clone(),
            bin_frequencies: Vec::with_capacity(bins),
            bin_means: Vec::with_capacity(bins),
            bin_stds: Vec::with_capacity(bins),
            bin_mins: Vec::with_capacity(bins),
            bin_maxs: Vec::with_capacity(bins),
        };

        for (bin, values) in members.iter().enumerate() {
            let lower = if bin == 0 { lowest } else { cut_points[bin - 1] };
            let upper = if bin == bins - 1 { highest } else { cut_points[bin] };
            let (mean, std) = if values.is_empty() {
                ((lower + upper) / 2.0, 0.0)
            } else {
                let n = values.len() as f64;
                let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
                let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
                (mean as f32, var.sqrt() as f32)
            };
            stats.bin_frequencies.push(values.len() as f32 / sorted.len() as f32);
            stats.bin_means.push(mean);
            stats.bin_stds.push(std);
            stats.bin_mins.push(lower);
            stats.bin_maxs.push(upper);
        }
        stats
    }

    fn num_bins(&self) -> usize {
        self.cut_points.len() + 1
    }

    fn bin_of(&self, value: f32) -> usize {
        bin_index(&self.cut_points, value)
    }

    /// Attribution identifier for `bin`, e.g. `num_words <= 12.00` or
    /// `12.00 < num_words <= 30.00`
    fn describe(&self, bin: usize) -> String {
        let last = self.cut_points.len();
        match (bin, last) {
            (_, 0) => self.name.clone(),
            (0, _) => format!("{} <= {:.2}", self.name, self.cut_points[0]),
            (b, l) if b == l => format!("{} > {:.2}", self.name, self.cut_points[l - 1]),
            (b, _) => format!(
                "{:.2} < {} <= {:.2}",
                self.cut_points[b - 1],
                self.name,
                self.cut_points[b]
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        let bins = self.num_bins();
        let lengths = [
            self.bin_frequencies.len(),
            self.bin_means.len(),
            self.bin_stds.len(),
            self.bin_mins.len(),
            self.bin_maxs.len(),
        ];
        if lengths.iter().any(|&len| len != bins) {
            return Err(EditorError::Explain(format!(
                "Statistics for '{}' must describe {} bins",
                self.name, bins
            )));
        }
        if self.cut_points.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(EditorError::Explain(format!(
                "Cut points for '{}' must be strictly ascending",
                self.name
            )));
        }
        if self.bin_frequencies.iter().sum::<f32>() <= 0.0 {
            return Err(EditorError::Explain(format!(
                "Bin frequencies for '{}' sum to zero",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-feature bin statistics of the training data, in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatistics {
    pub features: Vec<FeatureStatistics>,
}

impl TrainingStatistics {
    /// Learns quartile bins from a `[rows, features]` training matrix
    pub fn fit(schema: &FeatureSchema, rows: ArrayView2<'_, f32>) -> Result<Self> {
        if rows.nrows() == 0 {
            return Err(EditorError::Explain("Training data has no rows".into()));
        }
        if rows.ncols() != schema.len() {
            return Err(EditorError::Explain(format!(
                "Training data has {} columns for {} features",
                rows.ncols(),
                schema.len()
            )));
        }
        if rows.iter().any(|v| !v.is_finite()) {
            return Err(EditorError::Explain("Training data contains non-finite values".into()));
        }

        let features = schema
            .names()
            .iter()
            .zip(rows.axis_iter(Axis(1)))
            .map(|(name, column)| FeatureStatistics::fit(name, column))
            .collect();
        Ok(Self { features })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let stats: Self = serde_json::from_str(&data)?;
        for feature in &stats.features {
            feature.validate()?;
        }
        info!("Loaded explainer statistics for {} features from {:?}", stats.features.len(), path);
        Ok(stats)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Ensures the statistics describe exactly `schema`'s features, in order
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        let names: Vec<&str> = self.features.iter().map(|f| f.name.as_str()).collect();
        let expected: Vec<&str> = schema.names().iter().map(String::as_str).collect();
        if names != expected {
            return Err(EditorError::Explain(format!(
                "Explainer statistics describe [{}] but the schema is [{}]",
                names.join(", "),
                expected.join(", ")
            )));
        }
        Ok(())
    }
}

/// LIME-style explainer over quartile-discretized tabular features
#[derive(Debug, Clone)]
pub struct LimeTabularExplainer {
    statistics: TrainingStatistics,
    config: ExplainerConfig,
}

impl LimeTabularExplainer {
    pub fn new(statistics: TrainingStatistics, config: ExplainerConfig) -> Result<Self> {
        if config.num_samples < 2 {
            return Err(EditorError::Explain(format!(
                "At least 2 samples are needed per explanation, configured {}",
                config.num_samples
            )));
        }
        if statistics.features.is_empty() {
            return Err(EditorError::Explain("Explainer statistics describe no features".into()));
        }
        for feature in &statistics.features {
            feature.validate()?;
        }
        Ok(Self { statistics, config })
    }

    pub fn statistics(&self) -> &TrainingStatistics {
        &self.statistics
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Draws the neighbourhood of `instance`.
    ///
    /// Returns the samples in feature space (row 0 is the instance) and their
    /// binary representation: 1 where a sample falls in the instance's bin.
    fn sample_neighbourhood(&self, instance: ArrayView1<'_, f32>) -> (Array2<f32>, Array2<f64>) {
        let num_samples = self.config.num_samples;
        let num_features = self.statistics.features.len();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut samples = Array2::zeros((num_samples, num_features));
        let mut binary = Array2::ones((num_samples, num_features));
        samples.row_mut(0).assign(&instance);

        for (j, feature) in self.statistics.features.iter().enumerate() {
            let instance_bin = feature.bin_of(instance[j]);
            for i in 1..num_samples {
                let bin = sample_bin(&mut rng, &feature.bin_frequencies);
                samples[[i, j]] = sample_truncated_normal(
                    &mut rng,
                    feature.bin_means[bin],
                    feature.bin_stds[bin],
                    feature.bin_mins[bin],
                    feature.bin_maxs[bin],
                );
                if bin != instance_bin {
                    binary[[i, j]] = 0.0;
                }
            }
        }
        (samples, binary)
    }

    fn select_features(
        &self,
        binary: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        weights: ArrayView1<'_, f64>,
        num_features: usize,
    ) -> Result<Vec<usize>> {
        let all: Vec<usize> = (0..binary.ncols()).collect();
        let method = match self.config.feature_selection {
            FeatureSelection::Auto if num_features <= 6 => FeatureSelection::ForwardSelection,
            FeatureSelection::Auto => FeatureSelection::HighestWeights,
            other => other,
        };

        match method {
            FeatureSelection::None => Ok(all),
            FeatureSelection::HighestWeights => {
                let fit = RidgeFit::fit(binary, labels, weights, self.config.ridge_alpha)?;
                Ok(top_by_magnitude(fit.coefficients.view(), num_features))
            }
            FeatureSelection::ForwardSelection | FeatureSelection::Auto => {
                let mut selected: Vec<usize> = Vec::with_capacity(num_features);
                while selected.len() < num_features.min(all.len()) {
                    let mut best: Option<(usize, f64)> = None;
                    for &candidate in all.iter().filter(|f| !selected.contains(f)) {
                        let mut columns = selected.clone();
                        columns.push(candidate);
                        let x = binary.select(Axis(1), &columns);
                        let fit = RidgeFit::fit(x.view(), labels, weights, self.config.ridge_alpha)?;
                        let score = fit.score(x.view(), labels, weights);
                        if best.map_or(true, |(_, s)| score > s) {
                            best = Some((candidate, score));
                        }
                    }
                    match best {
                        Some((feature, _)) => selected.push(feature),
                        None => break,
                    }
                }
                Ok(selected)
            }
        }
    }
}

impl Explainer for LimeTabularExplainer {
    fn explain_instance(
        &self,
        instance: &FeatureVector,
        predict_proba: &ProbabilityFn<'_>,
        num_features: usize,
        label: usize,
    ) -> Result<Vec<(String, f32)>> {
        self.statistics.check_schema(instance.schema())?;
        if num_features == 0 {
            return Ok(Vec::new());
        }

        let (samples, binary) = self.sample_neighbourhood(instance.values());
        debug!("Scoring {} perturbed samples", samples.nrows());
        let predictions = predict_proba(samples.view())
            .map_err(|e| EditorError::Explain(format!("Prediction failed on perturbed samples: {}", e)))?;
        if predictions.nrows() != samples.nrows() || label >= predictions.ncols() {
            return Err(EditorError::Explain(format!(
                "Prediction function returned a {}x{} matrix for {} samples and label {}",
                predictions.nrows(),
                predictions.ncols(),
                samples.nrows(),
                label
            )));
        }
        let labels = predictions.column(label).mapv(f64::from);

        let num_cols = binary.ncols() as f64;
        let width = self.config.kernel_width.unwrap_or(0.75 * num_cols.sqrt());
        let weights: Array1<f64> = binary
            .outer_iter()
            .map(|row| {
                // the instance's own row is all ones
                let distance_sq = row.iter().map(|&b| (1.0 - b).powi(2)).sum::<f64>();
                (-distance_sq / (width * width)).exp().sqrt()
            })
            .collect();

        let selected = self.select_features(binary.view(), labels.view(), weights.view(), num_features)?;
        let x = binary.select(Axis(1), &selected);
        let fit = RidgeFit::fit(x.view(), labels.view(), weights.view(), self.config.ridge_alpha)?;
        debug!(
            "Local surrogate fit: intercept {:.4}, R^2 {:.4}",
            fit.intercept,
            fit.score(x.view(), labels.view(), weights.view())
        );

        let instance_values = instance.values();
        let explanation = top_by_magnitude(fit.coefficients.view(), num_features)
            .into_iter()
            .map(|k| {
                let feature = selected[k];
                let stats = &self.statistics.features[feature];
                let bin = stats.bin_of(instance_values[feature]);
                (stats.describe(bin), fit.coefficients[k] as f32)
            })
            .collect();
        Ok(explanation)
    }
}

/// Indices of the `n` largest entries by absolute value, largest first
fn top_by_magnitude(values: ArrayView1<'_, f64>, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].abs().total_cmp(&values[a].abs()));
    order.truncate(n);
    order
}

/// Bin that `value` falls in: the number of cut points strictly below it
fn bin_index(cut_points: &[f32], value: f32) -> usize {
    cut_points.partition_point(|&cut| cut < value)
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 100]
fn percentile(sorted: &[f32], q: f64) -> f32 {
    let position = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    (sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * fraction) as f32
}

fn sample_bin(rng: &mut StdRng, frequencies: &[f32]) -> usize {
    let total: f32 = frequencies.iter().sum();
    let mut remaining = rng.random::<f32>() * total;
    for (bin, &frequency) in frequencies.iter().enumerate() {
        if remaining < frequency {
            return bin;
        }
        remaining -= frequency;
    }
    frequencies.iter().rposition(|&f| f > 0.0).unwrap_or(0)
}

/// Normal draw restricted to `[low, high]`, by rejection with a uniform fallback
fn sample_truncated_normal(rng: &mut StdRng, mean: f32, std: f32, low: f32, high: f32) -> f32 {
    let normal = match Normal::new(mean, std) {
        Ok(normal) if std > f32::EPSILON && high > low => normal,
        _ => return mean.clamp(low.min(high), high.max(low)),
    };
    for _ in 0..32 {
        let value = normal.sample(rng);
        if (low..=high).contains(&value) {
            return value;
        }
    }
    rng.random_range(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use std::sync::Arc;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::new(["signal", "noise"]).unwrap())
    }

    fn training_rows() -> Array2<f32> {
        Array2::from_shape_fn((100, 2), |(i, j)| {
            if j == 0 {
                i as f32
            } else {
                ((i * 37) % 100) as f32
            }
        })
    }

    fn explainer(config: ExplainerConfig) -> LimeTabularExplainer {
        let stats = TrainingStatistics::fit(&schema(), training_rows().view()).unwrap();
        LimeTabularExplainer::new(stats, config).unwrap()
    }

    /// Positive-class probability rises steeply with `signal`, ignores `noise`
    fn signal_model(rows: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let mut output = Array2::zeros((rows.nrows(), 2));
        for (i, row) in rows.outer_iter().enumerate() {
            let p = 1.0 / (1.0 + (-(row[0] - 50.0) / 5.0).exp());
            output[[i, 0]] = 1.0 - p;
            output[[i, 1]] = p;
        }
        Ok(output)
    }

    #[test]
    fn test_truncated_normal_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let value = sample_truncated_normal(&mut rng, 5.0, 10.0, 4.0, 6.0);
            assert!((4.0..=6.0).contains(&value));
        }
        assert_eq!(sample_truncated_normal(&mut rng, 3.0, 0.0, 3.0, 3.0), 3.0);
        assert_eq!(sample_truncated_normal(&mut rng, 9.0, f32::NAN, 0.0, 5.0), 5.0);
    }

    #[test]
    fn test_percentiles() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 25.0), 2.0);
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert_eq!(percentile(&[1.0, 2.0], 50.0), 1.5);
    }

    #[test]
    fn test_bins_and_descriptions() {
        let stats = TrainingStatistics::fit(&schema(), training_rows().view()).unwrap();
        let signal = &stats.features[0];
        assert_eq!(signal.cut_points, vec![24.75, 49.5, 74.25]);
        assert_eq!(signal.bin_of(10.0), 0);
        assert_eq!(signal.bin_of(24.75), 0);
        assert_eq!(signal.bin_of(30.0), 1);
        assert_eq!(signal.bin_of(99.0), 3);
        assert_eq!(signal.describe(0), "signal <= 24.75");
        assert_eq!(signal.describe(1), "24.75 < signal <= 49.50");
        assert_eq!(signal.describe(3), "signal > 74.25");
        let total: f32 = signal.bin_frequencies.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_feature_has_single_bin() {
        let schema = FeatureSchema::new(["flat"]).unwrap();
        let stats = TrainingStatistics::fit(&schema, Array2::from_elem((10, 1), 3.0).view()).unwrap();
        let flat = &stats.features[0];
        assert!(flat.cut_points.is_empty());
        assert_eq!(flat.bin_frequencies, vec![1.0]);
        assert_eq!(flat.describe(0), "flat");
    }

    #[test]
    fn test_top_bin_is_never_empty() {
        // quartiles of [0, 1, 1, 1] are 0.75, 1 and 1
        let schema = FeatureSchema::new(["skewed"]).unwrap();
        let stats = TrainingStatistics::fit(&schema, array![[0.0f32], [1.0], [1.0], [1.0]].view()).unwrap();
        let skewed = &stats.features[0];
        assert_eq!(skewed.cut_points, vec![0.75]);
        assert_eq!(skewed.bin_frequencies, vec![0.25, 0.75]);
        assert_eq!(skewed.describe(1), "skewed > 0.75");
    }

    #[test]
    fn test_constant_feature_in_explanation_is_bare_name() {
        let schema = Arc::new(FeatureSchema::new(["signal", "flat"]).unwrap());
        let rows = Array2::from_shape_fn((100, 2), |(i, j)| if j == 0 { i as f32 } else { 3.0 });
        let stats = TrainingStatistics::fit(&schema, rows.view()).unwrap();
        let explainer = LimeTabularExplainer::new(stats, ExplainerConfig { num_samples: 300, ..Default::default() }).unwrap();
        let instance = FeatureVector::new(schema, array![90.0, 3.0]).unwrap();
        let explanation = explainer.explain_instance(&instance, &signal_model, 2, 1).unwrap();
        assert!(explanation.iter().any(|(descriptor, _)| descriptor == "flat"));
    }

    #[test]
    fn test_dominant_feature_is_ranked_first() {
        let explainer = explainer(ExplainerConfig { num_samples: 1000, ..Default::default() });
        let instance = FeatureVector::new(schema(), array![90.0, 10.0]).unwrap();
        let explanation = explainer.explain_instance(&instance, &signal_model, 2, 1).unwrap();

        assert_eq!(explanation.len(), 2);
        assert_eq!(explanation[0].0, "signal > 74.25");
        assert!(explanation[0].1 > 0.0);
        assert!(explanation[0].1.abs() > explanation[1].1.abs());
    }

    #[test]
    fn test_explanations_are_deterministic_for_a_seed() {
        for selection in [FeatureSelection::HighestWeights, FeatureSelection::ForwardSelection] {
            let explainer = explainer(ExplainerConfig {
                num_samples: 300,
                feature_selection: selection,
                ..Default::default()
            });
            let instance = FeatureVector::new(schema(), array![20.0, 60.0]).unwrap();
            let first = explainer.explain_instance(&instance, &signal_model, 2, 1).unwrap();
            let second = explainer.explain_instance(&instance, &signal_model, 2, 1).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_num_features_limits_output() {
        let explainer = explainer(ExplainerConfig { num_samples: 200, ..Default::default() });
        let instance = FeatureVector::new(schema(), array![90.0, 10.0]).unwrap();
        assert_eq!(explainer.explain_instance(&instance, &signal_model, 1, 1).unwrap().len(), 1);
        assert_eq!(explainer.explain_instance(&instance, &signal_model, 10, 1).unwrap().len(), 2);
        assert!(explainer.explain_instance(&instance, &signal_model, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_schema_and_prediction_errors() {
        let explainer = explainer(ExplainerConfig { num_samples: 50, ..Default::default() });
        let other = Arc::new(FeatureSchema::new(["a", "b"]).unwrap());
        let foreign = FeatureVector::new(other, array![1.0, 2.0]).unwrap();
        assert!(matches!(
            explainer.explain_instance(&foreign, &signal_model, 2, 1),
            Err(EditorError::Explain(_))
        ));

        let instance = FeatureVector::new(schema(), array![1.0, 2.0]).unwrap();
        let failing = |_: ArrayView2<'_, f32>| -> Result<Array2<f32>> { Err(EditorError::Model("offline".into())) };
        assert!(matches!(
            explainer.explain_instance(&instance, &failing, 2, 1),
            Err(EditorError::Explain(_))
        ));
        assert!(matches!(
            explainer.explain_instance(&instance, &signal_model, 2, 5),
            Err(EditorError::Explain(_))
        ));
    }

    #[test]
    fn test_statistics_round_trip_and_validation() {
        let stats = TrainingStatistics::fit(&schema(), training_rows().view()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explainer.json");
        stats.save(&path).unwrap();
        assert_eq!(TrainingStatistics::load(&path).unwrap(), stats);

        let mut broken = stats.clone();
        broken.features[0].bin_means.pop();
        assert!(LimeTabularExplainer::new(broken, ExplainerConfig::default()).is_err());
        assert!(LimeTabularExplainer::new(stats, ExplainerConfig { num_samples: 1, ..Default::default() }).is_err());
    }
}
