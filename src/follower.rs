//! Gesture follower engine and its session state machine.

use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{FollowerConfig, NoiseModel, Parameters, Spread, FALLBACK_TOLERANCE, TOLERANCE_RANGE_DIVISOR};
use crate::estimator::{Estimator, Outcome};
use crate::gesture::GestureTemplate;
use crate::io;
use crate::likelihood::ObservationModel;
use crate::particles::{BoundaryEvent, ParticleId, ParticlePopulation, ParticleSnapshot, Resampler, TransitionModel};
use crate::sampling::Sampler;
use crate::templates::{TemplateId, TemplateStore};
use crate::utils::warn_once;
use crate::{Error, Result};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    /// No vocabulary, or freshly cleared.
    #[default]
    Clear,
    /// Observations are appended to an in-progress template.
    Learning,
    /// Observations drive the particle filter.
    Following,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Clear => "Clear",
            State::Learning => "Learning",
            State::Following => "Following",
        };
        f.write_str(name)
    }
}

/// Gesture follower.
///
/// Records gesture templates while [`State::Learning`] and, while
/// [`State::Following`], runs a particle filter over a live observation
/// stream to estimate which template is being performed and how it varies
/// (phase, speed, scale, rotation).
#[derive(Debug, Clone)]
pub struct GestureFollower {
    config: FollowerConfig,
    store: TemplateStore,
    state: State,

    /// In-progress template while learning.
    learning: GestureTemplate,
    /// Live gesture while following, relative to its first observation.
    live: GestureTemplate,
    /// Vocabulary slot the in-progress template replaces on commit.
    replace_target: Option<TemplateId>,
    active: Vec<TemplateId>,

    population: ParticlePopulation,
    transition: TransitionModel,
    observation_model: ObservationModel,
    resampler: Resampler,
    estimator: Estimator,
    sampler: Sampler,
    outcome: Outcome,
}

impl GestureFollower {
    /// Create a follower seeded from the operating system.
    pub fn new(config: FollowerConfig) -> Self {
        Self::with_sampler(config, Sampler::from_entropy())
    }

    /// Create a follower with a deterministic random sequence.
    pub fn with_seed(config: FollowerConfig, seed: u64) -> Self {
        Self::with_sampler(config, Sampler::seeded(seed))
    }

    fn with_sampler(mut config: FollowerConfig, sampler: Sampler) -> Self {
        config.parameters = config.parameters.normalized();
        let parameters = &config.parameters;

        let transition = TransitionModel::new(parameters, NoiseModel::derive(parameters, 0));
        let observation_model = ObservationModel::new(
            parameters.kernel(),
            parameters.tolerance.unwrap_or(FALLBACK_TOLERANCE),
            Vec::new(),
        );
        let resampler = Resampler::new(parameters.resampling_threshold);
        let population = ParticlePopulation::new(parameters.number_of_particles, 0);

        Self {
            config,
            store: TemplateStore::new(),
            state: State::Clear,
            learning: GestureTemplate::default(),
            live: GestureTemplate::default(),
            replace_target: None,
            active: Vec::new(),
            population,
            transition,
            observation_model,
            resampler,
            estimator: Estimator::new(),
            sampler,
            outcome: Outcome::empty(),
        }
    }

    // ===== Session state machine =====

    /// Move to `state` and return the resulting state.
    ///
    /// - `Clear` drops the vocabulary and the in-progress template.
    /// - `Learning` commits a non-empty in-progress template when already
    ///   learning, then starts a fresh one. `replace` designates the
    ///   vocabulary slot the next committed template replaces.
    /// - `Following` commits a pending template, then (re)initializes the
    ///   particles. With an empty vocabulary the follower falls back to
    ///   `Clear`.
    pub fn set_state(&mut self, state: State, replace: Option<TemplateId>) -> State {
        let previous = self.state;
        match state {
            State::Clear => {
                self.clear();
            }
            State::Learning => {
                if previous == State::Learning {
                    self.commit_learning();
                }
                self.replace_target = replace;
                self.state = State::Learning;
            }
            State::Following => {
                if previous == State::Learning {
                    self.commit_learning();
                }
                self.replace_target = None;
                if self.store.is_empty() {
                    self.state = State::Clear;
                } else {
                    self.state = State::Following;
                    self.train();
                }
            }
        }
        self.learning.clear();
        debug!("state {} -> {} (requested {})", previous, self.state, state);
        self.state
    }

    /// Mark a gesture boundary.
    ///
    /// While following, the filter restarts. While learning, a non-empty
    /// in-progress template is committed and a fresh one started.
    pub fn start_gesture(&mut self) {
        match self.state {
            State::Following => self.restart(),
            State::Learning => {
                self.commit_learning();
                self.learning.clear();
            }
            State::Clear => {}
        }
    }

    /// Append a frame to the in-progress template. Only valid while learning.
    pub fn add_observation(&mut self, frame: &[f64]) -> Result<()> {
        if self.state != State::Learning {
            return Err(self.invalid_state("add_observation"));
        }
        self.learning.push(frame)
    }

    /// Feed one live observation to the filter. Only valid while following.
    ///
    /// The observation is re-based on the first observation since the last
    /// [`restart`](Self::restart) or [`start_gesture`](Self::start_gesture),
    /// then every particle is predicted, bounded and scored once per
    /// prediction sub-step. Posteriors are normalized, resampled when
    /// degenerate, and aggregated into the returned [`Outcome`].
    pub fn update(&mut self, frame: &[f64]) -> Result<&Outcome> {
        if self.state != State::Following {
            return Err(self.invalid_state("update"));
        }
        let dims = self.store.dimensions().unwrap_or(0);
        if frame.len() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                got: frame.len(),
            });
        }

        self.live.push(frame)?;
        let observation = match self.live.last_frame() {
            Some(frame) => frame.clone(),
            None => return Ok(&self.outcome),
        };

        let steps = self.config.parameters.prediction_steps;
        let translate = self.config.translate;
        let segmentation = self.config.segmentation;

        for n in 0..self.population.len() {
            let id = ParticleId(n);
            for _ in 0..steps {
                let template_len = self.store.get(self.population.class(id)).map_or(1, |t| t.len());
                self.transition.predict(&mut self.population, id, template_len, &mut self.sampler);

                let event = self.transition.enforce_bounds(
                    &mut self.population,
                    id,
                    segmentation,
                    observation.as_slice(),
                    &self.active,
                    &mut self.sampler,
                );
                if let BoundaryEvent::Reassigned { from, to } = event {
                    log::trace!("particle {} reassigned {} -> {}", id, from, to);
                }

                let likelihood = match self.store.get(self.population.class(id)) {
                    Some(template) => {
                        let target = if translate {
                            &observation - self.population.offset_of(id)
                        } else {
                            observation.clone()
                        };
                        self.observation_model.likelihood(
                            template,
                            self.population.alignment(id),
                            &self.population.scalings_of(id),
                            &self.population.rotations_of(id),
                            &target,
                        )
                    }
                    None => 0.0,
                };
                self.population.set_likelihood(id, likelihood);
            }
        }

        if !self.population.normalize_posteriors() {
            warn!("particle weights collapsed, resetting to uniform");
        }
        self.resampler.resample_if_needed(&mut self.population, &mut self.sampler);
        self.outcome = self.estimator.estimate(&self.population, self.store.len());

        Ok(&self.outcome)
    }

    /// Re-spread the particles and forget the live gesture, keeping the vocabulary.
    pub fn restart(&mut self) {
        self.live.clear();
        if self.store.is_empty() {
            self.outcome = Outcome::empty();
            return;
        }
        self.transition
            .initialize(&mut self.population, &self.active, &mut self.sampler);
        self.outcome = Outcome::zeroed(self.store.len(), self.population.input_dimensions());
        debug!(
            "restarted {} particles over {} active templates",
            self.population.len(),
            self.active.len()
        );
    }

    fn clear(&mut self) {
        self.store.clear();
        self.active.clear();
        self.live.clear();
        self.replace_target = None;
        self.state = State::Clear;
        self.outcome = Outcome::empty();
    }

    /// Commit the in-progress template, replacing the designated slot or
    /// appending. Rejected commits are logged and dropped.
    fn commit_learning(&mut self) {
        if self.learning.is_empty() {
            return;
        }
        let template = std::mem::take(&mut self.learning);
        let committed = match self.replace_target.take() {
            Some(id) => self.store.replace(id, template).map(|_| id),
            None => self.store.add(template),
        };
        match committed {
            Ok(id) => {
                debug!("committed template {}", id);
                self.vocabulary_changed();
            }
            Err(e) => warn!("template not committed: {}", e),
        }
    }

    fn invalid_state(&self, operation: &str) -> Error {
        Error::InvalidState {
            state: self.state.to_string(),
            operation: operation.to_string(),
        }
    }

    // ===== Vocabulary =====

    /// Append a template to the vocabulary.
    pub fn add_template(&mut self, template: GestureTemplate) -> Result<TemplateId> {
        let id = self.store.add(template)?;
        self.vocabulary_changed();
        Ok(id)
    }

    /// Replace a template; its dimensionality must match the vocabulary.
    pub fn replace_template(&mut self, id: TemplateId, template: GestureTemplate) -> Result<()> {
        self.store.replace(id, template)?;
        self.vocabulary_changed();
        Ok(())
    }

    /// Remove a template. Later ids shift down by one.
    pub fn remove_template(&mut self, id: TemplateId) -> Result<GestureTemplate> {
        let removed = self.store.remove(id)?;
        self.vocabulary_changed();
        Ok(removed)
    }

    /// Remove every template, keeping the current state unless following.
    pub fn remove_all_templates(&mut self) {
        self.store.clear();
        self.vocabulary_changed();
    }

    /// Reset the active set and re-initialize after any vocabulary change.
    fn vocabulary_changed(&mut self) {
        self.active = self.store.ids().collect();
        if self.store.is_empty() {
            if self.state == State::Following {
                self.state = State::Clear;
            }
            self.live.clear();
            self.outcome = Outcome::empty();
            return;
        }
        self.train();
    }

    /// Rebuild every derived model for the current vocabulary and spread the particles.
    fn train(&mut self) {
        self.rebuild_models();
        self.restart();
    }

    /// Recompute noise vectors, tolerance, dimension weights and storage shape
    /// from the parameters and the vocabulary. Returns true if the particle
    /// storage was reallocated.
    fn rebuild_models(&mut self) -> bool {
        let parameters = &self.config.parameters;
        let dims = self.store.dimensions().unwrap_or(0);
        let noise = NoiseModel::derive(parameters, dims);

        if noise.rotation_dimensions() == 0 && parameters.rotations_sigma.iter().any(|s| *s != 0.0) {
            warn_once("rotations are only tracked for 2D and 3D input");
        }

        self.observation_model = ObservationModel::new(parameters.kernel(), self.effective_tolerance(), noise.dim_weights.clone());
        self.transition = TransitionModel::new(parameters, noise);
        self.resampler.set_threshold(parameters.resampling_threshold);

        let count = parameters.number_of_particles;
        if self.population.has_shape(count, dims) {
            false
        } else {
            self.population = ParticlePopulation::new(count, dims);
            true
        }
    }

    /// Manual tolerance, or the mean template range divided by 4.
    fn effective_tolerance(&self) -> f64 {
        let tolerance = match self.config.parameters.tolerance {
            Some(tolerance) => tolerance,
            None => self
                .store
                .mean_range()
                .map_or(FALLBACK_TOLERANCE, |range| range / TOLERANCE_RANGE_DIVISOR),
        };
        if tolerance > 0.0 && tolerance.is_finite() {
            tolerance
        } else {
            FALLBACK_TOLERANCE
        }
    }

    /// Restrict which templates particles are assigned to.
    ///
    /// An empty list or any unknown id selects every template. Takes effect
    /// at the next restart or segment boundary.
    pub fn set_active_templates(&mut self, ids: &[TemplateId]) {
        if ids.is_empty() || ids.iter().any(|id| self.store.get(*id).is_none()) {
            self.active = self.store.ids().collect();
        } else {
            self.active = ids.to_vec();
        }
    }

    // ===== Parameters =====

    /// Replace the parameters wholesale.
    ///
    /// Out-of-range values are clamped. Derived models are rebuilt at once;
    /// the particles are re-spread only when their storage had to change.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.config.parameters = parameters.normalized();
        if self.store.is_empty() {
            self.resampler.set_threshold(self.config.parameters.resampling_threshold);
            return;
        }
        if self.rebuild_models() {
            self.restart();
        }
    }

    fn update_parameters(&mut self, change: impl FnOnce(&mut Parameters)) {
        let mut parameters = self.config.parameters.clone();
        change(&mut parameters);
        self.set_parameters(parameters);
    }

    pub fn set_number_of_particles(&mut self, count: usize) {
        self.update_parameters(|p| p.number_of_particles = count);
    }

    pub fn set_resampling_threshold(&mut self, threshold: usize) {
        self.update_parameters(|p| p.resampling_threshold = threshold);
    }

    /// Manual tolerance, or `None` for the automatic one.
    pub fn set_tolerance(&mut self, tolerance: Option<f64>) {
        self.update_parameters(|p| p.tolerance = tolerance);
    }

    /// 0 selects the Gaussian kernel, > 0 a Student's-t kernel with that many degrees of freedom.
    pub fn set_distribution(&mut self, distribution: f64) {
        self.update_parameters(|p| p.distribution = distribution);
    }

    pub fn set_prediction_steps(&mut self, steps: usize) {
        self.update_parameters(|p| p.prediction_steps = steps);
    }

    pub fn set_alignment_sigma(&mut self, sigma: f64) {
        self.update_parameters(|p| p.alignment_sigma = sigma);
    }

    pub fn set_dynamics_sigma(&mut self, sigma: Vec<f64>) {
        self.update_parameters(|p| p.dynamics_sigma = sigma);
    }

    pub fn set_scalings_sigma(&mut self, sigma: Vec<f64>) {
        self.update_parameters(|p| p.scalings_sigma = sigma);
    }

    pub fn set_rotations_sigma(&mut self, sigma: Vec<f64>) {
        self.update_parameters(|p| p.rotations_sigma = sigma);
    }

    pub fn set_alignment_spread(&mut self, spread: Spread) {
        self.update_parameters(|p| p.alignment_spread = spread);
    }

    pub fn set_dynamics_spread(&mut self, spread: Spread) {
        self.update_parameters(|p| p.dynamics_spread = spread);
    }

    pub fn set_scalings_spread(&mut self, spread: Spread) {
        self.update_parameters(|p| p.scalings_spread = spread);
    }

    pub fn set_rotations_spread(&mut self, spread: Spread) {
        self.update_parameters(|p| p.rotations_spread = spread);
    }

    pub fn set_dim_weights(&mut self, weights: Option<Vec<f64>>) {
        self.update_parameters(|p| p.dim_weights = weights);
    }

    pub fn set_translate(&mut self, translate: bool) {
        self.config.translate = translate;
    }

    pub fn set_segmentation(&mut self, segmentation: bool) {
        self.config.segmentation = segmentation;
    }

    // ===== Persistence =====

    /// Write the vocabulary to `path`.
    pub fn save_templates(&self, path: impl AsRef<Path>) -> Result<()> {
        io::save_templates(path, &self.store)
    }

    /// Append the templates stored in `path` to the vocabulary.
    ///
    /// Returns the number of templates added. Nothing is added when any
    /// template fails to parse or does not match the vocabulary dimensionality.
    pub fn load_templates(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let templates = io::load_templates(path)?;
        let mut store = self.store.clone();
        for template in templates.iter().cloned() {
            store.add(template)?;
        }
        self.store = store;
        self.vocabulary_changed();
        Ok(templates.len())
    }

    // ===== Accessors =====

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    pub fn parameters(&self) -> &Parameters {
        &self.config.parameters
    }

    pub fn translate(&self) -> bool {
        self.config.translate
    }

    pub fn segmentation(&self) -> bool {
        self.config.segmentation
    }

    /// Tolerance currently used by the likelihood.
    pub fn tolerance(&self) -> f64 {
        self.observation_model.tolerance()
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.store
    }

    pub fn template(&self, id: TemplateId) -> Option<&GestureTemplate> {
        self.store.get(id)
    }

    pub fn number_of_templates(&self) -> usize {
        self.store.len()
    }

    /// Vocabulary dimensionality, or `None` when empty.
    pub fn input_dimensions(&self) -> Option<usize> {
        self.store.dimensions()
    }

    pub fn active_templates(&self) -> &[TemplateId] {
        &self.active
    }

    /// Template currently being recorded.
    pub fn learning_template(&self) -> &GestureTemplate {
        &self.learning
    }

    /// Live gesture, relative to its first observation.
    pub fn live_gesture(&self) -> &GestureTemplate {
        &self.live
    }

    /// Outcome of the last update.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Most probable template after the last update.
    pub fn most_probable(&self) -> Option<TemplateId> {
        self.outcome.most_probable
    }

    pub fn population(&self) -> &ParticlePopulation {
        &self.population
    }

    /// Template assigned to every particle.
    pub fn particle_classes(&self) -> &[TemplateId] {
        self.population.classes()
    }

    /// Owned copy of every particle's state, for external visualization.
    pub fn particles(&self) -> Vec<ParticleSnapshot> {
        self.population.snapshots()
    }
}

impl Default for GestureFollower {
    fn default() -> Self {
        Self::new(FollowerConfig::default())
    }
}
