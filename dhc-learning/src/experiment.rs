use std::time::{Duration, Instant};

use dhc_core::{math, show_duration, Alphabet, MealyMachine, Show};
use tracing::{debug, info};

use crate::{BlackBoxOracle, EquivalenceOracle, LearnError, LearningAlgorithm, Query};

type Hypothesis<L> =
    MealyMachine<<L as LearningAlgorithm>::Input, <L as LearningAlgorithm>::Output>;

/// Counts how often something happened during an experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    name: &'static str,
    unit: &'static str,
    count: usize,
}

impl Counter {
    pub fn new(name: &'static str, unit: &'static str) -> Self {
        Self {
            name,
            unit,
            count: 0,
        }
    }

    pub fn increment(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.name, self.unit, self.count)
    }
}

/// The phases an experiment alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Learning,
    Equivalence,
    PropertyViolation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Learning => write!(f, "Learning"),
            Phase::Equivalence => write!(f, "Searching for counterexample"),
            Phase::PropertyViolation => write!(f, "Searching for property violation"),
        }
    }
}

/// Accumulated durations per phase, only recorded when profiling is switched on.
#[derive(Debug, Clone, Default)]
struct Profile {
    enabled: bool,
    durations: math::Map<Phase, Duration>,
}

impl Profile {
    fn timed<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        info!("{phase}");
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let out = f();
        *self.durations.entry(phase).or_default() += start.elapsed();
        out
    }
}

/// Runs a learning algorithm against an equivalence oracle until no more counterexamples are
/// found.
pub struct Experiment<L: LearningAlgorithm, E> {
    learner: L,
    equivalence: E,
    alphabet: Alphabet<L::Input>,
    log_models: bool,
    profile: Profile,
    rounds: Counter,
    final_hypothesis: Option<Hypothesis<L>>,
}

impl<L, E> Experiment<L, E>
where
    L: LearningAlgorithm,
    E: EquivalenceOracle<Input = L::Input, Output = L::Output>,
{
    pub fn new(learner: L, equivalence: E, alphabet: Alphabet<L::Input>) -> Self {
        Self {
            learner,
            equivalence,
            alphabet,
            log_models: false,
            profile: Profile::default(),
            rounds: Counter::new("learning rounds", "#"),
            final_hypothesis: None,
        }
    }

    /// Logs every hypothesis before it is checked for equivalence.
    pub fn with_log_models(mut self, log_models: bool) -> Self {
        self.log_models = log_models;
        self
    }

    /// Records how much time is spent in each [`Phase`].
    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profile.enabled = profiling;
        self
    }

    /// Learns until the equivalence oracle accepts the hypothesis and returns it.
    pub fn run(&mut self) -> Result<&Hypothesis<L>, LearnError> {
        let start = Instant::now();
        self.init()?;
        while self.equivalence_round()? {}
        info!(
            "experiment finished after {} in {}",
            self.rounds,
            show_duration(start.elapsed())
        );
        self.freeze()
    }

    /// The hypothesis that the last call to [`Experiment::run`] ended with.
    pub fn final_hypothesis(&self) -> Result<&Hypothesis<L>, LearnError> {
        self.final_hypothesis.as_ref().ok_or(LearnError::NoHypothesis)
    }

    pub fn rounds(&self) -> &Counter {
        &self.rounds
    }

    /// Total time spent in `phase`, `None` if profiling is off or the phase never ran.
    pub fn profile(&self, phase: Phase) -> Option<Duration> {
        self.profile.durations.get(&phase).copied()
    }

    /// Renders the recorded phase durations as a table.
    pub fn profile_table(&self) -> String {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(["phase", "time"]);
        for (phase, duration) in &self.profile.durations {
            builder.push_record([phase.to_string(), show_duration(*duration)]);
        }
        builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string()
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn alphabet(&self) -> &Alphabet<L::Input> {
        &self.alphabet
    }

    fn init(&mut self) -> Result<(), LearnError> {
        self.rounds.increment();
        info!("Starting round {}", self.rounds.count());
        let learner = &mut self.learner;
        self.profile
            .timed(Phase::Learning, || learner.start_learning())
    }

    /// Asks the equivalence oracle for a counterexample and refines with it. Gives `false` once
    /// the hypothesis is accepted.
    fn equivalence_round(&mut self) -> Result<bool, LearnError> {
        let hypothesis = self.learner.hypothesis()?;
        if self.log_models {
            debug!("hypothesis\n{hypothesis:?}");
        }
        let (equivalence, alphabet) = (&mut self.equivalence, &self.alphabet);
        let Some(counterexample) = self.profile.timed(Phase::Equivalence, || {
            equivalence.find_counterexample(hypothesis, alphabet)
        })?
        else {
            return Ok(false);
        };
        debug!("counterexample {counterexample:?}");

        self.rounds.increment();
        info!("Starting round {}", self.rounds.count());
        let learner = &mut self.learner;
        let refinement = self
            .profile
            .timed(Phase::Learning, || learner.refine_hypothesis(&counterexample))?;
        if refinement.is_anomalous() {
            return Err(no_progress(&counterexample, refinement.states_after));
        }
        Ok(true)
    }

    fn freeze(&mut self) -> Result<&Hypothesis<L>, LearnError> {
        let hypothesis = self.learner.hypothesis()?.clone();
        Ok(self.final_hypothesis.insert(hypothesis))
    }
}

fn no_progress<I: dhc_core::Symbol, O>(counterexample: &Query<I, O>, states: usize) -> LearnError {
    LearnError::NoProgress(format!(
        "hypothesis with {states} states is unchanged by {}",
        counterexample.input().show()
    ))
}

/// An [`Experiment`] that additionally checks every hypothesis against black-box properties.
///
/// Property violations that turn out to be spurious are used as counterexamples until either
/// every property is known to be violated by the system or the black-box oracle runs out of
/// counterexamples. Then an ordinary equivalence round follows, which is skipped once all
/// properties are violated unless `keep_learning` is set.
pub struct BbcExperiment<L: LearningAlgorithm, E, B> {
    experiment: Experiment<L, E>,
    black_box: B,
    keep_learning: bool,
    bbc_rounds: Counter,
    violation_rounds: Counter,
}

impl<L, E, B> BbcExperiment<L, E, B>
where
    L: LearningAlgorithm,
    E: EquivalenceOracle<Input = L::Input, Output = L::Output>,
    B: BlackBoxOracle<Input = L::Input, Output = L::Output>,
{
    pub fn new(experiment: Experiment<L, E>, black_box: B) -> Self {
        Self {
            experiment,
            black_box,
            keep_learning: false,
            bbc_rounds: Counter::new("BBC rounds", "#"),
            violation_rounds: Counter::new("property violation detection rounds", "#"),
        }
    }

    /// Continue with equivalence rounds after every property has been shown to be violated.
    pub fn with_keep_learning(mut self, keep_learning: bool) -> Self {
        self.keep_learning = keep_learning;
        self
    }

    pub fn run(&mut self) -> Result<&Hypothesis<L>, LearnError> {
        let start = Instant::now();
        self.experiment.init()?;
        loop {
            self.bbc_rounds.increment();
            while self.violation_round()? {}
            if !self.keep_learning && self.black_box.all_properties_violated() {
                break;
            }
            if !self.experiment.equivalence_round()? {
                break;
            }
        }
        info!(
            "black-box checking finished after {}, {} and {} in {}",
            self.experiment.rounds,
            self.bbc_rounds,
            self.violation_rounds,
            show_duration(start.elapsed())
        );
        self.experiment.freeze()
    }

    /// Looks for a property violation and refines with it if it is spurious. Gives `true` if
    /// the search should go on.
    fn violation_round(&mut self) -> Result<bool, LearnError> {
        self.violation_rounds.increment();
        let experiment = &mut self.experiment;
        let hypothesis = experiment.learner.hypothesis()?;
        let (black_box, alphabet) = (&mut self.black_box, &experiment.alphabet);
        let counterexample = experiment.profile.timed(Phase::PropertyViolation, || {
            black_box.find_counterexample(hypothesis, alphabet)
        })?;
        if self.black_box.all_properties_violated() {
            return Ok(false);
        }
        let Some(counterexample) = counterexample else {
            return Ok(false);
        };
        debug!("spurious property violation {counterexample:?}");
        let learner = &mut experiment.learner;
        let refinement = experiment
            .profile
            .timed(Phase::Learning, || learner.refine_hypothesis(&counterexample))?;
        Ok(refinement.is_progress())
    }

    pub fn final_hypothesis(&self) -> Result<&Hypothesis<L>, LearnError> {
        self.experiment.final_hypothesis()
    }

    pub fn experiment(&self) -> &Experiment<L, E> {
        &self.experiment
    }

    pub fn black_box(&self) -> &B {
        &self.black_box
    }

    pub fn bbc_rounds(&self) -> &Counter {
        &self.bbc_rounds
    }

    pub fn violation_rounds(&self) -> &Counter {
        &self.violation_rounds
    }
}

#[cfg(test)]
mod tests {
    use dhc_core::Word;

    use super::*;
    use crate::{
        sul::MealySimulatorSul, testing, CexFirstOracle, DeepSulOmegaOracle,
        ForbiddenOutputChecker, LassoEmptinessOracle, MealyDhc, MembershipInclusionOracle,
        ModelCheckingProperty, SimulatorEquivalenceOracle, SimulatorOracle,
    };

    #[test_log::test]
    fn converges_on_random_targets() {
        let mut rng = fastrand::Rng::with_seed(0xdac);
        for _ in 0..20 {
            let size = 1 + rng.usize(..6);
            let target = testing::random_mealy(&mut rng, size, &['a', 'b', 'c'], 3);
            let alphabet = target.alphabet().clone();
            let mut experiment = Experiment::new(
                MealyDhc::new(alphabet.clone(), SimulatorOracle::new(target.clone())),
                SimulatorEquivalenceOracle::new(target.clone()),
                alphabet,
            )
            .with_log_models(true)
            .with_profiling(true);
            let learned = experiment.run().unwrap().clone();
            assert_eq!(learned.witness_inequivalence(&target), None);
            assert!(learned.size() <= size);
            assert!(experiment.rounds().count() >= 1);
            assert!(experiment.profile(Phase::Learning).is_some());
            assert_eq!(experiment.final_hypothesis(), Ok(&learned));
        }
    }

    #[test_log::test]
    fn counts_rounds() {
        let target = testing::delayed();
        let alphabet = target.alphabet().clone();
        let mut experiment = Experiment::new(
            MealyDhc::new(alphabet.clone(), SimulatorOracle::new(target.clone())),
            SimulatorEquivalenceOracle::new(target),
            alphabet,
        );
        assert_eq!(
            experiment.final_hypothesis().unwrap_err(),
            LearnError::NoHypothesis
        );
        assert_eq!(experiment.run().unwrap().size(), 3);
        assert_eq!(experiment.rounds().count(), 2);
        assert_eq!(
            experiment.rounds().to_string(),
            "learning rounds [#]: 2"
        );
        // profiling is off by default
        assert_eq!(experiment.profile(Phase::Equivalence), None);
    }

    /// Keeps presenting the same query, whether or not the hypothesis agrees with it.
    struct Stubborn(Query<char, u8>);

    impl EquivalenceOracle for Stubborn {
        type Input = char;
        type Output = u8;

        fn find_counterexample(
            &mut self,
            _hypothesis: &MealyMachine<char, u8>,
            _alphabet: &Alphabet<char>,
        ) -> Result<Option<Query<char, u8>>, LearnError> {
            Ok(Some(self.0.clone()))
        }
    }

    #[test_log::test]
    fn spurious_counterexample_stops_experiment() {
        let target = testing::toggle();
        let alphabet = target.alphabet().clone();
        let correct = Query::answered(Word::epsilon(), Word::from("aa"), Word::from(vec![1, 2]));
        let mut experiment = Experiment::new(
            MealyDhc::new(alphabet.clone(), SimulatorOracle::new(target)),
            Stubborn(correct),
            alphabet,
        );
        let err = experiment.run().unwrap_err();
        assert!(matches!(err, LearnError::NoProgress(_)), "{err:?}");
        assert_eq!(err.kind(), crate::ErrorKind::ExecutionFault);
        assert_eq!(experiment.rounds().count(), 1);
        assert_eq!(
            experiment.final_hypothesis().unwrap_err(),
            LearnError::NoHypothesis
        );
    }

    #[test_log::test]
    fn black_box_checking_finds_violation() {
        let target = testing::delayed();
        let alphabet = target.alphabet().clone();
        let property = ModelCheckingProperty::new(
            "never one",
            ForbiddenOutputChecker::new(1).with_property("never one", 1),
            LassoEmptinessOracle::new(
                DeepSulOmegaOracle::new(MealySimulatorSul::new(target.clone())).unwrap(),
            ),
            MembershipInclusionOracle::new(SimulatorOracle::new(target.clone())),
        );
        let experiment = Experiment::new(
            MealyDhc::new(alphabet.clone(), SimulatorOracle::new(target.clone())),
            SimulatorEquivalenceOracle::new(target.clone()),
            alphabet,
        )
        .with_profiling(true);
        let mut bbc = BbcExperiment::new(experiment, CexFirstOracle::new([property]));
        let learned = bbc.run().unwrap().clone();

        assert_eq!(learned.witness_inequivalence(&target), None);
        assert!(bbc.black_box().all_properties_violated());
        assert_eq!(
            bbc.black_box().violated().collect::<Vec<_>>(),
            vec!["never one"]
        );
        assert_eq!(bbc.bbc_rounds().count(), 2);
        assert_eq!(bbc.violation_rounds().count(), 2);
        assert_eq!(bbc.experiment().rounds().count(), 2);
        assert!(bbc.experiment().profile(Phase::PropertyViolation).is_some());
        assert!(bbc
            .experiment()
            .profile_table()
            .contains("Searching for property violation"));
    }
}
