use dhc_core::{Alphabet, Color, MealyMachine, Show, Symbol};
use tracing::{debug, info};

use super::{EmptinessOracle, InclusionOracle, Lasso, ModelChecker};
use crate::{LearnError, Query};

/// A property of the system under learning that is checked on hypotheses.
pub trait BlackBoxProperty {
    type Input: Symbol;
    type Output: Color;

    /// The property as understood by the model checker.
    fn property(&self) -> &str;

    /// Returns `true` once the system has been shown to violate the property.
    fn is_disproved(&self) -> bool;

    /// Tries to show that the system itself violates the property, gives the witnessing query.
    fn disprove(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;

    /// Tries to find a counterexample to `hypothesis` by checking the property on it. If the
    /// violation found by the model checker turns out to be real, the property is disproved
    /// instead and no counterexample is returned.
    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;
}

impl<P: BlackBoxProperty + ?Sized> BlackBoxProperty for Box<P> {
    type Input = P::Input;
    type Output = P::Output;

    fn property(&self) -> &str {
        (**self).property()
    }

    fn is_disproved(&self) -> bool {
        (**self).is_disproved()
    }

    fn disprove(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError> {
        (**self).disprove(hypothesis, alphabet)
    }

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError> {
        (**self).find_counterexample(hypothesis, alphabet)
    }
}

/// A [`BlackBoxProperty`] that model checks hypotheses and examines the reported lassos with
/// an emptiness oracle (does the system really violate the property?) and an inclusion oracle
/// (does the lasso expose a flaw of the hypothesis?).
pub struct ModelCheckingProperty<C: ModelChecker, E, N> {
    property: String,
    checker: C,
    emptiness: E,
    inclusion: N,
    // the last hypothesis that was model checked, together with the outcome
    checked: Option<(MealyMachine<C::Input, C::Output>, Option<Lasso<C::Input, C::Output>>)>,
    witness: Option<Query<C::Input, C::Output>>,
}

impl<C, E, N> ModelCheckingProperty<C, E, N>
where
    C: ModelChecker,
    E: EmptinessOracle<Input = C::Input, Output = C::Output>,
    N: InclusionOracle<Input = C::Input, Output = C::Output>,
{
    pub fn new<P: Into<String>>(property: P, checker: C, emptiness: E, inclusion: N) -> Self {
        Self {
            property: property.into(),
            checker,
            emptiness,
            inclusion,
            checked: None,
            witness: None,
        }
    }

    /// The query on which the system was shown to violate the property.
    pub fn witness(&self) -> Option<&Query<C::Input, C::Output>> {
        self.witness.as_ref()
    }

    /// Model checks `hypothesis` unless it is the same hypothesis that was checked last.
    fn lasso(
        &mut self,
        hypothesis: &MealyMachine<C::Input, C::Output>,
        alphabet: &Alphabet<C::Input>,
    ) -> Result<Option<Lasso<C::Input, C::Output>>, LearnError> {
        if let Some((checked, lasso)) = &self.checked {
            if checked == hypothesis {
                return Ok(lasso.clone());
            }
        }
        let lasso = self
            .checker
            .find_counterexample(hypothesis, alphabet, &self.property)?;
        self.checked = Some((hypothesis.clone(), lasso.clone()));
        Ok(lasso)
    }
}

impl<C, E, N> BlackBoxProperty for ModelCheckingProperty<C, E, N>
where
    C: ModelChecker,
    E: EmptinessOracle<Input = C::Input, Output = C::Output>,
    N: InclusionOracle<Input = C::Input, Output = C::Output>,
{
    type Input = C::Input;
    type Output = C::Output;

    fn property(&self) -> &str {
        &self.property
    }

    fn is_disproved(&self) -> bool {
        self.witness.is_some()
    }

    fn disprove(
        &mut self,
        hypothesis: &MealyMachine<C::Input, C::Output>,
        alphabet: &Alphabet<C::Input>,
    ) -> Result<Option<Query<C::Input, C::Output>>, LearnError> {
        if let Some(witness) = &self.witness {
            return Ok(Some(witness.clone()));
        }
        let Some(lasso) = self.lasso(hypothesis, alphabet)? else {
            return Ok(None);
        };
        let witness = self.emptiness.find_counterexample(&lasso)?;
        if let Some(witness) = &witness {
            info!(
                "property {} is violated by the system, witnessed by {}",
                self.property,
                witness.input().show()
            );
            self.witness = Some(witness.clone());
        }
        Ok(witness)
    }

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<C::Input, C::Output>,
        alphabet: &Alphabet<C::Input>,
    ) -> Result<Option<Query<C::Input, C::Output>>, LearnError> {
        if self.is_disproved() {
            return Ok(None);
        }
        let Some(lasso) = self.lasso(hypothesis, alphabet)? else {
            return Ok(None);
        };
        if self.disprove(hypothesis, alphabet)?.is_some() {
            return Ok(None);
        }
        let counterexample = self.inclusion.find_counterexample(&lasso)?;
        if let Some(cex) = &counterexample {
            debug!(
                "spurious violation of {} refutes hypothesis on {}",
                self.property,
                cex.input().show()
            );
        }
        Ok(counterexample)
    }
}

/// Searches counterexamples through black-box properties.
pub trait BlackBoxOracle {
    type Input: Symbol;
    type Output: Color;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<Self::Input, Self::Output>,
        alphabet: &Alphabet<Self::Input>,
    ) -> Result<Option<Query<Self::Input, Self::Output>>, LearnError>;

    /// Returns `true` if the system has been shown to violate every property.
    fn all_properties_violated(&self) -> bool;
}

/// Asks its properties one after another and returns the first counterexample that one of
/// them finds. Properties that the system is known to violate are skipped.
pub struct CexFirstOracle<P> {
    properties: Vec<P>,
}

impl<P: BlackBoxProperty> CexFirstOracle<P> {
    pub fn new<J: IntoIterator<Item = P>>(properties: J) -> Self {
        Self {
            properties: properties.into_iter().collect(),
        }
    }

    pub fn properties(&self) -> &[P] {
        &self.properties
    }

    /// Names of the properties the system has been shown to violate.
    pub fn violated(&self) -> impl Iterator<Item = &str> + '_ {
        self.properties
            .iter()
            .filter(|p| p.is_disproved())
            .map(|p| p.property())
    }
}

impl<P: BlackBoxProperty> BlackBoxOracle for CexFirstOracle<P> {
    type Input = P::Input;
    type Output = P::Output;

    fn find_counterexample(
        &mut self,
        hypothesis: &MealyMachine<P::Input, P::Output>,
        alphabet: &Alphabet<P::Input>,
    ) -> Result<Option<Query<P::Input, P::Output>>, LearnError> {
        for property in self.properties.iter_mut().filter(|p| !p.is_disproved()) {
            if let Some(cex) = property.find_counterexample(hypothesis, alphabet)? {
                return Ok(Some(cex));
            }
        }
        Ok(None)
    }

    fn all_properties_violated(&self) -> bool {
        self.properties.iter().all(BlackBoxProperty::is_disproved)
    }
}

#[cfg(test)]
mod tests {
    use dhc_core::Word;

    use super::*;
    use crate::{
        sul::MealySimulatorSul, testing, DeepSulOmegaOracle, ForbiddenOutputChecker,
        LassoEmptinessOracle, MembershipInclusionOracle, SimulatorOracle,
    };

    type Property = ModelCheckingProperty<
        ForbiddenOutputChecker<char, u8>,
        LassoEmptinessOracle<DeepSulOmegaOracle<MealySimulatorSul<char, u8>>>,
        MembershipInclusionOracle<SimulatorOracle<char, u8>>,
    >;

    fn property(target: &MealyMachine<char, u8>, name: &str, forbidden: u8) -> Property {
        ModelCheckingProperty::new(
            name,
            ForbiddenOutputChecker::new(1).with_property(name, forbidden),
            LassoEmptinessOracle::new(
                DeepSulOmegaOracle::new(MealySimulatorSul::new(target.clone())).unwrap(),
            ),
            MembershipInclusionOracle::new(SimulatorOracle::new(target.clone())),
        )
    }

    #[test_log::test]
    fn real_violation_disproves() {
        let target = testing::toggle();
        let alphabet = target.alphabet().clone();
        let mut oracle = CexFirstOracle::new([
            property(&target, "never two", 2),
            property(&target, "never three", 3),
        ]);
        assert_eq!(oracle.find_counterexample(&target, &alphabet).unwrap(), None);
        assert_eq!(oracle.violated().collect::<Vec<_>>(), vec!["never two"]);
        assert!(!oracle.all_properties_violated());
        assert_eq!(
            oracle.properties()[0].witness().map(Query::input),
            Some(Word::from("aaaa"))
        );
    }

    #[test_log::test]
    fn spurious_violation_is_counterexample() {
        let target = testing::toggle();
        let alphabet = target.alphabet().clone();
        // claims that `a` always produces 2
        let wrong: MealyMachine<char, u8> = MealyMachine::builder()
            .with_transitions([(0, 'a', 2, 0), (0, 'b', 0, 0)])
            .into_mealy(0)
            .unwrap();
        let mut oracle = CexFirstOracle::new([Box::new(property(&target, "never two", 2))]);
        let cex = oracle
            .find_counterexample(&wrong, &alphabet)
            .unwrap()
            .unwrap();
        assert_eq!(cex.input(), Word::from("aa"));
        assert_ne!(wrong.transform(&cex.input()).as_ref(), cex.output());
        assert!(!oracle.all_properties_violated());

        // once the hypothesis is right, the violation is real
        assert_eq!(oracle.find_counterexample(&target, &alphabet).unwrap(), None);
        assert!(oracle.all_properties_violated());
    }
}
