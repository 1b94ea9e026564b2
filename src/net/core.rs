//! 执行语义：使能判定、原子发射、守卫更新与使能缓存维护。
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::{Incidence, IncidenceBool};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, Marking, NetComponents, Place, Transition, Weight};

/// Guard table: guard name to current boolean value.
pub type GuardMap = FxHashMap<String, bool>;

#[derive(Debug, Error)]
pub enum PetriNetError {
    #[error("transition {0} is out of bounds")]
    InvalidTransition(TransitionId),
    #[error("petri net has not been initialized")]
    NotInitialized,
    #[error("no guard registered under name {0:?}")]
    MissingGuard(String),
    #[error("no place named {0:?} in this net")]
    UnknownPlace(String),
    #[error("no transition named {0:?} in this net")]
    UnknownTransition(String),
    #[error("{node} indices are not dense: position {position} carries index {found}")]
    IndexNotDense {
        node: &'static str,
        position: usize,
        found: u32,
    },
    #[error(
        "{matrix} is {found_places}x{found_transitions}, net has {places} places and {transitions} transitions"
    )]
    Dimension {
        matrix: &'static str,
        places: usize,
        transitions: usize,
        found_places: usize,
        found_transitions: usize,
    },
    #[error("initial marking has {found} entries for {places} places")]
    MarkingLength { places: usize, found: usize },
    #[error("incidence entry at ({place}, {transition}) is not post - pre")]
    InconsistentIncidence {
        place: PlaceId,
        transition: TransitionId,
    },
}

/// Result of a firing attempt. `NotEnabled` is an ordinary outcome, not an
/// error; the caller (typically the monitor) decides whether to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOutcome {
    Success,
    NotEnabled,
}

/// What a guard write did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardWrite {
    /// An existing binding was replaced.
    Updated,
    /// The name was not registered before; a new binding was inserted.
    Inserted,
}

/// Initial value given to each guard declared by a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardSeed {
    /// Every guard starts as `false`, matching the historical behavior the
    /// downstream monitor relies on.
    #[default]
    AllFalse,
    /// Every guard starts at the value its transition requires to enable.
    EnablingValue,
}

/// Strategy for rebuilding the enabled cache after a state change.
///
/// Net variants (timed, stochastic) supply their own implementation; the
/// firing operator itself is shared. Invoked with the net lock held:
/// implementations must stick to the lock-free structural API
/// ([`PetriNet::is_enabled_with`], [`PetriNet::transitions`] and the matrix
/// accessors) and the marking/guards they are handed; locking accessors
/// such as [`PetriNet::current_marking`] would deadlock here.
pub trait EnabledStrategy: Send + Sync {
    fn compute_enabled(
        &self,
        net: &PetriNet,
        marking: &Marking,
        guards: &GuardMap,
    ) -> IndexVec<TransitionId, bool>;
}

/// Default strategy of a plain place/transition net: evaluate every
/// transition against the current marking and guards.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceTransitionStrategy;

impl EnabledStrategy for PlaceTransitionStrategy {
    fn compute_enabled(
        &self,
        net: &PetriNet,
        marking: &Marking,
        guards: &GuardMap,
    ) -> IndexVec<TransitionId, bool> {
        net.transitions()
            .iter()
            .map(|t| net.is_enabled_with(TransitionId::new(t.index), marking, guards))
            .collect::<Vec<_>>()
            .into()
    }
}

/// The mutable execution state, all of it behind one lock.
struct ExecState {
    marking: Marking,
    guards: GuardMap,
    enabled: IndexVec<TransitionId, bool>,
    initialized: bool,
}

/// A generalized place/transition net with inhibitor, reset and reader arcs
/// plus boolean transition guards.
///
/// Structure (descriptors, tables, flags) is immutable after construction;
/// marking, guard table and enabled cache live behind a single per-net
/// mutex, so `fire` and `set_guard` are atomic steps and the net can be
/// shared across threads behind an `Arc`.
pub struct PetriNet {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
    pre: Incidence<Weight>,
    post: Incidence<Weight>,
    inc: Incidence<i64>,
    inhibition: Option<IncidenceBool>,
    reset: Option<IncidenceBool>,
    reader: Option<Incidence<Weight>>,
    initial_marking: Marking,
    automatic: IndexVec<TransitionId, bool>,
    informed: IndexVec<TransitionId, bool>,
    has_inhibition: bool,
    has_reset: bool,
    has_reader: bool,
    strategy: Box<dyn EnabledStrategy>,
    state: Mutex<ExecState>,
}

impl PetriNet {
    /// Builds a net with the default guard seeding and enabled strategy.
    pub fn from_components(components: NetComponents) -> Result<Self, PetriNetError> {
        Self::with_strategy(
            components,
            GuardSeed::default(),
            Box::new(PlaceTransitionStrategy),
        )
    }

    /// Builds a net with an explicit guard seed policy and enabled-cache
    /// strategy. Validates the components; nothing is built on error.
    pub fn with_strategy(
        mut components: NetComponents,
        guard_seed: GuardSeed,
        strategy: Box<dyn EnabledStrategy>,
    ) -> Result<Self, PetriNetError> {
        components.places.sort_by_key(|p| p.index);
        components.transitions.sort_by_key(|t| t.index);
        check_dense("place", components.places.iter().map(|p| p.index))?;
        check_dense("transition", components.transitions.iter().map(|t| t.index))?;

        let places = components.places.len();
        let transitions = components.transitions.len();

        if components.initial_marking.len() != places {
            return Err(PetriNetError::MarkingLength {
                places,
                found: components.initial_marking.len(),
            });
        }

        check_dimensions("pre matrix", &components.pre, places, transitions)?;
        check_dimensions("post matrix", &components.post, places, transitions)?;
        check_dimensions("incidence matrix", &components.inc, places, transitions)?;
        if let Some(inhibition) = &components.inhibition {
            check_dimensions("inhibition matrix", inhibition, places, transitions)?;
        }
        if let Some(reset) = &components.reset {
            check_dimensions("reset matrix", reset, places, transitions)?;
        }
        if let Some(reader) = &components.reader {
            check_dimensions("reader matrix", reader, places, transitions)?;
        }

        let expected_inc = components.post.difference(&components.pre);
        for transition in (0..transitions).map(TransitionId::from_usize) {
            for place in (0..places).map(PlaceId::from_usize) {
                if components.inc.get(place, transition) != expected_inc.get(place, transition) {
                    return Err(PetriNetError::InconsistentIncidence { place, transition });
                }
            }
        }

        let mut guards = GuardMap::default();
        for transition in &components.transitions {
            if let Some(guard) = &transition.guard {
                let seed = match guard_seed {
                    GuardSeed::AllFalse => false,
                    GuardSeed::EnablingValue => guard.enabling_value,
                };
                guards.insert(guard.name.clone(), seed);
            }
        }

        let automatic = components
            .transitions
            .iter()
            .map(|t| t.label.automatic)
            .collect::<Vec<_>>()
            .into();
        let informed = components
            .transitions
            .iter()
            .map(|t| t.label.informed)
            .collect::<Vec<_>>()
            .into();

        let has_inhibition = components
            .inhibition
            .as_ref()
            .is_some_and(|m| m.any(|&set| set));
        let has_reset = components.reset.as_ref().is_some_and(|m| m.any(|&set| set));
        let has_reader = components
            .reader
            .as_ref()
            .is_some_and(|m| m.any(|&weight| weight > 0));

        let initial_marking = Marking::from_tokens(components.initial_marking);

        Ok(Self {
            places: IndexVec::from_vec(components.places),
            transitions: IndexVec::from_vec(components.transitions),
            arcs: components.arcs,
            pre: components.pre,
            post: components.post,
            inc: components.inc,
            inhibition: components.inhibition,
            reset: components.reset,
            reader: components.reader,
            state: Mutex::new(ExecState {
                marking: initial_marking.clone(),
                guards,
                enabled: IndexVec::from_elem(false, transitions),
                initialized: false,
            }),
            initial_marking,
            automatic,
            informed,
            has_inhibition,
            has_reset,
            has_reader,
            strategy,
        })
    }

    /// Computes the enabled cache for the first time and unlocks firing.
    /// Calling it again merely re-derives the cache from current state.
    pub fn initialize(&self) {
        let mut state = self.lock_state();
        let enabled = self
            .strategy
            .compute_enabled(self, &state.marking, &state.guards);
        state.enabled = enabled;
        state.initialized = true;
        debug!(
            "initialized net: {} places, {} transitions, {} enabled",
            self.places.len(),
            self.transitions.len(),
            state.enabled.iter().filter(|e| **e).count()
        );
    }

    /// Fires `transition` if it is enabled, advancing the marking and
    /// refreshing the enabled cache in one atomic step.
    ///
    /// Reset arcs empty their place regardless of the incidence
    /// contribution; all other places move by `inc[p][t]`.
    pub fn fire(&self, transition: TransitionId) -> Result<FireOutcome, PetriNetError> {
        if transition.index() >= self.transitions.len() {
            return Err(PetriNetError::InvalidTransition(transition));
        }
        let mut state = self.lock_state();
        if !state.initialized {
            return Err(PetriNetError::NotInitialized);
        }
        if !self.is_enabled_with(transition, &state.marking, &state.guards) {
            return Ok(FireOutcome::NotEnabled);
        }

        for place in self.places.indices() {
            let tokens = state.marking.tokens_mut(place);
            if self.resets(place, transition) {
                *tokens = 0;
            } else {
                let delta = self.inc.get(place, transition);
                *tokens = apply_delta(*tokens, delta);
            }
        }

        let enabled = self
            .strategy
            .compute_enabled(self, &state.marking, &state.guards);
        state.enabled = enabled;
        debug!("fired {}, marking now {:?}", transition, state.marking);
        Ok(FireOutcome::Success)
    }

    /// Pure enabledness predicate over an explicit marking and guard table.
    ///
    /// Token sufficiency, guard satisfaction, inhibition (source must be
    /// empty), reset precondition (source must be non-empty) and reader
    /// threshold, all conjunctive and short-circuiting. Mutates nothing.
    /// `transition` must be a valid index.
    pub fn is_enabled_with(
        &self,
        transition: TransitionId,
        marking: &Marking,
        guards: &GuardMap,
    ) -> bool {
        for (place, weight) in self.pre.column(transition) {
            if weight > marking.tokens(place) {
                return false;
            }
        }
        if let Some(guard) = &self.transitions[transition].guard {
            match guards.get(&guard.name) {
                Some(value) if *value == guard.enabling_value => {}
                _ => return false,
            }
        }
        if self.has_inhibition {
            if let Some(inhibition) = &self.inhibition {
                for (place, inhibits) in inhibition.column(transition) {
                    if inhibits && marking.tokens(place) > 0 {
                        return false;
                    }
                }
            }
        }
        if self.has_reset {
            if let Some(reset) = &self.reset {
                for (place, resets) in reset.column(transition) {
                    if resets && marking.tokens(place) == 0 {
                        return false;
                    }
                }
            }
        }
        if self.has_reader {
            if let Some(reader) = &self.reader {
                for (place, required) in reader.column(transition) {
                    if required > marking.tokens(place) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Enabledness of one transition under the current state, observed
    /// under the net lock.
    pub fn is_enabled(&self, transition: TransitionId) -> Result<bool, PetriNetError> {
        if transition.index() >= self.transitions.len() {
            return Err(PetriNetError::InvalidTransition(transition));
        }
        let state = self.lock_state();
        Ok(self.is_enabled_with(transition, &state.marking, &state.guards))
    }

    /// Writes a guard and refreshes the enabled cache before returning.
    /// Distinguishes replacing an existing binding from inserting a new one.
    pub fn set_guard(&self, name: &str, value: bool) -> Result<GuardWrite, PetriNetError> {
        let mut state = self.lock_state();
        if !state.initialized {
            return Err(PetriNetError::NotInitialized);
        }
        let previous = state.guards.insert(name.to_owned(), value);
        let enabled = self
            .strategy
            .compute_enabled(self, &state.marking, &state.guards);
        state.enabled = enabled;
        debug!("guard {name:?} set to {value}");
        Ok(match previous {
            Some(_) => GuardWrite::Updated,
            None => GuardWrite::Inserted,
        })
    }

    pub fn read_guard(&self, name: &str) -> Result<bool, PetriNetError> {
        let state = self.lock_state();
        state
            .guards
            .get(name)
            .copied()
            .ok_or_else(|| PetriNetError::MissingGuard(name.to_owned()))
    }

    pub fn guards_amount(&self) -> usize {
        self.lock_state().guards.len()
    }

    /// A fresh copy of the enabled cache.
    pub fn enabled_transitions(&self) -> IndexVec<TransitionId, bool> {
        self.lock_state().enabled.clone()
    }

    pub fn automatic_transitions(&self) -> &IndexVec<TransitionId, bool> {
        &self.automatic
    }

    pub fn informed_transitions(&self) -> &IndexVec<TransitionId, bool> {
        &self.informed
    }

    /// Place snapshots with token counts refreshed from the current
    /// marking, so readers always see marking-consistent places.
    pub fn places(&self) -> Vec<Place> {
        let state = self.lock_state();
        self.places
            .iter_enumerated()
            .map(|(id, place)| Place {
                tokens: state.marking.tokens(id),
                ..place.clone()
            })
            .collect()
    }

    pub fn transitions(&self) -> &[Transition] {
        self.transitions.as_slice()
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Linear search by name; the returned snapshot carries the current
    /// token count.
    pub fn get_place(&self, name: &str) -> Result<Place, PetriNetError> {
        let state = self.lock_state();
        self.places
            .iter_enumerated()
            .find(|(_, place)| place.name == name)
            .map(|(id, place)| Place {
                tokens: state.marking.tokens(id),
                ..place.clone()
            })
            .ok_or_else(|| PetriNetError::UnknownPlace(name.to_owned()))
    }

    /// Linear search by name.
    pub fn get_transition(&self, name: &str) -> Result<Transition, PetriNetError> {
        self.transitions
            .iter()
            .find(|transition| transition.name == name)
            .cloned()
            .ok_or_else(|| PetriNetError::UnknownTransition(name.to_owned()))
    }

    pub fn current_marking(&self) -> Marking {
        self.lock_state().marking.clone()
    }

    /// The marking latched at construction; never modified afterwards.
    pub fn initial_marking(&self) -> &Marking {
        &self.initial_marking
    }

    pub fn pre(&self) -> &Incidence<Weight> {
        &self.pre
    }

    pub fn post(&self) -> &Incidence<Weight> {
        &self.post
    }

    pub fn inc(&self) -> &Incidence<i64> {
        &self.inc
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn has_inhibition_arcs(&self) -> bool {
        self.has_inhibition
    }

    pub fn has_reset_arcs(&self) -> bool {
        self.has_reset
    }

    pub fn has_reader_arcs(&self) -> bool {
        self.has_reader
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().initialized
    }

    fn resets(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.has_reset
            && self
                .reset
                .as_ref()
                .is_some_and(|reset| reset.get(place, transition))
    }

    fn lock_state(&self) -> MutexGuard<'_, ExecState> {
        self.state.lock().expect("petri net state lock poisoned")
    }
}

impl fmt::Debug for PetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PetriNet")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .field("has_inhibition", &self.has_inhibition)
            .field("has_reset", &self.has_reset)
            .field("has_reader", &self.has_reader)
            .finish()
    }
}

fn apply_delta(tokens: Weight, delta: i64) -> Weight {
    if delta >= 0 {
        tokens + delta as Weight
    } else {
        tokens
            .checked_sub(delta.unsigned_abs())
            .expect("enabled transition cannot drive a place negative")
    }
}

fn check_dense(
    node: &'static str,
    indices: impl Iterator<Item = u32>,
) -> Result<(), PetriNetError> {
    for (position, found) in indices.enumerate() {
        if found as usize != position {
            return Err(PetriNetError::IndexNotDense {
                node,
                position,
                found,
            });
        }
    }
    Ok(())
}

fn check_dimensions<T>(
    matrix: &'static str,
    table: &Incidence<T>,
    places: usize,
    transitions: usize,
) -> Result<(), PetriNetError> {
    if table.places() != places || table.transitions() != transitions {
        return Err(PetriNetError::Dimension {
            matrix,
            places,
            transitions,
            found_places: table.places(),
            found_transitions: table.transitions(),
        });
    }
    Ok(())
}
