//! P/T 网静态结构元素：库所、迁移、弧、守卫与标识向量。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::{Incidence, IncidenceBool};
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

/// A place descriptor. `tokens` is the token count at snapshot time; during
/// execution the engine's marking vector is authoritative and accessors
/// refresh this field before handing a place out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub index: u32,
    pub tokens: Weight,
}

impl Place {
    pub fn new(name: impl Into<String>, index: u32, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            index,
            tokens,
        }
    }
}

/// The two scheduling attributes a transition carries for the monitor
/// layer: automatic transitions are fired without an explicit request,
/// informed transitions report their firings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub automatic: bool,
    pub informed: bool,
}

impl Label {
    pub const fn new(automatic: bool, informed: bool) -> Self {
        Self {
            automatic,
            informed,
        }
    }
}

/// A named boolean that must hold a specific value for the owning
/// transition to be enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    pub name: String,
    pub enabling_value: bool,
}

impl Guard {
    pub fn new(name: impl Into<String>, enabling_value: bool) -> Self {
        Self {
            name: name.into(),
            enabling_value,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    pub index: u32,
    pub label: Label,
    pub guard: Option<Guard>,
}

impl Transition {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            label: Label::default(),
            guard: None,
        }
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self
    }

    pub fn with_guard(mut self, name: impl Into<String>, enabling_value: bool) -> Self {
        self.guard = Some(Guard::new(name, enabling_value));
        self
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcKind {
    Normal,
    Inhibitor,
    Reset,
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

/// An arc descriptor. Retained for introspection only; firing consults the
/// derived tables, never this list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub kind: ArcKind,
    pub direction: ArcDirection,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
        kind: ArcKind,
        direction: ArcDirection,
    ) -> Self {
        Self {
            place,
            transition,
            weight,
            kind,
            direction,
        }
    }
}

/// Token counts across all places. Entries are nonnegative by construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking(IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Weight>) -> Self {
        Self(tokens)
    }

    pub fn from_tokens(tokens: Vec<Weight>) -> Self {
        Self(IndexVec::from_vec(tokens))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Weight)> + '_ {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn total(&self) -> Weight {
        self.0.iter().sum()
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, &tokens);
        }
        map.finish()
    }
}

/// Everything the factory collaborator hands over to build a net.
///
/// `inhibition`, `reset` and `reader` are `None` when the net has no arcs
/// of that kind; an all-zero table is never used to encode absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetComponents {
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    pub arcs: Vec<Arc>,
    pub initial_marking: Vec<Weight>,
    pub pre: Incidence<Weight>,
    pub post: Incidence<Weight>,
    pub inc: Incidence<i64>,
    pub inhibition: Option<IncidenceBool>,
    pub reset: Option<IncidenceBool>,
    pub reader: Option<Incidence<Weight>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_builder_attaches_label_and_guard() {
        let t = Transition::new("acquire", 0)
            .with_label(Label::new(true, false))
            .with_guard("door_open", true);
        assert!(t.label.automatic);
        assert!(!t.label.informed);
        assert_eq!(t.guard, Some(Guard::new("door_open", true)));
    }

    #[test]
    fn marking_mutation_goes_through_tokens_mut() {
        let mut marking = Marking::from_tokens(vec![2, 0]);
        *marking.tokens_mut(PlaceId::new(0)) -= 1;
        *marking.tokens_mut(PlaceId::new(1)) += 1;
        assert_eq!(marking.tokens(PlaceId::new(0)), 1);
        assert_eq!(marking.tokens(PlaceId::new(1)), 1);
        assert_eq!(marking.total(), 2);
    }
}
