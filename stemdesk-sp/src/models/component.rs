//! Component labels and the four-slot stem container

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the four separated stems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentLabel {
    Bass,
    Vocal,
    Drum,
    Music,
}

impl ComponentLabel {
    /// Every label, in canonical order
    pub const ALL: [ComponentLabel; 4] = [
        ComponentLabel::Bass,
        ComponentLabel::Vocal,
        ComponentLabel::Drum,
        ComponentLabel::Music,
    ];

    /// Wire name used in artifact file names
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentLabel::Bass => "bass",
            ComponentLabel::Vocal => "vocal",
            ComponentLabel::Drum => "drum",
            ComponentLabel::Music => "music",
        }
    }

    fn slot(self) -> usize {
        match self {
            ComponentLabel::Bass => 0,
            ComponentLabel::Vocal => 1,
            ComponentLabel::Drum => 2,
            ComponentLabel::Music => 3,
        }
    }
}

impl fmt::Display for ComponentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown component label: {0}")]
pub struct UnknownComponent(pub String);

impl FromStr for ComponentLabel {
    type Err = UnknownComponent;

    /// Accepts the wire names plus the plural/"other" spellings separation models emit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bass" => Ok(ComponentLabel::Bass),
            "vocal" | "vocals" => Ok(ComponentLabel::Vocal),
            "drum" | "drums" => Ok(ComponentLabel::Drum),
            "music" | "other" => Ok(ComponentLabel::Music),
            _ => Err(UnknownComponent(s.to_string())),
        }
    }
}

/// A separation result lacked one or more labels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing components: {}", .0.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", "))]
pub struct MissingComponents(pub Vec<ComponentLabel>);

/// Exactly one value per component label
///
/// Used wherever a partial label set must be unrepresentable: a chunk's separation
/// output, per-component accumulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemSet<T> {
    slots: [T; 4],
}

impl<T> StemSet<T> {
    /// Build a set by computing each slot from its label
    pub fn from_fn(mut f: impl FnMut(ComponentLabel) -> T) -> Self {
        Self {
            slots: ComponentLabel::ALL.map(|label| f(label)),
        }
    }

    /// Take a complete set out of a map, or report which labels are absent
    pub fn try_from_map(mut map: HashMap<ComponentLabel, T>) -> Result<Self, MissingComponents> {
        let [bass, vocal, drum, music] = ComponentLabel::ALL.map(|label| map.remove(&label));
        match (bass, vocal, drum, music) {
            (Some(bass), Some(vocal), Some(drum), Some(music)) => Ok(Self {
                slots: [bass, vocal, drum, music],
            }),
            (bass, vocal, drum, music) => {
                let present = [bass.is_some(), vocal.is_some(), drum.is_some(), music.is_some()];
                Err(MissingComponents(
                    ComponentLabel::ALL
                        .into_iter()
                        .zip(present)
                        .filter(|(_, present)| !present)
                        .map(|(label, _)| label)
                        .collect(),
                ))
            }
        }
    }

    pub fn get(&self, label: ComponentLabel) -> &T {
        &self.slots[label.slot()]
    }

    pub fn get_mut(&mut self, label: ComponentLabel) -> &mut T {
        &mut self.slots[label.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentLabel, &T)> {
        ComponentLabel::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn into_pairs(self) -> impl Iterator<Item = (ComponentLabel, T)> {
        ComponentLabel::ALL.into_iter().zip(self.slots)
    }
}

impl<T: Default> Default for StemSet<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_accepts_model_spellings() {
        assert_eq!("vocals".parse::<ComponentLabel>().unwrap(), ComponentLabel::Vocal);
        assert_eq!("Drums".parse::<ComponentLabel>().unwrap(), ComponentLabel::Drum);
        assert_eq!("other".parse::<ComponentLabel>().unwrap(), ComponentLabel::Music);
        assert_eq!(" bass ".parse::<ComponentLabel>().unwrap(), ComponentLabel::Bass);
        assert!("piano".parse::<ComponentLabel>().is_err());
    }

    #[test]
    fn test_label_round_trips_through_wire_name() {
        for label in ComponentLabel::ALL {
            assert_eq!(label.as_str().parse::<ComponentLabel>().unwrap(), label);
            assert_eq!(label.to_string(), label.as_str());
        }
    }

    #[test]
    fn test_stem_set_requires_all_four_labels() {
        let mut map = HashMap::new();
        map.insert(ComponentLabel::Bass, 1);
        map.insert(ComponentLabel::Vocal, 2);
        map.insert(ComponentLabel::Music, 4);

        let err = StemSet::try_from_map(map).unwrap_err();
        assert_eq!(err.0, vec![ComponentLabel::Drum]);
        assert_eq!(err.to_string(), "missing components: drum");
    }

    #[test]
    fn test_stem_set_from_complete_map() {
        let map: HashMap<_, _> = ComponentLabel::ALL
            .into_iter()
            .map(|label| (label, label.as_str().len()))
            .collect();

        let set = StemSet::try_from_map(map).unwrap();
        assert_eq!(*set.get(ComponentLabel::Vocal), 5);
        assert_eq!(
            set.iter().map(|(label, _)| label).collect::<Vec<_>>(),
            ComponentLabel::ALL.to_vec()
        );
    }

    #[test]
    fn test_stem_set_get_mut_touches_one_slot() {
        let mut set: StemSet<Vec<u32>> = StemSet::default();
        set.get_mut(ComponentLabel::Drum).push(7);

        assert_eq!(set.get(ComponentLabel::Drum), &vec![7]);
        assert!(set.get(ComponentLabel::Bass).is_empty());
    }
}
