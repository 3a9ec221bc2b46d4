// The fixed, ordered effect catalog and id parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::fx::{self, FxFn};

/// One of the five catalog entries. Catalog order = declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectId {
    Self_,
    Persona,
    Shadow,
    Anima,
    Trickster,
}

impl EffectId {
    pub const ALL: [EffectId; 5] = [
        EffectId::Self_,
        EffectId::Persona,
        EffectId::Shadow,
        EffectId::Anima,
        EffectId::Trickster,
    ];

    /// Stable string id used by controls and config.
    pub fn as_str(self) -> &'static str {
        match self {
            EffectId::Self_ => "self",
            EffectId::Persona => "persona",
            EffectId::Shadow => "shadow",
            EffectId::Anima => "anima",
            EffectId::Trickster => "trickster",
        }
    }

    /// Position in the catalog.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn definition(self) -> &'static EffectDefinition {
        &CATALOG[self.index()]
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectId {
    type Err = Error;

    /// Unknown ids fail fast; there is no default effect.
    fn from_str(s: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownEffect(s.to_string()))
    }
}

/// A catalog entry: what the controls show, and what runs around compositing.
pub struct EffectDefinition {
    pub id: EffectId,
    pub name: &'static str,
    pub description: &'static str,
    /// Runs after clearing, before the camera frame is composited.
    pub pre_draw: FxFn,
    /// Runs on the composited frame; this is the visible look.
    pub post_overlay: FxFn,
}

pub static CATALOG: [EffectDefinition; 5] = [
    EffectDefinition {
        id: EffectId::Self_,
        name: "Self",
        description: "The whole: your reflection held in a warm, quiet light.",
        pre_draw: fx::reset_blend,
        post_overlay: fx::self_glow,
    },
    EffectDefinition {
        id: EffectId::Persona,
        name: "Persona",
        description: "The mask you show the world, turned inside out.",
        pre_draw: fx::reset_blend,
        post_overlay: fx::persona,
    },
    EffectDefinition {
        id: EffectId::Shadow,
        name: "Shadow",
        description: "What you keep in the dark, flickering at the edges.",
        pre_draw: fx::reset_blend,
        post_overlay: fx::shadow,
    },
    EffectDefinition {
        id: EffectId::Anima,
        name: "Anima",
        description: "The inner outline: only the contours of the soul remain.",
        pre_draw: fx::reset_blend,
        post_overlay: fx::anima,
    },
    EffectDefinition {
        id: EffectId::Trickster,
        name: "Trickster",
        description: "Chaos in red and black: light becomes fire, shade becomes void.",
        pre_draw: fx::reset_blend,
        post_overlay: fx::trickster,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_matches_ids() {
        let ids: Vec<&str> = CATALOG.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["self", "persona", "shadow", "anima", "trickster"]);
        for (i, def) in CATALOG.iter().enumerate() {
            assert_eq!(def.id.index(), i);
            assert_eq!(EffectId::from_index(i), Some(def.id));
        }
    }

    #[test]
    fn parse_round_trips_every_id() {
        for id in EffectId::ALL {
            assert_eq!(id.as_str().parse::<EffectId>().unwrap(), id);
        }
    }

    #[test]
    fn unknown_id_fails_fast() {
        let err = "ego".parse::<EffectId>().unwrap_err();
        assert!(matches!(err, Error::UnknownEffect(ref s) if s == "ego"));
        assert!("Shadow".parse::<EffectId>().is_err());
    }
}
