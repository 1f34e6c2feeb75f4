use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Styling context applied to a visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScenarioKind {
    Traditional,
    Casual,
    Festive,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [Self::Traditional, Self::Casual, Self::Festive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Traditional => "Traditional",
            Self::Casual => "Casual",
            Self::Festive => "Festive",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::Casual => "casual",
            Self::Festive => "festive",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.slug() == normalized)
            .ok_or_else(|| {
                format!("Unknown scenario '{raw}' (expected traditional, casual or festive).")
            })
    }
}

/// Camera framing used for one shot of an expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShotKind {
    Closeup,
    #[serde(rename = "Mid-length")]
    MidLength,
    #[serde(rename = "Extreme Close-up")]
    ExtremeCloseup,
}

impl ShotKind {
    /// Order in which an expansion fetches and reveals its shots.
    pub const EXPANSION_ORDER: [ShotKind; 3] =
        [Self::Closeup, Self::MidLength, Self::ExtremeCloseup];

    pub fn label(self) -> &'static str {
        match self {
            Self::Closeup => "Closeup",
            Self::MidLength => "Mid-length",
            Self::ExtremeCloseup => "Extreme Close-up",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Closeup => "closeup",
            Self::MidLength => "mid-length",
            Self::ExtremeCloseup => "extreme-closeup",
        }
    }
}

impl Default for ShotKind {
    fn default() -> Self {
        Self::MidLength
    }
}

impl fmt::Display for ShotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-scenario slots. Every scenario always has a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMap<T> {
    #[serde(rename = "Traditional")]
    pub traditional: T,
    #[serde(rename = "Casual")]
    pub casual: T,
    #[serde(rename = "Festive")]
    pub festive: T,
}

impl<T> ScenarioMap<T> {
    pub fn from_fn(mut build: impl FnMut(ScenarioKind) -> T) -> Self {
        Self {
            traditional: build(ScenarioKind::Traditional),
            casual: build(ScenarioKind::Casual),
            festive: build(ScenarioKind::Festive),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScenarioKind, &T)> {
        ScenarioKind::ALL
            .into_iter()
            .map(move |scenario| (scenario, &self[scenario]))
    }

    pub fn into_map<U>(self, mut f: impl FnMut(ScenarioKind, T) -> U) -> ScenarioMap<U> {
        ScenarioMap {
            traditional: f(ScenarioKind::Traditional, self.traditional),
            casual: f(ScenarioKind::Casual, self.casual),
            festive: f(ScenarioKind::Festive, self.festive),
        }
    }
}

impl<T> Index<ScenarioKind> for ScenarioMap<T> {
    type Output = T;

    fn index(&self, scenario: ScenarioKind) -> &T {
        match scenario {
            ScenarioKind::Traditional => &self.traditional,
            ScenarioKind::Casual => &self.casual,
            ScenarioKind::Festive => &self.festive,
        }
    }
}

impl<T> IndexMut<ScenarioKind> for ScenarioMap<T> {
    fn index_mut(&mut self, scenario: ScenarioKind) -> &mut T {
        match scenario {
            ScenarioKind::Traditional => &mut self.traditional,
            ScenarioKind::Casual => &mut self.casual,
            ScenarioKind::Festive => &mut self.festive,
        }
    }
}
