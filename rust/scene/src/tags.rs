// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Domain tags carried by scene nodes: anatomical component type and FDI
//! tooth facts (arch side, anterior/posterior class).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Anatomical component a mesh belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    /// Crown faces
    Tooth,
    Root,
    Canal,
    Nucleus,
    Implant,
}

impl ComponentType {
    pub const ALL: [ComponentType; 5] = [
        ComponentType::Tooth,
        ComponentType::Root,
        ComponentType::Canal,
        ComponentType::Nucleus,
        ComponentType::Implant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Tooth => "tooth",
            ComponentType::Root => "root",
            ComponentType::Canal => "canal",
            ComponentType::Nucleus => "nucleus",
            ComponentType::Implant => "implant",
        }
    }

    /// Name of the per-tooth subgroup holding this component.
    pub fn subgroup_name(self) -> &'static str {
        match self {
            ComponentType::Tooth => "Faces",
            ComponentType::Root => "Root",
            ComponentType::Canal => "Canal",
            ComponentType::Nucleus => "Nucleus",
            ComponentType::Implant => "Implant",
        }
    }

    /// Accepts the English labels plus the Portuguese ones found in older
    /// layout files (`dente`, `raiz`, `nucleo`, `implante`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "tooth" | "dente" | "crown" | "faces" => Some(ComponentType::Tooth),
            "root" | "raiz" | "raíz" => Some(ComponentType::Root),
            "canal" => Some(ComponentType::Canal),
            "nucleus" | "nucleo" | "núcleo" => Some(ComponentType::Nucleus),
            "implant" | "implante" => Some(ComponentType::Implant),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown component type '{}'", s))
    }
}

/// Upper (maxillary) or lower (mandibular) arch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchSide {
    Upper,
    Lower,
}

/// Tooth class used to pick the occlusal rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothClass {
    UpperPosterior,
    UpperAnterior,
    LowerPosterior,
    LowerAnterior,
    Unknown,
}

impl ToothClass {
    /// Class of a raw two-digit number; anything outside the permanent
    /// dentition is `Unknown`.
    pub fn from_number(n: u8) -> Self {
        ToothId::new(n).map(ToothId::class).unwrap_or(ToothClass::Unknown)
    }
}

/// Permanent-dentition FDI tooth number (quadrant 1-4, position 1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToothId(u8);

impl ToothId {
    pub fn new(n: u8) -> Option<Self> {
        let quadrant = n / 10;
        let position = n % 10;
        ((1..=4).contains(&quadrant) && (1..=8).contains(&position)).then_some(Self(n))
    }

    /// Parse a two-digit string such as `"11"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u8>().ok().and_then(Self::new)
    }

    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn quadrant(self) -> u8 {
        self.0 / 10
    }

    #[inline]
    pub fn position(self) -> u8 {
        self.0 % 10
    }

    pub fn arch(self) -> ArchSide {
        if self.quadrant() <= 2 {
            ArchSide::Upper
        } else {
            ArchSide::Lower
        }
    }

    pub fn is_upper(self) -> bool {
        self.arch() == ArchSide::Upper
    }

    /// Positions 4-8 are posterior, 1-3 anterior.
    pub fn is_posterior(self) -> bool {
        self.position() >= 4
    }

    pub fn class(self) -> ToothClass {
        match (self.arch(), self.is_posterior()) {
            (ArchSide::Upper, true) => ToothClass::UpperPosterior,
            (ArchSide::Upper, false) => ToothClass::UpperAnterior,
            (ArchSide::Lower, true) => ToothClass::LowerPosterior,
            (ArchSide::Lower, false) => ToothClass::LowerAnterior,
        }
    }
}

impl fmt::Display for ToothId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for ToothId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid FDI tooth id '{}'", value))
    }
}

impl From<ToothId> for String {
    fn from(id: ToothId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fdi_ranges() {
        assert!(ToothId::new(11).is_some());
        assert!(ToothId::new(48).is_some());
        assert!(ToothId::new(19).is_none());
        assert!(ToothId::new(51).is_none());
        assert!(ToothId::new(10).is_none());
        assert!(ToothId::parse("7").is_none());
        assert!(ToothId::parse("1a").is_none());
    }

    #[test]
    fn classes_follow_quadrant_and_position() {
        let class = |n| ToothId::new(n).unwrap().class();
        assert_eq!(class(16), ToothClass::UpperPosterior);
        assert_eq!(class(23), ToothClass::UpperAnterior);
        assert_eq!(class(34), ToothClass::LowerPosterior);
        assert_eq!(class(41), ToothClass::LowerAnterior);
        assert_eq!(ToothClass::from_number(0), ToothClass::Unknown);
    }

    #[test]
    fn legacy_labels_map_to_types() {
        assert_eq!(ComponentType::from_label("Raiz"), Some(ComponentType::Root));
        assert_eq!(ComponentType::from_label("nucleo"), Some(ComponentType::Nucleus));
        assert_eq!(ComponentType::from_label("implante"), Some(ComponentType::Implant));
        assert_eq!(ComponentType::from_label("bogus"), None);
    }

    #[test]
    fn tooth_id_serializes_as_string() {
        let id = ToothId::new(21).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"21\"");
        let back: ToothId = serde_json::from_str("\"21\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ToothId>("\"99\"").is_err());
    }
}
