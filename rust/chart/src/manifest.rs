// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tooth manifest: which fragment files make up each tooth.
//!
//! ```json
//! { "teeth": { "11": { "C": ["D11C_V.obj"], "R": ["D11R_Raiz.obj"], "N": [] } } }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use dentchart_scene::ToothId;
use serde::{Deserialize, Serialize};

use crate::classify::{fragment_base, parse_fragment_file_name};
use crate::error::{Error, Result};

/// Authoring position of a tooth, when known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionHint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Fragment lists of one tooth, by section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToothEntry {
    /// Crown faces (further split by the classifier)
    #[serde(rename = "C", default)]
    pub crown: Vec<String>,
    /// Root and canal files
    #[serde(rename = "R", default)]
    pub root: Vec<String>,
    /// Nucleus files
    #[serde(rename = "N", default)]
    pub nucleus: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_hint: Option<PositionHint>,
}

impl ToothEntry {
    /// Every fragment in `C`, `R`, `N` order.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.crown
            .iter()
            .chain(&self.root)
            .chain(&self.nucleus)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.crown.is_empty() && self.root.is_empty() && self.nucleus.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub teeth: BTreeMap<String, ToothEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

impl Manifest {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ManifestUnavailable(e.to_string()))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::ManifestUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Builds a manifest from fragment file names such as `D11C_V.obj`.
    ///
    /// Only permanent teeth and the `C`, `R`, `N` sections are kept; lists
    /// are sorted and deduplicated. Unmatched names are recorded under
    /// `notes.ignored_files`.
    pub fn from_file_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sections: BTreeMap<String, BTreeMap<char, BTreeSet<String>>> = BTreeMap::new();
        let mut ignored = BTreeSet::new();

        for name in names {
            let name = name.as_ref();
            let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
            if !file.to_ascii_lowercase().ends_with(".obj") {
                continue;
            }
            let Some(parsed) = parse_fragment_file_name(file) else {
                ignored.insert(file.to_string());
                continue;
            };
            let Some(tooth) = ToothId::new(parsed.tooth) else {
                ignored.insert(file.to_string());
                continue;
            };
            sections
                .entry(tooth.to_string())
                .or_default()
                .entry(parsed.section)
                .or_default()
                .insert(file.to_string());
        }

        let take = |groups: &BTreeMap<char, BTreeSet<String>>, key: char| -> Vec<String> {
            groups.get(&key).map(|s| s.iter().cloned().collect()).unwrap_or_default()
        };
        let teeth = sections
            .iter()
            .map(|(tooth, groups)| {
                let entry = ToothEntry {
                    crown: take(groups, 'C'),
                    root: take(groups, 'R'),
                    nucleus: take(groups, 'N'),
                    position_hint: None,
                };
                (tooth.clone(), entry)
            })
            .collect();

        Self {
            teeth,
            notes: Some(serde_json::json!({
                "ignored_files": ignored,
                "sections": {
                    "C": "crown faces",
                    "R": "root and canal",
                    "N": "nucleus (internal core)",
                },
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.teeth.is_empty()
    }

    /// Entries with a valid FDI key, in ascending tooth order.
    pub fn valid_teeth(&self) -> Vec<(ToothId, &ToothEntry)> {
        let mut out: Vec<_> = self
            .teeth
            .iter()
            .filter_map(|(key, entry)| ToothId::parse(key).map(|id| (id, entry)))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Keys that are not permanent-dentition FDI ids.
    pub fn invalid_keys(&self) -> Vec<&str> {
        self.teeth
            .keys()
            .filter(|k| ToothId::parse(k).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Every fragment referenced by any tooth, deduplicated, sorted.
    pub fn all_fragments(&self) -> BTreeSet<&str> {
        self.teeth.values().flat_map(ToothEntry::fragments).collect()
    }

    /// True when a fragment with the same base name is listed.
    pub fn contains_fragment(&self, fragment: &str) -> bool {
        let wanted = fragment_base(fragment);
        self.teeth
            .values()
            .flat_map(ToothEntry::fragments)
            .any(|f| fragment_base(f) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_json() {
        let m = Manifest::from_json_str(
            r#"{ "teeth": { "21": { "C": ["D21C_V.obj"], "R": ["D21R_Raiz.obj"] },
                            "11": { "N": ["D11N_NUC.obj"] },
                            "xx": {} } }"#,
        )
        .unwrap();
        let teeth = m.valid_teeth();
        assert_eq!(teeth.len(), 2);
        assert_eq!(teeth[0].0.number(), 11);
        assert_eq!(m.invalid_keys(), vec!["xx"]);
        assert!(m.contains_fragment("models/D21C_V.obj"));
        assert!(m.contains_fragment("D21R_Raiz"));
        assert!(!m.contains_fragment("D22C_V.obj"));
        let order: Vec<_> = m.teeth["21"].fragments().collect();
        assert_eq!(order, vec!["D21C_V.obj", "D21R_Raiz.obj"]);
    }

    #[test]
    fn malformed_manifest_is_unavailable() {
        assert!(matches!(
            Manifest::from_json_str("{ teeth: "),
            Err(Error::ManifestUnavailable(_))
        ));
    }

    #[test]
    fn builds_from_file_names() {
        let m = Manifest::from_file_names([
            "D11C_V.obj",
            "D11C_L.obj",
            "D11C_V.obj",
            "D11R_Raiz.obj",
            "D11N_NUC.obj",
            "D11X_Extra.obj",
            "D51C_V.obj",
            "608_1.obj",
            "readme.txt",
        ]);
        let e = &m.teeth["11"];
        assert_eq!(e.crown, vec!["D11C_L.obj", "D11C_V.obj"]);
        assert_eq!(e.root, vec!["D11R_Raiz.obj"]);
        assert_eq!(e.nucleus, vec!["D11N_NUC.obj"]);
        assert_eq!(m.teeth.len(), 1);
        let ignored = &m.notes.as_ref().unwrap()["ignored_files"];
        assert_eq!(ignored, &serde_json::json!(["608_1.obj", "D51C_V.obj"]));
    }
}
