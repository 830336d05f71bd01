//! Class-id to label mappings.
//!
//! Two policies ship built in and are intentionally different: the fine
//! ten-class VisDrone set used for dataset work, and the coarse collapsed
//! set the interactive front end shows, where several vehicle subtypes all
//! map to `car`. The collapse is a relabeling policy, not a defect.

use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};

/// One id-to-label pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub id: u32,
    pub label: String,
}

/// An explicit, versioned class-id to label table, ordered by insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    pub version: u32,
    pub classes: Vec<LabelEntry>,
}

impl LabelMap {
    /// Builds a map from `(id, label)` pairs.
    #[must_use]
    pub fn from_pairs(version: u32, pairs: &[(u32, &str)]) -> Self {
        Self {
            version,
            classes: pairs
                .iter()
                .map(|(id, label)| LabelEntry {
                    id: *id,
                    label: (*label).to_string(),
                })
                .collect(),
        }
    }

    /// The fine-grained VisDrone2019-DET class set.
    #[must_use]
    pub fn visdrone() -> Self {
        Self::from_pairs(
            1,
            &[
                (0, "pedestrian"),
                (1, "people"),
                (2, "bicycle"),
                (3, "car"),
                (4, "van"),
                (5, "truck"),
                (6, "tricycle"),
                (7, "awning-tricycle"),
                (8, "bus"),
                (9, "motor"),
            ],
        )
    }

    /// The collapsed front-end set: pedestrians fold into `people`,
    /// vehicle subtypes into `car`, tricycles into `bicycle`.
    #[must_use]
    pub fn coarse() -> Self {
        Self::from_pairs(
            1,
            &[
                (0, "people"),
                (1, "people"),
                (2, "bicycle"),
                (3, "car"),
                (4, "car"),
                (5, "car"),
                (6, "bicycle"),
                (7, "bicycle"),
                (8, "car"),
                (9, "motor"),
            ],
        )
    }

    /// Loads a map from its JSON form, so relabeling policy changes do not
    /// require code edits.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a label map.
    pub fn from_json(json: &str) -> VisionResult<Self> {
        serde_json::from_str(json).map_err(|e| VisionError::LabelConfig(e.to_string()))
    }

    /// Returns the label for a class id; unknown ids fall back to their
    /// numeric string.
    #[must_use]
    pub fn label_for(&self, id: u32) -> String {
        self.classes
            .iter()
            .find(|entry| entry.id == id)
            .map_or_else(|| id.to_string(), |entry| entry.label.clone())
    }

    /// Returns the distinct labels in insertion order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for entry in &self.classes {
            if !seen.contains(&entry.label.as_str()) {
                seen.push(entry.label.as_str());
            }
        }
        seen
    }

    /// Returns every class id whose label is in the requested set.
    #[must_use]
    pub fn ids_for_labels(&self, labels: &[String]) -> Vec<u32> {
        self.classes
            .iter()
            .filter(|entry| labels.iter().any(|l| l == &entry.label))
            .map(|entry| entry.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_collapse_is_exact() {
        let map = LabelMap::coarse();
        let expected = [
            "people", "people", "bicycle", "car", "car", "car", "bicycle", "bicycle", "car",
            "motor",
        ];
        for (id, label) in expected.iter().enumerate() {
            assert_eq!(map.label_for(id as u32), *label);
        }
    }

    #[test]
    fn test_unknown_id_falls_back_to_numeric_string() {
        let map = LabelMap::coarse();
        assert_eq!(map.label_for(42), "42");
    }

    #[test]
    fn test_distinct_labels_preserve_order() {
        assert_eq!(
            LabelMap::coarse().labels(),
            vec!["people", "bicycle", "car", "motor"]
        );
        assert_eq!(LabelMap::visdrone().labels().len(), 10);
    }

    #[test]
    fn test_ids_for_labels_is_many_to_one_aware() {
        let map = LabelMap::coarse();
        let ids = map.ids_for_labels(&["car".to_string()]);
        assert_eq!(ids, vec![3, 4, 5, 8]);
        assert!(map.ids_for_labels(&[]).is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let map = LabelMap::visdrone();
        let json = serde_json::to_string(&map).unwrap();
        let parsed = LabelMap::from_json(&json).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn test_bad_json_is_a_config_error() {
        assert!(LabelMap::from_json("{\"version\": \"x\"}").is_err());
    }
}
