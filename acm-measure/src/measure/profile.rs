//! Per-speaker acoustic profile resolution

use acm_common::config::{AcousticProfile, Gender, MeasurementDefaults};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

use super::MeasureError;

/// Speaker attribute lookup: `(participant, attribute) → label`
#[async_trait]
pub trait AttributeStore: Send + Sync {
    async fn attribute(&self, speaker: &str, attribute: &str) -> Result<Option<String>, MeasureError>;
}

/// Parameters chosen for one batch speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerProfile {
    pub gender: Gender,
    pub profile: AcousticProfile,
    /// Every queried attribute, keyed by attribute name (empty when absent)
    pub attributes: BTreeMap<String, String>,
}

/// Selects the acoustic profile for each batch speaker
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    gender_attribute: String,
    male: AcousticProfile,
    female: AcousticProfile,
    fallback: Gender,
    /// Distinct attribute names queried per speaker, gender attribute first
    attributes: Vec<String>,
}

impl ProfileResolver {
    pub fn new(defaults: &MeasurementDefaults, extra_attributes: Vec<String>) -> Self {
        let mut attributes = vec![defaults.gender_attribute.clone()];
        for name in extra_attributes {
            if !attributes.contains(&name) {
                attributes.push(name);
            }
        }
        Self {
            gender_attribute: defaults.gender_attribute.clone(),
            male: defaults.male,
            female: defaults.female,
            fallback: defaults.fallback_gender,
            attributes,
        }
    }

    /// Query every attribute for `speaker` once and pick the profile
    pub async fn resolve(
        &self,
        store: &dyn AttributeStore,
        speaker: &str,
    ) -> Result<SpeakerProfile, MeasureError> {
        let mut values = BTreeMap::new();
        for name in &self.attributes {
            let value = store.attribute(speaker, name).await?.unwrap_or_default();
            values.insert(name.clone(), value);
        }

        let gender = classify_gender(
            values.get(&self.gender_attribute).map(String::as_str),
            self.fallback,
        );
        let profile = match gender {
            Gender::Male => self.male,
            Gender::Female => self.female,
        };
        debug!(speaker, ?gender, "Resolved speaker profile");

        Ok(SpeakerProfile {
            gender,
            profile,
            attributes: values,
        })
    }
}

/// Gender from an attribute label: "m…" is male, "f…" female, else `fallback`
pub fn classify_gender(value: Option<&str>, fallback: Gender) -> Gender {
    let first = value
        .and_then(|v| v.trim().chars().next())
        .map(|c| c.to_ascii_lowercase());
    match first {
        Some('m') => Gender::Male,
        Some('f') => Gender::Female,
        _ => fallback,
    }
}

/// Attribute names a custom script reads as `participant_<name>$` variables
pub fn custom_attribute_names(script: &str) -> Result<Vec<String>, MeasureError> {
    let pattern = Regex::new(r"\b(participant_[A-Za-z0-9_]+)\$")
        .map_err(|e| MeasureError::InvalidOptions(format!("attribute pattern: {}", e)))?;

    let mut names: Vec<String> = Vec::new();
    for captures in pattern.captures_iter(script) {
        let name = captures[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingStore {
        labels: HashMap<(String, String), String>,
        queries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AttributeStore for CountingStore {
        async fn attribute(&self, speaker: &str, attribute: &str) -> Result<Option<String>, MeasureError> {
            self.queries
                .lock()
                .unwrap()
                .push((speaker.to_string(), attribute.to_string()));
            Ok(self
                .labels
                .get(&(speaker.to_string(), attribute.to_string()))
                .cloned())
        }
    }

    #[test]
    fn test_gender_classification() {
        for value in ["Male", "M", "man", "  male", "MALE"] {
            assert_eq!(classify_gender(Some(value), Gender::Female), Gender::Male, "{value}");
        }
        for value in ["female", "F", "", "unknown", "x"] {
            assert_eq!(classify_gender(Some(value), Gender::Female), Gender::Female, "{value}");
        }
        assert_eq!(classify_gender(None, Gender::Female), Gender::Female);
    }

    #[test]
    fn test_fallback_is_configurable() {
        assert_eq!(classify_gender(None, Gender::Male), Gender::Male);
        assert_eq!(classify_gender(Some("?"), Gender::Male), Gender::Male);
        assert_eq!(classify_gender(Some("f"), Gender::Male), Gender::Female);
    }

    #[test]
    fn test_custom_attribute_discovery() {
        let script = "if participant_age$ = \"old\"\n  x = 1\nendif\nappendInfoLine: participant_age$ + participant_dialect_region$";
        assert_eq!(
            custom_attribute_names(script).unwrap(),
            vec!["participant_age", "participant_dialect_region"]
        );
        assert!(custom_attribute_names("appendInfoLine: targetStart")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_resolve_queries_each_attribute_once() {
        let mut store = CountingStore::default();
        store.labels.insert(
            ("S1".to_string(), "participant_gender".to_string()),
            "M".to_string(),
        );
        store.labels.insert(
            ("S1".to_string(), "participant_age".to_string()),
            "42".to_string(),
        );

        let defaults = MeasurementDefaults::default();
        let resolver = ProfileResolver::new(
            &defaults,
            vec![
                "participant_age".to_string(),
                "participant_gender".to_string(),
                "participant_age".to_string(),
            ],
        );
        let profile = resolver.resolve(&store, "S1").await.unwrap();

        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.profile, AcousticProfile::MALE);
        assert_eq!(profile.attributes["participant_age"], "42");
        assert_eq!(store.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_gender_uses_female_profile() {
        let store = CountingStore::default();
        let resolver = ProfileResolver::new(&MeasurementDefaults::default(), Vec::new());
        let profile = resolver.resolve(&store, "S9").await.unwrap();
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.profile, AcousticProfile::FEMALE);
        assert_eq!(profile.attributes["participant_gender"], "");
    }
}
