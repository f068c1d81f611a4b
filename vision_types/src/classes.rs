use crate::error::VisionError;
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{collections::HashSet, fmt};

pub const CLASSES_NOT_A_LABEL_LIST: &str = "classes parameter not a list of class labels";

/// Ordered, unique class names. The position of a label is the class id the
/// model predicts for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    pub fn new<I, S>(labels: I) -> Result<Self, VisionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(VisionError::EmptyClassLabels);
        }

        let mut seen = HashSet::new();
        for (position, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(VisionError::InvalidClassLabel(position));
            }
            if !seen.insert(label.as_str()) {
                return Err(VisionError::DuplicateClassLabel(label.clone()));
            }
        }

        Ok(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.0.get(class_id).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for ClassLabels {
    type Error = VisionError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl TryFrom<&serde_json::Value> for ClassLabels {
    type Error = VisionError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let items = value
            .as_array()
            .ok_or(VisionError::ClassesNotALabelList)?;
        let labels = items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(VisionError::ClassesNotALabelList)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(labels)
    }
}

struct ClassLabelsVisitor;

impl<'de> Visitor<'de> for ClassLabelsVisitor {
    type Value = ClassLabels;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an ordered list of class labels")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut labels = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(label) = seq.next_element::<String>()? {
            labels.push(label);
        }
        ClassLabels::new(labels).map_err(de::Error::custom)
    }

    fn visit_map<A>(self, _map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        Err(de::Error::custom(CLASSES_NOT_A_LABEL_LIST))
    }
}

impl<'de> Deserialize<'de> for ClassLabels {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ClassLabelsVisitor)
    }
}
