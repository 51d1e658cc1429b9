use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured record recovered from raw generation output.
///
/// All lists default to empty; sanitization and deduplication happen at
/// formatting time, so these fields carry the values as generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub medical_terms: Vec<TermDefinition>,
    #[serde(default)]
    pub questions_for_provider: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub administration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermDefinition {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
}

impl StructuredSummary {
    /// Lenient conversion from an arbitrary JSON object.
    ///
    /// Generation output rarely matches the schema exactly: scalars appear
    /// where lists are expected, entries miss fields or have the wrong
    /// shape. A scalar becomes a one-element list, non-object entries in
    /// object lists are skipped, and scalar field values are stringified.
    /// Returns `None` only when `value` is not an object at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            key_takeaways: string_list(map.get("key_takeaways")),
            medications: object_list(map.get("medications"), Medication::from_value),
            medical_terms: object_list(map.get("medical_terms"), TermDefinition::from_value),
            questions_for_provider: string_list(map.get("questions_for_provider")),
        })
    }
}

impl Medication {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            name: field_string(map.get("name")),
            dosage: field_string(map.get("dosage")),
            administration: field_string(map.get("administration")),
            description: field_string(map.get("description")),
        })
    }
}

impl TermDefinition {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            term: field_string(map.get("term")),
            definition: field_string(map.get("definition")),
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };
    items.into_iter().filter_map(scalar_to_string).collect()
}

fn object_list<T, F>(value: Option<&Value>, convert: F) -> Vec<T>
where
    F: Fn(&Value) -> Option<T>,
{
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|item| convert(item)).collect(),
        Some(object @ Value::Object(_)) => convert(object).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn field_string(value: Option<&Value>) -> Option<String> {
    let text = value.and_then(scalar_to_string)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
