use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One instruction from the decision process: an action name and its
/// parameter mapping.
///
/// Accepts three shapes on input:
/// - `{name, params}`
/// - flat `{id, name, arguments}`
/// - OpenAI-style `{id, type: "function", function: {name, arguments}}`,
///   where `arguments` may be a JSON-encoded string.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub id: String,
    pub name: String,
    pub params: Value,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            params,
        }
    }
}

impl Serialize for ActionRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("params", &self.params)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ActionRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value.as_object().ok_or_else(|| serde::de::Error::custom("expected object"))?;

        let id = obj.get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let (name, raw_params) = if let Some(func) = obj.get("function").and_then(|v| v.as_object()) {
            (func.get("name"), func.get("arguments"))
        } else {
            (obj.get("name"), obj.get("params").or_else(|| obj.get("arguments")))
        };

        let name = name
            .and_then(|v| v.as_str())
            .ok_or_else(|| serde::de::Error::missing_field("name"))?
            .to_string();

        let params = match raw_params {
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
                warn!(error = %e, raw = %s, "Failed to parse action arguments as JSON, using empty object");
                Value::Object(serde_json::Map::new())
            }),
            Some(Value::Null) | None => Value::Object(serde_json::Map::new()),
            Some(v) => v.clone(),
        };

        Ok(ActionRequest { id, name, params })
    }
}
