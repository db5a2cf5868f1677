use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog recipe. Everything except the id and name is kept as loaded and
/// read through the accessors below, so odd catalog entries still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    fn text(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn diet(&self) -> Option<&str> {
        self.text("diet")
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.text("difficulty")
    }

    pub fn meal_type(&self) -> Option<&str> {
        self.text("meal_type")
    }

    /// Preparation time in minutes. Numeric strings are accepted; a missing
    /// or unusable value counts as 0.
    pub fn minutes(&self) -> f64 {
        let minutes = match self.extra.get("time") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        minutes.filter(|m| m.is_finite()).unwrap_or(0.0)
    }

    /// Ingredient names: plain strings, or the `name` of ingredient objects.
    pub fn ingredient_names(&self) -> impl Iterator<Item = &str> {
        self.extra
            .get("ingredients")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => other.get("name").and_then(Value::as_str),
            })
    }
}
