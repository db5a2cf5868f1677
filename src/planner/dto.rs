use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct SaveMealPlanRequest {
    #[serde(rename = "weekKey", alias = "week_key", default)]
    pub week_key: Option<String>,
    /// Raw slots, decoded into meals by the handler.
    #[serde(default)]
    pub plan: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct SavedMealPlanResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "weekKey")]
    pub week_key: String,
}
