use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

pub const DEFAULT_DIET_TYPE: &str = "balanced";
pub const DEFAULT_CALORIE_TARGET: f64 = 2000.0;

/// Week key (`YYYY-MM-DD` of the Monday) -> plan for that week.
pub type MealPlans = BTreeMap<String, WeeklyPlan>;

/// Composite key (`<day_index>_<slot>`) -> planned meal.
pub type WeeklyPlan = BTreeMap<String, MealEntry>;

/// One user's entry in the store, keyed by username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "password")]
    pub password_hash: String, // argon2 PHC string, or plaintext in legacy stores
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "timestamp")]
    pub last_login: OffsetDateTime,
    pub ingredients: Vec<IngredientEntry>,
    pub nutrition_log: Vec<NutritionEntry>,
    pub meal_plans: MealPlans,
    pub diet_preferences: DietPreferences,
    pub id_counters: IdCounters,
}

impl UserRecord {
    pub fn new(password_hash: String, now: OffsetDateTime) -> Self {
        Self {
            password_hash,
            created_at: now,
            last_login: now,
            ingredients: Vec::new(),
            nutrition_log: Vec::new(),
            meal_plans: MealPlans::new(),
            diet_preferences: DietPreferences::default(),
            id_counters: IdCounters::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    Balanced,
    Vegetarian,
    Vegan,
    Keto,
    Paleo,
    Mediterranean,
    LowCarb,
    GlutenFree,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPreferences {
    pub diet_type: DietType,
    pub calorie_target: f64,
    pub allergies: BTreeSet<String>,
}

impl Default for DietPreferences {
    fn default() -> Self {
        Self {
            diet_type: DietType::Balanced,
            calorie_target: DEFAULT_CALORIE_TARGET,
            allergies: BTreeSet::new(),
        }
    }
}

/// Last id handed out per collection. Ids are never reused, even after deletes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub ingredients: u64,
    pub nutrition: u64,
}

impl IdCounters {
    pub fn next_ingredient(&mut self) -> u64 {
        self.ingredients += 1;
        self.ingredients
    }

    pub fn next_nutrition(&mut self) -> u64 {
        self.nutrition += 1;
        self.nutrition
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientEntry {
    pub id: u64,
    #[serde(with = "timestamp")]
    pub added: OffsetDateTime,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEntry {
    pub id: u64,
    #[serde(with = "timestamp")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A planned meal. Only the four nutrients are interpreted; name, image and
/// the like ride along in `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    #[serde(default, deserialize_with = "lenient_number")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fat: f64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl MealEntry {
    pub fn has_negative_nutrient(&self) -> bool {
        [self.calories, self.protein, self.carbs, self.fat]
            .iter()
            .any(|v| *v < 0.0)
    }
}

/// Numbers, numeric strings and null all decode; anything unusable reads as 0.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value).unwrap_or(0.0))
}

fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Back-fills optional fields missing from a stored user record.
///
/// Works on the raw JSON so records written by any earlier version of the
/// service decode into [`UserRecord`]. A `null` counts as missing. Returns
/// `true` when something was added; running it twice changes nothing.
pub fn normalize_record(record: &mut Value) -> bool {
    let Some(fields) = record.as_object_mut() else {
        return false;
    };

    let mut changed = false;
    changed |= fill(fields, "ingredients", || json!([]));
    changed |= fill(fields, "nutrition_log", || json!([]));
    changed |= fill(fields, "meal_plans", || json!({}));

    if !fields.get("diet_preferences").is_some_and(Value::is_object) {
        fields.insert("diet_preferences".to_owned(), json!({}));
        changed = true;
    }
    if let Some(prefs) = fields
        .get_mut("diet_preferences")
        .and_then(Value::as_object_mut)
    {
        changed |= fill(prefs, "diet_type", || json!(DEFAULT_DIET_TYPE));
        changed |= fill(prefs, "calorie_target", || json!(DEFAULT_CALORIE_TARGET));
        changed |= fill(prefs, "allergies", || json!([]));
    }

    if is_missing(fields, "created_at") {
        if let Some(last_login) = fields.get("last_login").filter(|v| !v.is_null()).cloned() {
            fields.insert("created_at".to_owned(), last_login);
            changed = true;
        }
    }
    // Older logouts could clear last_login entirely.
    if is_missing(fields, "last_login") {
        if let Some(created_at) = fields.get("created_at").cloned() {
            fields.insert("last_login".to_owned(), created_at);
            changed = true;
        }
    }

    if let Some(plans) = fields.get_mut("meal_plans").and_then(Value::as_object_mut) {
        changed |= drop_non_objects(plans);
        for plan in plans.values_mut() {
            if let Some(slots) = plan.as_object_mut() {
                changed |= drop_non_objects(slots);
            }
        }
    }

    if is_missing(fields, "id_counters") {
        let counters = json!({
            "ingredients": max_id(fields.get("ingredients")),
            "nutrition": max_id(fields.get("nutrition_log")),
        });
        fields.insert("id_counters".to_owned(), counters);
        changed = true;
    }

    changed
}

fn is_missing(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).map_or(true, Value::is_null)
}

fn fill(fields: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) -> bool {
    if !is_missing(fields, key) {
        return false;
    }
    fields.insert(key.to_owned(), default());
    true
}

/// Removes `null` and other non-object values (cleared weeks or slots).
fn drop_non_objects(map: &mut Map<String, Value>) -> bool {
    let before = map.len();
    map.retain(|_, v| v.is_object());
    before != map.len()
}

fn max_id(entries: Option<&Value>) -> u64 {
    entries
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_u64))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

/// RFC 3339 on write; RFC 3339 or a naive ISO-8601 timestamp (taken as UTC) on read.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{
        format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
        PrimitiveDateTime,
    };

    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time::serde::rfc3339::serialize(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
    }

    pub fn parse(raw: &str) -> Option<OffsetDateTime> {
        if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Some(ts);
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(raw, &naive)
            .ok()
            .map(PrimitiveDateTime::assume_utc)
    }
}
