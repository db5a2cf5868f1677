use serde::Deserialize;

use super::repo::RecipeFilter;

/// Query string of `GET /recipes`. `all` (or nothing) disables a filter.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub diet: Option<String>,
    pub max_time: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
    pub meal_type: Option<String>,
}

fn selected(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "all")
}

impl TryFrom<RecipeQuery> for RecipeFilter {
    type Error = String;

    fn try_from(q: RecipeQuery) -> Result<Self, Self::Error> {
        let max_time = match selected(q.max_time) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| format!("max_time must be a whole number of minutes, got {raw:?}"))?,
            ),
            None => None,
        };
        Ok(Self {
            diet: selected(q.diet),
            max_time,
            difficulty: selected(q.difficulty),
            meal_type: selected(q.meal_type),
            search: q.search.filter(|s| !s.is_empty()),
        })
    }
}
