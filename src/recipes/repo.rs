use std::{io::ErrorKind, path::Path};

use anyhow::Context;
use tracing::info;

use super::repo_types::Recipe;

/// Criteria for narrowing the catalog. `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub diet: Option<String>,
    pub max_time: Option<i64>,
    pub difficulty: Option<String>,
    pub meal_type: Option<String>,
    pub search: Option<String>,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(diet) = &self.diet {
            if recipe.diet().unwrap_or_default() != diet.as_str() {
                return false;
            }
        }
        if let Some(max_time) = self.max_time {
            if recipe.minutes() > max_time as f64 {
                return false;
            }
        }
        if let Some(difficulty) = &self.difficulty {
            if recipe.difficulty().unwrap_or_default() != difficulty.as_str() {
                return false;
            }
        }
        if let Some(meal_type) = &self.meal_type {
            if recipe.meal_type().unwrap_or_default() != meal_type.as_str() {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = recipe.name.to_lowercase().contains(&needle);
            let in_ingredients = recipe
                .ingredient_names()
                .any(|i| i.to_lowercase().contains(&needle));
            if !in_name && !in_ingredients {
                return false;
            }
        }
        true
    }
}

/// Read-only recipe catalog, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    recipes: Vec<Recipe>,
}

impl RecipeCatalog {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    /// Loads the catalog from a JSON array. A missing file is an empty catalog.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "recipe catalog not found; starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read recipes {}", path.display()))
            }
        };
        let recipes: Vec<Recipe> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse recipes {}", path.display()))?;
        Ok(Self::new(recipes))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn find(&self, id: i64) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn filter<'a>(&'a self, filter: &'a RecipeFilter) -> impl Iterator<Item = &'a Recipe> + 'a {
        self.recipes.iter().filter(move |r| filter.matches(r))
    }
}

#[cfg(test)]
pub(crate) fn sample_recipes() -> Vec<Recipe> {
    serde_json::from_value(serde_json::json!([
        {
            "id": 1,
            "name": "Greek Yogurt Parfait",
            "diet": "vegetarian",
            "time": 5,
            "difficulty": "Easy",
            "meal_type": "breakfast",
            "ingredients": ["Greek yogurt", "Granola", "Berries"],
            "nutrition": {"calories": 320, "protein": 18, "carbs": 42, "fat": 9}
        },
        {
            "id": 2,
            "name": "Grilled Chicken Salad",
            "diet": "balanced",
            "time": 25,
            "difficulty": "Medium",
            "meal_type": "lunch",
            "ingredients": ["Chicken breast", "Romaine", "Olive oil"],
            "nutrition": {"calories": 450, "protein": 40, "carbs": 12, "fat": 24}
        },
        {
            "id": 3,
            "name": "Lentil Curry",
            "diet": "vegan",
            "time": 45,
            "difficulty": "Medium",
            "meal_type": "dinner",
            "ingredients": ["Red lentils", "Coconut milk", "Spinach"],
            "nutrition": {"calories": 520, "protein": 22, "carbs": 70, "fat": 16}
        },
        {
            "id": 4,
            "name": "Mystery Snack",
            "ingredients": []
        }
    ]))
    .expect("sample recipes are valid")
}
