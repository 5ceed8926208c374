/*
 * Responsibility
 * - Drinks の request/response DTO
 * - short (一覧用: color/parts のみ) と long (詳細: name も含む) の 2 表現
 * - validation (形式チェック) 用の validate()
 */
use serde::{Deserialize, Serialize};

use crate::repos::drink_repo::{Drink, Ingredient};

/// A recipe may be posted as a single ingredient or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl RecipeInput {
    pub fn into_vec(self) -> Vec<Ingredient> {
        match self {
            Self::Many(v) => v,
            Self::One(i) => vec![i],
        }
    }
}

fn validate_recipe(recipe: &[Ingredient]) -> Result<(), &'static str> {
    if recipe.is_empty() {
        return Err("recipe needs at least one ingredient");
    }
    for i in recipe {
        if i.name.trim().is_empty() {
            return Err("ingredient name is required");
        }
        if i.color.trim().is_empty() {
            return Err("ingredient color is required");
        }
        if i.parts <= 0 {
            return Err("ingredient parts must be positive");
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateDrinkRequest {
    pub title: String,
    pub recipe: RecipeInput,
}

impl CreateDrinkRequest {
    /// Validate and normalize into `(title, recipe)`.
    pub fn into_parts(self) -> Result<(String, Vec<Ingredient>), &'static str> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("title is required");
        }
        let recipe = self.recipe.into_vec();
        validate_recipe(&recipe)?;

        Ok((title, recipe))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateDrinkRequest {
    pub title: Option<String>,
    pub recipe: Option<RecipeInput>,
}

impl UpdateDrinkRequest {
    pub fn into_parts(self) -> Result<(Option<String>, Option<Vec<Ingredient>>), &'static str> {
        if self.title.is_none() && self.recipe.is_none() {
            return Err("nothing to update");
        }

        let title = match self.title {
            Some(t) if t.trim().is_empty() => return Err("title cannot be empty"),
            Some(t) => Some(t.trim().to_string()),
            None => None,
        };

        let recipe = self.recipe.map(RecipeInput::into_vec);
        if let Some(r) = &recipe {
            validate_recipe(r)?;
        }

        Ok((title, recipe))
    }
}

#[derive(Debug, Serialize)]
pub struct ShortIngredient {
    pub color: String,
    pub parts: i64,
}

/// `drink.short()`: recipe without ingredient names.
#[derive(Debug, Serialize)]
pub struct DrinkShort {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<ShortIngredient>,
}

impl From<Drink> for DrinkShort {
    fn from(d: Drink) -> Self {
        Self {
            id: d.id,
            title: d.title,
            recipe: d
                .recipe
                .into_iter()
                .map(|i| ShortIngredient {
                    color: i.color,
                    parts: i.parts,
                })
                .collect(),
        }
    }
}

/// `drink.long()`: full recipe.
#[derive(Debug, Serialize)]
pub struct DrinkLong {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl From<Drink> for DrinkLong {
    fn from(d: Drink) -> Self {
        Self {
            id: d.id,
            title: d.title,
            recipe: d.recipe,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

impl<T> DrinksResponse<T> {
    pub fn new(drinks: Vec<T>) -> Self {
        Self {
            success: true,
            drinks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i64,
}
