/*
 * Responsibility
 * - drinks テーブル向け SQLx 操作 (CRUD)
 * - recipe は JSON 文字列として保存し、ここで Ingredient の配列に復元する
 * - title は UNIQUE。重複は RepoError::Conflict として返す
 */
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub color: String,
    pub parts: i64,
}

#[derive(Debug, FromRow)]
struct DrinkRow {
    id: i64,
    title: String,
    recipe: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = RepoError;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            recipe: serde_json::from_str(&row.recipe)?,
        })
    }
}

/// Create the table if it does not exist yet (no migrations).
pub async fn ensure_schema(db: &SqlitePool) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drinks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            recipe TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await?;

    Ok(())
}

/// Drop everything and start over with a single seed drink.
pub async fn reset(db: &SqlitePool) -> Result<Drink, RepoError> {
    sqlx::query("DROP TABLE IF EXISTS drinks").execute(db).await?;
    ensure_schema(db).await?;

    let water = [Ingredient {
        name: "water".to_string(),
        color: "blue".to_string(),
        parts: 1,
    }];
    create(db, "water", &water).await
}

pub async fn list(db: &SqlitePool) -> Result<Vec<Drink>, RepoError> {
    let rows = sqlx::query_as::<_, DrinkRow>(
        r#"
        SELECT id, title, recipe
        FROM drinks
        ORDER BY id
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.into_iter().map(Drink::try_from).collect()
}

#[cfg(test)]
pub async fn get(db: &SqlitePool, id: i64) -> Result<Option<Drink>, RepoError> {
    let row = sqlx::query_as::<_, DrinkRow>(
        r#"
        SELECT id, title, recipe
        FROM drinks
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(Drink::try_from).transpose()
}

pub async fn create(
    db: &SqlitePool,
    title: &str,
    recipe: &[Ingredient],
) -> Result<Drink, RepoError> {
    let recipe = serde_json::to_string(recipe)?;

    let row = sqlx::query_as::<_, DrinkRow>(
        r#"
        INSERT INTO drinks (title, recipe)
        VALUES (?1, ?2)
        RETURNING id, title, recipe
        "#,
    )
    .bind(title)
    .bind(recipe)
    .fetch_one(db)
    .await
    .map_err(RepoError::from_sqlx)?;

    row.try_into()
}

pub async fn update(
    db: &SqlitePool,
    id: i64,
    title: Option<&str>,
    recipe: Option<&[Ingredient]>,
) -> Result<Option<Drink>, RepoError> {
    let recipe = recipe.map(|r| serde_json::to_string(r)).transpose()?;

    let row = sqlx::query_as::<_, DrinkRow>(
        r#"
        UPDATE drinks
        SET
            title = COALESCE(?2, title),
            recipe = COALESCE(?3, recipe)
        WHERE id = ?1
        RETURNING id, title, recipe
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(recipe)
    .fetch_optional(db)
    .await
    .map_err(RepoError::from_sqlx)?;

    row.map(Drink::try_from).transpose()
}

pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool, RepoError> {
    let result = sqlx::query(
        r#"
        DELETE FROM drinks
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}
