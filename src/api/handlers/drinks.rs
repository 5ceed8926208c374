/*
 * Responsibility
 * - /drinks 系 CRUD handler
 * - 認可 (permission) は route_layer で済んでいる前提。ここには business logic だけを置く
 * - Path/Json の rejection は AppError (JSON envelope) に寄せる
 */
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};

use crate::{
    api::{
        dto::drinks::{
            CreateDrinkRequest, DeleteResponse, DrinkLong, DrinkShort, DrinksResponse,
            UpdateDrinkRequest,
        },
        extractors::VerifiedClaims,
    },
    error::AppError,
    repos::drink_repo,
    state::AppState,
};

fn drink_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    // A non-numeric id can never match a row.
    path.map(|Path(id)| id)
        .map_err(|_| AppError::not_found("drink"))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::Unprocessable(rejection.body_text())
        }
    })
}

pub async fn list_drinks(
    State(state): State<AppState>,
) -> Result<Json<DrinksResponse<DrinkShort>>, AppError> {
    let drinks = drink_repo::list(&state.db).await?;

    Ok(Json(DrinksResponse::new(
        drinks.into_iter().map(DrinkShort::from).collect(),
    )))
}

pub async fn list_drinks_detail(
    State(state): State<AppState>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let drinks = drink_repo::list(&state.db).await?;

    Ok(Json(DrinksResponse::new(
        drinks.into_iter().map(DrinkLong::from).collect(),
    )))
}

pub async fn create_drink(
    State(state): State<AppState>,
    VerifiedClaims(claims): VerifiedClaims,
    payload: Result<Json<CreateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let (title, recipe) = json_body(payload)?
        .into_parts()
        .map_err(|reason| AppError::Unprocessable(reason.to_string()))?;

    let drink = drink_repo::create(&state.db, &title, &recipe).await?;
    tracing::info!(drink_id = drink.id, sub = ?claims.subject(), "drink created");

    Ok(Json(DrinksResponse::new(vec![drink.into()])))
}

pub async fn update_drink(
    State(state): State<AppState>,
    VerifiedClaims(claims): VerifiedClaims,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateDrinkRequest>, JsonRejection>,
) -> Result<Json<DrinksResponse<DrinkLong>>, AppError> {
    let id = drink_id(path)?;
    let (title, recipe) = json_body(payload)?
        .into_parts()
        .map_err(|reason| AppError::Unprocessable(reason.to_string()))?;

    let drink = drink_repo::update(&state.db, id, title.as_deref(), recipe.as_deref())
        .await?
        .ok_or(AppError::not_found("drink"))?;
    tracing::info!(drink_id = drink.id, sub = ?claims.subject(), "drink updated");

    Ok(Json(DrinksResponse::new(vec![drink.into()])))
}

pub async fn delete_drink(
    State(state): State<AppState>,
    VerifiedClaims(claims): VerifiedClaims,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = drink_id(path)?;

    if !drink_repo::delete(&state.db, id).await? {
        return Err(AppError::not_found("drink"));
    }
    tracing::info!(drink_id = id, sub = ?claims.subject(), "drink deleted");

    Ok(Json(DeleteResponse {
        success: true,
        delete: id,
    }))
}
