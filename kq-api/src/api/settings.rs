//! Runtime settings endpoints

use axum::extract::State;
use kq_common::db::Setting;
use serde::Deserialize;

use super::extract::{Json, Path};
use crate::db::settings;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SettingValue {
    pub value: String,
}

/// GET /api/settings
pub async fn list_settings(State(state): State<AppState>) -> Result<Json<Vec<Setting>>> {
    Ok(Json(settings::list_settings(&state.db).await?))
}

/// PUT /api/settings/:key
///
/// Bus capacity, keep-alive interval and busy timeout apply from the next start.
pub async fn update_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingValue>,
) -> Result<Json<Setting>> {
    Ok(Json(settings::update_known_setting(&state.db, &key, &body.value).await?))
}
