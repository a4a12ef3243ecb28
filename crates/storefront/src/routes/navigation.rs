//! Guard decisions for the browser UI.

use axum::{Json, extract::Query};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, OptionalAuth};
use crate::navigation::{Area, Decision, area_of, resolve};

/// Query for `GET /api/navigation`.
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// Decision for one browser path.
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub path: String,
    pub area: Option<Area>,
    #[serde(flatten)]
    pub decision: Decision,
}

/// GET /api/navigation?path=/seller/products
pub async fn check(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<PathQuery>,
) -> Json<NavigationResponse> {
    let role = user.as_ref().map(CurrentUser::role);
    Json(NavigationResponse {
        area: area_of(&query.path),
        decision: resolve(&query.path, role),
        path: query.path,
    })
}
