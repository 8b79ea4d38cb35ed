// HTTP handler for coupon validation at checkout

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use crate::coupons::error::CouponError;
use crate::coupons::models::{CouponResolution, ValidateCouponRequest};
use crate::money::floor_units;

/// Handler for POST /api/coupons/{code}/validate
/// Computes the discount a code would grant on the given total, or the
/// rejection reason. Rejections are 200 responses with success=false so the
/// storefront can show them inline.
pub async fn validate_coupon_handler(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<serde_json::Value>, CouponError> {
    let subtotal = floor_units(request.total);
    let resolution = state.coupon_resolver.resolve(&code, subtotal).await?;

    let body = match resolution {
        CouponResolution::Applied { coupon, discount } => json!({
            "success": true,
            "data": {
                "id": coupon.id,
                "code": coupon.code,
                "type": coupon.coupon_type,
                "discount": discount,
                "finalTotal": subtotal - discount,
            }
        }),
        CouponResolution::Rejected(rejection) => json!({
            "success": false,
            "error": rejection.message(),
            "data": null,
        }),
    };

    Ok(Json(body))
}
