//! Meeting booking route handlers

use super::extract::{AppQuery, ValidJson};
use super::relations;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::{
    Booking, BookingFilter, BookingItem, BookingQuery, CreateBookingRequest, Listing, NewBooking,
    PageRequest, SuccessResponse,
};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::info;

const DEFAULT_LIMIT: u32 = 20;

/// GET /api/bookings
pub async fn list_bookings(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<BookingQuery>,
) -> ApiResult<Json<SuccessResponse<Listing<BookingItem>>>> {
    let page = PageRequest::from_query(query.page, query.limit, DEFAULT_LIMIT)?;
    let (bookings, total) = state
        .store
        .list_bookings(&BookingFilter::from(&query), page)
        .await?;
    let items = relations::booking_items(state.store.as_ref(), bookings).await?;

    Ok(Json(SuccessResponse::new(Listing::new("bookings", (items, total), page))))
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<SharedState>,
    Extension(caller): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Booking>>)> {
    let booking = state
        .store
        .create_booking(NewBooking::from_request(req, caller.id))
        .await?;
    info!("Booking {} scheduled with {}", booking.id, booking.attendee_email);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Booking created successfully", booking)),
    ))
}
