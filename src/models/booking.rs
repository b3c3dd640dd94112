//! Meeting booking models

use super::validate_not_blank;
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Bookings still expected to take place
    pub const UPCOMING: [BookingStatus; 2] = [BookingStatus::Scheduled, BookingStatus::Confirmed];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "meeting_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingType {
    InPerson,
    #[default]
    VideoCall,
    PhoneCall,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendee_email: String,
    pub attendee_name: String,
    pub meeting_type: MeetingType,
    pub status: BookingStatus,
    pub user_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_time_range"))]
pub struct CreateBookingRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(email(message = "Valid attendee email is required"))]
    pub attendee_email: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub attendee_name: String,
    pub meeting_type: Option<MeetingType>,
    pub lead_id: Option<Uuid>,
}

fn validate_time_range(req: &CreateBookingRequest) -> Result<(), ValidationError> {
    if req.end_time > req.start_time {
        return Ok(());
    }
    let mut err = ValidationError::new("time_range");
    err.message = Some("End time must be after start time".into());
    Err(err)
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendee_email: String,
    pub attendee_name: String,
    pub meeting_type: MeetingType,
    pub user_id: Uuid,
    pub lead_id: Option<Uuid>,
}

impl NewBooking {
    pub fn from_request(req: CreateBookingRequest, user_id: Uuid) -> Self {
        Self {
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            attendee_email: req.attendee_email,
            attendee_name: req.attendee_name,
            meeting_type: req.meeting_type.unwrap_or_default(),
            user_id,
            lead_id: req.lead_id,
        }
    }
}

/// Query string of `GET /api/bookings`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Any of these statuses; empty means all
    pub statuses: Vec<BookingStatus>,
    pub user_id: Option<Uuid>,
    pub starts_after: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&booking.status))
            && self.user_id.map_or(true, |u| booking.user_id == u)
            && self.starts_after.map_or(true, |t| booking.start_time >= t)
    }
}

impl From<&BookingQuery> for BookingFilter {
    fn from(query: &BookingQuery) -> Self {
        Self {
            statuses: query.status.into_iter().collect(),
            user_id: query.user_id,
            starts_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_must_follow_start() {
        let req: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "title": "Demo",
            "startTime": "2026-03-02T10:00:00Z",
            "endTime": "2026-03-02T09:30:00Z",
            "attendeeEmail": "buyer@example.com",
            "attendeeName": "Pat Buyer"
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));
    }

    #[test]
    fn test_defaults_to_video_call() {
        let req: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "title": "Demo",
            "startTime": "2026-03-02T10:00:00Z",
            "endTime": "2026-03-02T10:30:00Z",
            "attendeeEmail": "buyer@example.com",
            "attendeeName": "Pat Buyer"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        let booking = NewBooking::from_request(req, Uuid::new_v4());
        assert_eq!(booking.meeting_type, MeetingType::VideoCall);
    }
}
