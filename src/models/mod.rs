#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Users ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id:            Uuid,
    pub username:      String,
    pub email:         Option<String>,
    pub password_hash: String,
    pub role:          UserRole,
    pub is_active:     bool,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
    pub deleted_at:    Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Staff,
    Customer,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Customer => "customer",
        };
        write!(f, "{s}")
    }
}

// ── Sessions ─────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSession {
    pub id:         Uuid,
    pub user_id:    Uuid,
    pub token:      String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

// ── Time slots ───────────────────────────────────────────────

/// The fixed set of bookable business-hour slots, one per hour.
///
/// Variant order is the business-day order and is what every slot sort
/// uses — `"01:00 PM"` sorts after `"11:00 AM"` even though it compares
/// lower lexically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "VARCHAR")]
pub enum TimeSlot {
    #[sqlx(rename = "09:00 AM")]
    #[serde(rename = "09:00 AM")]
    NineAm,
    #[sqlx(rename = "10:00 AM")]
    #[serde(rename = "10:00 AM")]
    TenAm,
    #[sqlx(rename = "11:00 AM")]
    #[serde(rename = "11:00 AM")]
    ElevenAm,
    #[sqlx(rename = "12:00 PM")]
    #[serde(rename = "12:00 PM")]
    Noon,
    #[sqlx(rename = "01:00 PM")]
    #[serde(rename = "01:00 PM")]
    OnePm,
    #[sqlx(rename = "02:00 PM")]
    #[serde(rename = "02:00 PM")]
    TwoPm,
    #[sqlx(rename = "03:00 PM")]
    #[serde(rename = "03:00 PM")]
    ThreePm,
    #[sqlx(rename = "04:00 PM")]
    #[serde(rename = "04:00 PM")]
    FourPm,
    #[sqlx(rename = "05:00 PM")]
    #[serde(rename = "05:00 PM")]
    FivePm,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 9] = [
        TimeSlot::NineAm,
        TimeSlot::TenAm,
        TimeSlot::ElevenAm,
        TimeSlot::Noon,
        TimeSlot::OnePm,
        TimeSlot::TwoPm,
        TimeSlot::ThreePm,
        TimeSlot::FourPm,
        TimeSlot::FivePm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeSlot::NineAm   => "09:00 AM",
            TimeSlot::TenAm    => "10:00 AM",
            TimeSlot::ElevenAm => "11:00 AM",
            TimeSlot::Noon     => "12:00 PM",
            TimeSlot::OnePm    => "01:00 PM",
            TimeSlot::TwoPm    => "02:00 PM",
            TimeSlot::ThreePm  => "03:00 PM",
            TimeSlot::FourPm   => "04:00 PM",
            TimeSlot::FivePm   => "05:00 PM",
        }
    }

    pub fn parse(s: &str) -> Option<TimeSlot> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == s.trim())
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Appointments ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id:               Uuid,
    pub customer_id:      Uuid,
    pub combo_id:         Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub time_slot:        TimeSlot,
    pub status:           AppointmentStatus,
    pub notes:            Option<String>,
    pub slot_key:         Option<String>,
    pub created_at:       NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    /// Only pending and confirmed appointments occupy their (date, slot)
    /// pair; every other status releases it for reuse.
    pub fn holds_slot(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn parse(s: &str) -> Option<AppointmentStatus> {
        match s.trim() {
            "pending"     => Some(AppointmentStatus::Pending),
            "confirmed"   => Some(AppointmentStatus::Confirmed),
            "completed"   => Some(AppointmentStatus::Completed),
            "cancelled"   => Some(AppointmentStatus::Cancelled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            _             => None,
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Pending     => "pending",
            AppointmentStatus::Confirmed   => "confirmed",
            AppointmentStatus::Completed   => "completed",
            AppointmentStatus::Cancelled   => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        };
        write!(f, "{s}")
    }
}

// ── Staff ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Staff {
    pub id:            Uuid,
    pub name:          String,
    pub phone:         String,
    pub national_id:   String,
    pub date_of_birth: NaiveDate,
    pub gender:        Gender,
    pub address:       String,
    pub joined_on:     NaiveDate,
    pub salary:        f64,
    pub role:          StaffRole,
    pub is_active:     bool,
    pub created_at:    NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn parse(s: &str) -> Option<Gender> {
        match s.trim() {
            "male"   => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other"  => Some(Gender::Other),
            _        => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Manager,
    Stylist,
    Therapist,
    Receptionist,
}

impl StaffRole {
    pub fn parse(s: &str) -> Option<StaffRole> {
        match s.trim() {
            "manager"      => Some(StaffRole::Manager),
            "stylist"      => Some(StaffRole::Stylist),
            "therapist"    => Some(StaffRole::Therapist),
            "receptionist" => Some(StaffRole::Receptionist),
            _              => None,
        }
    }
}

// ── Attendance ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id:         Uuid,
    pub staff_id:   Uuid,
    pub work_date:  NaiveDate,
    pub check_in:   Option<NaiveDateTime>,
    pub check_out:  Option<NaiveDateTime>,
    pub status:     AttendanceStatus,
    pub is_holiday: bool,
    pub notes:      Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    Holiday,
}

impl AttendanceStatus {
    /// Statuses a check-in may carry. `holiday` is only ever set by a
    /// holiday declaration, never by a check-in.
    pub fn parse_recordable(s: &str) -> Option<AttendanceStatus> {
        match s.trim() {
            "present"  => Some(AttendanceStatus::Present),
            "absent"   => Some(AttendanceStatus::Absent),
            "late"     => Some(AttendanceStatus::Late),
            "half_day" => Some(AttendanceStatus::HalfDay),
            _          => None,
        }
    }
}

// ── Catalog ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id:               Uuid,
    pub name:             String,
    pub duration_minutes: i32,
    pub price:            f64,
    pub is_active:        bool,
    pub created_at:       NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Combo {
    pub id:               Uuid,
    pub name:             String,
    pub discount_percent: f64,
    pub total_duration:   i32,
    pub total_price:      f64,
    pub is_active:        bool,
    pub created_at:       NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ComboService {
    pub combo_id:   Uuid,
    pub service_id: Uuid,
    pub position:   i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_order_is_business_day_order_not_lexical() {
        // "01:00 PM" < "09:00 AM" as strings, but the afternoon slot
        // must sort after the morning one.
        assert!("01:00 PM" < "09:00 AM");
        assert!(TimeSlot::OnePm > TimeSlot::NineAm);

        let mut shuffled = vec![
            TimeSlot::TwoPm,
            TimeSlot::NineAm,
            TimeSlot::Noon,
            TimeSlot::FivePm,
            TimeSlot::TenAm,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                TimeSlot::NineAm,
                TimeSlot::TenAm,
                TimeSlot::Noon,
                TimeSlot::TwoPm,
                TimeSlot::FivePm,
            ]
        );
    }

    #[test]
    fn slot_parse_round_trips_every_slot() {
        for slot in TimeSlot::ALL {
            assert_eq!(TimeSlot::parse(slot.as_str()), Some(slot));
        }
        assert_eq!(TimeSlot::parse("08:00 AM"), None);
        assert_eq!(TimeSlot::parse("9:00 AM"), None);
    }

    #[test]
    fn only_pending_and_confirmed_hold_a_slot() {
        assert!(AppointmentStatus::Pending.holds_slot());
        assert!(AppointmentStatus::Confirmed.holds_slot());
        assert!(!AppointmentStatus::Completed.holds_slot());
        assert!(!AppointmentStatus::Cancelled.holds_slot());
        assert!(!AppointmentStatus::Rescheduled.holds_slot());
    }

    #[test]
    fn holiday_is_not_a_recordable_checkin_status() {
        assert_eq!(AttendanceStatus::parse_recordable("holiday"), None);
        assert_eq!(
            AttendanceStatus::parse_recordable("half_day"),
            Some(AttendanceStatus::HalfDay)
        );
    }
}
