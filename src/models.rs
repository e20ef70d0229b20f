use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub type SessionId = i64;
pub type ClientId = i64;
pub type EmployeeId = i64;

/// Day of the weekly schedule. Wire format is the studio's two-letter code.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
pub enum DayOfWeek {
    #[serde(rename = "Пн", alias = "mon")]
    Monday,
    #[serde(rename = "Вт", alias = "tue")]
    Tuesday,
    #[serde(rename = "Ср", alias = "wed")]
    Wednesday,
    #[serde(rename = "Чт", alias = "thu")]
    Thursday,
    #[serde(rename = "Пт", alias = "fri")]
    Friday,
    #[serde(rename = "Сб", alias = "sat")]
    Saturday,
    #[serde(rename = "Вс", alias = "sun")]
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// 1 for Monday through 7 for Sunday; this is the stored column value.
    pub fn number(self) -> i64 {
        self.days_from_monday() as i64 + 1
    }

    pub fn from_number(n: i64) -> Option<Self> {
        usize::try_from(n - 1).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn days_from_monday(self) -> u32 {
        match self {
            DayOfWeek::Monday => 0,
            DayOfWeek::Tuesday => 1,
            DayOfWeek::Wednesday => 2,
            DayOfWeek::Thursday => 3,
            DayOfWeek::Friday => 4,
            DayOfWeek::Saturday => 5,
            DayOfWeek::Sunday => 6,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Пн",
            DayOfWeek::Tuesday => "Вт",
            DayOfWeek::Wednesday => "Ср",
            DayOfWeek::Thursday => "Чт",
            DayOfWeek::Friday => "Пт",
            DayOfWeek::Saturday => "Сб",
            DayOfWeek::Sunday => "Вс",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let day = match s.to_lowercase().as_str() {
            "пн" | "mon" | "monday" => DayOfWeek::Monday,
            "вт" | "tue" | "tuesday" => DayOfWeek::Tuesday,
            "ср" | "wed" | "wednesday" => DayOfWeek::Wednesday,
            "чт" | "thu" | "thursday" => DayOfWeek::Thursday,
            "пт" | "fri" | "friday" => DayOfWeek::Friday,
            "сб" | "sat" | "saturday" => DayOfWeek::Saturday,
            "вс" | "sun" | "sunday" => DayOfWeek::Sunday,
            _ => return Err(format!("unknown day of week: {s}")),
        };
        Ok(day)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum Specialization {
    #[serde(rename = "Хатха-йога", alias = "hatha")]
    Hatha,
    #[serde(rename = "Кундалини йога", alias = "kundalini")]
    Kundalini,
    #[serde(rename = "йога для детей", alias = "kids")]
    Kids,
    #[serde(rename = "йога для пожилых людей", alias = "seniors")]
    Seniors,
}

impl Specialization {
    pub fn label(self) -> &'static str {
        match self {
            Specialization::Hatha => "Хатха-йога",
            Specialization::Kundalini => "Кундалини йога",
            Specialization::Kids => "йога для детей",
            Specialization::Seniors => "йога для пожилых людей",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            Specialization::Hatha,
            Specialization::Kundalini,
            Specialization::Kids,
            Specialization::Seniors,
        ]
        .into_iter()
        .find(|s| s.label() == label)
    }
}

/// Class length. Only the two slot lengths the studio offers exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub enum ClassDuration {
    Hour,
    HourAndHalf,
}

impl ClassDuration {
    pub fn minutes(self) -> u32 {
        match self {
            ClassDuration::Hour => 60,
            ClassDuration::HourAndHalf => 90,
        }
    }
}

impl TryFrom<u32> for ClassDuration {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            60 => Ok(ClassDuration::Hour),
            90 => Ok(ClassDuration::HourAndHalf),
            other => Err(format!("duration must be 60 or 90 minutes, got {other}")),
        }
    }
}

impl From<ClassDuration> for u32 {
    fn from(value: ClassDuration) -> Self {
        value.minutes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ClassSession {
    pub id: SessionId,
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "18:30:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = u32, example = 60)]
    pub duration: ClassDuration,
    pub specialization: Specialization,
    pub instructor_name: String,
    pub total_capacity: u32,
    pub free_spots: u32,
}

/// Raw `schedule` row; converted into [`ClassSession`] after reading.
#[derive(Debug, FromRow)]
pub(crate) struct SessionRow {
    pub id: i64,
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub duration: i64,
    pub specialization: String,
    pub instructor_name: String,
    pub total_capacity: i64,
    pub free_spots: i64,
}

impl TryFrom<SessionRow> for ClassSession {
    type Error = String;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let day_of_week = DayOfWeek::from_number(row.day_of_week)
            .ok_or_else(|| format!("session {}: bad day_of_week {}", row.id, row.day_of_week))?;
        let duration = u32::try_from(row.duration)
            .map_err(|e| e.to_string())
            .and_then(ClassDuration::try_from)?;
        let specialization = Specialization::from_label(&row.specialization).ok_or_else(|| {
            format!("session {}: bad specialization {}", row.id, row.specialization)
        })?;
        Ok(ClassSession {
            id: row.id,
            day_of_week,
            start_time: row.start_time,
            duration,
            specialization,
            instructor_name: row.instructor_name,
            total_capacity: u32::try_from(row.total_capacity).map_err(|e| e.to_string())?,
            free_spots: u32::try_from(row.free_spots).map_err(|e| e.to_string())?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewSession {
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "18:30")]
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[schema(value_type = u32, example = 60)]
    pub duration: ClassDuration,
    pub specialization: Specialization,
    pub instructor_name: String,
    #[schema(example = 15)]
    pub capacity: u32,
}

/// Accepts both `HH:MM` (as typed into the admin form) and `HH:MM:SS`.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow, ToSchema)]
pub struct Client {
    pub id: ClientId,
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow, ToSchema)]
pub struct Employee {
    pub id: EmployeeId,
    pub full_name: String,
    pub phone: String,
    pub specialization: String,
    pub passport: String,
    #[schema(value_type = String, format = "date", example = "1990-04-12")]
    pub birthday: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewEmployee {
    pub full_name: String,
    pub phone: String,
    pub specialization: String,
    pub passport: String,
    #[schema(value_type = String, format = "date", example = "1990-04-12")]
    pub birthday: NaiveDate,
}

/// What clients get to see about a trainer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow, ToSchema)]
pub struct Trainer {
    pub full_name: String,
    pub specialization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow, ToSchema)]
pub struct PriceEntry {
    pub id: i64,
    pub membership_type: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Attendance {
    pub registration_id: i64,
    pub schedule_id: SessionId,
    #[schema(value_type = String, format = "date-time")]
    pub booked_at: DateTime<Utc>,
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "18:30:00")]
    pub start_time: NaiveTime,
    pub specialization: String,
    pub instructor_name: String,
    pub attended: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct AttendanceRow {
    pub registration_id: i64,
    pub schedule_id: i64,
    pub booked_at: DateTime<Utc>,
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub specialization: String,
    pub instructor_name: String,
    pub attended: bool,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = String;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let day_of_week = DayOfWeek::from_number(row.day_of_week).ok_or_else(|| {
            format!("registration {}: bad day_of_week {}", row.registration_id, row.day_of_week)
        })?;
        Ok(Attendance {
            registration_id: row.registration_id,
            schedule_id: row.schedule_id,
            booked_at: row.booked_at,
            day_of_week,
            start_time: row.start_time,
            specialization: row.specialization,
            instructor_name: row.instructor_name,
            attended: row.attended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_numbers_follow_week_order() {
        for (i, day) in DayOfWeek::ALL.iter().enumerate() {
            assert_eq!(day.number(), i as i64 + 1);
            assert_eq!(DayOfWeek::from_number(day.number()), Some(*day));
        }
        assert_eq!(DayOfWeek::from_number(0), None);
        assert_eq!(DayOfWeek::from_number(8), None);
    }

    #[test]
    fn test_day_parses_codes_and_english() {
        assert_eq!("Пн".parse::<DayOfWeek>().unwrap(), DayOfWeek::Monday);
        assert_eq!("вс".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sunday);
        assert_eq!("Friday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Friday);
        assert!("someday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_day_serializes_as_code() {
        let json = serde_json::to_string(&DayOfWeek::Wednesday).unwrap();
        assert_eq!(json, "\"Ср\"");
        let back: DayOfWeek = serde_json::from_str("\"wed\"").unwrap();
        assert_eq!(back, DayOfWeek::Wednesday);
    }

    #[test]
    fn test_duration_only_accepts_known_lengths() {
        assert_eq!(ClassDuration::try_from(60).unwrap(), ClassDuration::Hour);
        assert_eq!(ClassDuration::try_from(90).unwrap(), ClassDuration::HourAndHalf);
        assert!(ClassDuration::try_from(45).is_err());
        assert!(serde_json::from_str::<ClassDuration>("120").is_err());
    }

    #[test]
    fn test_new_session_accepts_short_time() {
        let body = r#"{
            "day_of_week": "Пн",
            "start_time": "18:30",
            "duration": 90,
            "specialization": "hatha",
            "instructor_name": "Анна Смирнова",
            "capacity": 15
        }"#;
        let session: NewSession = serde_json::from_str(body).unwrap();
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(session.duration, ClassDuration::HourAndHalf);
        assert_eq!(session.specialization, Specialization::Hatha);
    }

    #[test]
    fn test_session_row_rejects_unknown_specialization() {
        let row = SessionRow {
            id: 1,
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration: 60,
            specialization: "Pilates".into(),
            instructor_name: "X".into(),
            total_capacity: 10,
            free_spots: 10,
        };
        assert!(ClassSession::try_from(row).is_err());
    }
}
