//! Plan participants.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ssn::Ssn;

/// Termination code recorded for participants who died.
pub const TERMINATION_DECEASED: char = 'Z';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Delete,
    Inactive,
    Terminated,
}

impl EmploymentStatus {
    pub const fn id(&self) -> char {
        match self {
            Self::Active => 'a',
            Self::Delete => 'd',
            Self::Inactive => 'i',
            Self::Terminated => 't',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    #[serde(default)]
    pub middle: Option<String>,
    pub last: String,
}

impl PersonName {
    /// "Last, First M"
    pub fn full_name(&self) -> String {
        let mut name = format!("{}, {}", self.last.trim(), self.first.trim());
        if let Some(initial) = self
            .middle
            .as_deref()
            .and_then(|m| m.trim().chars().next())
        {
            name.push(' ');
            name.push(initial.to_ascii_uppercase());
        }
        name
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentDates {
    pub birth: NaiveDate,
    pub hire: NaiveDate,
    #[serde(default)]
    pub rehire: Option<NaiveDate>,
    #[serde(default)]
    pub termination: Option<NaiveDate>,
    #[serde(default)]
    pub death: Option<NaiveDate>,
}

impl EmploymentDates {
    /// Age in completed years on `as_of`.
    pub fn age_on(&self, as_of: NaiveDate) -> u32 {
        completed_years(self.birth, as_of)
    }

    /// Date of the participant's 65th birthday.
    pub fn sixty_fifth_birthday(&self) -> Option<NaiveDate> {
        self.birth.checked_add_months(Months::new(65 * 12))
    }

    /// Completed years of service on `as_of`.
    ///
    /// A termination followed by a rehire splits service into two periods,
    /// each floored to whole years before summing. Without a later rehire,
    /// service runs from hire to the earlier of termination and `as_of`.
    pub fn years_of_service(&self, as_of: NaiveDate) -> u32 {
        match (self.termination, self.rehire) {
            (Some(terminated), Some(rehired)) if terminated < rehired => {
                let before = completed_years(self.hire, terminated.min(as_of));
                let after = completed_years(rehired, as_of);
                before + after
            }
            (Some(terminated), _) => completed_years(self.hire, terminated.min(as_of)),
            (None, _) => completed_years(self.hire, as_of),
        }
    }
}

/// Whole anniversaries of `start` reached on or before `end`.
///
/// A Feb 29 anniversary falls on Feb 28 in non-leap years.
pub fn completed_years(start: NaiveDate, end: NaiveDate) -> u32 {
    if end <= start {
        return 0;
    }
    let mut years = (end.year() - start.year()).max(0) as u32;
    while years > 0 {
        match start.checked_add_months(Months::new(years * 12)) {
            Some(anniversary) if anniversary <= end => break,
            _ => years -= 1,
        }
    }
    years
}

/// A participant as held by the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographic {
    pub id: i32,
    pub ssn: Ssn,
    pub badge_number: i32,
    pub oracle_hcm_id: Option<i64>,
    pub name: PersonName,
    pub dates: EmploymentDates,
    pub termination_code: Option<char>,
    pub pay_classification_id: String,
    pub employment_status: EmploymentStatus,
}

impl Demographic {
    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    /// Deceased on or before `as_of`, by date of death or termination code.
    pub fn is_deceased(&self, as_of: NaiveDate) -> bool {
        self.termination_code == Some(TERMINATION_DECEASED)
            || self.dates.death.is_some_and(|d| d <= as_of)
    }
}

/// Participant data as delivered by the HCM feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HcmRecord {
    pub ssn: Ssn,
    pub badge_number: i32,
    #[serde(default)]
    pub oracle_hcm_id: Option<i64>,
    pub name: PersonName,
    pub dates: EmploymentDates,
    #[serde(default)]
    pub termination_code: Option<char>,
    pub pay_classification_id: String,
    pub employment_status: EmploymentStatus,
}

impl HcmRecord {
    pub fn into_demographic(self, id: i32) -> Demographic {
        Demographic {
            id,
            ssn: self.ssn,
            badge_number: self.badge_number,
            oracle_hcm_id: self.oracle_hcm_id,
            name: self.name,
            dates: self.dates,
            termination_code: self.termination_code,
            pay_classification_id: self.pay_classification_id,
            employment_status: self.employment_status,
        }
    }
}

/// Appended whenever a participant's SSN changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsnChangeRecord {
    pub demographic_id: i32,
    pub old_ssn: Ssn,
    pub new_ssn: Ssn,
    pub user_name: String,
    pub changed_at: chrono::DateTime<chrono::Utc>,
}
