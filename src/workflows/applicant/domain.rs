use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::education::EducationSection;

/// Identifier wrapper for a running wizard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WizardId(pub String);

impl fmt::Display for WizardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Working record mutated in place while the applicant moves through the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub personal: PersonalData,
    pub address: Address,
    pub education_entries: EducationSection,
    pub accepted_regulation: bool,
}

/// Step 1 fields. Values are kept as the raw text the applicant typed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalData {
    pub name: String,
    pub national_id: String,
    pub email: String,
    pub password: String,
    pub telephone: String,
    pub birth_date: String,
    pub gender: String,
    pub ethnicity: String,
}

impl fmt::Debug for PersonalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonalData")
            .field("name", &self.name)
            .field("national_id", &self.national_id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("telephone", &self.telephone)
            .field("birth_date", &self.birth_date)
            .field("gender", &self.gender)
            .field("ethnicity", &self.ethnicity)
            .finish()
    }
}

/// Step 2 fields. `street_number` holds the raw input until submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postal_code: String,
    pub street_name: String,
    pub street_number: String,
    pub state: String,
    pub city: String,
    pub neighborhood: String,
    pub complement: String,
}

/// Stable identity of an education entry, independent of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edu-{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        raw.strip_prefix("edu-")
            .unwrap_or(raw)
            .parse::<u64>()
            .map(EntryId)
            .map_err(|_| UnknownField(s.to_string()))
    }
}

/// Whether an institution is publicly or privately run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionOwnership {
    Public,
    Private,
}

impl InstitutionOwnership {
    pub fn label(&self) -> &'static str {
        match self {
            InstitutionOwnership::Public => "public",
            InstitutionOwnership::Private => "private",
        }
    }
}

impl FromStr for InstitutionOwnership {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "true" => Ok(Self::Public),
            "private" | "false" => Ok(Self::Private),
            _ => Err(UnknownField(s.to_string())),
        }
    }
}

/// One row of the repeatable education section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub id: EntryId,
    pub institution_name: String,
    pub course_name: String,
    pub start_date: String,
    pub end_date: String,
    pub ownership: Option<InstitutionOwnership>,
}

impl EducationEntry {
    /// Blank template used whenever the applicant adds a row.
    pub fn template(id: EntryId) -> Self {
        Self {
            id,
            institution_name: String::new(),
            course_name: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            ownership: None,
        }
    }
}

/// Ordinal wizard position. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Step1,
    Step2,
    Step3,
    Submitted,
}

impl WizardStep {
    pub fn index(&self) -> u8 {
        match self {
            WizardStep::Step1 => 1,
            WizardStep::Step2 => 2,
            WizardStep::Step3 => 3,
            WizardStep::Submitted => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WizardStep::Step1 => "personal",
            WizardStep::Step2 => "address",
            WizardStep::Step3 => "education",
            WizardStep::Submitted => "submitted",
        }
    }

    pub(crate) fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Step1 => Some(WizardStep::Step2),
            WizardStep::Step2 => Some(WizardStep::Step3),
            WizardStep::Step3 | WizardStep::Submitted => None,
        }
    }

    pub(crate) fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Step2 => Some(WizardStep::Step1),
            WizardStep::Step3 => Some(WizardStep::Step2),
            WizardStep::Step1 | WizardStep::Submitted => None,
        }
    }
}

/// Single-valued fields of steps 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    NationalId,
    Email,
    Password,
    Telephone,
    BirthDate,
    Gender,
    Ethnicity,
    PostalCode,
    StreetName,
    StreetNumber,
    State,
    City,
    Neighborhood,
    Complement,
}

impl Field {
    pub const PERSONAL: [Field; 8] = [
        Field::Name,
        Field::NationalId,
        Field::Email,
        Field::Password,
        Field::Telephone,
        Field::BirthDate,
        Field::Gender,
        Field::Ethnicity,
    ];

    pub const ADDRESS: [Field; 7] = [
        Field::PostalCode,
        Field::StreetName,
        Field::StreetNumber,
        Field::State,
        Field::City,
        Field::Neighborhood,
        Field::Complement,
    ];

    /// Fields written by a successful postal-code lookup.
    pub const LOOKUP_TARGETS: [Field; 3] = [Field::StreetName, Field::City, Field::State];

    /// Error-map key, e.g. `personal.national_id`.
    pub fn path(&self) -> &'static str {
        match self {
            Field::Name => "personal.name",
            Field::NationalId => "personal.national_id",
            Field::Email => "personal.email",
            Field::Password => "personal.password",
            Field::Telephone => "personal.telephone",
            Field::BirthDate => "personal.birth_date",
            Field::Gender => "personal.gender",
            Field::Ethnicity => "personal.ethnicity",
            Field::PostalCode => "address.postal_code",
            Field::StreetName => "address.street_name",
            Field::StreetNumber => "address.street_number",
            Field::State => "address.state",
            Field::City => "address.city",
            Field::Neighborhood => "address.neighborhood",
            Field::Complement => "address.complement",
        }
    }

    pub fn step(&self) -> WizardStep {
        if Field::PERSONAL.contains(self) {
            WizardStep::Step1
        } else {
            WizardStep::Step2
        }
    }

    pub(crate) fn slot<'a>(&self, record: &'a mut ApplicantRecord) -> &'a mut String {
        let personal = &mut record.personal;
        let address = &mut record.address;
        match self {
            Field::Name => &mut personal.name,
            Field::NationalId => &mut personal.national_id,
            Field::Email => &mut personal.email,
            Field::Password => &mut personal.password,
            Field::Telephone => &mut personal.telephone,
            Field::BirthDate => &mut personal.birth_date,
            Field::Gender => &mut personal.gender,
            Field::Ethnicity => &mut personal.ethnicity,
            Field::PostalCode => &mut address.postal_code,
            Field::StreetName => &mut address.street_name,
            Field::StreetNumber => &mut address.street_number,
            Field::State => &mut address.state,
            Field::City => &mut address.city,
            Field::Neighborhood => &mut address.neighborhood,
            Field::Complement => &mut address.complement,
        }
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Field::PERSONAL
            .iter()
            .chain(Field::ADDRESS.iter())
            .find(|field| {
                let path = field.path();
                path == key || path.split_once('.').map(|(_, name)| name) == Some(key)
            })
            .copied()
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Fields of a single education entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationField {
    InstitutionName,
    CourseName,
    StartDate,
    EndDate,
    Ownership,
}

impl EducationField {
    pub fn name(&self) -> &'static str {
        match self {
            EducationField::InstitutionName => "institution_name",
            EducationField::CourseName => "course_name",
            EducationField::StartDate => "start_date",
            EducationField::EndDate => "end_date",
            EducationField::Ownership => "ownership",
        }
    }

    /// Error-map key scoped to one entry, e.g. `education_entries.edu-3.start_date`.
    pub fn path(&self, id: EntryId) -> String {
        format!("{EDUCATION_PATH}.{id}.{}", self.name())
    }
}

impl FromStr for EducationField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "institution_name" => Ok(Self::InstitutionName),
            "course_name" => Ok(Self::CourseName),
            "start_date" => Ok(Self::StartDate),
            "end_date" => Ok(Self::EndDate),
            "ownership" => Ok(Self::Ownership),
            _ => Err(UnknownField(s.to_string())),
        }
    }
}

pub const EDUCATION_PATH: &str = "education_entries";
pub const REGULATION_PATH: &str = "accepted_regulation";

/// Raised when a client names a field or value the wizard does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field or value: {0}")]
pub struct UnknownField(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_parses_from_path_or_bare_name() {
        assert_eq!("personal.name".parse::<Field>(), Ok(Field::Name));
        assert_eq!("postal_code".parse::<Field>(), Ok(Field::PostalCode));
        assert!("address.unknown".parse::<Field>().is_err());
    }

    #[test]
    fn entry_id_round_trips_through_display() {
        let id = EntryId(7);
        assert_eq!(id.to_string(), "edu-7");
        assert_eq!("edu-7".parse::<EntryId>(), Ok(id));
        assert_eq!("7".parse::<EntryId>(), Ok(id));
    }

    #[test]
    fn personal_debug_redacts_password() {
        let personal = PersonalData {
            password: "Secret#1".to_string(),
            ..PersonalData::default()
        };
        let rendered = format!("{personal:?}");
        assert!(!rendered.contains("Secret#1"));
        assert!(rendered.contains("<redacted>"));
    }
}
