use chrono::{Datelike, Local, NaiveDate};

use super::domain::{ApplicantRecord, EducationEntry, EDUCATION_PATH, REGULATION_PATH};
use super::policy::WizardPolicy;
use super::schema::{FieldRule, StepSchema};
use super::validators::{validate_age_in, validate_national_id, validate_password_strength};

pub const POSTAL_CODE_NOT_FOUND: &str = "Postal code not found";

const ISO_DATE: &str = r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$";
const EMAIL: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const POSTAL_CODE: &str = r"^[0-9]{5}-?[0-9]{3}$";

/// Schemas for every step, built once from a policy.
pub struct WizardSchemas {
    pub personal: StepSchema<ApplicantRecord>,
    pub address: StepSchema<ApplicantRecord>,
    pub education: StepSchema<ApplicantRecord>,
    pub entry: StepSchema<EducationEntry>,
}

impl WizardSchemas {
    pub fn build(policy: &WizardPolicy) -> Result<Self, regex::Error> {
        Ok(Self {
            personal: personal_schema(policy)?,
            address: address_schema()?,
            education: education_schema(),
            entry: entry_schema(policy)?,
        })
    }
}

fn personal_schema(policy: &WizardPolicy) -> Result<StepSchema<ApplicantRecord>, regex::Error> {
    let pinned_year = policy.reference_year;
    let minimum_age = policy.minimum_age;

    let mut password = FieldRule::text("personal.password", |record: &ApplicantRecord| {
        record.personal.password.as_str()
    })
    .required("Password is required");
    if policy.enforce_password_strength {
        password = password.refine(
            |value, _| validate_password_strength(value),
            "Password must contain an uppercase letter, a number and a special character",
        );
    }

    Ok(StepSchema::new(vec![
        FieldRule::text("personal.name", |record: &ApplicantRecord| {
            record.personal.name.as_str()
        })
        .required("Name is required")
        .min_length(4, "Name must have at least 4 characters"),
        FieldRule::text("personal.national_id", |record: &ApplicantRecord| {
            record.personal.national_id.as_str()
        })
        .required("CPF is required")
        .min_length(11, "CPF must have between 11 and 14 characters")
        .max_length(14, "CPF must have between 11 and 14 characters")
        .refine(|value, _| validate_national_id(value), "Invalid CPF"),
        FieldRule::text("personal.email", |record: &ApplicantRecord| {
            record.personal.email.as_str()
        })
        .required("E-mail is required")
        .pattern(EMAIL, "Invalid e-mail address")?,
        password,
        FieldRule::text("personal.telephone", |record: &ApplicantRecord| {
            record.personal.telephone.as_str()
        })
        .required("Telephone is required")
        .min_length(8, "Telephone must have at least 8 digits"),
        FieldRule::text("personal.birth_date", |record: &ApplicantRecord| {
            record.personal.birth_date.as_str()
        })
        .required("Birth date is required")
        .pattern(ISO_DATE, "Birth date must use the YYYY-MM-DD format")?
        .refine(|value, _| is_calendar_date(value), "Birth date must be a valid date")
        .refine(
            move |value, _| {
                let year = pinned_year.unwrap_or_else(|| Local::now().year());
                validate_age_in(value, year, minimum_age)
            },
            "You must be at least 18 years old",
        ),
        FieldRule::text("personal.gender", |record: &ApplicantRecord| {
            record.personal.gender.as_str()
        })
        .required("Gender is required"),
        FieldRule::text("personal.ethnicity", |record: &ApplicantRecord| {
            record.personal.ethnicity.as_str()
        })
        .required("Ethnicity is required"),
    ]))
}

fn address_schema() -> Result<StepSchema<ApplicantRecord>, regex::Error> {
    Ok(StepSchema::new(vec![
        FieldRule::text("address.postal_code", |record: &ApplicantRecord| {
            record.address.postal_code.as_str()
        })
        .required("Postal code is required")
        .min_length(8, "Postal code must have 8 or 9 characters")
        .max_length(9, "Postal code must have 8 or 9 characters")
        .pattern(POSTAL_CODE, "Invalid postal code")?,
        FieldRule::text("address.street_name", |record: &ApplicantRecord| {
            record.address.street_name.as_str()
        })
        .required("Street is required"),
        FieldRule::text("address.street_number", |record: &ApplicantRecord| {
            record.address.street_number.as_str()
        })
        .required("Number is required")
        .non_negative_integer("Number must be a non-negative integer"),
        FieldRule::text("address.state", |record: &ApplicantRecord| {
            record.address.state.as_str()
        })
        .required("State is required"),
        FieldRule::text("address.city", |record: &ApplicantRecord| {
            record.address.city.as_str()
        })
        .required("City is required"),
        FieldRule::text("address.neighborhood", |record: &ApplicantRecord| {
            record.address.neighborhood.as_str()
        })
        .required("Neighborhood is required"),
        FieldRule::text("address.complement", |record: &ApplicantRecord| {
            record.address.complement.as_str()
        }),
    ]))
}

/// Record-level step 3 rules; entries are checked with [`entry_schema`].
fn education_schema() -> StepSchema<ApplicantRecord> {
    StepSchema::new(vec![
        FieldRule::flag(EDUCATION_PATH, |record: &ApplicantRecord| {
            !record.education_entries.is_empty()
        })
        .required("Add at least one education entry"),
        FieldRule::flag(REGULATION_PATH, |record: &ApplicantRecord| {
            record.accepted_regulation
        })
        .required("You must accept the regulation"),
    ])
}

fn entry_schema(policy: &WizardPolicy) -> Result<StepSchema<EducationEntry>, regex::Error> {
    let mut course = FieldRule::text("course_name", |entry: &EducationEntry| {
        entry.course_name.as_str()
    });
    if policy.require_course_name {
        course = course.required("Course is required");
    }

    Ok(StepSchema::new(vec![
        FieldRule::text("institution_name", |entry: &EducationEntry| {
            entry.institution_name.as_str()
        })
        .required("Institution is required"),
        course,
        FieldRule::text("start_date", |entry: &EducationEntry| {
            entry.start_date.as_str()
        })
        .required("Start date is required")
        .pattern(ISO_DATE, "Start date must use the YYYY-MM-DD format")?
        .refine(|value, _| is_calendar_date(value), "Start date must be a valid date"),
        FieldRule::text("end_date", |entry: &EducationEntry| entry.end_date.as_str())
            .required("End date is required")
            .pattern(ISO_DATE, "End date must use the YYYY-MM-DD format")?
            .refine(|value, _| is_calendar_date(value), "End date must be a valid date")
            .refine(
                |end, entry| match (parse_iso(&entry.start_date), parse_iso(end)) {
                    (Some(start), Some(end)) => end >= start,
                    _ => true,
                },
                "End date must not precede start date",
            ),
        FieldRule::choice("ownership", |entry: &EducationEntry| {
            entry.ownership.map(|ownership| ownership.label())
        })
        .required("Ownership is required"),
    ]))
}

fn parse_iso(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn is_calendar_date(raw: &str) -> bool {
    parse_iso(raw).is_some()
}
