use crate::infra::{InMemoryNoticeLog, StaticAddressDirectory};
use applicant_wizard::config::AppConfig;
use applicant_wizard::error::AppError;
use applicant_wizard::workflows::applicant::validators::ADULT_AGE;
use applicant_wizard::workflows::applicant::{
    validate_age_in, validate_national_id, validate_password_strength, AddressLookup,
    SubmissionReceipt, ViaCepClient, WizardEngine, WizardPolicy, WizardService,
    WizardServiceError,
};
use chrono::{Datelike, Local};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Postal code the scripted applicant types on the address step.
    #[arg(long, default_value = "01310-100")]
    pub(crate) postal_code: String,
    /// Resolve the postal code with the configured lookup service instead of sample data.
    #[arg(long)]
    pub(crate) live: bool,
    /// Calendar year used by the age rule (defaults to the current year).
    #[arg(long)]
    pub(crate) reference_year: Option<i32>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ValidateCommand {
    /// Check a CPF checksum (punctuation is ignored)
    NationalId { value: String },
    /// Check that a password mixes uppercase, digits and symbols
    Password { value: String },
    /// Check a YYYY-MM-DD birth date with the year-only age rule
    Age {
        value: String,
        /// Year to measure against (defaults to the current year)
        #[arg(long)]
        reference_year: Option<i32>,
        #[arg(long, default_value_t = ADULT_AGE)]
        minimum_age: u32,
    },
}

#[derive(Debug, Serialize)]
struct ValidationReport<'a> {
    validator: &'static str,
    value: &'a str,
    valid: bool,
}

pub(crate) fn run_validate(command: ValidateCommand) -> Result<(), AppError> {
    let report = match &command {
        ValidateCommand::NationalId { value } => ValidationReport {
            validator: "national_id",
            value,
            valid: validate_national_id(value),
        },
        ValidateCommand::Password { value } => ValidationReport {
            validator: "password",
            value: "<redacted>",
            valid: validate_password_strength(value),
        },
        ValidateCommand::Age {
            value,
            reference_year,
            minimum_age,
        } => {
            let year = reference_year.unwrap_or_else(|| Local::now().year());
            ValidationReport {
                validator: "age",
                value,
                valid: validate_age_in(value, year, *minimum_age),
            }
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("{} -> {}", report.validator, err),
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        postal_code,
        live,
        reference_year,
    } = args;

    let policy = WizardPolicy {
        reference_year: Some(reference_year.unwrap_or_else(|| Local::now().year())),
        ..WizardPolicy::default()
    };
    let notices = Arc::new(InMemoryNoticeLog::default());

    println!("Applicant wizard demo");
    if live {
        let lookup = AppConfig::load()?.lookup;
        let client = ViaCepClient::new(lookup.base_url.clone(), lookup.timeout())?;
        println!("- Address lookup: live ({})", lookup.base_url);
        let engine = WizardEngine::new(policy)?;
        let service = WizardService::new(engine, Arc::new(client), notices.clone());
        walk(&service, &postal_code).await?;
    } else {
        println!("- Address lookup: sample directory");
        let directory = Arc::new(StaticAddressDirectory::sample());
        let engine = WizardEngine::new(policy)?;
        let service = WizardService::new(engine, directory, notices.clone());
        walk(&service, &postal_code).await?;
    }

    println!("\nNotices");
    for notice in notices.notices() {
        println!("  - [{:?}] {}: {}", notice.kind, notice.wizard_id, notice.message);
    }
    Ok(())
}

async fn walk<L>(
    service: &WizardService<L, InMemoryNoticeLog>,
    postal_code: &str,
) -> Result<(), AppError>
where
    L: AddressLookup + 'static,
{
    let id = service.start().wizard_id;
    println!("- Started wizard {id}");

    if let Err(WizardServiceError::Transition(err)) = service.advance(&id) {
        println!("  Empty step 1 blocked: {err}");
    }

    for (field, value) in [
        ("name", "Ana Souza"),
        ("national_id", "529.982.247-25"),
        ("email", "ana.souza@example.com"),
        ("password", "Abc#1234"),
        ("telephone", "11987654321"),
        ("birth_date", "2003-04-20"),
        ("gender", "female"),
        ("ethnicity", "brown"),
    ] {
        service.set_field(&id, field, value.to_string())?;
    }
    let view = service.advance(&id)?;
    println!("- Personal data accepted, now on {}", view.step.label());

    service.set_field(&id, "postal_code", postal_code.to_string())?;
    let (applied, view) = service.lookup_address(&id).await?;
    let address = &view.record.address;
    println!("- Lookup for {postal_code}: {applied:?}");
    println!(
        "  {} / {} / {} (locked: {})",
        address.street_name,
        address.city,
        address.state,
        view.locked_fields.join(", ")
    );
    service.set_field(&id, "street_number", "1578".to_string())?;
    if address.neighborhood.is_empty() {
        service.set_field(&id, "neighborhood", "Centro".to_string())?;
    }

    let view = match service.advance(&id) {
        Ok(view) => view,
        Err(WizardServiceError::Transition(err)) => {
            println!("  Address step blocked: {err}");
            for (path, message) in service.view(&id)?.errors.iter() {
                println!("    - {path}: {message}");
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!("- Address accepted, now on {}", view.step.label());

    let entry = service.add_education(&id)?;
    for (field, value) in [
        ("institution_name", "Universidade de São Paulo"),
        ("course_name", "Computer Science"),
        ("start_date", "2021-02-01"),
        ("end_date", "2024-12-15"),
        ("ownership", "public"),
    ] {
        service.set_education_field(&id, entry, field, value)?;
    }
    service.set_accepted_regulation(&id, true)?;
    println!("- Education entry {entry} filled, regulation accepted");

    let record = service.submit(&id)?;
    let receipt = SubmissionReceipt::new(id, &record);
    match serde_json::to_string_pretty(&receipt) {
        Ok(json) => println!("- Submitted (password withheld):\n{json}"),
        Err(err) => println!("- Submitted; receipt unavailable: {err}"),
    }
    Ok(())
}
