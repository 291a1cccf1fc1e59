use crate::infra::InMemoryBackend;
use admission_intake::config::IntakeSettings;
use admission_intake::error::AppError;
use admission_intake::workflows::admission::payload::{build_payload, describe_fees};
use admission_intake::workflows::admission::registration::{self, DEFAULT_CENTER_CODE};
use admission_intake::workflows::admission::{
    DocumentField, DraftAction, DraftField, FeeInput, IntakeWizard, Notice, NoticeLog,
    SearchOutcome, UploadFile, WizardStep,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Name (or registration number) to search for
    #[arg(long, default_value = "priya")]
    pub(crate) search: String,
    /// Photo to upload; a placeholder image is used when omitted
    #[arg(long)]
    pub(crate) photo: Option<PathBuf>,
    /// Signature to upload; a placeholder image is used when omitted
    #[arg(long)]
    pub(crate) signature: Option<PathBuf>,
    /// Total course fee
    #[arg(long, default_value = "12000")]
    pub(crate) total_fee: String,
    /// Discount on the total fee
    #[arg(long, default_value = "1500")]
    pub(crate) discount: String,
    /// Amount paid at admission
    #[arg(long, default_value = "6000")]
    pub(crate) paid_fee: String,
    /// Cash, UPI, Card or Bank Transfer
    #[arg(long, default_value = "Cash")]
    pub(crate) payment_method: String,
    /// Required for paid non-cash payments
    #[arg(long)]
    pub(crate) transaction_id: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RegistrationArgs {
    /// Center code embedded in the registration number
    #[arg(long, default_value = DEFAULT_CENTER_CODE)]
    pub(crate) center: String,
    /// Date the numbers are generated for (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// How many numbers to print
    #[arg(long, default_value_t = 3)]
    pub(crate) count: usize,
}

pub(crate) fn run_registration_numbers(args: RegistrationArgs) -> Result<(), AppError> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let mut rng = rand::thread_rng();
    println!("Registration numbers for {} on {date}", args.center.to_ascii_uppercase());
    for _ in 0..args.count {
        let generated = registration::generate(&args.center, date);
        let form_no = registration::form_number(date, &mut rng);
        println!(
            "  {:<16} month {:<6} form {}",
            generated.reg_no, generated.month, form_no
        );
    }
    Ok(())
}

type DemoWizard = IntakeWizard<InMemoryBackend, InMemoryBackend, NoticeLog>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let backend = Arc::new(InMemoryBackend::seeded());
    let notices = NoticeLog::default();
    let mut wizard: DemoWizard = IntakeWizard::new(
        Arc::clone(&backend),
        Arc::clone(&backend),
        notices.clone(),
        IntakeSettings::default(),
    );

    println!("Admission intake demo");
    println!(
        "  form {} / registration {} ({})",
        wizard.draft().form_no,
        wizard.draft().generated_reg_no,
        wizard.draft().month
    );

    println!("\nStep 0: search '{}'", args.search);
    match wizard.search(&args.search) {
        Ok(SearchOutcome::Enquiries(enquiries)) => {
            for enquiry in &enquiries {
                println!(
                    "  enquiry {} {}",
                    enquiry.id.as_deref().unwrap_or("-"),
                    enquiry.display_name()
                );
            }
            if let Some(id) = enquiries.first().and_then(|enquiry| enquiry.id.clone()) {
                wizard.select_enquiry(&id);
            }
        }
        Ok(SearchOutcome::Admission(record)) => {
            println!("  existing admission {}", record.display_name());
        }
        Ok(SearchOutcome::NotFound) => println!("  nothing found; starting from a blank form"),
        Err(err) => println!("  search failed: {err}"),
    }
    print_notices(notices.drain());

    fill_gaps(&mut wizard, &args);

    println!("\nStep 2: documents");
    for (field, path) in [
        (DocumentField::Photo, args.photo.as_deref()),
        (DocumentField::Signature, args.signature.as_deref()),
    ] {
        let file = load_upload(field, path)?;
        match wizard.upload(field, &file) {
            Ok(update) => println!(
                "  {:<10} -> {}",
                field.label(),
                update
                    .reference
                    .as_ref()
                    .map(|reference| reference.path().to_string())
                    .unwrap_or_default()
            ),
            Err(rejection) => println!("  {:<10} rejected: {rejection}", field.label()),
        }
    }
    print_notices(notices.drain());

    println!("\nSteps 1-5: validation");
    while wizard.current_step() != WizardStep::Review {
        let step = wizard.current_step();
        match wizard.next() {
            Ok(next) => println!("  {:<12} ok -> {}", step.title(), next.title()),
            Err(errors) => {
                println!("  {:<12} blocked", step.title());
                for (field, message) in errors.iter() {
                    println!("    {field}: {message}");
                }
                print_notices(notices.drain());
                return Ok(());
            }
        }
    }

    let fees = wizard.draft().fee_breakdown();
    println!("\nStep 6: review");
    println!(
        "  {} / {} / net {:.2} / remaining {:.2}",
        wizard.draft().full_name,
        wizard.draft().registration_number(),
        fees.net_fee,
        fees.remaining_fee
    );
    let preview = build_payload(wizard.draft(), Local::now().date_naive());
    println!("  payload fees: {}", describe_fees(&preview));

    match wizard.submit() {
        Ok(outcome) => {
            println!(
                "\nSubmitted ({:?}) as {}",
                outcome.path,
                outcome
                    .record
                    .id
                    .as_ref()
                    .map(|id| id.as_str().to_string())
                    .unwrap_or_default()
            );
            println!(
                "  {} admission(s) and {} document(s) stored",
                backend.admissions().len(),
                backend.stored_documents()
            );
        }
        Err(err) => println!("\nSubmission failed: {err}"),
    }
    print_notices(notices.drain());

    Ok(())
}

/// Enquiries rarely carry payment details or every contact field.
fn fill_gaps(wizard: &mut DemoWizard, args: &DemoArgs) {
    let defaults = [
        (DraftField::FullName, "Demo Applicant"),
        (DraftField::FatherName, "Demo Guardian"),
        (DraftField::DateOfBirth, "2005-01-01"),
        (DraftField::Gender, "Female"),
        (DraftField::Category, "General"),
        (DraftField::Nationality, "Indian"),
        (DraftField::AadharNumber, "123412341234"),
        (DraftField::MobileNumber, "9000000000"),
        (DraftField::Address, "1 Main Road"),
        (DraftField::City, "Indore"),
        (DraftField::State, "Madhya Pradesh"),
        (DraftField::PinCode, "452001"),
        (DraftField::HighestQualification, "12th"),
        (DraftField::CourseApplied, "DCA"),
    ];
    for (field, value) in defaults {
        if field.value(wizard.draft()).trim().is_empty() {
            wizard.dispatch(DraftAction::SetText(field, value.to_string()));
        }
    }

    wizard.dispatch(DraftAction::SetText(
        DraftField::PaymentMethod,
        args.payment_method.clone(),
    ));
    if let Some(transaction_id) = &args.transaction_id {
        wizard.dispatch(DraftAction::SetText(
            DraftField::TransactionId,
            transaction_id.clone(),
        ));
    }
    for (input, value) in [
        (FeeInput::TotalFee, &args.total_fee),
        (FeeInput::Discount, &args.discount),
        (FeeInput::PaidFee, &args.paid_fee),
    ] {
        wizard.dispatch(DraftAction::SetFee(input, value.clone()));
    }
}

fn load_upload(field: DocumentField, path: Option<&Path>) -> Result<UploadFile, AppError> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.bin", field.key()));
            let content_type = mime_guess::from_path(path).first_or_octet_stream();
            Ok(UploadFile::new(file_name, content_type.to_string(), bytes))
        }
        None => Ok(UploadFile::new(
            format!("{}.png", field.key()),
            "image/png",
            vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a],
        )),
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        println!("  [{:?}] {}", notice.level, notice.message);
    }
}
