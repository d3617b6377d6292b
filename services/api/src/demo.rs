use crate::infra::{parse_date, InMemorySubmissionGateway};
use chrono::{Local, NaiveDate};
use clap::Args;
use domestic_match::error::AppError;
use domestic_match::workflows::domestic_work::{
    age_in_years, filter, load_directory_csv, AgeBand, AttachmentKind, CandidateRecord,
    FieldPath, FieldValue, FileDraftStore, FilterCriteria, GenderFilter, ImageAttachment,
    RegistrationWizard, WizardError, WizardStep,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date used for age calculations (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Image file to attach as the employer's profile picture.
    #[arg(long)]
    pub(crate) profile_image: Option<PathBuf>,
    /// Save progress to this file and resume from it when it exists.
    #[arg(long)]
    pub(crate) draft_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DirectoryFilterArgs {
    /// Directory export with columns id,name,date_of_birth,gender,status,...
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// all, male or female
    #[arg(long, default_value = "all")]
    pub(crate) gender: GenderFilter,
    /// all, 18-21, 22-25, 26-30, 31-35 or 36+
    #[arg(long, default_value = "all")]
    pub(crate) age_band: AgeBand,
    /// Date used for age calculations (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Hide housekeepers that are hired or inactive
    #[arg(long)]
    pub(crate) available_only: bool,
}

pub(crate) fn run_directory_filter(args: DirectoryFilterArgs) -> Result<(), AppError> {
    let DirectoryFilterArgs {
        csv,
        gender,
        age_band,
        today,
        available_only,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let records = load_directory_csv(&csv)?;
    let criteria = FilterCriteria { gender, age_band };
    let mut matches = filter(&records, &criteria, today);
    if available_only {
        matches.retain(CandidateRecord::is_available);
    }

    println!(
        "{} of {} housekeepers match gender={:?} age_band={}",
        matches.len(),
        records.len(),
        gender,
        age_band.label()
    );
    render_candidates(&matches, today);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        profile_image,
        draft_file,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let gateway = Arc::new(InMemorySubmissionGateway::seeded());

    let wizard = match &draft_file {
        Some(path) => {
            let store = Arc::new(FileDraftStore::new(path.clone()));
            RegistrationWizard::resume(gateway.clone(), store)?
        }
        None => RegistrationWizard::new(gateway.clone()),
    };
    let mut wizard = wizard.with_page_size(3);

    println!("Employer registration demo");
    if wizard.step() != WizardStep::Identity || !wizard.draft().is_blank() {
        println!("- resumed saved draft at {}", wizard.step());
    }

    if wizard.step() == WizardStep::Identity {
        wizard.update_field(FieldPath::FullName, "Aline Uwase".into())?;
        match wizard.advance().await {
            Err(WizardError::Validation(err)) => println!("- advance refused: {err}"),
            Err(other) => return Err(other.into()),
            Ok(step) => println!("- moved to {step}"),
        }
    }

    while wizard.step() != WizardStep::Selection {
        let step = wizard.step();
        for (path, value) in sample_fields(step) {
            wizard.update_field(path, value)?;
        }
        if step == WizardStep::Preferences {
            if let Some(path) = &profile_image {
                let attachment = load_image(path)?;
                println!(
                    "- attached {} ({} bytes, {})",
                    attachment.file_name(),
                    attachment.bytes().len(),
                    attachment.content_type()
                );
                wizard.attach_image(AttachmentKind::Profile, attachment)?;
            }
        }

        let next = wizard.advance().await?;
        println!("- completed {step}, now on {next}");
    }

    if let Some(registration_id) = wizard.registration_id() {
        if let Some(stored) = gateway.registration(registration_id) {
            println!(
                "Registered {} as {} ({} tasks)",
                stored.identity.full_name,
                registration_id,
                stored.preferences.tasks.len()
            );
        }
    }
    println!("Directory loaded: {} housekeepers", wizard.directory().len());

    let views = [
        FilterCriteria::default(),
        FilterCriteria {
            gender: GenderFilter::Female,
            age_band: AgeBand::From22To25,
        },
        FilterCriteria {
            gender: GenderFilter::Male,
            age_band: AgeBand::All,
        },
    ];
    for criteria in views {
        wizard.set_criteria(criteria);
        let visible = wizard.visible_candidates(today);
        println!(
            "\nFilter gender={:?} age_band={} -> {} shown",
            criteria.gender,
            criteria.age_band.label(),
            visible.len()
        );
        render_candidates(&visible, today);
    }

    wizard.set_criteria(FilterCriteria::default());
    println!("\nShortlisting");
    for record in wizard.visible_candidates(today) {
        let outcome = wizard.toggle(&record.id)?;
        println!("- {} ({}): {:?}", record.display_name, record.id, outcome);
        if wizard.selection().is_full() {
            break;
        }
    }

    let receipt = wizard.submit_selection().await?;
    let chosen: Vec<String> = receipt
        .candidate_ids
        .iter()
        .map(|id| id.to_string())
        .collect();
    println!(
        "\nSelection for {} accepted at {}: {}",
        receipt.registration_id,
        receipt.accepted_at.format("%Y-%m-%d %H:%M UTC"),
        chosen.join(", ")
    );
    if let Some(stored) = gateway.selection(&receipt.registration_id) {
        println!("Backend holds {} shortlisted housekeepers", stored.len());
    }

    Ok(())
}

fn sample_fields(step: WizardStep) -> Vec<(FieldPath, FieldValue)> {
    match step {
        WizardStep::Identity => vec![
            (FieldPath::FullName, "Aline Uwase".into()),
            (FieldPath::PhoneNumber, "+250788000111".into()),
            (FieldPath::NationalId, "1199080012345678".into()),
            (FieldPath::Email, "aline@example.rw".into()),
        ],
        WizardStep::Location => vec![
            (FieldPath::Province, "Kigali".into()),
            (FieldPath::District, "Gasabo".into()),
            (FieldPath::Sector, "Kimironko".into()),
            (FieldPath::Cell, "Bibare".into()),
            (FieldPath::Village, "Imena".into()),
        ],
        WizardStep::Preferences => vec![
            (FieldPath::SalaryRange, "50000-80000".into()),
            (FieldPath::Tasks, "cooking, laundry, childcare".into()),
            (FieldPath::VacationDays, FieldValue::Number(14)),
        ],
        WizardStep::Selection => Vec::new(),
    }
}

fn load_image(path: &Path) -> Result<ImageAttachment, AppError> {
    let bytes = std::fs::read(path)?;
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());

    ImageAttachment::new(file_name, content_type.essence_str(), bytes)
        .map_err(|err| AppError::from(WizardError::from(err)))
}

fn render_candidates(records: &[CandidateRecord], today: NaiveDate) {
    for record in records {
        let age = record
            .date_of_birth
            .map(|dob| age_in_years(dob, today).to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {:<8} {:<22} {:<6} age {:<3} {:<9} {:<11} {}",
            record.id.to_string(),
            record.display_name,
            record.gender.label(),
            age,
            record.availability.label(),
            record.location.district,
            record.preferences.tasks.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn demo_runs_end_to_end_and_clears_draft() {
        let dir = tempfile::tempdir().expect("temp dir");
        let draft_file = dir.path().join("draft.json");
        let image = dir.path().join("me.png");
        std::fs::File::create(&image)
            .and_then(|mut file| file.write_all(&[0x89, 0x50, 0x4e, 0x47]))
            .expect("image written");

        let args = DemoArgs {
            today: NaiveDate::from_ymd_opt(2026, 6, 1),
            profile_image: Some(image),
            draft_file: Some(draft_file.clone()),
        };
        run_demo(args).await.expect("demo completes");
        assert!(!draft_file.exists());
    }

    #[test]
    fn non_image_files_are_refused() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not an image").expect("written");

        let err = load_image(&path).expect_err("text is not an image");
        assert!(err.to_string().contains("expected image/*"));
    }

    #[test]
    fn directory_filter_reads_csv() {
        let dir = tempfile::tempdir().expect("temp dir");
        let csv = dir.path().join("housekeepers.csv");
        std::fs::write(
            &csv,
            "id,name,date_of_birth,gender,status\nhk-1,Claudine,2001-05-01,female,available\n",
        )
        .expect("written");

        let args = DirectoryFilterArgs {
            csv,
            gender: GenderFilter::Female,
            age_band: AgeBand::From22To25,
            today: NaiveDate::from_ymd_opt(2026, 1, 1),
            available_only: true,
        };
        run_directory_filter(args).expect("filters");
    }
}
