//! Professional onboarding and profile-edit wizards.
//!
//! Both flows are assembled from the same step builders; the edit flow
//! simply omits the account step.

use crate::config::WizardConfig;
use crate::error::DefinitionError;
use crate::wizard::{
    ConditionalRequirementSet, FieldRule, FieldSpec, FieldValue, StepDefinition, WizardDefinition,
};

/// Field identifiers shared by both flows.
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirm_password";
    pub const ACCEPT_TERMS: &str = "accept_terms";

    pub const FULL_NAME: &str = "full_name";
    pub const BIO: &str = "bio";
    pub const SPECIALIZATIONS: &str = "specializations";
    pub const PHOTO: &str = "photo";

    pub const CONSULTATION_TYPES: &str = "consultation_types";
    pub const SERVICES: &str = "services";
    pub const WORK_DAYS: &str = "work_days";
    pub const OFFICE_ADDRESS: &str = "office_address";

    pub const CATEGORY: &str = "professional_category";
    pub const ID_DOCUMENT: &str = "id_document";
    pub const DEGREE_CERTIFICATE: &str = "degree_certificate";
    pub const PROFESSIONAL_LICENSE: &str = "professional_license";
    pub const TECHNICAL_CERTIFICATE: &str = "technical_certificate";
}

/// Values of the professional-category discriminator.
pub mod categories {
    pub const NUTRITIONIST: &str = "nutritionist";
    pub const DIETETIC_TECHNICIAN: &str = "dietetic_technician";
}

/// Consultation type that makes an office address mandatory.
pub const IN_PERSON: &str = "in_person";

pub const ONBOARDING_WIZARD: &str = "professional_onboarding";
pub const PROFILE_EDIT_WIZARD: &str = "professional_profile_edit";

fn account_step(config: &WizardConfig) -> StepDefinition {
    StepDefinition::new("account")
        .title("Account")
        .field(
            FieldSpec::text(fields::EMAIL)
                .label("Email")
                .rule(FieldRule::required())
                .rule(FieldRule::email()),
        )
        .field(
            FieldSpec::text(fields::PASSWORD)
                .label("Password")
                .transient()
                .rule(FieldRule::required())
                .rule(FieldRule::min_length(config.min_password_len)),
        )
        .field(
            FieldSpec::text(fields::CONFIRM_PASSWORD)
                .label("Password confirmation")
                .transient()
                .rule(FieldRule::required()),
        )
        .field(
            FieldSpec::flag(fields::ACCEPT_TERMS)
                .default_value(FieldValue::Flag(false))
                .rule(FieldRule::required().with_message("You must accept the terms of service")),
        )
        .cross_rule(
            fields::CONFIRM_PASSWORD,
            FieldRule::custom("matches_password", |value, snapshot| {
                value == snapshot.get(fields::PASSWORD)
            })
            .with_message("Passwords do not match"),
        )
}

fn profile_step(config: &WizardConfig) -> StepDefinition {
    StepDefinition::new("profile")
        .title("Profile")
        .field(
            FieldSpec::text(fields::FULL_NAME)
                .label("Full name")
                .rule(FieldRule::required()),
        )
        .field(
            FieldSpec::text(fields::BIO)
                .label("Bio")
                .rule(FieldRule::required())
                .rule(FieldRule::min_length(config.min_bio_len)),
        )
        .field(
            FieldSpec::text_set(fields::SPECIALIZATIONS)
                .label("Specializations")
                .rule(FieldRule::non_empty_collection()),
        )
        .field(FieldSpec::record(fields::PHOTO).label("Profile photo"))
}

fn practice_step() -> StepDefinition {
    StepDefinition::new("practice")
        .title("Practice")
        .field(
            FieldSpec::text_set(fields::CONSULTATION_TYPES)
                .label("Consultation types")
                .rule(FieldRule::non_empty_collection()),
        )
        .field(
            FieldSpec::text_set(fields::SERVICES)
                .label("Services")
                .rule(FieldRule::non_empty_collection()),
        )
        .field(
            FieldSpec::text_set(fields::WORK_DAYS)
                .label("Work days")
                .rule(FieldRule::non_empty_collection()),
        )
        .field(FieldSpec::text(fields::OFFICE_ADDRESS).label("Office address"))
        .cross_rule(
            fields::OFFICE_ADDRESS,
            FieldRule::custom("address_for_in_person", |value, snapshot| {
                let in_person = snapshot
                    .get(fields::CONSULTATION_TYPES)
                    .as_text_set()
                    .is_some_and(|types| types.contains(IN_PERSON));
                !in_person || !value.is_blank()
            })
            .with_message("In-person consultations need an office address"),
        )
}

fn credentials_step() -> StepDefinition {
    StepDefinition::new("credentials")
        .title("Credentials")
        .field(FieldSpec::text(fields::CATEGORY).label("Professional category"))
        .field(
            FieldSpec::record(fields::ID_DOCUMENT)
                .label("ID document")
                .rule(FieldRule::required()),
        )
        .field(FieldSpec::record(fields::DEGREE_CERTIFICATE).label("Degree certificate"))
        .field(FieldSpec::record(fields::PROFESSIONAL_LICENSE).label("Professional license"))
        .field(FieldSpec::record(fields::TECHNICAL_CERTIFICATE).label("Technical certificate"))
        .conditional(
            ConditionalRequirementSet::new(fields::CATEGORY)
                .choice(
                    categories::NUTRITIONIST,
                    [fields::DEGREE_CERTIFICATE, fields::PROFESSIONAL_LICENSE],
                )
                .choice(
                    categories::DIETETIC_TECHNICIAN,
                    [fields::TECHNICAL_CERTIFICATE],
                )
                .with_unset_message("Choose your professional category before uploading documents")
                .with_unknown_message("Unsupported professional category"),
        )
}

/// Registration wizard: account, profile, practice, credentials.
pub fn onboarding(config: &WizardConfig) -> Result<WizardDefinition, DefinitionError> {
    let steps = vec![
        account_step(config),
        profile_step(config),
        practice_step(),
        credentials_step(),
    ];
    Ok(WizardDefinition::new(ONBOARDING_WIZARD, steps)?
        .with_fallback_message(config.rule_fallback_message.clone()))
}

/// Profile-edit wizard: the onboarding rules without the account step.
pub fn profile_edit(config: &WizardConfig) -> Result<WizardDefinition, DefinitionError> {
    let steps = vec![profile_step(config), practice_step(), credentials_step()];
    Ok(WizardDefinition::new(PROFILE_EDIT_WIZARD, steps)?
        .with_fallback_message(config.rule_fallback_message.clone()))
}
