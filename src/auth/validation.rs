//! Field rules shared by registration, admin edits and profile edits.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::FieldErrors;
use crate::identity::{
    IdentityStore, NewSellerProfile, SellerProfileChanges, StoreError, UniqueProbe,
};

const MAX_USERNAME_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 255;
const MAX_TEXT_LEN: usize = 255;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{8,15}$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Drops spaces and dashes so `012 345-678` and `012345678` are one number.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

pub fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", "The username field is required.");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("The username may not be greater than {MAX_USERNAME_LEN} characters."),
        );
    } else if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "The username may only contain letters, numbers, dots, dashes and underscores.",
        );
    }
}

pub fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if email.len() > MAX_EMAIL_LEN || !is_valid_email(email) {
        errors.add("email", "The email must be a valid email address.");
    }
}

pub fn check_phone(phone: &str, errors: &mut FieldErrors) {
    if phone.is_empty() {
        errors.add("phone", "The phone field is required.");
    } else if !PHONE_RE.is_match(phone) {
        errors.add("phone", "The phone must be 8 to 15 digits.");
    }
}

/// Advisory uniqueness check. The storage constraint remains authoritative.
pub async fn check_unique(
    store: &dyn IdentityStore,
    probe: UniqueProbe<'_>,
    errors: &mut FieldErrors,
) -> Result<(), StoreError> {
    for field in store.taken_fields(probe).await? {
        errors.add(field.as_str(), format!("The {} has already been taken.", field.as_str()));
    }
    Ok(())
}

/// Username, email and phone as supplied by an edit form, normalized.
/// `None` means the field was not submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactEdit {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactEdit {
    pub fn new(username: Option<&str>, email: Option<&str>, phone: Option<&str>) -> Self {
        Self {
            username: username.map(|u| u.trim().to_string()),
            email: email.map(normalize_email),
            phone: phone.map(normalize_phone),
        }
    }

    pub fn check(&self, errors: &mut FieldErrors) {
        if let Some(u) = &self.username {
            check_username(u, errors);
        }
        if let Some(e) = &self.email {
            check_email(e, errors);
        }
        if let Some(p) = &self.phone {
            check_phone(p, errors);
        }
    }

    /// Probe for the values this edit would claim on behalf of `owner`.
    pub fn probe(&self, owner: i64) -> UniqueProbe<'_> {
        UniqueProbe {
            username: self.username.as_deref(),
            email: self.email.as_deref(),
            phone: self.phone.as_deref(),
            except_id: Some(owner),
        }
    }
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Farm fields as submitted by a form. Absent and blank are distinct for edits:
/// absent keeps the stored value, blank clears an optional one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellerFields {
    pub farm_name: Option<String>,
    pub location_province: Option<String>,
    pub location_district: Option<String>,
    pub location_commune: Option<String>,
    pub location_village: Option<String>,
    pub description: Option<String>,
    pub certification: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
}

impl SellerFields {
    fn check_lengths(&self, errors: &mut FieldErrors) {
        let fields = [
            ("farm_name", &self.farm_name),
            ("location_province", &self.location_province),
            ("location_district", &self.location_district),
            ("location_commune", &self.location_commune),
            ("location_village", &self.location_village),
            ("certification", &self.certification),
            ("bank_name", &self.bank_name),
            ("bank_account_name", &self.bank_account_name),
            ("bank_account_number", &self.bank_account_number),
        ];
        for (name, value) in fields {
            if value.as_deref().is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
                errors.add(name, format!("The {name} may not be greater than {MAX_TEXT_LEN} characters."));
            }
        }
    }

    /// Full profile for a new seller; farm name and district are required.
    pub fn to_new_profile(&self, errors: &mut FieldErrors) -> Option<NewSellerProfile> {
        self.check_lengths(errors);
        let farm_name = trimmed(&self.farm_name);
        let location_district = trimmed(&self.location_district);
        if farm_name.is_none() {
            errors.add("farm_name", "The farm name field is required for sellers.");
        }
        if location_district.is_none() {
            errors.add("location_district", "The district field is required for sellers.");
        }
        Some(NewSellerProfile {
            farm_name: farm_name?,
            location_district: location_district?,
            location_province: trimmed(&self.location_province),
            location_commune: trimmed(&self.location_commune),
            location_village: trimmed(&self.location_village),
            description: trimmed(&self.description),
            certification: trimmed(&self.certification),
            bank_name: trimmed(&self.bank_name),
            bank_account_name: trimmed(&self.bank_account_name),
            bank_account_number: trimmed(&self.bank_account_number),
        })
    }

    /// Edits to an existing profile. Required fields cannot be blanked.
    pub fn to_changes(&self, errors: &mut FieldErrors) -> SellerProfileChanges {
        self.check_lengths(errors);
        let required = |name: &'static str, label: &str, v: &Option<String>, errors: &mut FieldErrors| {
            let value = v.as_ref()?;
            let t = value.trim();
            if t.is_empty() {
                errors.add(name, format!("The {label} field is required for sellers."));
                None
            } else {
                Some(t.to_string())
            }
        };
        let optional = |v: &Option<String>| v.as_ref().map(|_| trimmed(v));
        SellerProfileChanges {
            farm_name: required("farm_name", "farm name", &self.farm_name, errors),
            location_district: required("location_district", "district", &self.location_district, errors),
            location_province: optional(&self.location_province),
            location_commune: optional(&self.location_commune),
            location_village: optional(&self.location_village),
            description: optional(&self.description),
            certification: optional(&self.certification),
            bank_name: optional(&self.bank_name),
            bank_account_name: optional(&self.bank_account_name),
            bank_account_number: optional(&self.bank_account_number),
        }
    }
}
