use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::api::models::{MeetingInput, MeetingOutcome, PropertyPatch};
use crate::error::{ApiError, FieldErrors};

/// Two-letter codes accepted for the `state` property.
pub const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("PR", "Puerto Rico"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Formats raw input as `NNN-NNN-NNNN`, dropping anything past ten digits.
pub fn format_phone(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).take(10).collect();
    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("{}-{}", &digits[..3], &digits[3..]),
        _ => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let bytes = phone.as_bytes();
    let shaped = bytes.len() == 12
        && bytes.iter().enumerate().all(|(i, b)| match i {
            3 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if shaped {
        Ok(())
    } else {
        Err(invalid("phone", "Phone must look like 555-555-5555"))
    }
}

fn validate_state(state: &str) -> Result<(), ValidationError> {
    if US_STATES.iter().any(|(code, _)| *code == state) {
        Ok(())
    } else {
        Err(invalid("state", "Select a state"))
    }
}

fn validate_zip(zip: &str) -> Result<(), ValidationError> {
    let (five, plus_four) = match zip.split_once('-') {
        Some((five, four)) => (five, Some(four)),
        None => (zip, None),
    };
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    if digits(five, 5) && plus_four.is_none_or(|four| digits(four, 4)) {
        Ok(())
    } else {
        Err(invalid("zip", "Enter a 5 digit ZIP code"))
    }
}

fn validate_optional_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() { Ok(()) } else { validate_phone(phone) }
}

fn validate_optional_state(state: &str) -> Result<(), ValidationError> {
    if state.is_empty() { Ok(()) } else { validate_state(state) }
}

fn validate_optional_zip(zip: &str) -> Result<(), ValidationError> {
    if zip.is_empty() { Ok(()) } else { validate_zip(zip) }
}

/// First message per field.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        if let Some(first) = errs.first() {
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid {field}"));
            out.insert(field.to_string(), message);
        }
    }
    out
}

fn check<T: Validate>(form: &T) -> Result<(), ApiError> {
    form.validate()
        .map_err(|e| ApiError::validation(field_errors(&e)))
}

fn insert_trimmed(props: &mut PropertyPatch, name: &str, value: &str) {
    props.insert(name.to_string(), value.trim().to_string());
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CreateContactForm {
    #[validate(length(min = 1, message = "First name is required"))]
    pub firstname: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub lastname: String,
    pub jobtitle: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Store name is required"))]
    pub company: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(custom(function = "validate_state"))]
    pub state: String,
    #[validate(custom(function = "validate_zip"))]
    pub zip: String,
}

impl CreateContactForm {
    fn normalized(&self) -> Self {
        Self {
            firstname: self.firstname.trim().to_string(),
            lastname: self.lastname.trim().to_string(),
            jobtitle: self.jobtitle.trim().to_string(),
            email: self.email.trim().to_string(),
            company: self.company.trim().to_string(),
            phone: format_phone(&self.phone),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_ascii_uppercase(),
            zip: self.zip.trim().to_string(),
        }
    }

    /// Trims and formats the input, validates it and returns the contact
    /// properties to create.
    pub fn into_properties(self) -> Result<PropertyPatch, ApiError> {
        let form = self.normalized();
        check(&form)?;
        let mut props = PropertyPatch::new();
        insert_trimmed(&mut props, "firstname", &form.firstname);
        insert_trimmed(&mut props, "lastname", &form.lastname);
        if !form.jobtitle.is_empty() {
            insert_trimmed(&mut props, "jobtitle", &form.jobtitle);
        }
        insert_trimmed(&mut props, "email", &form.email);
        insert_trimmed(&mut props, "company", &form.company);
        insert_trimmed(&mut props, "phone", &form.phone);
        insert_trimmed(&mut props, "address", &form.address);
        insert_trimmed(&mut props, "city", &form.city);
        insert_trimmed(&mut props, "state", &form.state);
        insert_trimmed(&mut props, "zip", &form.zip);
        Ok(props)
    }
}

/// Only the store name is required on edit; the remaining fields may be
/// cleared, unlike on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EditContactForm {
    #[validate(length(min = 1, message = "Store name is required"))]
    pub company: String,
    #[validate(email(message = "Enter a valid email"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_optional_phone"))]
    pub phone: String,
    pub address: String,
    pub city: String,
    #[validate(custom(function = "validate_optional_state"))]
    pub state: String,
    #[validate(custom(function = "validate_optional_zip"))]
    pub zip: String,
}

impl EditContactForm {
    pub fn from_contact(contact: &crate::api::models::Contact) -> Self {
        let prop = |name: &str| contact.property(name).unwrap_or_default().to_string();
        Self {
            company: prop("company"),
            email: contact.property("email").map(str::to_string),
            phone: prop("phone"),
            address: prop("address"),
            city: prop("city"),
            state: prop("state"),
            zip: prop("zip"),
        }
    }

    pub fn into_properties(self) -> Result<PropertyPatch, ApiError> {
        let form = Self {
            company: self.company.trim().to_string(),
            email: self
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            phone: format_phone(&self.phone),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_ascii_uppercase(),
            zip: self.zip.trim().to_string(),
        };
        check(&form)?;
        let mut props = PropertyPatch::new();
        insert_trimmed(&mut props, "company", &form.company);
        insert_trimmed(&mut props, "email", form.email.as_deref().unwrap_or_default());
        insert_trimmed(&mut props, "phone", &form.phone);
        insert_trimmed(&mut props, "address", &form.address);
        insert_trimmed(&mut props, "city", &form.city);
        insert_trimmed(&mut props, "state", &form.state);
        insert_trimmed(&mut props, "zip", &form.zip);
        Ok(props)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct MeetingForm {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub body: String,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub outcome: String,
}

impl MeetingForm {
    pub fn into_input(self) -> Result<MeetingInput, ApiError> {
        let form = Self {
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
            ..self
        };
        check(&form)?;
        Ok(MeetingInput {
            title: form.title,
            body: form.body,
            timestamp: form.timestamp.unwrap_or_else(Utc::now),
            outcome: MeetingOutcome::parse(&form.outcome),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CreateContactForm {
        CreateContactForm {
            firstname: "Dana".into(),
            lastname: "Reyes".into(),
            jobtitle: String::new(),
            email: "dana@greenleaf.example".into(),
            company: "Green Leaf".into(),
            phone: "(213) 555 0199".into(),
            address: "1 Main St".into(),
            city: "Los Angeles".into(),
            state: "ca".into(),
            zip: "90013".into(),
        }
    }

    #[test]
    fn phone_mask_matches_input_behaviour() {
        assert_eq!(format_phone("21"), "21");
        assert_eq!(format_phone("2135"), "213-5");
        assert_eq!(format_phone("213555"), "213-555");
        assert_eq!(format_phone("2135550"), "213-555-0");
        assert_eq!(format_phone("(213) 555-0199 x12"), "213-555-0199");
    }

    #[test]
    fn valid_form_yields_normalized_properties() {
        let props = valid_form().into_properties().unwrap();
        assert_eq!(props["phone"], "213-555-0199");
        assert_eq!(props["state"], "CA");
        assert!(!props.contains_key("jobtitle"));
        assert_eq!(props.len(), 9);
    }

    #[test]
    fn invalid_fields_are_reported_per_field() {
        let form = CreateContactForm {
            firstname: "  ".into(),
            email: "not-an-email".into(),
            phone: "555".into(),
            state: "ZZ".into(),
            zip: "9001".into(),
            ..valid_form()
        };
        let err = form.into_properties().unwrap_err();
        let fields = err.field_errors().unwrap();

        assert_eq!(fields["firstname"], "First name is required");
        assert_eq!(fields["email"], "Enter a valid email");
        assert_eq!(fields["phone"], "Phone must look like 555-555-5555");
        assert_eq!(fields["state"], "Select a state");
        assert_eq!(fields["zip"], "Enter a 5 digit ZIP code");
        assert!(!fields.contains_key("company"));
    }

    #[test]
    fn zip_plus_four_is_accepted() {
        assert!(validate_zip("90013-1234").is_ok());
        assert!(validate_zip("90013-12").is_err());
    }

    #[test]
    fn edit_form_allows_blank_optional_fields() {
        let form = EditContactForm {
            company: "Green Leaf".into(),
            email: Some("  ".into()),
            ..Default::default()
        };
        let props = form.into_properties().unwrap();
        assert_eq!(props["phone"], "");
        assert_eq!(props["email"], "");
        assert_eq!(props["address"], "");
        assert_eq!(props["city"], "");
        assert_eq!(props["company"], "Green Leaf");

        let create = CreateContactForm {
            address: " ".into(),
            ..valid_form()
        };
        let fields = create.into_properties().unwrap_err();
        assert!(fields.field_errors().unwrap().contains_key("address"));

        let bad = EditContactForm {
            company: "Green Leaf".into(),
            email: Some("nope".into()),
            ..Default::default()
        };
        assert_eq!(bad.into_properties().unwrap_err().to_string(), "Enter a valid email");
    }

    #[test]
    fn meeting_form_requires_title() {
        let err = MeetingForm {
            title: " ".into(),
            ..Default::default()
        }
        .into_input()
        .unwrap_err();
        assert_eq!(err.to_string(), "Title is required");

        let input = MeetingForm {
            title: "Drop-off".into(),
            outcome: "completed".into(),
            ..Default::default()
        }
        .into_input()
        .unwrap();
        assert_eq!(input.outcome, MeetingOutcome::Completed);
    }
}
