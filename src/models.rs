//! Data models for open-event tracking and contact submissions
//!
//! This module contains the records persisted by the stores, the inbound
//! contact form shape, and the aggregate statistics served to the dashboard.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::InputValidator;

/// Label recorded when an identifier does not follow `<label-tokens>_<timestamp>`.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One recorded fetch of a tracking pixel.
///
/// Serialized with the wire names the dashboard already consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEvent {
    /// Opaque tracking identifier taken from the pixel URL
    #[serde(rename = "email_id")]
    pub identifier: String,
    /// Human-readable label derived from the identifier
    #[serde(rename = "institucion")]
    pub derived_label: String,
    /// When the store recorded the open
    #[serde(rename = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    /// Forwarded-for or peer address of the client
    #[serde(rename = "ip")]
    pub origin_address: String,
    /// Client `User-Agent` header, empty when absent
    #[serde(rename = "user_agent")]
    pub client_agent: String,
}

/// An open-event about to be inserted; the store assigns the timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOpenEvent {
    /// Opaque tracking identifier
    pub identifier: String,
    /// Label derived from the identifier
    pub derived_label: String,
    /// Client address
    pub origin_address: String,
    /// Client user agent
    pub client_agent: String,
}

impl NewOpenEvent {
    /// Build an open-event from raw request data, sanitizing every field and
    /// deriving the label from the cleaned identifier.
    #[must_use]
    pub fn from_request(identifier: &str, origin_address: &str, client_agent: &str) -> Self {
        let identifier = InputValidator::sanitize_identifier(identifier);
        let derived_label = derive_label(&identifier);
        Self {
            identifier,
            derived_label,
            origin_address: InputValidator::sanitize_header(origin_address),
            client_agent: InputValidator::sanitize_user_agent(client_agent),
        }
    }
}

/// Derive the display label encoded in a tracking identifier.
///
/// `acme-corp_board_1712000000` becomes `"Acme Corp Board"`: every token but
/// the last (the timestamp) is joined with spaces, hyphens become spaces, and
/// the result is title-cased. Identifiers without an underscore, or whose
/// label part is blank, yield [`UNKNOWN_LABEL`].
#[must_use]
pub fn derive_label(identifier: &str) -> String {
    let Some((label_part, _timestamp)) = identifier.rsplit_once('_') else {
        return UNKNOWN_LABEL.to_string();
    };

    let spaced = label_part.replace(['_', '-'], " ");
    if spaced.trim().is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    title_case(&spaced)
}

/// Upper-case each letter that follows a non-letter, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                result.extend(ch.to_lowercase());
            } else {
                result.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(ch);
            previous_is_letter = false;
        }
    }

    result
}

/// A stored contact-form entry awaiting follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    /// Surrogate key assigned by the store
    pub id: i64,
    /// Contact person's name
    pub contact_name: Option<String>,
    /// Contact person's email address
    pub contact_email: Option<String>,
    /// Organization or institution
    pub organization: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Preferred day for follow-up
    pub preferred_day: Option<String>,
    /// Preferred time window for follow-up
    pub preferred_window: Option<String>,
    /// When the store recorded the submission
    pub submitted_at: DateTime<Utc>,
}

/// A normalized submission ready for insertion.
///
/// Blank fields are `None`, so JSON and form posts with the same values
/// produce identical rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewContactSubmission {
    /// Contact person's name
    pub contact_name: Option<String>,
    /// Contact person's email address
    pub contact_email: Option<String>,
    /// Organization or institution
    pub organization: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Preferred day for follow-up
    pub preferred_day: Option<String>,
    /// Preferred time window for follow-up
    pub preferred_window: Option<String>,
}

/// Contact form as posted by the landing page, as JSON, urlencoded or
/// multipart.
///
/// Every field is optional. The Spanish keys used by the landing page form
/// are accepted as aliases, and JSON scalars (e.g. a numeric phone) are
/// taken as their textual form. A value that cannot be read as text only
/// drops that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    /// Contact person's name
    pub contact_name: Option<String>,
    /// Contact person's email address
    pub contact_email: Option<String>,
    /// Organization or institution
    pub organization: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Preferred day for follow-up
    pub preferred_day: Option<String>,
    /// Preferred time window for follow-up
    pub preferred_window: Option<String>,
}

/// Accepted keys per field, in order of precedence.
const CONTACT_NAME_KEYS: &[&str] = &["contact_name", "nombre"];
const CONTACT_EMAIL_KEYS: &[&str] = &["contact_email", "email"];
const ORGANIZATION_KEYS: &[&str] = &["organization", "institucion"];
const PHONE_KEYS: &[&str] = &["phone", "telefono"];
const PREFERRED_DAY_KEYS: &[&str] = &["preferred_day", "dia_preferido", "dia"];
const PREFERRED_WINDOW_KEYS: &[&str] = &["preferred_window", "horario_preferido", "horario"];

impl ContactForm {
    /// Build a form from raw `(key, value)` pairs.
    ///
    /// For each field the first accepted key carrying a non-blank value wins;
    /// repeated keys keep their first value and unknown keys are ignored.
    #[must_use]
    pub fn from_fields<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values: HashMap<String, String> = HashMap::new();
        for (key, value) in fields {
            if !value.trim().is_empty() {
                values.entry(key).or_insert(value);
            }
        }

        let pick = |keys: &[&str]| keys.iter().find_map(|key| values.get(*key).cloned());
        Self {
            contact_name: pick(CONTACT_NAME_KEYS),
            contact_email: pick(CONTACT_EMAIL_KEYS),
            organization: pick(ORGANIZATION_KEYS),
            phone: pick(PHONE_KEYS),
            preferred_day: pick(PREFERRED_DAY_KEYS),
            preferred_window: pick(PREFERRED_WINDOW_KEYS),
        }
    }

    /// Normalize the posted values into an insertable submission.
    #[must_use]
    pub fn into_submission(self) -> NewContactSubmission {
        let clean = |value: Option<String>| value.and_then(|v| InputValidator::sanitize_field(&v));
        NewContactSubmission {
            contact_name: clean(self.contact_name),
            contact_email: clean(self.contact_email),
            organization: clean(self.organization),
            phone: clean(self.phone),
            preferred_day: clean(self.preferred_day),
            preferred_window: clean(self.preferred_window),
        }
    }
}

impl<'de> Deserialize<'de> for ContactForm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = ContactForm;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of contact form fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                // Read in body order so repeated keys keep their first value.
                let mut fields = Vec::new();
                while let Some((key, LenientText(value))) = map.next_entry::<String, LenientText>()? {
                    if let Some(text) = value {
                        fields.push((key, text));
                    }
                }
                Ok(ContactForm::from_fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// A form value read as text: strings, numbers and booleans are kept,
/// anything else (null, objects, arrays) reads as absent.
struct LenientText(Option<String>);

impl<'de> Deserialize<'de> for LenientText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            Text(String),
            Integer(i64),
            Float(f64),
            Flag(bool),
            Other(IgnoredAny),
        }

        Ok(Self(match Scalar::deserialize(deserializer)? {
            Scalar::Text(text) => Some(text),
            Scalar::Integer(n) => Some(n.to_string()),
            Scalar::Float(n) => Some(n.to_string()),
            Scalar::Flag(b) => Some(b.to_string()),
            Scalar::Other(_) => None,
        }))
    }
}

/// Aggregate open statistics plus the most-recent-first listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenStats {
    /// Number of open-events recorded
    #[serde(rename = "total_aperturas")]
    pub total_opens: i64,
    /// Number of distinct identifiers seen
    #[serde(rename = "emails_unicos")]
    pub unique_identifiers: i64,
    /// Opens per identifier, rounded to one decimal
    #[serde(rename = "promedio_aperturas")]
    pub average_opens: f64,
    /// Every open-event, newest first
    #[serde(rename = "aperturas")]
    pub opens: Vec<OpenEvent>,
}

impl OpenStats {
    /// Assemble stats from raw counts, computing the average.
    #[must_use]
    pub fn new(total_opens: i64, unique_identifiers: i64, opens: Vec<OpenEvent>) -> Self {
        Self {
            total_opens,
            unique_identifiers,
            average_opens: average_opens(total_opens, unique_identifiers),
            opens,
        }
    }
}

/// `total / unique` rounded to one decimal (halves to even), `0.0` when
/// nothing is unique.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_opens(total: i64, unique: i64) -> f64 {
    if unique <= 0 {
        return 0.0;
    }
    let average = total as f64 / unique as f64;
    (average * 10.0).round_ties_even() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_from_multi_token_identifier() {
        assert_eq!(derive_label("a_b_c_1712000000"), "A B C");
        assert_eq!(derive_label("acme-corp_1712000000"), "Acme Corp");
        assert_eq!(derive_label("UNIVERSIDAD-central_rector_99"), "Universidad Central Rector");
    }

    #[test]
    fn label_fallbacks() {
        assert_eq!(derive_label("nounderscore"), UNKNOWN_LABEL);
        assert_eq!(derive_label(""), UNKNOWN_LABEL);
        assert_eq!(derive_label("_1712000000"), UNKNOWN_LABEL);
        assert_eq!(derive_label("--_1"), UNKNOWN_LABEL);
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("o'neil 3rd"), "O'Neil 3Rd");
        assert_eq!(title_case("ÁRBOL verde"), "Árbol Verde");
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        assert!((average_opens(3, 3) - 1.0).abs() < f64::EPSILON);
        assert!((average_opens(7, 3) - 2.3).abs() < f64::EPSILON);
        assert!((average_opens(5, 3) - 1.7).abs() < f64::EPSILON);
        assert!(average_opens(4, 0).abs() < f64::EPSILON);
        assert!(average_opens(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_rounds_halves_to_even() {
        assert!((average_opens(5, 4) - 1.2).abs() < f64::EPSILON);
        assert!((average_opens(15, 4) - 3.8).abs() < f64::EPSILON);
    }

    #[test]
    fn form_accepts_spanish_aliases_and_scalars() {
        let form: ContactForm = serde_json::from_str(
            r#"{"nombre": "Ana", "institucion": "ITSE", "telefono": 5551234, "dia": "lunes"}"#,
        )
        .unwrap();
        let submission = form.into_submission();
        assert_eq!(submission.contact_name.as_deref(), Some("Ana"));
        assert_eq!(submission.organization.as_deref(), Some("ITSE"));
        assert_eq!(submission.phone.as_deref(), Some("5551234"));
        assert_eq!(submission.preferred_day.as_deref(), Some("lunes"));
        assert_eq!(submission.preferred_window, None);
    }

    #[test]
    fn unreadable_value_only_drops_that_field() {
        let form: ContactForm = serde_json::from_str(
            r#"{"nombre": "Ana", "telefono": {"x": 1}, "institucion": ["a", "b"], "email": "ana@example.org"}"#,
        )
        .unwrap();
        assert_eq!(form.contact_name.as_deref(), Some("Ana"));
        assert_eq!(form.contact_email.as_deref(), Some("ana@example.org"));
        assert_eq!(form.phone, None);
        assert_eq!(form.organization, None);
    }

    #[test]
    fn alias_and_canonical_key_together() {
        let form: ContactForm = serde_json::from_str(
            r#"{"nombre": "Ana", "dia": "martes", "dia_preferido": "lunes", "horario": "tarde"}"#,
        )
        .unwrap();
        assert_eq!(form.contact_name.as_deref(), Some("Ana"));
        assert_eq!(form.preferred_day.as_deref(), Some("lunes"));
        assert_eq!(form.preferred_window.as_deref(), Some("tarde"));
    }

    #[test]
    fn from_fields_prefers_first_non_blank_key() {
        let form = ContactForm::from_fields([
            ("contact_name".to_string(), "  ".to_string()),
            ("nombre".to_string(), "Luis".to_string()),
            ("nombre".to_string(), "Otro".to_string()),
            ("unknown".to_string(), "ignored".to_string()),
        ]);
        assert_eq!(form.contact_name.as_deref(), Some("Luis"));
        assert_eq!(form.organization, None);
    }

    #[test]
    fn blank_fields_become_none() {
        let form: ContactForm =
            serde_json::from_str(r#"{"contact_name": "   ", "phone": null, "contact_email": ""}"#)
                .unwrap();
        assert_eq!(form.into_submission(), NewContactSubmission::default());
    }

    #[test]
    fn stats_serialize_with_dashboard_names() {
        let stats = OpenStats::new(0, 0, Vec::new());
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["total_aperturas"], 0);
        assert_eq!(value["emails_unicos"], 0);
        assert_eq!(value["promedio_aperturas"], 0.0);
        assert!(value["aperturas"].as_array().unwrap().is_empty());
    }
}
