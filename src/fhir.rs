//! FHIR R4 subset used for structured clinical extraction.
//!
//! Only the resources and datatypes the extraction prompt can realistically
//! populate are modeled: `Patient`, `Observation`, `Condition`, and
//! `MedicationStatement`, wrapped in a document [`Bundle`]. Field names follow
//! FHIR's camelCase on the wire. Every type derives [`schemars::JsonSchema`]
//! so the chat call can demand strictly schema-conforming output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Measured amount with optional comparator and unit coding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    /// Numerical value of the measurement.
    pub value: Option<f64>,
    /// How the value should be understood relative to the stated number.
    pub comparator: Option<QuantityComparator>,
    /// Human-readable unit.
    pub unit: Option<String>,
    /// System that defines the coded unit form.
    pub system: Option<String>,
    /// Coded form of the unit.
    pub code: Option<String>,
}

/// Allowed comparator values on a [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum QuantityComparator {
    /// Actual value is less than the stated value.
    #[serde(rename = "<")]
    LessThan,
    /// Actual value is less than or equal to the stated value.
    #[serde(rename = "<=")]
    LessOrEqual,
    /// Actual value is greater than or equal to the stated value.
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// Actual value is greater than the stated value.
    #[serde(rename = ">")]
    GreaterThan,
    /// Value is "sufficient to achieve" the stated quantity.
    #[serde(rename = "ad")]
    Ad,
}

/// Reference to a code defined by a terminology system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coding {
    /// Identity of the terminology system (LOINC, SNOMED CT, ...).
    pub system: String,
    /// Symbol in the system's syntax.
    pub code: String,
    /// Representation defined by the system.
    pub display: Option<String>,
}

/// Concept defined by one or more codings plus optional free text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CodeableConcept {
    /// Codes defined by terminology systems.
    #[serde(default)]
    pub coding: Vec<Coding>,
    /// Plain-text representation of the concept.
    pub text: Option<String>,
}

/// Business identifier attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Identifier {
    /// Namespace for the identifier value.
    pub system: Option<String>,
    /// Identifier value, unique within its system.
    pub value: String,
}

/// Name of a person, split into parts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HumanName {
    /// Full text representation of the name.
    pub text: Option<String>,
    /// Family (surname) portion.
    pub family: Option<String>,
    /// Given names, in order.
    #[serde(default)]
    pub given: Option<Vec<String>>,
    /// Parts that come before the name, such as honorifics.
    #[serde(default)]
    pub prefix: Option<Vec<String>>,
    /// Parts that come after the name.
    #[serde(default)]
    pub suffix: Option<Vec<String>>,
}

/// Postal address.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Full text representation of the address.
    pub text: Option<String>,
    /// Street name, number, and similar line content.
    #[serde(default)]
    pub line: Option<Vec<String>>,
    /// City or town name.
    pub city: Option<String>,
    /// Sub-unit of the country.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country name or code.
    pub country: Option<String>,
}

/// How a medication is or was taken.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Dosage {
    /// Free-text dosage instructions.
    pub text: Option<String>,
    /// When the medication should be administered.
    pub timing: Option<CodeableConcept>,
    /// How the medication enters the body.
    pub route: Option<CodeableConcept>,
    /// Technique for administering the medication.
    pub method: Option<CodeableConcept>,
}

/// Administrative gender values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Other.
    Other,
    /// Unknown.
    Unknown,
}

/// Status values for an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationStatus {
    /// Registered, no result yet.
    Registered,
    /// Preliminary result.
    Preliminary,
    /// Final result.
    Final,
    /// Amended after being final.
    Amended,
    /// Corrected after being final.
    Corrected,
    /// Cancelled before completion.
    Cancelled,
    /// Entered in error.
    EnteredInError,
    /// Status unknown.
    Unknown,
}

/// Status values for a [`MedicationStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MedicationStatementStatus {
    /// Statement is recorded as fact.
    Recorded,
    /// Entered in error.
    EnteredInError,
    /// Draft statement.
    Draft,
}

/// Demographics for the subject of the document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Business identifiers for the patient.
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    /// Names associated with the patient.
    #[serde(default)]
    pub name: Vec<HumanName>,
    /// Administrative gender.
    pub gender: Option<Gender>,
    /// Date of birth, as written in the source.
    pub birth_date: Option<String>,
    /// Addresses for the patient.
    #[serde(default)]
    pub address: Vec<Address>,
}

/// A single measurement or assertion about the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Business identifiers for the observation.
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    /// Status of the result value.
    pub status: ObservationStatus,
    /// What was observed.
    pub code: CodeableConcept,
    /// Clinically relevant time of the observation.
    pub effective_date_time: Option<String>,
    /// Measured result.
    pub value_quantity: Option<Quantity>,
}

/// A clinical condition, problem, or diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Business identifiers for the condition.
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    /// Active/resolved clinical status.
    pub clinical_status: CodeableConcept,
    /// Identification of the condition.
    pub code: CodeableConcept,
    /// Estimated or actual onset time.
    pub onset_date_time: Option<String>,
}

/// Record of medication being taken by the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationStatement {
    /// Business identifiers for the statement.
    #[serde(default)]
    pub identifier: Vec<Identifier>,
    /// Whether the statement is recorded fact, draft, or an error.
    pub status: MedicationStatementStatus,
    /// What medication was taken.
    pub medication_codeable_concept: Option<CodeableConcept>,
    /// When the medication was or is being taken.
    pub effective_date_time: Option<String>,
    /// Dosage details.
    #[serde(default)]
    pub dosage: Vec<Dosage>,
}

/// Bundle entry, discriminated by the `resourceType` field.
///
/// Exhaustive matching is required wherever entries are consumed; adding a
/// resource type here forces every consumption site to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "resourceType")]
pub enum Resource {
    /// Patient demographics.
    Patient(Patient),
    /// Measurement or assertion.
    Observation(Observation),
    /// Condition, problem, or diagnosis.
    Condition(Condition),
    /// Medication usage record.
    MedicationStatement(MedicationStatement),
}

/// Literal `"Bundle"` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BundleResourceType {
    /// The only permitted value.
    Bundle,
}

/// Literal `"document"` bundle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    /// Document bundle.
    Document,
}

/// Root container produced once per extracted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Bundle {
    /// Always `"Bundle"`.
    #[serde(rename = "resourceType")]
    pub resource_type: BundleResourceType,
    /// Always `"document"`.
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    /// When the bundle was assembled.
    pub timestamp: String,
    /// Document-level codings.
    #[serde(default)]
    pub coding: Vec<Coding>,
    /// Ordered entries extracted from the document.
    #[serde(default)]
    pub entry: Vec<Resource>,
}
