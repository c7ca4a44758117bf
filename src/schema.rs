//! The tender extraction schema and its derived output contracts.
//!
//! Everything the pipeline asks a model to produce is defined here: the fixed
//! [`TenderRecord`] shape, the enumerated scalar-field accessor table driving the
//! deterministic merge and the channel template, and the OCR annotation schemas
//! (compile-time default plus runtime question sets).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Structured facts describing one tender.
///
/// Every scalar field defaults to the empty string; absence is always represented
/// by the empty value, never by null, so merge rules can test emptiness directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TenderRecord {
    /// Name of the procurement (the product or service being purchased).
    pub procurement_name: String,
    /// Customer or buyer information (company name).
    pub customer_company_name: String,
    /// Notice number.
    pub notice_number: String,
    /// Date the procurement was published and the application submission deadline (date and time).
    pub submission_deadline: String,
    /// Department receiving the delivery.
    pub delivery_department: String,
    /// Initial maximum price including VAT.
    pub initial_max_price_with_vat: String,
    /// Application security requirements.
    pub application_security: String,
    /// Re-bidding date.
    pub re_bidding_date: String,
    /// Electronic trading platform hosting the procurement.
    pub etp_platform: String,
    /// Date and time when application review ends.
    pub application_review_deadline: String,
    /// Date when the results are finalized.
    pub results_summary_date: String,
    /// Contract security requirements.
    pub contract_security: String,
    /// Price of participation in the procurement.
    pub participation_price: String,
    /// Product warranty requirements.
    pub warranty_requirements: String,
    /// Required delivery period.
    pub required_delivery_period: String,
    /// Payment terms.
    pub payment_terms: String,
    /// Names of the documents required to carry out the delivery.
    pub delivery_documents_names: String,
    /// How the delivery will be carried out.
    pub delivery_method: String,
    /// Overall product dimensions.
    pub product_dimensions: String,
    /// Intended purpose of the product.
    pub product_purpose: String,
    /// Contract validity period.
    pub contract_term: String,
    /// Delivery address.
    pub delivery_address: String,
    /// Lots the procurement is divided into.
    pub lots: Vec<LotInfo>,
    /// Contact persons listed in the documentation.
    pub contact_persons: Vec<ContactPerson>,
}

/// One lot within a tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LotInfo {
    /// Name of the lot.
    pub name: String,
    /// Initial maximum price for the lot.
    pub initial_max_price: String,
    /// Currency of the lot price.
    pub currency: String,
    /// Quantity of goods in the lot.
    pub quantity: String,
}

/// One contact person listed in the tender documentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ContactPerson {
    /// Full name.
    pub full_name: String,
    /// Phone number.
    pub phone_number: String,
    /// E-mail address.
    pub email: String,
    /// Position within the customer organization.
    pub position: String,
}

impl TenderRecord {
    /// True when every scalar field is empty and both lists are empty.
    pub fn is_empty(&self) -> bool {
        SCALAR_FIELDS.iter().all(|field| (field.get)(self).is_empty())
            && self.lots.is_empty()
            && self.contact_persons.is_empty()
    }
}

impl LotInfo {
    /// True when no lot field carries a value.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.initial_max_price.is_empty()
            && self.currency.is_empty()
            && self.quantity.is_empty()
    }
}

impl ContactPerson {
    /// True when no contact field carries a value.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_empty()
            && self.phone_number.is_empty()
            && self.email.is_empty()
            && self.position.is_empty()
    }
}

/// Accessor, mutator, and channel caption for one scalar field of [`TenderRecord`].
///
/// The merge routines and the channel template iterate this table instead of
/// reflecting over fields; the table order is the fixed caption order of the
/// rendered message.
pub struct ScalarField {
    /// JSON field name.
    pub name: &'static str,
    /// Emoji-prefixed caption used by the channel template.
    pub caption: &'static str,
    /// Borrow the field's current value.
    pub get: fn(&TenderRecord) -> &str,
    /// Replace the field's value.
    pub set: fn(&mut TenderRecord, String),
}

macro_rules! scalar_field {
    ($field:ident, $caption:expr) => {
        ScalarField {
            name: stringify!($field),
            caption: $caption,
            get: |record| record.$field.as_str(),
            set: |record, value| record.$field = value,
        }
    };
}

/// Every scalar field of [`TenderRecord`], in channel caption order.
pub const SCALAR_FIELDS: [ScalarField; 22] = [
    scalar_field!(procurement_name, "📦 *Procurement name*"),
    scalar_field!(customer_company_name, "🏢 *Customer*"),
    scalar_field!(notice_number, "📄 *Notice number*"),
    scalar_field!(submission_deadline, "🗓️ *Submission deadline*"),
    scalar_field!(delivery_department, "🚚 *Delivery department*"),
    scalar_field!(initial_max_price_with_vat, "💰 *Initial maximum price (incl. VAT)*"),
    scalar_field!(application_security, "🔐 *Application security*"),
    scalar_field!(re_bidding_date, "🔄 *Re-bidding date*"),
    scalar_field!(etp_platform, "🌐 *Trading platform*"),
    scalar_field!(application_review_deadline, "📅 *Application review deadline*"),
    scalar_field!(results_summary_date, "📊 *Results date*"),
    scalar_field!(contract_security, "📜 *Contract security*"),
    scalar_field!(participation_price, "💲 *Participation price*"),
    scalar_field!(warranty_requirements, "🛠️ *Warranty requirements*"),
    scalar_field!(required_delivery_period, "⏱️ *Delivery period*"),
    scalar_field!(payment_terms, "💳 *Payment terms*"),
    scalar_field!(delivery_documents_names, "📄 *Delivery documents*"),
    scalar_field!(delivery_method, "📦 *Delivery method*"),
    scalar_field!(product_dimensions, "📏 *Product dimensions*"),
    scalar_field!(product_purpose, "🎯 *Product purpose*"),
    scalar_field!(contract_term, "🗓️ *Contract term*"),
    scalar_field!(delivery_address, "📍 *Delivery address*"),
];

/// JSON schema for [`TenderRecord`], handed to providers as the structured-output contract.
pub fn record_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(TenderRecord))
        .unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Default document-level annotation extracted alongside OCR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DocumentAnnotation {
    /// Title of the document.
    pub title: String,
    /// Short summary of the document.
    pub summary: String,
    /// Question/answer pairs the model chose to surface.
    pub questions: Vec<QueryAnswer>,
}

/// One question/answer pair within a [`DocumentAnnotation`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueryAnswer {
    /// Question posed about the document.
    pub query: String,
    /// Answer to the question, when the document provides one.
    pub answer: Option<String>,
}

/// Classification attached to one OCR-detected image region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageAnnotation {
    /// Kind of content the region holds.
    pub image_type: ImageKind,
    /// Description of the image.
    pub description: String,
}

/// Content kinds an OCR image region can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Chart or plot.
    Graph,
    /// Rendered text block.
    Text,
    /// Tabular data.
    Table,
    /// Photograph or drawing.
    Image,
}

/// JSON schema for the default OCR document annotation.
pub fn document_annotation_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(DocumentAnnotation))
        .unwrap_or_else(|_| json!({ "type": "object" }))
}

/// JSON schema for OCR image-region annotations.
pub fn image_annotation_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(ImageAnnotation))
        .unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Ad-hoc question list turned into a runtime document-annotation schema.
///
/// The schema is an object with one nullable string property per question; answers
/// are validated generically against that mapping rather than against a
/// compile-time type.
#[derive(Debug, Clone)]
pub struct QuestionSet {
    questions: Vec<String>,
}

/// One question paired with the answer extracted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// The question as supplied by the caller.
    pub question: String,
    /// The extracted answer, absent when the model produced none.
    pub answer: Option<String>,
}

impl QuestionSet {
    /// Wrap an ordered list of question texts.
    pub fn new(questions: Vec<String>) -> Self {
        Self { questions }
    }

    /// True when no questions were supplied.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn field_name(index: usize) -> String {
        format!("question_{}_answer", index + 1)
    }

    /// Build the runtime JSON schema covering every question.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        for (index, question) in self.questions.iter().enumerate() {
            properties.insert(
                Self::field_name(index),
                json!({
                    "type": ["string", "null"],
                    "description": format!("Answer the following question: {question}"),
                }),
            );
        }
        json!({
            "title": "QuestionAnswers",
            "type": "object",
            "properties": Value::Object(properties),
            "additionalProperties": false,
        })
    }

    /// Validate a raw model response against the question mapping.
    ///
    /// Unknown properties are ignored; a missing, null, or empty property yields an
    /// absent answer for that question.
    pub fn parse_answers(&self, raw: &str) -> Result<Vec<QuestionAnswer>, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(raw)?;
        Ok(self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let answer = fields
                    .get(&Self::field_name(index))
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
                    .map(ToString::to_string);
                QuestionAnswer {
                    question: question.clone(),
                    answer,
                }
            })
            .collect())
    }
}
