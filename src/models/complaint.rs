use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity assigned to a citizen complaint
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display,
)]
pub enum SeverityLabel {
    /// Needs prompt attention
    #[serde(rename = "GRAVE")]
    #[strum(serialize = "GRAVE")]
    Grave,

    /// Everything else, including complaints tagged LEVE in the source data
    #[serde(rename = "MODERADO")]
    #[strum(serialize = "MODERADO")]
    Moderado,
}

impl SeverityLabel {
    /// All labels in class-index order
    pub const ALL: [SeverityLabel; 2] = [SeverityLabel::Grave, SeverityLabel::Moderado];

    /// Number of classes the classifier distinguishes
    pub const COUNT: usize = 2;

    /// Collapse a raw dataset label into the binary label set.
    ///
    /// Accepts `GRAVE`, `MODERADO` and `LEVE` (folded into `MODERADO`),
    /// ignoring surrounding whitespace and case.
    pub fn binarize(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "GRAVE" => Ok(SeverityLabel::Grave),
            "MODERADO" | "LEVE" => Ok(SeverityLabel::Moderado),
            "" => Err(TriageError::Label("severity label is empty".to_string())),
            other => Err(TriageError::Label(format!(
                "unexpected severity label '{}' (expected GRAVE, MODERADO or LEVE)",
                other
            ))),
        }
    }

    /// Class index used by the feature matrix and the models
    pub fn index(&self) -> usize {
        match self {
            SeverityLabel::Grave => 0,
            SeverityLabel::Moderado => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_grave(&self) -> bool {
        matches!(self, SeverityLabel::Grave)
    }
}

/// Self-reported urgency of the complaint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum UrgencyLevel {
    #[strum(serialize = "No urgente")]
    NoUrgente,
    #[strum(serialize = "Moderada")]
    Moderada,
    #[strum(serialize = "Urgente")]
    Urgente,
}

impl UrgencyLevel {
    /// Parse the free-text urgency column; unknown values yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "no urgente" => Some(UrgencyLevel::NoUrgente),
            "moderada" => Some(UrgencyLevel::Moderada),
            "urgente" => Some(UrgencyLevel::Urgente),
            _ => None,
        }
    }

    /// Numeric code: 0 (no urgente), 1 (moderada), 2 (urgente)
    pub fn code(&self) -> f64 {
        match self {
            UrgencyLevel::NoUrgente => 0.0,
            UrgencyLevel::Moderada => 1.0,
            UrgencyLevel::Urgente => 2.0,
        }
    }

    /// Code for raw text, falling back to 0 for missing or unknown values
    pub fn code_for(raw: Option<&str>) -> f64 {
        raw.and_then(Self::parse).map(|u| u.code()).unwrap_or(0.0)
    }
}

/// One citizen report, as read from the training CSV
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRecord {
    /// Free-text complaint; missing values are read as an empty string
    pub comment: String,

    pub city: Option<String>,

    /// Missing or unparseable ages are imputed with the training median
    pub age: Option<u32>,

    pub gender: Option<String>,

    /// Self-reported urgency ("No urgente" / "Moderada" / "Urgente")
    pub urgency: Option<String>,

    pub rural: Option<bool>,

    pub internet_access: Option<bool>,

    /// Whether the government attended the problem before
    pub prior_attention: Option<bool>,

    pub category: Option<String>,

    /// Training target; always present for training rows, absent at inference
    pub severity: Option<SeverityLabel>,
}

impl ComplaintRecord {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, severity: SeverityLabel) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = Some(urgency.into());
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }
}

/// Prediction-time input.
///
/// Every attribute except the comment has a default, so a caller that only
/// knows the text of a complaint can still ask for a prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintInput {
    pub comment: String,
    pub city: String,
    /// `None` falls back to the median age seen during training
    pub age: Option<u32>,
    pub gender: String,
    pub urgency: String,
    pub rural: bool,
    pub internet_access: bool,
    pub prior_attention: bool,
    pub category: String,
}

impl ComplaintInput {
    pub const DEFAULT_CITY: &'static str = "Bogotá";
    pub const DEFAULT_AGE: u32 = 35;
    pub const DEFAULT_GENDER: &'static str = "M";
    pub const DEFAULT_URGENCY: &'static str = "No urgente";
    pub const DEFAULT_CATEGORY: &'static str = "Salud";

    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            city: Self::DEFAULT_CITY.to_string(),
            age: Some(Self::DEFAULT_AGE),
            gender: Self::DEFAULT_GENDER.to_string(),
            urgency: Self::DEFAULT_URGENCY.to_string(),
            rural: false,
            internet_access: true,
            prior_attention: true,
            category: Self::DEFAULT_CATEGORY.to_string(),
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_age(mut self, age: Option<u32>) -> Self {
        self.age = age;
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = urgency.into();
        self
    }

    pub fn with_rural(mut self, rural: bool) -> Self {
        self.rural = rural;
        self
    }

    pub fn with_internet_access(mut self, internet_access: bool) -> Self {
        self.internet_access = internet_access;
        self
    }

    pub fn with_prior_attention(mut self, prior_attention: bool) -> Self {
        self.prior_attention = prior_attention;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Unlabelled record carrying the same attributes
    pub fn to_record(&self) -> ComplaintRecord {
        ComplaintRecord {
            comment: self.comment.clone(),
            city: Some(self.city.clone()),
            age: self.age,
            gender: Some(self.gender.clone()),
            urgency: Some(self.urgency.clone()),
            rural: Some(self.rural),
            internet_access: Some(self.internet_access),
            prior_attention: Some(self.prior_attention),
            category: Some(self.category.clone()),
            severity: None,
        }
    }
}

impl From<&ComplaintRecord> for ComplaintInput {
    fn from(record: &ComplaintRecord) -> Self {
        Self {
            comment: record.comment.clone(),
            city: record
                .city
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_CITY.to_string()),
            age: record.age,
            gender: record
                .gender
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_GENDER.to_string()),
            urgency: record
                .urgency
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_URGENCY.to_string()),
            rural: record.rural.unwrap_or(false),
            internet_access: record.internet_access.unwrap_or(true),
            prior_attention: record.prior_attention.unwrap_or(true),
            category: record
                .category
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_CATEGORY.to_string()),
        }
    }
}
