use crate::error::{Result, TriageError};
use crate::ml::encoding::{CategoricalEncoders, LabelEncoder, StandardScaler};
use crate::ml::models::{DetectedFeatures, FeatureConfig, FeatureSet, UnseenCategory};
use crate::ml::text::{TextPreprocessor, Topic};
use crate::ml::vectorizer::TfidfVectorizer;
use crate::models::{ComplaintRecord, UrgencyLevel};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Population assumed for cities missing from the lookup table
pub const DEFAULT_CITY_POPULATION: f64 = 300_000.0;

/// Cities above this population count as large
pub const LARGE_CITY_THRESHOLD: f64 = 1_000_000.0;

/// Age used when neither the record nor the training data provide one
pub const FALLBACK_AGE: f64 = 35.0;

const CITY_POPULATIONS: &[(&str, f64)] = &[
    ("Bogotá", 8_000_000.0),
    ("Medellín", 2_500_000.0),
    ("Cali", 2_200_000.0),
    ("Barranquilla", 1_200_000.0),
    ("Cartagena", 1_000_000.0),
    ("Santa Marta", 500_000.0),
    ("Manizales", 400_000.0),
    ("Pereira", 470_000.0),
    ("Ibagué", 550_000.0),
    ("Pasto", 450_000.0),
    ("Montería", 460_000.0),
    ("Neiva", 350_000.0),
    ("Villavicencio", 530_000.0),
];

const NUMERIC_FEATURES: [&str; 6] = [
    "text_length",
    "word_count",
    "urgent_keywords",
    "urgency_code",
    "city_population",
    "age",
];

const BINARY_FEATURES: [&str; 10] = [
    "mentions_medical",
    "mentions_water",
    "mentions_security",
    "mentions_education",
    "large_city",
    "elderly",
    "young",
    "no_internet",
    "rural",
    "no_prior_attention",
];

const CATEGORICAL_FEATURES: [&str; 3] = ["city_encoded", "category_encoded", "gender_encoded"];

/// Population for a city name (case-insensitive), or the default bucket
pub fn city_population(city: Option<&str>) -> f64 {
    let Some(city) = city.map(str::trim) else {
        return DEFAULT_CITY_POPULATION;
    };
    let city = city.to_lowercase();

    CITY_POPULATIONS
        .iter()
        .find(|(name, _)| name.to_lowercase() == city)
        .map(|(_, population)| *population)
        .unwrap_or(DEFAULT_CITY_POPULATION)
}

/// Median of the known ages, or [`FALLBACK_AGE`] when there are none
pub fn median_age(records: &[ComplaintRecord]) -> f64 {
    let mut ages: Vec<u32> = records.iter().filter_map(|r| r.age).collect();
    if ages.is_empty() {
        return FALLBACK_AGE;
    }
    ages.sort_unstable();

    let mid = ages.len() / 2;
    if ages.len() % 2 == 0 {
        (ages[mid - 1] as f64 + ages[mid] as f64) / 2.0
    } else {
        ages[mid] as f64
    }
}

/// Engineered per-complaint features, before scaling and encoding
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub normalized_text: String,
    pub text_length: usize,
    pub word_count: usize,
    pub urgent_keywords: usize,
    pub mentions_medical: bool,
    pub mentions_water: bool,
    pub mentions_security: bool,
    pub mentions_education: bool,
    pub urgency_code: f64,
    pub city_population: f64,
    pub large_city: bool,
    pub age: f64,
    pub elderly: bool,
    pub young: bool,
    pub no_internet: bool,
    pub rural: bool,
    pub no_prior_attention: bool,
}

impl FeatureVector {
    /// Derive features from a record, imputing a missing age with `age_median`
    pub fn from_record(record: &ComplaintRecord, age_median: f64) -> Self {
        let normalized_text = TextPreprocessor::normalize(&record.comment);
        let population = city_population(record.city.as_deref());
        let age = record.age.map(f64::from).unwrap_or(age_median);

        Self {
            text_length: normalized_text.chars().count(),
            word_count: TextPreprocessor::word_count(&normalized_text),
            urgent_keywords: TextPreprocessor::urgent_keyword_count(&normalized_text),
            mentions_medical: TextPreprocessor::mentions(&normalized_text, Topic::Medical),
            mentions_water: TextPreprocessor::mentions(&normalized_text, Topic::Water),
            mentions_security: TextPreprocessor::mentions(&normalized_text, Topic::Security),
            mentions_education: TextPreprocessor::mentions(&normalized_text, Topic::Education),
            urgency_code: UrgencyLevel::code_for(record.urgency.as_deref()),
            city_population: population,
            large_city: population > LARGE_CITY_THRESHOLD,
            age,
            elderly: age >= 60.0,
            young: age <= 25.0,
            // Only an explicit "no" counts; missing values are not penalised
            no_internet: record.internet_access == Some(false),
            rural: record.rural.unwrap_or(false),
            no_prior_attention: record.prior_attention == Some(false),
            normalized_text,
        }
    }

    fn numeric(&self) -> [f64; 6] {
        [
            self.text_length as f64,
            self.word_count as f64,
            self.urgent_keywords as f64,
            self.urgency_code,
            self.city_population,
            self.age,
        ]
    }

    fn binary(&self) -> [f64; 10] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            flag(self.mentions_medical),
            flag(self.mentions_water),
            flag(self.mentions_security),
            flag(self.mentions_education),
            flag(self.large_city),
            flag(self.elderly),
            flag(self.young),
            flag(self.no_internet),
            flag(self.rural),
            flag(self.no_prior_attention),
        ]
    }

    pub fn detected(&self) -> DetectedFeatures {
        DetectedFeatures {
            text_length: self.text_length,
            urgent_keywords: self.urgent_keywords,
            mentions_medical: self.mentions_medical,
            large_city: self.large_city,
            elderly: self.elderly,
            rural: self.rural,
        }
    }
}

/// Feature extractor for complaints.
///
/// Holds everything fit on training data except the categorical encoders,
/// which travel separately so they can be persisted and inspected on their own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureExtractor {
    /// Feature richness
    feature_set: FeatureSet,

    /// Text vectorizer
    vectorizer: TfidfVectorizer,

    /// Scaler over the numeric block (unused for text-only pipelines)
    scaler: Option<StandardScaler>,

    /// Training-time median age used for imputation
    age_median: f64,

    /// Total number of features
    n_features: usize,

    /// Is fitted
    is_fitted: bool,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(feature_set: FeatureSet, config: FeatureConfig) -> Self {
        Self {
            feature_set,
            vectorizer: TfidfVectorizer::new(config),
            scaler: None,
            age_median: FALLBACK_AGE,
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Fit on training records, returning the categorical encoders
    pub fn fit(&mut self, records: &[ComplaintRecord]) -> Result<CategoricalEncoders> {
        if records.is_empty() {
            return Err(TriageError::Data(
                "cannot fit features on an empty dataset".to_string(),
            ));
        }

        self.age_median = median_age(records);

        let vectors: Vec<FeatureVector> = records
            .iter()
            .map(|r| FeatureVector::from_record(r, self.age_median))
            .collect();

        let documents: Vec<String> = vectors.iter().map(|v| v.normalized_text.clone()).collect();
        self.vectorizer.fit(&documents)?;

        let encoders = match self.feature_set {
            FeatureSet::TextOnly => {
                if self.vectorizer.vocab_size() == 0 {
                    return Err(TriageError::Data(
                        "comments produced an empty vocabulary; text-only pipeline has no features"
                            .to_string(),
                    ));
                }
                self.scaler = None;
                CategoricalEncoders::default()
            }
            FeatureSet::Full => {
                let mut numeric = Array2::zeros((vectors.len(), NUMERIC_FEATURES.len()));
                for (i, vector) in vectors.iter().enumerate() {
                    for (j, value) in vector.numeric().into_iter().enumerate() {
                        numeric[[i, j]] = value;
                    }
                }
                self.scaler = Some(StandardScaler::fit(&numeric)?);

                CategoricalEncoders {
                    city: LabelEncoder::fit(records.iter().map(|r| r.city.as_deref())),
                    category: LabelEncoder::fit(records.iter().map(|r| r.category.as_deref())),
                    gender: LabelEncoder::fit(records.iter().map(|r| r.gender.as_deref())),
                }
            }
        };

        self.n_features = self.vectorizer.vocab_size()
            + match self.feature_set {
                FeatureSet::TextOnly => 0,
                FeatureSet::Full => {
                    NUMERIC_FEATURES.len() + BINARY_FEATURES.len() + CATEGORICAL_FEATURES.len()
                }
            };
        self.is_fitted = true;

        Ok(encoders)
    }

    /// Transform one record into a feature row
    pub fn transform_record(
        &self,
        record: &ComplaintRecord,
        encoders: &CategoricalEncoders,
        unseen: &mut Vec<UnseenCategory>,
    ) -> Result<(Vec<f64>, FeatureVector)> {
        if !self.is_fitted {
            return Err(TriageError::NotTrained(
                "FeatureExtractor must be fitted before transform".to_string(),
            ));
        }

        let vector = FeatureVector::from_record(record, self.age_median);
        let mut row = self.vectorizer.transform(&vector.normalized_text)?;

        if let Some(scaler) = &self.scaler {
            row.extend(scaler.transform_row(&vector.numeric())?);
            row.extend(vector.binary());
            row.extend(encoders.encode(
                record.city.as_deref(),
                record.category.as_deref(),
                record.gender.as_deref(),
                unseen,
            ));
        }

        debug_assert_eq!(row.len(), self.n_features);
        Ok((row, vector))
    }

    /// Transform a batch of records into a feature matrix
    pub fn transform(
        &self,
        records: &[ComplaintRecord],
        encoders: &CategoricalEncoders,
    ) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((records.len(), self.n_features));
        let mut unseen = Vec::new();

        for (i, record) in records.iter().enumerate() {
            let (row, _) = self.transform_record(record, encoders, &mut unseen)?;
            for (j, value) in row.into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }

        Ok(matrix)
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        &mut self,
        records: &[ComplaintRecord],
    ) -> Result<(Array2<f64>, CategoricalEncoders)> {
        let encoders = self.fit(records)?;
        let matrix = self.transform(records, &encoders)?;
        Ok((matrix, encoders))
    }

    /// Names of the non-text features, in column order after the vocabulary
    pub fn engineered_feature_names(&self) -> Vec<String> {
        match self.feature_set {
            FeatureSet::TextOnly => Vec::new(),
            FeatureSet::Full => NUMERIC_FEATURES
                .iter()
                .chain(BINARY_FEATURES.iter())
                .chain(CATEGORICAL_FEATURES.iter())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vectorizer.vocab_size()
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn age_median(&self) -> f64 {
        self.age_median
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
