use crate::error::{Result, TriageError};
use crate::ml::models::UnseenCategory;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder for missing categorical values
pub const MISSING_CATEGORY: &str = "Desconocido";

/// Code emitted for categories never seen during fitting
pub const UNSEEN_CATEGORY_CODE: f64 = -1.0;

/// Result of encoding one categorical value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoded {
    Known(usize),
    Unseen,
}

impl Encoded {
    pub fn code(&self) -> f64 {
        match self {
            Encoded::Known(code) => *code as f64,
            Encoded::Unseen => UNSEEN_CATEGORY_CODE,
        }
    }
}

/// Maps categorical strings to integer codes assigned in sorted order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    classes: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Fit on raw values; `None` is encoded as [`MISSING_CATEGORY`]
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut classes: BTreeMap<String, usize> = values
            .into_iter()
            .map(|v| Self::key(v).to_string())
            .map(|v| (v, 0))
            .collect();

        for (idx, code) in classes.values_mut().enumerate() {
            *code = idx;
        }

        Self { classes }
    }

    pub fn encode(&self, value: Option<&str>) -> Encoded {
        match self.classes.get(Self::key(value)) {
            Some(&code) => Encoded::Known(code),
            None => Encoded::Unseen,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    fn key(value: Option<&str>) -> &str {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => MISSING_CATEGORY,
        }
    }
}

/// The label encoders fit on training-time categorical vocabularies
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoricalEncoders {
    pub city: LabelEncoder,
    pub category: LabelEncoder,
    pub gender: LabelEncoder,
}

impl CategoricalEncoders {
    pub const COLUMNS: [&'static str; 3] = ["city", "category", "gender"];

    /// Encode (city, category, gender), recording every unseen value
    pub fn encode(
        &self,
        city: Option<&str>,
        category: Option<&str>,
        gender: Option<&str>,
        unseen: &mut Vec<UnseenCategory>,
    ) -> [f64; 3] {
        let encoders = [&self.city, &self.category, &self.gender];
        let values = [city, category, gender];
        let mut codes = [0.0; 3];

        for (i, (encoder, value)) in encoders.iter().zip(values).enumerate() {
            let encoded = encoder.encode(value);
            if encoded == Encoded::Unseen {
                unseen.push(UnseenCategory {
                    column: Self::COLUMNS[i].to_string(),
                    value: LabelEncoder::key(value).to_string(),
                });
            }
            codes[i] = encoded.code();
        }

        codes
    }
}

/// Column-wise standardization (zero mean, unit variance)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(TriageError::Data(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| TriageError::Internal("empty axis in scaler fit".to_string()))?;
        // Constant columns keep a unit scale so they map to zero instead of NaN
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.mean.len() {
            return Err(TriageError::Internal(format!(
                "scaler expects {} columns, got {}",
                self.mean.len(),
                row.len()
            )));
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}
