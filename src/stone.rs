//! Core stone (inventory row) types and the upload validation contract.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::ValidationError;

/// Claim flag on a stone. Rendered `YES`/`NO` to match the inventory sheets
/// suppliers see.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockFlag {
    #[n(0)]
    No,
    #[n(1)]
    Yes,
}

impl LockFlag {
    pub fn is_locked(self) -> bool {
        self == LockFlag::Yes
    }
}

impl std::fmt::Display for LockFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockFlag::Yes => write!(f, "YES"),
            LockFlag::No => write!(f, "NO"),
        }
    }
}

/// One row in a supplier shard and in the combined view.
///
/// `supplier` is the owning-shard identity and is stamped by the shard
/// manager on upload; `locked` is mutated in place only by the lock manager.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Stone {
    #[n(0)]
    pub stock_id: String,
    #[n(1)]
    pub shape: String,
    #[n(2)]
    pub weight: f64,
    #[n(3)]
    pub color: String,
    #[n(4)]
    pub clarity: String,
    #[n(5)]
    pub lab: String,
    #[n(6)]
    pub report_no: String,
    #[n(7)]
    pub diamond_type: String,
    #[n(8)]
    pub description: String,
    #[n(9)]
    pub price_per_carat: f64,
    #[n(10)]
    pub cut: String,
    #[n(11)]
    pub polish: String,
    #[n(12)]
    pub symmetry: String,
    #[n(13)]
    pub supplier: String,
    #[n(14)]
    pub locked: LockFlag,
    #[n(15)]
    pub uploaded_at: TimeStamp<Utc>,
}

/// One incoming row of an inventory upload, before validation. The upload
/// parser (an external collaborator) hands rows over in this shape.
#[derive(Debug, Default, Clone)]
pub struct StoneDraft {
    stock_id: Option<String>,
    shape: Option<String>,
    weight: Option<f64>,
    color: Option<String>,
    clarity: Option<String>,
    lab: Option<String>,
    report_no: Option<String>,
    diamond_type: Option<String>,
    description: Option<String>,
    price_per_carat: Option<f64>,
    cut: Option<String>,
    polish: Option<String>,
    symmetry: Option<String>,
}

impl StoneDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_stock_id(mut self, id: &str) -> Self {
        self.stock_id = Some(id.trim().to_string());
        self
    }
    pub fn set_shape(mut self, shape: &str) -> Self {
        self.shape = Some(shape.trim().to_string());
        self
    }
    pub fn set_weight(mut self, carats: f64) -> Self {
        self.weight = Some(carats);
        self
    }
    pub fn set_color(mut self, color: &str) -> Self {
        self.color = Some(color.trim().to_string());
        self
    }
    pub fn set_clarity(mut self, clarity: &str) -> Self {
        self.clarity = Some(clarity.trim().to_string());
        self
    }
    pub fn set_lab(mut self, lab: &str) -> Self {
        self.lab = Some(lab.trim().to_string());
        self
    }
    pub fn set_report_no(mut self, report_no: &str) -> Self {
        self.report_no = Some(report_no.trim().to_string());
        self
    }
    pub fn set_diamond_type(mut self, diamond_type: &str) -> Self {
        self.diamond_type = Some(diamond_type.trim().to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.trim().to_string());
        self
    }
    pub fn set_price_per_carat(mut self, price: f64) -> Self {
        self.price_per_carat = Some(price);
        self
    }
    pub fn set_cut(mut self, cut: &str) -> Self {
        self.cut = Some(cut.trim().to_string());
        self
    }
    pub fn set_polish(mut self, polish: &str) -> Self {
        self.polish = Some(polish.trim().to_string());
        self
    }
    pub fn set_symmetry(mut self, symmetry: &str) -> Self {
        self.symmetry = Some(symmetry.trim().to_string());
        self
    }

    /// Checks every required field and returns either a stone ready to be
    /// stamped into a shard, or every defect found on this row.
    pub fn validate(&self, row: usize) -> Result<Stone, Vec<ValidationError>> {
        let mut errors = Vec::new();

        fn required(
            errors: &mut Vec<ValidationError>,
            row: usize,
            field: &'static str,
            value: &Option<String>,
        ) -> String {
            match value {
                Some(v) if !v.is_empty() => v.clone(),
                _ => {
                    errors.push(ValidationError::MissingRequired { row, field });
                    String::new()
                }
            }
        }

        fn positive(
            errors: &mut Vec<ValidationError>,
            row: usize,
            field: &'static str,
            value: Option<f64>,
        ) -> f64 {
            match value {
                Some(v) if v > 0.0 && v.is_finite() => v,
                Some(v) => {
                    errors.push(ValidationError::NonPositive {
                        row,
                        field,
                        value: v.to_string(),
                    });
                    0.0
                }
                None => {
                    errors.push(ValidationError::MissingRequired { row, field });
                    0.0
                }
            }
        }

        let stock_id = required(&mut errors, row, "stock id", &self.stock_id);
        let shape = required(&mut errors, row, "shape", &self.shape);
        let weight = positive(&mut errors, row, "weight", self.weight);
        let color = required(&mut errors, row, "color", &self.color);
        let clarity = required(&mut errors, row, "clarity", &self.clarity);
        let lab = required(&mut errors, row, "lab", &self.lab);
        let report_no = required(&mut errors, row, "report no", &self.report_no);
        let diamond_type = required(&mut errors, row, "diamond type", &self.diamond_type);
        let description = required(&mut errors, row, "description", &self.description);
        let price_per_carat = positive(&mut errors, row, "price per carat", self.price_per_carat);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Stone {
            stock_id,
            shape,
            weight,
            color,
            clarity,
            lab,
            report_no,
            diamond_type,
            description,
            price_per_carat,
            // cut/polish/symmetry are optional and may stay blank
            cut: self.cut.clone().unwrap_or_default(),
            polish: self.polish.clone().unwrap_or_default(),
            symmetry: self.symmetry.clone().unwrap_or_default(),
            supplier: String::new(),
            locked: LockFlag::No,
            uploaded_at: TimeStamp::new(),
        })
    }
}

/// Validates a whole upload. Either every row passes and the stones come
/// back in submission order, or the full list of defects is returned and
/// nothing is accepted.
pub fn validate_batch(drafts: &[StoneDraft]) -> Result<Vec<Stone>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut stones = Vec::with_capacity(drafts.len());
    let mut seen = std::collections::BTreeSet::new();

    for (row, draft) in drafts.iter().enumerate() {
        match draft.validate(row) {
            Ok(stone) => {
                if !seen.insert(stone.stock_id.clone()) {
                    errors.push(ValidationError::DuplicateStockId {
                        row,
                        stock_id: stone.stock_id.clone(),
                    });
                } else {
                    stones.push(stone);
                }
            }
            Err(row_errors) => errors.extend(row_errors),
        }
    }

    if errors.is_empty() { Ok(stones) } else { Err(errors) }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Calendar date, used to key per-day activity logs.
    pub fn date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
