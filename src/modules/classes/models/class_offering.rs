use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Product type of a class offering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Single payment
    Course,
    /// Registration fee plus two tuition installments
    Program,
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::Course => write!(f, "course"),
            ProductType::Program => write!(f, "program"),
        }
    }
}

impl std::str::FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "course" => Ok(ProductType::Course),
            "program" => Ok(ProductType::Program),
            _ => Err(format!("Invalid product type: {}", s)),
        }
    }
}

/// Read-only view of a class from the catalog
///
/// The catalog itself is maintained elsewhere; billing only reads the fields
/// it needs. Amounts are integer minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClassOffering {
    pub id: String,
    pub name: String,
    /// Raw product type as stored by the catalog (may be null or unrecognized)
    pub product_type: Option<String>,
    pub registration_fee: i64,
    pub price: i64,
    pub start_date: Option<NaiveDate>,
}

impl ClassOffering {
    /// Parsed product type, `None` when missing or unrecognized
    pub fn product_type(&self) -> Option<ProductType> {
        self.product_type.as_deref().and_then(|raw| raw.parse().ok())
    }
}
