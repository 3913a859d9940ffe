// common/src/models/asset.rs
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the backend assigns to an asset
pub type AssetId = u64;

pub type Tag = String;

#[derive(CandidType, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseType {
    FreePersonalUse,
    FreeCommercialUse,
    Commercial,
    Extended,
}

#[derive(CandidType, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyType {
    #[serde(rename = "ICP")]
    Icp,
    #[serde(rename = "ckBTC")]
    CkBtc,
    #[serde(rename = "ckETH")]
    CkEth,
}

#[derive(CandidType, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Serif,
    SansSerif,
    Script,
    Display,
    Monospace,
    Handwriting,
}

#[derive(CandidType, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LicenseType::FreePersonalUse => "free for personal use",
            LicenseType::FreeCommercialUse => "free for commercial use",
            LicenseType::Commercial => "commercial",
            LicenseType::Extended => "extended",
        })
    }
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CurrencyType::Icp => "ICP",
            CurrencyType::CkBtc => "ckBTC",
            CurrencyType::CkEth => "ckETH",
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Serif => "serif",
            Category::SansSerif => "sans-serif",
            Category::Script => "script",
            Category::Display => "display",
            Category::Monospace => "monospace",
            Category::Handwriting => "handwriting",
        })
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetStatus::Active => "active",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Suspended => "suspended",
        })
    }
}

/// Font asset record submitted to and returned by the backend
#[derive(CandidType, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub description: String,
    pub file: Vec<u8>,
    #[serde(rename = "fileFree")]
    pub file_free: Option<Vec<u8>>,
    pub preview: Vec<Vec<u8>>,
    pub tags: Vec<Tag>,
    #[serde(rename = "licenseType")]
    pub license_type: LicenseType,
    pub price: f64,
    #[serde(rename = "currencyType")]
    pub currency_type: CurrencyType,
    #[serde(rename = "royaltyPercentage")]
    pub royalty_percentage: f64,
    #[serde(rename = "communityPercentage")]
    pub community_percentage: f64,
    pub cocreators: String,
    pub category: Category,
    #[serde(rename = "fontVersion")]
    pub font_version: String,
    #[serde(rename = "fontLicenceFile")]
    pub font_licence_file: Option<Vec<u8>>,
    #[serde(rename = "fontMetadata")]
    pub font_metadata: String,
    #[serde(rename = "fontOfTheDay")]
    pub font_of_the_day: bool,
    #[serde(rename = "termsAndConditions")]
    pub terms_and_conditions: bool,
    /// Milliseconds since the epoch
    pub created: i64,
    pub updated: i64,
    pub status: AssetStatus,
}

impl Asset {
    /// Fixed test font submitted by the add-asset command
    pub fn placeholder(now_millis: i64) -> Self {
        Self {
            name: "Test Font".to_string(),
            description: "A test font asset".to_string(),
            file: Vec::new(),
            file_free: None,
            preview: Vec::new(),
            tags: Vec::new(),
            license_type: LicenseType::FreePersonalUse,
            price: 0.0,
            currency_type: CurrencyType::Icp,
            royalty_percentage: 0.0,
            community_percentage: 0.0,
            cocreators: String::new(),
            category: Category::Serif,
            font_version: "1.0".to_string(),
            font_licence_file: None,
            font_metadata: String::new(),
            font_of_the_day: false,
            terms_and_conditions: true,
            created: now_millis,
            updated: now_millis,
            status: AssetStatus::Active,
        }
    }
}

/// One entry of a `getListAssets` page
#[derive(CandidType, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: AssetId,
    pub name: String,
}

/// Public preview of an asset, available without a license
#[derive(CandidType, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPreview {
    pub id: AssetId,
    pub name: String,
    pub description: String,
    pub preview: Vec<Vec<u8>>,
    pub category: Category,
    #[serde(rename = "licenseType")]
    pub license_type: LicenseType,
    pub price: f64,
    #[serde(rename = "currencyType")]
    pub currency_type: CurrencyType,
}
