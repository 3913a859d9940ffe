// common/src/models/user.rs
use candid::{CandidType, Principal};
use serde::{Deserialize, Serialize};

/// User profile as the backend canister stores it
#[derive(CandidType, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Principal,
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "profileImg")]
    pub profile_img: Option<Vec<u8>>,
    pub bio: String,
    pub website: String,
    #[serde(rename = "socialMedia")]
    pub social_media: Vec<String>,
    #[serde(rename = "walletAddr")]
    pub wallet_addr: String,
    pub location: String,
    #[serde(rename = "portfolioUrl")]
    pub portfolio_url: String,
    #[serde(rename = "notificationPrefs")]
    pub notification_prefs: Vec<String>,
    #[serde(rename = "languagePref")]
    pub language_pref: String,
    #[serde(rename = "termsAccepted")]
    pub terms_accepted: bool,
}

impl User {
    /// Fixed test profile submitted by the add-user command. The id is the
    /// management canister principal; the backend keys users by caller.
    pub fn placeholder() -> Self {
        Self {
            id: Principal::management_canister(),
            username: "testuser".to_string(),
            display_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password: "testpassword".to_string(),
            profile_img: None,
            bio: "Test bio".to_string(),
            website: String::new(),
            social_media: Vec::new(),
            wallet_addr: String::new(),
            location: String::new(),
            portfolio_url: String::new(),
            notification_prefs: Vec::new(),
            language_pref: "en".to_string(),
            terms_accepted: true,
        }
    }
}
