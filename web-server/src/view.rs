// web-server/src/view.rs
use common::models::{Asset, AssetId, User};
use common::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::canister::BackendActor;
use crate::session::SessionStatus;

/// Fixed page size for asset listing
pub const PAGE_SIZE: u64 = 10;

const LOGIN_FIRST: &str = "Please login first";
const ENTER_ASSET_ID: &str = "Please enter an asset ID";

/// Named display regions of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    LoginBtn,
    UserInfo,
    AssetList,
    PreviewInfo,
    FullAssetInfo,
}

/// Contents of the display regions plus alerts not yet shown
#[derive(Debug, Default)]
pub struct View {
    regions: BTreeMap<Region, String>,
    alerts: Vec<String>,
}

impl View {
    pub fn text(&self, region: Region) -> &str {
        self.regions.get(&region).map(String::as_str).unwrap_or("")
    }

    pub fn set_text(&mut self, region: Region, text: impl Into<String>) {
        self.regions.insert(region, text.into());
    }

    /// Append a `<p>` paragraph; `text` is escaped
    pub fn append_paragraph(&mut self, region: Region, text: &str) {
        let entry = self.regions.entry(region).or_default();
        entry.push_str("<p>");
        entry.push_str(&html_escape::encode_text(text));
        entry.push_str("</p>");
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        self.alerts.push(message.into());
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }
}

/// What the page receives after every command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub regions: BTreeMap<Region, String>,
    pub alerts: Vec<String>,
    pub current_page: u64,
}

/// Commands bound to the page buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddUser,
    GetUser,
    AddAsset,
    LoadMore,
    GetPreview,
    GetFullAsset,
    ResetPaging,
    SeekPage,
}

#[derive(Debug, Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add-user" => Ok(Command::AddUser),
            "get-user" => Ok(Command::GetUser),
            "add-asset" => Ok(Command::AddAsset),
            "load-more" => Ok(Command::LoadMore),
            "get-preview" => Ok(Command::GetPreview),
            "get-full-asset" => Ok(Command::GetFullAsset),
            "reset-paging" => Ok(Command::ResetPaging),
            "seek-page" => Ok(Command::SeekPage),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Inputs that accompany a command
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandInput {
    #[serde(default)]
    pub asset_id: String,
    pub page: Option<u64>,
}

/// Command handlers of one page. Each one checks for an actor handle, makes
/// a single remote call and renders the outcome into its region.
pub struct ViewController {
    actor: Option<Arc<dyn BackendActor>>,
    current_page: u64,
    view: View,
}

impl ViewController {
    pub fn new(actor: Option<Arc<dyn BackendActor>>) -> Self {
        Self {
            actor,
            current_page: 0,
            view: View::default(),
        }
    }

    /// Swap the actor handle after login or logout
    pub fn attach(&mut self, actor: Option<Arc<dyn BackendActor>>) {
        self.actor = actor;
    }

    pub fn has_actor(&self) -> bool {
        self.actor.is_some()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn reset_paging(&mut self) {
        self.current_page = 0;
    }

    pub fn seek_page(&mut self, page: u64) {
        self.current_page = page;
    }

    /// Snapshot for the page; alerts are handed out once
    pub fn snapshot(&mut self) -> ViewSnapshot {
        ViewSnapshot {
            regions: self.view.regions.clone(),
            alerts: std::mem::take(&mut self.view.alerts),
            current_page: self.current_page,
        }
    }

    /// Reflect the login state in the login button and user-info
    pub fn show_session(&mut self, status: &SessionStatus) {
        match status {
            SessionStatus::Authenticated { principal } => {
                self.view.set_text(Region::LoginBtn, "Logout");
                self.view.set_text(Region::UserInfo, format!("Logged in as: {}", principal));
            }
            SessionStatus::Anonymous => {
                self.view.set_text(Region::LoginBtn, "Login with Internet Identity");
                self.view.set_text(Region::UserInfo, "");
            }
        }
    }

    pub async fn dispatch(&mut self, command: Command, input: &CommandInput) {
        match command {
            Command::AddUser => self.add_user().await,
            Command::GetUser => self.get_user().await,
            Command::AddAsset => self.add_asset().await,
            Command::LoadMore => self.list_assets().await,
            Command::GetPreview => self.get_asset_preview(&input.asset_id).await,
            Command::GetFullAsset => self.get_full_asset(&input.asset_id).await,
            Command::ResetPaging => self.reset_paging(),
            Command::SeekPage => self.seek_page(input.page.unwrap_or(0)),
        }
    }

    fn require_actor(&mut self) -> Option<Arc<dyn BackendActor>> {
        let actor = self.actor.clone();
        if actor.is_none() {
            self.view.alert(LOGIN_FIRST);
        }
        actor
    }

    pub async fn add_user(&mut self) {
        let Some(actor) = self.require_actor() else { return };

        let text = match actor.add_user(&User::placeholder()).await {
            Ok(result) => format!("User added: {}", result),
            Err(e) => {
                tracing::error!("Error adding user: {}", e);
                format!("Error: {}", e)
            }
        };
        self.view.set_text(Region::UserInfo, text);
    }

    pub async fn get_user(&mut self) {
        let Some(actor) = self.require_actor() else { return };

        let text = match actor.get_user().await {
            Ok(Some(user)) => to_json(&user),
            Ok(None) => "No user found".to_string(),
            Err(e) => {
                tracing::error!("Error getting user: {}", e);
                format!("Error: {}", e)
            }
        };
        self.view.set_text(Region::UserInfo, text);
    }

    pub async fn add_asset(&mut self) {
        let Some(actor) = self.require_actor() else { return };

        let asset = Asset::placeholder(now_millis());
        tracing::debug!(
            "Submitting {} ({}, {}, {} {})",
            asset.name, asset.category, asset.license_type, asset.price, asset.currency_type
        );

        let text = match actor.add_asset(&asset).await {
            Ok((success, id)) => format!("Asset added: {}, ID: {}", success, id),
            Err(e) => {
                tracing::error!("Error adding asset: {}", e);
                format!("Error adding asset. Error: {}", e)
            }
        };
        self.view.append_paragraph(Region::AssetList, &text);
    }

    /// Load the page at the current index and move the index forward
    pub async fn list_assets(&mut self) {
        let Some(actor) = self.require_actor() else { return };
        let Some(next_page) = self.current_page.checked_add(1) else {
            let line = format!(
                "Error getting assets list. Error: page {} is the last page",
                self.current_page
            );
            self.view.append_paragraph(Region::AssetList, &line);
            return;
        };

        match actor.list_assets(self.current_page, PAGE_SIZE).await {
            Ok(assets) => {
                for asset in &assets {
                    let line = format!("Asset: {}, ID: {}", asset.name, asset.id);
                    self.view.append_paragraph(Region::AssetList, &line);
                }
                self.current_page = next_page;
            }
            Err(e) => {
                tracing::error!("Error getting assets list: {}", e);
                let line = format!("Error getting assets list. Error: {}", e);
                self.view.append_paragraph(Region::AssetList, &line);
            }
        }
    }

    pub async fn get_asset_preview(&mut self, input: &str) {
        let Some(actor) = self.require_actor() else { return };
        let Some(id) = self.asset_id(Region::PreviewInfo, input) else { return };

        let text = match actor.get_asset_preview(id).await {
            Ok(Some(preview)) => to_json(&preview),
            Ok(None) => "No preview found".to_string(),
            Err(e) => {
                tracing::error!("Error getting asset preview: {}", e);
                format!("Error: {}", e)
            }
        };
        self.view.set_text(Region::PreviewInfo, text);
    }

    pub async fn get_full_asset(&mut self, input: &str) {
        let Some(actor) = self.require_actor() else { return };
        let Some(id) = self.asset_id(Region::FullAssetInfo, input) else { return };

        let text = match actor.get_asset(id).await {
            Ok(Some(asset)) => to_json(&asset),
            Ok(None) => "No asset found or not authorized".to_string(),
            Err(e) => {
                tracing::error!("Error getting full asset: {}", e);
                format!("Error: {}", e)
            }
        };
        self.view.set_text(Region::FullAssetInfo, text);
    }

    /// Parse the asset id input, reporting problems in `region`
    fn asset_id(&mut self, region: Region, input: &str) -> Option<AssetId> {
        let input = input.trim();
        if input.is_empty() {
            self.view.set_text(region, ENTER_ASSET_ID);
            return None;
        }

        match input.parse::<AssetId>() {
            Ok(id) => Some(id),
            Err(_) => {
                self.view.set_text(region, format!("Error: invalid asset ID \"{}\"", input));
                None
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("Error: {}", e))
}
