// web-server/src/canister.rs
use async_trait::async_trait;
use candid::{Decode, Encode, IDLArgs, IDLValue, Nat, Principal};
use common::models::{Asset, AssetId, AssetPreview, AssetSummary, User};
use ic_agent::{Agent, AgentError};
use thiserror::Error;

// Method names exported by the backend canister
const ADD_USER: &str = "addUser";
const GET_USER: &str = "getUser";
const ADD_ASSET: &str = "addAsset";
const GET_LIST_ASSETS: &str = "getListAssets";
const GET_ASSET_PREVIEW: &str = "getAssetPreview";
const GET_ASSET: &str = "getAsset";

/// Failure of a single remote call. The message is shown to the user as-is.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("{0}")]
    Agent(#[from] AgentError),

    #[error("candid: {0}")]
    Candid(#[from] candid::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Typed handle for the backend canister, bound to one identity
#[async_trait]
pub trait BackendActor: Send + Sync {
    /// The backend's reply is opaque to the front-end; it is only displayed
    async fn add_user(&self, user: &User) -> Result<IDLValue, CallError>;

    async fn get_user(&self) -> Result<Option<User>, CallError>;

    /// Returns the success flag and the new asset id
    async fn add_asset(&self, asset: &Asset) -> Result<(bool, AssetId), CallError>;

    async fn list_assets(&self, page: u64, page_size: u64) -> Result<Vec<AssetSummary>, CallError>;

    async fn get_asset_preview(&self, id: AssetId) -> Result<Option<AssetPreview>, CallError>;

    /// `None` also covers callers without a license for the asset
    async fn get_asset(&self, id: AssetId) -> Result<Option<Asset>, CallError>;
}

/// `BackendActor` over an ic-agent connection
pub struct IcBackendActor {
    agent: Agent,
    canister_id: Principal,
}

impl IcBackendActor {
    pub fn new(agent: Agent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }

    async fn update(&self, method: &str, arg: Vec<u8>) -> Result<Vec<u8>, CallError> {
        tracing::debug!("update {} on {}", method, self.canister_id);
        let reply = self
            .agent
            .update(&self.canister_id, method)
            .with_arg(arg)
            .call_and_wait()
            .await?;
        Ok(reply)
    }

    async fn query(&self, method: &str, arg: Vec<u8>) -> Result<Vec<u8>, CallError> {
        tracing::debug!("query {} on {}", method, self.canister_id);
        let reply = self
            .agent
            .query(&self.canister_id, method)
            .with_arg(arg)
            .call()
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl BackendActor for IcBackendActor {
    async fn add_user(&self, user: &User) -> Result<IDLValue, CallError> {
        let reply = self.update(ADD_USER, Encode!(user)?).await?;
        first_value(&reply)
    }

    async fn get_user(&self) -> Result<Option<User>, CallError> {
        let reply = self.query(GET_USER, Encode!()?).await?;
        Ok(Decode!(&reply, Option<User>)?)
    }

    async fn add_asset(&self, asset: &Asset) -> Result<(bool, AssetId), CallError> {
        let reply = self.update(ADD_ASSET, Encode!(asset)?).await?;
        Ok(Decode!(&reply, bool, AssetId)?)
    }

    async fn list_assets(&self, page: u64, page_size: u64) -> Result<Vec<AssetSummary>, CallError> {
        let arg = Encode!(&Nat::from(page), &Nat::from(page_size))?;
        let reply = self.query(GET_LIST_ASSETS, arg).await?;
        Ok(Decode!(&reply, Vec<AssetSummary>)?)
    }

    async fn get_asset_preview(&self, id: AssetId) -> Result<Option<AssetPreview>, CallError> {
        let reply = self.query(GET_ASSET_PREVIEW, Encode!(&id)?).await?;
        Ok(Decode!(&reply, Option<AssetPreview>)?)
    }

    async fn get_asset(&self, id: AssetId) -> Result<Option<Asset>, CallError> {
        let reply = self.query(GET_ASSET, Encode!(&id)?).await?;
        Ok(Decode!(&reply, Option<Asset>)?)
    }
}

/// First value of an untyped reply, `null` for an empty one
fn first_value(reply: &[u8]) -> Result<IDLValue, CallError> {
    let args = IDLArgs::from_bytes(reply)?;
    Ok(args.args.into_iter().next().unwrap_or(IDLValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_of_reply() {
        let reply = Encode!(&"user-42".to_string()).unwrap();
        assert_eq!(first_value(&reply).unwrap(), IDLValue::Text("user-42".to_string()));

        let empty = Encode!().unwrap();
        assert_eq!(first_value(&empty).unwrap(), IDLValue::Null);
    }

    #[test]
    fn test_first_value_rejects_garbage() {
        assert!(matches!(first_value(b"not candid"), Err(CallError::Candid(_))));
    }

    #[test]
    fn test_call_error_message_is_verbatim() {
        let err = CallError::Rejected("network down".to_string());
        assert_eq!(err.to_string(), "network down");
    }
}
