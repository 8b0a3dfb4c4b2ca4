// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::constants::{
    MAX_ACCESS_KEY_ID_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_ID_LENGTH, MAX_NAME_LENGTH,
    MAX_SCRIPT_CONTENT_LENGTH, MAX_SECRET_VALUE_LENGTH,
};
use crate::runner::ExecutionOutcome;
use crate::store::{Record, RecordKind};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A registered user, keyed by the token subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(request: NewAccount) -> Self {
        Self {
            id: request.id,
            email: request.email,
            display_name: request.display_name,
            created_at: Utc::now(),
        }
    }
}

impl Record for Account {
    const KIND: RecordKind = RecordKind::Account;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.id
    }
}

/// A stored AWS access key pair. `secret_value` holds the cipher envelope.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub access_key_id: String,
    pub secret_value: String,
    pub created_at: DateTime<Utc>,
}

impl CredentialSet {
    pub fn new(owner_id: &str, name: &str, access_key_id: &str, envelope: String) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            access_key_id: access_key_id.to_string(),
            secret_value: envelope,
            created_at: Utc::now(),
        }
    }

    /// The view returned to callers, without the secret.
    pub fn redacted(&self) -> CredentialSetView {
        CredentialSetView {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            access_key_id: self.access_key_id.clone(),
            created_at: self.created_at,
        }
    }
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Record for CredentialSet {
    const KIND: RecordKind = RecordKind::CredentialSet;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSetView {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub access_key_id: String,
    pub created_at: DateTime<Utc>,
}

/// A stored infrastructure-as-code script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Script {
    pub fn new(owner_id: &str, request: NewScript) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: request.name,
            description: request.description,
            content: request.content,
            created_at: Utc::now(),
        }
    }

    /// Listing projection, without the script content.
    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }
}

impl Record for Script {
    const KIND: RecordKind = RecordKind::Script;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[serde(alias = "googleId")]
    #[validate(length(min = 1, max = MAX_ID_LENGTH))]
    pub id: String,

    #[validate(email)]
    pub email: String,

    #[serde(alias = "name")]
    #[validate(length(min = 1, max = MAX_NAME_LENGTH))]
    pub display_name: String,
}

#[derive(Clone, Deserialize, Validate, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct NewCredentialSet {
    #[validate(length(min = 1, max = MAX_NAME_LENGTH))]
    pub name: String,

    #[serde(alias = "accessKey")]
    #[validate(length(min = 1, max = MAX_ACCESS_KEY_ID_LENGTH))]
    pub access_key_id: String,

    #[serde(alias = "secretKey")]
    #[validate(length(min = 1, max = MAX_SECRET_VALUE_LENGTH))]
    pub secret_value: String,
}

impl fmt::Debug for NewCredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredentialSet")
            .field("name", &self.name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_value", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewScript {
    #[validate(length(min = 1, max = MAX_NAME_LENGTH))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = MAX_DESCRIPTION_LENGTH))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = MAX_SCRIPT_CONTENT_LENGTH))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(alias = "keyId")]
    #[validate(length(min = 1, max = MAX_ID_LENGTH))]
    pub credential_set_id: String,

    #[validate(length(min = 1, max = MAX_ID_LENGTH))]
    pub script_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub message: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub output: String,
}

impl From<ExecutionOutcome> for ExecuteResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Success { output } => Self {
                message: "Script executed successfully".to_string(),
                outcome: "success".to_string(),
                stage: None,
                output,
            },
            ExecutionOutcome::Failure { stage, message } => Self {
                message: "Script execution failed".to_string(),
                outcome: "failure".to_string(),
                stage: Some(stage.to_string()),
                output: message,
            },
        }
    }
}

/// Decrypted credentials handed to the provisioning tool for one execution.
pub struct RunnerCredential {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
}

// Custom Debug implementation to prevent accidental logging of sensitive data
impl fmt::Debug for RunnerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}
