// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

/// File the script content is written to inside each workspace.
pub const SCRIPT_FILENAME: &str = "script.tf";
pub const WORKSPACE_PREFIX: &str = "iac-";
pub const DEFAULT_TOOL: &str = "terraform";

/// Global secondary index on `ownerId` for the owned DynamoDB tables.
pub const OWNER_INDEX_NAME: &str = "OwnerIdIndex";
pub const PRIMARY_KEY: &str = "id";
pub const OWNER_ATTRIBUTE: &str = "ownerId";

pub const MAX_BODY_SIZE: usize = 1024 * 1024; // 1 MB

// AES-256-CBC
pub const CIPHER_KEY_LENGTH: usize = 32;
pub const CIPHER_NONCE_LENGTH: usize = 16;
pub const ENVELOPE_DELIMITER: char = ':';

// Validation constants for request bodies
pub const MAX_NAME_LENGTH: u64 = 128;
pub const MAX_ACCESS_KEY_ID_LENGTH: u64 = 128;
pub const MAX_SECRET_VALUE_LENGTH: u64 = 1024;
pub const MAX_DESCRIPTION_LENGTH: u64 = 1024;
pub const MAX_SCRIPT_CONTENT_LENGTH: u64 = 256 * 1024;
pub const MAX_ID_LENGTH: u64 = 256;
