// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use super::{Collection, Record, StoreError};
use crate::constants::{OWNER_ATTRIBUTE, PRIMARY_KEY};

type Item = HashMap<String, AttributeValue>;

/// One DynamoDB table holding one record kind.
///
/// The table's partition key is `id`. Owned record tables also carry a
/// global secondary index on `ownerId`; the accounts table has none, since
/// an account is its own owner.
pub struct DynamoCollection<R> {
    client: Client,
    table: String,
    owner_index: Option<String>,
    record: PhantomData<fn() -> R>,
}

impl<R: Record> DynamoCollection<R> {
    pub fn new(client: Client, table: &str, owner_index: Option<&str>) -> Self {
        Self {
            client,
            table: table.to_string(),
            owner_index: owner_index.map(str::to_string),
            record: PhantomData,
        }
    }
}

/// A conditional put lost to an existing item with the same id.
fn is_already_present(err: &PutItemError) -> bool {
    err.is_conditional_check_failed_exception()
}

fn backend_error<E: std::error::Error>(err: E) -> StoreError {
    let message = DisplayErrorContext(&err).to_string();
    tracing::error!("[store] dynamodb request failed: {}", message);
    StoreError::Backend(message)
}

#[async_trait]
impl<R: Record> Collection<R> for DynamoCollection<R> {
    async fn get(&self, id: &str) -> Result<Option<R>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(PRIMARY_KEY, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(backend_error)?;

        output.item.map(from_item).transpose()
    }

    async fn put(&self, record: &R) -> Result<(), StoreError> {
        let item = to_item(record)?;

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn put_if_absent(&self, record: &R) -> Result<bool, StoreError> {
        let item = to_item(record)?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", PRIMARY_KEY)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(is_already_present) => Ok(false),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(PRIMARY_KEY, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<R>, StoreError> {
        let Some(index) = &self.owner_index else {
            return Ok(self.get(owner_id).await?.into_iter().collect());
        };

        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .index_name(index)
                .key_condition_expression("#owner = :owner")
                .expression_attribute_names("#owner", OWNER_ATTRIBUTE)
                .expression_attribute_values(":owner", AttributeValue::S(owner_id.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend_error)?;

            for item in output.items.unwrap_or_default() {
                records.push(from_item(item)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }
}

fn to_item<R: Record>(record: &R) -> Result<Item, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name, to_attribute(value)))
            .collect()),
        _ => Err(StoreError::Backend(format!(
            "{} does not serialize to an item",
            R::KIND
        ))),
    }
}

fn from_item<R: Record>(item: Item) -> Result<R, StoreError> {
    let fields = item
        .into_iter()
        .map(|(name, value)| Ok((name, from_attribute(value)?)))
        .collect::<Result<Map<String, Value>, StoreError>>()?;

    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

fn from_attribute(value: AttributeValue) -> Result<Value, StoreError> {
    let value = match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => {
            let number: Number = serde_json::from_str(&n)?;
            Value::Number(number)
        }
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| Ok((name, from_attribute(value)?)))
                .collect::<Result<_, StoreError>>()?,
        ),
        other => {
            return Err(StoreError::Backend(format!(
                "unsupported attribute type: {other:?}"
            )));
        }
    };

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::{CredentialSet, NewScript, Script};
    use aws_sdk_dynamodb::types::error::{
        ConditionalCheckFailedException, ResourceNotFoundException,
    };
    use serde_json::json;

    #[test]
    fn test_item_attributes() {
        let record = CredentialSet::new("u1", "prod", "AKIAEXAMPLE", "00:11".to_string());
        let item = to_item(&record).unwrap();

        assert_eq!(item[PRIMARY_KEY], AttributeValue::S(record.id.clone()));
        assert_eq!(item[OWNER_ATTRIBUTE], AttributeValue::S("u1".to_string()));
        assert_eq!(item["secretValue"], AttributeValue::S("00:11".to_string()));
        assert!(matches!(item["createdAt"], AttributeValue::S(_)));
    }

    #[test]
    fn test_item_round_trip_skips_missing_description() {
        let script = Script::new(
            "u1",
            NewScript {
                name: "vpc".to_string(),
                description: None,
                content: "terraform {}".to_string(),
            },
        );
        let item = to_item(&script).unwrap();
        assert!(!item.contains_key("description"));

        let restored: Script = from_item(item).unwrap();
        assert_eq!(restored, script);
    }

    #[test]
    fn test_nested_values_convert_both_ways() {
        let value = json!({"n": 42, "f": 1.5, "list": [true, null, "x"], "map": {"k": "v"}});
        let restored = from_attribute(to_attribute(value.clone())).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn test_unsupported_attributes_rejected() {
        let value = AttributeValue::Ss(vec!["a".to_string()]);
        assert!(matches!(from_attribute(value), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_conditional_check_failure_means_already_present() {
        let taken = PutItemError::ConditionalCheckFailedException(
            ConditionalCheckFailedException::builder()
                .message("The conditional request failed")
                .build(),
        );
        let missing_table = PutItemError::ResourceNotFoundException(
            ResourceNotFoundException::builder()
                .message("Requested resource not found")
                .build(),
        );

        assert!(is_already_present(&taken));
        assert!(!is_already_present(&missing_table));
    }
}
