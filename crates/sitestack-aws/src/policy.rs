//! S3 bucket policy documents
//!
//! The declared document carries references to the identity principal and
//! the bucket ARN. A concrete `PolicyDocument<String>` only exists once both
//! have resolved, which is when the provider parses the resolved config.

use crate::error::{AwsError, Result};
use serde::{Deserialize, Serialize};
use sitestack_cloud::{AttrRef, Input};

pub const POLICY_VERSION: &str = "2012-10-17";
pub const GET_OBJECT: &str = "s3:GetObject";

/// IAM policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument<V = Input> {
    pub version: String,
    pub statement: Vec<Statement<V>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement<V = Input> {
    pub effect: Effect,
    pub principal: Principal<V>,
    pub action: String,
    pub resource: V,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal<V = Input> {
    #[serde(rename = "AWS")]
    pub aws: V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl PolicyDocument<Input> {
    /// Read-only access to every object of a bucket for one principal
    ///
    /// The resource is always `<bucketArn>/*`.
    pub fn grant_get_object(principal: &AttrRef, bucket_arn: &AttrRef) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: Principal {
                    aws: Input::get_att(&principal.resource, &principal.attribute),
                },
                action: GET_OBJECT.to_string(),
                resource: Input::sub(format!("${{{}}}/*", bucket_arn)),
            }],
        }
    }
}

impl PolicyDocument<String> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check that the document grants GetObject on `<bucket_arn>/*` to
    /// `principal`, and nothing else
    pub fn validate_read_only(&self, bucket_arn: &str, principal: &str) -> Result<()> {
        if self.version != POLICY_VERSION {
            return Err(AwsError::MalformedPolicy(format!(
                "unsupported policy version {}",
                self.version
            )));
        }
        let [statement] = self.statement.as_slice() else {
            return Err(AwsError::MalformedPolicy(format!(
                "expected exactly one statement, found {}",
                self.statement.len()
            )));
        };
        if statement.effect != Effect::Allow || statement.action != GET_OBJECT {
            return Err(AwsError::MalformedPolicy(format!(
                "only Allow {} is permitted, found {:?} {}",
                GET_OBJECT, statement.effect, statement.action
            )));
        }
        let expected = format!("{}/*", bucket_arn);
        if statement.resource != expected {
            return Err(AwsError::MalformedPolicy(format!(
                "resource must be {}, found {}",
                expected, statement.resource
            )));
        }
        if statement.principal.aws != principal {
            return Err(AwsError::MalformedPolicy(format!(
                "invalid principal {}, expected {}",
                statement.principal.aws, principal
            )));
        }
        Ok(())
    }
}
