//! Attribute references between declared resources
//!
//! A declaration may read attributes that only exist once another resource
//! has been realized (an ARN, an endpoint, an access path). Such values are
//! written as CloudFormation-style intrinsics inside the resource config:
//!
//! ```text
//! {"Fn::GetAtt": ["s3-bucket:site-bucket", "arn"]}
//! {"Fn::Sub": "${s3-bucket:site-bucket.arn}/*"}
//! ```
//!
//! The engine collects these references to build the dependency graph and
//! substitutes them just before the dependent resource is realized.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const GET_ATT: &str = "Fn::GetAtt";
pub const SUB: &str = "Fn::Sub";

/// A reference to one attribute of another resource (by resource key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrRef {
    /// Resource key (`type:id`)
    pub resource: String,

    /// Attribute name (e.g. "arn", "website_endpoint")
    pub attribute: String,
}

impl AttrRef {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl std::fmt::Display for AttrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// A declared string value, possibly depending on other resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Literal(String),
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        get_att: (String, String),
    },
    Sub {
        #[serde(rename = "Fn::Sub")]
        sub: String,
    },
}

impl Input {
    pub fn literal(value: impl Into<String>) -> Self {
        Input::Literal(value.into())
    }

    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Input::GetAtt {
            get_att: (resource.into(), attribute.into()),
        }
    }

    /// Template with `${resource.attribute}` placeholders
    pub fn sub(template: impl Into<String>) -> Self {
        Input::Sub {
            sub: template.into(),
        }
    }

    /// Attributes this value waits on
    pub fn references(&self) -> Result<Vec<AttrRef>> {
        match self {
            Input::Literal(_) => Ok(Vec::new()),
            Input::GetAtt {
                get_att: (resource, attribute),
            } => Ok(vec![AttrRef::new(resource, attribute)]),
            Input::Sub { sub } => Ok(parse_template(sub)?
                .into_iter()
                .filter_map(|s| match s {
                    Segment::Ref(r) => Some(r),
                    Segment::Text(_) => None,
                })
                .collect()),
        }
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::literal(value)
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Literal(value)
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Text(String),
    Ref(AttrRef),
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            CloudError::InvalidConfig(format!("unterminated placeholder in {:?}", template))
        })?;
        let placeholder = &after[..end];
        // Resource ids may contain dots (file names); attribute names never do.
        let (resource, attribute) = placeholder.rsplit_once('.').ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "placeholder ${{{}}} must be resource.attribute",
                placeholder
            ))
        })?;
        if resource.is_empty() || attribute.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "placeholder ${{{}}} must be resource.attribute",
                placeholder
            )));
        }
        segments.push(Segment::Ref(AttrRef::new(resource, attribute)));
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

enum Intrinsic<'a> {
    GetAtt(&'a Value),
    Sub(&'a Value),
}

fn intrinsic(map: &Map<String, Value>) -> Option<Intrinsic<'_>> {
    if map.len() != 1 {
        return None;
    }
    if let Some(v) = map.get(GET_ATT) {
        return Some(Intrinsic::GetAtt(v));
    }
    map.get(SUB).map(Intrinsic::Sub)
}

fn get_att_ref(value: &Value) -> Result<AttrRef> {
    match value.as_array().map(|a| a.as_slice()) {
        Some([Value::String(resource), Value::String(attribute)]) => {
            Ok(AttrRef::new(resource, attribute))
        }
        _ => Err(CloudError::InvalidConfig(format!(
            "{} expects [resource, attribute], got {}",
            GET_ATT, value
        ))),
    }
}

fn sub_template(value: &Value) -> Result<&str> {
    value.as_str().ok_or_else(|| {
        CloudError::InvalidConfig(format!("{} expects a string, got {}", SUB, value))
    })
}

/// Collect every attribute reference found anywhere in a config value
pub fn references(value: &Value) -> Result<BTreeSet<AttrRef>> {
    let mut refs = BTreeSet::new();
    collect(value, &mut refs)?;
    Ok(refs)
}

fn collect(value: &Value, refs: &mut BTreeSet<AttrRef>) -> Result<()> {
    match value {
        Value::Object(map) => match intrinsic(map) {
            Some(Intrinsic::GetAtt(v)) => {
                refs.insert(get_att_ref(v)?);
            }
            Some(Intrinsic::Sub(v)) => {
                for segment in parse_template(sub_template(v)?)? {
                    if let Segment::Ref(r) = segment {
                        refs.insert(r);
                    }
                }
            }
            None => {
                for v in map.values() {
                    collect(v, refs)?;
                }
            }
        },
        Value::Array(items) => {
            for v in items {
                collect(v, refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace every reference with the realized attribute value
///
/// `lookup` returns `None` for attributes that have not resolved; that is an
/// [`CloudError::AttributeResolution`] error, never a silent empty string.
pub fn resolve<F>(value: &Value, lookup: &F) -> Result<Value>
where
    F: Fn(&AttrRef) -> Option<String>,
{
    match value {
        Value::Object(map) => match intrinsic(map) {
            Some(Intrinsic::GetAtt(v)) => {
                let r = get_att_ref(v)?;
                lookup(&r)
                    .map(Value::String)
                    .ok_or_else(|| CloudError::AttributeResolution(format!("{} is unresolved", r)))
            }
            Some(Intrinsic::Sub(v)) => {
                let mut out = String::new();
                for segment in parse_template(sub_template(v)?)? {
                    match segment {
                        Segment::Text(text) => out.push_str(&text),
                        Segment::Ref(r) => {
                            let resolved = lookup(&r).ok_or_else(|| {
                                CloudError::AttributeResolution(format!("{} is unresolved", r))
                            })?;
                            out.push_str(&resolved);
                        }
                    }
                }
                Ok(Value::String(out))
            }
            None => {
                let mut resolved = Map::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k.clone(), resolve(v, lookup)?);
                }
                Ok(Value::Object(resolved))
            }
        },
        Value::Array(items) => items
            .iter()
            .map(|v| resolve(v, lookup))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}
