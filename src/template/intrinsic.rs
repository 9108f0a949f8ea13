//! Intrinsic function and pseudo parameter helpers.

use serde_json::{Map, Value, json};

/// `{"Ref": logical_id}`.
#[must_use]
pub fn ref_to(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`.
#[must_use]
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::ImportValue": export_name}`.
#[must_use]
pub fn import_value(export_name: &str) -> Value {
    json!({ "Fn::ImportValue": export_name })
}

/// `{"Fn::Sub": template}` resolving `${...}` against the template's own
/// resources and pseudo parameters.
#[must_use]
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{"Fn::Sub": [template, variables]}`.
#[must_use]
pub fn sub_with<I, K>(template: &str, variables: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let vars: Map<String, Value> = variables.into_iter().map(|(k, v)| (k.into(), v)).collect();
    json!({ "Fn::Sub": [template, vars] })
}

/// `{"Fn::Join": [delimiter, parts]}`.
#[must_use]
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{"Fn::Select": [index, list]}`.
#[must_use]
pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index.to_string(), list] })
}

/// `{"Fn::GetAZs": ""}`, the availability zones of the stack's region.
#[must_use]
pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

/// `{"Fn::Cidr": [ip_block, count, cidr_bits]}`.
#[must_use]
pub fn cidr(ip_block: Value, count: u8, cidr_bits: u8) -> Value {
    json!({ "Fn::Cidr": [ip_block, count.to_string(), cidr_bits.to_string()] })
}

/// `{"Fn::Base64": value}`.
#[must_use]
pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// `AWS::Partition` pseudo parameter.
#[must_use]
pub fn partition() -> Value {
    ref_to("AWS::Partition")
}

/// A CloudFormation tag list from key/value pairs.
#[must_use]
pub fn tags<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Value
where
    K: Into<Value>,
    V: Into<Value>,
{
    Value::Array(
        pairs
            .into_iter()
            .map(|(k, v)| json!({ "Key": k.into(), "Value": v.into() }))
            .collect(),
    )
}

/// IAM trust policy allowing `service` to assume a role.
#[must_use]
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// ARN of an AWS managed IAM policy.
#[must_use]
pub fn managed_policy_arn(name: &str) -> Value {
    join("", vec![json!("arn:"), partition(), json!(format!(":iam::aws:policy/{name}"))])
}

/// Allow statement for an IAM policy document.
#[must_use]
pub fn allow(actions: &[&str], resources: Vec<Value>) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resources
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functions() {
        assert_eq!(ref_to("Vpc"), json!({"Ref": "Vpc"}));
        assert_eq!(get_att("Ad", "Alias"), json!({"Fn::GetAtt": ["Ad", "Alias"]}));
        assert_eq!(import_value("a:B"), json!({"Fn::ImportValue": "a:B"}));
        assert_eq!(select(1, get_azs()), json!({"Fn::Select": ["1", {"Fn::GetAZs": ""}]}));
    }

    #[test]
    fn test_sub_with_variables() {
        let value = sub_with("${Name}-x", [("Name", ref_to("Thing"))]);
        assert_eq!(value, json!({"Fn::Sub": ["${Name}-x", {"Name": {"Ref": "Thing"}}]}));
    }

    #[test]
    fn test_tags() {
        let value = tags([("Name", "bastion"), ("domain-join", "true")]);
        assert_eq!(
            value,
            json!([{"Key": "Name", "Value": "bastion"}, {"Key": "domain-join", "Value": "true"}])
        );
    }

    #[test]
    fn test_managed_policy_arn() {
        let value = managed_policy_arn("AmazonSSMManagedInstanceCore");
        assert_eq!(value["Fn::Join"][1][2], ":iam::aws:policy/AmazonSSMManagedInstanceCore");
    }
}
