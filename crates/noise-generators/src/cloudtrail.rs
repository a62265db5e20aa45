//! AWS CloudTrail management events (JSON)

use crate::common::{
    ATTACK_USERS, TemplateTable, USER_AGENTS, USERS, external_ip, hex_id, pick, template_list,
    unknown_template,
};
use crate::fields::{merge, object, render_json};
use chrono::{SecondsFormat, Utc};
use noise_core::{
    ContentGenerator, Event, EventFormat, EventTypeDescriptor, GenerateError, Overrides, Severity,
    TemplateDescriptor,
};
use rand::Rng;
use serde_json::{Value, json};
use uuid::Uuid;

pub const EVENT_TYPE: &str = "aws_cloudtrail";

const TEMPLATES: TemplateTable = &[
    ("console_login", "Console login", "Successful AWS console sign-in"),
    ("console_login_failed", "Failed console login", "Console sign-in rejected for bad credentials"),
    ("assume_role", "AssumeRole", "STS role assumption by a user or service"),
    ("s3_get_object", "S3 GetObject", "Object read from an S3 bucket (data event)"),
    ("iam_create_user", "IAM CreateUser", "New IAM user created"),
];

const REGIONS: &[&str] = &["us-east-1", "us-east-2", "us-west-2", "eu-west-1", "eu-central-1"];
const BUCKETS: &[&str] = &["corp-finance-reports", "app-static-assets", "ml-training-data", "backup-archive-prod"];
const ROLES: &[&str] = &["OrganizationAccountAccessRole", "ReadOnlyAudit", "DeployPipeline", "BreakGlassAdmin"];

pub struct CloudTrailGenerator;

fn account_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:012}", rng.random_range(100_000_000_000u64..999_999_999_999))
}

fn iam_user<R: Rng + ?Sized>(rng: &mut R, account: &str, user: &str) -> Value {
    json!({
        "type": "IAMUser",
        "principalId": format!("AIDA{}", hex_id(rng, 16).to_uppercase()),
        "arn": format!("arn:aws:iam::{}:user/{}", account, user),
        "accountId": account,
        "userName": user,
    })
}

impl ContentGenerator for CloudTrailGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "AWS CloudTrail".to_string(),
            category: "cloud".to_string(),
            format: EventFormat::Json,
            description: "CloudTrail management and data events for IAM, STS, S3 and sign-in"
                .to_string(),
        }
    }

    fn templates(&self) -> Vec<TemplateDescriptor> {
        template_list(TEMPLATES)
    }

    fn generate(
        &self,
        template_id: &str,
        overrides: Option<&Overrides>,
    ) -> Result<Event, GenerateError> {
        let mut rng = rand::rng();
        let now = Utc::now();
        let account = account_id(&mut rng);
        let region = pick(&mut rng, REGIONS);
        let user = pick(&mut rng, USERS);
        let source_ip = external_ip(&mut rng);

        let mut fields = object(json!({
            "eventVersion": "1.08",
            "eventTime": now.to_rfc3339_opts(SecondsFormat::Secs, true),
            "awsRegion": region,
            "sourceIPAddress": source_ip,
            "userAgent": pick(&mut rng, USER_AGENTS),
            "eventID": Uuid::new_v4().to_string(),
            "eventType": "AwsApiCall",
            "managementEvent": true,
            "recipientAccountId": account,
        }));

        let severity = match template_id {
            "console_login" => {
                fields.insert("eventSource".into(), json!("signin.amazonaws.com"));
                fields.insert("eventName".into(), json!("ConsoleLogin"));
                fields.insert("eventType".into(), json!("AwsConsoleSignIn"));
                fields.insert("userIdentity".into(), iam_user(&mut rng, &account, user));
                fields.insert("responseElements".into(), json!({"ConsoleLogin": "Success"}));
                let mfa = if rng.random_bool(0.8) { "Yes" } else { "No" };
                fields.insert(
                    "additionalEventData".into(),
                    json!({"MFAUsed": mfa, "MobileVersion": "No"}),
                );
                Severity::Info
            }
            "console_login_failed" => {
                let target = pick(&mut rng, ATTACK_USERS);
                fields.insert("eventSource".into(), json!("signin.amazonaws.com"));
                fields.insert("eventName".into(), json!("ConsoleLogin"));
                fields.insert("eventType".into(), json!("AwsConsoleSignIn"));
                fields.insert("userIdentity".into(), iam_user(&mut rng, &account, target));
                fields.insert("responseElements".into(), json!({"ConsoleLogin": "Failure"}));
                fields.insert("errorMessage".into(), json!("Failed authentication"));
                fields.insert("additionalEventData".into(), json!({"MFAUsed": "No"}));
                Severity::Warn
            }
            "assume_role" => {
                let role = pick(&mut rng, ROLES);
                let session = format!("{}-{}", user, rng.random_range(1000..9999));
                fields.insert("eventSource".into(), json!("sts.amazonaws.com"));
                fields.insert("eventName".into(), json!("AssumeRole"));
                fields.insert("userIdentity".into(), iam_user(&mut rng, &account, user));
                fields.insert(
                    "requestParameters".into(),
                    json!({
                        "roleArn": format!("arn:aws:iam::{}:role/{}", account, role),
                        "roleSessionName": session,
                        "durationSeconds": 3600,
                    }),
                );
                fields.insert(
                    "responseElements".into(),
                    json!({
                        "assumedRoleUser": {
                            "arn": format!("arn:aws:sts::{}:assumed-role/{}/{}", account, role, session),
                        },
                        "credentials": {"accessKeyId": format!("ASIA{}", hex_id(&mut rng, 16).to_uppercase())},
                    }),
                );
                if role == "BreakGlassAdmin" {
                    Severity::Warn
                } else {
                    Severity::Info
                }
            }
            "s3_get_object" => {
                let bucket = pick(&mut rng, BUCKETS);
                let key = format!(
                    "{}/{}/{}.{}",
                    pick(&mut rng, &["exports", "reports", "uploads", "tmp"]),
                    now.format("%Y/%m/%d"),
                    hex_id(&mut rng, 12),
                    pick(&mut rng, &["csv", "json", "parquet", "pdf"])
                );
                fields.insert("eventSource".into(), json!("s3.amazonaws.com"));
                fields.insert("eventName".into(), json!("GetObject"));
                fields.insert("eventCategory".into(), json!("Data"));
                fields.insert("managementEvent".into(), json!(false));
                fields.insert("readOnly".into(), json!(true));
                fields.insert("userIdentity".into(), iam_user(&mut rng, &account, user));
                fields.insert(
                    "requestParameters".into(),
                    json!({"bucketName": bucket, "key": key, "Host": format!("{}.s3.{}.amazonaws.com", bucket, region)}),
                );
                fields.insert(
                    "resources".into(),
                    json!([{"type": "AWS::S3::Object", "ARN": format!("arn:aws:s3:::{}/{}", bucket, key)}]),
                );
                Severity::Info
            }
            "iam_create_user" => {
                let new_user = format!("{}-{}", pick(&mut rng, &["svc", "tmp", "ext", "backup"]), hex_id(&mut rng, 4));
                fields.insert("eventSource".into(), json!("iam.amazonaws.com"));
                fields.insert("eventName".into(), json!("CreateUser"));
                fields.insert("awsRegion".into(), json!("us-east-1"));
                fields.insert("userIdentity".into(), iam_user(&mut rng, &account, user));
                fields.insert("requestParameters".into(), json!({"userName": new_user}));
                fields.insert(
                    "responseElements".into(),
                    json!({
                        "user": {
                            "userName": new_user,
                            "arn": format!("arn:aws:iam::{}:user/{}", account, new_user),
                            "createDate": now.format("%b %e, %Y %l:%M:%S %p").to_string(),
                        }
                    }),
                );
                Severity::Warn
            }
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };
        merge(&mut fields, overrides);

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Json, render_json(fields)?);
        event.timestamp = now;
        event.severity = severity;
        event.host = format!("{}.amazonaws.com", region);
        event.source = "cloudtrail".to_string();
        event.sourcetype = "aws:cloudtrail".to_string();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(template: &str) -> Value {
        let event = CloudTrailGenerator.generate(template, None).unwrap();
        serde_json::from_str(&event.raw).unwrap()
    }

    #[test]
    fn test_every_template_has_core_fields() {
        for template in CloudTrailGenerator.templates() {
            let raw = generate(&template.id);
            assert!(raw["eventName"].is_string(), "{}", template.id);
            assert!(raw["eventSource"].is_string());
            assert_eq!(raw["userIdentity"]["type"], "IAMUser");
            assert_eq!(raw["recipientAccountId"].as_str().unwrap().len(), 12);
        }
    }

    #[test]
    fn test_failed_login() {
        let raw = generate("console_login_failed");
        assert_eq!(raw["eventName"], "ConsoleLogin");
        assert_eq!(raw["responseElements"]["ConsoleLogin"], "Failure");
        assert_eq!(raw["errorMessage"], "Failed authentication");
    }

    #[test]
    fn test_assume_role_arns_share_account() {
        let raw = generate("assume_role");
        let account = raw["recipientAccountId"].as_str().unwrap();
        let role_arn = raw["requestParameters"]["roleArn"].as_str().unwrap();
        assert!(role_arn.starts_with(&format!("arn:aws:iam::{}:role/", account)));
    }

    #[test]
    fn test_nested_override_replaces_identity() {
        let overrides = object(json!({"userIdentity": {"type": "Root"}, "awsRegion": "ap-south-1"}));
        let event = CloudTrailGenerator.generate("iam_create_user", Some(&overrides)).unwrap();
        let raw: Value = serde_json::from_str(&event.raw).unwrap();
        assert_eq!(raw["userIdentity"], json!({"type": "Root"}));
        assert_eq!(raw["awsRegion"], "ap-south-1");
        assert_eq!(event.severity, Severity::Warn);
    }
}
