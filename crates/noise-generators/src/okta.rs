//! Okta System Log (JSON)

use crate::common::{
    TemplateTable, USER_AGENTS, USERS, external_ip, hex_id, pick, template_list, unknown_template,
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

pub const EVENT_TYPE: &str = "okta_system_log";

const TEMPLATES: TemplateTable = &[
    ("session_start", "Session start", "User signed in to Okta"),
    ("mfa_challenge_failed", "MFA challenge failed", "User failed a multi-factor challenge"),
    ("password_reset", "Password reset", "Password reset by the user or an administrator"),
];

const ORG_DOMAIN: &str = "example.com";

/// `(city, state, country)`
const LOCATIONS: &[(&str, &str, &str)] = &[
    ("San Francisco", "California", "United States"),
    ("New York", "New York", "United States"),
    ("London", "England", "United Kingdom"),
    ("Frankfurt am Main", "Hesse", "Germany"),
    ("Singapore", "Singapore", "Singapore"),
    ("Lagos", "Lagos", "Nigeria"),
];

const FACTORS: &[&str] = &["OKTA_VERIFY_PUSH", "TOTP", "SMS", "WEBAUTHN"];

pub struct OktaSystemLogGenerator;

fn actor<R: Rng + ?Sized>(rng: &mut R, user: &str) -> Value {
    json!({
        "id": format!("00u{}", hex_id(rng, 17)),
        "type": "User",
        "alternateId": format!("{}@{}", user, ORG_DOMAIN),
        "displayName": capitalize(user),
    })
}

fn capitalize(user: &str) -> String {
    let mut chars = user.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ContentGenerator for OktaSystemLogGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "Okta System Log".to_string(),
            category: "identity".to_string(),
            format: EventFormat::Json,
            description: "Identity provider sign-in, MFA and credential lifecycle events".to_string(),
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
        let user = pick(&mut rng, USERS);
        let (city, state, country) = LOCATIONS[rng.random_range(0..LOCATIONS.len())];

        let (event_type, display, outcome, reason, severity) = match template_id {
            "session_start" => (
                "user.session.start",
                "User login to Okta",
                "SUCCESS",
                Value::Null,
                Severity::Info,
            ),
            "mfa_challenge_failed" => (
                "user.authentication.auth_via_mfa",
                "Authentication of user via MFA",
                "FAILURE",
                json!(pick(&mut rng, &["INVALID_CREDENTIALS", "VERIFY_PUSH_REJECTED", "PASSCODE_EXPIRED"])),
                Severity::Warn,
            ),
            "password_reset" => (
                "user.account.reset_password",
                "Fired when the user's Okta password is reset",
                "SUCCESS",
                Value::Null,
                Severity::Info,
            ),
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };

        let level = if severity == Severity::Warn { "WARN" } else { "INFO" };
        let mut fields = object(json!({
            "uuid": Uuid::new_v4().to_string(),
            "published": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "eventType": event_type,
            "version": "0",
            "severity": level,
            "displayMessage": display,
            "legacyEventType": Value::Null,
            "actor": actor(&mut rng, user),
            "client": {
                "ipAddress": external_ip(&mut rng),
                "userAgent": {"rawUserAgent": pick(&mut rng, USER_AGENTS)},
                "zone": "null",
                "device": "Computer",
                "geographicalContext": {"city": city, "state": state, "country": country},
            },
            "outcome": {"result": outcome, "reason": reason},
            "transaction": {"type": "WEB", "id": hex_id(&mut rng, 24)},
            "authenticationContext": {
                "authenticationStep": 0,
                "externalSessionId": format!("102{}", hex_id(&mut rng, 22)),
            },
        }));

        match template_id {
            "mfa_challenge_failed" => {
                fields.insert(
                    "debugContext".into(),
                    json!({"debugData": {"factor": pick(&mut rng, FACTORS), "factorIntent": "AUTHENTICATION"}}),
                );
            }
            "password_reset" => {
                let by_admin = rng.random_bool(0.3);
                let target = actor(&mut rng, user);
                if by_admin {
                    fields.insert("actor".into(), actor(&mut rng, "helpdesk"));
                }
                fields.insert("target".into(), json!([target]));
            }
            _ => {}
        }
        merge(&mut fields, overrides);

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Json, render_json(fields)?);
        event.timestamp = now;
        event.severity = severity;
        event.host = format!("{}.okta.com", ORG_DOMAIN.split('.').next().unwrap_or_default());
        event.source = "okta".to_string();
        event.sourcetype = "OktaIM2:log".to_string();
        Ok(event)
    }
}
