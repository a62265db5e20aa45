//! Perimeter firewall traffic log (syslog, key=value)

use crate::common::{
    TemplateTable, ephemeral_port, external_ip, internal_ip, long_tail, pick, template_list,
    unknown_template,
};
use crate::fields::{Fields, merge_scalars, ordered_keys, text};
use chrono::Utc;
use noise_core::{
    ContentGenerator, Event, EventFormat, EventTypeDescriptor, GenerateError, Overrides, Severity,
    TemplateDescriptor,
};
use rand::Rng;
use serde_json::{Value, json};

pub const EVENT_TYPE: &str = "firewall";

const TEMPLATES: TemplateTable = &[
    ("allow", "Allowed session", "Outbound session permitted by policy"),
    ("deny", "Denied session", "Inbound connection dropped by policy"),
    ("port_scan", "Port scan", "Sequential probes from a single source across many ports"),
];

const FIELD_ORDER: &[&str] = &[
    "date", "time", "devname", "logid", "type", "subtype", "level", "action", "policyid", "srcip",
    "srcport", "srcintf", "dstip", "dstport", "dstintf", "proto", "service", "duration",
    "sentbyte", "rcvdbyte", "attack", "msg",
];

const DEVICES: &[&str] = &["fw-edge-01", "fw-edge-02", "fw-dc-core"];

/// `(port, service)` pairs for allowed outbound traffic
const SERVICES: &[(u16, &str)] = &[(443, "HTTPS"), (443, "HTTPS"), (80, "HTTP"), (53, "DNS"), (123, "NTP"), (22, "SSH")];

const SCANNED_PORTS: &[u16] = &[21, 22, 23, 25, 80, 110, 135, 139, 143, 443, 445, 1433, 3306, 3389, 5432, 5900, 8080];

pub struct FirewallGenerator;

impl ContentGenerator for FirewallGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "Firewall".to_string(),
            category: "network".to_string(),
            format: EventFormat::Syslog,
            description: "Next-generation firewall traffic log in key=value form".to_string(),
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
        let device = pick(&mut rng, DEVICES);

        let mut fields = Fields::new();
        fields.insert("date".into(), json!(now.format("%Y-%m-%d").to_string()));
        fields.insert("time".into(), json!(now.format("%H:%M:%S").to_string()));
        fields.insert("devname".into(), json!(device));
        fields.insert("type".into(), json!("traffic"));
        fields.insert("subtype".into(), json!("forward"));
        fields.insert("proto".into(), json!(6));

        let severity = match template_id {
            "allow" => {
                let (port, service) = SERVICES[rng.random_range(0..SERVICES.len())];
                fields.insert("logid".into(), json!("0000000013"));
                fields.insert("level".into(), json!("notice"));
                fields.insert("action".into(), json!("accept"));
                fields.insert("policyid".into(), json!(rng.random_range(1..40)));
                fields.insert("srcip".into(), json!(internal_ip(&mut rng)));
                fields.insert("srcport".into(), json!(ephemeral_port(&mut rng)));
                fields.insert("srcintf".into(), json!("internal"));
                fields.insert("dstip".into(), json!(external_ip(&mut rng)));
                fields.insert("dstport".into(), json!(port));
                fields.insert("dstintf".into(), json!("wan1"));
                if port == 53 || port == 123 {
                    fields.insert("proto".into(), json!(17));
                }
                fields.insert("service".into(), json!(service));
                fields.insert("duration".into(), json!(rng.random_range(1..600)));
                fields.insert("sentbyte".into(), json!(long_tail(&mut rng, 2_000.0, 1.2) as u64));
                fields.insert("rcvdbyte".into(), json!(long_tail(&mut rng, 40_000.0, 1.5) as u64));
                Severity::Info
            }
            "deny" => {
                fields.insert("logid".into(), json!("0000000011"));
                fields.insert("level".into(), json!("warning"));
                fields.insert("action".into(), json!("deny"));
                fields.insert("policyid".into(), json!(0));
                fields.insert("srcip".into(), json!(external_ip(&mut rng)));
                fields.insert("srcport".into(), json!(ephemeral_port(&mut rng)));
                fields.insert("srcintf".into(), json!("wan1"));
                fields.insert("dstip".into(), json!(internal_ip(&mut rng)));
                fields.insert("dstport".into(), json!(pick_port(&mut rng)));
                fields.insert("dstintf".into(), json!("dmz"));
                fields.insert("sentbyte".into(), json!(rng.random_range(40..120)));
                fields.insert("rcvdbyte".into(), json!(0));
                fields.insert("msg".into(), json!("Denied by forward policy check"));
                Severity::Warn
            }
            "port_scan" => {
                fields.insert("logid".into(), json!("0419016384"));
                fields.insert("type".into(), json!("utm"));
                fields.insert("subtype".into(), json!("anomaly"));
                fields.insert("level".into(), json!("alert"));
                fields.insert("action".into(), json!("drop"));
                fields.insert("srcip".into(), json!(external_ip(&mut rng)));
                fields.insert("srcport".into(), json!(ephemeral_port(&mut rng)));
                fields.insert("srcintf".into(), json!("wan1"));
                fields.insert("dstip".into(), json!(internal_ip(&mut rng)));
                fields.insert("dstport".into(), json!(pick_port(&mut rng)));
                fields.insert("attack".into(), json!("tcp_port_scan"));
                fields.insert(
                    "msg".into(),
                    json!(format!("anomaly: tcp_port_scan, {} > threshold 1000", rng.random_range(1001..5000))),
                );
                Severity::Error
            }
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };
        merge_scalars(&mut fields, overrides)?;

        let raw = ordered_keys(&fields, FIELD_ORDER)
            .into_iter()
            .map(|key| format!("{}={}", key, kv_value(fields.get(key))))
            .collect::<Vec<_>>()
            .join(" ");

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Syslog, raw);
        event.timestamp = now;
        event.severity = severity;
        event.host = text(&fields, "devname");
        event.source = "firewall".to_string();
        event.sourcetype = "fgt_traffic".to_string();
        Ok(event)
    }
}

fn pick_port<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    SCANNED_PORTS[rng.random_range(0..SCANNED_PORTS.len())]
}

/// Strings are quoted, numbers and booleans bare.
fn kv_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => format!("\"{}\"", s.replace('"', "\\\"")),
        Some(Value::Null) | None => "\"\"".to_string(),
        Some(other) => other.to_string(),
    }
}
