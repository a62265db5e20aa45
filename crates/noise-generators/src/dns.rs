//! DNS resolver query logs (JSON)

use crate::common::{
    DOMAINS, MALICIOUS_DOMAINS, TemplateTable, dga_domain, external_ip, internal_ip, long_tail,
    pick, template_list, unknown_template,
};
use crate::fields::{merge, object, render_json};
use chrono::{SecondsFormat, Utc};
use noise_core::{
    ContentGenerator, Event, EventFormat, EventTypeDescriptor, GenerateError, Overrides, Severity,
    TemplateDescriptor,
};
use rand::Rng;
use serde_json::{Value, json};

pub const EVENT_TYPE: &str = "dns_query";

const TEMPLATES: TemplateTable = &[
    ("query_allowed", "Allowed query", "Resolved lookup of a well-known domain"),
    ("query_blocked", "Blocked query", "Lookup denied by a DNS security policy"),
    ("nxdomain", "NXDOMAIN", "Lookup of a name that does not exist"),
    ("dga_lookup", "DGA lookup", "Lookup of an algorithmically generated domain"),
];

const RESOLVERS: &[&str] = &["dns-resolver-01", "dns-resolver-02"];
const QUERY_TYPES: &[&str] = &["A", "A", "A", "AAAA", "CNAME", "MX", "TXT"];
const BLOCK_CATEGORIES: &[&str] = &["malware", "phishing", "command-and-control", "newly-registered"];

pub struct DnsQueryGenerator;

impl ContentGenerator for DnsQueryGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "DNS Query".to_string(),
            category: "network".to_string(),
            format: EventFormat::Json,
            description: "Recursive resolver query log with response code and policy action"
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
        let resolver = pick(&mut rng, RESOLVERS);

        let (query, query_type, rcode, action, severity) = match template_id {
            "query_allowed" => {
                let sub = pick(&mut rng, &["www", "api", "login", "cdn", "mail"]);
                let query = format!("{}.{}", sub, pick(&mut rng, DOMAINS));
                (query, pick(&mut rng, QUERY_TYPES), "NOERROR", "allowed", Severity::Info)
            }
            "query_blocked" => (
                pick(&mut rng, MALICIOUS_DOMAINS).to_string(),
                "A",
                "REFUSED",
                "blocked",
                Severity::Warn,
            ),
            "nxdomain" => {
                let query = format!("{}.corp.internal", pick(&mut rng, &["printer-3", "old-wiki", "jira-test", "wpad"]));
                (query, "A", "NXDOMAIN", "allowed", Severity::Info)
            }
            "dga_lookup" => (dga_domain(&mut rng), "A", "NXDOMAIN", "allowed", Severity::Warn),
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };

        let answers: Vec<Value> = if rcode == "NOERROR" {
            (0..rng.random_range(1..4))
                .map(|_| Value::String(external_ip(&mut rng)))
                .collect()
        } else {
            Vec::new()
        };

        let mut fields = object(json!({
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "resolver": resolver,
            "client_ip": internal_ip(&mut rng),
            "query": query,
            "query_type": query_type,
            "response_code": rcode,
            "answers": answers,
            "action": action,
            "latency_ms": (long_tail(&mut rng, 12.0, 0.7) * 100.0).round() / 100.0,
            "protocol": "udp",
        }));
        if action == "blocked" {
            fields.insert("category".into(), json!(pick(&mut rng, BLOCK_CATEGORIES)));
            fields.insert("policy".into(), json!("default-security-policy"));
        }
        merge(&mut fields, overrides);

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Json, render_json(fields)?);
        event.timestamp = now;
        event.severity = severity;
        event.host = resolver.to_string();
        event.source = "dns".to_string();
        event.sourcetype = "dns:query".to_string();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(event: &Event) -> Value {
        serde_json::from_str(&event.raw).unwrap()
    }

    #[test]
    fn test_every_template_renders_json() {
        let generator = DnsQueryGenerator;
        for template in generator.templates() {
            let event = generator.generate(&template.id, None).unwrap();
            assert_eq!(event.event_type_id, EVENT_TYPE);
            assert_eq!(event.template_id, template.id);
            assert_eq!(event.format, EventFormat::Json);
            assert!(parse(&event)["query"].is_string());
        }
    }

    #[test]
    fn test_blocked_query_carries_policy() {
        let event = DnsQueryGenerator.generate("query_blocked", None).unwrap();
        let raw = parse(&event);
        assert_eq!(raw["action"], "blocked");
        assert_eq!(raw["response_code"], "REFUSED");
        assert!(raw["category"].is_string());
        assert_eq!(event.severity, Severity::Warn);
    }

    #[test]
    fn test_nxdomain_has_no_answers() {
        let raw = parse(&DnsQueryGenerator.generate("nxdomain", None).unwrap());
        assert_eq!(raw["answers"], json!([]));
    }

    #[test]
    fn test_overrides_win() {
        let overrides = object(json!({"query": "evil.example", "answers": ["203.0.113.9"]}));
        let raw = parse(&DnsQueryGenerator.generate("query_allowed", Some(&overrides)).unwrap());
        assert_eq!(raw["query"], "evil.example");
        assert_eq!(raw["answers"], json!(["203.0.113.9"]));
    }

    #[test]
    fn test_unknown_template() {
        let err = DnsQueryGenerator.generate("zone_transfer", None).unwrap_err();
        assert!(matches!(err, GenerateError::UnknownTemplate { .. }));
    }
}
