//! Web server access log (Apache/nginx combined format)

use crate::common::{
    HOSTS, SCANNER_AGENTS, TemplateTable, USER_AGENTS, USERS, external_ip, internal_ip, long_tail,
    pick, template_list, unknown_template,
};
use crate::fields::{Fields, merge_scalars, text};
use chrono::Utc;
use noise_core::{
    ContentGenerator, Event, EventFormat, EventTypeDescriptor, GenerateError, Overrides, Severity,
    TemplateDescriptor,
};
use rand::Rng;
use serde_json::json;

pub const EVENT_TYPE: &str = "web_access";

const TEMPLATES: TemplateTable = &[
    ("normal_request", "Normal request", "Ordinary browsing or API traffic"),
    ("sqli_probe", "SQL injection probe", "Query string carrying SQL injection payloads"),
    ("path_traversal", "Path traversal", "Attempt to escape the web root with ../ sequences"),
    ("scanner_404", "Scanner 404", "Automated scanner requesting common admin paths"),
];

const PAGES: &[&str] = &[
    "/", "/index.html", "/login", "/dashboard", "/api/v1/orders", "/api/v1/users/me",
    "/static/js/app.js", "/static/css/main.css", "/images/logo.png", "/search?q=shoes",
];

const SQLI_PAYLOADS: &[&str] = &[
    "id=1%27%20OR%20%271%27%3D%271",
    "id=1%20UNION%20SELECT%20username,password%20FROM%20users--",
    "q=admin%27--",
    "id=1;%20DROP%20TABLE%20users",
    "id=1%20AND%20SLEEP(5)",
];

const TRAVERSAL_PATHS: &[&str] = &[
    "/download?file=../../../../etc/passwd",
    "/static/..%2f..%2f..%2fetc%2fshadow",
    "/images/....//....//....//windows/win.ini",
    "/cgi-bin/.%2e/.%2e/.%2e/.%2e/bin/sh",
];

const SCANNER_PATHS: &[&str] = &[
    "/wp-admin/", "/phpmyadmin/", "/.env", "/.git/config", "/admin.php", "/backup.zip",
    "/server-status", "/actuator/env", "/config.json", "/xmlrpc.php",
];

pub struct WebAccessGenerator;

impl ContentGenerator for WebAccessGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "Web Access Log".to_string(),
            category: "web".to_string(),
            format: EventFormat::Text,
            description: "HTTP access log lines in combined log format".to_string(),
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

        let mut fields = Fields::new();
        fields.insert("host".into(), json!(pick(&mut rng, &HOSTS[..2])));
        fields.insert("time".into(), json!(now.format("%d/%b/%Y:%H:%M:%S %z").to_string()));
        fields.insert("protocol".into(), json!("HTTP/1.1"));
        fields.insert("user".into(), json!("-"));
        fields.insert("referer".into(), json!("-"));

        let severity = match template_id {
            "normal_request" => {
                let page = pick(&mut rng, PAGES);
                let method = if page.starts_with("/api/") && rng.random_bool(0.3) { "POST" } else { "GET" };
                let status = if rng.random_bool(0.85) { 200 } else { pick_status(&mut rng, &[301, 304, 404]) };
                fields.insert("client_ip".into(), json!(if rng.random_bool(0.5) { internal_ip(&mut rng) } else { external_ip(&mut rng) }));
                if page.starts_with("/api/") {
                    fields.insert("user".into(), json!(pick(&mut rng, USERS)));
                }
                fields.insert("method".into(), json!(method));
                fields.insert("path".into(), json!(page));
                fields.insert("status".into(), json!(status));
                fields.insert("bytes".into(), json!(long_tail(&mut rng, 5_000.0, 1.0) as u64));
                fields.insert("referer".into(), json!("https://www.example.com/"));
                fields.insert("user_agent".into(), json!(pick(&mut rng, USER_AGENTS)));
                Severity::Info
            }
            "sqli_probe" => {
                fields.insert("client_ip".into(), json!(external_ip(&mut rng)));
                fields.insert("method".into(), json!("GET"));
                fields.insert(
                    "path".into(),
                    json!(format!("/products?{}", pick(&mut rng, SQLI_PAYLOADS))),
                );
                fields.insert("status".into(), json!(pick_status(&mut rng, &[403, 500, 200])));
                fields.insert("bytes".into(), json!(rng.random_range(200..2_000)));
                fields.insert("user_agent".into(), json!(SCANNER_AGENTS[0]));
                Severity::Warn
            }
            "path_traversal" => {
                fields.insert("client_ip".into(), json!(external_ip(&mut rng)));
                fields.insert("method".into(), json!("GET"));
                fields.insert("path".into(), json!(pick(&mut rng, TRAVERSAL_PATHS)));
                fields.insert("status".into(), json!(pick_status(&mut rng, &[400, 403, 404])));
                fields.insert("bytes".into(), json!(rng.random_range(150..600)));
                fields.insert("user_agent".into(), json!(pick(&mut rng, USER_AGENTS)));
                Severity::Warn
            }
            "scanner_404" => {
                fields.insert("client_ip".into(), json!(external_ip(&mut rng)));
                fields.insert("method".into(), json!(pick(&mut rng, &["GET", "GET", "HEAD"])));
                fields.insert("path".into(), json!(pick(&mut rng, SCANNER_PATHS)));
                fields.insert("status".into(), json!(404));
                fields.insert("bytes".into(), json!(rng.random_range(150..300)));
                fields.insert("user_agent".into(), json!(pick(&mut rng, SCANNER_AGENTS)));
                Severity::Info
            }
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };
        merge_scalars(&mut fields, overrides)?;

        let raw = format!(
            "{} - {} [{}] \"{} {} {}\" {} {} \"{}\" \"{}\"",
            text(&fields, "client_ip"),
            text(&fields, "user"),
            text(&fields, "time"),
            text(&fields, "method"),
            text(&fields, "path"),
            text(&fields, "protocol"),
            text(&fields, "status"),
            text(&fields, "bytes"),
            text(&fields, "referer"),
            text(&fields, "user_agent")
        );

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Text, raw);
        event.timestamp = now;
        event.severity = severity;
        event.host = text(&fields, "host");
        event.source = "nginx".to_string();
        event.sourcetype = "access_combined".to_string();
        Ok(event)
    }
}

fn pick_status<R: Rng + ?Sized>(rng: &mut R, statuses: &[u16]) -> u16 {
    statuses[rng.random_range(0..statuses.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::object;

    #[test]
    fn test_combined_log_format() {
        for template in WebAccessGenerator.templates() {
            let event = WebAccessGenerator.generate(&template.id, None).unwrap();
            let (client, rest) = event.raw.split_once(' ').unwrap();
            assert!(client.parse::<std::net::Ipv4Addr>().is_ok(), "{}", event.raw);
            assert!(rest.contains(" HTTP/1.1\" "));
            assert_eq!(event.raw.matches('"').count(), 6, "{}", event.raw);
        }
    }

    #[test]
    fn test_scanner_404() {
        let event = WebAccessGenerator.generate("scanner_404", None).unwrap();
        assert!(event.raw.contains("\" 404 "));
    }

    #[test]
    fn test_override_status_and_path() {
        let overrides = object(json!({"status": 200, "path": "/products?id=1%20OR%201=1", "client_ip": "192.0.2.10"}));
        let event = WebAccessGenerator.generate("sqli_probe", Some(&overrides)).unwrap();
        assert!(event.raw.starts_with("192.0.2.10 - - ["));
        assert!(event.raw.contains("\"GET /products?id=1%20OR%201=1 HTTP/1.1\" 200 "));
        assert_eq!(event.format, EventFormat::Text);
    }
}
