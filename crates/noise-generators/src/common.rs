//! Shared randomness and vocabulary for the generators

use noise_core::{GenerateError, TemplateDescriptor};
use rand::Rng;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand_distr::LogNormal;

/// `(id, name, description)` rows backing `ContentGenerator::templates`
pub(crate) type TemplateTable = &'static [(&'static str, &'static str, &'static str)];

pub(crate) fn template_list(table: TemplateTable) -> Vec<TemplateDescriptor> {
    table
        .iter()
        .map(|(id, name, description)| TemplateDescriptor::new(id, name, description))
        .collect()
}

pub(crate) fn unknown_template(event_type: &str, template_id: &str) -> GenerateError {
    GenerateError::UnknownTemplate {
        event_type: event_type.to_string(),
        template: template_id.to_string(),
    }
}

pub(crate) const USERS: &[&str] = &[
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy",
    "mallory", "oscar", "peggy", "svc_backup", "svc_deploy",
];

/// Names seen in password spraying and brute force
pub(crate) const ATTACK_USERS: &[&str] = &[
    "admin", "root", "administrator", "test", "guest", "oracle", "postgres", "ubuntu", "user",
];

pub(crate) const HOSTS: &[&str] = &[
    "web-01", "web-02", "app-01", "app-02", "db-01", "bastion-01", "build-01", "fileserver-01",
];

pub(crate) const WORKSTATIONS: &[&str] = &[
    "WS-FIN-014", "WS-ENG-203", "WS-HR-007", "WS-OPS-112", "LAPTOP-7QK2M", "LAPTOP-X91B3",
];

pub(crate) const DOMAINS: &[&str] = &[
    "google.com", "microsoft.com", "github.com", "slack.com", "zoom.us", "office365.com",
    "amazonaws.com", "cloudflare.com", "salesforce.com", "okta.com", "windowsupdate.com",
];

pub(crate) const MALICIOUS_DOMAINS: &[&str] = &[
    "login-verify-account.net", "secure-update-center.info", "cdn-static-files.top",
    "paypa1-support.com", "free-crypto-drop.xyz",
];

pub(crate) const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
    "Go-http-client/1.1",
];

pub(crate) const SCANNER_AGENTS: &[&str] = &[
    "sqlmap/1.7.2#stable (https://sqlmap.org)",
    "Mozilla/5.00 (Nikto/2.5.0) (Evasions:None) (Test:000003)",
    "Mozilla/5.0 zgrab/0.x",
    "masscan/1.3 (https://github.com/robertdavidgraham/masscan)",
    "Nuclei - Open-source project (github.com/projectdiscovery/nuclei)",
];

pub(crate) fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

/// RFC 1918 address
pub(crate) fn internal_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    match rng.random_range(0..3) {
        0 => format!(
            "10.{}.{}.{}",
            rng.random_range(0..255),
            rng.random_range(0..255),
            rng.random_range(1..255)
        ),
        1 => format!(
            "172.{}.{}.{}",
            rng.random_range(16..32),
            rng.random_range(0..255),
            rng.random_range(1..255)
        ),
        _ => format!(
            "192.168.{}.{}",
            rng.random_range(0..255),
            rng.random_range(1..255)
        ),
    }
}

/// Publicly routable looking address, skipping the private and loopback blocks
pub(crate) fn external_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = loop {
        let octet = rng.random_range(11..224);
        if octet != 127 && octet != 172 && octet != 192 {
            break octet;
        }
    };
    format!(
        "{}.{}.{}.{}",
        first,
        rng.random_range(0..255),
        rng.random_range(0..255),
        rng.random_range(1..255)
    )
}

pub(crate) fn ephemeral_port<R: Rng + ?Sized>(rng: &mut R) -> u16 {
    rng.random_range(49152..65535)
}

/// Algorithmically generated looking domain
pub(crate) fn dga_domain<R: Rng + ?Sized>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let len = rng.random_range(12..24);
    let label: String = (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}.{}", label, pick(rng, &["com", "net", "info", "biz", "top", "xyz"]))
}

/// Log-normal sample around `median`, for latencies and byte counts with a long tail
pub(crate) fn long_tail<R: Rng + ?Sized>(rng: &mut R, median: f64, sigma: f64) -> f64 {
    LogNormal::new(median.ln(), sigma)
        .map(|dist| dist.sample(rng))
        .unwrap_or(median)
}

pub(crate) fn hex_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    (0..len).map(|_| HEX[rng.random_range(0..16)] as char).collect()
}
