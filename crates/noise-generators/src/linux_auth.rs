//! Linux authentication log (syslog)
//!
//! `raw` is the syslog MSG part; the emitting program goes in `Event::source`
//! so senders can place it in the header.

use crate::common::{
    ATTACK_USERS, HOSTS, TemplateTable, USERS, ephemeral_port, external_ip, hex_id, internal_ip,
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

pub const EVENT_TYPE: &str = "linux_auth";

const TEMPLATES: TemplateTable = &[
    ("ssh_accepted", "SSH accepted", "Successful SSH authentication"),
    ("ssh_failed", "SSH failed", "Failed SSH password attempt"),
    ("sudo_command", "sudo", "Command executed through sudo"),
    ("user_added", "useradd", "Local user account created"),
];

const SUDO_COMMANDS: &[&str] = &[
    "/usr/bin/systemctl restart nginx",
    "/usr/bin/apt-get update",
    "/usr/bin/tail -n 200 /var/log/syslog",
    "/bin/cat /etc/shadow",
    "/usr/bin/docker ps",
    "/usr/sbin/iptables -L",
];

pub struct LinuxAuthGenerator;

impl ContentGenerator for LinuxAuthGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "Linux auth.log".to_string(),
            category: "endpoint".to_string(),
            format: EventFormat::Syslog,
            description: "sshd, sudo and useradd messages from the authpriv facility".to_string(),
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

        let mut fields = Fields::new();
        fields.insert("host".into(), json!(pick(&mut rng, HOSTS)));
        fields.insert("pid".into(), json!(rng.random_range(1000..65000)));

        let (program, severity) = match template_id {
            "ssh_accepted" => {
                fields.insert("user".into(), json!(pick(&mut rng, USERS)));
                fields.insert("src_ip".into(), json!(internal_ip(&mut rng)));
                fields.insert("src_port".into(), json!(ephemeral_port(&mut rng)));
                fields.insert("method".into(), json!(pick(&mut rng, &["publickey", "publickey", "password"])));
                fields.insert("fingerprint".into(), json!(format!("SHA256:{}", hex_id(&mut rng, 43))));
                ("sshd", Severity::Info)
            }
            "ssh_failed" => {
                fields.insert("user".into(), json!(pick(&mut rng, ATTACK_USERS)));
                fields.insert("src_ip".into(), json!(external_ip(&mut rng)));
                fields.insert("src_port".into(), json!(ephemeral_port(&mut rng)));
                fields.insert("invalid_user".into(), json!(rng.random_bool(0.6)));
                ("sshd", Severity::Warn)
            }
            "sudo_command" => {
                let user = pick(&mut rng, USERS);
                fields.insert("user".into(), json!(user));
                fields.insert("tty".into(), json!(format!("pts/{}", rng.random_range(0..6))));
                fields.insert("pwd".into(), json!(format!("/home/{}", user)));
                fields.insert("target_user".into(), json!("root"));
                fields.insert("command".into(), json!(pick(&mut rng, SUDO_COMMANDS)));
                ("sudo", Severity::Info)
            }
            "user_added" => {
                let uid = rng.random_range(1001..1100);
                let name = format!("{}{}", pick(&mut rng, &["backup", "deploy", "support", "test"]), rng.random_range(1..10));
                fields.insert("new_user".into(), json!(name));
                fields.insert("uid".into(), json!(uid));
                fields.insert("gid".into(), json!(uid));
                fields.insert("home".into(), json!(format!("/home/{}", name)));
                fields.insert("shell".into(), json!("/bin/bash"));
                ("useradd", Severity::Warn)
            }
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };
        merge_scalars(&mut fields, overrides)?;

        let raw = match template_id {
            "ssh_accepted" => format!(
                "Accepted {} for {} from {} port {} ssh2: RSA {}",
                text(&fields, "method"),
                text(&fields, "user"),
                text(&fields, "src_ip"),
                text(&fields, "src_port"),
                text(&fields, "fingerprint")
            ),
            "ssh_failed" => {
                let invalid = matches!(fields.get("invalid_user"), Some(v) if v.as_bool() == Some(true));
                format!(
                    "Failed password for {}{} from {} port {} ssh2",
                    if invalid { "invalid user " } else { "" },
                    text(&fields, "user"),
                    text(&fields, "src_ip"),
                    text(&fields, "src_port")
                )
            }
            "sudo_command" => format!(
                "{} : TTY={} ; PWD={} ; USER={} ; COMMAND={}",
                text(&fields, "user"),
                text(&fields, "tty"),
                text(&fields, "pwd"),
                text(&fields, "target_user"),
                text(&fields, "command")
            ),
            _ => format!(
                "new user: name={}, UID={}, GID={}, home={}, shell={}, from=/dev/pts/0",
                text(&fields, "new_user"),
                text(&fields, "uid"),
                text(&fields, "gid"),
                text(&fields, "home"),
                text(&fields, "shell")
            ),
        };

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Syslog, raw);
        event.timestamp = Utc::now();
        event.severity = severity;
        event.host = text(&fields, "host");
        event.source = program.to_string();
        event.sourcetype = "linux_secure".to_string();
        Ok(event)
    }
}
