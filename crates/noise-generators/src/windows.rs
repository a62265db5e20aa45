//! Windows Security event log (XML)
//!
//! Renders the `<Event>` document the Security channel produces, with
//! `<System>` header fields and one `<Data Name=..>` element per field.

use crate::common::{
    ATTACK_USERS, TemplateTable, USERS, WORKSTATIONS, external_ip, internal_ip, pick,
    template_list, unknown_template,
};
use crate::fields::{Fields, merge_scalars, ordered_keys, text, xml_escape};
use chrono::{SecondsFormat, Utc};
use noise_core::{
    ContentGenerator, Event, EventFormat, EventTypeDescriptor, GenerateError, Overrides, Severity,
    TemplateDescriptor,
};
use rand::Rng;
use serde_json::json;
use std::fmt::Write;

pub const EVENT_TYPE: &str = "windows_security";

const TEMPLATES: TemplateTable = &[
    ("logon_success", "4624 Logon", "An account was successfully logged on"),
    ("logon_failure", "4625 Logon failure", "An account failed to log on"),
    ("process_creation", "4688 Process creation", "A new process has been created"),
    ("user_created", "4720 User created", "A user account was created"),
];

const PROVIDER: &str = "Microsoft-Windows-Security-Auditing";
const PROVIDER_GUID: &str = "{54849625-5478-4994-A5BA-3E3B0328C30D}";
const KEYWORDS_SUCCESS: &str = "0x8020000000000000";
const KEYWORDS_FAILURE: &str = "0x8010000000000000";
const DOMAIN: &str = "CORP";

/// Header fields, rendered under `<System>` instead of `<EventData>`
const SYSTEM_KEYS: &[&str] = &["EventID", "Computer", "EventRecordID", "Keywords", "TimeCreated"];

const LOGON_KEYS: &[&str] = &[
    "SubjectUserSid", "SubjectUserName", "SubjectDomainName", "TargetUserName",
    "TargetDomainName", "LogonType", "LogonProcessName", "AuthenticationPackageName",
    "WorkstationName", "IpAddress", "IpPort",
];
const FAILURE_KEYS: &[&str] = &[
    "TargetUserName", "TargetDomainName", "Status", "FailureReason", "SubStatus", "LogonType",
    "LogonProcessName", "AuthenticationPackageName", "WorkstationName", "IpAddress", "IpPort",
];
const PROCESS_KEYS: &[&str] = &[
    "SubjectUserName", "SubjectDomainName", "NewProcessId", "NewProcessName", "TokenElevationType",
    "ProcessId", "CommandLine", "ParentProcessName",
];
const USER_CREATED_KEYS: &[&str] = &[
    "TargetUserName", "TargetDomainName", "TargetSid", "SubjectUserName", "SubjectDomainName",
    "SamAccountName", "UserAccountControl",
];

const PROCESSES: &[(&str, &str, &str)] = &[
    ("C:\\Windows\\System32\\cmd.exe", "cmd.exe /c whoami /all", "C:\\Windows\\explorer.exe"),
    (
        "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe",
        "powershell.exe -NoProfile -ExecutionPolicy Bypass -EncodedCommand SQBFAFgAIAAoAE4AZQB3AC0ATwBiAGoA",
        "C:\\Program Files\\Microsoft Office\\root\\Office16\\WINWORD.EXE",
    ),
    ("C:\\Windows\\System32\\notepad.exe", "notepad.exe C:\\Users\\Public\\notes.txt", "C:\\Windows\\explorer.exe"),
    ("C:\\Windows\\System32\\net.exe", "net user /domain", "C:\\Windows\\System32\\cmd.exe"),
    ("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe", "chrome.exe --type=renderer", "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"),
];

fn sid<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "S-1-5-21-{}-{}-{}-{}",
        rng.random_range(1_000_000_000u32..4_000_000_000),
        rng.random_range(1_000_000_000u32..4_000_000_000),
        rng.random_range(1_000_000_000u32..4_000_000_000),
        rng.random_range(1100..9999)
    )
}

pub struct WindowsSecurityGenerator;

impl ContentGenerator for WindowsSecurityGenerator {
    fn event_type(&self) -> EventTypeDescriptor {
        EventTypeDescriptor {
            id: EVENT_TYPE.to_string(),
            name: "Windows Security".to_string(),
            category: "endpoint".to_string(),
            format: EventFormat::Xml,
            description: "Security channel events for logons, process creation and account management"
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
        let computer = format!("{}.corp.local", pick(&mut rng, WORKSTATIONS));

        let mut fields = Fields::new();
        fields.insert("Computer".into(), json!(computer));
        fields.insert("EventRecordID".into(), json!(rng.random_range(100_000u64..9_000_000)));
        fields.insert("TimeCreated".into(), json!(now.to_rfc3339_opts(SecondsFormat::Micros, true)));
        fields.insert("Keywords".into(), json!(KEYWORDS_SUCCESS));

        let (event_id, order, severity): (u32, &[&str], Severity) = match template_id {
            "logon_success" => {
                let remote = rng.random_bool(0.4);
                fields.insert("SubjectUserSid".into(), json!("S-1-5-18"));
                fields.insert("SubjectUserName".into(), json!(format!("{}$", computer.split('.').next().unwrap_or_default())));
                fields.insert("SubjectDomainName".into(), json!(DOMAIN));
                fields.insert("TargetUserName".into(), json!(pick(&mut rng, USERS)));
                fields.insert("TargetDomainName".into(), json!(DOMAIN));
                fields.insert("LogonType".into(), json!(if remote { 10 } else { pick_logon_type(&mut rng) }));
                fields.insert("LogonProcessName".into(), json!(if remote { "User32" } else { "Kerberos" }));
                fields.insert("AuthenticationPackageName".into(), json!(if remote { "Negotiate" } else { "Kerberos" }));
                fields.insert("WorkstationName".into(), json!(pick(&mut rng, WORKSTATIONS)));
                fields.insert("IpAddress".into(), json!(internal_ip(&mut rng)));
                fields.insert("IpPort".into(), json!(rng.random_range(49152..65535)));
                (4624, LOGON_KEYS, Severity::Info)
            }
            "logon_failure" => {
                fields.insert("Keywords".into(), json!(KEYWORDS_FAILURE));
                fields.insert("TargetUserName".into(), json!(pick(&mut rng, ATTACK_USERS)));
                fields.insert("TargetDomainName".into(), json!(DOMAIN));
                fields.insert("Status".into(), json!("0xC000006D"));
                fields.insert("FailureReason".into(), json!("%%2313"));
                fields.insert(
                    "SubStatus".into(),
                    json!(pick(&mut rng, &["0xC000006A", "0xC0000064", "0xC0000234"])),
                );
                fields.insert("LogonType".into(), json!(3));
                fields.insert("LogonProcessName".into(), json!("NtLmSsp"));
                fields.insert("AuthenticationPackageName".into(), json!("NTLM"));
                fields.insert("WorkstationName".into(), json!("-"));
                fields.insert("IpAddress".into(), json!(external_ip(&mut rng)));
                fields.insert("IpPort".into(), json!(rng.random_range(1024..65535)));
                (4625, FAILURE_KEYS, Severity::Warn)
            }
            "process_creation" => {
                let (image, command_line, parent) = PROCESSES[rng.random_range(0..PROCESSES.len())];
                fields.insert("SubjectUserName".into(), json!(pick(&mut rng, USERS)));
                fields.insert("SubjectDomainName".into(), json!(DOMAIN));
                fields.insert("NewProcessId".into(), json!(format!("0x{:x}", rng.random_range(0x100u32..0xffff))));
                fields.insert("NewProcessName".into(), json!(image));
                fields.insert("TokenElevationType".into(), json!("%%1938"));
                fields.insert("ProcessId".into(), json!(format!("0x{:x}", rng.random_range(0x100u32..0xffff))));
                fields.insert("CommandLine".into(), json!(command_line));
                fields.insert("ParentProcessName".into(), json!(parent));
                let severity = if command_line.contains("-EncodedCommand") {
                    Severity::Warn
                } else {
                    Severity::Info
                };
                (4688, PROCESS_KEYS, severity)
            }
            "user_created" => {
                let name = format!("{}{}", pick(&mut rng, &["svc_", "adm_", "tmp_", ""]), pick(&mut rng, USERS));
                fields.insert("TargetUserName".into(), json!(name));
                fields.insert("TargetDomainName".into(), json!(DOMAIN));
                fields.insert("TargetSid".into(), json!(sid(&mut rng)));
                fields.insert("SubjectUserName".into(), json!(pick(&mut rng, &["administrator", "helpdesk", "alice"])));
                fields.insert("SubjectDomainName".into(), json!(DOMAIN));
                fields.insert("SamAccountName".into(), json!(name));
                fields.insert("UserAccountControl".into(), json!("%%2080 %%2082 %%2084"));
                (4720, USER_CREATED_KEYS, Severity::Warn)
            }
            _ => return Err(unknown_template(EVENT_TYPE, template_id)),
        };
        fields.insert("EventID".into(), json!(event_id));
        merge_scalars(&mut fields, overrides)?;

        let host = text(&fields, "Computer");
        let raw = render_event(&fields, order);

        let mut event = Event::new(EVENT_TYPE, template_id, EventFormat::Xml, raw);
        event.timestamp = now;
        event.severity = severity;
        event.host = host;
        event.source = "WinEventLog:Security".to_string();
        event.sourcetype = "XmlWinEventLog:Security".to_string();
        Ok(event)
    }
}

fn pick_logon_type<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    [2, 3, 3, 3, 5, 7][rng.random_range(0..6)]
}

fn render_event(fields: &Fields, order: &[&str]) -> String {
    let field = |key: &str| xml_escape(&text(fields, key));

    let mut xml = String::with_capacity(1024);
    xml.push_str("<Event xmlns='http://schemas.microsoft.com/win/2004/08/events/event'><System>");
    let _ = write!(xml, "<Provider Name='{}' Guid='{}'/>", PROVIDER, PROVIDER_GUID);
    let _ = write!(xml, "<EventID>{}</EventID>", field("EventID"));
    xml.push_str("<Version>0</Version><Level>0</Level><Task>12544</Task><Opcode>0</Opcode>");
    let _ = write!(xml, "<Keywords>{}</Keywords>", field("Keywords"));
    let _ = write!(xml, "<TimeCreated SystemTime='{}'/>", field("TimeCreated"));
    let _ = write!(xml, "<EventRecordID>{}</EventRecordID>", field("EventRecordID"));
    xml.push_str("<Channel>Security</Channel>");
    let _ = write!(xml, "<Computer>{}</Computer>", field("Computer"));
    xml.push_str("</System><EventData>");

    for key in ordered_keys(fields, order) {
        if SYSTEM_KEYS.contains(&key) {
            continue;
        }
        let _ = write!(xml, "<Data Name='{}'>{}</Data>", xml_escape(key), field(key));
    }
    xml.push_str("</EventData></Event>");
    xml
}
