//! # noise-generators - Security Log Content Generators
//!
//! One [`ContentGenerator`](noise_core::ContentGenerator) per event type. Each builds a field map with
//! randomized but plausible values, merges caller overrides over it and
//! renders the result in the source's native format.
//!
//! | event type          | format  |
//! |---------------------|---------|
//! | `dns_query`         | JSON    |
//! | `aws_cloudtrail`    | JSON    |
//! | `windows_security`  | XML     |
//! | `linux_auth`        | syslog  |
//! | `firewall`          | syslog (key=value) |
//! | `web_access`        | combined log format |
//! | `okta_system_log`   | JSON    |

mod common;
mod fields;

pub mod cloudtrail;
pub mod dns;
pub mod firewall;
pub mod linux_auth;
pub mod okta;
pub mod web_access;
pub mod windows;

use noise_core::GeneratorRegistry;

pub use cloudtrail::CloudTrailGenerator;
pub use dns::DnsQueryGenerator;
pub use firewall::FirewallGenerator;
pub use linux_auth::LinuxAuthGenerator;
pub use okta::OktaSystemLogGenerator;
pub use web_access::WebAccessGenerator;
pub use windows::WindowsSecurityGenerator;

/// Registry holding every built-in generator
pub fn default_registry() -> GeneratorRegistry {
    GeneratorRegistry::new()
        .with(DnsQueryGenerator)
        .with(CloudTrailGenerator)
        .with(WindowsSecurityGenerator)
        .with(LinuxAuthGenerator)
        .with(FirewallGenerator)
        .with(WebAccessGenerator)
        .with(OktaSystemLogGenerator)
}
