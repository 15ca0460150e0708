pub mod collect;
pub mod scan;

use std::time::Duration;

use bmcprobe_core::{AuthError, Credentials, RedfishClient};

pub const EXIT_OK: u8 = 0;
/// Login failure, fatal empty discovery, or export failure.
pub const EXIT_FAILURE: u8 = 1;
/// Invalid configuration, reported before any network activity.
pub const EXIT_CONFIG: u8 = 2;

/// Which BMC to talk to and how.
pub struct Target<'a> {
    pub hostname: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub request_timeout: f64,
    pub verify_tls: bool,
}

/// Build a client and log in.
pub fn connect(target: &Target<'_>, request_timeout: Duration) -> Result<RedfishClient, AuthError> {
    let mut client = RedfishClient::new(target.hostname, request_timeout, target.verify_tls)?;
    client.login(&Credentials::new(target.username, target.password))?;
    Ok(client)
}
