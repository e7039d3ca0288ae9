//! Configuration and status HTTP endpoints.
//!
//! A small `tiny_http` server polled from the control loop: one request
//! is handled per tick with no worker threads, matching the device's
//! single-threaded cooperative model.
//!
//! Endpoints:
//!
//! - `GET /` - device information (no auth)
//! - `GET /admin` - settings form, Basic-auth against the admin account
//! - `POST /admin` - JSON settings document; validated as a whole, any
//!   invalid field rejects the entire update with nothing applied
//!
//! When an accepted update touches the network identity (SSID or
//! password) the handler responds first and then asks the control loop
//! to restart the device so the new credentials take effect.

mod pages;

use crate::settings::config::ADMIN_USER;
use crate::settings::{SettingsBackend, SettingsStore};
use base64::Engine as _;
use log::{info, warn};
use serde::Deserialize;
use std::io;
use std::io::Read as _;
use tiny_http::{Header, Method, Request, Response, Server};

/// Largest accepted request body.
const MAX_BODY_SIZE: usize = 4096;

/// Commands the request handler hands back to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebCommand {
    /// Network identity changed; restart to re-apply it.
    Restart,
}

/// A full settings payload as submitted by the configuration page.
/// Absent and empty fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub owner: Option<String>,
    pub message: Option<String>,
    pub panic_level: Option<u8>,
    pub recipients: Option<String>,
    pub admin_password: Option<String>,
}

/// Result of applying a settings payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Nothing differed from the current record.
    NoChange,
    /// The update was applied and persisted.
    Saved { needs_restart: bool },
    /// At least one field failed validation; nothing was applied.
    Invalid(Vec<&'static str>),
    /// The record did not commit to storage.
    SaveFailed,
}

/// Validate and apply a settings payload, all or nothing.
///
/// Fields are staged on a copy of the current record; the copy only
/// replaces the live record (and is persisted) when every submitted
/// field validated. Outside setup mode only the recipient list and the
/// admin password are writable — everything else requires the device to
/// be factory reset first.
pub fn apply_update<B: SettingsBackend>(
    store: &mut SettingsStore<B>,
    update: &SettingsUpdate,
    setup_mode: bool,
) -> UpdateResult {
    let original = store.settings().clone();
    let mut staged = original.clone();
    let mut invalid: Vec<&'static str> = Vec::new();
    let mut changed = false;

    if setup_mode {
        stage(&update.ssid, original.ssid(), "ssid", &mut invalid, &mut changed, |v| {
            staged.set_ssid(v)
        });
        stage(
            &update.password,
            original.password(),
            "password",
            &mut invalid,
            &mut changed,
            |v| staged.set_password(v),
        );
        stage(
            &update.smtp_host,
            original.smtp_host(),
            "smtp_host",
            &mut invalid,
            &mut changed,
            |v| staged.set_smtp_host(v),
        );
        stage(
            &update.smtp_user,
            original.smtp_user(),
            "smtp_user",
            &mut invalid,
            &mut changed,
            |v| staged.set_smtp_user(v),
        );
        stage(
            &update.smtp_password,
            original.smtp_password(),
            "smtp_password",
            &mut invalid,
            &mut changed,
            |v| staged.set_smtp_password(v),
        );
        stage(
            &update.from_email,
            original.from_email(),
            "from_email",
            &mut invalid,
            &mut changed,
            |v| staged.set_from_email(v),
        );
        stage(
            &update.from_name,
            original.from_name(),
            "from_name",
            &mut invalid,
            &mut changed,
            |v| staged.set_from_name(v),
        );
        stage(&update.owner, original.owner(), "owner", &mut invalid, &mut changed, |v| {
            staged.set_owner(v)
        });
        stage(
            &update.message,
            original.message(),
            "message",
            &mut invalid,
            &mut changed,
            |v| staged.set_message(v),
        );

        if let Some(port) = update.smtp_port {
            if port != original.smtp_port() {
                if staged.set_smtp_port(port) {
                    changed = true;
                } else {
                    invalid.push("smtp_port");
                }
            }
        }
        if let Some(level) = update.panic_level {
            if level != original.panic_level() {
                if staged.set_panic_level(level) {
                    changed = true;
                } else {
                    invalid.push("panic_level");
                }
            }
        }
    }

    stage(
        &update.recipients,
        original.recipients(),
        "recipients",
        &mut invalid,
        &mut changed,
        |v| staged.set_recipients(v),
    );
    stage(
        &update.admin_password,
        original.admin_password(),
        "admin_password",
        &mut invalid,
        &mut changed,
        |v| staged.set_admin_password(v),
    );

    if !invalid.is_empty() {
        return UpdateResult::Invalid(invalid);
    }
    if !changed {
        return UpdateResult::NoChange;
    }

    let needs_restart =
        staged.ssid() != original.ssid() || staged.password() != original.password();

    store.replace(staged);
    if !store.save() {
        return UpdateResult::SaveFailed;
    }
    info!("settings updated via configuration endpoint");
    UpdateResult::Saved { needs_restart }
}

/// Stage one string field: skip absent, empty, and unchanged values;
/// record a validation failure when the setter rejects the value.
fn stage(
    value: &Option<String>,
    current: &str,
    field: &'static str,
    invalid: &mut Vec<&'static str>,
    changed: &mut bool,
    mut set: impl FnMut(&str) -> bool,
) {
    let Some(value) = value else { return };
    let value = value.trim();
    if value.is_empty() || value == current {
        return;
    }
    if set(value) {
        *changed = true;
    } else {
        invalid.push(field);
    }
}

/// Parse a Basic `Authorization` header value into user and password.
pub fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// The configuration web server, polled from the control loop.
pub struct WebServer {
    server: Server,
    device_id: String,
}

impl WebServer {
    /// Bind the listener. `addr` is usually `0.0.0.0:80`.
    pub fn bind(addr: &str, device_id: String) -> io::Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, format!("{}", e)))?;
        info!("configuration endpoint listening on http://{}/admin", addr);
        Ok(Self { server, device_id })
    }

    /// Handle at most one pending request. Never blocks.
    pub fn poll<B: SettingsBackend>(
        &mut self,
        store: &mut SettingsStore<B>,
        setup_mode: bool,
    ) -> Option<WebCommand> {
        match self.server.try_recv() {
            Ok(Some(request)) => self.handle(request, store, setup_mode),
            Ok(None) => None,
            Err(e) => {
                warn!("web server receive error: {}", e);
                None
            }
        }
    }

    fn handle<B: SettingsBackend>(
        &mut self,
        mut request: Request,
        store: &mut SettingsStore<B>,
        setup_mode: bool,
    ) -> Option<WebCommand> {
        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or("");

        match (request.method().clone(), path) {
            (Method::Get, "/") | (Method::Get, "") => {
                let content = pages::ROOT_PAGE
                    .replace("${device_id}", &self.device_id)
                    .replace("${firmware_version}", crate::FIRMWARE_VERSION);
                respond_html(request, 200, "Device Information", "Information", &content);
                None
            }
            (Method::Get, "/admin") => {
                if !self.authenticate(&request, store) {
                    request_authentication(request);
                    return None;
                }
                let content = fill_form(store, setup_mode);
                respond_html(
                    request,
                    200,
                    "Device Configuration Page",
                    "Device Settings",
                    &content,
                );
                None
            }
            (Method::Post, "/admin") => {
                if !self.authenticate(&request, store) {
                    request_authentication(request);
                    return None;
                }

                let mut body = String::new();
                let read = request.as_reader().read_to_string(&mut body);
                if read.is_err() || body.len() > MAX_BODY_SIZE {
                    respond_html(
                        request,
                        400,
                        "400 Bad Request",
                        "Update Failure",
                        "<h3>ERROR: Unreadable request body!</h3>",
                    );
                    return None;
                }

                let update: SettingsUpdate = match serde_json::from_str(&body) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!("rejecting malformed settings payload: {}", e);
                        respond_html(
                            request,
                            400,
                            "400 Bad Request",
                            "Update Failure",
                            "<h3>ERROR: Malformed settings payload!</h3>",
                        );
                        return None;
                    }
                };

                match apply_update(store, &update, setup_mode) {
                    UpdateResult::Invalid(fields) => {
                        warn!("settings update rejected, invalid fields: {:?}", fields);
                        respond_html(
                            request,
                            400,
                            "Update Failure",
                            "Update Failure",
                            "<h3>ERROR: No changes made because some requested changes \
                             were invalid due to length(s) or value(s)!</h3>",
                        );
                        None
                    }
                    UpdateResult::SaveFailed => {
                        respond_html(
                            request,
                            500,
                            "Internal Error",
                            "500 - Internal Server Error",
                            "<h3>Error Saving Settings!!!</h3>",
                        );
                        None
                    }
                    UpdateResult::Saved { needs_restart: true } => {
                        respond_html(
                            request,
                            200,
                            "Update Successful",
                            "Update Result",
                            "<h3>Settings update Successful!</h3>\
                             <h4>Device will reboot now...</h4>",
                        );
                        Some(WebCommand::Restart)
                    }
                    UpdateResult::Saved { needs_restart: false } => {
                        respond_html(
                            request,
                            200,
                            "Update Successful",
                            "Update Result",
                            "<h3>Settings update Successful!</h3>",
                        );
                        None
                    }
                    UpdateResult::NoChange => {
                        let content = fill_form(store, setup_mode);
                        respond_html(
                            request,
                            200,
                            "Device Configuration Page",
                            "Device Settings",
                            &content,
                        );
                        None
                    }
                }
            }
            (Method::Post, _) | (Method::Put, _) => {
                respond_html(
                    request,
                    400,
                    "400 Bad Request",
                    "Uhhh, Wuuuuut!?",
                    "Um, I don't want your nasty files, go peddle that junk elsewhere!",
                );
                None
            }
            _ => {
                respond_html(
                    request,
                    404,
                    "404 Not Found",
                    "OOPS! You broke it!!!",
                    "Just kidding...<br>But seriously what you were looking for doesn't exist.",
                );
                None
            }
        }
    }

    fn authenticate<B: SettingsBackend>(
        &self,
        request: &Request,
        store: &SettingsStore<B>,
    ) -> bool {
        let authorized = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Authorization"))
            .and_then(|h| parse_basic_auth(h.value.as_str()))
            .map(|(user, password)| {
                user == ADMIN_USER && password == store.settings().admin_password()
            })
            .unwrap_or(false);
        if !authorized {
            info!("configuration endpoint client not (yet) authenticated");
        }
        authorized
    }
}

/// Pre-fill the settings form for the current mode. Network and relay
/// passwords are only echoed back on the isolated setup network.
fn fill_form<B: SettingsBackend>(store: &SettingsStore<B>, setup_mode: bool) -> String {
    let settings = store.settings();
    let template = if setup_mode {
        pages::SETUP_FORM
    } else {
        pages::ADMIN_FORM
    };

    let mut content = template
        .replace("${ssid}", settings.ssid())
        .replace("${smtp_host}", settings.smtp_host())
        .replace("${smtp_port}", &settings.smtp_port().to_string())
        .replace("${smtp_user}", settings.smtp_user())
        .replace("${from_email}", settings.from_email())
        .replace("${from_name}", settings.from_name())
        .replace("${owner}", settings.owner())
        .replace("${message}", settings.message())
        .replace("${panic_level}", &settings.panic_level().to_string())
        .replace("${recipients}", settings.recipients())
        .replace("${admin_password}", settings.admin_password());

    if setup_mode {
        content = content
            .replace("${password}", settings.password())
            .replace("${smtp_password}", settings.smtp_password());
    }

    content
}

fn request_authentication(request: Request) {
    let header = Header::from_bytes(&b"WWW-Authenticate"[..], &b"Basic realm=\"AdminRealm\""[..])
        .expect("static header");
    let response = Response::from_string("Authentication failed!")
        .with_status_code(401)
        .with_header(header);
    if let Err(e) = request.respond(response) {
        warn!("failed to send auth challenge: {}", e);
    }
}

fn respond_html(request: Request, code: u16, title: &str, heading: &str, content: &str) {
    let html = pages::render_page(title, heading, content);
    let header = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
        .expect("static header");
    let response = Response::from_string(html)
        .with_status_code(code)
        .with_header(header);
    if let Err(e) = request.respond(response) {
        warn!("failed to send response: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemoryBackend, SettingsStore};

    fn store() -> SettingsStore<MemoryBackend> {
        SettingsStore::new(MemoryBackend::new())
    }

    // ==================== Auth Parsing Tests ====================

    #[test]
    fn test_parse_basic_auth() {
        // "admin:P@ssw0rd123"
        let value = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("admin:P@ssw0rd123")
        );
        assert_eq!(
            parse_basic_auth(&value),
            Some(("admin".to_string(), "P@ssw0rd123".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_auth_rejects_other_schemes() {
        assert_eq!(parse_basic_auth("Bearer abcdef"), None);
        assert_eq!(parse_basic_auth("Basic !!!notbase64!!!"), None);
    }

    // ==================== Update Application Tests ====================

    #[test]
    fn test_full_setup_update_applies_and_saves() {
        let mut store = store();
        let update = SettingsUpdate {
            ssid: Some("HomeNet".into()),
            password: Some("wpa2-secret".into()),
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: Some(587),
            smtp_user: Some("mailer".into()),
            smtp_password: Some("relay-pass".into()),
            from_email: Some("alerts@example.com".into()),
            from_name: Some("Panic Button".into()),
            owner: Some("Jane".into()),
            message: Some("Send help to 12 Main St".into()),
            panic_level: Some(4),
            recipients: Some("a@x.com;b@y.com".into()),
            admin_password: Some("new-admin-pass".into()),
        };

        let result = apply_update(&mut store, &update, true);
        assert_eq!(result, UpdateResult::Saved { needs_restart: true });
        assert_eq!(store.settings().ssid(), "HomeNet");
        assert_eq!(store.settings().smtp_port(), 587);
        assert_eq!(store.settings().panic_level(), 4);
        assert_eq!(store.settings().admin_password(), "new-admin-pass");

        // Persisted: a reload sees the same values.
        store.settings_mut().set_owner("Scratch");
        assert!(store.load());
        assert_eq!(store.settings().owner(), "Jane");
    }

    #[test]
    fn test_over_length_field_rejects_entire_update() {
        let mut store = store();
        let update = SettingsUpdate {
            owner: Some("Jane".into()),
            message: Some("x".repeat(130)),
            ..Default::default()
        };

        let result = apply_update(&mut store, &update, true);
        assert_eq!(result, UpdateResult::Invalid(vec!["message"]));
        // The valid field was not applied either.
        assert_ne!(store.settings().owner(), "Jane");
    }

    #[test]
    fn test_out_of_range_level_rejects_update() {
        let mut store = store();
        let update = SettingsUpdate {
            panic_level: Some(6),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&mut store, &update, true),
            UpdateResult::Invalid(vec!["panic_level"])
        );
    }

    #[test]
    fn test_zero_port_rejects_update() {
        let mut store = store();
        let update = SettingsUpdate {
            smtp_port: Some(0),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&mut store, &update, true),
            UpdateResult::Invalid(vec!["smtp_port"])
        );
    }

    #[test]
    fn test_empty_and_absent_fields_are_ignored() {
        let mut store = store();
        let update = SettingsUpdate {
            ssid: Some("   ".into()),
            owner: None,
            ..Default::default()
        };
        assert_eq!(apply_update(&mut store, &update, true), UpdateResult::NoChange);
    }

    #[test]
    fn test_unchanged_values_do_not_save() {
        let mut store = store();
        let update = SettingsUpdate {
            recipients: Some("test@email.com".into()), // factory value
            ..Default::default()
        };
        assert_eq!(apply_update(&mut store, &update, true), UpdateResult::NoChange);
    }

    #[test]
    fn test_network_fields_trigger_restart_only_when_changed() {
        let mut store = store();
        let update = SettingsUpdate {
            owner: Some("Jane".into()),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&mut store, &update, true),
            UpdateResult::Saved { needs_restart: false }
        );

        let update = SettingsUpdate {
            ssid: Some("HomeNet".into()),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&mut store, &update, true),
            UpdateResult::Saved { needs_restart: true }
        );
    }

    #[test]
    fn test_station_mode_restricts_writable_fields() {
        let mut store = store();
        let update = SettingsUpdate {
            ssid: Some("Evil".into()),
            owner: Some("Mallory".into()),
            recipients: Some("c@z.com".into()),
            admin_password: Some("different".into()),
            ..Default::default()
        };

        let result = apply_update(&mut store, &update, false);
        assert_eq!(result, UpdateResult::Saved { needs_restart: false });
        // Setup-only fields untouched outside the setup network.
        assert_eq!(store.settings().ssid(), "SET_ME");
        assert_ne!(store.settings().owner(), "Mallory");
        assert_eq!(store.settings().recipients(), "c@z.com");
        assert_eq!(store.settings().admin_password(), "different");
    }
}
