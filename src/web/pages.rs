//! HTML content for the configuration endpoint.
//!
//! Simple `${placeholder}` templates, filled by string replacement and
//! wrapped in one shared page shell. The settings form posts itself as a
//! JSON document via the embedded script.

/// Shared page shell. `${title}`, `${heading}`, and `${content}` are
/// replaced before sending.
const PAGE_TEMPLATE: &str = r#"<!DOCTYPE HTML>
<html lang="en">
<head>
<title>${title}</title>
<style>
body { background-color: #FFFFFF; color: #000000; }
h1 { text-align: center; background-color: #5878B0; color: #FFFFFF; border: 3px; border-radius: 15px; }
h2 { text-align: center; background-color: #58ADB0; color: #FFFFFF; border: 3px; }
#wrapper { background-color: #E6EFFF; padding: 20px; margin-left: auto; margin-right: auto; max-width: 700px; box-shadow: 3px 3px 3px #333 }
#info { font-size: 30px; font-weight: bold; line-height: 150%; }
</style>
</head>
<div id="wrapper">
<h1>${heading}</h1>
<div id="info">${content}</div>
</div>
${script}
</html>"#;

/// Script that serializes the settings form to JSON and posts it.
const FORM_SCRIPT: &str = r#"<script>
document.getElementById('settings').addEventListener('submit', async (event) => {
  event.preventDefault();
  const fields = {};
  for (const input of event.target.elements) {
    if (!input.name) continue;
    if (input.type === 'number') {
      if (input.value !== '') fields[input.name] = Number(input.value);
    } else {
      fields[input.name] = input.value;
    }
  }
  const response = await fetch('/admin', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(fields),
  });
  document.open();
  document.write(await response.text());
  document.close();
});
</script>"#;

/// Device information page served at the root.
pub const ROOT_PAGE: &str = "Device:\tFriendlyNeighbor Panic Button<br>\
                             Device ID:\t${device_id}<br>\
                             Firmware Version:\t${firmware_version}<br>";

/// Full settings form, shown while the device runs its setup access
/// point. Every field is editable here, passwords included.
pub const SETUP_FORM: &str = r#"<form name="settings" method="post" id="settings" action="admin">
<h2>WiFi</h2>
SSID: <input maxlength="32" type="text" value="${ssid}" name="ssid" id="ssid"> <br>
Password: <input maxlength="63" type="text" value="${password}" name="password" id="password"> <br>
<h2>SMTP Settings</h2>
Host: <input maxlength="120" type="text" value="${smtp_host}" name="smtp_host" id="smtp_host"> <br>
Port: <input type="number" value="${smtp_port}" name="smtp_port" id="smtp_port"> <br>
User: <input maxlength="120" type="text" value="${smtp_user}" name="smtp_user" id="smtp_user"> <br>
Password: <input maxlength="120" type="password" value="${smtp_password}" name="smtp_password" id="smtp_password"> <br>
From Name: <input maxlength="50" type="text" value="${from_name}" name="from_name" id="from_name"> <br>
From Email: <input maxlength="120" type="text" value="${from_email}" name="from_email" id="from_email"> <br>
<h2>Application</h2>
Owner: <input maxlength="100" type="text" value="${owner}" name="owner" id="owner"> <br>
Message: <input maxlength="100" type="text" value="${message}" name="message" id="message"> <br>
Panic Level: <input type="number" value="${panic_level}" name="panic_level" id="panic_level"> <br>
Semicolon Separated Recipients: <input maxlength="509" type="text" value="${recipients}" name="recipients" id="recipients"> <br>
<h2>Admin</h2>
Admin Password: <input maxlength="63" type="password" value="${admin_password}" name="admin_password" id="admin_password"> <br>
<br>
<input type="submit">
</form>"#;

/// Reduced form for a configured device: most settings are shown
/// read-only and only the recipient list and admin password can change.
pub const ADMIN_FORM: &str = r#"<p>NOTE: Most of the settings below can only be changed by performing a factory reset.
To perform a factory reset hold the cancel button while cycling power, then continue to
hold until the device says the reset is complete.</p>
<form name="settings" method="post" id="settings" action="admin">
<h2>WiFi</h2>
SSID: ${ssid} <br>
<h2>SMTP Settings</h2>
Host: ${smtp_host} <br>
Port: ${smtp_port} <br>
User: ${smtp_user} <br>
From Name: ${from_name} <br>
From Email: ${from_email} <br>
<h2>Application</h2>
Owner: ${owner} <br>
Message: ${message} <br>
Panic Level: ${panic_level} <br>
Semicolon Separated Recipients: <input maxlength="509" type="text" value="${recipients}" name="recipients" id="recipients"> <br>
<h2>Admin</h2>
Admin Password: <input maxlength="63" type="password" value="${admin_password}" name="admin_password" id="admin_password"> <br>
<br>
<input type="submit">
</form>"#;

/// Wrap content in the page shell. The submit script is only included
/// when the content actually contains the settings form.
pub fn render_page(title: &str, heading: &str, content: &str) -> String {
    let script = if content.contains("id=\"settings\"") {
        FORM_SCRIPT
    } else {
        ""
    };
    PAGE_TEMPLATE
        .replace("${title}", title)
        .replace("${heading}", heading)
        .replace("${content}", content)
        .replace("${script}", script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_page_fills_placeholders() {
        let page = render_page("A Title", "A Heading", "some content");
        assert!(page.contains("<title>A Title</title>"));
        assert!(page.contains("<h1>A Heading</h1>"));
        assert!(page.contains("some content"));
        assert!(!page.contains("${"));
    }

    #[test]
    fn test_form_pages_include_submit_script() {
        let setup = render_page("t", "h", SETUP_FORM);
        assert!(setup.contains("fetch('/admin'"));

        let plain = render_page("t", "h", "no form here");
        assert!(!plain.contains("fetch('/admin'"));
    }
}
