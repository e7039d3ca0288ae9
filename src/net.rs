//! WiFi bring-up: station mode or the local setup access point.
//!
//! An unconfigured device (factory network credentials) starts its own
//! access point so the owner can reach the configuration page; a
//! configured device joins the assigned network and keeps retrying until
//! it is on. Both paths block boot — the unit has nothing useful to do
//! off the network.

use crate::settings::config::{ap_ssid, hostname, AP_IP, AP_NETMASK, AP_PASSWORD};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::ipv4::{
    Configuration as IpConfiguration, Mask, RouterConfiguration, Subnet,
};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi, WifiDeviceId,
};
use esp_idf_sys::EspError;
use log::{info, warn};
use std::ffi::CString;
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

/// Delay between station connect attempts.
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Errors raised during network bring-up.
#[derive(Debug)]
pub enum NetError {
    /// The setup access point did not come up. Fatal: an unconfigured
    /// device without its AP cannot be configured at all.
    ApStartFailed(EspError),
    /// Constant addressing or credentials did not fit the driver types.
    InvalidConfig(String),
    /// ESP-IDF error.
    Esp(EspError),
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApStartFailed(e) => write!(f, "AP start failed: {:?}", e),
            Self::InvalidConfig(msg) => write!(f, "invalid network config: {}", msg),
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for NetError {}

impl From<EspError> for NetError {
    fn from(e: EspError) -> Self {
        Self::Esp(e)
    }
}

/// The running WiFi stack, in whichever mode boot chose.
pub struct Network<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    ip: Ipv4Addr,
}

impl<'a> Network<'a> {
    /// The device's own address: the AP address in setup mode, the
    /// DHCP-assigned address in station mode. Shown on the IP gesture.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

}

/// The station MAC address, used for the device ID.
pub fn mac_address(wifi: &EspWifi<'_>) -> Result<String, EspError> {
    let mac = wifi.get_mac(WifiDeviceId::Sta)?;
    Ok(format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    ))
}

/// Create the WiFi driver. Split from the mode starters so the caller
/// can read the MAC address (for the device ID) before choosing a mode.
pub fn driver(
    modem: Modem,
    sysloop: &EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<EspWifi<'static>, NetError> {
    Ok(EspWifi::new(modem, sysloop.clone(), Some(nvs))?)
}

/// Start the setup access point with the constant addressing and the
/// ID-suffixed SSID.
pub fn start_access_point<'a>(
    mut esp_wifi: EspWifi<'a>,
    sysloop: &EspSystemEventLoop,
    device_id: &str,
) -> Result<Network<'a>, NetError> {
    let gateway: Ipv4Addr = AP_IP
        .parse()
        .map_err(|_| NetError::InvalidConfig(format!("bad AP address {}", AP_IP)))?;
    let netmask: Ipv4Addr = AP_NETMASK
        .parse()
        .map_err(|_| NetError::InvalidConfig(format!("bad AP netmask {}", AP_NETMASK)))?;
    let mask = Mask::try_from(netmask)
        .map_err(|_| NetError::InvalidConfig(format!("bad AP netmask {}", AP_NETMASK)))?;

    let mut conf = NetifConfiguration::wifi_default_router();
    conf.ip_configuration = Some(IpConfiguration::Router(RouterConfiguration {
        subnet: Subnet { gateway, mask },
        dhcp_enabled: true,
        dns: None,
        secondary_dns: None,
    }));
    esp_wifi
        .swap_netif_ap(EspNetif::new_with_conf(&conf).map_err(NetError::ApStartFailed)?)
        .map_err(NetError::ApStartFailed)?;

    let ssid = ap_ssid(device_id);
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop.clone())?;
    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: ssid
            .as_str()
            .try_into()
            .map_err(|_| NetError::InvalidConfig("AP SSID too long".into()))?,
        password: AP_PASSWORD
            .try_into()
            .map_err(|_| NetError::InvalidConfig("AP password too long".into()))?,
        auth_method: AuthMethod::WPA2Personal,
        channel: 1,
        ..Default::default()
    }))
    .map_err(NetError::ApStartFailed)?;

    wifi.start().map_err(NetError::ApStartFailed)?;
    wifi.wait_netif_up().map_err(NetError::ApStartFailed)?;

    info!(
        "setup AP started: SSID '{}', password '{}', admin page http://{}/admin",
        ssid, AP_PASSWORD, gateway
    );

    Ok(Network { wifi, ip: gateway })
}

/// Join the configured network in station mode.
///
/// Retries until the network comes up; a unit with bad credentials is
/// recovered through the boot-time factory-reset gesture, not here.
pub fn connect_station<'a>(
    esp_wifi: EspWifi<'a>,
    sysloop: &EspSystemEventLoop,
    device_id: &str,
    ssid: &str,
    password: &str,
) -> Result<Network<'a>, NetError> {
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop.clone())?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|_| NetError::InvalidConfig("SSID too long".into()))?,
        password: password
            .try_into()
            .map_err(|_| NetError::InvalidConfig("password too long".into()))?,
        auth_method: AuthMethod::WPA2Personal,
        ..Default::default()
    }))?;

    wifi.start()?;
    set_hostname(wifi.wifi(), device_id)?;

    info!("connecting to '{}'", ssid);
    loop {
        let result = match wifi.connect() {
            Ok(()) => wifi.wait_netif_up(),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => break,
            Err(e) => {
                warn!("WiFi connect failed ({:?}), retrying", e);
                let _ = wifi.disconnect();
                thread::sleep(RETRY_DELAY);
            }
        }
    }

    let ip = wifi.wifi().sta_netif().get_ip_info()?.ip;
    info!("WiFi connected, IP: {}", ip);

    Ok(Network { wifi, ip })
}

/// Assign the ID-suffixed hostname to the station interface.
fn set_hostname(wifi: &EspWifi<'_>, device_id: &str) -> Result<(), EspError> {
    use esp_idf_svc::handle::RawHandle;

    let name = hostname(device_id);
    let cname = CString::new(name.clone()).expect("hostname has no interior NUL");
    esp_idf_sys::esp!(unsafe {
        esp_idf_sys::esp_netif_set_hostname(wifi.sta_netif().handle(), cname.as_ptr())
    })?;
    info!("hostname set to {}", name);
    Ok(())
}
