//! Panic-button appliance firmware binary.

#[cfg(feature = "esp32")]
mod firmware {
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, OutputPin, PinDriver, Pull};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::reset::restart;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info};
    use std::time::{Duration, Instant};

    use panic_button_esp32::alert;
    use panic_button_esp32::buttons::{ButtonEvent, ButtonMonitor, GestureKind};
    use panic_button_esp32::identity;
    use panic_button_esp32::mail::SmtpMailer;
    use panic_button_esp32::net;
    use panic_button_esp32::panel::oled::OledPanel;
    use panic_button_esp32::panel::{LedMode, StatusPanel};
    use panic_button_esp32::settings::{NvsBackend, SettingsStore};
    use panic_button_esp32::state::DeviceState;
    use panic_button_esp32::status::{NetworkMode, StatusMonitor};
    use panic_button_esp32::web::{WebCommand, WebServer};
    use panic_button_esp32::{DeviceSettings, MessageKind, FIRMWARE_VERSION};

    /// Loop tick period.
    const TICK_MS: u32 = 50;

    /// Dwell after an aborted or canceled gesture so the outcome text is
    /// readable before the status monitor repaints. Intentionally blocks.
    const GESTURE_DWELL_MS: u32 = 5_000;

    /// Log and restart. Used for the fatal bring-up failures: a unit
    /// without display, storage, or network identity cannot operate.
    fn fatal(message: &str) -> ! {
        error!("FATAL: {}", message);
        FreeRtos::delay_ms(10_000);
        restart();
    }

    /// Evaluate the boot-time factory-reset gesture, or load settings.
    ///
    /// Holding CANCEL at power-on starts a three-second countdown;
    /// releasing early aborts it and completion wipes the settings back
    /// to factory defaults. Runs synchronously before the main loop.
    fn reset_or_load(
        store: &mut SettingsStore<NvsBackend>,
        cancel: &PinDriver<'_, AnyInputPin, Input>,
        panel: &mut dyn StatusPanel,
    ) {
        if !cancel.is_high() {
            store.load();
            return;
        }

        info!("factory reset requested at power-on");
        let mut remaining = 3u8;
        panel.show(&format!("Factory Reset? {}", remaining));
        let mut last_count = Instant::now();
        while cancel.is_high() && remaining > 0 {
            if last_count.elapsed() >= Duration::from_secs(1) {
                remaining -= 1;
                if remaining > 0 {
                    panel.show(&format!("Factory Reset? {}", remaining));
                }
                last_count = Instant::now();
            }
            FreeRtos::delay_ms(10);
        }

        if remaining == 0 {
            info!("performing factory reset");
            store.factory_default();
            panel.show("Reset Complete!");
            FreeRtos::delay_ms(2_000);
            while cancel.is_high() {
                FreeRtos::delay_ms(10);
            }
        } else {
            info!("factory reset aborted");
            panel.show("Reset Aborted.");
            FreeRtos::delay_ms(3_000);
        }

        panel.show("Initializing...");
    }

    pub fn run() -> ! {
        // Link ESP-IDF patches (must be first!)
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        info!("Initializing device...");

        let peripherals = Peripherals::take().unwrap_or_else(|e| {
            fatal(&format!("failed to take peripherals: {:?}", e));
        });
        let sysloop = EspSystemEventLoop::take().unwrap_or_else(|e| {
            fatal(&format!("failed to take system event loop: {:?}", e));
        });
        let nvs_partition = EspDefaultNvsPartition::take().unwrap_or_else(|e| {
            fatal(&format!("failed to take NVS partition: {:?}", e));
        });

        let pins = peripherals.pins;

        /* Buttons: pressed = high */
        let mut panic_btn = PinDriver::input(pins.gpio12.downgrade_input())
            .unwrap_or_else(|e| fatal(&format!("panic button init failed: {:?}", e)));
        panic_btn
            .set_pull(Pull::Down)
            .unwrap_or_else(|e| fatal(&format!("panic button pull failed: {:?}", e)));
        let mut cancel_btn = PinDriver::input(pins.gpio13.downgrade_input())
            .unwrap_or_else(|e| fatal(&format!("cancel button init failed: {:?}", e)));
        cancel_btn
            .set_pull(Pull::Down)
            .unwrap_or_else(|e| fatal(&format!("cancel button pull failed: {:?}", e)));

        /* Status panel: OLED on I2C plus the alert LED */
        let i2c_config = I2cConfig::new().baudrate(400.kHz().into());
        let i2c = I2cDriver::new(peripherals.i2c0, pins.gpio21, pins.gpio22, &i2c_config)
            .unwrap_or_else(|e| fatal(&format!("I2C init failed: {:?}", e)));
        let mut panel = OledPanel::new(i2c, pins.gpio16.downgrade_output())
            .unwrap_or_else(|e| fatal(&format!("display init failed: {}", e)));
        panel.show("Initializing...");
        panel.led(LedMode::On);

        /* Settings: factory-reset gesture, or load from NVS */
        let backend = NvsBackend::new(nvs_partition.clone())
            .unwrap_or_else(|e| fatal(&format!("settings storage init failed: {:?}", e)));
        let mut store = SettingsStore::new(backend);
        reset_or_load(&mut store, &cancel_btn, &mut panel);

        /* Device identity from the station MAC address */
        let wifi = net::driver(peripherals.modem, &sysloop, nvs_partition)
            .unwrap_or_else(|e| fatal(&format!("WiFi driver init failed: {}", e)));
        let mac = net::mac_address(&wifi)
            .unwrap_or_else(|e| fatal(&format!("failed to read MAC address: {:?}", e)));
        let device_id = identity::device_id(&mac);

        info!("==================================");
        info!("Device ID: {}", device_id);
        info!("Firmware Version: {}", FIRMWARE_VERSION);
        info!("==================================");

        /* Network: join the configured network, or run the setup AP */
        let (network, mode) = if store.is_network_credentials_set() {
            panel.show("Connecting...");
            panel.led(LedMode::On);
            let (ssid, password) = {
                let settings: &DeviceSettings = store.settings();
                (settings.ssid().to_string(), settings.password().to_string())
            };
            let network = net::connect_station(wifi, &sysloop, &device_id, &ssid, &password)
                .unwrap_or_else(|e| fatal(&format!("station mode failed: {}", e)));
            (network, NetworkMode::Station)
        } else {
            let network = net::start_access_point(wifi, &sysloop, &device_id)
                .unwrap_or_else(|e| {
                    panel.show("AP Failed!!!");
                    fatal(&format!("AP mode failed: {}", e));
                });
            (network, NetworkMode::AccessPoint)
        };
        let ip_text = format!("IP: {}", network.ip());

        let mut web = WebServer::bind("0.0.0.0:80", device_id.clone())
            .unwrap_or_else(|e| fatal(&format!("web server bind failed: {}", e)));

        let mut state = DeviceState::new(store.settings().in_panic_mode());
        let mut status = StatusMonitor::new(mode);
        let mut button_monitor = ButtonMonitor::new();
        let mut mailer = SmtpMailer::new();

        info!("Device entering normal operating mode.");

        loop {
            let now = Instant::now();

            status.tick(&mut state, store.settings(), &mut mailer, &mut panel, now);

            if let Some(WebCommand::Restart) =
                web.poll(&mut store, mode == NetworkMode::AccessPoint)
            {
                info!("restarting to apply network settings");
                FreeRtos::delay_ms(5_000);
                restart();
            }

            panel.run(now);

            let event = button_monitor.poll(
                panic_btn.is_high(),
                cancel_btn.is_high(),
                state.in_panic_mode,
                state.fault,
                now,
            );
            if let Some(event) = event {
                handle_button_event(
                    event, &ip_text, &mut store, &mut state, &mut mailer, &mut panel,
                );
            }

            FreeRtos::delay_ms(TICK_MS);
        }
    }

    fn handle_button_event(
        event: ButtonEvent,
        ip_text: &str,
        store: &mut SettingsStore<NvsBackend>,
        state: &mut DeviceState,
        mailer: &mut SmtpMailer,
        panel: &mut OledPanel<'_>,
    ) {
        match event {
            ButtonEvent::ShowIp => panel.show(ip_text),
            // The status monitor repaints on its own cadence.
            ButtonEvent::HideIp => {}
            ButtonEvent::Countdown { kind, remaining } => {
                let verb = match kind {
                    GestureKind::PanicTrigger => "Panic",
                    GestureKind::PanicCancel => "Cancel",
                };
                panel.show(&format!("{} in... {}", verb, remaining));
            }
            ButtonEvent::Aborted(kind) => {
                match kind {
                    GestureKind::PanicTrigger => panel.show("Panic Aborted."),
                    GestureKind::PanicCancel => panel.show("Cancel Aborted."),
                }
                panel.led(LedMode::Off);
                FreeRtos::delay_ms(GESTURE_DWELL_MS);
            }
            ButtonEvent::Committed(GestureKind::PanicTrigger) => {
                info!("panic gesture committed");
                panel.show("Panic In Progress...");
                panel.led(LedMode::Flash);
                state.in_panic_mode = true;
                store.settings_mut().set_in_panic_mode(true);
                alert::dispatch(
                    MessageKind::Alert,
                    store.settings(),
                    mailer,
                    state,
                    panel,
                );
            }
            ButtonEvent::Committed(GestureKind::PanicCancel) => {
                info!("cancel gesture committed");
                panel.show("Panic Canceled.");
                panel.led(LedMode::Off);
                state.in_panic_mode = false;
                store.settings_mut().set_in_panic_mode(false);
                alert::dispatch(
                    MessageKind::Cancel,
                    store.settings(),
                    mailer,
                    state,
                    panel,
                );
                FreeRtos::delay_ms(GESTURE_DWELL_MS);
            }
        }
    }
}

#[cfg(feature = "esp32")]
fn main() -> ! {
    firmware::run()
}

#[cfg(not(feature = "esp32"))]
fn main() {
    env_logger::init();
    log::info!("panic-button {} (host build)", panic_button_esp32::FIRMWARE_VERSION);
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo test' for host testing of the core components.");
}
