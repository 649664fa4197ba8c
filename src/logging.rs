/// Route `log` records to the UART through esp-println.
#[cfg(feature = "esp32")]
pub fn init(level: log::LevelFilter) {
    esp_println::logger::init_logger(level);
}

/// Without a device backend `log` records are dropped unless the host
/// installs its own logger.
#[cfg(not(feature = "esp32"))]
pub fn init(level: log::LevelFilter) {
    log::set_max_level(level);
}
