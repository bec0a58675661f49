//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Herald".to_string()
}

pub fn default_data_dir() -> String {
    "~/.herald".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_deployment_id() -> String {
    "default".to_string()
}

pub fn default_country_code() -> String {
    "94".to_string()
}

pub fn default_device_name() -> String {
    "HERALD".to_string()
}

pub fn default_reconnect_delay_secs() -> u64 {
    10
}

pub fn default_pairing_expiry_secs() -> u64 {
    120
}

pub fn default_db_path() -> String {
    "~/.herald/data/herald.db".to_string()
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    10000
}

pub fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:10000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:10000".to_string(),
    ]
}

pub fn default_bulk_delay_ms() -> u64 {
    2000
}

pub fn default_detection_limit() -> usize {
    50
}

pub fn default_detection_delay_ms() -> u64 {
    1000
}
