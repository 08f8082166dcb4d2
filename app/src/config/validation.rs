//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

use super::defaults::{MAX_CHECK_INTERVAL, MIN_CHECK_INTERVAL};

static RE_CLIENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,64}$").unwrap());
static RE_CLIENT_SECRET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,128}$").unwrap());

pub fn validate_check_interval(minutes: u32) -> Result<(), String> {
    if !(MIN_CHECK_INTERVAL..=MAX_CHECK_INTERVAL).contains(&minutes) {
        return Err(format!(
            "must be between {MIN_CHECK_INTERVAL} and {MAX_CHECK_INTERVAL} minutes"
        ));
    }
    Ok(())
}

pub fn validate_client_id(value: &str) -> Result<(), String> {
    if !RE_CLIENT_ID.is_match(value) {
        return Err("client id must be 1-64 letters or digits".into());
    }
    Ok(())
}

pub fn validate_client_secret(value: &str) -> Result<(), String> {
    if !RE_CLIENT_SECRET.is_match(value) {
        return Err("client secret must be 1-128 letters or digits".into());
    }
    Ok(())
}
