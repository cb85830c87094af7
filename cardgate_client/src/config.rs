use std::time::Duration;

use cg_common::{parse_boolean_flag, Secret};
use log::*;

pub const LIVE_API_URL: &str = "https://secure.curopayments.net/rest/v1/curo/";
pub const STAGING_API_URL: &str = "https://secure-staging.curopayments.net/rest/v1/curo/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CardgateConfig {
    /// The merchant id used as the basic auth user name
    pub merchant_id: i64,
    pub api_key: Secret<String>,
    /// The site that transactions are registered against
    pub site_id: i64,
    /// The site's shared secret. The gateway signs callbacks with it, so it doubles as the callback hash key.
    pub site_key: Secret<String>,
    /// When true, requests go to the staging environment
    pub testmode: bool,
    /// The REST endpoint. Resource paths such as `payment/` are appended to it, so it must end with a slash.
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for CardgateConfig {
    fn default() -> Self {
        Self {
            merchant_id: 0,
            api_key: Secret::default(),
            site_id: 0,
            site_key: Secret::default(),
            testmode: false,
            api_url: LIVE_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CardgateConfig {
    pub fn new(merchant_id: i64, api_key: Secret<String>, testmode: bool) -> Self {
        let api_url = default_api_url(testmode).to_string();
        Self { merchant_id, api_key, testmode, api_url, ..Default::default() }
    }

    pub fn new_from_env_or_default() -> Self {
        let merchant_id = parse_env_i64("CG_MERCHANT_ID");
        let api_key = Secret::new(std::env::var("CG_API_KEY").unwrap_or_else(|_| {
            warn!("CG_API_KEY not set, using (probably useless) empty default");
            String::default()
        }));
        let site_id = parse_env_i64("CG_SITE_ID");
        let site_key = Secret::new(std::env::var("CG_SITE_KEY").unwrap_or_else(|_| {
            warn!("CG_SITE_KEY not set. No callback will pass verification.");
            String::default()
        }));
        let testmode = parse_boolean_flag(std::env::var("CG_TESTMODE").ok(), false);
        let api_url = std::env::var("CG_API_URL").ok().map(with_trailing_slash).unwrap_or_else(|| {
            let url = default_api_url(testmode);
            info!("CG_API_URL not set, using {url}");
            url.to_string()
        });
        let timeout = std::env::var("CG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("{s} is not a valid value for CG_TIMEOUT_SECS. {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { merchant_id, api_key, site_id, site_key, testmode, api_url, timeout }
    }
}

pub fn default_api_url(testmode: bool) -> &'static str {
    if testmode {
        STAGING_API_URL
    } else {
        LIVE_API_URL
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

fn parse_env_i64(var: &str) -> i64 {
    match std::env::var(var) {
        Ok(s) => s.parse::<i64>().unwrap_or_else(|e| {
            error!("{s} is not a valid value for {var}. {e} Using 0 instead.");
            0
        }),
        Err(_) => {
            warn!("{var} not set, using 0 as default");
            0
        },
    }
}
