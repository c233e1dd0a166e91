/*
 * The contents of this file are subject to the terms of the
 * Common Development and Distribution License, Version 1.0 only
 * (the "License").  You may not use this file except in compliance
 * with the License.
 *
 * See the file LICENSE in this distribution for details.
 * A copy of the CDDL is also available via the Internet at
 * http://www.opensource.org/licenses/cddl1.txt
 *
 * When distributing Covered Code, include this CDDL HEADER in each
 * file and include the contents of the LICENSE file from this
 * distribution.
 */

// Mirror Down Loader
// - agent.rs file -

use crate::error::ExtractError;

use anyhow::Result;
use std::time::Duration;
use tracing::debug;
use ureq::{Agent, AgentBuilder, Proxy, Response};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Run-wide settings. Built once in main.rs and only ever read afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user_agent: String,
    pub timeout: Duration,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verbose: false,
        }
    }
}

pub trait AgentBase {
    fn init(url: &Url, settings: &Settings) -> Result<Agent>;
}

pub struct MirrordlAgent;
impl AgentBase for MirrordlAgent {
    // Default download agent for mirrordl. Sets a proxy or not.
    fn init(url: &Url, settings: &Settings) -> Result<Agent> {
        let mut builder = AgentBuilder::new()
            .timeout(settings.timeout)
            .user_agent(&settings.user_agent);

        if let Some(env_proxy) = env_proxy::for_url(url).host_port() {
            // Use a proxy:
            let proxy = Proxy::new(format!("{}:{}", env_proxy.0, env_proxy.1))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build())
    }
}

/// HTTP access for site definitions and the downloader.
pub struct WebAgent {
    settings: Settings,
}

impl WebAgent {
    pub fn new(settings: Settings) -> Self {
        WebAgent { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// GET <url>, optionally resuming at byte <range_from>.
    pub fn get(&self, url: &str, referer: Option<&str>, range_from: Option<u64>) -> Result<Response> {
        let url_p = Url::parse(url)?;
        let agent = MirrordlAgent::init(&url_p, &self.settings)?;

        let mut request = agent.get(url_p.as_str());
        if let Some(referer) = referer {
            request = request.set("Referer", referer);
        }
        if let Some(from) = range_from {
            request = request.set("Range", &format!("bytes={}-", from));
        }

        debug!("GET {}", url);
        match request.call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(404, _)) => Err(ExtractError::NotFound(url.to_string()).into()),
            Err(ureq::Error::Status(code, _)) => Err(ExtractError::HttpStatus {
                url: url.to_string(),
                code,
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String> {
        Ok(self.get(url, referer, None)?.into_string()?)
    }

    /// Fetches a web page. Non-breaking spaces are turned into plain ones,
    /// the sites use them in episode labels.
    pub fn download_webpage(&self, url: &str) -> Result<String> {
        Ok(self.get_text(url, None)?.replace("&nbsp;", " "))
    }
}
