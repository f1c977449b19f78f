//! Deployment registry for the ReelApps family.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Apex domain every app is served under.
pub const MAIN_DOMAIN: &str = "reelapps.co.za";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKey {
    ReelHunter,
    ReelCv,
    ReelPersona,
    ReelProjects,
    ReelSkills,
}

impl AppKey {
    pub const ALL: [AppKey; 5] = [
        AppKey::ReelHunter,
        AppKey::ReelCv,
        AppKey::ReelPersona,
        AppKey::ReelProjects,
        AppKey::ReelSkills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppKey::ReelHunter => "reelhunter",
            AppKey::ReelCv => "reelcv",
            AppKey::ReelPersona => "reelpersona",
            AppKey::ReelProjects => "reelprojects",
            AppKey::ReelSkills => "reelskills",
        }
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AppKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| ConfigError::Invalid(format!("Unknown app: {}", s.trim())))
    }
}

/// Where and how one app is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub key: AppKey,
    pub name: &'static str,
    pub domain: &'static str,
    /// Local dev server port.
    pub port: u16,
    pub description: &'static str,
}

pub static APPS: [AppConfig; 5] = [
    AppConfig {
        key: AppKey::ReelHunter,
        name: "ReelHunter",
        domain: "reelhunter.reelapps.co.za",
        port: 5175,
        description: "AI-powered recruiter matching platform",
    },
    AppConfig {
        key: AppKey::ReelCv,
        name: "ReelCV",
        domain: "reelcv.reelapps.co.za",
        port: 5176,
        description: "Interactive CV builder with video integration",
    },
    AppConfig {
        key: AppKey::ReelPersona,
        name: "ReelPersona",
        domain: "reelpersona.reelapps.co.za",
        port: 5177,
        description: "AI personality analysis for professionals",
    },
    AppConfig {
        key: AppKey::ReelProjects,
        name: "ReelProjects",
        domain: "reelprojects.reelapps.co.za",
        port: 5178,
        description: "Project showcase and portfolio builder",
    },
    AppConfig {
        key: AppKey::ReelSkills,
        name: "ReelSkills",
        domain: "reelskills.reelapps.co.za",
        port: 5179,
        description: "Skills assessment and verification platform",
    },
];

pub fn app_config(key: AppKey) -> &'static AppConfig {
    // APPS is declared in AppKey order.
    &APPS[key as usize]
}

/// Find the app served at `host` (a production domain or `localhost:<port>`).
pub fn current_app(host: &str) -> Option<&'static AppConfig> {
    APPS.iter().find(|app| {
        host.contains(app.domain) || host.contains(&format!("localhost:{}", app.port))
    })
}

impl AppConfig {
    /// Public URL of the app.
    pub fn url(&self) -> String {
        format!("https://{}", self.domain)
    }
}
