//! License store API types and response classification.
//!
//! The license server speaks a loose JSON dialect: fields appear and
//! disappear between responses, numbers arrive as strings, and `expires` can
//! be a date, the word `"lifetime"`, or boolean `false`. [`LicenseResponse`]
//! absorbs that looseness at the parse step and [`classify`] turns it into an
//! explicit [`LicenseVerdict`], so nothing downstream touches raw JSON.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Store action for activating a license key.
pub const ACTION_ACTIVATE: &str = "activate_license";
/// Store action for deactivating a license key.
pub const ACTION_DEACTIVATE: &str = "deactivate_license";
/// Store action for checking a license key without activating it.
pub const ACTION_CHECK: &str = "check_license";

/// A request to the license store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    /// One of the `ACTION_*` constants; sent as `edd_action`.
    pub action: &'static str,
    /// The license key.
    pub license: String,
    /// Product identity under which the license was sold.
    pub item_name: String,
    /// Installed product version.
    pub current_version: String,
    /// The requesting site's URL.
    pub url: String,
}

impl LicenseRequest {
    /// Builds an activation request.
    pub fn activate(
        license: impl Into<String>,
        item_name: impl Into<String>,
        current_version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            action: ACTION_ACTIVATE,
            license: license.into(),
            item_name: item_name.into(),
            current_version: current_version.into(),
            url: url.into(),
        }
    }

    /// Builds a deactivation request.
    pub fn deactivate(
        license: impl Into<String>,
        item_name: impl Into<String>,
        current_version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            action: ACTION_DEACTIVATE,
            ..Self::activate(license, item_name, current_version, url)
        }
    }

    /// Builds a status-check request.
    pub fn check(
        license: impl Into<String>,
        item_name: impl Into<String>,
        current_version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            action: ACTION_CHECK,
            ..Self::activate(license, item_name, current_version, url)
        }
    }

    /// The POST form fields, in wire order.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("edd_action".into(), self.action.into()),
            ("license".into(), self.license.clone()),
            ("item_name".into(), self.item_name.clone()),
            ("current_version".into(), self.current_version.clone()),
            ("url".into(), self.url.clone()),
        ]
    }
}

/// Raw license server response, parsed leniently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LicenseResponse {
    /// Whether the store reports the operation as successful.
    #[serde(default)]
    pub success: Option<bool>,
    /// License status string (`valid`, `invalid`, `failed`, `deactivated`, ...).
    #[serde(default)]
    pub license: Option<String>,
    /// Error discriminant (`expired`, `revoked`, ...).
    #[serde(default)]
    pub error: Option<String>,
    /// Remaining activations; the store sends this as a string or a number.
    #[serde(default, deserialize_with = "lenient_string")]
    pub activations_left: Option<String>,
    /// Expiry date, `"lifetime"`, or boolean `false` for none.
    #[serde(default, deserialize_with = "lenient_string")]
    pub expires: Option<String>,
    /// Renewal link for expired licenses.
    #[serde(default)]
    pub renew_link: Option<String>,
}

impl LicenseResponse {
    /// Parses a response body. Unparseable bodies yield `None` and are
    /// treated as "server did not respond" by the cache layer.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Whether the reported expiry date lies at or before `now` (Unix secs).
    ///
    /// Absent, empty, `"lifetime"`, and unparseable values never expire.
    pub fn is_past_expiry(&self, now: i64) -> bool {
        let Some(expires) = self.expires.as_deref() else {
            return false;
        };
        if expires.is_empty() || expires == "lifetime" {
            return false;
        }
        match parse_expiry(expires) {
            Some(ts) => ts != 0 && ts <= now,
            None => false,
        }
    }

    fn activations_exhausted(&self) -> bool {
        self.activations_left.as_deref() == Some("0")
    }
}

/// Parses the store's ISO-like expiry formats to a Unix timestamp.
fn parse_expiry(value: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Str(String),
        Num(i64),
        Bool(bool),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Str(s)) => Some(s),
        Some(Lenient::Num(n)) => Some(n.to_string()),
        // `expires: false` means "no expiry on record".
        Some(Lenient::Bool(_)) => None,
        None => None,
    })
}

/// Explicit outcome of classifying a license server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseVerdict {
    /// License is active and in good standing.
    Valid,
    /// License term has lapsed.
    Expired,
    /// License was revoked by the store.
    Disabled,
    /// License key is not usable.
    Invalid {
        /// True when the key itself may be fine but its activation limit is
        /// reached; callers show a distinct message for this sub-case.
        no_activations_left: bool,
    },
    /// The store reported the activation attempt as failed.
    Failed,
    /// License was deactivated for this site.
    Deactivated,
    /// Unrecognized status string, passed through verbatim.
    Other(String),
}

impl LicenseVerdict {
    /// The status string persisted in config storage.
    pub fn status_str(&self) -> &str {
        match self {
            LicenseVerdict::Valid => "valid",
            LicenseVerdict::Expired => "expired",
            LicenseVerdict::Disabled => "disabled",
            LicenseVerdict::Invalid { .. } => "invalid",
            LicenseVerdict::Failed => "failed",
            LicenseVerdict::Deactivated => "deactivated",
            LicenseVerdict::Other(s) => s,
        }
    }

    /// A user-facing notice for non-valid verdicts.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            LicenseVerdict::Valid | LicenseVerdict::Deactivated | LicenseVerdict::Other(_) => None,
            LicenseVerdict::Expired => Some("License key has expired. Please renew it."),
            LicenseVerdict::Disabled => Some("License key has been revoked."),
            LicenseVerdict::Invalid {
                no_activations_left: true,
            } => Some("License key has reached its activation limit."),
            LicenseVerdict::Invalid {
                no_activations_left: false,
            } => Some("Invalid license key."),
            LicenseVerdict::Failed => Some("License activation failed. Please try again."),
        }
    }
}

/// Classifies a parsed response into a verdict.
///
/// `now` is the current Unix time, used to override the verdict to expired
/// when the reported expiry date is already past.
pub fn classify(response: &LicenseResponse, now: i64) -> LicenseVerdict {
    let error = if response.is_past_expiry(now) {
        Some("expired")
    } else {
        response.error.as_deref()
    };

    let success = response.success.unwrap_or(false);
    let license = response.license.as_deref();

    if !success && error == Some("expired") {
        LicenseVerdict::Expired
    } else if license == Some("invalid") && error == Some("revoked") {
        LicenseVerdict::Disabled
    } else if license == Some("invalid") || response.activations_exhausted() {
        LicenseVerdict::Invalid {
            no_activations_left: response.activations_exhausted(),
        }
    } else if license == Some("failed") {
        LicenseVerdict::Failed
    } else {
        match license {
            Some("valid") => LicenseVerdict::Valid,
            Some("deactivated") => LicenseVerdict::Deactivated,
            Some(other) => LicenseVerdict::Other(other.to_string()),
            None => LicenseVerdict::Other(String::new()),
        }
    }
}
