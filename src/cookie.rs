//! Portable cookie records exchanged with the extension

use serde::{Deserialize, Serialize};

/// Cookie attribute restricting cross-site transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    NoRestriction,
    Lax,
    Strict,
    Unspecified,
}

impl SameSite {
    /// Map the integer the cookie store persists. Values outside the known
    /// range map to `Unspecified`, never to an error.
    pub fn from_store(raw: i64) -> Self {
        match raw {
            0 => SameSite::NoRestriction,
            1 => SameSite::Lax,
            2 => SameSite::Strict,
            _ => SameSite::Unspecified,
        }
    }
}

impl Default for SameSite {
    fn default() -> Self {
        SameSite::Unspecified
    }
}

/// A browser cookie in the portable form the extension imports.
///
/// `host_only` is derived from the domain (`true` unless it starts with a
/// dot) and `session` from the store's persistence flag; both are computed
/// when the raw store row is mapped, never stored. Optional fields are
/// omitted from the encoded form when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
    #[serde(default)]
    pub same_site: SameSite,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub session: bool,
    #[serde(default)]
    pub store_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Cookie, SameSite};

    #[test]
    fn same_site_maps_store_integers() {
        let cases = [
            (0, SameSite::NoRestriction),
            (1, SameSite::Lax),
            (2, SameSite::Strict),
            (99, SameSite::Unspecified),
            (-1, SameSite::Unspecified),
        ];
        for (raw, expected) in cases {
            assert_eq!(SameSite::from_store(raw), expected, "raw value {}", raw);
        }
    }

    #[test]
    fn same_site_serializes_as_snake_case() {
        let json = serde_json::to_string(&SameSite::NoRestriction).expect("serialize");
        assert_eq!(json, "\"no_restriction\"");
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let cookie = Cookie {
            domain: ".example.com".to_string(),
            name: "sid".to_string(),
            value: "abc".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            expiration_date: None,
            same_site: SameSite::Lax,
            host_only: false,
            session: true,
            store_id: "0".to_string(),
            url: None,
        };
        let json = serde_json::to_string(&cookie).expect("serialize");
        assert!(!json.contains("expirationDate"));
        assert!(!json.contains("null"));
        assert!(json.contains("\"httpOnly\":true"));
        assert!(json.contains("\"sameSite\":\"lax\""));
    }
}
