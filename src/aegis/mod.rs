//! Aegis Authenticator plain-text vault JSON: export of accounts into a
//! v2 vault, and lenient import that keeps only usable TOTP entries.

use crate::account::Account;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AegisVault {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub header: AegisHeader,
    #[serde(default)]
    pub db: AegisDb,
}

/// Plain-text vaults carry null slots/params; encrypted vaults are not
/// supported here.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AegisHeader {
    pub slots: Option<Value>,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AegisDb {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<AegisEntry>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AegisEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub icon: Option<Value>,
    #[serde(default)]
    pub info: AegisInfo,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AegisInfo {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub algo: String,
    #[serde(default)]
    pub digits: u32,
    #[serde(default)]
    pub period: u32,
}

/// Render accounts as a pretty-printed Aegis v2 vault. Every entry is a
/// six-digit, 30-second SHA1 TOTP with a fresh uuid.
pub fn export_accounts(accounts: &[Account]) -> String {
    let vault = AegisVault {
        version: 2,
        header: AegisHeader {
            slots: None,
            params: None,
        },
        db: AegisDb {
            version: 2,
            entries: accounts
                .iter()
                .map(|account| AegisEntry {
                    entry_type: String::from("totp"),
                    uuid: Uuid::new_v4().to_string(),
                    name: account.name.clone(),
                    issuer: account
                        .issuer
                        .clone()
                        .unwrap_or_else(|| account.name.clone()),
                    note: String::new(),
                    favorite: false,
                    icon: None,
                    info: AegisInfo {
                        secret: account.secret.clone(),
                        algo: String::from("SHA1"),
                        digits: 6,
                        period: 30,
                    },
                })
                .collect(),
        },
    };

    serde_json::to_string_pretty(&vault).unwrap_or_default()
}

/// Parse an Aegis vault backup. Entries that are not TOTP or carry no
/// secret are skipped; secrets are normalized to uppercase without
/// whitespace. `None` when the JSON is malformed or nothing survives.
pub fn parse_vault(json: &str) -> Option<Vec<Account>> {
    let vault: AegisVault = serde_json::from_str(json).ok()?;

    let mut accounts = Vec::new();
    for entry in vault.db.entries {
        if entry.entry_type != "totp" {
            continue;
        }

        let secret: String = entry
            .info
            .secret
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if secret.is_empty() {
            continue;
        }

        let issuer = if entry.issuer.is_empty() {
            None
        } else {
            Some(entry.issuer)
        };
        let name = if entry.name.is_empty() {
            issuer
                .clone()
                .unwrap_or_else(|| String::from("Imported Account"))
        } else {
            entry.name
        };

        accounts.push(Account {
            name,
            secret,
            issuer,
        });
    }

    if accounts.is_empty() {
        None
    } else {
        Some(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Vec<Account> {
        vec![
            Account {
                name: String::from("alice"),
                secret: String::from("JBSWY3DPEHPK3PXP"),
                issuer: Some(String::from("GitHub")),
            },
            Account {
                name: String::from("standalone"),
                secret: String::from("MZXW6YTBOI"),
                issuer: None,
            },
        ]
    }

    #[test]
    fn export_layout() {
        let json = export_accounts(&accounts());
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 2);
        assert!(value["header"]["slots"].is_null());
        assert!(value["header"]["params"].is_null());

        let entries = value["db"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["type"], "totp");
        assert_eq!(entries[0]["issuer"], "GitHub");
        assert_eq!(entries[1]["issuer"], "standalone"); // falls back to name
        assert_eq!(entries[0]["info"]["algo"], "SHA1");
        assert_eq!(entries[0]["info"]["digits"], 6);
        assert_eq!(entries[0]["info"]["period"], 30);
        assert!(entries[0]["icon"].is_null());
        // uuids are fresh per entry
        assert_ne!(entries[0]["uuid"], entries[1]["uuid"]);
    }

    #[test]
    fn export_then_import_round_trip() {
        let exported = export_accounts(&accounts());
        let recovered = parse_vault(&exported).unwrap();

        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].name, "alice");
        assert_eq!(recovered[0].secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(recovered[0].issuer.as_deref(), Some("GitHub"));
        // The exporter writes issuer = name for issuerless accounts, so
        // the round trip materializes it.
        assert_eq!(recovered[1].issuer.as_deref(), Some("standalone"));
    }

    #[test]
    fn import_filters_unusable_entries() {
        let json = r#"{
            "version": 2,
            "header": { "slots": null, "params": null },
            "db": {
                "version": 2,
                "entries": [
                    { "type": "steam", "name": "game", "info": { "secret": "JBSWY3DP" } },
                    { "type": "totp", "name": "no-secret", "info": { "secret": "" } },
                    { "type": "totp", "name": "ok", "issuer": "Svc", "info": { "secret": "jbsw y3dp" } }
                ]
            }
        }"#;

        let recovered = parse_vault(json).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].name, "ok");
        assert_eq!(recovered[0].secret, "JBSWY3DP");
        assert_eq!(recovered[0].issuer.as_deref(), Some("Svc"));
    }

    #[test]
    fn import_failure_is_none() {
        assert!(parse_vault("not json").is_none());
        assert!(parse_vault("{}").is_none());
        assert!(parse_vault(r#"{"db": {"entries": []}}"#).is_none());
    }

    #[test]
    fn nameless_entry_falls_back_to_issuer() {
        let json = r#"{"db": {"entries": [
            { "type": "totp", "issuer": "OnlyIssuer", "info": { "secret": "JBSWY3DP" } }
        ]}}"#;
        let recovered = parse_vault(json).unwrap();
        assert_eq!(recovered[0].name, "OnlyIssuer");
    }
}
