//! Region and target descriptors
//!
//! Deserialized once at startup and immutable afterwards. `EngineSettings::validate`
//! rejects every malformed entry before the first cycle runs.

use std::collections::HashSet;

use prospect_common::{DEFAULT_NAMING_PREFIX, PathTranslator, StorageLayout, SyncError, SyncResult};
use prospect_persistence::PoolSettings;
use serde::Deserialize;

/// Connection and relation names of one region's source database
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SourceDbSettings {
    pub url: String,
    /// Change-log relation (`MLOG$_...`)
    pub log_table: String,
    /// Document metadata relation
    pub document_table: String,
    pub pool: PoolSettings,
}

/// Token-gated download gateway of a region
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub login_url: String,
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub download_url: String,
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("login_url", &self.login_url)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("download_url", &self.download_url)
            .finish()
    }
}

impl GatewaySettings {
    fn validate(&self, region: &str) -> SyncResult<()> {
        let fields = [
            ("login_url", &self.login_url),
            ("grant_type", &self.grant_type),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("download_url", &self.download_url),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SyncError::configuration(format!(
                    "region '{}': gateway.{} is empty",
                    region, name
                )));
            }
        }
        Ok(())
    }
}

/// One source site synchronized into the shared target
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegionSettings {
    pub name: String,
    /// Blob endpoint the default resolver joins relative locations onto
    pub base_url: String,
    /// Root path prefix recorded in source locations
    pub root_dir: String,
    pub db: SourceDbSettings,
    pub gateway: Option<GatewaySettings>,
}

impl RegionSettings {
    pub fn validate(&self) -> SyncResult<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::configuration("region name is empty"));
        }
        if self.db.url.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "region '{}': db.url is empty",
                self.name
            )));
        }
        if self.db.log_table.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "region '{}': db.log_table is empty",
                self.name
            )));
        }
        if self.db.document_table.trim().is_empty() {
            return Err(SyncError::configuration(format!(
                "region '{}': db.document_table is empty",
                self.name
            )));
        }

        match &self.gateway {
            Some(gateway) => gateway.validate(&self.name),
            None => {
                if self.base_url.trim().is_empty() {
                    return Err(SyncError::configuration(format!(
                        "region '{}': base_url is empty",
                        self.name
                    )));
                }
                if self.root_dir.is_empty() {
                    return Err(SyncError::configuration(format!(
                        "region '{}': root_dir is empty",
                        self.name
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Target database of the shared metadata mirror
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TargetDbSettings {
    pub url: String,
    pub document_table: String,
    pub pool: PoolSettings,
}

/// Shared target filesystem and metadata store
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    pub root_dir: String,
    pub publish_prefix: String,
    pub separator: char,
    pub db: TargetDbSettings,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            root_dir: String::new(),
            publish_prefix: String::new(),
            separator: '/',
            db: TargetDbSettings::default(),
        }
    }
}

impl TargetSettings {
    pub fn validate(&self) -> SyncResult<()> {
        if self.root_dir.is_empty() {
            return Err(SyncError::configuration("target.root_dir is empty"));
        }
        if self.publish_prefix.is_empty() {
            return Err(SyncError::configuration("target.publish_prefix is empty"));
        }
        if self.db.url.trim().is_empty() {
            return Err(SyncError::configuration("target.db.url is empty"));
        }
        if self.db.document_table.trim().is_empty() {
            return Err(SyncError::configuration("target.db.document_table is empty"));
        }
        Ok(())
    }

    pub fn translator(&self) -> PathTranslator {
        PathTranslator::new(&self.root_dir, &self.publish_prefix, self.separator)
    }

    pub fn layout(&self, naming_prefix: &str) -> StorageLayout {
        StorageLayout::new(&self.root_dir, naming_prefix, self.separator)
    }
}

/// Engine-wide tuning
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Prepended to the region name to form the region's storage directory
    pub naming_prefix: String,
    /// Consecutive permanent failures before an entry is dead-lettered; 0 disables
    pub dead_letter_after: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            naming_prefix: DEFAULT_NAMING_PREFIX.to_string(),
            dead_letter_after: 5,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

/// Everything the orchestrator needs to build its dispatchers
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub sync: SyncSettings,
    pub target: TargetSettings,
    pub regions: Vec<RegionSettings>,
}

impl EngineSettings {
    pub fn validate(&self) -> SyncResult<()> {
        self.target.validate()?;

        if self.regions.is_empty() {
            return Err(SyncError::configuration("no regions configured"));
        }

        let mut names = HashSet::new();
        for region in &self.regions {
            region.validate()?;
            if !names.insert(region.name.as_str()) {
                return Err(SyncError::configuration(format!(
                    "duplicate region name '{}'",
                    region.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str) -> RegionSettings {
        RegionSettings {
            name: name.to_string(),
            base_url: "http://src/".to_string(),
            root_dir: "/root".to_string(),
            db: SourceDbSettings {
                url: "mysql://u:p@h/db".to_string(),
                log_table: "MLOG$_WELL_DOC".to_string(),
                document_table: "WELL_DOC".to_string(),
                pool: PoolSettings::default(),
            },
            gateway: None,
        }
    }

    fn engine(regions: Vec<RegionSettings>) -> EngineSettings {
        EngineSettings {
            sync: SyncSettings::default(),
            target: TargetSettings {
                root_dir: "/data".to_string(),
                publish_prefix: "ftp://h/files".to_string(),
                separator: '/',
                db: TargetDbSettings {
                    url: "mysql://u:p@t/db".to_string(),
                    document_table: "WELL_DOC".to_string(),
                    pool: PoolSettings::default(),
                },
            },
            regions,
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(engine(vec![region("east"), region("xj")]).validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_and_duplicate_regions() {
        assert!(matches!(
            engine(vec![]).validate(),
            Err(SyncError::Configuration(_))
        ));
        assert!(matches!(
            engine(vec![region("east"), region("east")]).validate(),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_missing_relation_names() {
        let mut r = region("east");
        r.db.log_table.clear();
        assert!(r.validate().is_err());

        let mut r = region("east");
        r.db.document_table = "  ".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_gateway_region_needs_every_field() {
        let mut r = region("xj");
        r.base_url.clear();
        r.gateway = Some(GatewaySettings {
            login_url: "http://auth/token".to_string(),
            grant_type: "client_credentials".to_string(),
            client_id: "sync".to_string(),
            client_secret: String::new(),
            download_url: "http://gw/download".to_string(),
        });
        assert!(r.validate().is_err());

        if let Some(gateway) = r.gateway.as_mut() {
            gateway.client_secret = "s3cret".to_string();
        }
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_gateway_secret_redacted() {
        let gateway = GatewaySettings {
            client_secret: "s3cret".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", gateway);
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn test_deserialize_regions() {
        let yaml = r#"
sync:
  dead_letter_after: 3
target:
  root_dir: /data/files
  publish_prefix: ftp://10.0.0.8/files
  db:
    url: mysql://u:p@t/db
    document_table: WELL_DOC
regions:
  - name: east
    base_url: http://10.1.1.5:8080/docs/
    root_dir: /root
    db:
      url: mysql://u:p@east/db
      log_table: MLOG$_WELL_DOC
      document_table: WELL_DOC
      pool:
        max_connections: 2
  - name: xj
    db:
      url: mysql://u:p@xj/db
      log_table: MLOG$_WELL_DOC
      document_table: WELL_DOC
    gateway:
      login_url: http://auth/oauth/token
      grant_type: client_credentials
      client_id: prospect
      client_secret: s3cret
      download_url: http://gw/download
"#;
        let settings: EngineSettings = serde_yaml::from_str(yaml).unwrap();

        assert!(settings.validate().is_ok());
        assert_eq!(settings.sync.dead_letter_after, 3);
        assert_eq!(settings.sync.naming_prefix, "cnpc_");
        assert_eq!(settings.target.separator, '/');
        assert_eq!(settings.regions[0].db.pool.max_connections, 2);
        assert_eq!(settings.regions[0].db.pool.min_connections, 1);
        assert!(settings.regions[0].gateway.is_none());
        assert!(settings.regions[1].gateway.is_some());
    }

    #[test]
    fn test_sync_defaults() {
        let sync = SyncSettings::default();
        assert_eq!(sync.naming_prefix, "cnpc_");
        assert_eq!(sync.dead_letter_after, 5);
    }
}
