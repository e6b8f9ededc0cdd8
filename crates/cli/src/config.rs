//! Client configuration: file values first, flags on top

use fabric_sdk::SdkConfig;
use std::path::Path;

/// Node settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub orderer: Option<String>,
    pub peers: Vec<String>,
    pub committer: Option<String>,
    pub commit_timeout_ms: Option<u64>,
}

/// Load `path` (or the defaults) and apply the flag overrides
pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<SdkConfig> {
    let mut config = match path {
        Some(path) => SdkConfig::load(path)?,
        None => SdkConfig::default(),
    };

    if let Some(orderer) = &overrides.orderer {
        config = config.with_orderer(orderer.clone());
    }
    if !overrides.peers.is_empty() {
        config = config.with_peers(overrides.peers.iter().cloned());
    }
    if let Some(committer) = &overrides.committer {
        config = config.with_committer(committer.clone());
    }
    if let Some(timeout_ms) = overrides.commit_timeout_ms {
        config = config.with_commit_timeout(timeout_ms);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"orderer":{"address":"orderer0:7050"},"peers":[{"address":"peer0:7051"}],"timeouts":{"commit_ms":1000}}"#,
        )
        .unwrap();

        let overrides = Overrides {
            peers: vec!["peer1:7051".into(), "peer2:7051".into()],
            commit_timeout_ms: Some(0),
            ..Default::default()
        };
        let config = resolve(Some(file.path()), &overrides).unwrap();

        assert_eq!(config.orderer.address, "orderer0:7050");
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.committer_address(), Some("peer1:7051"));
        assert!(config.timeouts.commit().is_none());
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, &Overrides::default()).unwrap();
        assert_eq!(config, SdkConfig::default());
    }
}
