//! NAT network records and lifecycle operations.
//!
//! VBoxManage is the source of truth: nothing is cached here, every operation
//! shells out and waits for the tool to finish.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::parse::parse_natnets;
use crate::runner::VBoxManage;

/// A NAT network definition as reported by `VBoxManage list natnets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NatNet {
    pub name: String,
    /// Gateway address (`IP`).
    pub ipv4_address: Option<Ipv4Addr>,
    /// Network address and mask (`Network`).
    pub ipv4_network: Option<Ipv4Net>,
    /// IPv6 prefix, only set when VBoxManage reports a non-empty one.
    pub ipv6_network: Option<Ipv6Net>,
    pub ipv6_enabled: bool,
    pub dhcp_enabled: bool,
    pub enabled: bool,
}

impl NatNet {
    pub fn ipv4_mask(&self) -> Option<Ipv4Addr> {
        self.ipv4_network.map(|net| net.netmask())
    }

    pub fn ipv4_prefix_len(&self) -> Option<u8> {
        self.ipv4_network.map(|net| net.prefix_len())
    }

    pub fn ipv6_mask(&self) -> Option<Ipv6Addr> {
        self.ipv6_network.map(|net| net.netmask())
    }

    /// Gateway address combined with the network mask, e.g. `10.0.2.1/24`.
    pub fn ipv4_cidr(&self) -> Option<Ipv4Net> {
        let addr = self.ipv4_address?;
        let prefix_len = self.ipv4_prefix_len()?;
        Ipv4Net::new(addr, prefix_len).ok()
    }

    /// Arguments for `natnetwork modify` reflecting the current flags.
    pub fn modify_args(&self) -> Vec<String> {
        let mut args = vec![
            "natnetwork".to_string(),
            "modify".to_string(),
            "--netname".to_string(),
            self.name.clone(),
        ];
        push_switch(&mut args, "--dhcp", self.dhcp_enabled);
        push_switch(&mut args, "--ipv6", self.ipv6_enabled);
        args
    }
}

/// Arguments for `natnetwork add`.
pub fn add_args(name: &str, cidr_block: &str, supports_dhcp: bool, supports_ipv6: bool) -> Vec<String> {
    let mut args = vec![
        "natnetwork".to_string(),
        "add".to_string(),
        "--netname".to_string(),
        name.to_string(),
        "--network".to_string(),
        cidr_block.to_string(),
    ];
    push_switch(&mut args, "--dhcp", supports_dhcp);
    push_switch(&mut args, "--ipv6", supports_ipv6);
    args
}

/// Arguments for `natnetwork remove`.
pub fn remove_args(name: &str) -> Vec<String> {
    vec![
        "natnetwork".to_string(),
        "remove".to_string(),
        "--netname".to_string(),
        name.to_string(),
    ]
}

fn list_args() -> Vec<String> {
    vec!["list".to_string(), "natnets".to_string()]
}

fn push_switch(args: &mut Vec<String>, flag: &str, on: bool) {
    args.push(flag.to_string());
    args.push(if on { "on" } else { "off" }.to_string());
}

/// Manager for VirtualBox NAT networks.
pub struct NatNetManager<R> {
    runner: R,
}

impl<R: VBoxManage> NatNetManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// List all NAT networks keyed by name.
    pub async fn natnets(&self) -> Result<BTreeMap<String, NatNet>> {
        let out = self.runner.output(&list_args()).await?;
        parse_natnets(&out)
    }

    /// Look up a single NAT network by name.
    pub async fn natnet(&self, name: &str) -> Result<Option<NatNet>> {
        Ok(self.natnets().await?.remove(name))
    }

    /// Create a NAT network and return it as listed afterwards.
    ///
    /// If VBoxManage does not list the network after a successful add, an
    /// empty `NatNet` is returned instead of an error; check `name`.
    pub async fn create_natnet(
        &self,
        name: &str,
        cidr_block: &str,
        supports_dhcp: bool,
        supports_ipv6: bool,
    ) -> Result<NatNet> {
        info!(
            name = %name,
            network = %cidr_block,
            dhcp = supports_dhcp,
            ipv6 = supports_ipv6,
            "Creating NAT network"
        );

        self.runner
            .run(&add_args(name, cidr_block, supports_dhcp, supports_ipv6))
            .await?;

        let mut nets = self.natnets().await?;
        match nets.remove(name) {
            Some(net) => Ok(net),
            None => {
                warn!(name = %name, "NAT network missing from listing after create");
                Ok(NatNet::default())
            }
        }
    }

    /// Delete a NAT network.
    pub async fn delete_natnet(&self, name: &str) -> Result<()> {
        info!(name = %name, "Deleting NAT network");
        self.runner.run(&remove_args(name)).await
    }

    /// Push the DHCP and IPv6 flags of `net` to VBoxManage.
    ///
    /// This runs `natnetwork modify`. Earlier ports only assembled the
    /// arguments and never executed them.
    pub async fn update(&self, net: &NatNet) -> Result<()> {
        info!(
            name = %net.name,
            dhcp = net.dhcp_enabled,
            ipv6 = net.ipv6_enabled,
            "Updating NAT network"
        );
        self.runner.run(&net.modify_args()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::NatNetError;

    /// Replays canned listings and records every invocation.
    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        listings: Mutex<VecDeque<String>>,
        fail_run: bool,
    }

    impl ScriptedRunner {
        fn with_listings(listings: &[&str]) -> Self {
            Self {
                listings: Mutex::new(listings.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VBoxManage for ScriptedRunner {
        async fn run(&self, args: &[String]) -> Result<()> {
            self.calls.lock().unwrap().push(args.to_vec());
            if self.fail_run {
                return Err(NatNetError::ToolNotFound("VBoxManage".to_string()));
            }
            Ok(())
        }

        async fn output(&self, args: &[String]) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(args.to_vec());
            let listing = self.listings.lock().unwrap().pop_front().unwrap_or_default();
            Ok(listing.into_bytes())
        }
    }

    const DEFAULT_NET: &str = "NetworkName:    NatNetwork\n\
                               IP:             10.0.2.1\n\
                               Network:        10.0.2.0/24\n\
                               IPv6 Enabled:   No\n\
                               IPv6 Prefix:    fd17:625c:f037:2::/64\n\
                               DHCP Enabled:   Yes\n\
                               Enabled:        Yes\n\
                               \n";

    const TESTING_NET: &str = "NetworkName:    testing123\n\
                               IP:             10.0.123.1\n\
                               Network:        10.0.123.0/24\n\
                               IPv6 Enabled:   Yes\n\
                               IPv6 Prefix:    \n\
                               DHCP Enabled:   No\n\
                               Enabled:        Yes\n\
                               \n";

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_args() {
        assert_eq!(
            add_args("testing123", "10.0.123.0/24", false, true),
            strings(&[
                "natnetwork",
                "add",
                "--netname",
                "testing123",
                "--network",
                "10.0.123.0/24",
                "--dhcp",
                "off",
                "--ipv6",
                "on",
            ])
        );
    }

    #[test]
    fn test_remove_args() {
        assert_eq!(
            remove_args("testing123"),
            strings(&["natnetwork", "remove", "--netname", "testing123"])
        );
    }

    #[test]
    fn test_modify_args_follow_flags() {
        let mut net = NatNet {
            name: "demo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            net.modify_args(),
            strings(&["natnetwork", "modify", "--netname", "demo", "--dhcp", "off", "--ipv6", "off"])
        );

        net.dhcp_enabled = true;
        net.ipv6_enabled = true;
        assert_eq!(
            net.modify_args(),
            strings(&["natnetwork", "modify", "--netname", "demo", "--dhcp", "on", "--ipv6", "on"])
        );
    }

    #[test]
    fn test_ipv4_cidr() {
        let net = NatNet {
            ipv4_address: Some(Ipv4Addr::new(10, 0, 2, 1)),
            ipv4_network: Some("10.0.2.0/24".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(net.ipv4_cidr(), Some("10.0.2.1/24".parse().unwrap()));
        assert_eq!(net.ipv4_mask(), Some(Ipv4Addr::new(255, 255, 255, 0)));

        let no_mask = NatNet {
            ipv4_address: Some(Ipv4Addr::new(10, 0, 2, 1)),
            ..Default::default()
        };
        assert_eq!(no_mask.ipv4_cidr(), None);
    }

    #[tokio::test]
    async fn test_natnets_lists_all() {
        let listing = format!("{DEFAULT_NET}{TESTING_NET}");
        let manager = NatNetManager::new(ScriptedRunner::with_listings(&[listing.as_str()]));

        let nets = manager.natnets().await.unwrap();
        assert_eq!(nets.len(), 2);
        assert!(nets.contains_key("NatNetwork"));
        assert!(nets.contains_key("testing123"));
        assert_eq!(manager.runner().calls(), vec![strings(&["list", "natnets"])]);
    }

    #[tokio::test]
    async fn test_natnet_lookup() {
        let manager = NatNetManager::new(ScriptedRunner::with_listings(&[DEFAULT_NET, DEFAULT_NET]));

        let net = manager.natnet("NatNetwork").await.unwrap().unwrap();
        assert!(net.dhcp_enabled);
        assert!(manager.natnet("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_then_delete() {
        let after_add = format!("{DEFAULT_NET}{TESTING_NET}");
        let manager = NatNetManager::new(ScriptedRunner::with_listings(&[
            after_add.as_str(),
            DEFAULT_NET,
        ]));

        let net = manager
            .create_natnet("testing123", "10.0.123.0/24", false, true)
            .await
            .unwrap();
        assert_eq!(net.name, "testing123");
        assert!(!net.dhcp_enabled);
        assert!(net.ipv6_enabled);
        assert_eq!(net.ipv4_prefix_len(), Some(24));

        manager.delete_natnet("testing123").await.unwrap();
        let nets = manager.natnets().await.unwrap();
        assert!(!nets.contains_key("testing123"));

        assert_eq!(
            manager.runner().calls(),
            vec![
                add_args("testing123", "10.0.123.0/24", false, true),
                strings(&["list", "natnets"]),
                remove_args("testing123"),
                strings(&["list", "natnets"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_missing_from_listing_returns_empty_record() {
        let manager = NatNetManager::new(ScriptedRunner::with_listings(&[DEFAULT_NET]));

        let net = manager
            .create_natnet("ghost", "10.9.0.0/24", true, false)
            .await
            .unwrap();
        assert_eq!(net, NatNet::default());
    }

    #[tokio::test]
    async fn test_create_failure_skips_listing() {
        let runner = ScriptedRunner {
            fail_run: true,
            ..Default::default()
        };
        let manager = NatNetManager::new(runner);

        let err = manager
            .create_natnet("testing123", "10.0.123.0/24", false, true)
            .await
            .unwrap_err();
        assert!(err.is_subprocess());
        assert_eq!(manager.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_update_runs_modify() {
        let manager = NatNetManager::new(ScriptedRunner::with_listings(&[TESTING_NET]));

        let mut net = manager.natnet("testing123").await.unwrap().unwrap();
        net.dhcp_enabled = true;
        manager.update(&net).await.unwrap();

        let calls = manager.runner().calls();
        assert_eq!(
            calls.last().unwrap(),
            &strings(&[
                "natnetwork",
                "modify",
                "--netname",
                "testing123",
                "--dhcp",
                "on",
                "--ipv6",
                "on",
            ])
        );
    }
}
