use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Transport category of a network interface
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    /// Physical Ethernet connection
    Ethernet,
    /// Wireless network interface
    WiFi,
    /// Mobile data modem (rmnet, wwan, ...)
    Cellular,
    /// VPN or tunnel interface; its traffic is already counted on the physical link
    Vpn,
    /// Container, bridge or virtual machine interface
    Virtual,
    /// Loopback interface (localhost)
    Loopback,
    /// Unknown or unclassified interface type
    Unknown,
}

impl InterfaceKind {
    /// Whether this kind is a physical transport whose bytes should be counted
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            InterfaceKind::Ethernet | InterfaceKind::WiFi | InterfaceKind::Cellular
        )
    }
}

/// Why an interface is or is not part of the traffic total
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CountDecision {
    Counted,
    /// Not a physical transport
    NotPhysical,
    /// Listed in the user blacklist
    Blacklisted,
    /// An include list is configured and this interface is not on it
    NotIncluded,
}

/// Classification result for a single interface
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub kind: InterfaceKind,
    pub decision: CountDecision,
}

impl InterfaceInfo {
    pub fn is_counted(&self) -> bool {
        self.decision == CountDecision::Counted
    }
}

/// Supported platforms
#[derive(Debug, Clone, PartialEq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
    Unknown,
}

/// Cross-platform interface classifier with user blacklist and include list
#[derive(Debug)]
pub struct InterfaceManager {
    platform: Platform,
    blacklist: HashSet<String>,
    include: HashSet<String>,
    kind_cache: HashMap<String, InterfaceKind>,
}

impl Default for InterfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceManager {
    /// Create a new interface manager for the current platform
    pub fn new() -> Self {
        Self::for_platform(Self::detect_platform())
    }

    pub fn for_platform(platform: Platform) -> Self {
        debug!("Initializing InterfaceManager for platform: {:?}", platform);
        Self {
            platform,
            blacklist: HashSet::new(),
            include: HashSet::new(),
            kind_cache: HashMap::new(),
        }
    }

    /// Restricts counting with a blacklist and an optional include list
    ///
    /// An empty include list means "every physical interface".
    pub fn with_filters<B, I>(mut self, blacklist: B, include: I) -> Self
    where
        B: IntoIterator<Item = String>,
        I: IntoIterator<Item = String>,
    {
        self.blacklist = blacklist.into_iter().collect();
        self.include = include.into_iter().collect();
        self
    }

    fn detect_platform() -> Platform {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "linux" | "android" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Unknown,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Classifies and decides whether the interface contributes to the total
    pub fn analyze(&mut self, interface_name: &str) -> InterfaceInfo {
        let kind = self.kind_of(interface_name);
        let decision = if self.blacklist.contains(interface_name) {
            CountDecision::Blacklisted
        } else if !self.include.is_empty() && !self.include.contains(interface_name) {
            CountDecision::NotIncluded
        } else if !kind.is_physical() {
            CountDecision::NotPhysical
        } else {
            CountDecision::Counted
        };

        trace!(
            "Interface '{}': kind={:?}, decision={:?}",
            interface_name, kind, decision
        );

        InterfaceInfo {
            name: interface_name.to_string(),
            kind,
            decision,
        }
    }

    pub fn should_count(&mut self, interface_name: &str) -> bool {
        self.analyze(interface_name).is_counted()
    }

    /// Drops cached kinds of interfaces that no longer exist
    pub fn retain_present<'a, I>(&mut self, present: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: HashSet<&str> = present.into_iter().collect();
        let before = self.kind_cache.len();
        self.kind_cache.retain(|name, _| present.contains(name.as_str()));
        let dropped = before - self.kind_cache.len();
        if dropped > 0 {
            trace!("Forgot {} vanished interfaces", dropped);
        }
    }

    pub fn cached_kinds(&self) -> usize {
        self.kind_cache.len()
    }

    fn kind_of(&mut self, interface_name: &str) -> InterfaceKind {
        if let Some(kind) = self.kind_cache.get(interface_name) {
            return *kind;
        }
        let name_lower = interface_name.to_lowercase();
        let kind = match self.platform {
            Platform::MacOS => Self::classify_macos(&name_lower),
            Platform::Linux => Self::classify_linux(&name_lower),
            Platform::Windows => Self::classify_windows(&name_lower),
            Platform::Unknown => Self::classify_generic(&name_lower),
        };
        self.kind_cache.insert(interface_name.to_string(), kind);
        kind
    }

    fn classify_macos(name: &str) -> InterfaceKind {
        match name {
            n if n.starts_with("lo") => InterfaceKind::Loopback,
            n if n.starts_with("utun") || n.starts_with("ipsec") || n.starts_with("ppp") => {
                InterfaceKind::Vpn
            }
            // Apple Wireless Direct Link and low latency WLAN ride on the Wi-Fi radio
            n if n.starts_with("awdl") || n.starts_with("llw") || n.starts_with("anpi") => {
                InterfaceKind::Virtual
            }
            n if n.starts_with("bridge") || n.starts_with("vmnet") || n.starts_with("ap") => {
                InterfaceKind::Virtual
            }
            n if n.starts_with("pdp_ip") => InterfaceKind::Cellular,
            n if n.starts_with("en") => InterfaceKind::Ethernet,
            n => Self::classify_generic(n),
        }
    }

    /// Stacked interfaces whose bytes are also counted on the underlying link
    ///
    /// VLANs (`eth0.100`, `vlan10`), MAC VLANs and bond or team masters all
    /// report traffic that already shows up on a physical interface.
    fn is_stacked(name: &str) -> bool {
        name.contains('.')
            || name.starts_with("vlan")
            || name.starts_with("macvlan")
            || name.starts_with("macvtap")
            || name.starts_with("bond")
            || name.starts_with("team")
    }

    fn classify_linux(name: &str) -> InterfaceKind {
        match name {
            n if n.starts_with("lo") => InterfaceKind::Loopback,
            n if Self::is_stacked(n) => InterfaceKind::Virtual,
            n if n.starts_with("tun")
                || n.starts_with("tap")
                || n.starts_with("wg")
                || n.starts_with("ppp")
                || n.starts_with("ipsec") =>
            {
                InterfaceKind::Vpn
            }
            n if n.starts_with("veth")
                || n.starts_with("docker")
                || n.starts_with("br-")
                || n.starts_with("virbr")
                || n.starts_with("vnet")
                || n.starts_with("cni")
                || n.starts_with("flannel")
                || n.starts_with("cali")
                || n.starts_with("lxc") =>
            {
                InterfaceKind::Virtual
            }
            n if n.starts_with("rmnet") || n.starts_with("wwan") || n.starts_with("ccmni") => {
                InterfaceKind::Cellular
            }
            n if n.starts_with("wl") => InterfaceKind::WiFi,
            n if n.starts_with("eth") || n.starts_with("en") || n.starts_with("em") => {
                InterfaceKind::Ethernet
            }
            n => Self::classify_generic(n),
        }
    }

    fn classify_windows(name: &str) -> InterfaceKind {
        // Windows interface names are descriptive rather than prefixed
        match name {
            n if n.contains("loopback") => InterfaceKind::Loopback,
            n if n.contains("vpn") || n.contains("tunnel") || n.contains("wireguard") => {
                InterfaceKind::Vpn
            }
            n if n.contains("hyper-v") || n.contains("vmware") || n.contains("vethernet") => {
                InterfaceKind::Virtual
            }
            n if n.contains("wi-fi") || n.contains("wifi") || n.contains("wireless") => {
                InterfaceKind::WiFi
            }
            n if n.contains("cellular") || n.contains("mobile") => InterfaceKind::Cellular,
            n if n.contains("ethernet") => InterfaceKind::Ethernet,
            n => Self::classify_generic(n),
        }
    }

    fn classify_generic(name: &str) -> InterfaceKind {
        match name {
            n if n.starts_with("lo") => InterfaceKind::Loopback,
            n if n.starts_with("tun") || n.starts_with("tap") => InterfaceKind::Vpn,
            n if Self::is_stacked(n) => InterfaceKind::Virtual,
            n if n.starts_with("eth") || n.starts_with("en") => InterfaceKind::Ethernet,
            n if n.starts_with("wl") || n.contains("wifi") => InterfaceKind::WiFi,
            _ => InterfaceKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_classification() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux);
        assert_eq!(manager.analyze("eth0").kind, InterfaceKind::Ethernet);
        assert_eq!(manager.analyze("enp3s0").kind, InterfaceKind::Ethernet);
        assert_eq!(manager.analyze("wlp2s0").kind, InterfaceKind::WiFi);
        assert_eq!(manager.analyze("rmnet_data0").kind, InterfaceKind::Cellular);
        assert_eq!(manager.analyze("tun0").kind, InterfaceKind::Vpn);
        assert_eq!(manager.analyze("wg0").kind, InterfaceKind::Vpn);
        assert_eq!(manager.analyze("docker0").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("lo").kind, InterfaceKind::Loopback);
    }

    #[test]
    fn test_macos_classification() {
        let mut manager = InterfaceManager::for_platform(Platform::MacOS);
        assert_eq!(manager.analyze("en0").kind, InterfaceKind::Ethernet);
        assert_eq!(manager.analyze("utun3").kind, InterfaceKind::Vpn);
        assert_eq!(manager.analyze("awdl0").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("pdp_ip0").kind, InterfaceKind::Cellular);
    }

    #[test]
    fn test_only_physical_transports_are_counted() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux);
        assert!(manager.should_count("wlan0"));
        assert!(manager.should_count("eth0"));
        assert!(!manager.should_count("tun0"));
        assert!(!manager.should_count("lo"));
        assert_eq!(
            manager.analyze("veth12ab").decision,
            CountDecision::NotPhysical
        );
    }

    #[test]
    fn test_stacked_interfaces_are_not_counted_twice() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux);
        assert!(manager.should_count("eth0"));
        assert!(!manager.should_count("eth0.100"));
        assert_eq!(manager.analyze("eth0.100").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("enp3s0.42").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("vlan10").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("macvlan0").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("bond0").kind, InterfaceKind::Virtual);
        assert_eq!(manager.analyze("team0").kind, InterfaceKind::Virtual);

        let mut generic = InterfaceManager::for_platform(Platform::Unknown);
        assert!(!generic.should_count("eth0.7"));
    }

    #[test]
    fn test_blacklist_and_include_list() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux)
            .with_filters(vec!["eth1".to_string()], Vec::new());
        assert_eq!(manager.analyze("eth1").decision, CountDecision::Blacklisted);
        assert!(manager.should_count("eth0"));

        let mut manager = InterfaceManager::for_platform(Platform::Linux)
            .with_filters(Vec::new(), vec!["wlan0".to_string()]);
        assert!(manager.should_count("wlan0"));
        assert_eq!(manager.analyze("eth0").decision, CountDecision::NotIncluded);
    }

    #[test]
    fn test_cache_forgets_vanished_interfaces() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux);
        for index in 0..50 {
            manager.analyze(&format!("veth{index:04x}"));
        }
        manager.analyze("eth0");
        assert_eq!(manager.cached_kinds(), 51);

        manager.retain_present(["eth0", "veth0001"]);
        assert_eq!(manager.cached_kinds(), 2);
        assert_eq!(manager.analyze("veth0001").kind, InterfaceKind::Virtual);
    }

    #[test]
    fn test_include_list_does_not_count_vpn() {
        let mut manager = InterfaceManager::for_platform(Platform::Linux)
            .with_filters(Vec::new(), vec!["tun0".to_string()]);
        assert_eq!(manager.analyze("tun0").decision, CountDecision::NotPhysical);
    }
}
