//! Boot asset content generation
//!
//! Renders PXE menus, iPXE scripts and installer seed files from templates
//! registered at startup. Template files are named `<name>.template`; the
//! install template for a stage is `<stage>.template`.

use crate::error::{ConfigError, ProvisionError, Result};
use crate::registry::ProvisioningPlan;
use minijinja::{Environment, ErrorKind};
use rackdirector_inventory::HostRecord;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info};

/// PXE menu template name
pub const PXE_MENU_TEMPLATE: &str = "pxemenu.template";
/// iPXE script template name
pub const IPXE_TEMPLATE: &str = "ipxe.template";

const TEMPLATE_EXTENSION: &str = "template";
const INSTALL_STAGE_PREFIX: &str = "install-";
const ENVIRONMENT_MENU: &str = "rackdirector-environment";
const LOCALBOOT_MENU: &str = "localboot";

/// Fixed values handed to every template
#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Provisioning server address
    pub server: Ipv4Addr,
    /// OS mirror address
    pub os_server: Ipv4Addr,
    /// Resolvers written into install content
    pub dns: Vec<Ipv4Addr>,
    /// Interface the installer boots from
    pub interface: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            server: Ipv4Addr::new(10, 0, 1, 10),
            os_server: Ipv4Addr::new(192, 168, 0, 10),
            dns: vec![Ipv4Addr::new(1, 1, 1, 1)],
            interface: "eth0".to_string(),
        }
    }
}

impl ContentSettings {
    pub fn with_server(mut self, server: Ipv4Addr) -> Self {
        self.server = server;
        self
    }

    pub fn with_os_server(mut self, os_server: Ipv4Addr) -> Self {
        self.os_server = os_server;
        self
    }

    pub fn with_dns(mut self, dns: Vec<Ipv4Addr>) -> Self {
        self.dns = dns;
        self
    }
}

#[derive(Debug, Serialize)]
struct BootMenuContext<'a> {
    hostname: &'a str,
    /// Primary address, the one `netmask` and `gateway` belong to
    address: String,
    /// Address the request came from; any address the host owns
    client_address: String,
    default_menu: String,
    stage: &'a str,
    server: String,
    os_server: String,
    netmask: String,
    gateway: String,
    interface: &'a str,
}

#[derive(Debug, Serialize)]
struct InstallInterface<'a> {
    device: &'a str,
    ipv4_address: String,
    ipv4_netmask: String,
    ipv4_gateway: String,
}

#[derive(Debug, Serialize)]
struct InstallContext<'a> {
    hostname: &'a str,
    stage: &'a str,
    dns: Vec<String>,
    server: String,
    os_server: String,
    interfaces: Vec<InstallInterface<'a>>,
}

/// Dotted-decimal form of a 4-byte mask; anything else renders empty
pub fn render_netmask(mask: &[u8]) -> String {
    match mask {
        [a, b, c, d] => format!("{}.{}.{}.{}", a, b, c, d),
        _ => String::new(),
    }
}

/// Menu entry a host should boot by default
pub fn default_menu(stage: Option<&str>) -> String {
    match stage {
        Some(stage) => match stage.strip_prefix(INSTALL_STAGE_PREFIX) {
            Some(os) => os.to_string(),
            None => ENVIRONMENT_MENU.to_string(),
        },
        None => LOCALBOOT_MENU.to_string(),
    }
}

fn optional_addr(addr: Option<Ipv4Addr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_default()
}

/// Template set and the settings shared by every render
pub struct BootAssets {
    env: Environment<'static>,
    names: Vec<String>,
    settings: ContentSettings,
}

impl BootAssets {
    /// Create an asset generator without templates
    pub fn new(settings: ContentSettings) -> Self {
        Self {
            env: Environment::new(),
            names: Vec::new(),
            settings,
        }
    }

    /// Load every `*.template` file in `dir`
    pub fn from_dir(dir: impl AsRef<Path>, settings: ContentSettings) -> std::result::Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let read_err = |source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut assets = Self::new(settings);
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or_default();
            let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            assets.add_template(name, source)?;
        }

        info!(dir = %dir.display(), templates = assets.names.len(), "Loaded templates");
        Ok(assets)
    }

    /// Register a template under `name`, replacing any previous one
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> std::result::Result<(), ConfigError> {
        let name: String = name.into();
        let source: String = source.into();
        self.env
            .add_template_owned(name.clone(), source)
            .map_err(|source| ConfigError::Template {
                name: name.clone(),
                source,
            })?;
        if !self.names.contains(&name) {
            self.names.push(name);
        }
        Ok(())
    }

    /// Registered template names
    pub fn template_names(&self) -> &[String] {
        &self.names
    }

    pub fn settings(&self) -> &ContentSettings {
        &self.settings
    }

    /// PXE menu for a host
    ///
    /// `primary` is the host's primary address, `client` the address the
    /// menu was requested from.
    pub fn pxe_menu(
        &self,
        host: &HostRecord,
        primary: Ipv4Addr,
        client: Ipv4Addr,
        plan: Option<&ProvisioningPlan>,
    ) -> Result<String> {
        self.render(
            PXE_MENU_TEMPLATE,
            &self.menu_context(host, primary, client, plan),
        )
    }

    /// iPXE script for a host, addressed like [`BootAssets::pxe_menu`]
    pub fn ipxe_script(
        &self,
        host: &HostRecord,
        primary: Ipv4Addr,
        client: Ipv4Addr,
        plan: Option<&ProvisioningPlan>,
    ) -> Result<String> {
        self.render(IPXE_TEMPLATE, &self.menu_context(host, primary, client, plan))
    }

    /// Installer seed for a host in an `install-*` stage
    pub fn install_content(
        &self,
        host: &HostRecord,
        address: Ipv4Addr,
        plan: Option<&ProvisioningPlan>,
    ) -> Result<String> {
        let stage = plan.map(ProvisioningPlan::current_stage);
        let stage = match stage {
            Some(stage) if stage.starts_with(INSTALL_STAGE_PREFIX) => stage,
            other => {
                return Err(ProvisionError::NotInInstallStage {
                    address,
                    stage: other.map(str::to_string),
                })
            }
        };

        let context = InstallContext {
            hostname: &host.hostname,
            stage,
            dns: self.settings.dns.iter().map(Ipv4Addr::to_string).collect(),
            server: self.settings.server.to_string(),
            os_server: self.settings.os_server.to_string(),
            interfaces: host
                .interfaces
                .iter()
                .map(|iface| InstallInterface {
                    device: &iface.device,
                    ipv4_address: iface.address().to_string(),
                    ipv4_netmask: render_netmask(&iface.network.mask().octets()),
                    ipv4_gateway: optional_addr(iface.gateway),
                })
                .collect(),
        };

        self.render(&format!("{}.{}", stage, TEMPLATE_EXTENSION), &context)
    }

    fn menu_context<'a>(
        &'a self,
        host: &'a HostRecord,
        primary: Ipv4Addr,
        client: Ipv4Addr,
        plan: Option<&'a ProvisioningPlan>,
    ) -> BootMenuContext<'a> {
        let stage = plan.map(ProvisioningPlan::current_stage);
        let primary_iface = host.primary_interface();

        BootMenuContext {
            hostname: &host.hostname,
            address: primary.to_string(),
            client_address: client.to_string(),
            default_menu: default_menu(stage),
            stage: stage.unwrap_or_default(),
            server: self.settings.server.to_string(),
            os_server: self.settings.os_server.to_string(),
            netmask: primary_iface
                .map(|iface| render_netmask(&iface.network.mask().octets()))
                .unwrap_or_default(),
            gateway: optional_addr(primary_iface.and_then(|iface| iface.gateway)),
            interface: &self.settings.interface,
        }
    }

    fn render<S: Serialize>(&self, name: &str, context: &S) -> Result<String> {
        let output = self
            .env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(context))
            .map_err(|source| match source.kind() {
                ErrorKind::TemplateNotFound => ProvisionError::TemplateMissing(name.to_string()),
                _ => ProvisionError::Render {
                    template: name.to_string(),
                    source,
                },
            })?;
        debug!(template = %name, bytes = output.len(), "Rendered template");
        Ok(output)
    }
}
