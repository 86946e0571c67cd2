//! Configuration management
//!
//! The FTP server, the default file list, the table layouts of every MetaNetX
//! release and the prefix remapping rules ship with the crate in
//! `data/metanetx.toml`. A user file with the same layout can replace it, and
//! the connection settings can be overridden from the environment.

use crate::table::TableKind;
use crate::transform::RemapRules;
use chrono_tz::Tz;
use mnx_common::{MnxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Configuration compiled into the binary.
pub const PACKAGED_CONFIGURATION: &str = include_str!("../data/metanetx.toml");

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Zone the MetaNetX server reports its naive modification times in.
pub const DEFAULT_SERVER_TIMEZONE: &str = "Europe/Zurich";

/// Raw layout of a configuration file
#[derive(Debug, Clone, Deserialize)]
struct ConfigurationFile {
    latest: String,
    ftp: FtpConfiguration,
    tables: BTreeMap<String, TableConfiguration>,
    remap: RemapConfiguration,
}

/// Fully resolved configuration for one MetaNetX release
#[derive(Debug, Clone)]
pub struct Configuration {
    pub ftp: FtpConfiguration,
    pub tables: TableConfiguration,
    pub remap: RemapConfiguration,
}

/// FTP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfiguration {
    /// FTP server hostname
    pub host: String,

    /// FTP control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login name, "anonymous" for the public server
    #[serde(default = "default_username")]
    pub username: String,

    /// Login password
    #[serde(default = "default_password")]
    pub password: String,

    /// Directory holding one subdirectory per release
    pub base_directory: String,

    /// IANA name of the zone the server's timestamps are in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Files pulled when the caller names none
    pub files: Vec<String>,

    /// Release subdirectory, filled in when the configuration is resolved
    #[serde(default)]
    pub version: String,
}

fn default_port() -> u16 {
    DEFAULT_FTP_PORT
}

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_password() -> String {
    "anonymous@".to_string()
}

fn default_timezone() -> String {
    DEFAULT_SERVER_TIMEZONE.to_string()
}

/// Layout of a single table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleTableConfiguration {
    /// Column names applied to the header-less rows
    pub columns: Vec<String>,

    /// Number of data rows to skip after comment lines are dropped
    #[serde(default)]
    pub skip: usize,

    /// Column holding `prefix:identifier` references
    pub source_column: String,
}

/// Layouts of all tables of one release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfiguration {
    pub chem_prop: SingleTableConfiguration,
    pub chem_xref: SingleTableConfiguration,
    pub comp_prop: SingleTableConfiguration,
    pub comp_xref: SingleTableConfiguration,
    pub reac_prop: SingleTableConfiguration,
    pub reac_xref: SingleTableConfiguration,
}

impl TableConfiguration {
    /// Layout of the given table
    pub fn get(&self, kind: TableKind) -> &SingleTableConfiguration {
        match kind {
            TableKind::ChemProp => &self.chem_prop,
            TableKind::ChemXref => &self.chem_xref,
            TableKind::CompProp => &self.comp_prop,
            TableKind::CompXref => &self.comp_xref,
            TableKind::ReacProp => &self.reac_prop,
            TableKind::ReacXref => &self.reac_xref,
        }
    }
}

/// Remapping rules per identifier domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemapConfiguration {
    pub chemical: RemapRules,
    pub compartment: RemapRules,
    pub reaction: RemapRules,
}

impl RemapConfiguration {
    /// Rules that apply to the given table
    pub fn for_table(&self, kind: TableKind) -> &RemapRules {
        match kind {
            TableKind::ChemProp | TableKind::ChemXref => &self.chemical,
            TableKind::CompProp | TableKind::CompXref => &self.compartment,
            TableKind::ReacProp | TableKind::ReacXref => &self.reaction,
        }
    }
}

impl Configuration {
    /// Load the packaged configuration
    ///
    /// The release is `version` if given, else `MNX_VERSION`, else the
    /// packaged `latest`. Environment overrides are applied.
    pub fn load(version: Option<&str>) -> Result<Self> {
        Self::from_toml_str(PACKAGED_CONFIGURATION, version)?.with_env_overrides()
    }

    /// Load a user-supplied configuration file with the packaged layout
    pub fn from_file(path: impl AsRef<Path>, version: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MnxError::config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text, version)?.with_env_overrides()
    }

    /// Parse a configuration document and resolve one release
    pub fn from_toml_str(text: &str, version: Option<&str>) -> Result<Self> {
        let mut file: ConfigurationFile =
            toml::from_str(text).map_err(|e| MnxError::config(e.to_string()))?;

        let version = match version {
            Some(v) => v.to_string(),
            None => std::env::var("MNX_VERSION").unwrap_or_else(|_| file.latest.clone()),
        };

        let tables = file
            .tables
            .remove(&version)
            .ok_or_else(|| MnxError::VersionNotFound(version.clone()))?;

        let mut ftp = file.ftp;
        ftp.version = version;

        let config = Self {
            ftp,
            tables,
            remap: file.remap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `MNX_FTP_*` and `MNX_SERVER_TIMEZONE` overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var("MNX_FTP_HOST") {
            self.ftp.host = host;
        }

        if let Ok(port) = std::env::var("MNX_FTP_PORT") {
            self.ftp.port = port
                .parse()
                .map_err(|_| MnxError::config(format!("Invalid MNX_FTP_PORT: {}", port)))?;
        }

        if let Ok(username) = std::env::var("MNX_FTP_USERNAME") {
            self.ftp.username = username;
        }

        if let Ok(password) = std::env::var("MNX_FTP_PASSWORD") {
            self.ftp.password = password;
        }

        if let Ok(timezone) = std::env::var("MNX_SERVER_TIMEZONE") {
            self.ftp.timezone = timezone;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.ftp.validate()?;

        let layouts = [
            ("chem_prop", &self.tables.chem_prop),
            ("chem_xref", &self.tables.chem_xref),
            ("comp_prop", &self.tables.comp_prop),
            ("comp_xref", &self.tables.comp_xref),
            ("reac_prop", &self.tables.reac_prop),
            ("reac_xref", &self.tables.reac_xref),
        ];
        for (name, layout) in layouts {
            if !layout.columns.contains(&layout.source_column) {
                return Err(MnxError::config(format!(
                    "Table '{}' has no column named '{}'",
                    name, layout.source_column
                )));
            }
        }

        Ok(())
    }
}

impl FtpConfiguration {
    /// Remote directory of the configured release
    pub fn directory(&self) -> String {
        join_remote(&self.base_directory, &self.version)
    }

    /// Resolve the server zone. Done per call, never cached.
    pub fn server_timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| MnxError::Timezone(self.timezone.clone()))
    }

    /// Validate connection settings
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MnxError::config("FTP host cannot be empty"));
        }

        if self.port == 0 {
            return Err(MnxError::config("FTP port must be greater than 0"));
        }

        if self.version.is_empty() {
            return Err(MnxError::config("Release version cannot be empty"));
        }

        if self.files.is_empty() {
            return Err(MnxError::config("Default file list cannot be empty"));
        }

        self.server_timezone()?;
        Ok(())
    }
}

/// Join two POSIX path segments without doubling the separator
pub fn join_remote(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => format!("/{}", segment),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, segment),
    }
}
