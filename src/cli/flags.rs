use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::types::{Contact, OutputFormat, SiteCategory, StructuredAddress, Tier};
use crate::pipeline::correlator::FallbackPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "stormsite",
    version,
    about = "Weather hazard monitoring for registered sites"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML). Default: config/stormsite.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Comma-separated geocoding providers to enable (case-insensitive)
    #[arg(long, global = true, value_delimiter = ',')]
    pub providers: Option<Vec<String>>,

    /// SQLite path for the site registry (overrides config)
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Increase verbosity (debug, trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log file path
    #[arg(long, global = true, default_value = "data/stormsite.log")]
    pub log_file: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Geocode an address or "lat, lng" literal
    Resolve {
        address: String,
        /// Print every attempted query
        #[arg(long)]
        trace: bool,
    },
    /// Manage registered sites
    Site {
        #[command(subcommand)]
        action: SiteCommand,
    },
    /// Fetch hazards for every site and update their alert state
    Refresh {
        /// Keep refreshing on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
        /// Seconds between cycles in watch mode (overrides config)
        #[arg(long)]
        interval: Option<u64>,
        /// Output format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormatArg,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Correlate a saved GeoJSON alert feed against one location
    Correlate {
        /// FeatureCollection (or bare feature array) file
        #[arg(long)]
        feed: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Address used for area-description matching
        #[arg(long)]
        address: Option<String>,
        /// Override the configured fallback policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Probe each configured provider and the hazard feed
    Diagnose,
}

#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// Register a site; the address is geocoded unless --coordinate is given
    Add {
        #[arg(long)]
        nickname: String,
        #[command(flatten)]
        address: AddressArgs,
        #[arg(long, default_value = "other")]
        category: SiteCategory,
        #[command(flatten)]
        contact: ContactArgs,
        /// "lat, lng" instead of geocoding
        #[arg(long, allow_hyphen_values = true)]
        coordinate: Option<String>,
    },
    /// List sites with their current alert state
    List {
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormatArg,
        /// Only sites of this category
        #[arg(long)]
        category: Option<SiteCategory>,
    },
    /// Show one site as JSON
    Show { id: String },
    /// Change a site; a new address is geocoded again
    Edit {
        id: String,
        #[arg(long)]
        nickname: Option<String>,
        #[command(flatten)]
        address: AddressArgs,
        #[arg(long)]
        category: Option<SiteCategory>,
        #[command(flatten)]
        contact: ContactArgs,
        #[arg(long, allow_hyphen_values = true)]
        coordinate: Option<String>,
    },
    /// Delete a site
    Remove { id: String },
    /// Set a site's alert level by hand until the next refresh
    Override { id: String, tier: Tier },
}

#[derive(Args, Debug, Default, Clone)]
pub struct AddressArgs {
    /// Street line
    #[arg(long)]
    pub street: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    /// State or province
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub postal_code: Option<String>,
}

impl AddressArgs {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.region.is_none()
            && self.postal_code.is_none()
    }

    /// Fields given on the command line replace those of `base`.
    pub fn merge_into(&self, base: &StructuredAddress) -> StructuredAddress {
        let pick = |arg: &Option<String>, old: &str| {
            arg.as_deref().map(str::trim).unwrap_or(old).to_string()
        };
        StructuredAddress {
            street: pick(&self.street, &base.street),
            city: pick(&self.city, &base.city),
            region: pick(&self.region, &base.region),
            postal_code: pick(&self.postal_code, &base.postal_code),
            country: base.country,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct ContactArgs {
    #[arg(long)]
    pub contact_name: Option<String>,
    #[arg(long)]
    pub contact_title: Option<String>,
    #[arg(long)]
    pub contact_phone: Option<String>,
    #[arg(long)]
    pub contact_email: Option<String>,
}

impl ContactArgs {
    pub fn to_contact(&self) -> Option<Contact> {
        let contact = Contact {
            name: self.contact_name.clone(),
            title: self.contact_title.clone(),
            phone: self.contact_phone.clone(),
            email: self.contact_email.clone(),
        };
        (!contact.is_empty()).then_some(contact)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormatArg {
    Json,
    Jsonl,
    Markdown,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
            OutputFormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    IncludeAll,
    Strict,
}

impl From<PolicyArg> for FallbackPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::IncludeAll => FallbackPolicy::IncludeAll,
            PolicyArg::Strict => FallbackPolicy::Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_site_add_with_negative_coordinate() {
        let cli = Cli::parse_from([
            "stormsite",
            "site",
            "add",
            "--nickname",
            "OKC DC",
            "--city",
            "Oklahoma City",
            "--region",
            "OK",
            "--category",
            "3pl-warehouse",
            "--coordinate",
            "35.4676, -97.5164",
        ]);
        match cli.command {
            Command::Site {
                action:
                    SiteCommand::Add {
                        category,
                        coordinate,
                        address,
                        ..
                    },
            } => {
                assert_eq!(category, SiteCategory::ThirdPartyWarehouse);
                assert_eq!(coordinate.as_deref(), Some("35.4676, -97.5164"));
                assert_eq!(address.city.as_deref(), Some("Oklahoma City"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["stormsite", "refresh", "--format", "jsonl", "-vv", "--providers", "a,B"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.providers, Some(vec!["a".to_string(), "B".to_string()]));
        assert!(matches!(
            cli.command,
            Command::Refresh {
                format: OutputFormatArg::Jsonl,
                watch: false,
                ..
            }
        ));
    }

    #[test]
    fn site_list_filters_by_category() {
        let cli = Cli::parse_from(["stormsite", "site", "list", "--category", "machine-shop"]);
        assert!(matches!(
            cli.command,
            Command::Site {
                action: SiteCommand::List {
                    category: Some(SiteCategory::MachineShop),
                    ..
                }
            }
        ));
    }

    #[test]
    fn override_takes_tier_name() {
        let cli = Cli::parse_from(["stormsite", "site", "override", "site_1234abcd", "watch"]);
        assert!(matches!(
            cli.command,
            Command::Site {
                action: SiteCommand::Override { tier: Tier::Watch, .. }
            }
        ));
    }

    #[test]
    fn address_args_merge_over_existing() {
        let base = StructuredAddress {
            street: "1 Main St".into(),
            city: "Tulsa".into(),
            region: "OK".into(),
            postal_code: "74103".into(),
            ..Default::default()
        };
        let args = AddressArgs {
            street: Some(" 9 Elm St ".into()),
            ..Default::default()
        };
        let merged = args.merge_into(&base);
        assert_eq!(merged.street, "9 Elm St");
        assert_eq!(merged.city, "Tulsa");
    }
}
