//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use geoshare_core::{EnrichKind, ImageFormat};

#[derive(Debug, Parser)]
#[command(name = "geoshare", version, about = "Find coordinates in text and map links, and share them in other formats")]
pub(crate) struct Cli {
    /// TOML configuration file; `GEOSHARE_*` variables override it.
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Log as JSON lines instead of human readable text.
    #[arg(long, global = true)]
    pub(crate) log_json: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Detect locations in text, links or a shared location and print them as JSON.
    Detect(DetectArgs),
    /// Render a coordinate as links.
    Link(LinkArgs),
    /// Render a coordinate as share text.
    Text(TextArgs),
    /// List the registered services.
    Services,
    /// Render markers through the static map cache.
    StaticMap(StaticMapArgs),
}

#[derive(Debug, Args)]
pub(crate) struct DetectArgs {
    /// Input text; read from stdin when omitted.
    pub(crate) text: Vec<String>,

    /// Treat the input as a shared location at LAT,LON instead of text.
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub(crate) shared: Option<String>,

    /// Mark the shared location as live.
    #[arg(long, requires = "shared")]
    pub(crate) live: bool,

    /// Decorate each location with the listed lookups.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub(crate) enrich: Vec<EnrichArg>,

    /// Also print collection links (e.g. a Google Maps route) for the result.
    #[arg(long)]
    pub(crate) route: bool,
}

#[derive(Debug, Args)]
pub(crate) struct CoordinateArgs {
    /// Latitude in degrees.
    #[arg(allow_negative_numbers = true)]
    pub(crate) lat: f64,
    /// Longitude in degrees.
    #[arg(allow_negative_numbers = true)]
    pub(crate) lon: f64,
    /// Only use the service with this id.
    #[arg(long, short)]
    pub(crate) service: Option<u32>,
}

#[derive(Debug, Args)]
pub(crate) struct LinkArgs {
    #[command(flatten)]
    pub(crate) coordinate: CoordinateArgs,
    /// Ask for navigation instead of a plain map view.
    #[arg(long)]
    pub(crate) drive: bool,
    /// Zoom level, where the format has one.
    #[arg(long)]
    pub(crate) zoom: Option<u8>,
}

#[derive(Debug, Args)]
pub(crate) struct TextArgs {
    #[command(flatten)]
    pub(crate) coordinate: CoordinateArgs,
}

#[derive(Debug, Args)]
pub(crate) struct StaticMapArgs {
    /// Markers as LAT,LON, in drawing order.
    #[arg(required = true, allow_hyphen_values = true)]
    pub(crate) markers: Vec<String>,
    /// Static map provider.
    #[arg(long, default_value = "bing")]
    pub(crate) provider: String,
    /// Image width; the configured default when omitted.
    #[arg(long)]
    pub(crate) width: Option<u32>,
    /// Image height; the configured default when omitted.
    #[arg(long)]
    pub(crate) height: Option<u32>,
    /// Image format; the configured default when omitted.
    #[arg(long, value_enum)]
    pub(crate) format: Option<FormatArg>,
    /// Only register the markers and print the public URL.
    #[arg(long)]
    pub(crate) lazy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EnrichArg {
    Address,
    Elevation,
    Timezone,
}

impl From<EnrichArg> for EnrichKind {
    fn from(value: EnrichArg) -> Self {
        match value {
            EnrichArg::Address => EnrichKind::Address,
            EnrichArg::Elevation => EnrichKind::Elevation,
            EnrichArg::Timezone => EnrichKind::Timezone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ImageFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_coordinates_are_not_flags() {
        let cli = Cli::try_parse_from(["geoshare", "link", "-33.8568", "-70.5", "--drive"]).expect("parsed");
        let Command::Link(args) = cli.command else {
            panic!("expected link");
        };
        assert!((args.coordinate.lat + 33.8568).abs() < 1e-9);
        assert!((args.coordinate.lon + 70.5).abs() < 1e-9);
        assert!(args.drive);
    }

    #[test]
    fn enrich_kinds_are_comma_separated() {
        let cli = Cli::try_parse_from(["geoshare", "detect", "--enrich", "address,timezone", "50.1,14.2"])
            .expect("parsed");
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.enrich, vec![EnrichArg::Address, EnrichArg::Timezone]);
        assert_eq!(args.text, vec!["50.1,14.2".to_owned()]);
    }
}
