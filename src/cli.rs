use clap::{Args, Parser, Subcommand, ValueEnum};
use countries_xml::{Country, EncodeOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "countries-xml")]
#[command(about = "Marshal country records to XML and back")]
#[command(version)]
pub struct CliConfig {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write one country to a new XML file and echo the document
    Encode {
        /// Destination file; must not exist yet
        #[arg(short, long, env = "COUNTRIES_XML_OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        country: CountryArgs,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Read an XML file and print its records
    Decode {
        /// Source file
        #[arg(env = "COUNTRIES_XML_INPUT")]
        input: PathBuf,

        /// How to print the records
        #[arg(short, long, value_enum, default_value_t = DumpFormat::Text)]
        format: DumpFormat,
    },

    /// Marshal a sample record, then unmarshal an input document
    Demo {
        /// Document to unmarshal
        #[arg(short, long, env = "COUNTRIES_XML_INPUT", default_value = "data/countries.xml")]
        input: PathBuf,

        /// File to marshal the sample record into; must not exist yet
        #[arg(short, long, env = "COUNTRIES_XML_OUTPUT", default_value = "App_output.xml")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CountryArgs {
    /// Country code, e.g. "ua"
    #[arg(long)]
    pub code: String,

    /// Country name
    #[arg(long)]
    pub name: String,

    /// Capital city
    #[arg(long)]
    pub capital: String,

    /// Optional description
    #[arg(long)]
    pub description: Option<String>,
}

impl From<CountryArgs> for Country {
    fn from(args: CountryArgs) -> Self {
        Country {
            country_code: args.code,
            name: args.name,
            capital: args.capital,
            description: args.description,
        }
    }
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Single-line output instead of indented
    #[arg(long)]
    pub compact: bool,

    /// Leave out the XML declaration
    #[arg(long)]
    pub no_declaration: bool,

    /// Indentation per level for indented output
    #[arg(long, default_value = "    ", value_parser = parse_indent)]
    pub indent: String,
}

fn parse_indent(indent: &str) -> Result<String, String> {
    EncodeOptions::default()
        .with_indent(indent)
        .map(|options| options.indent)
        .map_err(|e| e.to_string())
}

impl From<&FormatArgs> for EncodeOptions {
    fn from(args: &FormatArgs) -> Self {
        EncodeOptions {
            pretty: !args.compact,
            indent: args.indent.clone(),
            declaration: !args.no_declaration,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpFormat {
    /// One "Field: value" line per field
    Text,
    /// A JSON array
    Json,
    /// Indented XML
    Xml,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_consistent() {
        CliConfig::command().debug_assert();
    }

    #[test]
    fn test_encode_args() {
        let config = CliConfig::try_parse_from([
            "countries-xml",
            "encode",
            "--output",
            "out.xml",
            "--code",
            "ua",
            "--name",
            "Ukraine",
            "--capital",
            "Kyiv",
            "--compact",
        ])
        .unwrap();

        match config.command {
            Command::Encode {
                output,
                country,
                format,
            } => {
                assert_eq!(output, PathBuf::from("out.xml"));
                let options = EncodeOptions::from(&format);
                assert!(!options.pretty);
                assert!(options.declaration);
                assert_eq!(Country::from(country), Country::new("ua", "Ukraine", "Kyiv"));
            }
            other => panic!("expected Encode, got {:?}", other),
        }
    }

    #[test]
    fn test_indent_must_be_whitespace() {
        let args = |indent: &'static str| {
            CliConfig::try_parse_from([
                "countries-xml",
                "encode",
                "-o",
                "out.xml",
                "--code",
                "ua",
                "--name",
                "Ukraine",
                "--capital",
                "Kyiv",
                "--indent",
                indent,
            ])
        };

        assert!(args("ab").is_err());
        match args("\t").unwrap().command {
            Command::Encode { format, .. } => assert_eq!(EncodeOptions::from(&format).indent, "\t"),
            other => panic!("expected Encode, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_format() {
        let config =
            CliConfig::try_parse_from(["countries-xml", "-v", "decode", "in.xml", "--format", "json"])
                .unwrap();
        assert!(config.verbose);
        assert!(matches!(
            config.command,
            Command::Decode {
                format: DumpFormat::Json,
                ..
            }
        ));
    }
}
