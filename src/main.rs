mod cli;
mod logger;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CliConfig, Command, DumpFormat};
use countries_xml::{Codec, Countries, Country, EncodeOptions};
use std::io::{self, Write};
use std::path::Path;

const SAMPLE_DESCRIPTION: &str =
    "Tuam veneramur voluntatem tuam ut vitam tuam pro nostra des causa. Oh, tantum te amamus!";

fn main() -> Result<()> {
    let config = CliConfig::parse();
    logger::init_cli_logger(config.verbose);
    tracing::debug!("CLI config: {:?}", config);

    match config.command {
        Command::Encode {
            output,
            country,
            format,
        } => {
            let codec = Codec::with_options(EncodeOptions::from(&format));
            marshal(&codec, &Countries::from(Country::from(country)), &output)
        }
        Command::Decode { input, format } => {
            let countries = unmarshal(&input)?;
            dump(&countries, format)
        }
        Command::Demo { input, output } => demo(&input, &output),
    }
}

/// Builds the sample record, marshals it, then unmarshals `input`. Stops at
/// the first failure.
fn demo(input: &Path, output: &Path) -> Result<()> {
    let country = Country::new("ua", "Ukraine", "Brussels").with_description(SAMPLE_DESCRIPTION);
    let codec = Codec::with_options(EncodeOptions::pretty());

    println!("Marshalling:\n------------\n");
    marshal(&codec, &Countries::from(country), output)?;

    println!("\n\nUnmarshalling:\n--------------\n");
    let countries = unmarshal(input)?;
    dump(&countries, DumpFormat::Text)
}

fn marshal(codec: &Codec, countries: &Countries, output: &Path) -> Result<()> {
    codec
        .serialize(countries, output)
        .with_context(|| format!("failed to marshal into {}", output.display()))?;
    tracing::info!("{} created", output.display());

    println!("reading {} \u{21B7}\n", output.display());
    let stdout = io::stdout();
    codec
        .encode_to_writer(countries, stdout.lock())
        .context("failed to print document")?;
    Ok(())
}

fn unmarshal(input: &Path) -> Result<Countries> {
    let countries = Codec::default()
        .deserialize(input)
        .with_context(|| format!("failed to unmarshal {}", input.display()))?;
    tracing::info!("read {} countries from {}", countries.len(), input.display());
    Ok(countries)
}

fn dump(countries: &Countries, format: DumpFormat) -> Result<()> {
    let mut out = io::stdout().lock();
    match format {
        DumpFormat::Text => {
            for country in countries {
                writeln!(out, "{}\n", country)?;
            }
        }
        DumpFormat::Json => {
            serde_json::to_writer_pretty(&mut out, countries)?;
            writeln!(out)?;
        }
        DumpFormat::Xml => {
            Codec::with_options(EncodeOptions::pretty()).encode_to_writer(countries, &mut out)?;
        }
    }
    Ok(())
}
